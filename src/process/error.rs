//! Error types for subprocess operations.

use thiserror::Error;

/// Errors from launching, watching or stopping external programs.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("{command} failed (exit code {code:?}): {output}")]
    Failed {
        /// Command line that was run.
        command: String,
        /// Exit code, if the program exited normally.
        code: Option<i32>,
        /// Captured output, trimmed.
        output: String,
    },

    /// The expected output line never appeared.
    #[error("{program} did not report '{marker}' in time")]
    OutputTimeout {
        /// Program that was being watched.
        program: String,
        /// Line prefix we were waiting for.
        marker: String,
    },

    /// Output stream closed before the expected line appeared.
    #[error("{program} exited before reporting '{marker}'")]
    OutputClosed {
        /// Program that was being watched.
        program: String,
        /// Line prefix we were waiting for.
        marker: String,
    },

    /// Failed to deliver a termination signal.
    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Failed to reap a child process.
    #[error("Failed to wait for process {pid}: {source}")]
    Wait {
        /// Target process id.
        pid: u32,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_display() {
        let err = ProcessError::Launch {
            program: "dhclient".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("dhclient"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_output_timeout_display() {
        let err = ProcessError::OutputTimeout {
            program: "wpa_supplicant_drc".to_string(),
            marker: "Successfully initialized".to_string(),
        };
        assert!(err.to_string().contains("Successfully initialized"));
    }
}
