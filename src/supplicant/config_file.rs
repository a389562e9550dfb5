//! Supplicant configuration files.
//!
//! Pairing starts from a minimal authenticate-time config. After WPS succeeds
//! the supplicant saves the received network block into it, and a connect
//! config is derived by pinning the console's BSSID.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Config used while pairing: control socket directory and permission for
/// the supplicant to write received credentials back.
pub fn authenticate_config(ctrl_dir: &Path) -> String {
    format!("ctrl_interface={}\nupdate_config=1\n", ctrl_dir.display())
}

/// Derive the connect config from a saved authenticate config.
///
/// Every `network={...}` block gains `scan_ssid=1` and `bssid=<bssid>` ahead
/// of its `ssid=` line, and `ap_scan=1` follows the `update_config=1` line.
/// Blocks that already pin a BSSID or set `scan_ssid`, and files that already
/// set `ap_scan`, are left alone, so applying this to its own output changes
/// nothing.
pub fn synthesize_connect_config(input: &str, bssid: &str) -> String {
    let has_ap_scan = input.lines().any(|l| l.trim_start().starts_with("ap_scan="));

    let mut out = String::with_capacity(input.len() + 64);
    let mut block: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in input.lines() {
        let trimmed = line.trim();

        if in_block {
            block.push(line);
            if trimmed == "}" {
                emit_network_block(&mut out, &block, bssid);
                block.clear();
                in_block = false;
            }
            continue;
        }

        if trimmed.starts_with("network=") && trimmed.ends_with('{') {
            in_block = true;
            block.push(line);
            continue;
        }

        out.push_str(line);
        out.push('\n');

        if !has_ap_scan && trimmed == "update_config=1" {
            out.push_str("ap_scan=1\n");
        }
    }

    // Unterminated block: copy through untouched
    for line in block {
        out.push_str(line);
        out.push('\n');
    }

    out
}

fn emit_network_block(out: &mut String, block: &[&str], bssid: &str) {
    let pinned = block.iter().any(|l| {
        let t = l.trim_start();
        t.starts_with("bssid=") || t.starts_with("scan_ssid=")
    });

    for line in block {
        if !pinned && line.trim_start().starts_with("ssid=") {
            out.push_str("\tscan_ssid=1\n");
            out.push_str(&format!("\tbssid={}\n", bssid));
        }
        out.push_str(line);
        out.push('\n');
    }
}

/// The first BSSID pinned in a connect config.
pub fn pinned_bssid(config: &str) -> Option<&str> {
    config
        .lines()
        .find_map(|l| l.trim_start().strip_prefix("bssid="))
        .map(str::trim)
}

/// Replace `path` with `contents` so readers see either the old file or the
/// complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
