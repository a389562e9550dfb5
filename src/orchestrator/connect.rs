//! Association wait after the supplicant starts with a connect config.

use std::time::Duration;

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::LinkError;
use crate::supplicant::ControlChannel;
use crate::supplicant::event::SupplicantEvent;

/// Block until the supplicant reports `CTRL-EVENT-CONNECTED`.
///
/// Checks for events every `poll` while none are pending.
pub(super) fn wait_for_connection(
    ctrl: &mut dyn ControlChannel,
    poll: Duration,
    cancel: &CancelToken,
) -> Result<(), LinkError> {
    info!("Waiting for console to associate");
    loop {
        while !ctrl.pending()? {
            if !cancel.sleep(poll) {
                return Err(LinkError::Cancelled);
            }
        }

        let event = ctrl.recv()?;
        debug!("Supplicant event: {}", event.trim_end());
        if SupplicantEvent::parse(&event) == SupplicantEvent::Connected {
            return Ok(());
        }
        if cancel.is_raised() {
            return Err(LinkError::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    use crate::supplicant::CtrlError;

    #[derive(Default)]
    struct Events(VecDeque<&'static str>);

    impl ControlChannel for Events {
        fn request(&mut self, _command: &str) -> Result<String, CtrlError> {
            Ok("OK\n".to_string())
        }

        fn attach(&mut self) -> Result<(), CtrlError> {
            Ok(())
        }

        fn detach(&mut self) -> Result<(), CtrlError> {
            Ok(())
        }

        fn pending(&mut self) -> Result<bool, CtrlError> {
            Ok(!self.0.is_empty())
        }

        fn recv(&mut self) -> Result<String, CtrlError> {
            Ok(self.0.pop_front().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_skips_other_events() {
        let mut ctrl = Events(VecDeque::from([
            "<3>CTRL-EVENT-SCAN-RESULTS ",
            "<3>Trying to associate with 00:11:22:33:44:55",
            "<3>CTRL-EVENT-CONNECTED - Connection to 00:11:22:33:44:55 completed",
        ]));

        wait_for_connection(&mut ctrl, Duration::from_millis(1), &CancelToken::new()).unwrap();
        assert!(ctrl.0.is_empty());
    }

    #[test]
    fn test_cancel_while_idle() {
        let mut ctrl = Events::default();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            remote.raise();
        });

        let start = Instant::now();
        let result = wait_for_connection(&mut ctrl, Duration::from_secs(2), &cancel);
        raiser.join().unwrap();

        assert!(matches!(result, Err(LinkError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
