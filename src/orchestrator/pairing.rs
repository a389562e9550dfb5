//! WPS PIN pairing automaton.
//!
//! ```text
//!        ┌──────────────┐  OK   ┌──────────────┐ match ┌───────────┐ cred ┌───────────┐
//!  ─────▶│     SCAN     │──────▶│ SCAN_RESULTS │──────▶│  WPS_PIN  │─────▶│SAVE_CONFIG│──▶ done
//!        └──────────────┘       └──────────────┘       └───────────┘      └───────────┘
//!          ▲   │ busy/other         │ no match           │ 20 polls, nothing
//!          │   └─ sleep 5s ─┐       │                    │
//!          └────────────────┴───────┴────────────────────┘
//! ```

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::LinkSettings;
use crate::error::LinkError;
use crate::supplicant::event::SupplicantEvent;
use crate::supplicant::scan::parse_scan_results;
use crate::supplicant::{ControlChannel, CtrlError};
use crate::telemetry::{AuditEvent, AuditLogger};

/// Suffix the console expects after the 4-digit code.
pub const PIN_SUFFIX: &str = "5678";

/// Highest valid 4-digit code.
pub const MAX_PIN: u16 = 9999;

/// The `WPS_PIN` command for `bssid` and a 4-digit `pin`.
pub fn wps_pin_command(bssid: &str, pin: u16) -> String {
    format!("WPS_PIN {} {:04}{}", bssid, pin, PIN_SUFFIX)
}

/// Scan until a matching access point accepts `pin`. Returns its BSSID
/// after the supplicant has saved the received credentials.
pub(super) fn pair_with_console(
    ctrl: &mut dyn ControlChannel,
    settings: &LinkSettings,
    pin: u16,
    cancel: &CancelToken,
    audit: Option<&AuditLogger>,
) -> Result<String, LinkError> {
    loop {
        request_scan(ctrl, settings, cancel)?;

        let results = ctrl.request("SCAN_RESULTS")?;
        info!("Received scan results");

        for record in parse_scan_results(&results)
            .into_iter()
            .filter(|r| r.matches(&settings.device_marker))
        {
            if cancel.is_raised() {
                return Err(LinkError::Cancelled);
            }

            info!("Found console {} ({}), testing WPS PIN", record.bssid, record.ssid);
            if await_credentials(ctrl, &record.bssid, pin, settings, cancel)? {
                info!("Received authentication from console");
                let reply = ctrl.request("SAVE_CONFIG")?;
                debug!("SAVE_CONFIG: {}", reply.trim_end());
                return Ok(record.bssid);
            }

            info!("Giving up on {}, returning to scanning", record.bssid);
            if let Some(audit) = audit {
                audit.log(AuditEvent::CredentialTimeout {
                    bssid: record.bssid.clone(),
                });
            }
        }
    }
}

/// Issue `SCAN` until the supplicant accepts it.
fn request_scan(
    ctrl: &mut dyn ControlChannel,
    settings: &LinkSettings,
    cancel: &CancelToken,
) -> Result<(), LinkError> {
    loop {
        if cancel.is_raised() {
            return Err(LinkError::Cancelled);
        }

        match ctrl.request("SCAN") {
            Ok(reply) if reply.starts_with("OK") => return Ok(()),
            Ok(reply) if reply.starts_with("FAIL-BUSY") => debug!("Radio busy, retrying scan"),
            Ok(reply) => info!("Unknown scan response: {} (retrying)", reply.trim_end()),
            Err(CtrlError::Timeout { .. }) => warn!("No reply to SCAN (retrying)"),
            Err(e) => return Err(e.into()),
        }

        if !cancel.sleep(settings.timing.scan_retry) {
            return Err(LinkError::Cancelled);
        }
    }
}

/// Send the PIN to `bssid` and watch for credentials.
///
/// The poll budget covers the whole exchange; events other than the
/// credential event do not extend it.
fn await_credentials(
    ctrl: &mut dyn ControlChannel,
    bssid: &str,
    pin: u16,
    settings: &LinkSettings,
    cancel: &CancelToken,
) -> Result<bool, LinkError> {
    let reply = ctrl.request(&wps_pin_command(bssid, pin))?;
    debug!("WPS_PIN: {}", reply.trim_end());

    let timing = &settings.timing;
    let mut waited = 0;
    loop {
        while !ctrl.pending()? {
            if waited >= timing.credential_attempts {
                return Ok(false);
            }
            if !cancel.sleep(timing.credential_poll) {
                return Err(LinkError::Cancelled);
            }
            waited += 1;
        }

        let event = ctrl.recv()?;
        debug!("WPS event: {}", event.trim_end());
        if SupplicantEvent::parse(&event) == SupplicantEvent::CredentialReceived {
            return Ok(true);
        }
        if cancel.is_raised() {
            return Err(LinkError::Cancelled);
        }
    }
}
