//! Unsolicited supplicant event lines.
//!
//! Events arrive as `<N>BODY`, where `N` is the message priority. Matching is
//! done on the body so the priority level does not matter.

/// Body of the event sent when WPS credentials arrive.
pub const CREDENTIAL_RECEIVED: &str = "WPS-CRED-RECEIVED";

/// Body of the event sent once the interface is associated.
pub const CONNECTED: &str = "CTRL-EVENT-CONNECTED";

/// An event the bring-up automaton reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplicantEvent {
    /// WPS exchange finished and credentials were received.
    CredentialReceived,
    /// Association with the access point completed.
    Connected,
    /// Anything else, body only.
    Other(String),
}

impl SupplicantEvent {
    /// Classify a raw event line.
    pub fn parse(line: &str) -> Self {
        let (_, body) = split_priority(line);
        if body.starts_with(CREDENTIAL_RECEIVED) {
            Self::CredentialReceived
        } else if body.starts_with(CONNECTED) {
            Self::Connected
        } else {
            Self::Other(body.trim_end().to_string())
        }
    }
}

/// Split a `<N>` priority prefix off an event line.
///
/// Lines without a well-formed prefix are returned whole with no priority.
pub fn split_priority(line: &str) -> (Option<u8>, &str) {
    if let Some(rest) = line.strip_prefix('<')
        && let Some(end) = rest.find('>')
        && let Ok(level) = rest[..end].parse::<u8>()
    {
        return (Some(level), &rest[end + 1..]);
    }
    (None, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_priority() {
        assert_eq!(split_priority("<3>WPS-CRED-RECEIVED"), (Some(3), "WPS-CRED-RECEIVED"));
        assert_eq!(split_priority("<2>CTRL-EVENT-SCAN-STARTED "), (Some(2), "CTRL-EVENT-SCAN-STARTED "));
        assert_eq!(split_priority("OK"), (None, "OK"));
        assert_eq!(split_priority("<x>junk"), (None, "<x>junk"));
        assert_eq!(split_priority("<3"), (None, "<3"));
    }

    #[test]
    fn test_parse_known_events() {
        assert_eq!(
            SupplicantEvent::parse("<3>WPS-CRED-RECEIVED "),
            SupplicantEvent::CredentialReceived
        );
        assert_eq!(
            SupplicantEvent::parse("<3>CTRL-EVENT-CONNECTED - Connection to aa:bb:cc:dd:ee:ff completed"),
            SupplicantEvent::Connected
        );
    }

    #[test]
    fn test_priority_level_is_ignored() {
        assert_eq!(
            SupplicantEvent::parse("<4>WPS-CRED-RECEIVED"),
            SupplicantEvent::CredentialReceived
        );
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(
            SupplicantEvent::parse("<3>WPS-M2D \n"),
            SupplicantEvent::Other("WPS-M2D".to_string())
        );
    }
}
