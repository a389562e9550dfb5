//! `SCAN_RESULTS` parsing.
//!
//! The supplicant answers `SCAN_RESULTS` with a header line followed by one
//! tab-separated record per access point:
//!
//! ```text
//! bssid / frequency / signal level / flags / ssid
//! 00:11:22:33:44:55	2412	-40	[WPA2-PSK-CCMP][WPS][ESS]	WiiU0011223344
//! ```

/// One access point from a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Colon-separated hex BSSID, as reported.
    pub bssid: String,
    /// Channel frequency in MHz.
    pub frequency: u32,
    /// Signal level in dBm.
    pub signal: i32,
    /// Capability flags, e.g. `[WPA2-PSK-CCMP][ESS]`.
    pub flags: String,
    /// Network name; may be empty for hidden networks.
    pub ssid: String,
    raw: String,
}

impl ScanRecord {
    /// Parse one result line. Returns `None` for the header and for lines
    /// that do not start with a valid BSSID.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split('\t');

        let bssid = fields.next()?.trim();
        if !is_valid_bssid(bssid) {
            return None;
        }

        let frequency = fields.next().and_then(|f| f.trim().parse().ok()).unwrap_or(0);
        let signal = fields.next().and_then(|f| f.trim().parse().ok()).unwrap_or(0);
        let flags = fields.next().unwrap_or_default().to_string();
        let ssid = fields.next().unwrap_or_default().to_string();

        Some(Self {
            bssid: bssid.to_string(),
            frequency,
            signal,
            flags,
            ssid,
            raw: line.to_string(),
        })
    }

    /// Whether the raw result line mentions `marker` anywhere.
    pub fn matches(&self, marker: &str) -> bool {
        self.raw.contains(marker)
    }
}

/// Parse a whole `SCAN_RESULTS` reply, skipping lines that are not records.
pub fn parse_scan_results(reply: &str) -> Vec<ScanRecord> {
    reply.lines().filter_map(ScanRecord::parse).collect()
}

/// Six colon-separated two-digit hex octets.
pub fn is_valid_bssid(s: &str) -> bool {
    let octets: Vec<&str> = s.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = "bssid / frequency / signal level / flags / ssid\n\
        00:11:22:33:44:55\t2412\t-40\t[WPA2-PSK-CCMP][WPS][ESS]\tWiiU0011223344\n\
        66:77:88:99:aa:bb\t5180\t-71\t[WPA2-PSK-CCMP][ESS]\tHomeNetwork\n\
        garbage line\n";

    #[test]
    fn test_parse_scan_results() {
        let records = parse_scan_results(RESULTS);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.bssid, "00:11:22:33:44:55");
        assert_eq!(first.frequency, 2412);
        assert_eq!(first.signal, -40);
        assert_eq!(first.flags, "[WPA2-PSK-CCMP][WPS][ESS]");
        assert_eq!(first.ssid, "WiiU0011223344");
    }

    #[test]
    fn test_matches_marker() {
        let records = parse_scan_results(RESULTS);
        let matching: Vec<_> = records.iter().filter(|r| r.matches("WiiU")).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].bssid, "00:11:22:33:44:55");
    }

    #[test]
    fn test_hidden_network() {
        let record = ScanRecord::parse("aa:bb:cc:dd:ee:ff\t2437\t-55\t[ESS]\t").unwrap();
        assert_eq!(record.ssid, "");
        assert!(!record.matches("WiiU"));
    }

    #[test]
    fn test_bssid_validation() {
        assert!(is_valid_bssid("00:11:22:33:44:55"));
        assert!(is_valid_bssid("AA:bb:CC:dd:EE:ff"));
        assert!(!is_valid_bssid("00:11:22:33:44"));
        assert!(!is_valid_bssid("00:11:22:33:44:5g"));
        assert!(!is_valid_bssid("001:1:22:33:44:55"));
        assert!(!is_valid_bssid("bssid / frequency"));
    }

    #[test]
    fn test_empty_reply() {
        assert!(parse_scan_results("").is_empty());
        assert!(parse_scan_results("bssid / frequency / signal level / flags / ssid\n").is_empty());
    }
}
