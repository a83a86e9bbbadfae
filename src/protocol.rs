/// JSON message protocol between the scanner and the external signal chain.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::mode::ScanMode;
use crate::monitor::ActivityKind;
use crate::site::{Frequency, SiteId};
use crate::status::StatusSnapshot;

/// Messages sent from the scanner to the tuner / operator
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ScannerMessage<'a> {
    /// Retune request
    #[serde(rename = "tune")]
    Tune {
        site: &'a str,
        /// Frequency in Hz
        freq: Frequency,
    },
    /// Status report
    #[serde(rename = "status")]
    Status { status: &'a StatusSnapshot },
}

/// Commands sent from the signal chain to the scanner.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Control channel lock result
    Lock { site: SiteId, ok: bool },
    /// Protocol activity observed on a site
    Activity { site: SiteId, kind: ActivityKind },
    /// Change scanning mode at the next site switch
    SetMode { mode: ScanMode },
    /// Request current status
    GetStatus,
    /// Stop scanning
    Stop,
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: String<16>,
    #[serde(default)]
    pub site: Option<SiteId>,
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub kind: Option<String<8>>,
    #[serde(default)]
    pub mode: Option<String<16>>,
}

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;

/// Maximum size of a serialized status report
pub const MAX_STATUS_LEN: usize = 6144;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scanner;
    use crate::site::tests::registry;

    // ── HostCommand ────────────────────────────────────────────────

    #[test]
    fn host_command_equality() {
        assert_eq!(HostCommand::Stop, HostCommand::Stop);
        assert_eq!(
            HostCommand::SetMode {
                mode: ScanMode::Fast
            },
            HostCommand::SetMode {
                mode: ScanMode::Fast
            }
        );
        assert_ne!(HostCommand::Stop, HostCommand::GetStatus);
    }

    // ── ScannerMessage serialization ───────────────────────────────

    #[test]
    fn serialize_tune_message() {
        let msg = ScannerMessage::Tune {
            site: "north",
            freq: 851_012_500,
        };
        let mut buf = [0u8; 128];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(json, r#"{"type":"tune","site":"north","freq":851012500}"#);
    }

    #[test]
    fn serialize_status_message() {
        let mut scanner = Scanner::new(registry(&["a", "b"]), ScanMode::Thorough);
        scanner.poll(0);
        let status = scanner.snapshot(0);
        let msg = ScannerMessage::Status { status: &status };
        let mut buf = [0u8; MAX_STATUS_LEN];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.starts_with(r#"{"type":"status","status":{"#));
        assert!(json.contains(r#""mode":"thorough""#));
        assert!(json.contains(r#""current_site_id":"a""#));
    }

    // ── Version constant ───────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
