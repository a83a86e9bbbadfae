/// Communication layer: NDJSON framing for the signal-chain bridge.
///
/// Retune requests and status reports go out as newline-delimited JSON;
/// lock results, activity events and operator commands come back the same
/// way, one object per line.
use crate::mode::ScanMode;
use crate::monitor::{ActivityKind, ScanSignal};
use crate::protocol::{HostCommand, RawCommand, ScannerMessage, MAX_MSG_LEN};

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a ScannerMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written including the trailing newline, or
/// None if the message and its newline do not fit.
pub fn serialize_message(msg: &ScannerMessage, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(msg, buf).ok()?;
    // Append newline for NDJSON
    let newline = buf.get_mut(len)?;
    *newline = b'\n';
    Some(len + 1)
}

/// Deserialize a HostCommand from a JSON byte slice.
///
/// Returns `None` for malformed JSON, unknown commands and commands missing
/// a required field.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    match raw.cmd.as_str() {
        "lock" => Some(HostCommand::Lock {
            site: raw.site?,
            ok: raw.ok?,
        }),
        "activity" => Some(HostCommand::Activity {
            site: raw.site?,
            kind: ActivityKind::from_name(raw.kind.as_deref()?)?,
        }),
        "set_mode" => Some(HostCommand::SetMode {
            mode: ScanMode::from_name(raw.mode.as_deref()?)?,
        }),
        "status" => Some(HostCommand::GetStatus),
        "stop" => Some(HostCommand::Stop),
        _ => None,
    }
}

impl HostCommand {
    /// The scanner signal carried by this command, if any.
    pub fn into_signal(self) -> Option<ScanSignal> {
        match self {
            HostCommand::Lock { site, ok } => Some(ScanSignal::lock(site, ok)),
            HostCommand::Activity { site, kind } => Some(ScanSignal::activity(site, kind)),
            HostCommand::SetMode { .. } | HostCommand::GetStatus | HostCommand::Stop => None,
        }
    }
}

// ── NDJSON line reader ─────────────────────────────────────────────────

/// NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    overflowed: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            overflowed: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected. An over-long line is dropped whole.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let len = self.pos;
            let overflowed = self.overflowed;
            self.pos = 0;
            self.overflowed = false;
            if len > 0 && !overflowed {
                Some(&self.buf[..len])
            } else {
                None
            }
        } else if self.overflowed {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: discard until the next newline
            self.pos = 0;
            self.overflowed = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &data[start..end]
}
