//! stdin/stdout NDJSON bridge between the scan loop and the signal chain.
//!
//! stdout carries only NDJSON (`tune` and `status` messages); all logging
//! goes to stderr.

use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use embassy_time::Timer;

use sitehound::comm::{self, LineReader};
use sitehound::protocol::{HostCommand, ScannerMessage, MAX_MSG_LEN, MAX_STATUS_LEN};
use sitehound::runtime::{ScanContext, Submitted, TuneError, Tuner};
use sitehound::site::Frequency;
use sitehound::status::StatusSnapshot;

/// Depth of the stdout line queue
pub const OUTPUT_QUEUE_DEPTH: usize = 64;

/// Back-off while the signal queue or the stdout queue is full
const QUEUE_RETRY_MS: u64 = 1;
const QUEUE_RETRY: Duration = Duration::from_millis(QUEUE_RETRY_MS);

pub type Line = Vec<u8>;

// ── Message encoding ─────────────────────────────────────────────────

fn encode(msg: &ScannerMessage, capacity: usize) -> Option<Line> {
    let mut buf = vec![0u8; capacity];
    let len = comm::serialize_message(msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

pub fn tune_line(site: &str, freq: Frequency) -> Option<Line> {
    encode(&ScannerMessage::Tune { site, freq }, MAX_MSG_LEN)
}

pub fn status_line(status: &StatusSnapshot) -> Option<Line> {
    encode(&ScannerMessage::Status { status }, MAX_STATUS_LEN)
}

// ── Tuner ────────────────────────────────────────────────────────────

/// Tuner that asks the external receiver to retune by writing a `tune`
/// message to stdout.
pub struct StdoutTuner {
    output_tx: SyncSender<Line>,
}

impl StdoutTuner {
    pub fn new(output_tx: SyncSender<Line>) -> Self {
        Self { output_tx }
    }
}

impl Tuner for StdoutTuner {
    async fn tune(&mut self, site_id: &str, frequency: Frequency) -> Result<(), TuneError> {
        let mut line = tune_line(site_id, frequency).ok_or(TuneError::Rejected)?;
        loop {
            match self.output_tx.try_send(line) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(l)) => {
                    line = l;
                    Timer::after_millis(QUEUE_RETRY_MS).await;
                }
                Err(TrySendError::Disconnected(_)) => return Err(TuneError::Io),
            }
        }
    }
}

// ── Output thread ────────────────────────────────────────────────────

/// Write queued lines to stdout. An empty line ends the thread.
pub fn output_thread(output_rx: Receiver<Line>) {
    let stdout = io::stdout();
    while let Ok(line) = output_rx.recv() {
        if line.is_empty() {
            break;
        }
        let mut out = stdout.lock();
        if let Err(e) = out.write_all(&line).and_then(|()| out.flush()) {
            log::error!("stdout write failed: {e}");
            break;
        }
    }
}

// ── Command thread ───────────────────────────────────────────────────

/// Read NDJSON commands from stdin until EOF, then stop the scan loop.
pub fn command_thread(ctx: &'static ScanContext, output_tx: SyncSender<Line>) {
    let mut input = io::stdin().lock();
    let mut reader = LineReader::new();
    let mut chunk = [0u8; 256];

    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("stdin read failed: {e}");
                break;
            }
        };
        for &byte in &chunk[..n] {
            let Some(line) = reader.feed(byte) else {
                continue;
            };
            match comm::parse_command(line) {
                Some(cmd) => submit(ctx, cmd, &output_tx),
                None => log::debug!("Ignoring input line: {}", String::from_utf8_lossy(line)),
            }
        }
    }

    log::info!("stdin closed, stopping scan");
    ctx.stop();
}

fn submit(ctx: &ScanContext, cmd: HostCommand, output_tx: &SyncSender<Line>) {
    match ctx.submit(cmd) {
        Ok(Submitted::Accepted) => {}
        Ok(Submitted::StatusRequested) => match ctx.snapshot() {
            Some(status) => send_status(&status, output_tx),
            None => log::debug!("Status requested before the scan loop started"),
        },
        Err(mut signal) => loop {
            thread::sleep(QUEUE_RETRY);
            match ctx.post_signal(signal) {
                Ok(()) => break,
                Err(s) => signal = s,
            }
        },
    }
}

fn send_status(status: &StatusSnapshot, output_tx: &SyncSender<Line>) {
    match status_line(status) {
        Some(line) => {
            let _ = output_tx.send(line);
        }
        None => log::warn!("Status report too large to serialize"),
    }
}

// ── Periodic status ──────────────────────────────────────────────────

/// Emit a status message every `interval_secs`. Never returns; an interval
/// of 0 disables reporting.
pub async fn status_reporter(ctx: &ScanContext, interval_secs: u64, output_tx: SyncSender<Line>) {
    if interval_secs == 0 {
        return core::future::pending().await;
    }
    loop {
        Timer::after_secs(interval_secs).await;
        if let Some(status) = ctx.snapshot() {
            send_status(&status, &output_tx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use sitehound::config;
    use sitehound::scheduler::Scanner;

    #[test]
    fn tune_line_is_ndjson() {
        let line = tune_line("site1", 453_000_000).unwrap();
        assert_eq!(line, b"{\"type\":\"tune\",\"site\":\"site1\",\"freq\":453000000}\n");
    }

    #[test]
    fn status_line_wraps_snapshot() {
        let cfg = config::load(br#"{"control_channel_list":"851.0125"}"#).unwrap();
        let scanner = Scanner::new(cfg.registry, cfg.mode);
        let line = status_line(&scanner.snapshot(0)).unwrap();
        let text = std::str::from_utf8(&line).unwrap();
        assert!(text.starts_with(r#"{"type":"status","status":{"multi_site_scanning":false"#));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn stdout_tuner_queues_tune_line() {
        let (tx, rx) = mpsc::sync_channel(4);
        let mut tuner = StdoutTuner::new(tx);
        embassy_futures::block_on(tuner.tune("a", 460_250_000)).unwrap();
        assert_eq!(rx.recv().unwrap(), tune_line("a", 460_250_000).unwrap());
    }

    #[test]
    fn stdout_tuner_waits_for_room_without_blocking() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(b"busy\n".to_vec()).unwrap();
        let mut tuner = StdoutTuner::new(tx);
        let drained = embassy_futures::block_on(embassy_futures::join::join(
            tuner.tune("a", 460_250_000),
            async {
                Timer::after_millis(5).await;
                rx.try_recv().unwrap()
            },
        ));
        assert_eq!(drained, (Ok(()), b"busy\n".to_vec()));
        assert_eq!(rx.recv().unwrap(), tune_line("a", 460_250_000).unwrap());
    }

    #[test]
    fn stdout_tuner_fails_when_output_is_gone() {
        let (tx, rx) = mpsc::sync_channel(4);
        drop(rx);
        let mut tuner = StdoutTuner::new(tx);
        assert_eq!(embassy_futures::block_on(tuner.tune("a", 1)), Err(TuneError::Io));
    }
}
