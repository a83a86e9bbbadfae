/// Async scan loop: drives a [`Scanner`] against a real tuner and clock.
///
/// The external signal chain posts lock results and activity events into a
/// [`ScanContext`]; the loop drains them in arrival order once per
/// iteration, polls the scanner, and either awaits a retune or sleeps until
/// the next deadline. A new signal, mode request or stop request wakes it
/// early. Only this loop ever touches the scanner.
use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use embassy_futures::select::{select4, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::mode::ScanMode;
use crate::monitor::ScanSignal;
use crate::protocol::HostCommand;
use crate::scheduler::{Scanner, Step};
use crate::site::{Frequency, Millis};
use crate::status::StatusSnapshot;

/// Depth of the inbound signal queue
pub const SIGNAL_QUEUE_DEPTH: usize = 32;

pub type SignalChannel = Channel<CriticalSectionRawMutex, ScanSignal, SIGNAL_QUEUE_DEPTH>;

/// Shared state between the scan loop and its producers. Const-constructible
/// so a binary can keep one in a `static`.
pub struct ScanContext {
    signals: SignalChannel,
    mode: Signal<CriticalSectionRawMutex, ScanMode>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    status: Mutex<RefCell<Option<StatusSnapshot>>>,
}

/// How a host command was handled by [`ScanContext::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// Queued for the scan loop
    Accepted,
    /// Caller should answer with [`ScanContext::snapshot`]
    StatusRequested,
}

impl ScanContext {
    pub const fn new() -> Self {
        Self {
            signals: Channel::new(),
            mode: Signal::new(),
            stop: Signal::new(),
            status: Mutex::new(RefCell::new(None)),
        }
    }

    /// Queue a signal for the scan loop. Hands the signal back if the queue
    /// is full.
    pub fn post_signal(&self, signal: ScanSignal) -> Result<(), ScanSignal> {
        self.signals.try_send(signal).map_err(|TrySendError::Full(s)| s)
    }

    /// Request a mode change. Applied at the next site switch.
    pub fn set_mode(&self, mode: ScanMode) {
        self.mode.signal(mode);
    }

    /// Ask the scan loop to exit at its next decision point.
    pub fn stop(&self) {
        self.stop.signal(());
    }

    /// Latest status published by the scan loop.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        critical_section::with(|cs| self.status.borrow_ref(cs).clone())
    }

    /// Route a host command to the scan loop.
    pub fn submit(&self, cmd: HostCommand) -> Result<Submitted, ScanSignal> {
        match cmd {
            HostCommand::SetMode { mode } => self.set_mode(mode),
            HostCommand::GetStatus => return Ok(Submitted::StatusRequested),
            HostCommand::Stop => self.stop(),
            signal => {
                if let Some(signal) = signal.into_signal() {
                    self.post_signal(signal)?;
                }
            }
        }
        Ok(Submitted::Accepted)
    }

    fn publish(&self, snapshot: StatusSnapshot) {
        critical_section::with(|cs| {
            self.status.borrow_ref_mut(cs).replace(snapshot);
        });
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuner failure. Reported to the scanner as a failed lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneError {
    /// The tuner refused the frequency
    Rejected,
    /// The tuner could not be reached
    Io,
}

impl fmt::Display for TuneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuneError::Rejected => write!(f, "frequency rejected by tuner"),
            TuneError::Io => write!(f, "tuner I/O error"),
        }
    }
}

impl core::error::Error for TuneError {}

/// The receiver being scanned. One retune at a time.
#[allow(async_fn_in_trait)]
pub trait Tuner {
    async fn tune(&mut self, site_id: &str, frequency: Frequency) -> Result<(), TuneError>;
}

fn now_ms() -> Millis {
    Instant::now().as_millis()
}

/// Run the scan loop until [`ScanContext::stop`] is called. Returns the
/// final status.
pub async fn run_scanner<T: Tuner>(ctx: &ScanContext, mut scanner: Scanner, tuner: &mut T) -> StatusSnapshot {
    log::info!(
        "Scan loop started: {} site(s), mode {}",
        scanner.registry().len(),
        scanner.mode()
    );

    loop {
        if let Some(mode) = ctx.mode.try_take() {
            scanner.request_mode(mode);
        }
        while let Ok(signal) = ctx.signals.try_receive() {
            scanner.apply_signal(&signal, now_ms());
        }
        if ctx.stop.try_take().is_some() {
            break;
        }

        let now = now_ms();
        let step = scanner.poll(now);
        ctx.publish(scanner.snapshot(now));

        match step {
            Step::Tune(request) => {
                let result = tuner.tune(&request.site_id, request.frequency).await;
                let done = now_ms();
                scanner.mark_tuned(done);
                if let Err(e) = result {
                    log::warn!("Tune to {} Hz for site {} failed: {}", request.frequency, request.site_id, e);
                    scanner.apply_signal(&ScanSignal::lock(request.site_id, false), done);
                }
            }
            Step::Wait(deadline) => {
                let woke = select4(
                    Timer::at(Instant::from_millis(deadline)),
                    ctx.signals.receive(),
                    ctx.mode.wait(),
                    ctx.stop.wait(),
                )
                .await;
                match woke {
                    Either4::First(()) => {}
                    Either4::Second(signal) => {
                        scanner.apply_signal(&signal, now_ms());
                    }
                    Either4::Third(mode) => scanner.request_mode(mode),
                    Either4::Fourth(()) => break,
                }
            }
        }
    }

    let status = scanner.snapshot(now_ms());
    ctx.publish(status.clone());
    log::info!(
        "Scan loop stopped after {} site switches",
        status.site_switch_count
    );
    status
}
