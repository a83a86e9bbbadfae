/// Rotation scheduler, the scan state machine.
///
/// The scheduler owns all scan state and is driven by a single loop: the
/// loop applies queued signals (see `monitor`), then calls [`Scanner::poll`]
/// which either asks for a retune or says how long to wait before the next
/// decision. Time is passed in explicitly so every decision is reproducible.
///
/// ```text
///   Idle ──► Switching ──► Dwelling ──activity──► LockedActive
///               ▲            │   │                    │
///               │  timeout / │   │ lock failure       │ activity ceased
///               │  exhausted │   └─► retune next cc   │
///               └────────────┴────────────────────────┘
/// ```
use serde::Serialize;

use crate::mode::{ModeProfile, ScanMode};
use crate::rotation;
use crate::site::{Frequency, Millis, Site, SiteId, SiteRegistry};
use crate::telemetry::ScanTelemetry;

/// Why the scheduler is leaving a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchCause {
    /// First tune after start
    Startup,
    /// Dwell timeout with no activity
    Timeout,
    /// Every control channel failed to lock
    Failure,
    /// Activity stopped for a full activity window
    ActivityCeased,
}

impl SwitchCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchCause::Startup => "startup",
            SwitchCause::Timeout => "timeout",
            SwitchCause::Failure => "failure",
            SwitchCause::ActivityCeased => "activity_ceased",
        }
    }
}

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet tuned anywhere
    Idle,
    /// Tuned to a site, waiting for activity
    Dwelling { since: Millis },
    /// Holding a site while activity keeps arriving
    LockedActive { last_activity_at: Millis },
    /// Decided to leave; waiting out the settle delay
    Switching { cause: SwitchCause },
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Dwelling { .. } => "dwelling",
            Phase::LockedActive { .. } => "locked_active",
            Phase::Switching { .. } => "switching",
        }
    }
}

/// A retune the caller must issue to the tuner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneRequest {
    pub site_id: SiteId,
    pub frequency: Frequency,
    /// `Some` when this tune moves to a new site, `None` for a channel
    /// retune within the current site
    pub cause: Option<SwitchCause>,
}

/// What the control loop should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Retune now, then report completion with [`Scanner::mark_tuned`]
    Tune(TuneRequest),
    /// Nothing to do before this deadline (unless a signal arrives)
    Wait(Millis),
}

/// Scan state for one run. Created at scan start, dropped at scan stop.
#[derive(Debug, Clone)]
pub struct Scanner {
    pub(crate) registry: SiteRegistry,
    pub(crate) profile: &'static ModeProfile,
    pub(crate) pending_mode: Option<ScanMode>,
    pub(crate) current: Option<usize>,
    pub(crate) phase: Phase,
    pub(crate) retune_pending: bool,
    pub(crate) last_tune_at: Option<Millis>,
    pub(crate) telemetry: ScanTelemetry,
}

impl Scanner {
    pub fn new(registry: SiteRegistry, mode: ScanMode) -> Self {
        Self {
            registry,
            profile: mode.profile(),
            pending_mode: None,
            current: None,
            phase: Phase::Idle,
            retune_pending: false,
            last_tune_at: None,
            telemetry: ScanTelemetry::new(),
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn profile(&self) -> &'static ModeProfile {
        self.profile
    }

    pub fn mode(&self) -> ScanMode {
        self.profile.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn telemetry(&self) -> &ScanTelemetry {
        &self.telemetry
    }

    pub fn current_site(&self) -> Option<&Site> {
        self.current.and_then(|i| self.registry.at(i))
    }

    /// Rotation only happens with more than one site. A single site (the
    /// legacy configuration form) is held indefinitely while its control
    /// channels are hunted.
    pub fn multi_site(&self) -> bool {
        self.registry.len() > 1
    }

    /// Queue a mode change. It takes effect at the next site switch, never
    /// in the middle of a dwell.
    pub fn request_mode(&mut self, mode: ScanMode) {
        if mode == self.profile.mode && self.pending_mode.is_none() {
            return;
        }
        log::info!("Scanning mode {} requested (active: {})", mode, self.profile.mode);
        self.pending_mode = Some(mode);
    }

    /// Record that the tuner finished a retune at `now`. The settle delay is
    /// measured from this point.
    pub fn mark_tuned(&mut self, now: Millis) {
        self.last_tune_at = Some(now);
    }

    /// Advance the state machine to `now`.
    pub fn poll(&mut self, now: Millis) -> Step {
        self.registry.expire_priorities(now);
        let dwell = self.profile.dwell_timeout_ms as Millis;

        let cause = match self.phase {
            Phase::Idle => SwitchCause::Startup,
            Phase::Dwelling { since } => {
                let deadline = since + dwell;
                if now < deadline {
                    return self.poll_retune(now, deadline);
                }
                if !self.multi_site() {
                    return self.restart_dwell(now);
                }
                SwitchCause::Timeout
            }
            Phase::LockedActive { last_activity_at } => {
                let deadline = last_activity_at + self.profile.activity_window_ms as Millis;
                if now < deadline {
                    return Step::Wait(deadline);
                }
                if !self.multi_site() {
                    return self.restart_dwell(now);
                }
                SwitchCause::ActivityCeased
            }
            Phase::Switching { cause } => cause,
        };

        self.phase = Phase::Switching { cause };
        let ready = self.settle_deadline();
        if now < ready {
            return Step::Wait(ready);
        }
        self.switch_site(cause, now)
    }

    /// Earliest time the next retune may start.
    fn settle_deadline(&self) -> Millis {
        self.last_tune_at
            .map_or(0, |t| t + self.profile.switch_delay_ms as Millis)
    }

    /// Issue a queued channel retune once the settle delay allows it.
    fn poll_retune(&mut self, now: Millis, deadline: Millis) -> Step {
        if !self.retune_pending {
            return Step::Wait(deadline);
        }
        let ready = self.settle_deadline();
        if now < ready {
            return Step::Wait(ready.min(deadline));
        }
        let Some(site) = self.current.and_then(|i| self.registry.at(i)) else {
            self.retune_pending = false;
            return Step::Wait(deadline);
        };
        let request = TuneRequest {
            site_id: site.site_id.clone(),
            frequency: site.current_channel(),
            cause: None,
        };
        log::debug!("Site {}: retuning to {} Hz", request.site_id, request.frequency);
        self.retune_pending = false;
        self.last_tune_at = Some(now);
        Step::Tune(request)
    }

    /// Single-site scanning: stay put and open a fresh dwell window.
    fn restart_dwell(&mut self, now: Millis) -> Step {
        self.apply_pending_mode();
        self.phase = Phase::Dwelling { since: now };
        self.poll_retune(now, now + self.profile.dwell_timeout_ms as Millis)
    }

    fn apply_pending_mode(&mut self) {
        if let Some(mode) = self.pending_mode.take() {
            log::info!("Scanning mode now {}", mode);
            self.profile = mode.profile();
        }
    }

    fn switch_site(&mut self, cause: SwitchCause, now: Millis) -> Step {
        self.apply_pending_mode();

        let Some(selection) = rotation::select_next(&mut self.registry, self.current, now) else {
            return Step::Wait(now + self.profile.dwell_timeout_ms as Millis);
        };
        if selection.global_reset {
            log::warn!("All sites exhausted, clearing failure counters");
        }

        let previous = self.current.replace(selection.index);
        if previous.is_some_and(|p| p != selection.index) {
            self.telemetry.record_switch(now);
        }
        self.telemetry.start(now);
        self.phase = Phase::Dwelling { since: now };
        self.retune_pending = false;
        self.last_tune_at = Some(now);

        let Some(site) = self.registry.at(selection.index) else {
            return Step::Wait(now + self.profile.dwell_timeout_ms as Millis);
        };
        let request = TuneRequest {
            site_id: site.site_id.clone(),
            frequency: site.current_channel(),
            cause: Some(cause),
        };
        if cause == SwitchCause::Startup {
            log::info!("Starting on site {} ({}) at {} Hz", site.site_id, site.name, request.frequency);
        } else {
            log::debug!(
                "Switching to site {} ({}) at {} Hz [{}]",
                site.site_id,
                site.name,
                request.frequency,
                cause.as_str()
            );
        }
        Step::Tune(request)
    }
}
