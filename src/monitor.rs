/// Activity/lock monitor. Applies signals from the decoder chain to
/// scanner state.
///
/// Signals only count for the site currently tuned. Anything addressed to
/// another site arrived after a switch and is dropped.
use core::fmt;

use serde::Serialize;

use crate::hunt::{self, HuntOutcome};
use crate::scheduler::{Phase, Scanner, SwitchCause};
use crate::site::{Millis, SiteId};

/// Kind of protocol activity observed on a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Trunking signalling block on the control channel
    Tsbk,
    /// Voice traffic
    Voice,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Tsbk => "tsbk",
            ActivityKind::Voice => "voice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tsbk" => Some(ActivityKind::Tsbk),
            "voice" => Some(ActivityKind::Voice),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous signal from the external signal chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSignal {
    /// Result of a control channel lock attempt
    Lock { site_id: SiteId, success: bool },
    /// Protocol activity decoded on a site
    Activity { site_id: SiteId, kind: ActivityKind },
}

impl ScanSignal {
    pub fn lock(site_id: SiteId, success: bool) -> Self {
        ScanSignal::Lock { site_id, success }
    }

    pub fn activity(site_id: SiteId, kind: ActivityKind) -> Self {
        ScanSignal::Activity { site_id, kind }
    }

    pub fn site_id(&self) -> &str {
        match self {
            ScanSignal::Lock { site_id, .. } | ScanSignal::Activity { site_id, .. } => site_id,
        }
    }
}

/// Whether a signal changed scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    /// Addressed to a site that is not currently tuned
    Stale,
}

impl Scanner {
    /// Apply one signal at time `now`.
    pub fn apply_signal(&mut self, signal: &ScanSignal, now: Millis) -> Disposition {
        let Some(index) = self.current_index_for(signal.site_id()) else {
            log::trace!("Dropping stale signal for site {}", signal.site_id());
            return Disposition::Stale;
        };
        let expiry_ms = self.profile.priority_expiry_ms();
        let Some(site) = self.registry.at_mut(index) else {
            return Disposition::Stale;
        };

        match *signal {
            ScanSignal::Activity { kind, .. } => {
                site.record_activity(kind, now, expiry_ms);
                match self.phase {
                    Phase::Dwelling { .. } => {
                        log::debug!("Site {}: {} activity, holding", site.site_id, kind);
                        self.phase = Phase::LockedActive {
                            last_activity_at: now,
                        };
                    }
                    Phase::LockedActive { .. } => {
                        self.phase = Phase::LockedActive {
                            last_activity_at: now,
                        };
                    }
                    Phase::Idle | Phase::Switching { .. } => {}
                }
            }
            ScanSignal::Lock { success: true, .. } => hunt::on_lock_success(site),
            ScanSignal::Lock { success: false, .. } => match hunt::on_lock_failure(site) {
                HuntOutcome::Retune(frequency) => {
                    log::debug!(
                        "Site {}: lock failed ({} in a row), next channel {} Hz",
                        site.site_id,
                        site.consecutive_failures(),
                        frequency
                    );
                    match self.phase {
                        Phase::Dwelling { .. } => self.retune_pending = true,
                        Phase::LockedActive { .. } => {
                            self.phase = Phase::Dwelling { since: now };
                            self.retune_pending = true;
                        }
                        Phase::Idle | Phase::Switching { .. } => {}
                    }
                }
                HuntOutcome::Exhausted => {
                    log::debug!("Site {}: all control channels failed", site.site_id);
                    if matches!(self.phase, Phase::Dwelling { .. } | Phase::LockedActive { .. }) {
                        self.phase = Phase::Switching {
                            cause: SwitchCause::Failure,
                        };
                    }
                    self.retune_pending = false;
                }
            },
        }
        Disposition::Applied
    }

    fn current_index_for(&self, site_id: &str) -> Option<usize> {
        self.current
            .filter(|&i| self.registry.at(i).is_some_and(|s| s.site_id == site_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ScanMode;
    use crate::scheduler::Step;
    use crate::site::tests::{registry, site};
    use crate::site::SiteRegistry;

    fn id(s: &str) -> SiteId {
        SiteId::try_from(s).unwrap()
    }

    /// Scanner already tuned to the first site at t=0.
    fn started(reg: SiteRegistry, mode: ScanMode) -> Scanner {
        let mut scanner = Scanner::new(reg, mode);
        assert!(matches!(scanner.poll(0), Step::Tune(_)));
        scanner
    }

    #[test]
    fn activity_kind_names() {
        assert_eq!(ActivityKind::from_name("tsbk"), Some(ActivityKind::Tsbk));
        assert_eq!(ActivityKind::from_name("voice"), Some(ActivityKind::Voice));
        assert_eq!(ActivityKind::from_name("data"), None);
        assert_eq!(ActivityKind::Voice.as_str(), "voice");
    }

    #[test]
    fn signals_before_first_tune_are_stale() {
        let mut scanner = Scanner::new(registry(&["a", "b"]), ScanMode::Fast);
        let d = scanner.apply_signal(&ScanSignal::activity(id("a"), ActivityKind::Tsbk), 0);
        assert_eq!(d, Disposition::Stale);
        assert!(scanner.registry().get("a").unwrap().last_activity_at().is_none());
    }

    #[test]
    fn signals_for_other_sites_are_dropped() {
        let mut scanner = started(registry(&["a", "b"]), ScanMode::Fast);
        let d = scanner.apply_signal(&ScanSignal::lock(id("b"), false), 10);
        assert_eq!(d, Disposition::Stale);
        assert_eq!(scanner.registry().get("b").unwrap().consecutive_failures(), 0);
        let d = scanner.apply_signal(&ScanSignal::activity(id("zzz"), ActivityKind::Voice), 10);
        assert_eq!(d, Disposition::Stale);
    }

    #[test]
    fn activity_moves_dwelling_to_locked_active() {
        let mut scanner = started(registry(&["a", "b"]), ScanMode::Priority);
        let d = scanner.apply_signal(&ScanSignal::activity(id("a"), ActivityKind::Tsbk), 100);
        assert_eq!(d, Disposition::Applied);
        assert_eq!(
            scanner.phase(),
            Phase::LockedActive {
                last_activity_at: 100
            }
        );
        let a = scanner.registry().get("a").unwrap();
        assert_eq!(a.last_activity_at(), Some(100));
        assert_eq!(a.last_activity_kind(), Some(ActivityKind::Tsbk));
        assert_eq!(a.priority_expires_at(), Some(2_600));
    }

    #[test]
    fn repeated_activity_refreshes_window_and_priority() {
        let mut scanner = started(registry(&["a", "b"]), ScanMode::Priority);
        scanner.apply_signal(&ScanSignal::activity(id("a"), ActivityKind::Tsbk), 100);
        scanner.apply_signal(&ScanSignal::activity(id("a"), ActivityKind::Voice), 300);
        assert_eq!(
            scanner.phase(),
            Phase::LockedActive {
                last_activity_at: 300
            }
        );
        let a = scanner.registry().get("a").unwrap();
        assert_eq!(a.priority_expires_at(), Some(2_800));
        assert_eq!(a.last_activity_kind(), Some(ActivityKind::Voice));
    }

    #[test]
    fn lock_success_resets_failures() {
        let mut reg = SiteRegistry::new();
        reg.push(site("a", &[1, 2, 3])).unwrap();
        reg.push(site("b", &[4])).unwrap();
        let mut scanner = started(reg, ScanMode::Fast);
        scanner.apply_signal(&ScanSignal::lock(id("a"), false), 10);
        assert_eq!(scanner.registry().get("a").unwrap().consecutive_failures(), 1);
        scanner.apply_signal(&ScanSignal::lock(id("a"), true), 20);
        let a = scanner.registry().get("a").unwrap();
        assert_eq!(a.consecutive_failures(), 0);
        assert_eq!(a.current_channel(), 2);
    }

    #[test]
    fn lock_failure_in_locked_active_restarts_dwell() {
        let mut reg = SiteRegistry::new();
        reg.push(site("a", &[1, 2])).unwrap();
        reg.push(site("b", &[3])).unwrap();
        let mut scanner = started(reg, ScanMode::Priority);
        scanner.apply_signal(&ScanSignal::activity(id("a"), ActivityKind::Tsbk), 100);
        scanner.apply_signal(&ScanSignal::lock(id("a"), false), 200);
        assert_eq!(scanner.phase(), Phase::Dwelling { since: 200 });
        match scanner.poll(200) {
            Step::Tune(req) => assert_eq!(req.frequency, 2),
            other => panic!("expected retune, got {other:?}"),
        }
    }

    #[test]
    fn exhaustion_triggers_switching() {
        let mut scanner = started(registry(&["a", "b"]), ScanMode::Fast);
        scanner.apply_signal(&ScanSignal::lock(id("a"), false), 50);
        assert_eq!(
            scanner.phase(),
            Phase::Switching {
                cause: SwitchCause::Failure
            }
        );
    }
}
