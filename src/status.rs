/// Status snapshot builder.
///
/// A snapshot is an owned copy of everything an operator UI needs, taken
/// from `&Scanner` in one call so it never mixes state from two loop
/// iterations.
use heapless::Vec;
use serde::Serialize;

use crate::mode::ScanMode;
use crate::scheduler::Scanner;
use crate::site::{Frequency, Millis, NameString, Site, SiteId, MAX_SITES};

/// Per-site health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStatus {
    pub site_id: SiteId,
    pub name: NameString,
    pub location: Option<NameString>,
    pub consecutive_failures: u32,
    pub is_priority: bool,
    /// Seconds since the last activity, `null` if never active
    pub last_activity_age_seconds: Option<f32>,
    pub current_channel: Frequency,
    pub exhausted: bool,
}

/// Rotation statistics and the active timing profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanningStats {
    pub mode: ScanMode,
    pub sites_per_second: f32,
    pub switch_count: u32,
    pub priority_sites: u32,
    /// Dwell timeout in seconds
    pub scan_timeout: f32,
    /// Activity window in seconds
    pub activity_threshold: f32,
    /// Settle delay in seconds
    pub switch_delay: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub multi_site_scanning: bool,
    pub current_site_id: Option<SiteId>,
    pub current_site_name: Option<NameString>,
    pub current_frequency: Option<Frequency>,
    /// Scheduler phase: "idle", "dwelling", "locked_active", "switching"
    pub state: &'static str,
    pub site_switch_count: u32,
    pub sites_configured: u32,
    pub sites: Vec<SiteStatus, MAX_SITES>,
    pub scanning_stats: ScanningStats,
}

fn seconds(ms: u32) -> f32 {
    ms as f32 / 1000.0
}

impl SiteStatus {
    fn from_site(site: &Site, now: Millis) -> Self {
        Self {
            site_id: site.site_id.clone(),
            name: site.name.clone(),
            location: site.location.clone(),
            consecutive_failures: site.consecutive_failures() as u32,
            is_priority: site.has_priority(now),
            last_activity_age_seconds: site
                .last_activity_at()
                .map(|t| now.saturating_sub(t) as f32 / 1000.0),
            current_channel: site.current_channel(),
            exhausted: site.is_exhausted(),
        }
    }
}

impl Scanner {
    /// Build a status snapshot as of `now`.
    pub fn snapshot(&self, now: Millis) -> StatusSnapshot {
        let current = self.current_site();
        let profile = self.profile();
        let switch_count = self.telemetry().switch_count();

        let mut sites = Vec::new();
        for site in self.registry().iter() {
            // Registry and snapshot share the same capacity
            let _ = sites.push(SiteStatus::from_site(site, now));
        }

        StatusSnapshot {
            multi_site_scanning: self.multi_site(),
            current_site_id: current.map(|s| s.site_id.clone()),
            current_site_name: current.map(|s| s.name.clone()),
            current_frequency: current.map(Site::current_channel),
            state: self.phase().as_str(),
            site_switch_count: switch_count,
            sites_configured: self.registry().len() as u32,
            sites,
            scanning_stats: ScanningStats {
                mode: profile.mode,
                sites_per_second: self.telemetry().sites_per_second(now),
                switch_count,
                priority_sites: self.registry().priority_count(now) as u32,
                scan_timeout: seconds(profile.dwell_timeout_ms),
                activity_threshold: seconds(profile.activity_window_ms),
                switch_delay: seconds(profile.switch_delay_ms),
            },
        }
    }
}

/// Render a snapshot as JSON into `buf`. Returns the length written, or
/// `None` if the buffer is too small.
pub fn serialize_status(status: &StatusSnapshot, buf: &mut [u8]) -> Option<usize> {
    serde_json_core::to_slice(status, buf).ok()
}
