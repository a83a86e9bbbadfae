/// Scanning mode profiles.
///
/// Each mode is a fixed timing policy. The active profile is held as a
/// `&'static ModeProfile`; changing modes swaps the whole reference.
use core::fmt;

use serde::Serialize;

/// Priority window length as a multiple of the activity window
pub const PRIORITY_EXPIRY_FACTOR: u32 = 10;

/// Named scanning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Sub-second dwell, maximum sites per second
    #[default]
    Fast,
    /// Balanced dwell that favors recently active sites
    Priority,
    /// Long dwell for weak or slow-to-lock sites
    Thorough,
}

impl ScanMode {
    pub const ALL: [ScanMode; 3] = [ScanMode::Fast, ScanMode::Priority, ScanMode::Thorough];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Fast => "fast",
            ScanMode::Priority => "priority",
            ScanMode::Thorough => "thorough",
        }
    }

    /// Parse a mode name, ignoring ASCII case and surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(name))
    }

    pub fn profile(self) -> &'static ModeProfile {
        match self {
            ScanMode::Fast => &FAST,
            ScanMode::Priority => &PRIORITY,
            ScanMode::Thorough => &THOROUGH,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing parameters for one scanning mode. All durations in milliseconds.
#[derive(Debug, PartialEq, Eq)]
pub struct ModeProfile {
    pub mode: ScanMode,
    /// Longest time to wait on a site with no activity
    pub dwell_timeout_ms: u32,
    /// Activity must recur within this window to hold a site
    pub activity_window_ms: u32,
    /// Minimum time between two retunes
    pub switch_delay_ms: u32,
}

impl ModeProfile {
    /// How long an active site keeps its priority after its last activity.
    pub const fn priority_expiry_ms(&self) -> u32 {
        self.activity_window_ms * PRIORITY_EXPIRY_FACTOR
    }
}

pub static FAST: ModeProfile = ModeProfile {
    mode: ScanMode::Fast,
    dwell_timeout_ms: 400,
    activity_window_ms: 80,
    switch_delay_ms: 30,
};

pub static PRIORITY: ModeProfile = ModeProfile {
    mode: ScanMode::Priority,
    dwell_timeout_ms: 1_000,
    activity_window_ms: 250,
    switch_delay_ms: 100,
};

pub static THOROUGH: ModeProfile = ModeProfile {
    mode: ScanMode::Thorough,
    dwell_timeout_ms: 8_000,
    activity_window_ms: 2_000,
    switch_delay_ms: 500,
};
