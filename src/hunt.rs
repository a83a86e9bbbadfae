/// Control-channel hunting within one site.
///
/// A failed lock advances the site's channel cursor and asks for a retune
/// to the next channel. Once every channel in the list has failed since the
/// last success the site is reported exhausted and the scheduler moves on.
/// A successful lock is sticky: the cursor stays on the known-good channel.
use crate::site::{Frequency, Site};

/// What the scheduler should do after a failed lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuntOutcome {
    /// Retune to the next control channel of the same site
    Retune(Frequency),
    /// Every channel has failed, leave the site
    Exhausted,
}

/// Apply a failed lock on the site's current channel.
pub fn on_lock_failure(site: &mut Site) -> HuntOutcome {
    site.consecutive_failures += 1;
    site.channel_index = (site.channel_index + 1) % site.control_channels.len();

    if site.is_exhausted() {
        HuntOutcome::Exhausted
    } else {
        HuntOutcome::Retune(site.current_channel())
    }
}

/// Apply a successful lock. The channel cursor is left where it is.
pub fn on_lock_success(site: &mut Site) {
    site.consecutive_failures = 0;
}
