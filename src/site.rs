/// Site registry: the candidate trunking sites and their runtime health.
///
/// Site identity and control-channel lists are fixed once the registry is
/// built from configuration. Failure counters, activity timestamps and
/// priority flags are updated by the scheduler as it visits sites.
use core::fmt;

use heapless::{String, Vec};

use crate::monitor::ActivityKind;

/// Maximum number of sites in one registry
pub const MAX_SITES: usize = 16;

/// Maximum number of control channels per site
pub const MAX_CHANNELS: usize = 16;

/// Site identifier ("site1", "default", ...)
pub type SiteId = String<32>;

/// Display name / location string
pub type NameString = String<48>;

/// Frequency in Hz
pub type Frequency = u32;

/// Monotonic timestamp in milliseconds
pub type Millis = u64;

/// Reasons a site cannot be added to a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The site has no control channels
    EmptyChannelList(SiteId),
    /// Another site already uses this id
    DuplicateSiteId(SiteId),
    /// The registry already holds `MAX_SITES` sites
    Full,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::EmptyChannelList(id) => write!(f, "site '{id}' has no control channels"),
            RegistryError::DuplicateSiteId(id) => write!(f, "duplicate site id '{id}'"),
            RegistryError::Full => write!(f, "too many sites (max {MAX_SITES})"),
        }
    }
}

impl core::error::Error for RegistryError {}

/// One trunking site: a named group of control channels plus its
/// runtime health.
#[derive(Debug, Clone)]
pub struct Site {
    pub site_id: SiteId,
    pub name: NameString,
    pub location: Option<NameString>,
    pub(crate) control_channels: Vec<Frequency, MAX_CHANNELS>,
    pub(crate) channel_index: usize,
    pub(crate) consecutive_failures: usize,
    pub(crate) last_activity_at: Option<Millis>,
    pub(crate) last_activity_kind: Option<ActivityKind>,
    pub(crate) is_priority: bool,
    pub(crate) priority_expires_at: Millis,
}

impl Site {
    /// Sites are only built by the config loader. [`SiteRegistry::push`]
    /// rejects an empty channel list, so every site reachable from a
    /// registry has at least one channel.
    pub(crate) fn new(
        site_id: SiteId,
        name: NameString,
        location: Option<NameString>,
        control_channels: Vec<Frequency, MAX_CHANNELS>,
    ) -> Self {
        Self {
            site_id,
            name,
            location,
            control_channels,
            channel_index: 0,
            consecutive_failures: 0,
            last_activity_at: None,
            last_activity_kind: None,
            is_priority: false,
            priority_expires_at: 0,
        }
    }

    /// Control channels in hunting order.
    pub fn control_channels(&self) -> &[Frequency] {
        &self.control_channels
    }

    pub fn channel_index(&self) -> usize {
        self.channel_index
    }

    /// Frequency of the channel the hunter currently points at.
    pub fn current_channel(&self) -> Frequency {
        self.control_channels[self.channel_index]
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// True once every control channel has failed to lock in this pass.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.control_channels.len()
    }

    pub fn last_activity_at(&self) -> Option<Millis> {
        self.last_activity_at
    }

    pub fn last_activity_kind(&self) -> Option<ActivityKind> {
        self.last_activity_kind
    }

    /// Whether the site's priority window is still open at `now`.
    pub fn has_priority(&self, now: Millis) -> bool {
        self.is_priority && now < self.priority_expires_at
    }

    pub fn priority_expires_at(&self) -> Option<Millis> {
        self.is_priority.then_some(self.priority_expires_at)
    }

    /// Record protocol activity and open (or extend) the priority window.
    pub(crate) fn record_activity(&mut self, kind: ActivityKind, now: Millis, expiry_ms: u32) {
        self.last_activity_at = Some(now);
        self.last_activity_kind = Some(kind);
        self.is_priority = true;
        self.priority_expires_at = now + expiry_ms as Millis;
    }

    /// Drop the priority flag once its window has passed.
    pub(crate) fn expire_priority(&mut self, now: Millis) {
        if self.is_priority && now >= self.priority_expires_at {
            self.is_priority = false;
        }
    }
}

/// Ordered collection of sites. Configuration order is rotation order.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<Site, MAX_SITES>,
}

impl SiteRegistry {
    pub const fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Append a site, enforcing the registry invariants.
    pub fn push(&mut self, site: Site) -> Result<(), RegistryError> {
        if site.control_channels.is_empty() {
            return Err(RegistryError::EmptyChannelList(site.site_id));
        }
        if self.position(&site.site_id).is_some() {
            return Err(RegistryError::DuplicateSiteId(site.site_id));
        }
        self.sites.push(site).map_err(|_| RegistryError::Full)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Site> {
        self.sites.iter()
    }

    pub fn get(&self, site_id: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.site_id == site_id)
    }

    pub fn position(&self, site_id: &str) -> Option<usize> {
        self.sites.iter().position(|s| s.site_id == site_id)
    }

    pub fn at(&self, index: usize) -> Option<&Site> {
        self.sites.get(index)
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut Site> {
        self.sites.get_mut(index)
    }

    pub(crate) fn expire_priorities(&mut self, now: Millis) {
        for site in self.sites.iter_mut() {
            site.expire_priority(now);
        }
    }

    /// Number of sites with an open priority window at `now`.
    pub fn priority_count(&self, now: Millis) -> usize {
        self.sites.iter().filter(|s| s.has_priority(now)).count()
    }

    pub fn all_exhausted(&self) -> bool {
        !self.sites.is_empty() && self.sites.iter().all(Site::is_exhausted)
    }

    /// Global failure reset. Every site becomes eligible again.
    pub(crate) fn reset_failures(&mut self) {
        for site in self.sites.iter_mut() {
            site.consecutive_failures = 0;
        }
    }
}
