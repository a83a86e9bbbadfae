/// Scan configuration loader.
///
/// Accepts the multi-site form:
///
/// ```json
/// { "sites": [ { "site_id": "site1", "name": "Downtown", "location": "Downtown Area",
///                "control_channel_list": "453.000,453.250" } ],
///   "scanning_mode": "priority" }
/// ```
///
/// and the legacy single-system form, where a top-level
/// `control_channel_list` becomes one site named `default`. Both normalize
/// into the same [`SiteRegistry`].
use core::fmt;

use heapless::{String, Vec};
use serde::Deserialize;

use crate::mode::ScanMode;
use crate::site::{Frequency, NameString, RegistryError, Site, SiteId, SiteRegistry, MAX_CHANNELS, MAX_SITES};

/// Site id used for the legacy single-system form
pub const LEGACY_SITE_ID: &str = "default";

/// Maximum length of one `control_channel_list` string
pub const MAX_CHANNEL_LIST_LEN: usize = 256;

type ChannelList = String<MAX_CHANNEL_LIST_LEN>;

#[derive(Deserialize)]
struct RawSite {
    #[serde(default)]
    site_id: Option<SiteId>,
    #[serde(default)]
    name: Option<NameString>,
    #[serde(default)]
    location: Option<NameString>,
    #[serde(default)]
    control_channel_list: Option<ChannelList>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    sites: Option<Vec<RawSite, MAX_SITES>>,
    #[serde(default)]
    scanning_mode: Option<String<16>>,
    #[serde(default)]
    control_channel_list: Option<ChannelList>,
}

/// Normalized configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub registry: SiteRegistry,
    pub mode: ScanMode,
}

#[derive(Debug)]
pub enum ConfigError {
    /// Malformed JSON, a string that overflows its field, or too many sites
    Json(serde_json_core::de::Error),
    /// A site entry without `site_id`
    MissingSiteId { index: usize },
    /// A site without any control channels
    NoChannels { site: SiteId },
    /// A frequency token that is not a positive number
    InvalidFrequency { site: SiteId },
    /// More than `MAX_CHANNELS` control channels on one site
    TooManyChannels { site: SiteId },
    /// Neither `sites` nor a top-level `control_channel_list`
    NoSites,
    Registry(RegistryError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "invalid configuration JSON: {e}"),
            ConfigError::MissingSiteId { index } => write!(f, "site #{index} has no site_id"),
            ConfigError::NoChannels { site } => write!(f, "site '{site}' has no control channels"),
            ConfigError::InvalidFrequency { site } => {
                write!(f, "site '{site}' has an invalid control channel frequency")
            }
            ConfigError::TooManyChannels { site } => {
                write!(f, "site '{site}' has more than {MAX_CHANNELS} control channels")
            }
            ConfigError::NoSites => write!(f, "no sites configured"),
            ConfigError::Registry(e) => write!(f, "{e}"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl From<RegistryError> for ConfigError {
    fn from(e: RegistryError) -> Self {
        ConfigError::Registry(e)
    }
}

/// Parse one frequency token. Tokens containing a decimal point are MHz
/// (rounded to the nearest Hz), anything else is an integer in Hz.
pub fn parse_frequency(token: &str) -> Option<Frequency> {
    let token = token.trim();
    if token.contains('.') {
        let mhz: f64 = token.parse().ok()?;
        let hz = mhz * 1_000_000.0;
        if !hz.is_finite() || hz < 0.5 || hz >= u32::MAX as f64 {
            return None;
        }
        Some((hz + 0.5) as Frequency)
    } else {
        match token.parse::<Frequency>() {
            Ok(0) | Err(_) => None,
            Ok(hz) => Some(hz),
        }
    }
}

/// Parse a comma-separated control channel list. Empty tokens are skipped.
pub fn parse_channel_list(
    site: &SiteId,
    list: &str,
) -> Result<Vec<Frequency, MAX_CHANNELS>, ConfigError> {
    let mut channels = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let freq = parse_frequency(token).ok_or_else(|| ConfigError::InvalidFrequency { site: site.clone() })?;
        channels
            .push(freq)
            .map_err(|_| ConfigError::TooManyChannels { site: site.clone() })?;
    }
    if channels.is_empty() {
        return Err(ConfigError::NoChannels { site: site.clone() });
    }
    Ok(channels)
}

fn site_id_name(site_id: &SiteId) -> NameString {
    let mut name = NameString::new();
    // SiteId is shorter than NameString
    let _ = name.push_str(site_id);
    name
}

fn build_site(index: usize, raw: RawSite) -> Result<Site, ConfigError> {
    let site_id = raw
        .site_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ConfigError::MissingSiteId { index })?;
    let list = raw
        .control_channel_list
        .ok_or_else(|| ConfigError::NoChannels { site: site_id.clone() })?;
    let channels = parse_channel_list(&site_id, &list)?;
    let name = raw.name.unwrap_or_else(|| site_id_name(&site_id));
    Ok(Site::new(site_id, name, raw.location, channels))
}

fn parse_mode(name: Option<&str>) -> ScanMode {
    match name {
        None => ScanMode::default(),
        Some(name) => ScanMode::from_name(name).unwrap_or_else(|| {
            log::warn!("Unknown scanning mode '{}', using {}", name, ScanMode::default());
            ScanMode::default()
        }),
    }
}

/// Parse and normalize a JSON configuration.
pub fn load(bytes: &[u8]) -> Result<ScanConfig, ConfigError> {
    let (raw, _) = serde_json_core::from_slice::<RawConfig>(bytes).map_err(ConfigError::Json)?;
    let mode = parse_mode(raw.scanning_mode.as_deref());
    let mut registry = SiteRegistry::new();

    match raw.sites.filter(|sites| !sites.is_empty()) {
        Some(sites) => {
            if raw.control_channel_list.is_some() {
                log::debug!("Ignoring top-level control_channel_list, sites are configured");
            }
            for (index, raw_site) in sites.into_iter().enumerate() {
                registry.push(build_site(index, raw_site)?)?;
            }
        }
        None => {
            let list = raw.control_channel_list.ok_or(ConfigError::NoSites)?;
            let site_id = SiteId::try_from(LEGACY_SITE_ID).map_err(|_| ConfigError::NoSites)?;
            let channels = parse_channel_list(&site_id, &list)?;
            let name = site_id_name(&site_id);
            registry.push(Site::new(site_id, name, None, channels))?;
        }
    }

    log::info!(
        "Loaded {} site(s), scanning mode {}",
        registry.len(),
        mode
    );
    Ok(ScanConfig { registry, mode })
}
