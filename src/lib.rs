//! SiteHound library: multi-site P25 control-channel scan scheduler.
//!
//! Rotates a single tunable receiver across a set of trunking sites, hunts
//! through each site's control channels, holds on sites that show activity
//! and favors recently active sites. All decisions are made by a
//! deterministic state machine driven by explicit timestamps, testable on
//! any host with `cargo test`. Binaries (the `sitehound-daemon` bridge,
//! embedded firmware) are thin consumers that provide the tuner and the
//! signal feed.
//!
//! The library is organized in two code layers:
//! - **Layer 1**: `site`, `hunt`, `mode`, `rotation`, `scheduler`,
//!   `monitor`, `telemetry`, `status`, `config`, `protocol`, `comm`.
//!   `no_std`, no allocator.
//! - **Layer 2** (feature `runtime`): `runtime`, the async scan loop on
//!   embassy primitives. Feature `std` adds the std time driver.

#![cfg_attr(not(test), no_std)]

pub mod comm;
pub mod config;
pub mod hunt;
pub mod mode;
pub mod monitor;
pub mod protocol;
pub mod rotation;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod scheduler;
pub mod site;
pub mod status;
pub mod telemetry;
