//! Payment creation, verification and confirmation tracking for meme coin
//! deployments. Card checkout, hosted crypto charges and direct wallet
//! transfers share one router and one confirmation state machine.

pub mod chains;
pub mod config;
pub mod logging;
pub mod payments;
pub mod services;

#[cfg(feature = "server")]
pub mod api;
