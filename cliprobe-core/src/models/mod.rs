//! Domain models for `cliprobe`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider types (`ProviderKind`, identity, login method)
//! - [`usage`] - Usage types (`UsageSnapshot`, `RateWindow`, `Credits`)
//! - [`source`] - How the data was captured (`FetchSource`)

mod provider;
mod source;
mod usage;

// Re-export everything at the models level
pub use provider::{LoginMethod, ProviderIdentity, ProviderKind};
pub use source::FetchSource;
pub use usage::{Credits, RateWindow, UsageSnapshot};
#[cfg(test)]
mod serde_tests;
