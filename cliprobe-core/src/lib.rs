// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `cliprobe` Core
//!
//! Core types and models shared by the `cliprobe` crates.
//!
//! Everything in here is plain data: the probe engine in `cliprobe-fetch`
//! produces these values and the CLI renders them.
//!
//! ## Key Types
//!
//! ### Usage Types
//! - [`UsageSnapshot`] - One probe result with up to three rate windows
//! - [`RateWindow`] - A single quota period (session, weekly, premium tier)
//! - [`Credits`] - Credit balance (Codex)
//!
//! ### Provider Types
//! - [`ProviderKind`] - The two interactive CLIs that can be probed
//! - [`ProviderIdentity`] - Account identity scraped from the CLI
//! - [`LoginMethod`] - How the CLI is signed in
//!
//! ### Fetch
//! - [`FetchSource`] - Which transport captured the data

pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Provider types
    LoginMethod,
    ProviderIdentity,
    ProviderKind,
    // Usage types
    Credits,
    RateWindow,
    UsageSnapshot,
    // Fetch
    FetchSource,
};
