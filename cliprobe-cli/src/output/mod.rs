//! Output formatting for CLI.

mod envelope;
mod json;
mod text;

use cliprobe_core::ProviderKind;
use cliprobe_providers::ProbeRun;

pub use envelope::EnvelopeFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

/// What one provider's probe produced.
#[derive(Debug, Clone)]
pub struct ProviderReport {
    /// Provider probed.
    pub provider: ProviderKind,
    /// Result and capture.
    pub run: ProbeRun,
}
