//! Envelope output: the flat objects the tmux-era scripts printed.
//!
//! ```json
//! {"ok":true,"session_5h":42.0,"week_all_models":17.0,"week_opus":null,
//!  "account_email":"dev@example.com","account_org":null,
//!  "pane_preview":"...","stdout_b64":"...","stderr_b64":""}
//! {"ok":false,"error":"auth_required","hint":"...","pane_preview":"...",
//!  "stdout_b64":"...","stderr_b64":""}
//! ```
//!
//! Percentages are percent used. The terminal merges both output streams,
//! so `stderr_b64` is always empty.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use super::ProviderReport;
use super::json::JsonFormatter;

/// Trailing pane lines kept in `pane_preview`.
const PANE_PREVIEW_LINES: usize = 20;

/// One envelope.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Parsed successfully.
    Success {
        ok: bool,
        session_5h: Option<f64>,
        week_all_models: Option<f64>,
        week_opus: Option<f64>,
        account_email: Option<String>,
        account_org: Option<String>,
        pane_preview: String,
        stdout_b64: String,
        stderr_b64: String,
    },
    /// Probe failed.
    Failure {
        ok: bool,
        error: String,
        hint: String,
        pane_preview: String,
        stdout_b64: String,
        stderr_b64: String,
    },
}

impl Envelope {
    /// Builds the envelope of one report.
    pub fn from_report(report: &ProviderReport) -> Self {
        let capture = report.run.capture.as_ref();
        let pane_preview = capture.map(|c| pane_preview(c.text())).unwrap_or_default();
        let stdout_b64 = capture
            .map(|c| STANDARD.encode(&c.report.raw))
            .unwrap_or_default();

        match &report.run.result {
            Ok(snapshot) => {
                let identity = snapshot.identity.as_ref();
                Self::Success {
                    ok: true,
                    session_5h: snapshot.primary.as_ref().map(|w| w.used_percent),
                    week_all_models: snapshot.secondary.as_ref().map(|w| w.used_percent),
                    week_opus: snapshot.tertiary.as_ref().map(|w| w.used_percent),
                    account_email: identity.and_then(|i| i.account_email.clone()),
                    account_org: identity.and_then(|i| i.account_organization.clone()),
                    pane_preview,
                    stdout_b64,
                    stderr_b64: String::new(),
                }
            }
            Err(e) => Self::Failure {
                ok: false,
                error: e.code().to_string(),
                hint: e.hint().to_string(),
                pane_preview,
                stdout_b64,
                stderr_b64: String::new(),
            },
        }
    }
}

/// Last non-blank lines of the pane, trailing whitespace trimmed.
pub(crate) fn pane_preview(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(PANE_PREVIEW_LINES);
    lines[start..].join("\n")
}

/// Envelope formatter.
pub struct EnvelopeFormatter {
    json: JsonFormatter,
}

impl EnvelopeFormatter {
    /// Creates a new envelope formatter.
    pub fn new(pretty: bool) -> Self {
        Self {
            json: JsonFormatter::new(pretty),
        }
    }

    /// One envelope for one provider, else an array.
    pub fn format_reports(&self, reports: &[ProviderReport]) -> Result<String> {
        let envelopes: Vec<Envelope> = reports.iter().map(Envelope::from_report).collect();
        match envelopes.as_slice() {
            [single] => self.json.format(single),
            _ => self.json.format(&envelopes),
        }
    }
}
