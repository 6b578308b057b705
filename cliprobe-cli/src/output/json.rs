//! JSON output formatting.
//!
//! Field names are camelCase. Absent values are omitted rather than
//! written as `null`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use cliprobe_core::{ProviderIdentity, RateWindow, UsageSnapshot};
use cliprobe_fetch::ProbeError;
use serde::Serialize;

use super::ProviderReport;

/// One provider's entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutput {
    pub provider: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<&'static str>,
    #[serde(flatten)]
    pub usage: Option<UsageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput>,
}

/// Parsed limits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    pub captured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountOutput>,
}

/// One rate window.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowOutput {
    pub used_percent: f64,
    pub remaining_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    /// Reset text as the CLI printed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_text: Option<String>,
}

impl From<&RateWindow> for WindowOutput {
    fn from(window: &RateWindow) -> Self {
        Self {
            used_percent: window.used_percent,
            remaining_percent: window.remaining_percent(),
            window_minutes: window.window_minutes,
            resets_at: window.resets_at,
            resets_text: window.reset_description.clone(),
        }
    }
}

/// Who the CLI is signed in as.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

impl From<&ProviderIdentity> for AccountOutput {
    fn from(identity: &ProviderIdentity) -> Self {
        Self {
            email: identity.account_email.clone(),
            organization: identity.account_organization.clone(),
            plan: identity.plan_name.clone(),
        }
    }
}

/// A classified failure and what to do about it.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub code: &'static str,
    pub message: String,
    pub hint: &'static str,
}

impl From<&ProbeError> for ErrorOutput {
    fn from(err: &ProbeError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            hint: err.hint(),
        }
    }
}

impl From<&UsageSnapshot> for UsageOutput {
    fn from(snapshot: &UsageSnapshot) -> Self {
        Self {
            captured_at: snapshot.updated_at,
            session: snapshot.primary.as_ref().map(Into::into),
            weekly: snapshot.secondary.as_ref().map(Into::into),
            premium: snapshot.tertiary.as_ref().map(Into::into),
            credits: snapshot.credits.as_ref().map(|c| c.remaining),
            account: snapshot
                .identity
                .as_ref()
                .filter(|i| !i.is_empty())
                .map(Into::into),
        }
    }
}

impl From<&ProviderReport> for ProviderOutput {
    fn from(report: &ProviderReport) -> Self {
        let transport = report.run.capture.as_ref().map(|c| c.source.label());
        match &report.run.result {
            Ok(snapshot) => Self {
                provider: report.provider.cli_name(),
                ok: true,
                transport: Some(snapshot.fetch_source.label()),
                usage: Some(snapshot.into()),
                error: None,
            },
            Err(e) => Self {
                provider: report.provider.cli_name(),
                ok: false,
                transport,
                usage: None,
                error: Some(e.into()),
            },
        }
    }
}

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// One object for one provider, else an array.
    pub fn format_reports(&self, reports: &[ProviderReport]) -> Result<String> {
        let outputs: Vec<ProviderOutput> = reports.iter().map(Into::into).collect();
        match outputs.as_slice() {
            [single] => self.format(single),
            all => self.format(all),
        }
    }
}
