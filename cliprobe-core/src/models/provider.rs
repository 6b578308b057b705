//! Which CLI was probed and who it is signed in as.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Interactive CLIs with a usage screen the engine knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Codex CLI, read through `/status`.
    Codex,
    /// Anthropic Claude CLI, read through `/usage`.
    Claude,
}

impl ProviderKind {
    /// Every supported CLI, in probe order.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::Codex, Self::Claude]
    }

    /// Name shown in text output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Codex => "Codex",
            Self::Claude => "Claude",
        }
    }

    /// Lowercase identifier used on the command line and in config files.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
        }
    }

    /// Executable looked up on `PATH` when no override is configured.
    pub fn binary_name(&self) -> &'static str {
        self.cli_name()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for ProviderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.cli_name() == needle)
            .ok_or_else(|| CoreError::UnknownProvider(s.to_string()))
    }
}

/// Account details printed on the usage screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// CLI the identity was read from.
    pub provider_id: ProviderKind,
    /// Signed-in email address.
    pub account_email: Option<String>,
    /// Organization, when the account belongs to one.
    pub account_organization: Option<String>,
    /// Plan or login label, e.g. "Claude Max Account".
    pub plan_name: Option<String>,
    /// Classified from the plan or login label.
    pub login_method: Option<LoginMethod>,
}

impl ProviderIdentity {
    /// An identity with nothing filled in.
    pub fn new(provider_id: ProviderKind) -> Self {
        Self {
            provider_id,
            account_email: None,
            account_organization: None,
            plan_name: None,
            login_method: None,
        }
    }

    /// True when the screen showed no account details at all.
    pub fn is_empty(&self) -> bool {
        self.account_email.is_none()
            && self.account_organization.is_none()
            && self.plan_name.is_none()
            && self.login_method.is_none()
    }
}

/// How the CLI is signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// Browser sign-in, e.g. "Sign in with `ChatGPT`".
    OAuth,
    /// API key or console billing.
    ApiKey,
    /// Paid plan account (Claude Pro/Max, `ChatGPT` Plus/Pro).
    Subscription,
}

impl LoginMethod {
    /// Classifies a "Login method: ..." label. API keys are checked first
    /// since console labels also mention an account.
    pub fn from_label(label: &str) -> Option<Self> {
        const SUBSCRIPTION: [&str; 6] = ["pro", "max", "plus", "team", "enterprise", "account"];

        let lower = label.to_lowercase();
        let has = |word: &str| lower.contains(word);
        if has("api key") || has("api_key") || has("console") {
            Some(Self::ApiKey)
        } else if SUBSCRIPTION.iter().any(|w| has(w)) {
            Some(Self::Subscription)
        } else if has("oauth") || has("chatgpt") {
            Some(Self::OAuth)
        } else {
            None
        }
    }
}
