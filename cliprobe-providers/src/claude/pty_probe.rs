//! The Claude `/usage` probe.
//!
//! Runs `claude` in a PTY, types `/usage`, waits for the session and weekly
//! blocks and parses them. Escalates once to a larger screen on a timeout
//! or an unparseable capture.

use cliprobe_core::ProviderKind;
use cliprobe_fetch::PtyOptions;

use super::parser::parse_usage;
use super::script::{claude_escalation, usage_script};
use crate::probe::CliProbe;

/// Creates the probe with default binary, flags and tiers.
pub fn claude_probe() -> CliProbe {
    CliProbe::new(
        ProviderKind::Claude,
        usage_script(),
        PtyOptions::default(),
        claude_escalation(),
        parse_usage,
    )
}

#[cfg(test)]
mod tests {
    use cliprobe_core::FetchSource;

    use super::*;

    #[test]
    fn test_defaults() {
        let probe = claude_probe();
        assert_eq!(probe.binary(), "claude");
        assert_eq!(probe.script().command, "/usage");
        assert!(probe.base_options().extra_args.is_empty());
        assert_eq!(probe.source(), FetchSource::Pty);
        assert_eq!(probe.policy().tiers().len(), 2);
    }
}
