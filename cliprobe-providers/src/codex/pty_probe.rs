//! The Codex `/status` probe.
//!
//! Codex is launched read-only and untrusted so the probe can never make
//! it act on the working directory.

use cliprobe_core::ProviderKind;
use cliprobe_fetch::PtyOptions;

use super::parser::parse_status;
use super::script::{DEFAULT_ARGS, codex_escalation, status_script};
use crate::probe::CliProbe;

/// Creates the probe with default binary, flags and tiers.
pub fn codex_probe() -> CliProbe {
    CliProbe::new(
        ProviderKind::Codex,
        status_script(),
        PtyOptions::default().with_args(DEFAULT_ARGS.iter().copied()),
        codex_escalation(),
        parse_status,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let probe = codex_probe();
        assert_eq!(probe.binary(), "codex");
        assert_eq!(
            probe.base_options().extra_args,
            vec!["-s", "read-only", "-a", "untrusted"]
        );
        assert_eq!(probe.policy().tiers()[0].cols, 200);
    }

    #[test]
    fn test_configured_args_replace_defaults() {
        let probe = codex_probe().with_extra_args(["--profile", "work"]);
        assert_eq!(probe.base_options().extra_args, vec!["--profile", "work"]);
    }
}
