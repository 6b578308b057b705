//! Serde serialization/deserialization tests for core types.

use chrono::{TimeZone, Utc};

use crate::{
    Credits, FetchSource, LoginMethod, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot,
};

#[test]
fn test_provider_kind_deserialize_lowercase() {
    let test_cases = vec![
        (r#""codex""#, ProviderKind::Codex),
        (r#""claude""#, ProviderKind::Claude),
    ];

    for (json, expected) in test_cases {
        let result: ProviderKind = serde_json::from_str(json).unwrap();
        assert_eq!(result, expected, "Failed for {}", json);
    }
}

#[test]
fn test_provider_kind_invalid_deserialize() {
    let result: Result<ProviderKind, _> = serde_json::from_str(r#""cursor""#);
    assert!(result.is_err());
}

#[test]
fn test_usage_snapshot_full_roundtrip() {
    let updated_at = Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap();
    let mut snapshot = UsageSnapshot::at(updated_at);

    snapshot.primary = Some(
        RateWindow::new(45.5)
            .with_window_minutes(300)
            .with_reset(
                Some(Utc.with_ymd_and_hms(2026, 1, 3, 15, 0, 0).unwrap()),
                Some("3pm".to_string()),
            ),
    );
    snapshot.credits = Some(Credits::new(112.45));
    snapshot.fetch_source = FetchSource::Tmux;

    let mut identity = ProviderIdentity::new(ProviderKind::Claude);
    identity.account_email = Some("user@example.com".to_string());
    identity.login_method = Some(LoginMethod::Subscription);
    snapshot.identity = Some(identity);

    let json = serde_json::to_string(&snapshot).unwrap();
    let deserialized: UsageSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(deserialized, snapshot);
}

#[test]
fn test_snapshot_omits_empty_optional_fields() {
    let snapshot = UsageSnapshot::new();
    let json = serde_json::to_string(&snapshot).unwrap();

    assert!(!json.contains("raw_text"));
    assert!(!json.contains("credits"));
    assert!(json.contains(r#""fetch_source":"pty""#));
}

#[test]
fn test_login_method_snake_case() {
    let json = serde_json::to_string(&LoginMethod::ApiKey).unwrap();
    assert_eq!(json, r#""api_key""#);
}
