//! Integration tests for the business rules manager

use std::path::PathBuf;

use rust_decimal_macros::dec;
use serde_json::json;

use core_kernel::{Context, ErrorKind};
use domain_rules::{BusinessRules, RulesError, RulesManager, RulesSection};

fn temp_rules_path(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("business_rules_{}.{}", uuid::Uuid::new_v4(), extension))
}

// ============================================================================
// Loading Tests
// ============================================================================

mod loading_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let ctx = Context::background();
        let manager = RulesManager::from_file(&ctx, temp_rules_path("json")).await.unwrap();
        let rules = manager.get_config();
        assert_eq!(rules.policy_lifecycle.renewal_window_days, 30);
        assert_eq!(rules.pricing.base_rate("auto"), dec!(15));
    }

    #[tokio::test]
    async fn test_json_file_overrides_defaults() {
        let path = temp_rules_path("json");
        std::fs::write(
            &path,
            r#"{
                "version": "2024.06",
                "claim_processing": { "senior_review_threshold": 40000 },
                "fraud_detection": { "weekend_multiplier": 1.8 }
            }"#,
        )
        .unwrap();

        let manager = RulesManager::from_file(&Context::background(), &path).await.unwrap();
        let rules = manager.get_config();
        assert_eq!(rules.version, "2024.06");
        assert_eq!(rules.claim_processing.senior_review_threshold, dec!(40000));
        assert_eq!(rules.claim_processing.executive_approval_threshold, dec!(100000));
        assert_eq!(rules.fraud_detection.weekend_multiplier, 1.8);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_reload_picks_up_file_changes() {
        let path = temp_rules_path("json");
        std::fs::write(&path, r#"{"version": "1"}"#).unwrap();
        let ctx = Context::background();
        let manager = RulesManager::from_file(&ctx, &path).await.unwrap();

        std::fs::write(&path, r#"{"version": "2", "policy_lifecycle": {"grace_period_days": 20}}"#).unwrap();
        manager.load_config(&ctx).await.unwrap();

        assert_eq!(manager.get_metadata().version, "2");
        assert_eq!(manager.get_config().policy_lifecycle.grace_period_days, 20);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_invalid_file_on_reload_keeps_previous() {
        let path = temp_rules_path("json");
        std::fs::write(&path, r#"{"version": "1"}"#).unwrap();
        let ctx = Context::background();
        let manager = RulesManager::from_file(&ctx, &path).await.unwrap();

        std::fs::write(&path, r#"{"version": "2", "fraud_detection": {"thresholds": {"low": 90}}}"#).unwrap();
        let err = manager.load_config(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(manager.get_metadata().version, "1");
        std::fs::remove_file(path).ok();
    }
}

// ============================================================================
// Update Tests
// ============================================================================

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_section_replaces_only_that_section() {
        let manager = RulesManager::with_defaults();
        let ctx = Context::background();
        let mut lifecycle = manager.get_section(RulesSection::PolicyLifecycle).unwrap();
        lifecycle["grace_period_days"] = json!(10);

        manager
            .update_section(&ctx, RulesSection::PolicyLifecycle, lifecycle)
            .await
            .unwrap();

        let rules = manager.get_config();
        assert_eq!(rules.policy_lifecycle.grace_period_days, 10);
        assert_eq!(rules.policy_lifecycle.renewal_window_days, 30);
        assert_eq!(rules.pricing, BusinessRules::default().pricing);
    }

    #[tokio::test]
    async fn test_invalid_section_update_rejected() {
        let manager = RulesManager::with_defaults();
        let result = manager
            .update_section(
                &Context::background(),
                RulesSection::RiskAssessment,
                json!({ "level_thresholds": { "medium": 70, "high": 60, "very_high": 80 } }),
            )
            .await;

        assert!(matches!(result, Err(RulesError::Invalid { section: "risk_assessment", .. })));
        assert_eq!(manager.get_config().risk_assessment.level_thresholds.medium, 40.0);
    }

    #[tokio::test]
    async fn test_update_stamps_last_updated() {
        let manager = RulesManager::with_defaults();
        let before = manager.get_metadata().last_updated;
        let mut candidate = BusinessRules::default();
        candidate.last_updated = before - chrono::Duration::days(10);

        let installed = manager.update_config(&Context::background(), candidate).await.unwrap();

        assert!(installed.last_updated >= before);
    }

    #[test]
    fn test_unknown_section_is_not_found() {
        let err = "payments".parse::<RulesSection>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
