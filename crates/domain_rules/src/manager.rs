//! Rules manager
//!
//! Owns the current [`BusinessRules`] snapshot. Reads clone an `Arc` under a
//! short read lock; writers validate a full candidate first and only then
//! take the write lock to swap the pointer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use core_kernel::Context;

use crate::error::RulesError;
use crate::rules::{BusinessRules, RulesSection};
use crate::validation::validate_rules;

/// Version information of the active snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RulesMetadata {
    pub version: String,
    pub last_updated: DateTime<Utc>,
}

/// Holder of the process-wide rules snapshot
pub struct RulesManager {
    current: RwLock<Arc<BusinessRules>>,
    source: Option<PathBuf>,
}

impl RulesManager {
    /// Creates a manager around a validated snapshot, with no backing file
    pub fn new(rules: BusinessRules) -> Result<Self, RulesError> {
        validate_rules(&rules)?;
        Ok(Self {
            current: RwLock::new(Arc::new(rules)),
            source: None,
        })
    }

    /// Creates a manager with the built-in defaults
    pub fn with_defaults() -> Self {
        Self {
            current: RwLock::new(Arc::new(BusinessRules::default())),
            source: None,
        }
    }

    /// Creates a manager backed by a rules file
    ///
    /// A missing file leaves the built-in defaults in place; a file that
    /// exists but fails to parse or validate is an error.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Cancellation context for the initial read
    /// * `path` - JSON, YAML or TOML rules file
    pub async fn from_file(ctx: &Context, path: impl Into<PathBuf>) -> Result<Self, RulesError> {
        let manager = Self {
            current: RwLock::new(Arc::new(BusinessRules::default())),
            source: Some(path.into()),
        };
        manager.load_config(ctx).await?;
        Ok(manager)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns the current snapshot
    pub fn get_config(&self) -> Arc<BusinessRules> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Checks a candidate without installing it
    pub fn validate_config(&self, candidate: &BusinessRules) -> Result<(), RulesError> {
        validate_rules(candidate)
    }

    pub fn get_metadata(&self) -> RulesMetadata {
        let rules = self.get_config();
        RulesMetadata {
            version: rules.version.clone(),
            last_updated: rules.last_updated,
        }
    }

    /// Returns one section of the current snapshot as JSON
    pub fn get_section(&self, section: RulesSection) -> Result<Value, RulesError> {
        let mut whole = serde_json::to_value(&*self.get_config())?;
        whole
            .get_mut(section.as_str())
            .map(Value::take)
            .ok_or_else(|| RulesError::MissingField(section.to_string()))
    }

    /// Validates `candidate` and makes it the current snapshot
    ///
    /// `last_updated` is stamped with the swap time. On error the previous
    /// snapshot stays current.
    #[instrument(skip(self, ctx, candidate), fields(version = %candidate.version))]
    pub async fn update_config(
        &self,
        ctx: &Context,
        mut candidate: BusinessRules,
    ) -> Result<Arc<BusinessRules>, RulesError> {
        ctx.check()?;
        validate_rules(&candidate)?;
        candidate.last_updated = Utc::now();
        let snapshot = Arc::new(candidate);
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Arc::clone(&snapshot);
        }
        info!(version = %snapshot.version, "Business rules updated");
        Ok(snapshot)
    }

    /// Replaces a single section, validating the resulting whole snapshot
    #[instrument(skip(self, ctx, value), fields(section = %section))]
    pub async fn update_section(
        &self,
        ctx: &Context,
        section: RulesSection,
        value: Value,
    ) -> Result<Arc<BusinessRules>, RulesError> {
        let mut whole = serde_json::to_value(&*self.get_config())?;
        match whole.as_object_mut() {
            Some(map) => {
                map.insert(section.as_str().to_string(), value);
            }
            None => return Err(RulesError::Parse("rules snapshot is not an object".to_string())),
        }
        let candidate: BusinessRules = serde_json::from_value(whole)?;
        self.update_config(ctx, candidate).await
    }

    /// Re-reads the backing file and swaps it in
    ///
    /// Without a backing file, or when the file is missing, the built-in
    /// defaults are installed.
    #[instrument(skip(self, ctx))]
    pub async fn load_config(&self, ctx: &Context) -> Result<Arc<BusinessRules>, RulesError> {
        ctx.check()?;
        let candidate = match &self.source {
            Some(path) if path.exists() => {
                let path = path.clone();
                let read = tokio::task::spawn_blocking(move || read_rules_file(&path));
                ctx.run(read)
                    .await?
                    .map_err(|e| RulesError::Load(e.to_string()))??
            }
            Some(path) => {
                warn!(path = %path.display(), "Rules file not found; using built-in defaults");
                BusinessRules::default()
            }
            None => BusinessRules::default(),
        };
        self.update_config(ctx, candidate).await
    }
}

impl Default for RulesManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn read_rules_file(path: &Path) -> Result<BusinessRules, RulesError> {
    let rules = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize::<BusinessRules>()?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_update_keeps_previous_snapshot() {
        let manager = RulesManager::with_defaults();
        let before = manager.get_config();

        let mut candidate = BusinessRules::default();
        candidate.fraud_detection.factor_weights.claim_timing = -1.0;
        assert!(manager.update_config(&Context::background(), candidate).await.is_err());

        assert!(Arc::ptr_eq(&before, &manager.get_config()));
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_across_updates() {
        let manager = RulesManager::with_defaults();
        let snapshot = manager.get_config();

        let candidate = BusinessRules {
            version: "2.0.0".to_string(),
            ..BusinessRules::default()
        };
        manager.update_config(&Context::background(), candidate).await.unwrap();

        assert_eq!(snapshot.version, "1.0.0");
        assert_eq!(manager.get_metadata().version, "2.0.0");
    }

    #[tokio::test]
    async fn test_cancelled_update_is_rejected() {
        let manager = RulesManager::with_defaults();
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        let result = manager.update_config(&ctx, BusinessRules::default()).await;
        assert!(matches!(result, Err(RulesError::Cancelled(_))));
    }
}
