use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{RestartError, Result};
use crate::models::ServiceConfig;

/// Owns the live configuration and its backing JSON document.
///
/// Reads take a short-lived read lock; updates hold the write lock only for
/// the merge and the save, never across a restart.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<ServiceConfig>,
}

impl ConfigStore {
    /// Load (or create) the document at `path` and check its invariants.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = load(&path).await?;
        config.validate()?;
        Ok(Self::with_config(path, config))
    }

    pub fn with_config(path: impl Into<PathBuf>, config: ServiceConfig) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub async fn get(&self) -> ServiceConfig {
        self.current.read().await.clone()
    }

    /// Deep-merge `partial` into the current configuration, validate, persist.
    ///
    /// Nothing changes, in memory or on disk, unless every step succeeds.
    pub async fn update(&self, partial: Value) -> Result<ServiceConfig> {
        if !partial.is_object() {
            return Err(RestartError::ConfigValidation(
                "configuration update must be a JSON object".into(),
            ));
        }

        let mut current = self.current.write().await;
        let mut document = serde_json::to_value(&*current)?;
        deep_merge(&mut document, partial);

        let merged = ServiceConfig::deserialize(&document)
            .map_err(|e| RestartError::ConfigValidation(e.to_string()))?;
        let unknown = unknown_keys(&document, &serde_json::to_value(&merged)?);
        if !unknown.is_empty() {
            return Err(RestartError::ConfigValidation(format!(
                "unknown configuration key(s): {}",
                unknown.join(", ")
            )));
        }
        merged.validate()?;
        save(&self.path, &merged).await?;

        *current = merged.clone();
        tracing::info!(path = %self.path.display(), "config_updated");
        Ok(merged)
    }
}

/// Read the document at `path`, filling missing fields with defaults.
///
/// A missing file is created with the defaults.
pub async fn load(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        let config = ServiceConfig::default();
        save(path, &config).await?;
        tracing::info!(path = %path.display(), "created default config");
        return Ok(config);
    }
    let contents = tokio::fs::read_to_string(path).await?;
    let config: ServiceConfig = serde_json::from_str(&contents)
        .map_err(|e| RestartError::ConfigParse(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Write the full document next to `path` and rename it into place.
pub async fn save(path: &Path, config: &ServiceConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RestartError::ConfigWrite(format!("failed to create config dir: {e}")))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let staging = staging_path(path);
    tokio::fs::write(&staging, json)
        .await
        .map_err(|e| RestartError::ConfigWrite(format!("failed to write {}: {e}", staging.display())))?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(RestartError::ConfigWrite(format!(
            "failed to replace {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Merge `source` into `target`. Objects merge key by key; anything else
/// replaces the target value.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                let nested = value.is_object() && target.get(&key).is_some_and(Value::is_object);
                if !nested {
                    target.insert(key, value);
                } else if let Some(existing) = target.get_mut(&key) {
                    deep_merge(existing, value);
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Dotted paths present in `document` that `known` has no slot for.
pub fn unknown_keys(document: &Value, known: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_unknown(document, known, "", &mut found);
    found
}

fn collect_unknown(document: &Value, known: &Value, prefix: &str, found: &mut Vec<String>) {
    let (Value::Object(document), Value::Object(known)) = (document, known) else {
        return;
    };
    for (key, value) in document {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match known.get(key) {
            Some(slot) => collect_unknown(value, slot, &path, found),
            None => found.push(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_keeps_nested_siblings() {
        let mut target = json!({ "a": { "x": 1, "y": 2 }, "b": 3 });
        deep_merge(&mut target, json!({ "a": { "y": 20 }, "c": 4 }));
        assert_eq!(target, json!({ "a": { "x": 1, "y": 20 }, "b": 3, "c": 4 }));
    }

    #[test]
    fn deep_merge_replaces_non_objects() {
        let mut target = json!({ "a": { "x": 1 } });
        deep_merge(&mut target, json!({ "a": [1, 2] }));
        assert_eq!(target, json!({ "a": [1, 2] }));
    }

    #[tokio::test]
    async fn load_creates_missing_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        let config = load(&path).await.unwrap();
        assert_eq!(config, ServiceConfig::default());
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let reparsed: ServiceConfig = serde_json::from_str(&written).unwrap();
        assert_eq!(reparsed, config);
    }

    #[tokio::test]
    async fn load_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        tokio::fs::write(&path, r#"{ "port_range": { "min": 40000 } }"#)
            .await
            .unwrap();
        let config = load(&path).await.unwrap();
        assert_eq!(config.port_range.min, 40000);
        assert_eq!(config.port_range.max, 60000);
        assert_eq!(config.service.listen_port, 8080);
    }

    #[tokio::test]
    async fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(
            load(&path).await,
            Err(RestartError::ConfigParse(_))
        ));
    }

    #[tokio::test]
    async fn save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        save(&path, &ServiceConfig::default()).await.unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("service_config.json.tmp").exists());
    }

    #[tokio::test]
    async fn update_merges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        let store = ConfigStore::open(&path).await.unwrap();

        let updated = store
            .update(json!({ "port_range": { "max": 55000 }, "docker": { "timeout": 30 } }))
            .await
            .unwrap();
        assert_eq!(updated.port_range.min, 50000);
        assert_eq!(updated.port_range.max, 55000);
        assert_eq!(updated.docker.timeout, 30);
        assert!(updated.docker.use_sudo);

        let on_disk = load(&path).await.unwrap();
        assert_eq!(on_disk, updated);
        assert_eq!(store.get().await, updated);
    }

    #[tokio::test]
    async fn update_with_inverted_range_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        let store = ConfigStore::open(&path).await.unwrap();
        let before_disk = tokio::fs::read_to_string(&path).await.unwrap();

        let err = store
            .update(json!({ "port_range": { "min": 60000, "max": 50000 } }))
            .await
            .unwrap_err();
        assert!(matches!(err, RestartError::ConfigValidation(_)));

        assert_eq!(store.get().await, ServiceConfig::default());
        let after_disk = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(before_disk, after_disk);
    }

    #[tokio::test]
    async fn update_with_wrong_type_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("c.json")).await.unwrap();
        let err = store
            .update(json!({ "service": { "listen_port": "eighty" } }))
            .await
            .unwrap_err();
        assert!(matches!(err, RestartError::ConfigValidation(_)));
    }

    #[test]
    fn unknown_keys_are_reported_with_their_path() {
        let known = serde_json::to_value(ServiceConfig::default()).unwrap();
        let document = json!({
            "port_range": { "minimum": 1, "max": 2 },
            "extra": { "note": "x" },
            "docker": { "compose_command": ["docker"] }
        });
        assert_eq!(
            unknown_keys(&document, &known),
            vec!["extra".to_string(), "port_range.minimum".to_string()]
        );
    }

    #[tokio::test]
    async fn update_with_misspelled_key_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_config.json");
        let store = ConfigStore::open(&path).await.unwrap();
        let before_disk = tokio::fs::read_to_string(&path).await.unwrap();

        for partial in [
            json!({ "port_range": { "minimum": 51000 } }),
            json!({ "extra": { "note": "keep me" } }),
        ] {
            let err = store.update(partial).await.unwrap_err();
            assert!(
                matches!(&err, RestartError::ConfigValidation(m) if m.contains("unknown configuration key")),
                "{err}"
            );
        }

        assert_eq!(store.get().await, ServiceConfig::default());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), before_disk);
    }

    #[tokio::test]
    async fn update_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("c.json")).await.unwrap();
        assert!(store.update(json!([1, 2, 3])).await.is_err());
    }

    #[tokio::test]
    async fn open_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        tokio::fs::write(&path, r#"{ "port_range": { "min": 9, "max": 5 } }"#)
            .await
            .unwrap();
        assert!(matches!(
            ConfigStore::open(&path).await,
            Err(RestartError::ConfigValidation(_))
        ));
    }
}
