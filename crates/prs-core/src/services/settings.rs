use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{RestartError, Result};
use crate::services::yaml_edit::{self, Document, Lookup};

/// Set the integer at `dotted_key` (e.g. `gerbil.start_port`) to `port`,
/// creating missing intermediate mappings.
pub async fn update_settings_file(path: &Path, dotted_key: &str, port: u16) -> Result<()> {
    let original = yaml_edit::read_document(path).await?;
    let updated = patch_settings(path, &original, dotted_key, port)?;
    if updated != original {
        yaml_edit::write_document(path, &updated).await?;
    }
    tracing::info!(path = %path.display(), key = dotted_key, port, "settings_file_updated");
    Ok(())
}

/// Pure form of [`update_settings_file`]; `path` only labels errors.
pub fn patch_settings(path: &Path, text: &str, dotted_key: &str, port: u16) -> Result<String> {
    let keys: Vec<&str> = dotted_key.split('.').collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(RestartError::ConfigValidation(format!(
            "'{dotted_key}' is not a valid dotted key"
        )));
    }

    let mut tree = yaml_edit::parse_tree(path, text)?;
    let value = Value::Number(serde_yaml::Number::from(u64::from(port)));
    set_path(path, &mut tree, &keys, value)?;

    let rendered = port.to_string();
    let mut doc = Document::parse(text);
    let edited = match doc.lookup(&keys) {
        Lookup::Found(line) => doc.set_scalar(line, &rendered),
        Lookup::Missing { depth, parent } => doc.insert_path(parent, &keys[depth..], &rendered),
    };
    yaml_edit::settle(path, edited.then(|| doc.render()), &tree)
}

/// The port currently stored at `dotted_key`, if any.
pub async fn read_settings_port(path: &Path, dotted_key: &str) -> Result<Option<u16>> {
    let text = yaml_edit::read_document(path).await?;
    current_port(path, &text, dotted_key)
}

/// Pure form of [`read_settings_port`].
pub fn current_port(path: &Path, text: &str, dotted_key: &str) -> Result<Option<u16>> {
    let tree = yaml_edit::parse_tree(path, text)?;
    let node = dotted_key
        .split('.')
        .try_fold(&tree, |node, key| node.get(key));
    Ok(match node {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn set_path(path: &Path, node: &mut Value, keys: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = keys.split_first() else {
        *node = value;
        return Ok(());
    };
    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(mapping) = node else {
        return Err(RestartError::file_parse(
            path,
            format!("cannot set '{first}': parent is not a mapping"),
        ));
    };
    let key = Value::String((*first).to_string());
    if !mapping.contains_key(&key) {
        mapping.insert(key.clone(), Value::Null);
    }
    match mapping.get_mut(&key) {
        Some(child) if rest.is_empty() => {
            *child = value;
            Ok(())
        }
        Some(child) => set_path(path, child, rest, value),
        None => Ok(()),
    }
}
