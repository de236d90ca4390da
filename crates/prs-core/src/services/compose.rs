use std::path::Path;

use serde_yaml::Value;

use crate::error::{RestartError, Result};
use crate::services::yaml_edit::{self, Document, Lookup};

/// The rewritten entry of the service's `ports` list. `text` is set for short
/// syntax entries, which can be edited in place.
struct Rewrite {
    index: usize,
    text: Option<String>,
}

/// Point one udp port mapping of `service` at `port` on both sides, leaving
/// the rest of the compose file untouched.
///
/// The mapping whose container port equals `current` (the listener port the
/// settings file holds now) is chosen; without a match, the first udp entry.
pub async fn update_compose_file(
    path: &Path,
    service: &str,
    port: u16,
    current: Option<u16>,
) -> Result<()> {
    let original = yaml_edit::read_document(path).await?;
    let updated = patch_compose(path, &original, service, port, current)?;
    if updated != original {
        yaml_edit::write_document(path, &updated).await?;
    }
    tracing::info!(path = %path.display(), service, port, "compose_file_updated");
    Ok(())
}

/// Pure form of [`update_compose_file`]; `path` only labels errors.
pub fn patch_compose(
    path: &Path,
    text: &str,
    service: &str,
    port: u16,
    current: Option<u16>,
) -> Result<String> {
    let mut tree = yaml_edit::parse_tree(path, text)?;
    let (rewrite, entry_count) = rewrite_tree(&mut tree, service, port, current)?;
    let edited = edit_text(text, service, &rewrite, entry_count);
    yaml_edit::settle(path, edited, &tree)
}

fn rewrite_tree(
    tree: &mut Value,
    service: &str,
    port: u16,
    current: Option<u16>,
) -> Result<(Rewrite, usize)> {
    let block = tree
        .get_mut("services")
        .and_then(|services| services.get_mut(service))
        .filter(|block| block.is_mapping())
        .ok_or_else(|| RestartError::ServiceBlockNotFound(service.to_string()))?;
    let Some(Value::Sequence(entries)) = block.get_mut("ports") else {
        return Err(RestartError::PortMappingNotFound(service.to_string()));
    };

    let udp: Vec<usize> = (0..entries.len())
        .filter(|&i| is_udp(&entries[i]))
        .collect();
    let index = current
        .and_then(|c| udp.iter().copied().find(|&i| container_port(&entries[i]) == Some(c)))
        .or_else(|| udp.first().copied())
        .ok_or_else(|| RestartError::PortMappingNotFound(service.to_string()))?;
    if udp
        .iter()
        .any(|&i| i != index && host_port(&entries[i]) == Some(port))
    {
        return Err(RestartError::PortConflict {
            service: service.to_string(),
            port,
        });
    }

    let text = match &mut entries[index] {
        Value::String(spec) => {
            let Some(new_spec) = rewrite_short_syntax(spec, port) else {
                return Err(RestartError::PortMappingNotFound(service.to_string()));
            };
            *spec = new_spec.clone();
            Some(new_spec)
        }
        entry => {
            set_long_syntax_port(entry, port);
            None
        }
    };
    Ok((Rewrite { index, text }, entries.len()))
}

/// `[ip:][host:]container/udp` becomes `[ip:]port:port/udp`; other
/// protocols are left alone.
fn rewrite_short_syntax(spec: &str, port: u16) -> Option<String> {
    let (ports, protocol) = spec.rsplit_once('/')?;
    if !protocol.trim().eq_ignore_ascii_case("udp") {
        return None;
    }
    let host_ip = ports
        .rsplit_once(':')
        .and_then(|(rest, _container)| rest.rsplit_once(':'))
        .map(|(ip, _host)| ip);
    Some(match host_ip {
        Some(ip) => format!("{ip}:{port}:{port}/{protocol}"),
        None => format!("{port}:{port}/{protocol}"),
    })
}

fn is_udp(entry: &Value) -> bool {
    let protocol = match entry {
        Value::String(spec) => spec.rsplit_once('/').map(|(_, p)| p),
        _ => entry.get("protocol").and_then(Value::as_str),
    };
    protocol.is_some_and(|p| p.trim().eq_ignore_ascii_case("udp"))
}

fn port_number(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn container_port(entry: &Value) -> Option<u16> {
    match entry {
        Value::String(spec) => {
            let (ports, _) = spec.rsplit_once('/')?;
            ports.rsplit(':').next()?.trim().parse().ok()
        }
        _ => entry.get("target").and_then(port_number),
    }
}

fn host_port(entry: &Value) -> Option<u16> {
    match entry {
        Value::String(spec) => {
            let (ports, _) = spec.rsplit_once('/')?;
            let (rest, _container) = ports.rsplit_once(':')?;
            rest.rsplit(':').next()?.trim().parse().ok()
        }
        _ => entry.get("published").and_then(port_number),
    }
}

fn set_long_syntax_port(entry: &mut Value, port: u16) {
    let Value::Mapping(mapping) = entry else {
        return;
    };
    let number = Value::Number(serde_yaml::Number::from(u64::from(port)));
    let published = match mapping.get("published") {
        Some(Value::String(_)) => Value::String(port.to_string()),
        _ => number.clone(),
    };
    mapping.insert(Value::String("target".into()), number);
    mapping.insert(Value::String("published".into()), published);
}

fn edit_text(text: &str, service: &str, rewrite: &Rewrite, entry_count: usize) -> Option<String> {
    let new_spec = rewrite.text.as_deref()?;
    let mut doc = Document::parse(text);
    let Lookup::Found(ports_line) = doc.lookup(&["services", service, "ports"]) else {
        return None;
    };
    let items = doc.sequence_items(ports_line)?;
    if items.len() != entry_count {
        return None;
    }
    let line = items[rewrite.index];
    let replacement = match doc.item_scalar(line)?.chars().next() {
        Some(q @ ('"' | '\'')) => format!("{q}{new_spec}{q}"),
        _ => new_spec.to_string(),
    };
    doc.set_item_scalar(line, &replacement).then(|| doc.render())
}
