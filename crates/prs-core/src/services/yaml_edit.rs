//! Line-level editing of block-style YAML documents.
//!
//! Callers mutate a parsed [`Value`] tree first and then replay the same
//! change as a minimal text edit. [`settle`] keeps the edited text only when
//! it parses back to exactly the mutated tree, so every byte outside the
//! edited span (comments, ordering, quoting, blank lines) survives.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{RestartError, Result};

/// Result of resolving a key path against the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// Line holding the final key.
    Found(usize),
    /// `path[..depth]` exists; `parent` is the line of `path[depth - 1]`.
    Missing { depth: usize, parent: Option<usize> },
}

pub(crate) struct Document {
    lines: Vec<String>,
}

impl Document {
    pub(crate) fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub(crate) fn render(&self) -> String {
        self.lines.concat()
    }

    pub(crate) fn lookup(&self, path: &[&str]) -> Lookup {
        let mut range = (0, self.lines.len());
        let mut parent = None;
        for (depth, key) in path.iter().enumerate() {
            match self.find_child(range, key) {
                Some(line) if depth + 1 == path.len() => return Lookup::Found(line),
                Some(line) => {
                    parent = Some(line);
                    range = self.block(line);
                }
                None => return Lookup::Missing { depth, parent },
            }
        }
        Lookup::Missing {
            depth: path.len(),
            parent,
        }
    }

    /// Replace the inline scalar of the `key: value` entry on `line`.
    pub(crate) fn set_scalar(&mut self, line: usize, text: &str) -> bool {
        match self.inline_value(line) {
            Some((start, end)) if start < end => {
                self.lines[line].replace_range(start..end, text);
                true
            }
            _ => false,
        }
    }

    /// Lines of the block sequence nested under the key on `line`.
    pub(crate) fn sequence_items(&self, line: usize) -> Option<Vec<usize>> {
        if self.has_inline_value(line) {
            return None;
        }
        let range = self.block(line);
        let first = self.first_content(range)?;
        if !self.is_item(first) {
            return None;
        }
        let item_indent = self.indent(first);
        let mut items = Vec::new();
        for j in range.0..range.1 {
            if self.is_blank(j) {
                continue;
            }
            let indent = self.indent(j);
            if indent < item_indent {
                return None;
            }
            if indent == item_indent {
                if !self.is_item(j) {
                    return None;
                }
                items.push(j);
            }
        }
        Some(items)
    }

    /// Inline scalar of a `- value` item, quotes included.
    pub(crate) fn item_scalar(&self, line: usize) -> Option<&str> {
        let (start, end) = self.item_span(line)?;
        Some(&self.content(line)[start..end])
    }

    pub(crate) fn set_item_scalar(&mut self, line: usize, text: &str) -> bool {
        match self.item_span(line) {
            Some((start, end)) => {
                self.lines[line].replace_range(start..end, text);
                true
            }
            None => false,
        }
    }

    /// Append `keys` as a nested chain under `parent` (or at the document
    /// root), the innermost key holding `value`.
    pub(crate) fn insert_path(&mut self, parent: Option<usize>, keys: &[&str], value: &str) -> bool {
        if keys.is_empty() {
            return false;
        }
        let (position, indent) = match parent {
            Some(p) => {
                if self.has_inline_value(p) {
                    return false;
                }
                let range = self.block(p);
                let indent = match self.first_content(range) {
                    Some(first) if self.is_item(first) => return false,
                    Some(first) => self.indent(first),
                    None => self.indent(p) + 2,
                };
                (range.1, indent)
            }
            None => {
                let indent = self
                    .first_content((0, self.lines.len()))
                    .map_or(0, |first| self.indent(first));
                (self.lines.len(), indent)
            }
        };

        let newline = if self.lines.first().is_some_and(|l| l.ends_with("\r\n")) {
            "\r\n"
        } else {
            "\n"
        };
        if position > 0 && !self.lines[position - 1].ends_with('\n') {
            self.lines[position - 1].push_str(newline);
        }

        let inserted: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(depth, key)| {
                let pad = " ".repeat(indent + depth * 2);
                let key = render_key(key);
                if depth + 1 == keys.len() {
                    format!("{pad}{key}: {value}{newline}")
                } else {
                    format!("{pad}{key}:{newline}")
                }
            })
            .collect();
        self.lines.splice(position..position, inserted);
        true
    }

    fn content(&self, line: usize) -> &str {
        self.lines[line].trim_end_matches(['\n', '\r'])
    }

    fn indent(&self, line: usize) -> usize {
        let content = self.content(line);
        content.len() - content.trim_start_matches(' ').len()
    }

    fn body(&self, line: usize) -> &str {
        &self.content(line)[self.indent(line)..]
    }

    fn is_blank(&self, line: usize) -> bool {
        let body = self.body(line).trim_end();
        body.is_empty()
            || body.starts_with('#')
            || (self.indent(line) == 0 && (body == "---" || body == "..."))
    }

    fn is_item(&self, line: usize) -> bool {
        let body = self.body(line);
        body == "-" || body.starts_with("- ")
    }

    fn key_at(&self, line: usize) -> Option<(String, usize)> {
        let indent = self.indent(line);
        split_key(self.body(line)).map(|(key, after)| (key, indent + after))
    }

    fn inline_value(&self, line: usize) -> Option<(usize, usize)> {
        let (_, after_colon) = self.key_at(line)?;
        Some(scalar_span(self.content(line), after_colon))
    }

    fn has_inline_value(&self, line: usize) -> bool {
        matches!(self.inline_value(line), Some((start, end)) if start < end)
    }

    fn item_span(&self, line: usize) -> Option<(usize, usize)> {
        if !self.is_item(line) {
            return None;
        }
        let after_dash = self.indent(line) + 1;
        if split_key(self.content(line)[after_dash..].trim_start()).is_some() {
            return None;
        }
        let (start, end) = scalar_span(self.content(line), after_dash);
        (start < end).then_some((start, end))
    }

    /// Lines nested under the entry on `line`, without trailing blank lines.
    fn block(&self, line: usize) -> (usize, usize) {
        let indent = self.indent(line);
        let allow_items = !self.has_inline_value(line);
        let mut end = line + 1;
        for j in line + 1..self.lines.len() {
            if self.is_blank(j) {
                continue;
            }
            let nested = self.indent(j) > indent
                || (allow_items && self.indent(j) == indent && self.is_item(j));
            if !nested {
                break;
            }
            end = j + 1;
        }
        (line + 1, end)
    }

    fn first_content(&self, (start, end): (usize, usize)) -> Option<usize> {
        (start..end).find(|&j| !self.is_blank(j))
    }

    fn find_child(&self, range: (usize, usize), key: &str) -> Option<usize> {
        let first = self.first_content(range)?;
        let child_indent = self.indent(first);
        (range.0..range.1).find(|&j| {
            !self.is_blank(j)
                && self.indent(j) == child_indent
                && self.key_at(j).is_some_and(|(k, _)| k == key)
        })
    }
}

/// Split `key: value` into the key and the offset just past the colon.
fn split_key(body: &str) -> Option<(String, usize)> {
    let bytes = body.as_bytes();
    let first = *bytes.first()?;
    let (key, after_key) = match first {
        b'"' | b'\'' => {
            let close = closing_quote(bytes, first)?;
            (body[1..close].to_string(), close + 1)
        }
        b'-' if bytes.len() == 1 || bytes[1] == b' ' => return None,
        b'#' | b'[' | b'{' | b'?' | b'&' | b'*' | b'!' | b'|' | b'>' | b'%' | b'@' | b'`' => {
            return None
        }
        _ => {
            let colon = plain_colon(bytes)?;
            (body[..colon].trim_end().to_string(), colon)
        }
    };
    let rest = &body[after_key..];
    let colon = after_key + (rest.len() - rest.trim_start_matches(' ').len());
    if bytes.get(colon) != Some(&b':') {
        return None;
    }
    match bytes.get(colon + 1) {
        None | Some(b' ') | Some(b'\t') => Some((key, colon + 1)),
        _ => None,
    }
}

fn closing_quote(bytes: &[u8], quote: u8) -> Option<usize> {
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 1,
            b'\'' if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') => i += 1,
            b if b == quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn plain_colon(bytes: &[u8]) -> Option<usize> {
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'#' if i > 0 && bytes[i - 1] == b' ' => return None,
            b':' if matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte span of the scalar starting at or after `from`, excluding any
/// trailing comment and whitespace.
fn scalar_span(content: &str, from: usize) -> (usize, usize) {
    let bytes = content.as_bytes();
    let start = from
        + bytes[from..]
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t'))
            .count();
    let mut quote = None;
    let mut cut = bytes.len();
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if i == start && (b == b'"' || b == b'\'') => quote = Some(b),
            None if b == b'#' && (i == start || matches!(bytes[i - 1], b' ' | b'\t')) => {
                cut = i;
                break;
            }
            None => {}
        }
        i += 1;
    }
    (start, start + content[start..cut].trim_end().len())
}

fn render_key(key: &str) -> String {
    let plain = !key.is_empty()
        && !key.starts_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        key.to_string()
    } else {
        format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

pub(crate) fn parse_tree(path: &Path, text: &str) -> Result<Value> {
    serde_yaml::from_str(text).map_err(|e| RestartError::file_parse(path, e))
}

/// Choose the in-place edit when it reproduces `expected` exactly, otherwise
/// fall back to serializing `expected`.
pub(crate) fn settle(path: &Path, edited: Option<String>, expected: &Value) -> Result<String> {
    if let Some(text) = edited {
        if serde_yaml::from_str::<Value>(&text).is_ok_and(|reparsed| &reparsed == expected) {
            return Ok(text);
        }
    }
    tracing::warn!(
        path = %path.display(),
        "layout not editable in place; rewriting from parsed tree without comments"
    );
    Ok(serde_yaml::to_string(expected)?)
}

pub(crate) async fn read_document(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RestartError::FileNotFound(PathBuf::from(path)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Overwrite in place so the file keeps its inode, owner and mode.
pub(crate) async fn write_document(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# top comment
gerbil:
  start_port: 51820   # wireguard
  base_endpoint: \"example.com\"
server:
  ports:
    - \"80:80\"
    - 443:443/udp
";

    #[test]
    fn lookup_finds_nested_key() {
        let doc = Document::parse(SAMPLE);
        assert_eq!(doc.lookup(&["gerbil", "start_port"]), Lookup::Found(2));
        assert_eq!(doc.lookup(&["server", "ports"]), Lookup::Found(5));
    }

    #[test]
    fn lookup_reports_deepest_existing_parent() {
        let doc = Document::parse(SAMPLE);
        assert_eq!(
            doc.lookup(&["gerbil", "missing", "leaf"]),
            Lookup::Missing {
                depth: 1,
                parent: Some(1)
            }
        );
        assert_eq!(
            doc.lookup(&["nope"]),
            Lookup::Missing {
                depth: 0,
                parent: None
            }
        );
    }

    #[test]
    fn set_scalar_keeps_trailing_comment() {
        let mut doc = Document::parse(SAMPLE);
        assert!(doc.set_scalar(2, "52000"));
        assert!(doc.render().contains("  start_port: 52000   # wireguard\n"));
    }

    #[test]
    fn set_scalar_refuses_block_values() {
        let mut doc = Document::parse(SAMPLE);
        assert!(!doc.set_scalar(1, "1"));
    }

    #[test]
    fn sequence_items_include_quoting() {
        let doc = Document::parse(SAMPLE);
        let items = doc.sequence_items(5).unwrap();
        assert_eq!(items, vec![6, 7]);
        assert_eq!(doc.item_scalar(6), Some("\"80:80\""));
        assert_eq!(doc.item_scalar(7), Some("443:443/udp"));
    }

    #[test]
    fn indentless_sequence_is_recognised() {
        let text = "ports:\n- 1:1/udp\n- 2:2\nother: x\n";
        let doc = Document::parse(text);
        assert_eq!(doc.sequence_items(0), Some(vec![1, 2]));
    }

    #[test]
    fn mapping_items_have_no_scalar() {
        let text = "ports:\n  - target: 1\n    protocol: udp\n";
        let doc = Document::parse(text);
        assert_eq!(doc.item_scalar(1), None);
    }

    #[test]
    fn insert_path_under_existing_parent() {
        let mut doc = Document::parse(SAMPLE);
        assert!(doc.insert_path(Some(1), &["tunnel", "port"], "9"));
        let rendered = doc.render();
        assert!(rendered.contains("  base_endpoint: \"example.com\"\n  tunnel:\n    port: 9\nserver:\n"));
    }

    #[test]
    fn insert_path_at_root_adds_missing_newline() {
        let mut doc = Document::parse("a: 1");
        assert!(doc.insert_path(None, &["b", "c"], "2"));
        assert_eq!(doc.render(), "a: 1\nb:\n  c: 2\n");
    }

    #[test]
    fn quoted_keys_and_hash_in_values() {
        assert_eq!(split_key("\"a b\": 1"), Some(("a b".to_string(), 6)));
        assert_eq!(split_key("url: http://x"), Some(("url".to_string(), 4)));
        assert_eq!(split_key("- item"), None);
        assert_eq!(scalar_span("k: \"a # b\" # c", 2), (3, 10));
    }

    #[test]
    fn settle_falls_back_when_edit_diverges() {
        let expected: Value = serde_yaml::from_str("a: 2").unwrap();
        let out = settle(Path::new("x.yml"), Some("a: 3\n".into()), &expected).unwrap();
        assert_eq!(serde_yaml::from_str::<Value>(&out).unwrap(), expected);
    }

    #[tokio::test]
    async fn read_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("absent.yml")).await.unwrap_err();
        assert!(matches!(err, RestartError::FileNotFound(_)));
    }
}
