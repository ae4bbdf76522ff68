//! Template rendering.
//!
//! Test files may reference the unit's current state with `{{ path }}`
//! placeholders, e.g. `{{ resourceName }}` or `{{ output.bucket.value }}`.
//! Paths are dotted keys with optional `[n]` indexes, looked up in the
//! unit's JSON form.
//!
//! Lookup follows property-access rules: an unknown root name or a step
//! through a missing or scalar value is an error, while a missing final
//! key renders as empty text. Strings are inserted verbatim, `null` as
//! empty text, anything else as compact JSON.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use tint_core::error::ExecutionError;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").ok());

/// Renders template text against a JSON context.
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, source: &str, context: &Value) -> Result<String, String>;
}

/// `{{ path }}` placeholder renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceTemplate;

impl TemplateRenderer for BraceTemplate {
    fn render(&self, source: &str, context: &Value) -> Result<String, String> {
        let Some(pattern) = PLACEHOLDER.as_ref() else {
            return Err("placeholder pattern failed to compile".to_owned());
        };
        let mut error = None;
        let rendered = pattern.replace_all(source, |caps: &Captures<'_>| {
            let path = &caps[1];
            match lookup(context, path) {
                Ok(Some(Value::String(s))) => s.clone(),
                Ok(Some(Value::Null)) | Ok(None) => String::new(),
                Ok(Some(other)) => other.to_string(),
                Err(e) => {
                    error.get_or_insert(e);
                    String::new()
                }
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Render `source` into `dest_dir`, keeping its file name.
///
/// When the source cannot be read or rendered, `default` is written instead
/// if given; otherwise the failure is a [`ExecutionError::Template`] naming
/// the source file.
pub async fn render_to_file<R: TemplateRenderer>(
    renderer: &R,
    source: &Path,
    context: &Value,
    dest_dir: &Path,
    default: Option<&str>,
) -> Result<PathBuf, ExecutionError> {
    let rendered = match tokio::fs::read_to_string(source).await {
        Ok(text) => renderer.render(&text, context),
        Err(e) => Err(e.to_string()),
    };
    let rendered = match (rendered, default) {
        (Ok(text), _) => text,
        (Err(_), Some(default)) => default.to_owned(),
        (Err(reason), None) => {
            return Err(ExecutionError::Template {
                path: source.display().to_string(),
                reason,
            });
        }
    };

    let file_name = source.file_name().ok_or_else(|| ExecutionError::Template {
        path: source.display().to_string(),
        reason: "source has no file name".to_owned(),
    })?;
    let dest = dest_dir.join(file_name);
    tokio::fs::write(&dest, rendered)
        .await
        .map_err(|e| ExecutionError::io(&dest, e))?;
    Ok(dest)
}

fn segments(path: &str) -> Result<Vec<&str>, String> {
    let mut out = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            out.push(key);
        } else if rest.is_empty() || out.is_empty() {
            return Err(format!("invalid placeholder '{path}'"));
        }
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .filter(|_| rest.starts_with('['))
                .ok_or_else(|| format!("invalid placeholder '{path}'"))?;
            out.push(&rest[1..close]);
            rest = &rest[close + 1..];
        }
    }
    Ok(out)
}

fn lookup<'v>(context: &'v Value, path: &str) -> Result<Option<&'v Value>, String> {
    let segments = segments(path)?;
    let Some((root, rest)) = segments.split_first() else {
        return Err(format!("invalid placeholder '{path}'"));
    };
    let mut current = context
        .get(root)
        .ok_or_else(|| format!("'{root}' is not defined"))?;

    for (i, key) in rest.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(*key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|n| items.get(n)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None if i + 1 == rest.len() && (current.is_object() || current.is_array()) => {
                return Ok(None);
            }
            None => return Err(format!("cannot read '{key}' in '{path}'")),
        }
    }
    Ok(Some(current))
}
