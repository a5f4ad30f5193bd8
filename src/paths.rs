//! Storage-key derivation.
//!
//! Storage keys mirror the remote hierarchy and are a pure function of
//! the partition and remote path:
//!
//! ```text
//! source/{partition}/{relative_path}
//! extracted/{partition}/{relative_path_stem}.json
//! ```
//!
//! The same remote path always derives the same key, which is what makes
//! the registry's storage-key primary identity stable across sync runs.

use std::collections::BTreeMap;

use crate::models::RemoteItem;

/// Hard cap on key length, matching common object-store limits.
const KEY_MAX_BYTES: usize = 1024;
/// Tag values longer than this are truncated.
const TAG_VALUE_MAX: usize = 256;

/// Sanitize a single path component (file or folder name).
///
/// Spaces become hyphens; anything that is not alphanumeric, `-`, `_`,
/// or `.` is stripped; runs of hyphens collapse to one.
fn sanitize_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut last_hyphen = false;
    for ch in component.chars() {
        let mapped = if ch == ' ' { '-' } else { ch };
        if mapped.is_alphanumeric() || mapped == '_' || mapped == '.' {
            out.push(mapped);
            last_hyphen = false;
        } else if mapped == '-' {
            if !last_hyphen {
                out.push('-');
            }
            last_hyphen = true;
        }
        // everything else is dropped
    }
    out
}

/// Sanitize a full relative path, preserving `/` separators.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .filter(|p| !p.is_empty())
        .map(sanitize_component)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Derive the raw-object storage key for a remote document.
///
/// ```text
/// source_key("source", "HR Policies", "/2025/Employee Handbook.docx")
///   == "source/HR-Policies/2025/Employee-Handbook.docx"
/// ```
pub fn source_key(source_prefix: &str, partition: &str, remote_path: &str) -> String {
    let partition_part = sanitize_component(partition);
    let path_part = sanitize_path(remote_path);

    let mut key = format!("{}/{}", source_prefix, partition_part);
    if !path_part.is_empty() {
        key.push('/');
        key.push_str(&path_part);
    }

    // Guard against exceeding the key limit; truncate at a char boundary.
    if key.len() > KEY_MAX_BYTES {
        let mut cut = KEY_MAX_BYTES;
        while !key.is_char_boundary(cut) {
            cut -= 1;
        }
        key.truncate(cut);
    }

    key
}

/// Derive the twin key for a source key: swap the prefix and replace the
/// extension with `.json` (append when there is none).
pub fn twin_key(source_prefix: &str, twin_prefix: &str, source_key: &str) -> String {
    let prefix = format!("{}/", source_prefix);
    let relative = source_key.strip_prefix(&prefix).unwrap_or(source_key);

    let relative = match relative.rsplit_once('/') {
        Some((dir, name)) => format!("{}/{}", dir, replace_extension(name)),
        None => replace_extension(relative),
    };

    format!("{}/{}", twin_prefix, relative)
}

fn replace_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        // ".hidden" has no stem to preserve; treat as extensionless
        Some((stem, _)) if !stem.is_empty() => format!("{}.json", stem),
        _ => format!("{}.json", name),
    }
}

/// Reverse-parse a source key into (partition, relative path).
///
/// Returns `None` when the key does not carry the expected
/// `{prefix}/{partition}/...` shape.
pub fn parse_source_key<'a>(source_prefix: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
    let prefix = format!("{}/", source_prefix);
    let remainder = key.strip_prefix(&prefix)?;
    match remainder.split_once('/') {
        Some((partition, rest)) if !partition.is_empty() => Some((partition, rest)),
        _ => None,
    }
}

/// Build object tags for a raw source upload. Values are truncated to the
/// store's tag-value limit; empty values are dropped.
pub fn source_tags(partition: &str, item: &RemoteItem) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let mut insert = |key: &str, value: &str| {
        if !value.is_empty() {
            tags.insert(key.to_string(), truncate_tag(value));
        }
    };
    insert("partition", partition);
    insert("remote-path", &item.path);
    insert("remote-id", &item.id);
    insert("content-version", &item.version);
    insert(
        "file-type",
        file_extension(&item.name).trim_start_matches('.'),
    );
    tags
}

fn truncate_tag(value: &str) -> String {
    if value.len() <= TAG_VALUE_MAX {
        return value.to_string();
    }
    let mut cut = TAG_VALUE_MAX - 3;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &value[..cut])
}

/// Lowercased extension of a file name including the dot, or `""` when
/// the name has none.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Basename of a path-like string.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
