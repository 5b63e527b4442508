//! Artifact names and download references.

use std::path::Path;
use uuid::Uuid;

/// Longest stem kept from the input file name.
const MAX_STEM_CHARS: usize = 64;

const FALLBACK_STEM: &str = "file";

/// `{stem}_watermarked_{token}.{ext}` with a random 8-character token.
pub fn artifact_name(source_name: &str, extension: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let extension = extension.trim_start_matches('.');
    format!(
        "{}_watermarked_{}.{}",
        sanitize_stem(source_name),
        &token[..8],
        extension
    )
}

/// Join a prefix and a name with exactly one `/`.
pub fn download_ref(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

/// A name that stays inside the output directory.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

fn sanitize_stem(source_name: &str) -> String {
    // Only the final component; callers may pass URL paths or client paths
    let file_name = source_name.rsplit(['/', '\\']).next().unwrap_or(source_name);
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}
