//! JSON decoding helpers for upstream responses.

use anyhow::Result;

/// Decode JSON, attaching the serde path and a snippet of the offending
/// line on failure.
///
/// Bare serde errors ("invalid type at line 1 column 5921") are useless
/// against the single-line bodies the Firebase API returns; the path and
/// surrounding text make item-shape regressions diagnosable from logs.
pub fn decode_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(de) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner = err.inner();
            let (line, column) = (inner.line(), inner.column());
            let path = err.path().to_string();
            let snippet = snippet_around(body, line, column, 24);

            if path.is_empty() || path == "." {
                Err(anyhow::anyhow!("{inner}: near `{snippet}`"))
            } else {
                Err(anyhow::anyhow!("at path '{path}': {inner}: near `{snippet}`"))
            }
        }
    }
}

/// A short slice of the failing line centered on the error column.
fn snippet_around(body: &str, line: usize, column: usize, width: usize) -> String {
    let target = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    // column is 1-based; clamp both ends to char boundaries since story
    // titles are arbitrary UTF-8.
    let idx = column.saturating_sub(1).min(target.len());
    let half = width / 2;
    let start = clamp_to_boundary(target, idx.saturating_sub(half));
    let end = clamp_to_boundary(target, idx + half);

    target[start..end].to_string()
}

fn clamp_to_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
