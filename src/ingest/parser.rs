//! Markdown → passages (§4.1 algorithm steps 2-3).

use sha2::{Digest, Sha256};

/// One ATX-heading-delimited slice of a file, before it is assigned a
/// passage id and inserted into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPassage {
    pub heading: Option<String>,
    pub ordinal: u32,
    pub content: String,
}

/// Compute a SHA-256 hex digest of the given content (file-level hash used
/// for change detection, §4.1 step 4).
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split file text into passages bounded by ATX headings (`#` … `######`).
///
/// A file with no headings becomes a single passage with `heading = None`.
/// Passages whose body is empty after trimming are dropped; ordinals are
/// re-assigned densely over the surviving passages (§3 Passage invariants).
pub fn split_passages(text: &str) -> Vec<RawPassage> {
    let lines: Vec<&str> = text.lines().collect();
    let mut boundaries: Vec<(usize, Option<String>)> = Vec::new();

    for (line_idx, line) in lines.iter().enumerate() {
        if let Some(heading) = atx_heading_text(line) {
            boundaries.push((line_idx, Some(heading)));
        }
    }

    let mut raw: Vec<(Option<String>, String)> = Vec::new();

    if boundaries.is_empty() {
        raw.push((None, text.to_string()));
    } else {
        if boundaries[0].0 > 0 {
            // Content before the first heading has no heading of its own;
            // it is still a passage (the spec's "no headings" case only
            // covers the whole-file case).
            let body = lines[0..boundaries[0].0].join("\n");
            raw.push((None, body));
        }
        for (i, (start, heading)) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).map(|b| b.0).unwrap_or(lines.len());
            let body = lines[*start..end].join("\n");
            raw.push((heading.clone(), body));
        }
    }

    raw.into_iter()
        .filter(|(_, body)| !body.trim().is_empty())
        .enumerate()
        .map(|(ordinal, (heading, content))| RawPassage {
            heading,
            ordinal: ordinal as u32,
            content,
        })
        .collect()
}

/// If `line` is an ATX heading, return its trimmed heading text (without the
/// `#` prefix). Requires a space (or EOL) after the hashes, per CommonMark.
fn atx_heading_text(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some(rest.trim().trim_end_matches('#').trim().to_string())
}
