//! Permission node validation, pattern matching, and specificity scoring
//!
//! A node is a dotted identifier like `content.create`. A stored pattern may
//! additionally end in a wildcard segment (`admin.*`) or be the bare
//! universal wildcard `*`. A node requested at check time must never itself
//! be a wildcard.

use crate::error::ValidationError;

/// Maximum total length of a node or pattern, in bytes
pub const MAX_NODE_LEN: usize = 128;

/// Validate a stored pattern.
///
/// Accepts dotted segments of `[a-z0-9]`, with at most one `*` segment and
/// only in the final position. The bare universal wildcard `*` is valid.
pub fn validate_pattern(pattern: &str) -> Result<(), ValidationError> {
    if pattern.is_empty() {
        return Err(ValidationError::EmptyNode);
    }
    if pattern.len() > MAX_NODE_LEN {
        return Err(ValidationError::NodeTooLong {
            len: pattern.len(),
            max: MAX_NODE_LEN,
        });
    }

    let segments: Vec<&str> = pattern.split('.').collect();
    let last = segments.len() - 1;

    for (idx, segment) in segments.iter().enumerate() {
        if *segment == "*" {
            if idx != last {
                return Err(ValidationError::WildcardPosition(pattern.to_string()));
            }
            continue;
        }
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(ValidationError::BadSegment {
                node: pattern.to_string(),
                segment: (*segment).to_string(),
            });
        }
    }

    Ok(())
}

/// Validate a node requested at check time.
///
/// Same rules as [`validate_pattern`], plus wildcards are rejected: a caller
/// must never ask whether a wildcard node has permission.
pub fn validate_node(node: &str) -> Result<(), ValidationError> {
    validate_pattern(node)?;
    if is_wildcard(node) {
        return Err(ValidationError::WildcardNode(node.to_string()));
    }
    Ok(())
}

/// Whether a pattern is the universal wildcard or ends in a wildcard segment
pub fn is_wildcard(pattern: &str) -> bool {
    pattern == "*" || pattern.ends_with(".*")
}

/// Decide whether a stored pattern matches a requested node.
///
/// - exact: `pattern == node`
/// - prefix: `"<prefix>.*"` matches `node == prefix` and `prefix.<anything>`
/// - universal: `"*"` matches every node
pub fn matches(pattern: &str, node: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return node == prefix
            || (node.len() > prefix.len()
                && node.starts_with(prefix)
                && node.as_bytes()[prefix.len()] == b'.');
    }
    pattern == node
}

/// Specificity score for a pattern, the primary tie-break key.
///
/// `segments * 10`, minus 5 when the pattern ends in a wildcard segment.
/// The bare `*` scores exactly 0: `specificity("*") == 0`,
/// `specificity("admin.*") == 15`, `specificity("content.edit.draft") == 30`.
pub fn specificity(pattern: &str) -> u32 {
    if pattern == "*" {
        return 0;
    }
    let segments = pattern.split('.').count() as u32;
    let penalty = if is_wildcard(pattern) { 5 } else { 0 };
    segments * 10 - penalty
}
