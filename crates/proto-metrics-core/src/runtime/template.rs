// crates/proto-metrics-core/src/runtime/template.rs
// ============================================================================
// Module: Template Expander
// Description: `{{ name }}` placeholder substitution for parameterized SQL.
// Purpose: Render run-metric scripts against caller-supplied parameters.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A placeholder is `{{`, optional whitespace, a word of ASCII letters, digits,
//! and underscores (possibly empty), optional whitespace, then `}}`. Matching
//! is leftmost and non-overlapping. Text outside placeholders is copied
//! verbatim; there is no escaping.
//!
//! Rendering is all-or-nothing: an unmapped placeholder fails the whole render.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use crate::core::MetricsError;
use crate::core::MetricsResult;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Replaces every placeholder in `text` with its mapped value.
///
/// # Errors
///
/// Returns [`MetricsError::Substitution`] naming the first placeholder with no
/// mapping.
pub fn render_template<S>(text: &str, substitutions: &HashMap<String, String, S>) -> MetricsResult<String>
where
    S: std::hash::BuildHasher,
{
    let bytes = text.as_bytes();
    let mut rendered = String::with_capacity(text.len());
    let mut copied = 0;
    let mut cursor = 0;
    while let Some(offset) = text[cursor ..].find("{{") {
        let start = cursor + offset;
        let Some(placeholder) = match_placeholder(bytes, start) else {
            cursor = start + 1;
            continue;
        };
        let name = &text[placeholder.name_start .. placeholder.name_end];
        let Some(value) = substitutions.get(name) else {
            return Err(MetricsError::Substitution(format!(
                "No substitution provided for placeholder '{name}'"
            )));
        };
        rendered.push_str(&text[copied .. start]);
        rendered.push_str(value);
        copied = placeholder.end;
        cursor = placeholder.end;
    }
    rendered.push_str(&text[copied ..]);
    Ok(rendered)
}

// ============================================================================
// SECTION: Scanner
// ============================================================================

/// Byte offsets of one matched placeholder.
struct Placeholder {
    /// Start of the identifier.
    name_start: usize,
    /// End of the identifier (exclusive).
    name_end: usize,
    /// End of the closing braces (exclusive).
    end: usize,
}

/// Matches a placeholder whose opening braces start at `start`.
fn match_placeholder(bytes: &[u8], start: usize) -> Option<Placeholder> {
    let mut index = start + 2;
    index = skip_while(bytes, index, is_template_space);
    let name_start = index;
    index = skip_while(bytes, index, is_word_byte);
    let name_end = index;
    index = skip_while(bytes, index, is_template_space);
    if bytes.get(index .. index + 2) == Some(b"}}".as_slice()) {
        Some(Placeholder {
            name_start,
            name_end,
            end: index + 2,
        })
    } else {
        None
    }
}

/// Advances past bytes matching `predicate`.
fn skip_while(bytes: &[u8], mut index: usize, predicate: fn(u8) -> bool) -> usize {
    while bytes.get(index).is_some_and(|byte| predicate(*byte)) {
        index += 1;
    }
    index
}

/// Word bytes allowed in placeholder names.
const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Whitespace allowed around placeholder names, including vertical tab.
const fn is_template_space(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0x0b
}
