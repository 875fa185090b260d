//! Entity compositor: turns a post's text + existing formatting ranges into
//! the edited text + merged ranges (custom-glyph substitution and the
//! call-to-action link).
//!
//! Pure functions, no I/O. All offsets are UTF-16 code units (the platform
//! wire contract), computed by encoding the prefix up to a match and counting
//! units, never by scalar or byte position.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    messaging::types::{FormattingRange, RangeKind},
    Error, Result,
};

/// Emoji literal → custom-glyph document id. Supplied by configuration and
/// treated as read-only here.
pub type GlyphMap = HashMap<String, i64>;

/// Call-to-action appended to posts that mention the product marker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallToAction {
    /// Substring (matched case-insensitively) that marks a product post.
    pub marker: String,
    /// Visible label appended to the text; the link range covers exactly it.
    pub label: String,
    pub url: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n\n".to_string()
}

/// Result of composing one edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Composition {
    pub text: String,
    pub ranges: Vec<FormattingRange>,
    /// False when nothing would change; the caller must then skip the
    /// platform call entirely.
    pub changed: bool,
}

/// Number of UTF-16 code units in `s`.
fn utf16_len(s: &str) -> i32 {
    s.encode_utf16().count() as i32
}

/// UTF-16 offset of byte position `byte_idx` in `text`.
fn utf16_offset(text: &str, byte_idx: usize) -> i32 {
    utf16_len(&text[..byte_idx])
}

/// Compose the edit for `text`.
///
/// Every literal occurrence of every glyph-map key gets a custom-glyph range,
/// except occurrences already covered by one of `existing`; passing a prior
/// composition's ranges back in therefore yields no further glyph ranges.
/// When `cta` is given and the text mentions the marker without already
/// ending in the label, the separator + label are appended and a link range
/// covers exactly the label.
///
/// The merged range set is sorted by offset; overlapping ranges are an error
/// (`RangeConflict`), never silently truncated.
pub fn compose(
    text: &str,
    existing: &[FormattingRange],
    glyphs: &GlyphMap,
    cta: Option<&CallToAction>,
) -> Result<Composition> {
    let mut added: Vec<FormattingRange> = Vec::new();

    for (emoji, &glyph_id) in glyphs {
        if emoji.is_empty() {
            continue;
        }
        let length = utf16_len(emoji);
        for (byte_idx, _) in text.match_indices(emoji.as_str()) {
            let offset = utf16_offset(text, byte_idx);
            let covered = existing
                .iter()
                .any(|r| r.end() > offset && r.offset < offset + length);
            if covered {
                continue;
            }
            added.push(FormattingRange {
                offset,
                length,
                kind: RangeKind::CustomGlyph { glyph_id },
            });
        }
    }
    added.sort_by_key(|r| r.offset);

    let mut final_text = text.to_string();
    if let Some(cta) = cta {
        if wants_call_to_action(text, cta) {
            let offset = utf16_len(text) + utf16_len(&cta.separator);
            final_text.push_str(&cta.separator);
            final_text.push_str(&cta.label);
            added.push(FormattingRange {
                offset,
                length: utf16_len(&cta.label),
                kind: RangeKind::Link {
                    url: cta.url.clone(),
                },
            });
        }
    }

    let changed = !added.is_empty();

    let mut ranges: Vec<FormattingRange> = existing.to_vec();
    ranges.extend(added);
    ranges.sort_by_key(|r| r.offset);

    for pair in ranges.windows(2) {
        if pair[0].end() > pair[1].offset {
            return Err(Error::RangeConflict {
                offset: pair[1].offset,
            });
        }
    }

    Ok(Composition {
        text: final_text,
        ranges,
        changed,
    })
}

fn wants_call_to_action(text: &str, cta: &CallToAction) -> bool {
    if cta.marker.is_empty() || cta.label.is_empty() {
        return false;
    }
    let mentions_marker = text
        .to_lowercase()
        .contains(&cta.marker.to_lowercase());
    mentions_marker && !text.trim_end().ends_with(&cta.label)
}
