use chrono::{DateTime, Utc};

use crate::domain::{ChatId, PostId};

/// What a formatting range marks up.
///
/// Anything the compositor does not understand is carried as `Other` and
/// preserved untouched through an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeKind {
    /// Custom-glyph reference (custom emoji document id).
    CustomGlyph { glyph_id: i64 },
    /// Hyperlink over the covered text.
    Link { url: String },
    /// Any other platform entity, round-tripped opaquely by the adapter.
    /// `data` carries the entity's payload (pre language, mention user id)
    /// when it has one.
    Other { tag: String, data: Option<String> },
}

/// A rich-text formatting range.
///
/// Offset and length are UTF-16 code units regardless of the host string
/// representation; that is the platform's wire contract, and surrogate-pair
/// characters (most emoji) occupy two units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattingRange {
    pub offset: i32,
    pub length: i32,
    pub kind: RangeKind,
}

impl FormattingRange {
    /// One past the last covered UTF-16 code unit.
    pub fn end(&self) -> i32 {
        self.offset + self.length
    }
}

/// Read-only snapshot of a channel post.
///
/// The platform is the source of truth; the core never mutates a post except
/// through an explicit `edit_post` call, and never deletes one itself:
/// deletion is requested via the port and performed by the platform.
#[derive(Clone, Debug)]
pub struct Post {
    pub id: PostId,
    pub chat_id: ChatId,
    pub text: String,
    pub ranges: Vec<FormattingRange>,
    pub date: DateTime<Utc>,
    /// Present iff the post has been edited; its presence is what
    /// distinguishes an edited-post event from a genuinely new post.
    pub edited_at: Option<DateTime<Utc>>,
    pub media_group_id: Option<i64>,
    /// True when the post originates from a broadcast channel.
    pub from_channel: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    New,
    Edited,
}

/// A new/edited-post notification delivered by the client subscription.
#[derive(Clone, Debug)]
pub struct PostEvent {
    pub post: Post,
    pub kind: EventKind,
}

/// A URL button attached below a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// Result of an edit call.
///
/// The platform reporting "content not modified" is a distinguished success,
/// not a failure, so callers never special-case it by error name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    Unchanged,
}
