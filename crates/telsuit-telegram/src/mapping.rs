//! Translation between grammers TL types and the core post model.
//!
//! Every entity kind the current layer knows is round-tripped; payloads that
//! the core does not interpret travel in `RangeKind::Other`'s `data` field.

use chrono::{TimeZone, Utc};
use grammers_client::grammers_tl_types as tl;
use grammers_client::types::{button, reply_markup, Message};

use telsuit_core::{
    domain::{ChatId, PostId},
    messaging::types::{FormattingRange, LinkButton, Post, RangeKind},
};

pub fn message_to_post(message: &Message) -> Post {
    let chat = message.chat();
    let raw = &message.raw;
    let ranges = raw
        .entities
        .as_ref()
        .map(|entities| entities.iter().map(entity_to_range).collect())
        .unwrap_or_default();

    Post {
        id: PostId(message.id()),
        chat_id: ChatId(chat.id()),
        text: message.text().to_string(),
        ranges,
        date: message.date(),
        edited_at: raw
            .edit_date
            .and_then(|ts| Utc.timestamp_opt(i64::from(ts), 0).single()),
        media_group_id: raw.grouped_id,
        from_channel: raw.post,
    }
}

pub fn ranges_to_entities(ranges: &[FormattingRange]) -> Vec<tl::enums::MessageEntity> {
    ranges.iter().filter_map(range_to_entity).collect()
}

pub fn url_buttons(buttons: &[LinkButton]) -> reply_markup::Inline {
    let row: Vec<_> = buttons
        .iter()
        .map(|b| button::url(b.label.clone(), b.url.clone()))
        .collect();
    reply_markup::inline(vec![row])
}

fn range_to_entity(range: &FormattingRange) -> Option<tl::enums::MessageEntity> {
    use tl::enums::MessageEntity as E;

    let offset = range.offset;
    let length = range.length;
    let entity = match &range.kind {
        RangeKind::CustomGlyph { glyph_id } => {
            E::CustomEmoji(tl::types::MessageEntityCustomEmoji {
                offset,
                length,
                document_id: *glyph_id,
            })
        }
        RangeKind::Link { url } => E::TextUrl(tl::types::MessageEntityTextUrl {
            offset,
            length,
            url: url.clone(),
        }),
        RangeKind::Other { tag, data } => match tag.as_str() {
            "bold" => E::Bold(tl::types::MessageEntityBold { offset, length }),
            "italic" => E::Italic(tl::types::MessageEntityItalic { offset, length }),
            "underline" => E::Underline(tl::types::MessageEntityUnderline { offset, length }),
            "strike" => E::Strike(tl::types::MessageEntityStrike { offset, length }),
            "code" => E::Code(tl::types::MessageEntityCode { offset, length }),
            "pre" => E::Pre(tl::types::MessageEntityPre {
                offset,
                length,
                language: data.clone().unwrap_or_default(),
            }),
            "spoiler" => E::Spoiler(tl::types::MessageEntitySpoiler { offset, length }),
            "blockquote" => E::Blockquote(tl::types::MessageEntityBlockquote {
                offset,
                length,
                collapsed: data.as_deref() == Some("collapsed"),
            }),
            "url" => E::Url(tl::types::MessageEntityUrl { offset, length }),
            "email" => E::Email(tl::types::MessageEntityEmail { offset, length }),
            "phone" => E::Phone(tl::types::MessageEntityPhone { offset, length }),
            "mention" => E::Mention(tl::types::MessageEntityMention { offset, length }),
            "mention_name" => E::MentionName(tl::types::MessageEntityMentionName {
                offset,
                length,
                user_id: data.as_deref().and_then(|d| d.parse().ok())?,
            }),
            "hashtag" => E::Hashtag(tl::types::MessageEntityHashtag { offset, length }),
            "cashtag" => E::Cashtag(tl::types::MessageEntityCashtag { offset, length }),
            "bot_command" => E::BotCommand(tl::types::MessageEntityBotCommand { offset, length }),
            "bank_card" => E::BankCard(tl::types::MessageEntityBankCard { offset, length }),
            // A kind this build does not know; better to drop it than to
            // fabricate a wrong one.
            _ => return None,
        },
    };
    Some(entity)
}

fn entity_to_range(entity: &tl::enums::MessageEntity) -> FormattingRange {
    use tl::enums::MessageEntity as E;

    let opaque = |offset: i32, length: i32, tag: &str, data: Option<String>| FormattingRange {
        offset,
        length,
        kind: RangeKind::Other {
            tag: tag.to_string(),
            data,
        },
    };

    match entity {
        E::CustomEmoji(e) => FormattingRange {
            offset: e.offset,
            length: e.length,
            kind: RangeKind::CustomGlyph {
                glyph_id: e.document_id,
            },
        },
        E::TextUrl(e) => FormattingRange {
            offset: e.offset,
            length: e.length,
            kind: RangeKind::Link { url: e.url.clone() },
        },
        E::Bold(e) => opaque(e.offset, e.length, "bold", None),
        E::Italic(e) => opaque(e.offset, e.length, "italic", None),
        E::Underline(e) => opaque(e.offset, e.length, "underline", None),
        E::Strike(e) => opaque(e.offset, e.length, "strike", None),
        E::Code(e) => opaque(e.offset, e.length, "code", None),
        E::Pre(e) => opaque(e.offset, e.length, "pre", Some(e.language.clone())),
        E::Spoiler(e) => opaque(e.offset, e.length, "spoiler", None),
        E::Blockquote(e) => opaque(
            e.offset,
            e.length,
            "blockquote",
            e.collapsed.then(|| "collapsed".to_string()),
        ),
        E::Url(e) => opaque(e.offset, e.length, "url", None),
        E::Email(e) => opaque(e.offset, e.length, "email", None),
        E::Phone(e) => opaque(e.offset, e.length, "phone", None),
        E::Mention(e) => opaque(e.offset, e.length, "mention", None),
        E::MentionName(e) => opaque(
            e.offset,
            e.length,
            "mention_name",
            Some(e.user_id.to_string()),
        ),
        E::Hashtag(e) => opaque(e.offset, e.length, "hashtag", None),
        E::Cashtag(e) => opaque(e.offset, e.length, "cashtag", None),
        E::BotCommand(e) => opaque(e.offset, e.length, "bot_command", None),
        E::BankCard(e) => opaque(e.offset, e.length, "bank_card", None),
        E::InputMessageEntityMentionName(e) => opaque(e.offset, e.length, "mention_name", None),
        E::Unknown(e) => opaque(e.offset, e.length, "unknown", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_glyph_round_trips() {
        let range = FormattingRange {
            offset: 4,
            length: 2,
            kind: RangeKind::CustomGlyph { glyph_id: 5368 },
        };
        let entities = ranges_to_entities(&[range.clone()]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entity_to_range(&entities[0]), range);
    }

    #[test]
    fn link_round_trips() {
        let range = FormattingRange {
            offset: 0,
            length: 10,
            kind: RangeKind::Link {
                url: "https://t.me/shop".to_string(),
            },
        };
        let entities = ranges_to_entities(&[range.clone()]);
        assert_eq!(entity_to_range(&entities[0]), range);
    }

    #[test]
    fn opaque_payload_is_preserved() {
        let range = FormattingRange {
            offset: 1,
            length: 8,
            kind: RangeKind::Other {
                tag: "pre".to_string(),
                data: Some("rust".to_string()),
            },
        };
        let entities = ranges_to_entities(&[range.clone()]);
        assert_eq!(entity_to_range(&entities[0]), range);
    }

    #[test]
    fn unknown_tags_are_dropped_not_invented() {
        let range = FormattingRange {
            offset: 0,
            length: 1,
            kind: RangeKind::Other {
                tag: "holographic".to_string(),
                data: None,
            },
        };
        assert!(ranges_to_entities(&[range]).is_empty());
    }
}
