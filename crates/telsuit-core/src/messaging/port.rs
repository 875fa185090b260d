use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatId, PostId},
    messaging::types::{EditOutcome, FormattingRange, LinkButton, Post, PostEvent},
    Result,
};

/// Platform capability the core runs against.
///
/// The Telegram MTProto adapter is the first implementation; tests use
/// in-memory fakes. History windows are bounded and ordered newest-first.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Replace a post's text and formatting ranges.
    ///
    /// "Content unchanged" rejections map to `EditOutcome::Unchanged`; other
    /// platform refusals surface as `Error::EditRejected` and transport
    /// faults as `Error::EditFailed`.
    async fn edit_post(
        &self,
        chat_id: ChatId,
        post_id: PostId,
        text: &str,
        ranges: &[FormattingRange],
        buttons: Option<&[LinkButton]>,
    ) -> Result<EditOutcome>;

    /// Request deletion of the given posts in one platform call.
    ///
    /// Ids that are already gone must not fail the call; on success the
    /// returned count covers the posts in this request.
    async fn delete_posts(&self, chat_id: ChatId, ids: &[PostId]) -> Result<usize>;

    /// Server-side full-text search over recent history, newest first,
    /// at most `limit` posts.
    async fn search_history(
        &self,
        chat_id: ChatId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Unfiltered recent history, newest first, at most `limit` posts.
    async fn iter_history(&self, chat_id: ChatId, limit: usize) -> Result<Vec<Post>>;

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<PostId>;

    async fn forward_posts(&self, to: ChatId, from: ChatId, ids: &[PostId]) -> Result<usize>;

    async fn download_media(&self, chat_id: ChatId, post_id: PostId, dest: &Path) -> Result<()>;

    /// Stream of new/edited-post events for the given chats, in platform
    /// delivery order. The channel closes when the session disconnects.
    async fn subscribe(&self, chats: &[ChatId]) -> Result<mpsc::Receiver<PostEvent>>;
}
