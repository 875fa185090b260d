//! Telegram adapter (grammers / MTProto).
//!
//! Implements the `telsuit-core` ChannelClient port over a user session.
//! Server-side history search, editing channel posts as the posting admin,
//! and custom-emoji entities are user-session capabilities the Bot API does
//! not offer, hence MTProto rather than a bot token.

pub mod login;
mod mapping;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grammers_client::types::Chat;
use grammers_client::{Client, InputMessage, InvocationError, Update};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info};

use telsuit_core::{
    domain::{ChatId, PostId},
    messaging::{
        port::ChannelClient,
        types::{EditOutcome, EventKind, FormattingRange, LinkButton, Post, PostEvent},
    },
    Error, Result,
};

const EVENT_QUEUE_DEPTH: usize = 256;

pub struct TelegramChannelClient {
    client: Client,
    /// Chats seen so far; MTProto calls need the full chat record, not just
    /// the numeric id.
    chats: Arc<Mutex<HashMap<i64, Chat>>>,
}

impl TelegramChannelClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chats: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve a channel username (with or without '@') and cache its record.
    pub async fn resolve_channel(&self, name: &str) -> Result<ChatId> {
        let username = name.trim_start_matches('@');
        let chat = self
            .client
            .resolve_username(username)
            .await
            .map_err(|e| Error::External(format!("resolve {name}: {e}")))?
            .ok_or_else(|| Error::External(format!("unknown channel: {name}")))?;
        let id = chat.id();
        self.chats.lock().await.insert(id, chat);
        debug!(channel = name, id, "resolved channel");
        Ok(ChatId(id))
    }

    pub async fn resolve_channels(&self, names: &[String]) -> Result<Vec<ChatId>> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.push(self.resolve_channel(name).await?);
        }
        Ok(ids)
    }

    async fn chat_for(&self, chat_id: ChatId) -> Result<Chat> {
        self.chats
            .lock()
            .await
            .get(&chat_id.0)
            .cloned()
            .ok_or_else(|| Error::External(format!("chat {} not resolved", chat_id.0)))
    }
}

/// FLOOD_WAIT seconds carried by an RPC error, if any.
fn flood_wait_seconds(err: &InvocationError) -> Option<u64> {
    match err {
        InvocationError::Rpc(rpc) if rpc.name.starts_with("FLOOD_WAIT") => {
            Some(rpc.value.unwrap_or(1) as u64)
        }
        _ => None,
    }
}

fn classify_edit_error(post_id: PostId, err: InvocationError) -> Result<EditOutcome> {
    match err {
        // The platform's "nothing changed" rejection is a success for us.
        InvocationError::Rpc(rpc) if rpc.name == "MESSAGE_NOT_MODIFIED" => {
            Ok(EditOutcome::Unchanged)
        }
        InvocationError::Rpc(rpc) => Err(Error::EditRejected {
            post_id: post_id.0,
            reason: rpc.name,
        }),
        other => Err(Error::EditFailed {
            post_id: post_id.0,
            reason: other.to_string(),
        }),
    }
}

#[async_trait]
impl ChannelClient for TelegramChannelClient {
    async fn edit_post(
        &self,
        chat_id: ChatId,
        post_id: PostId,
        text: &str,
        ranges: &[FormattingRange],
        buttons: Option<&[LinkButton]>,
    ) -> Result<EditOutcome> {
        let chat = self.chat_for(chat_id).await?;
        let build = || {
            let mut message =
                InputMessage::text(text).fmt_entities(mapping::ranges_to_entities(ranges));
            if let Some(buttons) = buttons {
                message = message.reply_markup(&mapping::url_buttons(buttons));
            }
            message
        };

        match self.client.edit_message(&chat, post_id.0, build()).await {
            Ok(()) => Ok(EditOutcome::Applied),
            Err(e) => {
                if let Some(seconds) = flood_wait_seconds(&e) {
                    sleep(Duration::from_secs(seconds)).await;
                    return match self.client.edit_message(&chat, post_id.0, build()).await {
                        Ok(()) => Ok(EditOutcome::Applied),
                        Err(e) => classify_edit_error(post_id, e),
                    };
                }
                classify_edit_error(post_id, e)
            }
        }
    }

    async fn delete_posts(&self, chat_id: ChatId, ids: &[PostId]) -> Result<usize> {
        let chat = self.chat_for(chat_id).await?;
        let raw: Vec<i32> = ids.iter().map(|id| id.0).collect();

        let mut attempt = self.client.delete_messages(&chat, &raw).await;
        if let Err(e) = &attempt {
            if let Some(seconds) = flood_wait_seconds(e) {
                sleep(Duration::from_secs(seconds)).await;
                attempt = self.client.delete_messages(&chat, &raw).await;
            }
        }
        attempt.map_err(|e| Error::DeleteFailed {
            count: ids.len(),
            reason: e.to_string(),
        })?;
        // Already-deleted ids are silently absorbed by the platform; report
        // the ids covered by this request.
        Ok(ids.len())
    }

    async fn search_history(
        &self,
        chat_id: ChatId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let chat = self.chat_for(chat_id).await?;
        let mut iter = self.client.search_messages(&chat).query(query).limit(limit);
        let mut posts = Vec::new();
        loop {
            match iter.next().await {
                Ok(Some(message)) => posts.push(mapping::message_to_post(&message)),
                Ok(None) => break,
                Err(e) => return Err(Error::SearchFailed(e.to_string())),
            }
        }
        Ok(posts)
    }

    async fn iter_history(&self, chat_id: ChatId, limit: usize) -> Result<Vec<Post>> {
        let chat = self.chat_for(chat_id).await?;
        let mut iter = self.client.iter_messages(&chat).limit(limit);
        let mut posts = Vec::new();
        loop {
            match iter.next().await {
                Ok(Some(message)) => posts.push(mapping::message_to_post(&message)),
                Ok(None) => break,
                Err(e) => return Err(Error::SearchFailed(e.to_string())),
            }
        }
        Ok(posts)
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<PostId> {
        let chat = self.chat_for(chat_id).await?;
        let message = self
            .client
            .send_message(&chat, InputMessage::text(text))
            .await
            .map_err(|e| Error::External(format!("send failed: {e}")))?;
        Ok(PostId(message.id()))
    }

    async fn forward_posts(&self, to: ChatId, from: ChatId, ids: &[PostId]) -> Result<usize> {
        let dest = self.chat_for(to).await?;
        let source = self.chat_for(from).await?;
        let raw: Vec<i32> = ids.iter().map(|id| id.0).collect();
        let sent = self
            .client
            .forward_messages(&dest, &raw, &source)
            .await
            .map_err(|e| Error::External(format!("forward failed: {e}")))?;
        Ok(sent.iter().flatten().count())
    }

    async fn download_media(&self, chat_id: ChatId, post_id: PostId, dest: &Path) -> Result<()> {
        let chat = self.chat_for(chat_id).await?;
        let messages = self
            .client
            .get_messages_by_id(&chat, &[post_id.0])
            .await
            .map_err(|e| Error::External(format!("fetch post: {e}")))?;
        let Some(Some(message)) = messages.into_iter().next() else {
            return Err(Error::External(format!("post {} not found", post_id.0)));
        };
        let downloaded = message
            .download_media(dest)
            .await
            .map_err(|e| Error::External(format!("download failed: {e}")))?;
        if !downloaded {
            return Err(Error::External(format!("post {} has no media", post_id.0)));
        }
        Ok(())
    }

    async fn subscribe(&self, chats: &[ChatId]) -> Result<mpsc::Receiver<PostEvent>> {
        let watched: HashSet<i64> = chats.iter().map(|c| c.0).collect();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let client = self.client.clone();
        let cache = self.chats.clone();
        tokio::spawn(async move {
            pump_updates(client, cache, watched, tx).await;
        });
        Ok(rx)
    }
}

/// Forward new/edited-message updates for the watched chats into the queue,
/// in platform delivery order. Stops when the session drops or the consumer
/// goes away.
async fn pump_updates(
    client: Client,
    cache: Arc<Mutex<HashMap<i64, Chat>>>,
    watched: HashSet<i64>,
    tx: mpsc::Sender<PostEvent>,
) {
    info!(chats = watched.len(), "watching for channel posts");
    loop {
        let update = match client.next_update().await {
            Ok(update) => update,
            Err(e) => {
                error!("update stream failed: {e}");
                break;
            }
        };

        let (message, kind) = match update {
            Update::NewMessage(m) => (m, EventKind::New),
            Update::MessageEdited(m) => (m, EventKind::Edited),
            _ => continue,
        };

        let chat = message.chat();
        if !watched.contains(&chat.id()) {
            continue;
        }
        cache.lock().await.insert(chat.id(), chat);

        let event = PostEvent {
            post: mapping::message_to_post(&message),
            kind,
        };
        if tx.send(event).await.is_err() {
            // Consumer gone; nothing left to feed.
            break;
        }
    }
    info!("update stream closed");
}
