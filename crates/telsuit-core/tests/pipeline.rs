//! End-to-end pipeline behavior against an in-memory client: ordering,
//! short-circuits, duplicate-check gating and failure isolation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use telsuit_core::{
    compose::GlyphMap,
    domain::{ChatId, PostId},
    messaging::{
        port::ChannelClient,
        types::{EditOutcome, EventKind, FormattingRange, LinkButton, Post, PostEvent},
    },
    pipeline::{EnhancementPipeline, PipelineSettings},
    Error, Result,
};

const CHAT: ChatId = ChatId(77);

#[derive(Default)]
struct FakeClient {
    edits: Mutex<Vec<(PostId, String)>>,
    deletes: Mutex<Vec<Vec<PostId>>>,
    /// Posts visible to `search_history`.
    history: Mutex<Vec<Post>>,
    /// Posts whose edit calls fail with a transport error.
    fail_edit: Mutex<HashSet<i32>>,
    /// Posts whose edit calls come back "content unchanged".
    unchanged_edit: Mutex<HashSet<i32>>,
    /// Receiver handed out by `subscribe`; the test holds the sender.
    subscription: Mutex<Option<mpsc::Receiver<PostEvent>>>,
}

impl FakeClient {
    fn edited_ids(&self) -> Vec<i32> {
        self.edits.lock().unwrap().iter().map(|(id, _)| id.0).collect()
    }

    fn deleted_batches(&self) -> Vec<Vec<i32>> {
        self.deletes
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|id| id.0).collect())
            .collect()
    }
}

#[async_trait]
impl ChannelClient for FakeClient {
    async fn edit_post(
        &self,
        _chat_id: ChatId,
        post_id: PostId,
        text: &str,
        _ranges: &[FormattingRange],
        _buttons: Option<&[LinkButton]>,
    ) -> Result<EditOutcome> {
        if self.fail_edit.lock().unwrap().contains(&post_id.0) {
            return Err(Error::EditFailed {
                post_id: post_id.0,
                reason: "connection reset".to_string(),
            });
        }
        self.edits
            .lock()
            .unwrap()
            .push((post_id, text.to_string()));
        if self.unchanged_edit.lock().unwrap().contains(&post_id.0) {
            return Ok(EditOutcome::Unchanged);
        }
        Ok(EditOutcome::Applied)
    }

    async fn delete_posts(&self, _chat_id: ChatId, ids: &[PostId]) -> Result<usize> {
        self.deletes.lock().unwrap().push(ids.to_vec());
        Ok(ids.len())
    }

    async fn search_history(
        &self,
        _chat_id: ChatId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let mut hits: Vec<Post> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.text.contains(query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.id.cmp(&a.id));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn iter_history(&self, _chat_id: ChatId, limit: usize) -> Result<Vec<Post>> {
        let mut all = self.history.lock().unwrap().clone();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all.truncate(limit);
        Ok(all)
    }

    async fn send_message(&self, _chat_id: ChatId, _text: &str) -> Result<PostId> {
        Ok(PostId(0))
    }

    async fn forward_posts(&self, _to: ChatId, _from: ChatId, ids: &[PostId]) -> Result<usize> {
        Ok(ids.len())
    }

    async fn download_media(
        &self,
        _chat_id: ChatId,
        _post_id: PostId,
        _dest: &Path,
    ) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _chats: &[ChatId]) -> Result<mpsc::Receiver<PostEvent>> {
        Ok(self
            .subscription
            .lock()
            .unwrap()
            .take()
            .expect("subscription already taken"))
    }
}

fn post(id: i32, text: &str) -> Post {
    Post {
        id: PostId(id),
        chat_id: CHAT,
        text: text.to_string(),
        ranges: Vec::new(),
        date: Utc::now(),
        edited_at: None,
        media_group_id: None,
        from_channel: true,
    }
}

fn new_event(p: Post) -> PostEvent {
    PostEvent {
        post: p,
        kind: EventKind::New,
    }
}

fn edited_event(mut p: Post) -> PostEvent {
    p.edited_at = Some(Utc::now());
    PostEvent {
        post: p,
        kind: EventKind::Edited,
    }
}

fn settings() -> PipelineSettings {
    let mut glyphs = GlyphMap::new();
    glyphs.insert("🔥".to_string(), 5368);
    PipelineSettings {
        glyphs,
        keywords: vec!["SKU".to_string()],
        ..PipelineSettings::default()
    }
}

/// Build a pipeline plus the event sender feeding its queue.
fn rig(client: &Arc<FakeClient>) -> (EnhancementPipeline, mpsc::Sender<PostEvent>) {
    let (tx, rx) = mpsc::channel(32);
    *client.subscription.lock().unwrap() = Some(rx);
    let pipeline = EnhancementPipeline::new(client.clone() as Arc<dyn ChannelClient>, settings());
    (pipeline, tx)
}

#[tokio::test(start_paused = true)]
async fn tasks_apply_in_arrival_order() {
    let client = Arc::new(FakeClient::default());
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(new_event(post(1, "first 🔥"))).await.unwrap();
    tx.send(new_event(post(2, "second 🔥"))).await.unwrap();
    drop(tx);
    handle.wait().await;

    assert_eq!(client.edited_ids(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn new_channel_post_removes_older_duplicates() {
    let client = Arc::new(FakeClient::default());
    *client.history.lock().unwrap() = vec![
        post(5, "previous SKU: 127"),
        // Contains the token but not the keyword: the coarse platform
        // search returns it, local re-verification must drop it.
        post(7, "shipping code 127"),
    ];
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(new_event(post(10, "fresh item SKU: 127 🔥")))
        .await
        .unwrap();
    drop(tx);
    handle.wait().await;

    assert_eq!(client.edited_ids(), vec![10]);
    assert_eq!(client.deleted_batches(), vec![vec![5]]);
}

#[tokio::test(start_paused = true)]
async fn edited_posts_never_trigger_duplicate_check() {
    let client = Arc::new(FakeClient::default());
    *client.history.lock().unwrap() = vec![post(5, "previous SKU: 127")];
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(edited_event(post(10, "edited item SKU: 127 🔥")))
        .await
        .unwrap();
    drop(tx);
    handle.wait().await;

    // The edit itself is still applied; only the duplicate check is skipped.
    assert_eq!(client.edited_ids(), vec![10]);
    assert!(client.deleted_batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_channel_posts_skip_duplicate_check() {
    let client = Arc::new(FakeClient::default());
    *client.history.lock().unwrap() = vec![post(5, "previous SKU: 127")];
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    let mut p = post(10, "group chat SKU: 127 🔥");
    p.from_channel = false;
    tx.send(new_event(p)).await.unwrap();
    drop(tx);
    handle.wait().await;

    assert_eq!(client.edited_ids(), vec![10]);
    assert!(client.deleted_batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unchanged_posts_cause_no_platform_call() {
    let client = Arc::new(FakeClient::default());
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(new_event(post(1, "nothing to enhance here")))
        .await
        .unwrap();
    tx.send(new_event(post(2, "but this one 🔥"))).await.unwrap();
    drop(tx);
    handle.wait().await;

    // The no-op task made no call; the worker kept going.
    assert_eq!(client.edited_ids(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn edit_failure_still_runs_duplicate_check() {
    let client = Arc::new(FakeClient::default());
    *client.history.lock().unwrap() = vec![post(5, "previous SKU: 127")];
    client.fail_edit.lock().unwrap().insert(10);
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(new_event(post(10, "fresh item SKU: 127 🔥")))
        .await
        .unwrap();
    tx.send(new_event(post(11, "later post 🔥"))).await.unwrap();
    drop(tx);
    handle.wait().await;

    // Duplicates still reconciled, and the failure did not stop the worker.
    assert_eq!(client.deleted_batches(), vec![vec![5]]);
    assert_eq!(client.edited_ids(), vec![11]);
}

#[tokio::test(start_paused = true)]
async fn platform_unchanged_report_is_success() {
    let client = Arc::new(FakeClient::default());
    *client.history.lock().unwrap() = vec![post(5, "previous SKU: 127")];
    client.unchanged_edit.lock().unwrap().insert(10);
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    tx.send(new_event(post(10, "fresh item SKU: 127 🔥")))
        .await
        .unwrap();
    drop(tx);
    handle.wait().await;

    assert_eq!(client.deleted_batches(), vec![vec![5]]);
}

#[tokio::test(start_paused = true)]
async fn starting_twice_is_an_error() {
    let client = Arc::new(FakeClient::default());
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    let second = pipeline.start(&[CHAT]).await;
    assert!(matches!(second, Err(Error::PipelineAlreadyRunning)));

    drop(tx);
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn stop_halts_the_worker() {
    let client = Arc::new(FakeClient::default());
    let (pipeline, tx) = rig(&client);

    let handle = pipeline.start(&[CHAT]).await.unwrap();
    handle.stop();
    handle.wait().await;

    // Sender still open; the worker exited via the cancellation token.
    drop(tx);
    assert!(client.edited_ids().is_empty());
}
