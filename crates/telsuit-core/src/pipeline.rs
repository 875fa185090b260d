//! Enhancement pipeline: a single worker per session drains post events in
//! arrival order, composes and applies the edit, then runs the duplicate
//! check for genuinely new channel posts.
//!
//! Ordering is the correctness property here: every edit recomputes ranges
//! from the post's current text, so two tasks for the same chat must never
//! be composed or applied concurrently.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    compose::{compose, CallToAction, GlyphMap},
    dedup::{DedupEngine, DEFAULT_PROBE_LIMIT, DEFAULT_SCAN_LIMIT},
    delete::{BatchDeleter, BATCH_PAUSE, DELETE_BATCH_SIZE},
    domain::ChatId,
    messaging::{
        port::ChannelClient,
        types::{EditOutcome, EventKind, PostEvent},
    },
    Error, Result,
};

/// Spacing between tasks. This throttles the combined rate of edit + search
/// + delete calls against the platform and is additive with the deletion
/// executor's own batch pause.
pub const INTER_TASK_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub glyphs: GlyphMap,
    pub keywords: Vec<String>,
    pub call_to_action: Option<CallToAction>,
    pub inter_task_delay: Duration,
    pub probe_limit: usize,
    pub batch_pause: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            glyphs: GlyphMap::new(),
            keywords: Vec::new(),
            call_to_action: None,
            inter_task_delay: INTER_TASK_DELAY,
            probe_limit: DEFAULT_PROBE_LIMIT,
            batch_pause: BATCH_PAUSE,
        }
    }
}

/// Lifecycle of one queued task. Terminal states never stop the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Composing,
    Applying,
    PostHookRunning,
    Done,
    Failed,
}

pub struct EnhancementPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn ChannelClient>,
    engine: DedupEngine,
    deleter: BatchDeleter,
    glyphs: GlyphMap,
    keywords: Vec<String>,
    call_to_action: Option<CallToAction>,
    inter_task_delay: Duration,
    running: AtomicBool,
}

/// Control handle for a started worker. Owned by the caller; dropping it
/// does not stop the worker, `stop()` does.
pub struct PipelineHandle {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the worker when cancelled; handy for signal handlers.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the worker to finish (session end or `stop()`).
    pub async fn wait(self) {
        let _ = self.worker.await;
    }
}

impl EnhancementPipeline {
    pub fn new(client: Arc<dyn ChannelClient>, settings: PipelineSettings) -> Self {
        let engine =
            DedupEngine::with_limits(client.clone(), DEFAULT_SCAN_LIMIT, settings.probe_limit);
        let deleter =
            BatchDeleter::with_pacing(client.clone(), DELETE_BATCH_SIZE, settings.batch_pause);
        Self {
            inner: Arc::new(Inner {
                client,
                engine,
                deleter,
                glyphs: settings.glyphs,
                keywords: settings.keywords,
                call_to_action: settings.call_to_action,
                inter_task_delay: settings.inter_task_delay,
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to the given channels and start the single worker.
    ///
    /// Starting a second worker while one is live is a caller error, not a
    /// silent no-op.
    pub async fn start(&self, channels: &[ChatId]) -> Result<PipelineHandle> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(Error::PipelineAlreadyRunning);
        }

        let queue = match self.inner.client.subscribe(channels).await {
            Ok(rx) => rx,
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let inner = self.inner.clone();
        let token = cancel.clone();
        let worker = tokio::spawn(async move {
            worker_loop(inner, queue, token).await;
        });

        Ok(PipelineHandle { cancel, worker })
    }
}

async fn worker_loop(inner: Arc<Inner>, mut queue: mpsc::Receiver<PostEvent>, cancel: CancellationToken) {
    info!("enhancement worker started");
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = queue.recv() => match event {
                Some(event) => event,
                // Stream closed: the session is gone.
                None => break,
            },
        };

        debug!(post = event.post.id.0, status = ?TaskStatus::Queued, "task dequeued");
        let status = process_task(&inner, &event).await;
        debug!(post = event.post.id.0, ?status, "task finished");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(inner.inter_task_delay) => {}
        }
    }
    inner.running.store(false, Ordering::SeqCst);
    info!("enhancement worker stopped");
}

async fn process_task(inner: &Inner, event: &PostEvent) -> TaskStatus {
    let post = &event.post;
    debug!(post = post.id.0, kind = ?event.kind, status = ?TaskStatus::Composing, "composing edit");

    let composition = match compose(
        &post.text,
        &post.ranges,
        &inner.glyphs,
        inner.call_to_action.as_ref(),
    ) {
        Ok(c) => c,
        Err(e) => {
            error!(post = post.id.0, chat = post.chat_id.0, "compose failed: {e}");
            return TaskStatus::Failed;
        }
    };

    if !composition.changed {
        // Required short-circuit: a no-op edit call is itself an error
        // condition on the platform side.
        debug!(post = post.id.0, "no change needed");
        return TaskStatus::Done;
    }

    debug!(post = post.id.0, status = ?TaskStatus::Applying, "applying edit");
    let mut failed = false;
    match inner
        .client
        .edit_post(
            post.chat_id,
            post.id,
            &composition.text,
            &composition.ranges,
            None,
        )
        .await
    {
        Ok(EditOutcome::Applied) => {
            info!(post = post.id.0, chat = post.chat_id.0, "post enhanced");
        }
        Ok(EditOutcome::Unchanged) => {
            debug!(post = post.id.0, "platform reports content unchanged");
        }
        Err(e) => {
            // Logged only; the duplicate check below still runs.
            error!(post = post.id.0, chat = post.chat_id.0, "edit failed: {e}");
            failed = true;
        }
    }

    if post.edited_at.is_none() && post.from_channel {
        debug!(post = post.id.0, status = ?TaskStatus::PostHookRunning, "running duplicate check");
        if let Err(e) = inner
            .engine
            .reconcile_post(post, &inner.keywords, &inner.deleter)
            .await
        {
            warn!(post = post.id.0, "duplicate check failed: {e}");
        }
    } else {
        debug!(post = post.id.0, "duplicate check skipped (edited or non-channel)");
    }

    if failed {
        TaskStatus::Failed
    } else {
        TaskStatus::Done
    }
}

/// Cleaner-only live monitor: run the duplicate check for every new post in
/// the given channels without touching the posts themselves.
pub async fn run_cleaner_monitor(
    client: Arc<dyn ChannelClient>,
    channels: &[ChatId],
    keywords: Vec<String>,
    cancel: CancellationToken,
) -> Result<()> {
    let engine = DedupEngine::new(client.clone());
    let deleter = BatchDeleter::new(client.clone());
    let mut queue = client.subscribe(channels).await?;

    info!("cleaner monitor started");
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = queue.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if event.kind != EventKind::New || event.post.text.trim().is_empty() {
            continue;
        }
        if let Err(e) = engine
            .reconcile_post(&event.post, &keywords, &deleter)
            .await
        {
            warn!(post = event.post.id.0, "duplicate check failed: {e}");
        }
    }
    info!("cleaner monitor stopped");
    Ok(())
}
