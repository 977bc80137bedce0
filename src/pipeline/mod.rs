//! Request pipeline: queueing, bounded depth, in-order response delivery
//! and cancellation (spec §4.8). Implemented as a fair mutex guarding a
//! queue plus a `oneshot` waiter per caller, matching the Design Notes'
//! "task/message-passing boundary, or a fair mutex... never held across
//! awaits of external I/O".

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;

type BoxFuture<R> = Pin<Box<dyn Future<Output = R> + Send>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline was stopped or the request was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_pipeline_depth: usize,
    pub enable_pipelining: bool,
    pub strict_ordering: bool,
    pub flush_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pipeline_depth: 8,
            enable_pipelining: true,
            strict_ordering: true,
            flush_timeout: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Default)]
struct MetricsInner {
    pipelined: AtomicU64,
    individual: AtomicU64,
    flushes: AtomicU64,
    total_depth: AtomicU64,
    errors: AtomicU64,
    out_of_order: AtomicU64,
    max_seq_sent: AtomicU64,
    any_sent: AtomicBool,
}

/// A point-in-time snapshot of the pipeline's counters (spec §4.8).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub pipelined: u64,
    pub individual: u64,
    pub flushes: u64,
    pub total_depth: u64,
    pub errors: u64,
    pub out_of_order_detections: u64,
}

struct QueuedItem<R> {
    seq: u64,
    work: BoxFuture<R>,
    responder: oneshot::Sender<Result<R, PipelineError>>,
}

/// A per-process request pipeline over work producing results of type `R`
/// (spec §4.8). Each call to [`Pipeline::submit`] enqueues one unit of
/// work; the pipeline decides, per its configuration, whether to run it
/// inline or batch it with concurrent siblings.
pub struct Pipeline<R: Send + 'static> {
    config: PipelineConfig,
    metrics: Arc<MetricsInner>,
    queue: Arc<Mutex<VecDeque<QueuedItem<R>>>>,
    stopped: Arc<AtomicBool>,
    next_seq: AtomicU64,
}

impl<R: Send + 'static> Pipeline<R> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsInner::default()),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            stopped: Arc::new(AtomicBool::new(false)),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            pipelined: self.metrics.pipelined.load(Ordering::Relaxed),
            individual: self.metrics.individual.load(Ordering::Relaxed),
            flushes: self.metrics.flushes.load(Ordering::Relaxed),
            total_depth: self.metrics.total_depth.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
            out_of_order_detections: self.metrics.out_of_order.load(Ordering::Relaxed),
        }
    }

    /// Runs `work` through the pipeline, returning its result (or a
    /// cancellation failure if the pipeline is stopped before it runs).
    pub async fn submit<F>(&self, work: F) -> Result<R, PipelineError>
    where
        F: Future<Output = R> + Send + 'static,
    {
        if !self.config.enable_pipelining {
            self.metrics.individual.fetch_add(1, Ordering::Relaxed);
            return Ok(work.await);
        }

        if self.stopped.load(Ordering::Acquire) {
            return Err(PipelineError::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.metrics.pipelined.fetch_add(1, Ordering::Relaxed);

        let (should_flush_now, should_arm_timer) = {
            let mut queue = self.queue.lock().await;
            queue.push_back(QueuedItem {
                seq,
                work: Box::pin(work),
                responder: tx,
            });
            let depth = queue.len();
            (depth >= self.config.max_pipeline_depth, depth == 1)
        };

        if should_flush_now {
            self.flush().await;
        } else if should_arm_timer {
            let queue = self.queue.clone();
            let metrics = self.metrics.clone();
            let strict = self.config.strict_ordering;
            let timeout = self.config.flush_timeout;
            let stopped = self.stopped.clone();
            tokio::spawn(async move {
                sleep(timeout).await;
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                let items: VecDeque<QueuedItem<R>> = {
                    let mut q = queue.lock().await;
                    std::mem::take(&mut *q)
                };
                if !items.is_empty() {
                    flush_batch(items, strict, metrics).await;
                }
            });
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Cancelled),
        }
    }

    async fn flush(&self) {
        let items: VecDeque<QueuedItem<R>> = {
            let mut queue = self.queue.lock().await;
            std::mem::take(&mut *queue)
        };
        flush_batch(items, self.config.strict_ordering, self.metrics.clone()).await;
    }

    /// Stops the pipeline: forbids new enqueues (handled by callers
    /// checking `submit`'s `Cancelled` result) and resumes every pending
    /// waiter with a cancellation failure (spec §4.8, §5 Cancellation).
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let items: VecDeque<QueuedItem<R>> = {
            let mut queue = self.queue.lock().await;
            std::mem::take(&mut *queue)
        };
        for item in items {
            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
            let _ = item.responder.send(Err(PipelineError::Cancelled));
        }
    }
}

async fn flush_batch<R: Send + 'static>(
    items: VecDeque<QueuedItem<R>>,
    strict_ordering: bool,
    metrics: Arc<MetricsInner>,
) {
    if items.is_empty() {
        return;
    }
    metrics.flushes.fetch_add(1, Ordering::Relaxed);
    metrics.total_depth.fetch_add(items.len() as u64, Ordering::Relaxed);

    if strict_ordering {
        let mut handles = Vec::with_capacity(items.len());
        let mut pending = Vec::with_capacity(items.len());
        for item in items {
            pending.push((item.seq, item.responder));
            handles.push(tokio::spawn(item.work));
        }
        for ((seq, responder), handle) in pending.into_iter().zip(handles) {
            match handle.await {
                Ok(value) => {
                    record_send(&metrics, seq);
                    let _ = responder.send(Ok(value));
                }
                Err(_) => {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    let _ = responder.send(Err(PipelineError::Cancelled));
                }
            }
        }
    } else {
        for item in items {
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let seq = item.seq;
                let value = item.work.await;
                record_send(&metrics, seq);
                let _ = item.responder.send(Ok(value));
            });
        }
    }
}

/// Detects a true completion-order inversion: a lower sequence number
/// being delivered after a higher one already was.
fn record_send(metrics: &MetricsInner, seq: u64) {
    if metrics.any_sent.swap(true, Ordering::AcqRel) {
        let previous_max = metrics.max_seq_sent.load(Ordering::Acquire);
        if seq < previous_max {
            metrics.out_of_order.fetch_add(1, Ordering::Relaxed);
        }
    }
    let mut current = metrics.max_seq_sent.load(Ordering::Acquire);
    while seq > current {
        match metrics.max_seq_sent.compare_exchange(
            current,
            seq,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}
