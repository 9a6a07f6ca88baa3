//! Debounced, coalescing queue for project quadrant moves.
//!
//! Dragging cards around the matrix produces bursts of moves. They are
//! collected for `debounce_ms` after the first one, coalesced so only the
//! latest quadrant per project survives, and written in chunks of at most
//! `max_batch` rows, one transaction per chunk.

use crate::backoff::RetryPolicy;
use crate::config::MovesConfig;
use crate::db::Database;
use crate::db::moves::QueuedMove;
use crate::types::Quadrant;
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

enum Command {
    Enqueue(Vec<QueuedMove>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    coalesced: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    batches: AtomicU64,
}

/// Snapshot of the queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoveQueueStats {
    /// Moves accepted by `enqueue`.
    pub enqueued: u64,
    /// Moves dropped because a later move for the same project superseded them.
    pub coalesced: u64,
    /// Projects actually updated.
    pub applied: u64,
    /// Moves dropped after every retry failed.
    pub failed: u64,
    /// Failed batch attempts that were retried.
    pub retries: u64,
    /// Transactions committed.
    pub batches: u64,
}

/// Cloneable handle to a running move queue.
#[derive(Clone)]
pub struct MoveQueueHandle {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

/// Spawns the background worker that owns the pending moves.
pub struct MoveQueue;

impl MoveQueue {
    pub fn spawn(db: Database, config: &MovesConfig) -> MoveQueueHandle {
        let (handle, _) = Self::spawn_with_join(db, config);
        handle
    }

    /// Like [`MoveQueue::spawn`], also returning the worker's join handle.
    pub fn spawn_with_join(db: Database, config: &MovesConfig) -> (MoveQueueHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker = Worker {
            db,
            debounce: Duration::from_millis(config.debounce_ms),
            max_batch: config.max_batch.max(1),
            retry: config.retry_policy(),
            counters: Arc::clone(&counters),
        };
        let join = tokio::spawn(worker.run(rx));
        (MoveQueueHandle { tx, counters }, join)
    }
}

impl MoveQueueHandle {
    /// Queue a single move.
    pub fn enqueue(&self, user_id: &str, project_id: &str, quadrant: Quadrant) -> Result<()> {
        self.enqueue_bulk(user_id, vec![(project_id.to_string(), quadrant)])
            .map(|_| ())
    }

    /// Queue several moves for one user. Entries with an empty project id are
    /// skipped. Returns how many were queued.
    pub fn enqueue_bulk(&self, user_id: &str, moves: Vec<(String, Quadrant)>) -> Result<usize> {
        let moves: Vec<QueuedMove> = moves
            .into_iter()
            .filter(|(project_id, _)| !project_id.trim().is_empty())
            .map(|(project_id, quadrant)| QueuedMove {
                user_id: user_id.to_string(),
                project_id,
                quadrant,
            })
            .collect();
        let count = moves.len();
        if count == 0 {
            return Ok(0);
        }
        self.tx
            .send(Command::Enqueue(moves))
            .map_err(|_| anyhow!("Move queue is shut down"))?;
        self.counters
            .enqueued
            .fetch_add(count as u64, Ordering::Relaxed);
        Ok(count)
    }

    /// Write everything pending now. Resolves once the writes are done.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(done_tx))
            .map_err(|_| anyhow!("Move queue is shut down"))?;
        done_rx
            .await
            .map_err(|_| anyhow!("Move queue stopped before flushing"))
    }

    /// Flush pending moves and stop the worker.
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).is_err() {
            // Already stopped.
            return Ok(());
        }
        done_rx
            .await
            .map_err(|_| anyhow!("Move queue stopped before draining"))
    }

    pub fn stats(&self) -> MoveQueueStats {
        let c = &self.counters;
        MoveQueueStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            applied: c.applied.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            batches: c.batches.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    db: Database,
    debounce: Duration,
    max_batch: usize,
    retry: RetryPolicy,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Vec<QueuedMove> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                Some(at) => tokio::select! {
                    command = rx.recv() => command,
                    _ = sleep_until(at) => {
                        deadline = None;
                        self.process(std::mem::take(&mut pending)).await;
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            match command {
                Some(Command::Enqueue(moves)) => {
                    if pending.is_empty() {
                        deadline = Some(Instant::now() + self.debounce);
                    }
                    pending.extend(moves);
                }
                Some(Command::Flush(done)) => {
                    deadline = None;
                    self.process(std::mem::take(&mut pending)).await;
                    let _ = done.send(());
                }
                Some(Command::Shutdown(done)) => {
                    self.process(std::mem::take(&mut pending)).await;
                    info!("Move queue drained and stopped");
                    let _ = done.send(());
                    break;
                }
                None => {
                    // Every handle dropped.
                    self.process(std::mem::take(&mut pending)).await;
                    break;
                }
            }
        }
    }

    async fn process(&self, pending: Vec<QueuedMove>) {
        if pending.is_empty() {
            return;
        }
        let received = pending.len();
        let moves = coalesce(pending);
        self.counters
            .coalesced
            .fetch_add((received - moves.len()) as u64, Ordering::Relaxed);
        debug!(received, unique = moves.len(), "Processing queued moves");

        for chunk in moves.chunks(self.max_batch) {
            self.apply_chunk(chunk.to_vec()).await;
        }
    }

    async fn apply_chunk(&self, chunk: Vec<QueuedMove>) {
        let size = chunk.len() as u64;
        let chunk = Arc::new(chunk);
        let mut attempt = 1;

        loop {
            let batch = Arc::clone(&chunk);
            match self
                .db
                .call(move |db| db.apply_quadrant_moves(&batch))
                .await
            {
                Ok(applied) => {
                    self.counters
                        .applied
                        .fetch_add(applied as u64, Ordering::Relaxed);
                    self.counters.batches.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Move batch failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt, self.retry.max_attempts, e, delay
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(moves = size, "Dropping move batch after {} attempts: {}", attempt, e);
                    self.counters.failed.fetch_add(size, Ordering::Relaxed);
                    return;
                }
            }
        }
    }
}

/// Keep only the latest move per `(user, project)`, in first-seen order.
fn coalesce(moves: Vec<QueuedMove>) -> Vec<QueuedMove> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<QueuedMove> = Vec::with_capacity(moves.len());
    for mv in moves {
        let key = (mv.user_id.clone(), mv.project_id.clone());
        match index.get(&key) {
            Some(&i) => out[i].quadrant = mv.quadrant,
            None => {
                index.insert(key, out.len());
                out.push(mv);
            }
        }
    }
    out
}
