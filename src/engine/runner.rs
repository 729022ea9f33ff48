use crate::errors::{QueueError, Result};
use log::{debug, error, info, warn};
use metrics::{counter, gauge};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Items carried by a [`DispatchQueue`] expose an id for logs and spans.
pub trait Identifiable {
    fn get_id(&self) -> String;
}

/// Bounded FIFO buffer feeding at most `concurrency` parallel executions.
///
/// Producers never wait: an item that finds the buffer full is refused. Every execution runs
/// in its own task and receives the queue's cancellation signal, which flips to
/// `true` when a graceful shutdown overruns its grace period.
pub struct DispatchQueue<T> {
    name: String,
    metric_label: String,
    concurrency: usize,
    sender: mpsc::Sender<T>,
    accepting: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    cancel_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T> DispatchQueue<T>
where
    T: Identifiable + Send + 'static,
{
    /// Spawns the worker loop. Must be called inside a tokio runtime.
    pub fn start<F, Fut>(name: &str, concurrency: usize, capacity: usize, execute_fn: F) -> Self
    where
        F: Fn(T, watch::Receiver<bool>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let concurrency = concurrency.max(1);
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let metric_label = name.to_lowercase();

        let worker = QueueWorker {
            name: name.to_string(),
            metric_label: metric_label.clone(),
            shutdown_rx,
            cancel_rx,
            concurrency,
        };
        let handle = tokio::spawn(worker.run(receiver, execute_fn));

        Self {
            name: name.to_string(),
            metric_label,
            concurrency,
            sender,
            accepting: AtomicBool::new(true),
            shutdown_tx,
            cancel_tx,
            worker: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Number of items buffered and not yet picked up by the worker.
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Enqueues `item` without waiting. A full buffer refuses it with [`QueueError::Full`].
    pub fn submit(&self, item: T) -> Result<()> {
        if !self.is_accepting() {
            return Err(QueueError::ShuttingDown.into());
        }

        let item_id = item.get_id();
        match self.sender.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counter!("dispatch_queue_rejected_total", "queue" => self.metric_label.clone()).increment(1);
                warn!(
                    "{} queue full ({} buffered), refusing {}",
                    self.name,
                    self.sender.max_capacity(),
                    item_id
                );
                return Err(QueueError::Full.into());
            }
            Err(TrySendError::Closed(_)) => {
                warn!("{} queue closed before {} was accepted", self.name, item_id);
                return Err(QueueError::Closed.into());
            }
        }

        gauge!("dispatch_queue_depth", "queue" => self.metric_label.clone()).set(self.depth() as f64);
        Ok(())
    }

    /// Stops intake, lets buffered and running items finish, and cancels
    /// whatever is still running after `grace`. Returns once every execution ended.
    pub async fn shutdown(&self, grace: Duration) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            info!("{} queue shutting down (grace={}ms)", self.name, grace.as_millis());
        }
        let _ = self.shutdown_tx.send(());

        let Some(mut worker) = self.worker.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    error!("{} queue worker terminated abnormally: {}", self.name, e);
                }
            }
            Err(_) => {
                warn!(
                    "{} queue did not drain within {}ms, cancelling in-flight calls",
                    self.name,
                    grace.as_millis()
                );
                self.cancel_tx.send_replace(true);
                if let Err(e) = worker.await {
                    error!("{} queue worker terminated abnormally: {}", self.name, e);
                }
            }
        }
        info!("{} queue stopped", self.name);
    }
}

struct QueueWorker {
    name: String,
    metric_label: String,
    shutdown_rx: broadcast::Receiver<()>,
    cancel_rx: watch::Receiver<bool>,
    concurrency: usize,
}

impl QueueWorker {
    async fn run<T, F, Fut>(mut self, mut rx: mpsc::Receiver<T>, execute_fn: F)
    where
        T: Identifiable + Send + 'static,
        F: Fn(T, watch::Receiver<bool>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!("Starting {} queue with concurrency {}", self.name, self.concurrency);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut draining = false;
        let mut dispatched: u64 = 0;

        loop {
            let next = if draining {
                rx.recv().await
            } else {
                tokio::select! {
                    biased;
                    _ = self.shutdown_rx.recv() => {
                        info!("{} queue received shutdown signal, draining {} buffered items", self.name, rx.len());
                        rx.close();
                        draining = true;
                        continue;
                    }
                    item = rx.recv() => item,
                }
            };

            let Some(item) = next else {
                info!("{} channel closed", self.name);
                break;
            };
            gauge!("dispatch_queue_depth", "queue" => self.metric_label.clone()).set(rx.len() as f64);

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            dispatched += 1;
            if dispatched % 1000 == 0 {
                debug!("{} queue: dispatched {} items", self.name, dispatched);
            }

            let execute_fn = execute_fn.clone();
            let cancel = self.cancel_rx.clone();
            let item_id = item.get_id();
            let queue_name = self.name.clone();
            let metric_label = self.metric_label.clone();
            let span = tracing::info_span!("dispatch_execution", queue = %metric_label, item_id = %item_id);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    gauge!("dispatch_active_calls", "queue" => metric_label.clone()).increment(1.0);
                    // inner task so a panic stays inside this execution
                    if let Err(e) = tokio::spawn(execute_fn(item, cancel)).await {
                        if e.is_panic() {
                            error!("{} execution {} panicked", queue_name, item_id);
                        } else {
                            error!("{} execution {} aborted: {}", queue_name, item_id, e);
                        }
                    }
                    gauge!("dispatch_active_calls", "queue" => metric_label).decrement(1.0);
                }
                .instrument(span),
            );
        }

        // wait for every running execution to give its permit back
        let permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        let _ = semaphore.acquire_many(permits).await;
        info!("{} queue loop ended after {} items", self.name, dispatched);
    }
}
