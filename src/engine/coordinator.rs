use crate::common::mapping::MappingTable;
use crate::common::model::{
    CallReport, CallRequest, DispatchConfig, DispatchOutcome, GrantedEvent, GrantedNotification,
    HandleDecision, SkipReason, WaitReport,
};
use crate::engine::area_gate::{AreaGate, AreaGuard};
use crate::engine::deduplication::CallDeduplicator;
use crate::engine::lift_api::LiftApi;
use crate::engine::position_wait::PositionWait;
use crate::engine::runner::{DispatchQueue, Identifiable};
use crate::errors::Result;
use futures::future::join_all;
use log::{debug, info};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;

type ReportSubscribers = Arc<RwLock<Vec<mpsc::Sender<Arc<CallReport>>>>>;

/// A call waiting in (or running from) the dispatch queue.
struct DispatchJob {
    request: CallRequest,
    // held for the whole protocol run when area coalescing is on
    area_guard: Option<AreaGuard>,
}

impl Identifiable for DispatchJob {
    fn get_id(&self) -> String {
        self.request.call_id.to_string()
    }
}

/// Entry point for rider-granted events.
///
/// `handle` decides synchronously whether a call is skipped or enqueued; the
/// terminal outcome of every enqueued call is logged, counted and pushed to
/// report subscribers from the queue's execution task.
pub struct DispatchCoordinator {
    config: DispatchConfig,
    dedup: CallDeduplicator,
    area_gate: Option<AreaGate>,
    queue: DispatchQueue<DispatchJob>,
    subscribers: ReportSubscribers,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchCoordinator {
    /// Validates `config` and starts the queue worker and the dedup sweeper.
    /// Must be called inside a tokio runtime.
    pub fn new(config: &DispatchConfig, api: Arc<dyn LiftApi>) -> Result<Self> {
        config.validate()?;

        let dedup = CallDeduplicator::new(config.dedup_window(), config.dedup_max_entries);
        let sweeper = config
            .dedup_sweep_interval()
            .map(|interval| dedup.start_sweeper(interval));
        let area_gate = config.coalesce_area_calls.then(AreaGate::new);
        let subscribers: ReportSubscribers = Arc::new(RwLock::new(Vec::new()));

        let protocol = PositionWait::from_config(config);
        let reports = subscribers.clone();
        let execute = move |job: DispatchJob, cancel: watch::Receiver<bool>| {
            let api = api.clone();
            let reports = reports.clone();
            async move {
                let DispatchJob { request, area_guard } = job;
                let waited = protocol.run(api.as_ref(), &request, cancel).await;
                let report = CallReport::new(request, waited);
                record_outcome(&report);
                publish(&reports, report).await;
                drop(area_guard);
            }
        };
        let queue = DispatchQueue::start(
            "Dispatch",
            config.max_concurrency,
            config.queue_capacity,
            execute,
        );

        info!(
            "Dispatch coordinator started: concurrency={}, soft={}ms, deadline={}ms, dedup_window={}ms, coalesce_areas={}",
            config.max_concurrency,
            config.soft_window_ms,
            config.hard_deadline_ms,
            config.dedup_window_ms,
            config.coalesce_area_calls
        );

        Ok(Self {
            config: config.clone(),
            dedup,
            area_gate,
            queue,
            subscribers,
            sweeper: Mutex::new(sweeper),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn deduplicator(&self) -> &CallDeduplicator {
        &self.dedup
    }

    pub fn is_accepting(&self) -> bool {
        self.queue.is_accepting()
    }

    /// Skips, or enqueues a fresh call for, one granted rider.
    pub async fn handle(&self, event: GrantedEvent) -> HandleDecision {
        let GrantedEvent {
            stream_id,
            rider_key,
            destination_area,
            direction_up,
        } = event;
        let request = CallRequest::new(rider_key, destination_area, direction_up).with_stream_id(stream_id);

        let area_guard = match &self.area_gate {
            Some(gate) => match gate.try_acquire(destination_area, request.call_id) {
                Some(guard) => Some(guard),
                None => return skip(&request, SkipReason::AreaInProgress),
            },
            None => None,
        };

        if !self.dedup.try_reserve(&request.dedup_key()) {
            return skip(&request, SkipReason::Duplicate);
        }

        let call_id = request.call_id;
        let job = DispatchJob {
            request: request.clone(),
            area_guard,
        };
        match self.queue.submit(job) {
            Ok(()) => {
                debug!(
                    "Enqueued call {} for {} to area {}",
                    call_id, request.rider_key, request.destination_area
                );
                HandleDecision::Submitted(call_id)
            }
            Err(e) => {
                let report = CallReport::new(
                    request,
                    WaitReport {
                        outcome: DispatchOutcome::Failed(e),
                        elapsed: Duration::ZERO,
                        updates: Vec::new(),
                    },
                );
                record_outcome(&report);
                publish(&self.subscribers, report).await;
                counter!("dispatch_skipped_total", "reason" => SkipReason::Rejected.as_str()).increment(1);
                HandleDecision::Skipped(SkipReason::Rejected)
            }
        }
    }

    /// Resolves a raw notification through `mappings` and handles the
    /// resulting events concurrently. Decisions keep the mapping order.
    pub async fn handle_notification(
        &self,
        mappings: &MappingTable,
        notification: &GrantedNotification,
    ) -> Vec<HandleDecision> {
        let events = mappings.resolve(notification);
        join_all(events.into_iter().map(|event| self.handle(event))).await
    }

    /// Every later `CallReport` is also offered to `sender`; reports are
    /// dropped for a subscriber whose buffer is full.
    pub async fn subscribe_reports(&self, sender: mpsc::Sender<Arc<CallReport>>) {
        self.subscribers.write().await.push(sender);
    }

    /// Stops intake and waits for in-flight calls, cancelling them after the
    /// configured grace period.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.abort();
        }
        self.queue.shutdown(self.config.shutdown_grace()).await;
        info!("Dispatch coordinator stopped");
    }
}

fn skip(request: &CallRequest, reason: SkipReason) -> HandleDecision {
    tracing::info!(
        rider_key = %request.rider_key,
        destination_area = %request.destination_area,
        reason = reason.as_str(),
        "landing call skipped"
    );
    counter!("dispatch_skipped_total", "reason" => reason.as_str()).increment(1);
    HandleDecision::Skipped(reason)
}

fn record_outcome(report: &CallReport) {
    let kind = report.kind();
    let request = &report.request;
    let elapsed_ms = report.elapsed.as_millis() as u64;

    match &report.outcome {
        DispatchOutcome::Served => tracing::info!(
            call_id = %request.call_id,
            rider_key = %request.rider_key,
            destination_area = %request.destination_area,
            outcome = %kind,
            elapsed_ms,
            updates = report.updates.len(),
            "landing call served"
        ),
        DispatchOutcome::AbandonedNoUpdate => tracing::warn!(
            call_id = %request.call_id,
            rider_key = %request.rider_key,
            destination_area = %request.destination_area,
            outcome = %kind,
            elapsed_ms,
            "landing call abandoned, no position update"
        ),
        DispatchOutcome::CancelledDeadline => tracing::warn!(
            call_id = %request.call_id,
            rider_key = %request.rider_key,
            destination_area = %request.destination_area,
            outcome = %kind,
            elapsed_ms,
            updates = report.updates.len(),
            "landing call cancelled at deadline"
        ),
        DispatchOutcome::Failed(err) => tracing::error!(
            call_id = %request.call_id,
            rider_key = %request.rider_key,
            destination_area = %request.destination_area,
            outcome = %kind,
            elapsed_ms,
            error = %err,
            "landing call failed"
        ),
    }

    counter!("dispatch_outcomes_total", "outcome" => kind.as_str()).increment(1);
    histogram!("dispatch_call_duration_seconds", "outcome" => kind.as_str())
        .record(report.elapsed.as_secs_f64());
}

async fn publish(subscribers: &ReportSubscribers, report: CallReport) {
    let report = Arc::new(report);
    let mut closed = false;
    for tx in subscribers.read().await.iter() {
        match tx.try_send(report.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Report subscriber full, dropping report for {}", report.call_id());
            }
            Err(TrySendError::Closed(_)) => closed = true,
        }
    }
    if closed {
        subscribers.write().await.retain(|tx| !tx.is_closed());
    }
}
