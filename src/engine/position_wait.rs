use crate::common::model::{CallRequest, DispatchConfig, DispatchOutcome, WaitReport};
use crate::engine::lift_api::{LiftApi, landing_call_action};
use log::debug;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

const UPDATE_BUFFER: usize = 64;

/// "Wait until served or stale" protocol for a single landing call.
///
/// One `select!` races the upstream call, the position stream, the soft
/// window, the hard deadline and the outer cancellation signal:
///
/// - the call resolving `Ok` is `Served` (wins ties), an `Err` is `Failed`;
/// - no position update within `soft_window` is `AbandonedNoUpdate`;
/// - the first update disarms the soft window for good;
/// - `hard_deadline` with progress, or outer cancellation, is `CancelledDeadline`.
///
/// Whatever ends the wait drops the upstream future, cancelling the call.
#[derive(Debug, Clone, Copy)]
pub struct PositionWait {
    soft_window: Duration,
    hard_deadline: Duration,
}

impl PositionWait {
    pub fn new(soft_window: Duration, hard_deadline: Duration) -> Self {
        Self {
            soft_window,
            hard_deadline,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.soft_window(), config.hard_deadline())
    }

    pub fn soft_window(&self) -> Duration {
        self.soft_window
    }

    pub fn hard_deadline(&self) -> Duration {
        self.hard_deadline
    }

    pub async fn run(
        &self,
        api: &dyn LiftApi,
        request: &CallRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> WaitReport {
        let started = Instant::now();
        let mut updates = Vec::new();

        if *cancel.borrow() {
            debug!("Call {} cancelled before start, not sent upstream", request.call_id);
            return WaitReport {
                outcome: DispatchOutcome::CancelledDeadline,
                elapsed: started.elapsed(),
                updates,
            };
        }

        debug!(
            "Placing landing call {} (action {}) to area {}",
            request.call_id,
            landing_call_action(request.direction_up),
            request.destination_area
        );

        let (updates_tx, mut updates_rx) = mpsc::channel(UPDATE_BUFFER);
        let mut call = api.place_landing_call(request.destination_area, request.direction_up, updates_tx);

        let soft = time::sleep(self.soft_window);
        let hard = time::sleep(self.hard_deadline);
        tokio::pin!(soft, hard);
        let mut soft_armed = true;
        let mut stream_open = true;

        let outcome = loop {
            tokio::select! {
                biased;
                result = &mut call => {
                    break match result {
                        Ok(()) => {
                            while let Ok(update) = updates_rx.try_recv() {
                                updates.push(update);
                            }
                            DispatchOutcome::Served
                        }
                        Err(e) => DispatchOutcome::Failed(e),
                    };
                }
                update = updates_rx.recv(), if stream_open => {
                    match update {
                        Some(update) => {
                            debug!(
                                "Call {}: position area={} moving={} door={}",
                                request.call_id,
                                update.area,
                                update.is_moving(),
                                update.door
                            );
                            soft_armed = false;
                            updates.push(update);
                        }
                        None => stream_open = false,
                    }
                }
                _ = &mut soft, if soft_armed => {
                    break DispatchOutcome::AbandonedNoUpdate;
                }
                _ = &mut hard => {
                    break if updates.is_empty() {
                        DispatchOutcome::AbandonedNoUpdate
                    } else {
                        DispatchOutcome::CancelledDeadline
                    };
                }
                _ = cancelled(&mut cancel) => {
                    debug!("Call {} interrupted by queue cancellation", request.call_id);
                    break DispatchOutcome::CancelledDeadline;
                }
            }
        };
        drop(call);

        WaitReport {
            outcome,
            elapsed: started.elapsed(),
            updates,
        }
    }
}

/// Resolves once `cancel` turns true. Pends forever if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::model::{DestinationArea, OutcomeKind, RiderKey};
    use crate::engine::testing::{ScriptedLift, Step};
    use std::sync::Arc;

    fn protocol() -> PositionWait {
        PositionWait::new(Duration::from_secs(3), Duration::from_secs(15))
    }

    fn request() -> CallRequest {
        CallRequest::new(RiderKey::new("R1"), DestinationArea(42), true)
    }

    fn idle_cancel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn assert_near(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(100),
            "elapsed {actual:?}, expected about {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn served_short_circuits_with_updates() {
        let lift = ScriptedLift::new(vec![
            (secs(1), Step::Update),
            (Duration::from_millis(500), Step::Update),
            (Duration::from_millis(500), Step::Served),
        ]);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        assert!(report.outcome.is_served());
        assert_eq!(report.updates.len(), 2);
        assert_near(report.elapsed, secs(2));
        assert_eq!(lift.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandons_early_without_updates() {
        let lift = ScriptedLift::new(vec![]);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::AbandonedNoUpdate);
        assert!(report.updates.is_empty());
        assert_near(report.elapsed, secs(3));
        // upstream future dropped
        assert_eq!(lift.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_a_progressing_call() {
        let mut script = vec![(Duration::from_millis(500), Step::Update)];
        script.extend((0..20).map(|_| (secs(2), Step::Update)));
        let lift = ScriptedLift::new(script);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::CancelledDeadline);
        assert_near(report.elapsed, secs(15));
        assert_eq!(report.updates.len(), 8);
        assert_eq!(lift.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_window_is_not_rearmed_after_first_update() {
        let lift = ScriptedLift::new(vec![(secs(1), Step::Update)]);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::CancelledDeadline);
        assert_eq!(report.updates.len(), 1);
        assert_near(report.elapsed, secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn served_wins_tie_with_soft_window() {
        let lift = ScriptedLift::new(vec![(secs(3), Step::Served)]);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        assert!(report.outcome.is_served());
        assert_near(report.elapsed, secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_error_fails_the_call() {
        let lift = ScriptedLift::new(vec![
            (Duration::from_millis(200), Step::Update),
            (Duration::from_millis(300), Step::Fail("door fault")),
        ]);
        let (_tx, cancel) = idle_cancel();

        let report = protocol().run(&lift, &request(), cancel).await;

        let err = report.outcome.error().expect("failed outcome");
        assert!(err.is_lift_api());
        assert!(err.to_string().contains("door fault"));
        assert_eq!(report.updates.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_skips_upstream() {
        let lift = ScriptedLift::new(vec![(secs(1), Step::Served)]);
        let (tx, cancel) = idle_cancel();
        tx.send_replace(true);

        let report = protocol().run(&lift, &request(), cancel).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::CancelledDeadline);
        assert_eq!(report.elapsed, Duration::ZERO);
        assert_eq!(lift.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn outer_cancellation_interrupts_the_wait() {
        let lift = Arc::new(ScriptedLift::new(vec![(secs(1), Step::Update)]));
        let (tx, cancel) = idle_cancel();
        tokio::spawn(async move {
            time::sleep(secs(5)).await;
            tx.send_replace(true);
        });

        let report = protocol().run(lift.as_ref(), &request(), cancel).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::CancelledDeadline);
        assert_near(report.elapsed, secs(5));
        assert_eq!(lift.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_cancel_sender_is_not_a_cancellation() {
        let lift = ScriptedLift::new(vec![(secs(1), Step::Served)]);
        let (tx, cancel) = idle_cancel();
        drop(tx);

        let report = protocol().run(&lift, &request(), cancel).await;
        assert!(report.outcome.is_served());
    }
}
