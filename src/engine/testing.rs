use crate::common::model::{DestinationArea, Direction, PositionUpdate};
use crate::engine::lift_api::LiftApi;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Update,
    Served,
    Fail(&'static str),
    Panic,
}

/// Lift fake replaying `(delay since previous step, step)` pairs. Pends forever
/// once the script runs out.
pub(crate) struct ScriptedLift {
    script: Vec<(Duration, Step)>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedLift {
    pub(crate) fn new(script: Vec<(Duration, Step)>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LiftApi for ScriptedLift {
    async fn place_landing_call(
        &self,
        destination_area: DestinationArea,
        direction_up: bool,
        updates: mpsc::Sender<PositionUpdate>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveCall(&self.active);

        for (delay, step) in &self.script {
            tokio::time::sleep(*delay).await;
            match step {
                Step::Update => {
                    let update = PositionUpdate {
                        area: destination_area.0,
                        dir: if direction_up { Direction::Up } else { Direction::Down },
                        ..Default::default()
                    };
                    let _ = updates.send(update).await;
                }
                Step::Served => return Ok(()),
                Step::Fail(reason) => return Err(Error::lift_rejected(*reason)),
                Step::Panic => panic!("scripted lift panic"),
            }
        }
        std::future::pending::<()>().await;
        Ok(())
    }
}
