use crate::common::model::{CallId, DestinationArea};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Admits at most one active call per destination area.
#[derive(Debug, Clone, Default)]
pub struct AreaGate {
    active: Arc<DashMap<DestinationArea, CallId>>,
}

impl AreaGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `area` for `call_id`. `None` while another call holds it.
    pub fn try_acquire(&self, area: DestinationArea, call_id: CallId) -> Option<AreaGuard> {
        match self.active.entry(area) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(call_id);
                Some(AreaGuard {
                    active: self.active.clone(),
                    area,
                    call_id,
                })
            }
        }
    }

    pub fn holder(&self, area: DestinationArea) -> Option<CallId> {
        self.active.get(&area).map(|entry| *entry)
    }

    pub fn active_areas(&self) -> usize {
        self.active.len()
    }
}

/// Releases its area when dropped.
#[derive(Debug)]
pub struct AreaGuard {
    active: Arc<DashMap<DestinationArea, CallId>>,
    area: DestinationArea,
    call_id: CallId,
}

impl AreaGuard {
    pub fn area(&self) -> DestinationArea {
        self.area
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }
}

impl Drop for AreaGuard {
    fn drop(&mut self) {
        let call_id = self.call_id;
        self.active.remove_if(&self.area, |_, holder| *holder == call_id);
    }
}
