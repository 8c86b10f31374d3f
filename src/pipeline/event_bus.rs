// src/pipeline/event_bus.rs
//
// Bounded queue of occupancy events. The engine publishes; the caller
// drains whenever it likes. When nobody drains, the oldest events go.

use crate::analysis::ZoneTransition;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyEvent {
    pub frame_id: u64,
    pub timestamp: f64,
    pub zone_id: String,
    #[serde(flatten)]
    pub kind: ZoneTransition,
}

impl OccupancyEvent {
    pub fn new(frame_id: u64, timestamp: f64, zone_id: &str, kind: ZoneTransition) -> Self {
        Self {
            frame_id,
            timestamp,
            zone_id: zone_id.to_string(),
            kind,
        }
    }

    pub fn is_occupancy_change(&self) -> bool {
        matches!(
            self.kind,
            ZoneTransition::Occupied { .. } | ZoneTransition::Vacated
        )
    }
}

pub struct EventBus {
    events: VecDeque<OccupancyEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: OccupancyEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<OccupancyEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
