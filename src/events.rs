use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

#[derive(Serialize, Clone, Debug)]
pub struct SessionEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub tick: u64,
    /// Session clock when the event fired.
    pub at_ms: u64,
}

/// Bounded log of gameplay events. Consumers drain it; anything older than
/// `MAX_EVENTS` entries is dropped and counted.
#[derive(Default, Debug)]
pub struct SessionEventBus {
    pub recent: VecDeque<SessionEvent>,
    pub tick: u64,
    pub dropped_events: u64,
    last_overflow_log_tick: u64,
}

impl SessionEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value, at_ms: u64) {
        self.recent.push_back(SessionEvent {
            name: name.into(),
            data,
            tick: self.tick,
            at_ms,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.tick.saturating_sub(self.last_overflow_log_tick) >= 60 {
                self.last_overflow_log_tick = self.tick;
                warn!(
                    "[GhostMaze events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn advance_tick(&mut self) {
        self.tick = self.tick.saturating_add(1);
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        self.recent.drain(..).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.recent.iter().filter(|e| e.name == name).count()
    }
}
