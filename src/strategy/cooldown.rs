//! Per-direction cooldown with strength escalation
//!
//! Within the cooldown window after an accepted signal, a repeat signal in
//! the same direction is suppressed unless it escalates Normal → Strong.

use crate::pipeline::types::{SignalDirection, SignalStrength};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedTrigger {
    pub strength: SignalStrength,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CooldownTracker {
    cooldown: Duration,
    history: HashMap<SignalDirection, AcceptedTrigger>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}

impl CooldownTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            history: HashMap::new(),
        }
    }

    /// Decide whether a triggered signal is accepted, recording it if so
    ///
    /// A timestamp earlier than the stored one counts as inside the window.
    pub fn admit(&mut self, direction: SignalDirection, strength: SignalStrength, at: DateTime<Utc>) -> bool {
        let accepted = match self.history.get(&direction) {
            None => true,
            Some(last) => {
                let elapsed = at - last.timestamp;
                elapsed >= self.cooldown
                    || (strength == SignalStrength::Strong && last.strength == SignalStrength::Normal)
            }
        };

        if accepted {
            self.history.insert(direction, AcceptedTrigger { strength, timestamp: at });
        }
        accepted
    }

    pub fn last_accepted(&self, direction: SignalDirection) -> Option<AcceptedTrigger> {
        self.history.get(&direction).copied()
    }
}
