use std::{collections::VecDeque, num::NonZeroUsize};

use crate::params::LtrDecision;

/// Long-term-reference advice with hysteresis over the friendliness history.
#[derive(Debug, Clone, Default)]
pub struct LtrTracker {
    history: VecDeque<(u32, bool)>,
    decision: LtrDecision,
    retention: Option<NonZeroUsize>,
}

impl LtrTracker {
    #[must_use]
    pub fn new(retention: Option<NonZeroUsize>) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Appends one observation, evicting the oldest beyond the retention window.
    pub fn record(&mut self, frame_number: u32, friendly: bool) {
        self.history.push_back((frame_number, friendly));
        self.trim();
    }

    pub fn set_retention(&mut self, retention: Option<NonZeroUsize>) {
        self.retention = retention;
        self.trim();
    }

    fn trim(&mut self) {
        if let Some(limit) = self.retention {
            while self.history.len() > limit.get() {
                self.history.pop_front();
            }
        }
    }

    /// Re-evaluates the decision from the tail of the history.
    ///
    /// A trailing run of `good_limit` friendly observations continues LTR, a
    /// trailing run of `bad_limit` unfriendly ones stops it. Anything shorter
    /// keeps the previous decision.
    pub fn continue_ltr_mode(&mut self, good_limit: u16, bad_limit: u16) -> LtrDecision {
        let Some(&(_, last)) = self.history.back() else {
            return self.decision;
        };
        let run = self
            .history
            .iter()
            .rev()
            .take_while(|&&(_, friendly)| friendly == last)
            .count();

        if last && run >= usize::from(good_limit) {
            self.decision = LtrDecision::Continue;
        } else if !last && run >= usize::from(bad_limit) {
            self.decision = LtrDecision::Stop;
        }
        self.decision
    }

    #[must_use]
    pub fn decision(&self) -> LtrDecision {
        self.decision
    }

    /// Observations currently retained.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forgets every observation and falls back to not recommending LTR.
    pub fn reset(&mut self) {
        self.history.clear();
        self.decision = LtrDecision::Stop;
    }
}
