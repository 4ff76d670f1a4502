use crate::amount::Amount;
use crate::paytable::Paytable;
use crate::settlement::SettlementRecord;
use crate::symbols::SymbolTriple;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Setup,
    Ongoing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinRequest {
    pub index: usize,
    pub outcome: SymbolTriple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinResult {
    Continued {
        index: usize,
        spin_payout: Amount,
        running_payout: Amount,
    },
    Completed {
        index: usize,
        spin_payout: Amount,
        final_payout: Amount,
        provisional_payout: Amount,
        won: bool,
    },
}

#[derive(Debug, Default)]
pub struct SpinSequencer {
    record: Option<SettlementRecord>,
    cursor: usize,
    running_payout: Option<Amount>,
    provisional_payout: Amount,
    is_animating: bool,
    view: View,
}

impl SpinSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `Ongoing` at the first spin. Unsettled or empty records are refused.
    pub fn load(&mut self, record: SettlementRecord) -> bool {
        if !record.settled || record.spin_count() == 0 {
            return false;
        }
        debug!(spins = record.spin_count(), "settlement loaded");
        self.record = Some(record);
        self.restart();
        true
    }

    /// Starts the next spin. `None` when there is nothing to spin or a spin
    /// is still animating.
    pub fn advance(&mut self) -> Option<SpinRequest> {
        let record = self.record.as_ref()?;
        if self.view != View::Ongoing || self.is_animating || self.cursor >= record.spin_count()
        {
            return None;
        }
        self.is_animating = true;
        let request = SpinRequest {
            index: self.cursor,
            outcome: record.outcomes()[self.cursor],
        };
        trace!(index = request.index, outcome = %request.outcome, "spin requested");
        Some(request)
    }

    /// Consumes the spin being animated. A repeated signal is ignored.
    pub fn on_animation_finished(&mut self, table: &Paytable) -> Option<SpinResult> {
        let record = self.record.as_ref()?;
        if !self.is_animating {
            return None;
        }
        self.is_animating = false;

        let index = self.cursor;
        let last = record.spin_count() - 1;
        let outcome = record.outcomes()[index];
        let spin_payout = record
            .bet_per_spin
            .apply_multiplier(table.lookup_triple(outcome));
        self.provisional_payout = self.provisional_payout.saturating_add(spin_payout);
        self.cursor += 1;

        if index < last {
            let running = self
                .running_payout
                .unwrap_or(Amount::ZERO)
                .saturating_add(spin_payout);
            self.running_payout = Some(running);
            return Some(SpinResult::Continued {
                index,
                spin_payout,
                running_payout: running,
            });
        }

        let final_payout = record.total_payout;
        if final_payout != self.provisional_payout {
            debug!(
                settled = %final_payout,
                accumulated = %self.provisional_payout,
                "settled total differs from accumulated spins"
            );
        }
        self.running_payout = Some(final_payout);
        self.view = View::Complete;
        Some(SpinResult::Completed {
            index,
            spin_payout,
            final_payout,
            provisional_payout: self.provisional_payout,
            won: !final_payout.is_zero(),
        })
    }

    /// Re-enters `Ongoing` at spin 0 on the same record, without re-settling.
    pub fn rewatch(&mut self) -> bool {
        if self.record.is_none() {
            return false;
        }
        self.restart();
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn restart(&mut self) {
        self.cursor = 0;
        self.running_payout = None;
        self.provisional_payout = Amount::ZERO;
        self.is_animating = false;
        self.view = View::Ongoing;
    }

    pub fn record(&self) -> Option<&SettlementRecord> {
        self.record.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn spin_count(&self) -> usize {
        self.record.as_ref().map_or(0, |r| r.spin_count())
    }

    pub fn spins_left(&self) -> usize {
        self.spin_count().saturating_sub(self.cursor)
    }

    pub fn running_payout(&self) -> Option<Amount> {
        self.running_payout
    }

    pub fn provisional_payout(&self) -> Amount {
        self.provisional_payout
    }

    pub fn is_animating(&self) -> bool {
        self.is_animating
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn can_advance(&self) -> bool {
        self.view == View::Ongoing && !self.is_animating && self.cursor < self.spin_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Address;

    fn record(outcomes: &[[u8; 3]], bet: u64, total: Amount) -> SettlementRecord {
        let outcomes: Vec<SymbolTriple> = outcomes.iter().copied().map(Into::into).collect();
        let n = outcomes.len() as u64;
        SettlementRecord::new(
            Address::ZERO,
            Amount::from_units(bet),
            Amount::from_units(bet * n),
            outcomes,
            total,
            true,
        )
        .unwrap()
    }

    #[test]
    fn nothing_happens_without_a_record() {
        let mut seq = SpinSequencer::new();
        assert!(seq.advance().is_none());
        assert!(seq.on_animation_finished(&Paytable::example_default()).is_none());
        assert!(!seq.rewatch());
        assert_eq!(seq.view(), View::Setup);
    }

    #[test]
    fn unsettled_records_are_refused() {
        let mut r = record(&[[0, 0, 0]], 1, Amount::ZERO);
        r.settled = false;
        let mut seq = SpinSequencer::new();
        assert!(!seq.load(r));
        assert_eq!(seq.view(), View::Setup);
    }

    #[test]
    fn n_finishes_walk_the_cursor_to_n() {
        let table = Paytable::example_default();
        let mut seq = SpinSequencer::new();
        seq.load(record(&[[1, 2, 3], [3, 3, 1], [4, 4, 4]], 2, Amount::from_units(10)));
        let mut completions = 0;
        for i in 0..3 {
            assert_eq!(seq.advance().unwrap().index, i);
            match seq.on_animation_finished(&table).unwrap() {
                SpinResult::Completed { .. } => completions += 1,
                SpinResult::Continued { .. } => assert_eq!(seq.view(), View::Ongoing),
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(seq.cursor(), 3);
        assert_eq!(seq.view(), View::Complete);
        assert!(seq.advance().is_none());
    }

    #[test]
    fn duplicate_finish_is_ignored() {
        let table = Paytable::example_default();
        let mut seq = SpinSequencer::new();
        seq.load(record(&[[0, 0, 0], [1, 1, 1]], 1, Amount::from_units(1)));
        seq.advance();
        assert!(seq.on_animation_finished(&table).is_some());
        assert!(seq.on_animation_finished(&table).is_none());
        assert_eq!(seq.cursor(), 1);
    }

    #[test]
    fn advance_is_refused_while_animating() {
        let mut seq = SpinSequencer::new();
        seq.load(record(&[[0, 0, 0], [1, 1, 1]], 1, Amount::ZERO));
        assert!(seq.advance().is_some());
        assert!(seq.advance().is_none());
    }

    #[test]
    fn final_payout_is_the_settled_total() {
        let table = Paytable::example_default();
        // 1-1-1 pays 50x; the settled total deliberately disagrees by a wei.
        let total = Amount::from_wei(Amount::from_units(100).wei() - 1);
        let mut seq = SpinSequencer::new();
        seq.load(record(&[[1, 1, 1], [5, 4, 3]], 2, total));
        seq.advance();
        let first = seq.on_animation_finished(&table).unwrap();
        assert_eq!(
            first,
            SpinResult::Continued {
                index: 0,
                spin_payout: Amount::from_units(100),
                running_payout: Amount::from_units(100),
            }
        );
        seq.advance();
        match seq.on_animation_finished(&table).unwrap() {
            SpinResult::Completed {
                final_payout,
                provisional_payout,
                won,
                ..
            } => {
                assert_eq!(final_payout, total);
                assert_eq!(provisional_payout, Amount::from_units(100));
                assert!(won);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(seq.running_payout(), Some(total));
    }

    #[test]
    fn rewatch_restarts_on_the_same_record() {
        let table = Paytable::example_default();
        let mut seq = SpinSequencer::new();
        seq.load(record(&[[0, 1, 2]], 1, Amount::ZERO));
        seq.advance();
        seq.on_animation_finished(&table);
        assert_eq!(seq.view(), View::Complete);
        assert!(seq.rewatch());
        assert_eq!(seq.view(), View::Ongoing);
        assert_eq!(seq.cursor(), 0);
        assert_eq!(seq.running_payout(), None);
        assert_eq!(seq.spins_left(), 1);
    }
}
