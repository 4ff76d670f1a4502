use crate::amount::Amount;
use crate::sequencer::View;
use crate::symbols::SymbolTriple;
use std::time::Duration;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ViewChanged(View),
    LoadingChanged(bool),
    SpinRequested { index: usize, outcome: SymbolTriple },
    PayoutUpdated(Option<Amount>),
    SessionEnded { won: bool, final_payout: Amount },
}

/// Deferred work the caller must hand back through `SessionController::fire`.
///
/// `epoch` is the controller epoch at scheduling time; anything that resets
/// progress bumps the epoch and turns older timers into no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    AutoSpin { epoch: u64 },
    SessionEnd { epoch: u64, won: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Signal(Signal),
    Schedule { timer: Timer, delay: Duration },
}

impl Event {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Event::Signal(s) => Some(s),
            Event::Schedule { .. } => None,
        }
    }
}
