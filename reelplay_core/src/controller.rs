use crate::amount::Amount;
use crate::config::{SlotsConfig, Timings};
use crate::error::{BetBound, SessionError, SourceError};
use crate::events::{Event, Signal, Timer};
use crate::identity::{Address, IdentityManager, SessionId, SessionIdentity};
use crate::paytable::Multiplier;
use crate::sequencer::{SpinResult, SpinSequencer, View};
use crate::settlement::SettlementRecord;
use crate::source::{OutcomeSource, PlayRequest, Poll, SettlementHandle};
use crate::variant::GameVariant;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetBounds {
    pub min: Amount,
    pub max: Amount,
}

impl BetBounds {
    pub fn check(&self, bet: Amount) -> Result<(), SessionError> {
        if bet < self.min {
            return Err(SessionError::BetOutOfRange {
                bet,
                bound: BetBound::Min,
                limit: self.min,
            });
        }
        if bet > self.max {
            return Err(SessionError::BetOutOfRange {
                bet,
                bound: BetBound::Max,
                limit: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub account: Option<Address>,
    pub bet_bounds: BetBounds,
    pub protocol_fee: Amount,
    /// Resolved once at start-up, see [`crate::source::resolve_referrer`].
    pub referrer: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub auto_spin: bool,
    pub max_spins: u8,
    pub timings: Timings,
}

impl ControllerOptions {
    pub fn from_config(config: &SlotsConfig) -> Self {
        Self {
            auto_spin: false,
            max_spins: config.limits.max_spins,
            timings: config.timings,
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&SlotsConfig::default())
    }
}

/// Bet and spin count of the last start request, reused by play-again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    pub bet: Amount,
    pub spins: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub view: View,
    pub loading: bool,
    pub game_over: bool,
    pub replay: bool,
    pub session_id: Option<SessionId>,
    pub cursor: usize,
    pub spin_count: usize,
    pub spins_left: usize,
    pub running_payout: Option<Amount>,
    pub provisional_payout: Amount,
    pub bet_per_spin: Amount,
    pub auto_spin: bool,
}

pub struct SessionController<S: OutcomeSource + ?Sized> {
    variant: Arc<dyn GameVariant>,
    source: Arc<S>,
    context: SessionContext,
    options: ControllerOptions,
    identity: IdentityManager,
    sequencer: SpinSequencer,
    // responses for any other session id are dropped
    pending: Option<SettlementHandle>,
    loading: bool,
    game_over: bool,
    auto_spin: bool,
    last_stake: Option<Stake>,
    // bumped on reset, rewatch and settlement; older timers become no-ops
    epoch: u64,
    events: VecDeque<Event>,
}

impl<S: OutcomeSource + ?Sized> SessionController<S> {
    pub fn new(
        variant: Arc<dyn GameVariant>,
        source: Arc<S>,
        context: SessionContext,
        options: ControllerOptions,
    ) -> Self {
        let mut identity = IdentityManager::new();
        identity.start_fresh();
        Self {
            variant,
            source,
            context,
            auto_spin: options.auto_spin,
            options,
            identity,
            sequencer: SpinSequencer::new(),
            pending: None,
            loading: false,
            game_over: false,
            last_stake: None,
            epoch: 0,
            events: VecDeque::new(),
        }
    }

    /// Validation failures return before anything changes.
    pub async fn request_start(&mut self, bet: Amount, spins: u32) -> Result<(), SessionError> {
        let player = self.context.account.ok_or(SessionError::WalletNotConnected)?;
        if spins == 0 || spins > self.options.max_spins as u32 {
            return Err(SessionError::InvalidSpinCount {
                requested: spins,
                max: self.options.max_spins,
            });
        }
        self.context.bet_bounds.check(bet)?;
        if self.loading {
            debug!("start already in flight");
            return Ok(());
        }
        match self.source.is_paused().await {
            Ok(true) => return Err(SessionError::GamePaused),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "pause check failed, continuing"),
        }

        // replayed ids, and ids retired by a failed settlement, are never reused
        let (session_id, random_seed) = match self.identity.current() {
            Some(SessionIdentity {
                session_id,
                seed: Some(seed),
            }) if self.pending.is_none() && self.sequencer.record().is_none() => {
                (session_id, seed)
            }
            _ => {
                self.reset_progress();
                self.identity.rotate()
            }
        };

        let request = PlayRequest {
            player,
            session_id,
            spin_count: spins as u8,
            random_seed,
            referrer: self.context.referrer,
            bet,
            fee: self.context.protocol_fee,
        };
        self.last_stake = Some(Stake {
            bet,
            spins: spins as u8,
        });
        self.set_loading(true);
        info!(%session_id, %bet, spins, value = %request.value(), "submitting session");

        match self.source.submit(&request).await {
            Ok(handle) => {
                debug!(%session_id, receipt = ?handle.receipt, "submission acknowledged");
                self.pending = Some(handle);
                Ok(())
            }
            Err(SourceError::TransactionNotFound) => {
                warn!(%session_id, "ignoring a known timeout error");
                self.pending = Some(SettlementHandle::for_session(session_id));
                Ok(())
            }
            Err(SourceError::Rejected(reason)) => {
                error!(%session_id, %reason, "transaction failed");
                self.abort_start(false);
                Err(SessionError::SubmissionFailed(reason))
            }
            Err(err) => {
                // the request may still have reached the oracle
                error!(%session_id, error = %err, "an unexpected error occurred");
                self.abort_start(true);
                Err(SessionError::Unexpected(err.to_string()))
            }
        }
    }

    pub async fn poll_settlement(&mut self) -> Result<bool, SessionError> {
        let Some(handle) = self.pending.clone() else {
            return Ok(false);
        };
        match self.source.poll(&handle).await {
            Ok(poll) => self.on_settlement(handle.session_id, poll),
            Err(SourceError::TransactionNotFound) => Ok(false),
            Err(err) => {
                warn!(session_id = %handle.session_id, error = %err, "settlement poll failed");
                Ok(false)
            }
        }
    }

    /// Feeds a settlement response tagged with the session it was issued for.
    pub fn on_settlement(&mut self, tag: SessionId, poll: Poll) -> Result<bool, SessionError> {
        let current = self.pending.as_ref().map(|h| h.session_id);
        if self.identity.session_id() != Some(tag) || current != Some(tag) {
            debug!(%tag, "discarding stale settlement");
            return Ok(false);
        }
        let record = match poll {
            Poll::Settled(record) if record.settled => record,
            _ => return Ok(false),
        };
        if let Err(err) = record.check_symbols(self.variant.symbol_count()) {
            error!(%tag, error = %err, "settlement does not fit this game");
            self.abort_start(true);
            return Err(SessionError::Unexpected(err.to_string()));
        }

        let spins = record.spin_count();
        if !self.sequencer.load(record) {
            error!(%tag, spins, "settlement has no playable spins");
            self.abort_start(true);
            return Err(SessionError::Unexpected(format!(
                "session {tag} settled without spins"
            )));
        }
        self.pending = None;
        self.epoch += 1;
        self.game_over = false;
        self.set_loading(false);
        info!(%tag, spins, "session settled");
        self.emit(Signal::ViewChanged(View::Ongoing));
        self.emit(Signal::PayoutUpdated(None));
        Ok(true)
    }

    pub fn load_replay(&mut self, text: &str) -> Result<SessionId, SessionError> {
        self.reset_progress();
        match self.identity.load_replay(text) {
            Ok(session_id) => {
                info!(%session_id, "loading replay");
                self.pending = Some(SettlementHandle::for_session(session_id));
                self.set_loading(true);
                Ok(session_id)
            }
            Err(err) => {
                warn!(error = %err, "rejecting replay id");
                self.emit(Signal::ViewChanged(View::Setup));
                Err(SessionError::InvalidSessionId(text.to_string()))
            }
        }
    }

    pub fn spin(&mut self) -> bool {
        match self.sequencer.advance() {
            Some(req) => {
                self.emit(Signal::SpinRequested {
                    index: req.index,
                    outcome: req.outcome,
                });
                true
            }
            None => {
                trace!("spin ignored");
                false
            }
        }
    }

    // `won` only picks the settle delay; SessionEnded reports the settled total
    pub fn on_spin_animation_finished(&mut self, won: bool, next_spin_delay: Duration) {
        let Some(result) = self
            .sequencer
            .on_animation_finished(self.variant.payout_table())
        else {
            return;
        };
        match result {
            SpinResult::Continued {
                index,
                running_payout,
                ..
            } => {
                self.emit(Signal::PayoutUpdated(Some(running_payout)));
                // decided on the index of the spin that just finished
                if self.auto_spin {
                    trace!(index, "chaining auto spin");
                    self.schedule(Timer::AutoSpin { epoch: self.epoch }, next_spin_delay);
                }
            }
            SpinResult::Completed {
                final_payout,
                won: settled_won,
                ..
            } => {
                self.emit(Signal::PayoutUpdated(Some(final_payout)));
                self.emit(Signal::ViewChanged(View::Complete));
                let delay = self.options.timings.settle_delay(won || settled_won);
                self.schedule(
                    Timer::SessionEnd {
                        epoch: self.epoch,
                        won: settled_won,
                    },
                    delay,
                );
            }
        }
    }

    pub fn fire(&mut self, timer: Timer) -> bool {
        match timer {
            Timer::AutoSpin { epoch } => {
                if epoch != self.epoch || !self.auto_spin {
                    trace!(epoch, current = self.epoch, "auto spin dropped");
                    return false;
                }
                self.spin()
            }
            Timer::SessionEnd { epoch, won } => {
                if epoch != self.epoch || self.game_over {
                    return false;
                }
                self.game_over = true;
                let final_payout = self.sequencer.running_payout().unwrap_or(Amount::ZERO);
                info!(won, %final_payout, "session ended");
                self.emit(Signal::SessionEnded { won, final_payout });
                true
            }
        }
    }

    pub fn set_auto_spin(&mut self, enabled: bool) {
        self.auto_spin = enabled;
    }

    /// New identity, cleared progress, and a fresh start with the last stake.
    pub async fn play_again(&mut self) -> Result<(), SessionError> {
        let stake = self.last_stake.ok_or(SessionError::NoPreviousStake)?;
        self.identity.rotate();
        self.reset(true);
        self.request_start(stake.bet, stake.spins as u32).await
    }

    /// Back to setup. Play-again rotates the identity itself.
    pub fn reset(&mut self, is_playing_again: bool) {
        if !is_playing_again {
            self.identity.rotate();
        }
        self.reset_progress();
        self.emit(Signal::ViewChanged(View::Setup));
        self.emit(Signal::PayoutUpdated(None));
    }

    pub fn rewatch(&mut self) -> bool {
        if !self.sequencer.rewatch() {
            return false;
        }
        self.epoch += 1;
        self.game_over = false;
        self.emit(Signal::ViewChanged(View::Ongoing));
        self.emit(Signal::PayoutUpdated(None));
        true
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn reset_progress(&mut self) {
        self.sequencer.clear();
        self.pending = None;
        self.game_over = false;
        self.epoch += 1;
        self.set_loading(false);
    }

    /// `retire_id` rotates the identity when the oracle may already hold it.
    fn abort_start(&mut self, retire_id: bool) {
        if retire_id {
            self.identity.rotate();
        }
        self.pending = None;
        self.sequencer.clear();
        self.set_loading(false);
        self.emit(Signal::ViewChanged(View::Setup));
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.emit(Signal::LoadingChanged(loading));
        }
    }

    fn emit(&mut self, signal: Signal) {
        self.events.push_back(Event::Signal(signal));
    }

    fn schedule(&mut self, timer: Timer, delay: Duration) {
        self.events.push_back(Event::Schedule { timer, delay });
    }

    pub fn set_account(&mut self, account: Option<Address>) {
        self.context.account = account;
    }

    pub fn set_bet_bounds(&mut self, bounds: BetBounds) {
        self.context.bet_bounds = bounds;
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn variant(&self) -> &dyn GameVariant {
        self.variant.as_ref()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.identity.current()
    }

    pub fn sequencer(&self) -> &SpinSequencer {
        &self.sequencer
    }

    pub fn record(&self) -> Option<&SettlementRecord> {
        self.sequencer.record()
    }

    pub fn view(&self) -> View {
        self.sequencer.view()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_awaiting_settlement(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn auto_spin(&self) -> bool {
        self.auto_spin
    }

    pub fn in_replay_mode(&self) -> bool {
        self.identity.is_replay()
    }

    pub fn last_stake(&self) -> Option<Stake> {
        self.last_stake
    }

    pub fn spins_left(&self) -> usize {
        self.sequencer.spins_left()
    }

    pub fn bet_per_spin(&self) -> Amount {
        self.record().map_or(Amount::ZERO, |r| r.bet_per_spin)
    }

    /// Experience points: whole units wagered across the session.
    pub fn exp_gained(&self) -> u128 {
        self.record().map_or(0, |r| {
            r.bet_per_spin
                .saturating_mul(r.spin_count() as u128)
                .whole_units()
        })
    }

    pub fn is_original_player(&self) -> bool {
        match (self.context.account, self.record()) {
            (Some(account), Some(record)) => account == record.player,
            _ => false,
        }
    }

    /// Profit-and-loss badge: only for the original player, and only on a
    /// payout above one unit that beats the total bet.
    pub fn should_show_pnl(&self) -> bool {
        let (Some(payout), Some(record)) = (self.sequencer.running_payout(), self.record()) else {
            return false;
        };
        self.is_original_player() && payout > Amount::from_units(1) && payout > record.total_bet
    }

    pub fn jackpot_multiplier(&self) -> Multiplier {
        self.variant.payout_table().jackpot_multiplier()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            view: self.view(),
            loading: self.loading,
            game_over: self.game_over,
            replay: self.in_replay_mode(),
            session_id: self.identity.session_id(),
            cursor: self.sequencer.cursor(),
            spin_count: self.sequencer.spin_count(),
            spins_left: self.spins_left(),
            running_payout: self.sequencer.running_payout(),
            provisional_payout: self.sequencer.provisional_payout(),
            bet_per_spin: self.bet_per_spin(),
            auto_spin: self.auto_spin,
        }
    }
}
