// Terminal stand-in for the reel animation layer.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use reelplay_core::{
    Amount, Event, OutcomeSource, Paytable, SessionController, SessionId, Signal, Timer, Timings,
    View,
};

/// Polls without a settlement before the loop gives up.
const MAX_IDLE_POLLS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: Option<SessionId>,
    pub spins: usize,
    pub won: bool,
    pub final_payout: Amount,
}

pub struct Presenter {
    timings: Timings,
    poll_interval: Duration,
    quiet: bool,
    stdin: Option<Lines<BufReader<Stdin>>>,
}

impl Presenter {
    pub fn new(timings: Timings, poll_interval: Duration) -> Self {
        Self {
            timings,
            poll_interval,
            quiet: false,
            stdin: None,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn say(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }

    async fn wait_for_enter(&mut self) -> anyhow::Result<()> {
        self.say("press enter to spin");
        let lines = self
            .stdin
            .get_or_insert_with(|| BufReader::new(tokio::io::stdin()).lines());
        if lines.next_line().await?.is_none() {
            anyhow::bail!("stdin closed");
        }
        Ok(())
    }

    /// Drives one session from submission (or replay load) to its end.
    pub async fn run<S>(&mut self, ctrl: &mut SessionController<S>) -> anyhow::Result<SessionSummary>
    where
        S: OutcomeSource + ?Sized,
    {
        let paytable: Paytable = ctrl.variant().payout_table().clone();
        let mut animation: Option<(Instant, bool)> = None;
        let mut timers: Vec<(Instant, Timer)> = Vec::new();
        let mut idle_polls = 0;

        loop {
            for event in ctrl.drain_events() {
                match event {
                    Event::Schedule { timer, delay } => timers.push((Instant::now() + delay, timer)),
                    Event::Signal(Signal::SpinRequested { index, outcome }) => {
                        let won = paytable.lookup_triple(outcome) > 0;
                        self.say(format!("spin {:>2}: [ {} ]", index + 1, outcome));
                        animation = Some((Instant::now() + self.timings.spin_animation, won));
                    }
                    Event::Signal(Signal::PayoutUpdated(Some(payout))) => {
                        self.say(format!("         payout so far {payout}"));
                    }
                    Event::Signal(Signal::ViewChanged(view)) => debug!(?view, "view changed"),
                    Event::Signal(Signal::LoadingChanged(loading)) => {
                        if loading {
                            self.say("waiting for settlement...");
                        }
                    }
                    Event::Signal(Signal::SessionEnded { won, final_payout }) => {
                        self.say(if won {
                            format!("you won {final_payout}")
                        } else {
                            "no win this time".to_string()
                        });
                        return Ok(SessionSummary {
                            session_id: ctrl.identity().map(|i| i.session_id),
                            spins: ctrl.sequencer().spin_count(),
                            won,
                            final_payout,
                        });
                    }
                    Event::Signal(Signal::PayoutUpdated(None)) => {}
                }
            }

            if ctrl.is_awaiting_settlement() {
                if ctrl.poll_settlement().await? {
                    continue;
                }
                idle_polls += 1;
                if idle_polls >= MAX_IDLE_POLLS {
                    anyhow::bail!("no settlement after {idle_polls} polls");
                }
                sleep(self.poll_interval).await;
                continue;
            }

            if let Some((deadline, won)) = animation.take() {
                sleep_until(deadline).await;
                ctrl.on_spin_animation_finished(won, self.timings.next_spin);
                continue;
            }

            if let Some(pos) = timers
                .iter()
                .enumerate()
                .min_by_key(|(_, (deadline, _))| *deadline)
                .map(|(pos, _)| pos)
            {
                let (deadline, timer) = timers.swap_remove(pos);
                sleep_until(deadline).await;
                ctrl.fire(timer);
                continue;
            }

            if ctrl.view() == View::Ongoing && ctrl.sequencer().can_advance() {
                if !ctrl.auto_spin() {
                    self.wait_for_enter().await?;
                }
                ctrl.spin();
                continue;
            }

            anyhow::bail!("session stalled in {:?}", ctrl.view());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelplay_core::{
        Address, BetBounds, ControllerOptions, EngineParams, GameDefinition, SessionContext,
        SimulatedOracle,
    };
    use std::sync::Arc;

    fn instant_timings() -> Timings {
        Timings {
            spin_animation: Duration::ZERO,
            next_spin: Duration::ZERO,
            win_settle: Duration::ZERO,
            loss_settle: Duration::ZERO,
        }
    }

    fn controller(oracle: Arc<SimulatedOracle>) -> SessionController<SimulatedOracle> {
        let context = SessionContext {
            account: Some(Address::from_bytes([7; 20])),
            bet_bounds: BetBounds {
                min: Amount::from_units(1),
                max: Amount::from_units(100),
            },
            protocol_fee: Amount::ZERO,
            referrer: Address::ZERO,
        };
        let options = ControllerOptions {
            auto_spin: true,
            max_spins: 15,
            timings: instant_timings(),
        };
        SessionController::new(Arc::new(GameDefinition::example()), oracle, context, options)
    }

    fn oracle() -> Arc<SimulatedOracle> {
        let game = GameDefinition::example();
        Arc::new(SimulatedOracle::new(
            "test-seed",
            EngineParams {
                paytable: game.payouts,
                symbol_count: game.symbol_count,
            },
        ))
    }

    #[tokio::test]
    async fn auto_spin_session_runs_to_the_end() {
        let oracle = oracle();
        let mut ctrl = controller(oracle.clone());
        ctrl.request_start(Amount::from_units(10), 5).await.unwrap();

        let summary = Presenter::new(instant_timings(), Duration::ZERO)
            .quiet()
            .run(&mut ctrl)
            .await
            .unwrap();
        assert_eq!(summary.spins, 5);
        let session_id = summary.session_id.unwrap();
        let record = oracle.record(&session_id).unwrap();
        assert_eq!(summary.final_payout, record.total_payout);
        assert_eq!(summary.won, !record.total_payout.is_zero());
        assert!(ctrl.is_game_over());
    }

    #[tokio::test]
    async fn play_again_then_rewatch() {
        let oracle = oracle();
        let mut ctrl = controller(oracle.clone());
        let mut presenter = Presenter::new(instant_timings(), Duration::ZERO).quiet();
        ctrl.request_start(Amount::from_units(10), 2).await.unwrap();
        let first = presenter.run(&mut ctrl).await.unwrap();

        ctrl.play_again().await.unwrap();
        let second = presenter.run(&mut ctrl).await.unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(oracle.submissions().len(), 2);

        assert!(ctrl.rewatch());
        let again = presenter.run(&mut ctrl).await.unwrap();
        assert_eq!(again, second);
        assert_eq!(oracle.submissions().len(), 2);
    }

    #[tokio::test]
    async fn unknown_replay_gives_up() {
        let mut ctrl = controller(oracle());
        ctrl.load_replay("424242").unwrap();
        let err = Presenter::new(instant_timings(), Duration::ZERO)
            .quiet()
            .run(&mut ctrl)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no settlement"));
    }
}
