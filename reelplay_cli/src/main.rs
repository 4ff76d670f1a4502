mod http;
mod presenter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use reelplay_core::{
    replay_id_from_query, resolve_referrer, verify_outcomes, Address, Amount, BetBounds,
    ControllerOptions, EngineParams, GameDefinition, GameVariant, OutcomeSource, RandomSeed,
    ReferrerStore, SessionContext, SessionController, SessionId, SimulatedOracle, SlotsConfig,
    SymbolTriple, Word256,
};
use reelplay_shared::SessionLogEntry;

use crate::http::HttpOutcomeSource;
use crate::presenter::Presenter;

#[derive(Parser)]
#[command(name = "reelplay", about = "Terminal client and admin CLI for reelplay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://reelplay.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// Game config file
    #[arg(long, env = "REELPLAY_CONFIG", default_value = "reelplay.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a session against the oracle
    Play {
        /// Bet in whole units, e.g. 10 or 2.5; defaults to the minimum bet
        #[arg(long)]
        bet: Option<Amount>,
        #[arg(long)]
        spins: Option<u32>,
        #[arg(long, env = "REELPLAY_ACCOUNT")]
        account: Option<Address>,
        #[arg(long, env = "REELPLAY_REFERRER")]
        referrer: Option<String>,
        /// Wait for enter before every spin
        #[arg(long)]
        manual: bool,
        /// Sessions to play back to back with the same stake
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        /// Watch the last session again once it ends
        #[arg(long)]
        rewatch: bool,
        /// Settle in-process instead of calling the server
        #[arg(long)]
        offline: bool,
    },
    /// Replay a settled session from its id or share link query
    Replay {
        id: String,
        #[arg(long)]
        manual: bool,
    },
    /// Recompute a stored session's outcomes from the revealed seed
    Verify {
        session_id: SessionId,
        /// Seed in use when the session was played, if it has been rotated since
        #[arg(long)]
        server_seed: Option<String>,
    },
    /// Rotate server seed to a new secret; random when omitted
    RotateSeed { new_seed: Option<String> },
    /// View last N sessions
    ViewLogs {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export sessions to CSV path
    ExportCsv { path: String },
}

/// Referrer given on the command line or in the environment.
struct ArgReferrer(Option<String>);

#[async_trait]
impl ReferrerStore for ArgReferrer {
    async fn stored_referrer(&self, _account: Option<&Address>) -> Option<String> {
        self.0.clone()
    }
}

async fn get_pool(url: Option<String>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or_else(|| "sqlite://reelplay.db".into());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

fn log_entry(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<SessionLogEntry> {
    let ts: String = r.get("ts");
    Ok(SessionLogEntry {
        session_id: r.get("session_id"),
        ts: DateTime::parse_from_rfc3339(&ts)?.with_timezone(&Utc),
        player: r.get("player"),
        random_word: r.get("random_word"),
        server_seed_hash: r.get("server_seed_hash"),
        num_spins: u8::try_from(r.get::<i64, _>("num_spins"))?,
        bet_per_spin: r.get("bet_per_spin"),
        total_payout: r.get("total_payout"),
    })
}

const LOG_COLUMNS: &str =
    "session_id, ts, player, random_word, server_seed_hash, num_spins, bet_per_spin, total_payout";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = SlotsConfig::load(&cli.config)?;

    match cli.command {
        Commands::Play {
            bet,
            spins,
            account,
            referrer,
            manual,
            rounds,
            rewatch,
            offline,
        } => {
            let game = Arc::new(config.game_definition()?);
            let source: Arc<dyn OutcomeSource> = if offline {
                Arc::new(SimulatedOracle::new(
                    Word256::random().to_hex(),
                    EngineParams {
                        paytable: game.payouts.clone(),
                        symbol_count: game.symbol_count,
                    },
                ))
            } else {
                Arc::new(HttpOutcomeSource::new(config.oracle.base_url.clone())?)
            };
            let referrer = resolve_referrer(&ArgReferrer(referrer), account.as_ref()).await;
            let mut ctrl = controller(&config, game, source, account, referrer, !manual);
            let mut presenter = Presenter::new(config.timings, config.oracle.poll_interval);

            let bet = bet.unwrap_or(config.limits.min_bet);
            let spins = spins.unwrap_or(config.limits.default_spins as u32);
            println!("{} | bet {} over {} spins", ctrl.variant().title(), bet, spins);
            ctrl.request_start(bet, spins).await?;
            for round in 1..=rounds.max(1) {
                if round > 1 {
                    ctrl.play_again().await?;
                }
                let summary = presenter.run(&mut ctrl).await?;
                if let Some(id) = summary.session_id {
                    println!("session {id} (exp +{})", ctrl.exp_gained());
                }
            }
            if rewatch && ctrl.rewatch() {
                println!("rewatching");
                presenter.run(&mut ctrl).await?;
            }
        }
        Commands::Replay { id, manual } => {
            let game = Arc::new(config.game_definition()?);
            let source: Arc<dyn OutcomeSource> =
                Arc::new(HttpOutcomeSource::new(config.oracle.base_url.clone())?);
            let id = if id.contains('=') {
                replay_id_from_query(&id)
                    .ok_or_else(|| anyhow::anyhow!("no id in {id}"))?
                    .to_string()
            } else {
                id
            };
            let mut ctrl = controller(&config, game, source, None, Address::ZERO, !manual);
            let session_id = ctrl.load_replay(&id)?;
            println!("replaying session {session_id}");
            let summary = Presenter::new(config.timings, config.oracle.poll_interval)
                .run(&mut ctrl)
                .await?;
            if let Some(record) = ctrl.record() {
                println!(
                    "played by {} for {} per spin, paid {}",
                    record.player, record.bet_per_spin, summary.final_payout
                );
            }
        }
        Commands::Verify {
            session_id,
            server_seed,
        } => {
            let pool = get_pool(cli.database_url).await?;
            let game = config.game_definition()?;
            let row = sqlx::query(
                "SELECT random_word, server_seed_hash, outcomes_json FROM sessions WHERE session_id = ?",
            )
            .bind(session_id.to_string())
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("session {session_id} not found"))?;
            let seed = match server_seed {
                Some(seed) => seed,
                None => {
                    sqlx::query("SELECT server_seed FROM params WHERE id = 1")
                        .fetch_one(&pool)
                        .await?
                        .get::<String, _>("server_seed")
                }
            };
            let expected_hash: String = row.get("server_seed_hash");
            let hash = hex::encode(Sha256::digest(seed.as_bytes()));
            if hash != expected_hash {
                anyhow::bail!(
                    "seed hash {hash} does not match the session's {expected_hash}; pass --server-seed"
                );
            }
            let random_seed: RandomSeed = row.get::<String, _>("random_word").parse()?;
            let outcomes: Vec<SymbolTriple> =
                serde_json::from_str(&row.get::<String, _>("outcomes_json"))?;
            if verify_outcomes(&seed, random_seed, session_id, game.symbol_count(), &outcomes) {
                println!("session {session_id}: {} outcomes verified", outcomes.len());
            } else {
                anyhow::bail!("session {session_id}: outcomes do not match the seeds");
            }
        }
        Commands::RotateSeed { new_seed } => {
            let pool = get_pool(cli.database_url).await?;
            let new_seed = new_seed.unwrap_or_else(|| Word256::random().to_hex());
            let hash = {
                let mut h = Sha256::new();
                h.update(new_seed.as_bytes());
                hex::encode(h.finalize())
            };
            sqlx::query("UPDATE params SET server_seed = ?, server_seed_hash = ? WHERE id = 1")
                .bind(&new_seed)
                .bind(&hash)
                .execute(&pool)
                .await?;
            info!("server seed rotated");
            println!("Rotated server seed. New hash: {}", hash);
        }
        Commands::ViewLogs { n } => {
            let pool = get_pool(cli.database_url).await?;
            let rows = sqlx::query(&format!(
                "SELECT {LOG_COLUMNS} FROM sessions ORDER BY ts DESC LIMIT ?"
            ))
            .bind(n)
            .fetch_all(&pool)
            .await?;
            for r in &rows {
                let e = log_entry(r)?;
                let bet = Amount::parse_wei(&e.bet_per_spin)?;
                let payout = Amount::parse_wei(&e.total_payout)?;
                println!(
                    "{} {} player={} spins={} bet/spin={} payout={} hash={}",
                    e.session_id,
                    e.ts.to_rfc3339(),
                    e.player,
                    e.num_spins,
                    bet,
                    payout,
                    e.server_seed_hash
                );
            }
        }
        Commands::ExportCsv { path } => {
            let pool = get_pool(cli.database_url).await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            let rows = sqlx::query(&format!(
                "SELECT {LOG_COLUMNS} FROM sessions ORDER BY ts ASC"
            ))
            .fetch_all(&pool)
            .await?;
            let total = rows.len();
            for r in &rows {
                wtr.serialize(log_entry(r)?)?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", total, path);
        }
    }

    Ok(())
}

fn controller(
    config: &SlotsConfig,
    game: Arc<GameDefinition>,
    source: Arc<dyn OutcomeSource>,
    account: Option<Address>,
    referrer: Address,
    auto_spin: bool,
) -> SessionController<dyn OutcomeSource> {
    let context = SessionContext {
        account,
        bet_bounds: BetBounds {
            min: config.limits.min_bet,
            max: config.limits.max_bet,
        },
        protocol_fee: config.limits.protocol_fee,
        referrer,
    };
    let options = ControllerOptions {
        auto_spin,
        ..ControllerOptions::from_config(config)
    };
    SessionController::new(game, source, context, options)
}
