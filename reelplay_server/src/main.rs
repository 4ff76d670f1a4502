use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use reelplay_core::{
    derive_hash_hex, settle, Address, Amount, EngineParams, Limits, Paytable, PaytableEntry,
    PlayRequest, RandomSeed, SessionId, SettlementRecord, SlotsConfig, SymbolTriple,
};
use reelplay_shared::{
    AdminSetParamsRequest, ApiError, ApiResult, ErrorBody, GameInfoResponse, PlayResponse,
    SessionStatus, VerifyResponse,
};

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
    api_key: String,
    limits: Limits,
    symbol_count: u8,
}

type Rejection = (StatusCode, Json<ErrorBody>);

fn reject(err: ApiError) -> Rejection {
    let status = match &err {
        ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
        ApiError::Conflict => StatusCode::CONFLICT,
        ApiError::Paused => StatusCode::SERVICE_UNAVAILABLE,
        ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: err.to_string() }))
}

fn internal(err: impl std::fmt::Display) -> Rejection {
    error!("{err}");
    reject(ApiError::Internal)
}

// DB schema is defined in migrations (see migrations/ folder)

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
struct StoredParams {
    server_seed: String,
    server_seed_hash: String,
    paytable_json: String,
    paused: bool,
}

impl StoredParams {
    fn paytable(&self) -> Paytable {
        serde_json::from_str::<Vec<PaytableEntry>>(&self.paytable_json)
            .map(Paytable::from_entries)
            .unwrap_or_else(|err| {
                warn!(error = %err, "stored paytable unreadable, using the example table");
                Paytable::example_default()
            })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoredSession {
    player: String,
    num_spins: i64,
    bet_per_spin: String,
    total_bet: String,
    outcomes_json: String,
    total_payout: String,
    settled_at: i64,
}

async fn get_params(pool: &SqlitePool) -> anyhow::Result<StoredParams> {
    let row = sqlx::query_as::<_, StoredParams>(
        "SELECT server_seed, server_seed_hash, paytable_json, paused FROM params WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

async fn set_params(pool: &SqlitePool, p: &StoredParams) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE params SET server_seed = ?, server_seed_hash = ?, paytable_json = ?, paused = ? WHERE id = 1",
    )
    .bind(&p.server_seed)
    .bind(&p.server_seed_hash)
    .bind(&p.paytable_json)
    .bind(p.paused)
    .execute(pool)
    .await?;
    Ok(())
}

async fn init_db(db: &SqlitePool, paytable: &Paytable) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    let mut p = get_params(db).await?;
    if p.server_seed.is_empty() {
        p.server_seed = match std::env::var("SERVER_SEED") {
            Ok(seed) if !seed.is_empty() => seed,
            _ => {
                let mut secret = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut secret);
                info!("generated a new server seed");
                hex::encode(secret)
            }
        };
    }
    if p.paytable_json.is_empty() {
        p.paytable_json = serde_json::to_string(&paytable.entries())?;
    }
    // ensure server_seed_hash matches server_seed
    p.server_seed_hash = derive_hash_hex(p.server_seed.as_bytes());
    set_params(db, &p).await?;
    Ok(())
}

fn game_info(record: &SettlementRecord) -> GameInfoResponse {
    let [num0, num1, num2] = SymbolTriple::unzip(record.outcomes());
    GameInfoResponse {
        status: SessionStatus::Settled,
        player: record.player.to_string(),
        bet_amount_per_spin: record.bet_per_spin.wei().to_string(),
        total_bet_amount: record.total_bet.wei().to_string(),
        num0,
        num1,
        num2,
        total_payout: record.total_payout.wei().to_string(),
        has_ended: record.settled,
        timestamp: record.timestamp,
    }
}

fn parse_play(req: &reelplay_shared::PlayRequest, state: &AppState) -> ApiResult<PlayRequest> {
    let invalid = |what: &str| ApiError::Invalid(what.to_string());
    let player: Address = req.player.parse().map_err(|_| invalid("player"))?;
    let session_id: SessionId = req.session_id.parse().map_err(|_| invalid("session_id"))?;
    let random_seed: RandomSeed = req.random_word.parse().map_err(|_| invalid("random_word"))?;
    let referrer = Address::parse_or_zero(&req.referrer);
    let value = Amount::parse_wei(&req.value).map_err(|_| invalid("value"))?;
    let fee = Amount::parse_wei(&req.fee).map_err(|_| invalid("fee"))?;
    if value < fee {
        return Err(invalid("value does not cover the fee"));
    }
    let bet = Amount::from_wei(value.wei() - fee.wei());
    if req.num_spins == 0 || req.num_spins > state.limits.max_spins {
        return Err(ApiError::Invalid(format!(
            "num_spins must be within 1..={}",
            state.limits.max_spins
        )));
    }
    if bet < state.limits.min_bet || bet > state.limits.max_bet {
        return Err(ApiError::Invalid(format!(
            "bet must be within {}..={}",
            state.limits.min_bet, state.limits.max_bet
        )));
    }
    Ok(PlayRequest {
        player,
        session_id,
        spin_count: req.num_spins,
        random_seed,
        referrer,
        bet,
        fee,
    })
}

async fn route_verify(State(state): State<Arc<AppState>>) -> Result<Json<VerifyResponse>, Rejection> {
    let p = get_params(&state.db).await.map_err(internal)?;
    Ok(Json(VerifyResponse {
        server_seed_hash: p.server_seed_hash,
        paused: p.paused,
    }))
}

async fn route_play(
    State(state): State<Arc<AppState>>,
    Json(req): Json<reelplay_shared::PlayRequest>,
) -> Result<Json<PlayResponse>, Rejection> {
    let play = parse_play(&req, &state).map_err(reject)?;
    let p = get_params(&state.db).await.map_err(internal)?;
    if p.paused {
        return Err(reject(ApiError::Paused));
    }
    let params = EngineParams {
        paytable: p.paytable(),
        symbol_count: state.symbol_count,
    };
    let record = settle(&p.server_seed, &play, &params).map_err(internal)?;
    let outcomes_json = serde_json::to_string(record.outcomes()).map_err(internal)?;
    let ts = chrono::Utc::now().to_rfc3339();

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO sessions (session_id, ts, player, referrer, random_word, server_seed_hash, num_spins, bet_per_spin, total_bet, outcomes_json, total_payout, settled_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(play.session_id.to_string())
    .bind(&ts)
    .bind(play.player.to_string())
    .bind(play.referrer.to_string())
    .bind(play.random_seed.to_string())
    .bind(&p.server_seed_hash)
    .bind(play.spin_count as i64)
    .bind(record.bet_per_spin.wei().to_string())
    .bind(record.total_bet.wei().to_string())
    .bind(outcomes_json)
    .bind(record.total_payout.wei().to_string())
    .bind(record.timestamp as i64)
    .execute(&state.db)
    .await
    .map_err(internal)?;
    if inserted.rows_affected() == 0 {
        return Err(reject(ApiError::Conflict));
    }

    info!(
        session_id = %play.session_id,
        spins = play.spin_count,
        payout = %record.total_payout,
        "session settled"
    );
    Ok(Json(PlayResponse {
        session_id: play.session_id.to_string(),
        receipt: derive_hash_hex(format!("{}:{}", play.session_id, ts).as_bytes()),
    }))
}

async fn route_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GameInfoResponse>, Rejection> {
    let session_id: SessionId = id
        .parse()
        .map_err(|_| reject(ApiError::Invalid("session id".into())))?;
    let row = sqlx::query_as::<_, StoredSession>(
        "SELECT player, num_spins, bet_per_spin, total_bet, outcomes_json, total_payout, settled_at FROM sessions WHERE session_id = ?",
    )
    .bind(session_id.to_string())
    .fetch_optional(&state.db)
    .await
    .map_err(internal)?;
    let Some(row) = row else {
        return Ok(Json(GameInfoResponse::pending()));
    };
    let record = stored_record(&row).map_err(internal)?;
    if record.spin_count() as i64 != row.num_spins {
        warn!(%session_id, "stored spin count disagrees with outcomes");
    }
    Ok(Json(game_info(&record)))
}

fn stored_record(row: &StoredSession) -> anyhow::Result<SettlementRecord> {
    let outcomes: Vec<SymbolTriple> = serde_json::from_str(&row.outcomes_json)?;
    let record = SettlementRecord::new(
        row.player.parse()?,
        Amount::parse_wei(&row.bet_per_spin)?,
        Amount::parse_wei(&row.total_bet)?,
        outcomes,
        Amount::parse_wei(&row.total_payout)?,
        true,
    )?;
    Ok(record.with_timestamp(row.settled_at.max(0) as u64))
}

async fn route_admin_set_params(
    State(state): State<Arc<AppState>>,
    TypedHeader(axum_extra::headers::Authorization(bearer)): TypedHeader<
        axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>,
    >,
    Json(req): Json<AdminSetParamsRequest>,
) -> Result<StatusCode, StatusCode> {
    if bearer.token() != state.api_key {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut p = get_params(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if let Some(entries) = req.paytable {
        let table = Paytable::from_entries(entries.iter().map(|e| PaytableEntry {
            symbols: e.symbols,
            multiplier: e.multiplier,
        }));
        if table.highest_symbol().is_some_and(|s| s >= state.symbol_count) {
            return Err(StatusCode::BAD_REQUEST);
        }
        p.paytable_json =
            serde_json::to_string(&table.entries()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    }
    if let Some(paused) = req.paused {
        p.paused = paused;
        info!(paused, "pause flag updated");
    }
    set_params(&state.db, &p)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::NO_CONTENT)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", get(route_verify))
        .route("/play", post(route_play))
        .route("/sessions/:id", get(route_session))
        .route("/admin/set-params", post(route_admin_set_params))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path =
        std::env::var("REELPLAY_CONFIG").unwrap_or_else(|_| "reelplay.toml".to_string());
    let config = SlotsConfig::load(std::path::Path::new(&config_path))?;
    let game = config.game_definition()?;

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(
            &std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://reelplay.db?mode=rwc".to_string()),
        )
        .await?;
    init_db(&db, &game.payouts).await?;

    let mut limits = config.limits.clone();
    if let Ok(min) = std::env::var("MIN_BET") {
        limits.min_bet = min.parse()?;
    }
    if let Ok(max) = std::env::var("MAX_BET") {
        limits.max_bet = max.parse()?;
    }
    anyhow::ensure!(limits.min_bet <= limits.max_bet, "MIN_BET exceeds MAX_BET");

    let state = Arc::new(AppState {
        db,
        api_key: std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
        limits,
        symbol_count: game.symbol_count,
    });

    let addr = std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(game = %game.title, "listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
