use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Amounts travel as decimal wei strings and session ids as decimal strings,
// so nothing here depends on the core's numeric types.

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub player: String,
    pub session_id: String,
    pub num_spins: u8,
    pub referrer: String,
    /// `0x`-prefixed 32-byte client random word.
    pub random_word: String,
    /// Bet plus protocol fee, in wei.
    pub value: String,
    pub fee: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayResponse {
    pub session_id: String,
    pub receipt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Settled,
}

/// Mirrors the contract's `getGameInfo` tuple.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameInfoResponse {
    pub status: SessionStatus,
    pub player: String,
    pub bet_amount_per_spin: String,
    pub total_bet_amount: String,
    pub num0: Vec<u8>,
    pub num1: Vec<u8>,
    pub num2: Vec<u8>,
    pub total_payout: String,
    pub has_ended: bool,
    pub timestamp: u64,
}

impl GameInfoResponse {
    pub fn pending() -> Self {
        Self {
            status: SessionStatus::Pending,
            player: String::new(),
            bet_amount_per_spin: "0".into(),
            total_bet_amount: "0".into(),
            num0: Vec::new(),
            num1: Vec::new(),
            num2: Vec::new(),
            total_payout: "0".into(),
            has_ended: false,
            timestamp: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub paused: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PaytableEntry {
    pub symbols: [u8; 3],
    pub multiplier: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdminSetParamsRequest {
    pub paytable: Option<Vec<PaytableEntry>>,
    pub paused: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionLogEntry {
    pub session_id: String,
    pub ts: DateTime<Utc>,
    pub player: String,
    pub random_word: String,
    pub server_seed_hash: String,
    pub num_spins: u8,
    pub bet_per_spin: String,
    pub total_payout: String,
}

/// Error body returned by the oracle alongside a non-2xx status.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("session already exists")]
    Conflict,
    #[error("game is paused")]
    Paused,
    #[error("internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;
