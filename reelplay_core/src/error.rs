use crate::amount::Amount;

/// Which edge of the bet bounds a rejected bet crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetBound {
    Min,
    Max,
}

impl std::fmt::Display for BetBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetBound::Min => f.write_str("at least"),
            BetBound::Max => f.write_str("at most"),
        }
    }
}

/// Errors surfaced to the player by the session controller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("please connect your wallet first")]
    WalletNotConnected,
    #[error("bet amount must be {bound} {limit} (got {bet})")]
    BetOutOfRange {
        bet: Amount,
        bound: BetBound,
        limit: Amount,
    },
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
    #[error("spin count must be between 1 and {max} (got {requested})")]
    InvalidSpinCount { requested: u32, max: u8 },
    #[error("the game is paused")]
    GamePaused,
    #[error("no previous bet to play again")]
    NoPreviousStake,
    #[error("transaction failed: {0}")]
    SubmissionFailed(String),
    #[error("an unexpected error occurred: {0}")]
    Unexpected(String),
}

/// Errors reported by an [`crate::source::OutcomeSource`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The benign "not found yet" answer while a submission is still propagating.
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("outcome arrays differ in length ({0}, {1}, {2})")]
    MismatchedOutcomes(usize, usize, usize),
    #[error("settlement has no spins")]
    NoSpins,
    #[error("symbol {symbol} at spin {index} is outside the variant's {count} symbols")]
    UnknownSymbol { index: usize, symbol: u8, count: u8 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid amount: {0}")]
    Amount(String),
    #[error("invalid 256-bit value: {0}")]
    Word(String),
    #[error("invalid address: {0}")]
    Address(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("parsing paytable: {0}")]
    Paytable(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ParseError> for SessionError {
    fn from(err: ParseError) -> Self {
        SessionError::InvalidSessionId(err.to_string())
    }
}
