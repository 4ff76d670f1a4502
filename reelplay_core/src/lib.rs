pub mod amount;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod identity;
pub mod oracle;
pub mod paytable;
pub mod rng;
pub mod sequencer;
pub mod settlement;
pub mod source;
pub mod symbols;
pub mod variant;

pub use crate::amount::{Amount, MULTIPLIER_SCALE};
pub use crate::config::{GameConfig, Limits, OracleConfig, SlotsConfig, Timings};
pub use crate::controller::{
    BetBounds, ControllerOptions, SessionContext, SessionController, SessionSnapshot, Stake,
};
pub use crate::engine::{draw_outcomes, price_outcomes, settle, verify_outcomes, EngineParams};
pub use crate::error::{BetBound, ConfigError, ParseError, SessionError, SettlementError, SourceError};
pub use crate::events::{Event, Signal, Timer};
pub use crate::identity::{Address, IdentityManager, RandomSeed, SessionId, SessionIdentity, Word256};
pub use crate::oracle::SimulatedOracle;
pub use crate::paytable::{Multiplier, Paytable, PaytableEntry};
pub use crate::rng::{derive_floats, derive_hash_hex, ProvablyFairRng};
pub use crate::sequencer::{SpinRequest, SpinResult, SpinSequencer, View};
pub use crate::settlement::SettlementRecord;
pub use crate::source::{
    replay_id_from_query, resolve_referrer, OutcomeSource, PlayRequest, Poll, ReferrerStore,
    SettlementHandle,
};
pub use crate::symbols::SymbolTriple;
pub use crate::variant::{GameDefinition, GameVariant};
