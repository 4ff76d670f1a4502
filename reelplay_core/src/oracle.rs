use crate::engine::{self, EngineParams};
use crate::error::SourceError;
use crate::identity::SessionId;
use crate::settlement::SettlementRecord;
use crate::source::{OutcomeSource, PlayRequest, Poll, SettlementHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

struct Entry {
    record: SettlementRecord,
    polls: u32,
}

#[derive(Default)]
struct OracleState {
    sessions: HashMap<SessionId, Entry>,
    paused: bool,
    fail_next_submit: Option<SourceError>,
    reveal_after_polls: u32,
    submissions: Vec<PlayRequest>,
}

/// In-process settlement oracle backed by the reference engine.
///
/// Sessions settle at submit time but stay `Pending` for
/// `reveal_after_polls` polls, which lets callers exercise the waiting path.
pub struct SimulatedOracle {
    server_seed: String,
    params: EngineParams,
    state: Mutex<OracleState>,
}

impl SimulatedOracle {
    pub fn new(server_seed: impl Into<String>, params: EngineParams) -> Self {
        Self {
            server_seed: server_seed.into(),
            params,
            state: Mutex::new(OracleState::default()),
        }
    }

    pub fn with_reveal_after_polls(self, polls: u32) -> Self {
        self.state.lock().reveal_after_polls = polls;
        self
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    /// Makes the next `submit` fail with `err`.
    pub fn fail_next_submit(&self, err: SourceError) {
        self.state.lock().fail_next_submit = Some(err);
    }

    /// Stores an already settled session, e.g. one being replayed.
    pub fn insert(&self, session_id: SessionId, record: SettlementRecord) {
        self.state
            .lock()
            .sessions
            .insert(session_id, Entry { record, polls: 0 });
    }

    pub fn record(&self, session_id: &SessionId) -> Option<SettlementRecord> {
        self.state
            .lock()
            .sessions
            .get(session_id)
            .map(|e| e.record.clone())
    }

    pub fn submissions(&self) -> Vec<PlayRequest> {
        self.state.lock().submissions.clone()
    }

    pub fn server_seed_hash_hex(&self) -> String {
        crate::rng::derive_hash_hex(self.server_seed.as_bytes())
    }
}

#[async_trait]
impl OutcomeSource for SimulatedOracle {
    async fn submit(&self, request: &PlayRequest) -> Result<SettlementHandle, SourceError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_submit.take() {
            return Err(err);
        }
        if state.paused {
            return Err(SourceError::Rejected("game is paused".into()));
        }
        if state.sessions.contains_key(&request.session_id) {
            return Err(SourceError::Rejected("session id already used".into()));
        }
        let record = engine::settle(&self.server_seed, request, &self.params)
            .map_err(|e| SourceError::Rejected(e.to_string()))?;
        info!(
            session_id = %request.session_id,
            spins = request.spin_count,
            payout = %record.total_payout,
            "simulated settlement"
        );
        state.submissions.push(request.clone());
        state
            .sessions
            .insert(request.session_id, Entry { record, polls: 0 });
        Ok(SettlementHandle {
            session_id: request.session_id,
            receipt: Some(format!("sim-{}", state.submissions.len())),
        })
    }

    async fn poll(&self, handle: &SettlementHandle) -> Result<Poll, SourceError> {
        let mut state = self.state.lock();
        let reveal_after = state.reveal_after_polls;
        let Some(entry) = state.sessions.get_mut(&handle.session_id) else {
            return Ok(Poll::Pending);
        };
        if entry.polls < reveal_after {
            entry.polls += 1;
            debug!(session_id = %handle.session_id, polls = entry.polls, "still pending");
            return Ok(Poll::Pending);
        }
        Ok(Poll::Settled(entry.record.clone()))
    }

    async fn is_paused(&self) -> Result<bool, SourceError> {
        Ok(self.state.lock().paused)
    }
}
