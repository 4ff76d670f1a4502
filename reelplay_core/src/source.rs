use crate::amount::Amount;
use crate::error::SourceError;
use crate::identity::{Address, RandomSeed, SessionId};
use crate::settlement::SettlementRecord;
use async_trait::async_trait;
use tracing::warn;

/// Everything submitted to start a session. Built once per start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub player: Address,
    pub session_id: SessionId,
    pub spin_count: u8,
    pub random_seed: RandomSeed,
    pub referrer: Address,
    pub bet: Amount,
    pub fee: Amount,
}

impl PlayRequest {
    /// Value attached to the submission: the bet plus the protocol fee.
    pub fn value(&self) -> Amount {
        self.bet.saturating_add(self.fee)
    }
}

/// Ticket for polling a submitted or replayed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementHandle {
    pub session_id: SessionId,
    /// Transaction reference, when the source produced one.
    pub receipt: Option<String>,
}

impl SettlementHandle {
    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id,
            receipt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Pending,
    Settled(SettlementRecord),
}

#[async_trait]
pub trait OutcomeSource: Send + Sync {
    async fn submit(&self, request: &PlayRequest) -> Result<SettlementHandle, SourceError>;

    /// A record with `settled == false` is reported as [`Poll::Pending`].
    async fn poll(&self, handle: &SettlementHandle) -> Result<Poll, SourceError>;

    /// True when this game, or every game, is paused.
    async fn is_paused(&self) -> Result<bool, SourceError> {
        Ok(false)
    }
}

#[async_trait]
pub trait ReferrerStore: Send + Sync {
    async fn stored_referrer(&self, account: Option<&Address>) -> Option<String>;
}

/// Looks up the referrer once, before the controller is built. Anything that
/// is not a well-formed address becomes the zero address.
pub async fn resolve_referrer<R>(store: &R, account: Option<&Address>) -> Address
where
    R: ReferrerStore + ?Sized,
{
    match store.stored_referrer(account).await {
        Some(text) => match text.parse() {
            Ok(addr) => addr,
            Err(_) => {
                warn!(referrer = %text, "ignoring malformed stored referrer");
                Address::ZERO
            }
        },
        None => Address::ZERO,
    }
}

/// Extracts the session id from a replay link query such as `?id=12345&x=1`.
pub fn replay_id_from_query(query: &str) -> Option<&str> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "id")
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl ReferrerStore for Fixed {
        async fn stored_referrer(&self, _account: Option<&Address>) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[tokio::test]
    async fn malformed_referrer_becomes_zero() {
        assert_eq!(resolve_referrer(&Fixed(Some("bob")), None).await, Address::ZERO);
        assert_eq!(resolve_referrer(&Fixed(None), None).await, Address::ZERO);
        let good = "0x00000000000000000000000000000000000000aa";
        assert_eq!(
            resolve_referrer(&Fixed(Some(good)), None).await,
            good.parse().unwrap()
        );
    }

    #[test]
    fn finds_replay_id_in_query() {
        assert_eq!(replay_id_from_query("?id=12345"), Some("12345"));
        assert_eq!(replay_id_from_query("ref=1&id=77"), Some("77"));
        assert_eq!(replay_id_from_query("?id="), None);
        assert_eq!(replay_id_from_query(""), None);
    }
}
