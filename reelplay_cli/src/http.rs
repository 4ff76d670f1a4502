use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use reelplay_core::{
    Amount, OutcomeSource, PlayRequest, Poll, SettlementHandle, SettlementRecord, SourceError,
};
use reelplay_shared::{ErrorBody, GameInfoResponse, PlayResponse, SessionStatus, VerifyResponse};

/// Talks to `reelplay_server` over its JSON API.
pub struct HttpOutcomeSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOutcomeSource {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn wire_request(request: &PlayRequest) -> reelplay_shared::PlayRequest {
    reelplay_shared::PlayRequest {
        player: request.player.to_string(),
        session_id: request.session_id.to_string(),
        num_spins: request.spin_count,
        referrer: request.referrer.to_string(),
        random_word: request.random_seed.to_string(),
        value: request.value().wei().to_string(),
        fee: request.fee.wei().to_string(),
    }
}

pub fn record_from_wire(info: &GameInfoResponse) -> Result<Poll, SourceError> {
    if info.status == SessionStatus::Pending || !info.has_ended {
        return Ok(Poll::Pending);
    }
    let malformed = |what: &str| SourceError::Malformed(what.to_string());
    let record = SettlementRecord::from_reels(
        info.player.parse().map_err(|_| malformed("player"))?,
        Amount::parse_wei(&info.bet_amount_per_spin).map_err(|_| malformed("bet_amount_per_spin"))?,
        Amount::parse_wei(&info.total_bet_amount).map_err(|_| malformed("total_bet_amount"))?,
        &info.num0,
        &info.num1,
        &info.num2,
        Amount::parse_wei(&info.total_payout).map_err(|_| malformed("total_payout"))?,
        info.has_ended,
    )
    .map_err(|err| SourceError::Malformed(err.to_string()))?;
    Ok(Poll::Settled(record.with_timestamp(info.timestamp)))
}

fn transport(err: reqwest::Error) -> SourceError {
    SourceError::Transport(err.to_string())
}

async fn error_text(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl OutcomeSource for HttpOutcomeSource {
    async fn submit(&self, request: &PlayRequest) -> Result<SettlementHandle, SourceError> {
        let resp = match self
            .client
            .post(self.url("/play"))
            .json(&wire_request(request))
            .send()
            .await
        {
            Ok(resp) => resp,
            // the request may still have landed; keep polling for it
            Err(err) if err.is_timeout() => return Err(SourceError::TransactionNotFound),
            Err(err) => return Err(transport(err)),
        };
        match resp.status() {
            s if s.is_success() => {
                let body: PlayResponse = resp.json().await.map_err(transport)?;
                debug!(session_id = %body.session_id, receipt = %body.receipt, "play accepted");
                Ok(SettlementHandle {
                    session_id: request.session_id,
                    receipt: Some(body.receipt),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::SERVICE_UNAVAILABLE => {
                Err(SourceError::Rejected(error_text(resp).await))
            }
            _ => Err(SourceError::Transport(error_text(resp).await)),
        }
    }

    async fn poll(&self, handle: &SettlementHandle) -> Result<Poll, SourceError> {
        let resp = self
            .client
            .get(self.url(&format!("/sessions/{}", handle.session_id)))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => {
                let info: GameInfoResponse = resp
                    .json()
                    .await
                    .map_err(|err| SourceError::Malformed(err.to_string()))?;
                record_from_wire(&info)
            }
            StatusCode::NOT_FOUND => Err(SourceError::TransactionNotFound),
            _ => Err(SourceError::Transport(error_text(resp).await)),
        }
    }

    async fn is_paused(&self) -> Result<bool, SourceError> {
        let resp = self
            .client
            .get(self.url("/verify"))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let verify: VerifyResponse = resp
            .json()
            .await
            .map_err(|err| SourceError::Malformed(err.to_string()))?;
        Ok(verify.paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelplay_core::{Address, RandomSeed, SessionId, Word256};

    fn settled_info() -> GameInfoResponse {
        GameInfoResponse {
            status: SessionStatus::Settled,
            player: "0x1111111111111111111111111111111111111111".into(),
            bet_amount_per_spin: Amount::from_units(10).wei().to_string(),
            total_bet_amount: Amount::from_units(20).wei().to_string(),
            num0: vec![0, 1],
            num1: vec![0, 2],
            num2: vec![0, 3],
            total_payout: Amount::from_units(2847).wei().to_string(),
            has_ended: true,
            timestamp: 42,
        }
    }

    #[test]
    fn wire_request_carries_bet_plus_fee() {
        let req = PlayRequest {
            player: Address::ZERO,
            session_id: SessionId(Word256::from_u64(12345)),
            spin_count: 3,
            random_seed: RandomSeed(Word256::from_u64(1)),
            referrer: Address::ZERO,
            bet: Amount::from_units(10),
            fee: Amount::from_units(1),
        };
        let wire = wire_request(&req);
        assert_eq!(wire.session_id, "12345");
        assert_eq!(wire.value, Amount::from_units(11).wei().to_string());
        assert_eq!(wire.fee, Amount::from_units(1).wei().to_string());
    }

    #[test]
    fn settled_info_becomes_a_record() {
        let Poll::Settled(record) = record_from_wire(&settled_info()).unwrap() else {
            panic!("expected a settled record");
        };
        assert_eq!(record.spin_count(), 2);
        assert_eq!(record.outcomes()[0].symbols(), [0, 0, 0]);
        assert_eq!(record.total_payout, Amount::from_units(2847));
        assert_eq!(record.timestamp, 42);
    }

    #[test]
    fn pending_and_broken_infos() {
        assert_eq!(
            record_from_wire(&GameInfoResponse::pending()).unwrap(),
            Poll::Pending
        );
        let mut broken = settled_info();
        broken.num2.pop();
        assert!(matches!(
            record_from_wire(&broken),
            Err(SourceError::Malformed(_))
        ));
    }
}
