// Reference settlement: derives a session's outcomes from the seeds and
// prices them with a payout table. This is what the bundled oracle runs; a
// production deployment settles on-chain instead.

use crate::amount::Amount;
use crate::error::SettlementError;
use crate::identity::{RandomSeed, SessionId};
use crate::paytable::Paytable;
use crate::rng::ProvablyFairRng;
use crate::settlement::SettlementRecord;
use crate::source::PlayRequest;
use crate::symbols::SymbolTriple;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct EngineParams {
    pub paytable: Paytable,
    pub symbol_count: u8,
}

pub fn draw_outcomes(rng: &ProvablyFairRng, spin_count: usize, symbol_count: u8) -> Vec<SymbolTriple> {
    let floats = rng.next_floats(spin_count * 3);
    floats
        .chunks_exact(3)
        .map(|c| {
            let pick = |f: f64| {
                ((f * symbol_count as f64).floor() as u8).min(symbol_count.saturating_sub(1))
            };
            SymbolTriple::new(pick(c[0]), pick(c[1]), pick(c[2]))
        })
        .collect()
}

/// Sum of `bet_per_spin × multiplier / 10_000` over the outcomes.
pub fn price_outcomes(table: &Paytable, bet_per_spin: Amount, outcomes: &[SymbolTriple]) -> Amount {
    outcomes.iter().fold(Amount::ZERO, |acc, t| {
        acc.saturating_add(bet_per_spin.apply_multiplier(table.lookup_triple(*t)))
    })
}

/// Settles a play request. The bet is split evenly across spins; any
/// indivisible remainder stays with the house, as the contract does.
pub fn settle(
    server_seed: &str,
    request: &PlayRequest,
    params: &EngineParams,
) -> Result<SettlementRecord, SettlementError> {
    if request.spin_count == 0 {
        return Err(SettlementError::NoSpins);
    }
    let spins = request.spin_count as usize;
    let rng = ProvablyFairRng::new(server_seed, request.random_seed, request.session_id);
    let outcomes = draw_outcomes(&rng, spins, params.symbol_count);
    let bet_per_spin = request.bet.checked_div(spins as u128).unwrap_or(Amount::ZERO);
    let total_payout = price_outcomes(&params.paytable, bet_per_spin, &outcomes);
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let record = SettlementRecord::new(
        request.player,
        bet_per_spin,
        bet_per_spin.saturating_mul(spins as u128),
        outcomes,
        total_payout,
        true,
    )?;
    Ok(record.with_timestamp(timestamp))
}

/// Recomputes the outcomes for revealed seeds and compares.
pub fn verify_outcomes(
    server_seed: &str,
    random_seed: RandomSeed,
    session_id: SessionId,
    symbol_count: u8,
    expected: &[SymbolTriple],
) -> bool {
    let rng = ProvablyFairRng::new(server_seed, random_seed, session_id);
    draw_outcomes(&rng, expected.len(), symbol_count) == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Address, Word256};

    fn request(spins: u8) -> PlayRequest {
        PlayRequest {
            player: Address::ZERO,
            session_id: SessionId(Word256::from_u64(99)),
            spin_count: spins,
            random_seed: RandomSeed(Word256::from_u64(1)),
            referrer: Address::ZERO,
            bet: Amount::from_units(30),
            fee: Amount::ZERO,
        }
    }

    #[test]
    fn test_settle_deterministic() {
        let params = EngineParams {
            paytable: Paytable::example_default(),
            symbol_count: 6,
        };
        let a = settle("server", &request(3), &params).unwrap();
        let b = settle("server", &request(3), &params).unwrap();
        assert_eq!(a.outcomes(), b.outcomes());
        assert_eq!(a.total_payout, b.total_payout);
        assert_eq!(a.bet_per_spin, Amount::from_units(10));
        assert_eq!(a.total_bet, Amount::from_units(30));
        assert!(a.outcomes().iter().all(|t| t.max_symbol() < 6));
    }

    #[test]
    fn payout_matches_the_table() {
        let params = EngineParams {
            paytable: Paytable::example_default(),
            symbol_count: 6,
        };
        let record = settle("server", &request(15), &params).unwrap();
        assert_eq!(
            record.total_payout,
            price_outcomes(&params.paytable, record.bet_per_spin, record.outcomes())
        );
    }

    #[test]
    fn verification_detects_tampering() {
        let req = request(4);
        let params = EngineParams {
            paytable: Paytable::example_default(),
            symbol_count: 6,
        };
        let record = settle("server", &req, &params).unwrap();
        assert!(verify_outcomes("server", req.random_seed, req.session_id, 6, record.outcomes()));
        assert!(!verify_outcomes("other", req.random_seed, req.session_id, 6, record.outcomes()));
    }

    #[test]
    fn zero_spins_do_not_settle() {
        let params = EngineParams {
            paytable: Paytable::example_default(),
            symbol_count: 6,
        };
        assert_eq!(
            settle("server", &request(0), &params).unwrap_err(),
            SettlementError::NoSpins
        );
    }
}
