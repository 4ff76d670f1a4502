use crate::amount::Amount;
use crate::error::SettlementError;
use crate::identity::Address;
use crate::symbols::SymbolTriple;
use serde::{Deserialize, Serialize};

/// Authoritative outcome of a session as reported by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordFields")]
pub struct SettlementRecord {
    pub player: Address,
    pub bet_per_spin: Amount,
    pub total_bet: Amount,
    outcomes: Vec<SymbolTriple>,
    pub total_payout: Amount,
    pub settled: bool,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Deserialize)]
struct RecordFields {
    player: Address,
    bet_per_spin: Amount,
    total_bet: Amount,
    outcomes: Vec<SymbolTriple>,
    total_payout: Amount,
    settled: bool,
    #[serde(default)]
    timestamp: u64,
}

impl TryFrom<RecordFields> for SettlementRecord {
    type Error = SettlementError;

    fn try_from(f: RecordFields) -> Result<Self, Self::Error> {
        let record = Self::new(
            f.player,
            f.bet_per_spin,
            f.total_bet,
            f.outcomes,
            f.total_payout,
            f.settled,
        )?;
        Ok(record.with_timestamp(f.timestamp))
    }
}

impl SettlementRecord {
    pub fn new(
        player: Address,
        bet_per_spin: Amount,
        total_bet: Amount,
        outcomes: Vec<SymbolTriple>,
        total_payout: Amount,
        settled: bool,
    ) -> Result<Self, SettlementError> {
        if outcomes.is_empty() {
            return Err(SettlementError::NoSpins);
        }
        Ok(Self {
            player,
            bet_per_spin,
            total_bet,
            outcomes,
            total_payout,
            settled,
            timestamp: 0,
        })
    }

    /// Builds a record from the three per-reel arrays the contract returns.
    #[allow(clippy::too_many_arguments)]
    pub fn from_reels(
        player: Address,
        bet_per_spin: Amount,
        total_bet: Amount,
        num0: &[u8],
        num1: &[u8],
        num2: &[u8],
        total_payout: Amount,
        settled: bool,
    ) -> Result<Self, SettlementError> {
        if num0.len() != num1.len() || num1.len() != num2.len() {
            return Err(SettlementError::MismatchedOutcomes(
                num0.len(),
                num1.len(),
                num2.len(),
            ));
        }
        Self::new(
            player,
            bet_per_spin,
            total_bet,
            SymbolTriple::zip(num0, num1, num2),
            total_payout,
            settled,
        )
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn outcomes(&self) -> &[SymbolTriple] {
        &self.outcomes
    }

    pub fn spin_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Rejects outcomes that reference symbols the variant does not have.
    pub fn check_symbols(&self, symbol_count: u8) -> Result<(), SettlementError> {
        for (index, t) in self.outcomes.iter().enumerate() {
            let symbol = t.max_symbol();
            if symbol >= symbol_count {
                return Err(SettlementError::UnknownSymbol {
                    index,
                    symbol,
                    count: symbol_count,
                });
            }
        }
        Ok(())
    }
}
