use crate::amount::MULTIPLIER_SCALE;
use crate::symbols::SymbolTriple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payout multiplier scaled by 10 000 (`20_000` pays 2×).
pub type Multiplier = u32;

/// One `(s0, s1, s2) → multiplier` entry, the flat form used for admin updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaytableEntry {
    pub symbols: [u8; 3],
    pub multiplier: Multiplier,
}

/// Sparse three-level payout table. Any missing key pays nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Paytable(BTreeMap<u8, BTreeMap<u8, BTreeMap<u8, Multiplier>>>);

impl Paytable {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PaytableEntry>,
    {
        let mut table = Paytable::default();
        for e in entries {
            let [s0, s1, s2] = e.symbols;
            table
                .0
                .entry(s0)
                .or_default()
                .entry(s1)
                .or_default()
                .insert(s2, e.multiplier);
        }
        table
    }

    pub fn lookup(&self, s0: u8, s1: u8, s2: u8) -> Multiplier {
        self.0
            .get(&s0)
            .and_then(|l1| l1.get(&s1))
            .and_then(|l2| l2.get(&s2))
            .copied()
            .unwrap_or(0)
    }

    pub fn lookup_triple(&self, triple: SymbolTriple) -> Multiplier {
        let [s0, s1, s2] = triple.symbols();
        self.lookup(s0, s1, s2)
    }

    /// Multiplier of the top combination, shown on the setup card.
    pub fn jackpot_multiplier(&self) -> Multiplier {
        self.lookup(0, 0, 0)
    }

    pub fn entries(&self) -> Vec<PaytableEntry> {
        let mut out = Vec::new();
        for (s0, l1) in &self.0 {
            for (s1, l2) in l1 {
                for (s2, m) in l2 {
                    out.push(PaytableEntry {
                        symbols: [*s0, *s1, *s2],
                        multiplier: *m,
                    });
                }
            }
        }
        out
    }

    pub fn highest_symbol(&self) -> Option<u8> {
        self.entries()
            .iter()
            .flat_map(|e| e.symbols)
            .max()
    }

    /// The table shipped with the example game.
    ///
    /// Symbol 0 is the jackpot; branch 3 only pays `3-0-3` and the
    /// `3-3-{0,2,3}` family.
    pub fn example_default() -> Self {
        let e = |s0, s1, s2, multiplier| PaytableEntry {
            symbols: [s0, s1, s2],
            multiplier,
        };
        Self::from_entries([
            e(0, 0, 0, 2_847_392),
            e(1, 1, 1, 500_000),
            e(2, 2, 2, 250_000),
            e(3, 3, 3, 100_000),
            e(4, 4, 4, 50_000),
            e(5, 5, 5, 25_000),
            e(0, 0, 1, 40_000),
            e(0, 0, 2, 40_000),
            e(1, 1, 0, 30_000),
            e(2, 2, 0, 20_000),
            e(3, 0, 3, 15_000),
            e(3, 3, 0, 15_000),
            e(3, 3, 2, 12_000),
            e(4, 4, 0, 10_000),
            e(5, 5, 0, 10_000),
        ])
    }

    /// Scaled multiplier as a float, for display only.
    pub fn display_multiplier(m: Multiplier) -> f64 {
        m as f64 / MULTIPLIER_SCALE as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_levels_pay_nothing() {
        let table = Paytable::example_default();
        assert_eq!(table.lookup(0, 0, 0), 2_847_392);
        assert_eq!(table.lookup(3, 3, 1), 0);
        assert_eq!(table.lookup(9, 0, 0), 0);
        assert_eq!(table.lookup(0, 9, 0), 0);
    }

    #[test]
    fn json_uses_string_keys() {
        let table = Paytable::from_entries([PaytableEntry {
            symbols: [1, 2, 3],
            multiplier: 7,
        }]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"1":{"2":{"3":7}}}"#);
        let back: Paytable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    proptest! {
        #[test]
        fn unmapped_triples_look_up_to_zero(s0 in 0u8..=255, s1 in 0u8..=255, s2 in 0u8..=255) {
            let table = Paytable::example_default();
            let mapped = table.entries().iter().any(|e| e.symbols == [s0, s1, s2]);
            if !mapped {
                prop_assert_eq!(table.lookup(s0, s1, s2), 0);
            }
        }
    }
}
