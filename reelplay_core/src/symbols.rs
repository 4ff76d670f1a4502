use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbols landed by one spin, left to right.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SymbolTriple([u8; 3]);

impl SymbolTriple {
    pub const fn new(s0: u8, s1: u8, s2: u8) -> Self {
        Self([s0, s1, s2])
    }

    pub fn symbols(self) -> [u8; 3] {
        self.0
    }

    /// Largest symbol index on the line.
    pub fn max_symbol(self) -> u8 {
        self.0.into_iter().max().unwrap_or(0)
    }

    /// Zips the three parallel per-reel arrays the oracle reports.
    pub fn zip(num0: &[u8], num1: &[u8], num2: &[u8]) -> Vec<SymbolTriple> {
        num0.iter()
            .zip(num1)
            .zip(num2)
            .map(|((a, b), c)| SymbolTriple::new(*a, *b, *c))
            .collect()
    }

    /// Splits triples back into per-reel arrays.
    pub fn unzip(triples: &[SymbolTriple]) -> [Vec<u8>; 3] {
        let mut out = [Vec::new(), Vec::new(), Vec::new()];
        for t in triples {
            for (reel, s) in out.iter_mut().zip(t.0) {
                reel.push(s);
            }
        }
        out
    }
}

impl From<[u8; 3]> for SymbolTriple {
    fn from(value: [u8; 3]) -> Self {
        Self(value)
    }
}

impl fmt::Display for SymbolTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.0[0], self.0[1], self.0[2])
    }
}
