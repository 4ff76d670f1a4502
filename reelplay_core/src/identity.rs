use crate::error::ParseError;
use primitive_types::U256;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Big-endian 256-bit unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Word256([u8; 32]);

impl Word256 {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u64(v: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&v.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    fn to_u256(self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    fn from_u256(n: U256) -> Self {
        let mut bytes = [0u8; 32];
        n.to_big_endian(&mut bytes);
        Self(bytes)
    }

    fn parse_decimal(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::Word(s.to_string()));
        }
        U256::from_dec_str(s)
            .map(Self::from_u256)
            .map_err(|_| ParseError::Word(format!("{s} exceeds 256 bits")))
    }

    fn parse_hex(digits: &str) -> Result<Self, ParseError> {
        let bad = || ParseError::Word(format!("0x{digits}"));
        if digits.is_empty() || digits.len() > 64 {
            return Err(bad());
        }
        let padded = format!("{:0>64}", digits);
        let raw = hex::decode(padded).map_err(|_| bad())?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl FromStr for Word256 {
    type Err = ParseError;

    /// Accepts decimal numerals and `0x`-prefixed hex, like a JS `BigInt`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => Self::parse_hex(digits),
            None => Self::parse_decimal(s),
        }
    }
}

impl fmt::Display for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_u256(), f)
    }
}

impl fmt::Debug for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word256({self})")
    }
}

/// Unique id of one game session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct SessionId(pub Word256);

/// Client-contributed entropy handed to the settlement oracle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RandomSeed(pub Word256);

impl SessionId {
    pub fn random() -> Self {
        Self(Word256::random())
    }
}

impl RandomSeed {
    pub fn random() -> Self {
        Self(Word256::random())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for RandomSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl FromStr for SessionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SessionId)
    }
}

impl FromStr for RandomSeed {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(RandomSeed)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Parses `text`, falling back to the zero address when it is malformed.
    pub fn parse_or_zero(text: &str) -> Address {
        text.parse().unwrap_or(Address::ZERO)
    }
}

/// Accepts `0x` followed by 40 hex digits in any case; no checksum check.
impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Address(s.to_string());
        let digits = s
            .trim()
            .strip_prefix("0x")
            .or_else(|| s.trim().strip_prefix("0X"))
            .ok_or_else(bad)?;
        if digits.len() != 40 {
            return Err(bad());
        }
        let raw = hex::decode(digits).map_err(|_| bad())?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Current session id and, for sessions started locally, its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: SessionId,
    pub seed: Option<RandomSeed>,
}

impl SessionIdentity {
    pub fn is_replay(&self) -> bool {
        self.seed.is_none()
    }
}

#[derive(Debug, Default)]
pub struct IdentityManager {
    current: Option<SessionIdentity>,
}

impl IdentityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_fresh(&mut self) -> (SessionId, RandomSeed) {
        let session_id = SessionId::random();
        let seed = RandomSeed::random();
        self.current = Some(SessionIdentity {
            session_id,
            seed: Some(seed),
        });
        debug!(%session_id, "generated session identity");
        (session_id, seed)
    }

    /// Loads an id from a replay link. Malformed input clears the identity.
    pub fn load_replay(&mut self, text: &str) -> Result<SessionId, ParseError> {
        match text.parse::<SessionId>() {
            Ok(session_id) => {
                self.current = Some(SessionIdentity {
                    session_id,
                    seed: None,
                });
                Ok(session_id)
            }
            Err(err) => {
                self.current = None;
                Err(err)
            }
        }
    }

    pub fn rotate(&mut self) -> (SessionId, RandomSeed) {
        self.start_fresh()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<SessionIdentity> {
        self.current
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.current.map(|c| c.session_id)
    }

    pub fn is_replay(&self) -> bool {
        self.current.map(|c| c.is_replay()).unwrap_or(false)
    }
}
