use crate::identity::{RandomSeed, SessionId};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

// HMAC-SHA256(server_seed, "{random_word}:{session_id}") -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

const UNIT: f64 = u32::MAX as f64 + 1.0;

/// Maps big-endian 4-byte words to `[0, 1)`. Once a block runs out it is
/// replaced by its own SHA-256 digest; a trailing partial word is skipped.
pub fn derive_floats(hmac_bytes: &[u8], count: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(count);
    let mut block = hmac_bytes.to_vec();
    while out.len() < count {
        let needed = count - out.len();
        out.extend(
            block
                .chunks_exact(4)
                .take(needed)
                .map(|w| f64::from(u32::from_be_bytes([w[0], w[1], w[2], w[3]])) / UNIT),
        );
        block = Sha256::digest(&block).to_vec();
    }
    out
}

pub struct ProvablyFairRng {
    /// Kept secret until rotated out and revealed.
    server_seed: String,
    client_seed: RandomSeed,
    session_id: SessionId,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: RandomSeed, session_id: SessionId) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed,
            session_id,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}:{}", self.client_seed, self.session_id).as_bytes());
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&mac.finalize().into_bytes());
        digest
    }

    pub fn next_floats(&self, count: usize) -> Vec<f64> {
        derive_floats(&self.hmac_bytes(), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Word256;

    fn ids() -> (RandomSeed, SessionId) {
        (
            RandomSeed(Word256::from_u64(7)),
            SessionId(Word256::from_u64(12345)),
        )
    }

    #[test]
    fn test_determinism() {
        let (seed, id) = ids();
        let rng1 = ProvablyFairRng::new("server", seed, id);
        let rng2 = ProvablyFairRng::new("server", seed, id);
        assert_eq!(rng1.server_seed_hash_hex(), rng2.server_seed_hash_hex());
        assert_eq!(rng1.hmac_bytes(), rng2.hmac_bytes());
        assert_eq!(rng1.next_floats(45), rng2.next_floats(45));
    }

    #[test]
    fn floats_stay_in_unit_interval_past_the_first_block() {
        let (seed, id) = ids();
        let floats = ProvablyFairRng::new("server", seed, id).next_floats(100);
        assert_eq!(floats.len(), 100);
        assert!(floats.iter().all(|f| (0.0..1.0).contains(f)));
    }

    #[test]
    fn session_id_changes_the_draw() {
        let (seed, id) = ids();
        let other = SessionId(Word256::from_u64(12346));
        assert_ne!(
            ProvablyFairRng::new("server", seed, id).hmac_bytes(),
            ProvablyFairRng::new("server", seed, other).hmac_bytes()
        );
    }
}
