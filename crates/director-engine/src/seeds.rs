use std::fmt;
use std::str::FromStr;

use rand::Rng;
use sha2::{Digest, Sha256};

/// Seeds live in `0..2^31`, matching the host's seed widget.
pub const SEED_MODULUS: u64 = 1 << 31;

/// Version tag mixed into every derived seed. Changing it changes every
/// locked selection, so it only moves together with a documented format bump.
pub const DERIVATION_VERSION: &str = "director-lock/v1";

/// Seed of the independent stream for `tag` under `seed`.
///
/// SHA-256 over `"<version>:<tag>:<seed>"`, first eight bytes read big-endian.
/// Stable across runs, platforms and implementations.
pub fn derive_seed(seed: u64, tag: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_VERSION.as_bytes());
    hasher.update(b":");
    hasher.update(tag.as_bytes());
    hasher.update(b":");
    hasher.update(seed.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// SplitMix64 stream used for every selection draw. The sequence for a given
/// seed is pinned here so stored sessions replay across `rand` upgrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeRng {
    state: u64,
}

impl TakeRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Independent stream for one tag, see [`derive_seed`].
    pub fn derived(seed: u64, tag: &str) -> Self {
        Self::new(derive_seed(seed, tag))
    }

    /// Uniform pick: one draw, reduced modulo the slice length.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_u64() % items.len() as u64;
        items.get(idx as usize)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Fresh seed from the thread RNG; the only non-reproducible draw.
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen_range(0..SEED_MODULUS)
}

pub fn increment_seed(seed: u64) -> u64 {
    (seed % SEED_MODULUS + 1) % SEED_MODULUS
}

pub fn decrement_seed(seed: u64) -> u64 {
    (seed % SEED_MODULUS + SEED_MODULUS - 1) % SEED_MODULUS
}

/// What the node reports as its next seed, applied once to the original seed
/// after a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlAfterGenerate {
    #[default]
    Fixed,
    Increment,
    Decrement,
    Randomize,
}

impl ControlAfterGenerate {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAfterGenerate::Fixed => "fixed",
            ControlAfterGenerate::Increment => "increment",
            ControlAfterGenerate::Decrement => "decrement",
            ControlAfterGenerate::Randomize => "randomize",
        }
    }

    pub fn next_seed(self, seed: u64) -> u64 {
        match self {
            ControlAfterGenerate::Fixed => seed,
            ControlAfterGenerate::Increment => increment_seed(seed),
            ControlAfterGenerate::Decrement => decrement_seed(seed),
            ControlAfterGenerate::Randomize => fresh_seed(),
        }
    }
}

impl fmt::Display for ControlAfterGenerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlAfterGenerate {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(ControlAfterGenerate::Fixed),
            "increment" => Ok(ControlAfterGenerate::Increment),
            "decrement" => Ok(ControlAfterGenerate::Decrement),
            "randomize" => Ok(ControlAfterGenerate::Randomize),
            other => Err(format!("unknown control_after_generate '{other}'")),
        }
    }
}
