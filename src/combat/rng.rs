//! Fast PRNG for dice rolling. Uses SplitMix64 for throughput and good statistical quality.
//! Deterministic: same seed produces the same sequence. Not cryptographically secure.

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seed from the OS entropy source. Falls back to a clock-derived seed if
    /// the platform source is unavailable.
    pub fn from_entropy() -> Self {
        Self::new(entropy_seed())
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(SPLITMIX64_GOLDEN);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
        z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
        z ^ (z >> 31)
    }

    /// Uniform face in `1..=sides`. Rejection sampling keeps every face equally likely.
    #[inline]
    pub fn roll_die(&mut self, sides: u32) -> u32 {
        debug_assert!(sides > 0);
        let sides = u64::from(sides.max(1));
        let zone = u64::MAX - (u64::MAX % sides);
        loop {
            let value = self.next_u64();
            if value < zone {
                return (value % sides) as u32 + 1;
            }
        }
    }

    /// Derive an independent stream, e.g. one per shard of a split request.
    pub fn fork(&mut self, stream: u64) -> Self {
        let mut mixer = Self::new(self.next_u64() ^ stream.wrapping_mul(SPLITMIX64_M1));
        Self::new(mixer.next_u64())
    }
}

pub fn entropy_seed() -> u64 {
    let mut bytes = [0_u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(err) => {
            tracing::warn!(%err, "os entropy unavailable, seeding from clock");
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or(SPLITMIX64_GOLDEN)
        }
    }
}
