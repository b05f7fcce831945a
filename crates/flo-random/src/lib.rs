#![forbid(unsafe_code)]

//! Deterministic random streams for fixture generation.
//!
//! Fixture vectors are drawn from the same stream NumPy's legacy
//! `np.random.seed(seed); np.random.randn(n)` produces, so regenerated
//! fixtures are byte-identical across runs and comparable with arrays
//! produced by the reference tooling.

pub const DEFAULT_FIXTURE_SEED: u32 = 42;
pub const MAX_DRAW_LENGTH: usize = 1 << 31;

pub const RANDOM_REASON_CODES: [&str; 3] = [
    "random_seed_rejected",
    "random_state_schema_invalid",
    "random_length_overflow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomError {
    SeedRejected,
    StateSchemaInvalid(&'static str),
    LengthOverflow,
}

impl RandomError {
    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::SeedRejected => "random_seed_rejected",
            Self::StateSchemaInvalid(_) => "random_state_schema_invalid",
            Self::LengthOverflow => "random_length_overflow",
        }
    }
}

impl std::fmt::Display for RandomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeedRejected => write!(f, "seed must be between 0 and 2**32 - 1"),
            Self::StateSchemaInvalid(msg) => write!(f, "{msg}"),
            Self::LengthOverflow => write!(f, "requested draw length exceeds bounded budget"),
        }
    }
}

impl std::error::Error for RandomError {}

const MT_N: usize = 624;
const MT_M: usize = 397;
const MT_MATRIX_A: u32 = 0x9908_b0df;
const MT_UPPER_MASK: u32 = 0x8000_0000;
const MT_LOWER_MASK: u32 = 0x7fff_ffff;
const MT_INIT_MULT: u32 = 1_812_433_253;

/// NumPy-compatible MT19937 (Mersenne Twister) with classic `init_genrand`
/// seeding, i.e. the bit stream behind `np.random.seed(seed)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mt19937Rng {
    mt: Vec<u32>,
    pos: usize,
}

impl Mt19937Rng {
    /// After seeding `pos = N`, so the first draw triggers a twist.
    #[must_use]
    pub fn from_u32_seed(seed: u32) -> Self {
        let mut mt = vec![0u32; MT_N];
        mt[0] = seed;
        for i in 1..MT_N {
            mt[i] = MT_INIT_MULT
                .wrapping_mul(mt[i - 1] ^ (mt[i - 1] >> 30))
                .wrapping_add(i as u32);
        }
        Self { mt, pos: MT_N }
    }

    /// Legacy seeding accepts integers in `[0, 2**32 - 1]` only.
    pub fn from_u64_seed(seed: u64) -> Result<Self, RandomError> {
        let seed = u32::try_from(seed).map_err(|_| RandomError::SeedRejected)?;
        Ok(Self::from_u32_seed(seed))
    }

    pub fn from_raw_state(mt: &[u32], pos: usize) -> Result<Self, RandomError> {
        if mt.len() != MT_N {
            return Err(RandomError::StateSchemaInvalid(
                "MT19937 state vector must have exactly 624 elements",
            ));
        }
        if pos > MT_N {
            return Err(RandomError::StateSchemaInvalid(
                "MT19937 position must be <= 624",
            ));
        }
        Ok(Self {
            mt: mt.to_vec(),
            pos,
        })
    }

    #[must_use]
    pub fn raw_state(&self) -> (&[u32], usize) {
        (&self.mt, self.pos)
    }

    fn twist(&mut self) {
        for kk in 0..(MT_N - MT_M) {
            let y = (self.mt[kk] & MT_UPPER_MASK) | (self.mt[kk + 1] & MT_LOWER_MASK);
            self.mt[kk] = self.mt[kk + MT_M] ^ (y >> 1) ^ if y & 1 != 0 { MT_MATRIX_A } else { 0 };
        }
        for kk in (MT_N - MT_M)..(MT_N - 1) {
            let y = (self.mt[kk] & MT_UPPER_MASK) | (self.mt[kk + 1] & MT_LOWER_MASK);
            self.mt[kk] =
                self.mt[kk + MT_M - MT_N] ^ (y >> 1) ^ if y & 1 != 0 { MT_MATRIX_A } else { 0 };
        }
        let y = (self.mt[MT_N - 1] & MT_UPPER_MASK) | (self.mt[0] & MT_LOWER_MASK);
        self.mt[MT_N - 1] =
            self.mt[MT_M - 1] ^ (y >> 1) ^ if y & 1 != 0 { MT_MATRIX_A } else { 0 };
    }

    #[must_use]
    fn temper(mut y: u32) -> u32 {
        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^= y >> 18;
        y
    }

    #[must_use]
    pub fn next_u32(&mut self) -> u32 {
        if self.pos >= MT_N {
            self.twist();
            self.pos = 0;
        }
        let y = self.mt[self.pos];
        self.pos += 1;
        Self::temper(y)
    }

    /// `genrand_res53`: 27 high bits of one draw and 26 of the next form a
    /// 53-bit mantissa in `[0, 1)`.
    #[must_use]
    pub fn next_f64(&mut self) -> f64 {
        let a = f64::from(self.next_u32() >> 5);
        let b = f64::from(self.next_u32() >> 6);
        (a * 67_108_864.0 + b) * (1.0 / 9_007_199_254_740_992.0)
    }

    #[must_use]
    pub fn fill_u32(&mut self, len: usize) -> Vec<u32> {
        (0..len).map(|_| self.next_u32()).collect()
    }
}

/// Snapshot of a [`LegacyGaussian`], shaped like the tuple returned by
/// `RandomState.get_state()`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyGaussianState {
    pub key: Vec<u32>,
    pub pos: usize,
    pub has_gauss: bool,
    pub cached_gaussian: f64,
}

/// `RandomState`-style sampler: MT19937 plus the cached second deviate of
/// the polar Box-Muller transform.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyGaussian {
    rng: Mt19937Rng,
    cached: Option<f64>,
}

impl LegacyGaussian {
    #[must_use]
    pub fn seeded(seed: u32) -> Self {
        Self {
            rng: Mt19937Rng::from_u32_seed(seed),
            cached: None,
        }
    }

    pub fn from_u64_seed(seed: u64) -> Result<Self, RandomError> {
        Ok(Self {
            rng: Mt19937Rng::from_u64_seed(seed)?,
            cached: None,
        })
    }

    /// Reseeding also drops any cached deviate.
    pub fn seed(&mut self, seed: u32) {
        self.rng = Mt19937Rng::from_u32_seed(seed);
        self.cached = None;
    }

    #[must_use]
    pub fn next_f64(&mut self) -> f64 {
        self.rng.next_f64()
    }

    #[must_use]
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(cached) = self.cached.take() {
            return cached;
        }

        loop {
            let x1 = 2.0 * self.rng.next_f64() - 1.0;
            let x2 = 2.0 * self.rng.next_f64() - 1.0;
            let r2 = x1 * x1 + x2 * x2;
            if r2 >= 1.0 || r2 == 0.0 {
                continue;
            }
            let f = (-2.0 * r2.ln() / r2).sqrt();
            self.cached = Some(f * x1);
            return f * x2;
        }
    }

    pub fn randn(&mut self, len: usize) -> Result<Vec<f64>, RandomError> {
        if len > MAX_DRAW_LENGTH {
            return Err(RandomError::LengthOverflow);
        }
        Ok((0..len).map(|_| self.standard_normal()).collect())
    }

    pub fn random_sample(&mut self, len: usize) -> Result<Vec<f64>, RandomError> {
        if len > MAX_DRAW_LENGTH {
            return Err(RandomError::LengthOverflow);
        }
        Ok((0..len).map(|_| self.rng.next_f64()).collect())
    }

    #[must_use]
    pub fn state(&self) -> LegacyGaussianState {
        let (key, pos) = self.rng.raw_state();
        LegacyGaussianState {
            key: key.to_vec(),
            pos,
            has_gauss: self.cached.is_some(),
            cached_gaussian: self.cached.unwrap_or(0.0),
        }
    }

    pub fn set_state(&mut self, state: &LegacyGaussianState) -> Result<(), RandomError> {
        if state.has_gauss && !state.cached_gaussian.is_finite() {
            return Err(RandomError::StateSchemaInvalid(
                "cached gaussian must be finite when has_gauss is set",
            ));
        }
        self.rng = Mt19937Rng::from_raw_state(&state.key, state.pos)?;
        self.cached = state.has_gauss.then_some(state.cached_gaussian);
        Ok(())
    }
}
