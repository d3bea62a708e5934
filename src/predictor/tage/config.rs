
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::history::*;
use crate::predictor::*;

/// Width of the 'useful' counter in each tagged entry [in bits].
pub const USEFUL_BITS: u8 = 2;

/// Reasons a [`TAGEConfig`] cannot be used to build a predictor.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one tagged bank is required")]
    NoBanks,

    #[error("{what} index width must be within 1..=16 bits (got {bits})")]
    IndexBits { what: &'static str, bits: usize },

    #[error("tag width must be within 2..=16 bits (got {0})")]
    TagBits(usize),

    #[error("{what} counter width must be within 1..=7 bits (got {bits})")]
    CounterBits { what: &'static str, bits: u8 },

    #[error("invalid history range {min}..={max}")]
    HistoryRange { min: usize, max: usize },

    #[error("geometric history lengths are not strictly increasing: {0:?}")]
    HistoryLengths(Vec<usize>),

    #[error("aging interval must be non-zero")]
    AgingInterval,
}

/// Configuration for a [`TAGEBaseComponent`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TAGEBaseConfig {
    /// log2 of the number of entries
    pub index_bits: usize,

    /// Width of each saturating counter
    pub ctr_bits: u8,
}
impl Default for TAGEBaseConfig {
    fn default() -> Self {
        Self { index_bits: 12, ctr_bits: 2 }
    }
}
impl TAGEBaseConfig {
    pub fn size(&self) -> usize { 1 << self.index_bits }

    /// Get the [approximate] number of storage bits.
    pub fn storage_bits(&self) -> usize {
        self.ctr_bits as usize * self.size()
    }

    /// Use this configuration to create a new [`TAGEBaseComponent`].
    pub fn build(self) -> TAGEBaseComponent {
        let ctr = SaturatingCounterConfig::weak_not_taken(self.ctr_bits);
        TAGEBaseComponent {
            data: vec![ctr.build(); self.size()],
            cfg: self,
        }
    }
}

/// Configuration for a [`TAGEComponent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TAGEComponentConfig {
    /// log2 of the number of entries
    pub index_bits: usize,

    /// Number of tag bits
    pub tag_bits: usize,

    /// Number of global history bits hashed into the index and tag
    pub history_len: usize,

    /// Width of each saturating counter
    pub ctr_bits: u8,
}
impl TAGEComponentConfig {
    pub fn size(&self) -> usize { 1 << self.index_bits }

    /// Get the [approximate] number of storage bits.
    pub fn storage_bits(&self) -> usize {
        let entry_size = self.ctr_bits as usize
            + USEFUL_BITS as usize
            + self.tag_bits;
        entry_size * self.size()
    }

    /// Use this configuration to create a new [`TAGEComponent`].
    pub fn build(self) -> TAGEComponent {
        let entry = TAGEEntry::new(
            SaturatingCounterConfig::weak_taken(self.ctr_bits).build(),
            SaturatingCounterConfig::zeroed(USEFUL_BITS).build(),
        );
        TAGEComponent {
            data: vec![entry; self.size()],
            csr: FoldedHistoryRegister::new(self.index_bits, self.history_len),
            tag_csr: [
                FoldedHistoryRegister::new(self.tag_bits, self.history_len),
                FoldedHistoryRegister::new(self.tag_bits - 1, self.history_len),
            ],
            cfg: self,
        }
    }
}

/// Configuration for a [`TAGEPredictor`].
///
/// The default is a 4-bank design with 1024 entries per bank and history
/// lengths spread geometrically between 5 and 128 bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TAGEConfig {
    /// Base component configuration
    pub base: TAGEBaseConfig,

    /// Number of tagged banks
    pub num_banks: usize,

    /// log2 of the number of entries in each bank
    pub index_bits: usize,

    /// Number of tag bits in each bank
    pub tag_bits: usize,

    /// Width of the saturating counter in each tagged entry
    pub ctr_bits: u8,

    /// History length used by the shortest bank
    pub min_history: usize,

    /// History length used by the longest bank
    pub max_history: usize,

    /// Number of updates between clearing a plane of 'useful' bits
    pub aging_interval: usize,

    /// Seed for the random number generator used during allocation
    pub seed: Option<u64>,
}
impl Default for TAGEConfig {
    fn default() -> Self {
        Self {
            base: TAGEBaseConfig::default(),
            num_banks: 4,
            index_bits: 10,
            tag_bits: 9,
            ctr_bits: 3,
            min_history: 5,
            max_history: 128,
            aging_interval: 1 << 18,
            seed: None,
        }
    }
}
impl TAGEConfig {
    /// History length for each bank, from shortest to longest.
    ///
    /// Lengths are interpolated geometrically:
    /// `round(min * (max/min)^(i/(n-1)))`.
    pub fn history_lengths(&self) -> Vec<usize> {
        let n = self.num_banks;
        if n == 1 {
            return vec![self.min_history];
        }
        let min = self.min_history as f64;
        let ratio = self.max_history as f64 / min;
        (0..n).map(|i| {
            let exp = i as f64 / (n - 1) as f64;
            (min * ratio.powf(exp)).round() as usize
        }).collect()
    }

    /// Configurations for each tagged bank, from shortest to longest history.
    pub fn components(&self) -> Vec<TAGEComponentConfig> {
        self.history_lengths().into_iter().map(|history_len| {
            TAGEComponentConfig {
                index_bits: self.index_bits,
                tag_bits: self.tag_bits,
                history_len,
                ctr_bits: self.ctr_bits,
            }
        }).collect()
    }

    /// Number of bits needed in the global history register.
    ///
    /// One extra bit keeps the outcome leaving the longest window visible
    /// while the folded registers are updated.
    pub fn ghr_bits(&self) -> usize {
        self.max_history + 1
    }

    pub fn total_entries(&self) -> usize {
        self.base.size() + self.num_banks * (1 << self.index_bits)
    }

    /// Get the [approximate] number of storage bits.
    pub fn storage_bits(&self) -> usize {
        let c: usize = self.components().iter().map(|c| c.storage_bits()).sum();
        c + self.base.storage_bits()
    }

    /// Check that this configuration describes a buildable predictor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_banks == 0 {
            return Err(ConfigError::NoBanks);
        }
        if !(1..=16).contains(&self.base.index_bits) {
            return Err(ConfigError::IndexBits {
                what: "base", bits: self.base.index_bits
            });
        }
        if !(1..=16).contains(&self.index_bits) {
            return Err(ConfigError::IndexBits {
                what: "bank", bits: self.index_bits
            });
        }
        if !(2..=16).contains(&self.tag_bits) {
            return Err(ConfigError::TagBits(self.tag_bits));
        }
        if !(1..=7).contains(&self.base.ctr_bits) {
            return Err(ConfigError::CounterBits {
                what: "base", bits: self.base.ctr_bits
            });
        }
        if !(1..=7).contains(&self.ctr_bits) {
            return Err(ConfigError::CounterBits {
                what: "bank", bits: self.ctr_bits
            });
        }
        if self.min_history == 0 || self.max_history < self.min_history {
            return Err(ConfigError::HistoryRange {
                min: self.min_history, max: self.max_history
            });
        }
        let lengths = self.history_lengths();
        if !lengths.iter().tuple_windows().all(|(x, y)| x < y) {
            return Err(ConfigError::HistoryLengths(lengths));
        }
        if self.aging_interval == 0 {
            return Err(ConfigError::AgingInterval);
        }
        Ok(())
    }

    /// Use this configuration to create a new [`TAGEPredictor`].
    ///
    /// Allocation draws from [StdRng], seeded from [TAGEConfig::seed] when
    /// present and from system entropy otherwise.
    pub fn build(self) -> Result<TAGEPredictor, ConfigError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.build_with_rng(rng)
    }

    /// Use this configuration to create a new [`TAGEPredictor`] that draws
    /// from the provided random number generator.
    pub fn build_with_rng<R: Rng>(self, rng: R)
        -> Result<TAGEPredictor<R>, ConfigError>
    {
        self.validate()?;
        let comp: Vec<TAGEComponent> = self.components().into_iter()
            .map(|c| c.build())
            .collect();
        for (idx, c) in comp.iter().enumerate() {
            log::debug!("bank {} geometry length = {}", idx, c.cfg.history_len);
        }
        let ghr = HistoryRegister::new(self.ghr_bits());
        let base = self.base.clone().build();
        let stat = TAGEStats::new(comp.len());
        Ok(TAGEPredictor {
            cfg: self,
            stat,
            base,
            comp,
            ghr,
            rng,
            pending: None,
            refresh_ctr: 0,
            refresh_msb: true,
        })
    }
}
