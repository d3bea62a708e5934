//! Implementation of a saturating counter.

use crate::Outcome;

/// Configuration for building a [`SaturatingCounter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaturatingCounterConfig {
    /// Width of the counter [in bits]
    pub bits: u8,

    /// Initial value
    pub default_value: u8,
}
impl SaturatingCounterConfig {
    /// A counter initialized to the weakest 'not-taken' state.
    pub fn weak_not_taken(bits: u8) -> Self {
        Self { bits, default_value: Self::weak_value(bits, Outcome::N) }
    }

    /// A counter initialized to the weakest 'taken' state.
    pub fn weak_taken(bits: u8) -> Self {
        Self { bits, default_value: Self::weak_value(bits, Outcome::T) }
    }

    /// A counter initialized to zero.
    pub fn zeroed(bits: u8) -> Self {
        Self { bits, default_value: 0 }
    }

    /// Return the value on either side of the midpoint for some width.
    pub fn weak_value(bits: u8, outcome: Outcome) -> u8 {
        let mid = 1u8 << (bits - 1);
        match outcome {
            Outcome::T => mid,
            Outcome::N => mid - 1,
        }
    }

    pub fn build(self) -> SaturatingCounter {
        assert!(self.bits >= 1 && self.bits <= 7);
        let max = ((1u16 << self.bits) - 1) as u8;
        SaturatingCounter {
            max,
            value: self.default_value.min(max),
        }
    }
}

/// An N-bit unsigned saturating counter.
///
/// The most-significant bit is the predicted direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaturatingCounter {
    max: u8,
    value: u8,
}
impl SaturatingCounter {
    pub fn value(&self) -> u8 { self.value }

    /// Set the counter, clamping to the representable range.
    pub fn set(&mut self, val: u8) {
        self.value = val.min(self.max);
    }

    pub fn increment(&mut self) {
        if self.value < self.max {
            self.value += 1;
        }
    }

    pub fn decrement(&mut self) {
        self.value = self.value.saturating_sub(1);
    }

    /// Clear every bit selected by 'mask'.
    pub fn clear_bits(&mut self, mask: u8) {
        self.value &= !mask;
    }

    /// Move the counter to the weakest state for 'outcome'.
    pub fn set_weak(&mut self, outcome: Outcome) {
        let bits = (self.max.count_ones()) as u8;
        self.value = SaturatingCounterConfig::weak_value(bits, outcome);
    }

    /// Return the current predicted direction.
    pub fn predict(&self) -> Outcome {
        let msb = (self.max >> 1) + 1;
        Outcome::from_bool(self.value & msb != 0)
    }

    /// Move the counter toward the resolved outcome.
    pub fn update(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::T => self.increment(),
            Outcome::N => self.decrement(),
        }
    }
}
