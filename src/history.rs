
use bitvec::prelude::*;
use std::ops::RangeInclusive;

use crate::Outcome;

/// A register of resolved branch outcomes.
///
/// Bit 0 is always the most recently resolved outcome. Pushing a new outcome
/// moves every bit toward the end of the register, and the oldest bit falls
/// off the end.
#[derive(Clone, Debug)]
pub struct HistoryRegister {
    data: BitVec<usize, Lsb0>,
    len: usize,
}

// NOTE: This *reverses* the all of the bits and presents them in a format
// where the leftmost bit is the oldest (index n) and the rightmost bit is
// the newest (index 0).
impl std::fmt::Display for HistoryRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let x: String = self.data.as_bitslice().iter().by_vals()
            .map(|b| if b { '1' } else { '0' })
            .rev()
            .collect();
        write!(f, "{}", x)
    }
}

impl HistoryRegister {
    /// Create a register with the specified length in bits.
    /// All bits in the register are initialized to zero.
    pub fn new(len: usize) -> Self {
        Self {
            data: bitvec![usize, Lsb0; 0; len],
            len,
        }
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn data(&self) -> &BitSlice { self.data.as_bitslice() }

    /// Return the outcome recorded 'idx' branches ago.
    pub fn get(&self, idx: usize) -> Outcome {
        Outcome::from_bool(self.data[idx])
    }
}

impl HistoryRegister {
    /// Shift the register by 'n' bits.
    /// The bottom 'n' bits become zero, and the top 'n' bits are discarded.
    pub fn shift_by(&mut self, n: usize) {
        self.data.shift_right(n);
    }

    /// Record a new outcome in bit 0.
    pub fn push(&mut self, outcome: Outcome) {
        if self.is_empty() {
            return;
        }
        self.shift_by(1);
        self.data.set(0, outcome.into());
    }

    /// Fold [with XOR] some slice of bits.
    pub fn fold(&self, range: RangeInclusive<usize>, output_bits: usize)
        -> usize
    {
        let output_mask = (1 << output_bits) - 1;
        let slice = &self.data[range];
        let res = slice.chunks(output_bits).fold(0, |res, x| {
            res ^ x.load_le::<usize>()
        });
        res & output_mask
    }
}

/// A circular shift register used to track folded history.
///
/// This folds the newest 'history_len' bits of global history into
/// 'output_size' bits, but without the need to actually read all of the
/// history bits and fold them together with XOR on every branch.
/// The result is equivalent to using [HistoryRegister::fold] over the range
/// `0..=history_len-1`.
///
/// NOTE: This is only valid if history is shifted by a single bit between
/// calls to [FoldedHistoryRegister::update].
#[derive(Clone, Debug)]
pub struct FoldedHistoryRegister {
    data: BitVec,

    /// The size of the output [in bits].
    output_size: usize,

    /// The number of global history bits being folded.
    history_len: usize,
}
impl FoldedHistoryRegister {
    pub fn new(output_size: usize, history_len: usize) -> Self {
        assert!(output_size > 0 && output_size <= usize::BITS as usize);
        assert!(history_len > 0);
        Self {
            data: bitvec![0; output_size],
            output_size,
            history_len,
        }
    }

    /// Return the folded history as a [usize].
    pub fn output_usize(&self) -> usize { self.data.load_le::<usize>() }

    /// Using some [HistoryRegister] that was just shifted by one outcome,
    /// update the folded history.
    ///
    /// The register must hold at least `history_len + 1` bits.
    pub fn update(&mut self, ghr: &HistoryRegister) {
        let newest_bit = ghr.data()[0];
        let evicted_bit = ghr.data()[self.history_len];
        let index = self.history_len % self.output_size;

        // Rotate by one bit
        self.data.rotate_right(1);

        // The newest history bit enters at the bottom
        let first_bit = self.data[0] ^ newest_bit;
        self.data.set(0, first_bit);

        // The bit leaving the window was rotated into 'index'
        let last_bit = self.data[index] ^ evicted_bit;
        self.data.set(index, last_bit);
    }
}
