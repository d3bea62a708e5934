//! Helpers for collecting accuracy statistics on the host side.

use std::collections::*;
use bitvec::prelude::*;
use itertools::*;

use crate::branch::*;

/// Container for recording simple statistics while evaluating some model.
#[derive(Debug, Default)]
pub struct BranchStats {
    /// Per-branch statistics (indexed by program counter value).
    pub data: BTreeMap<usize, BranchData>,

    /// Number of correct predictions
    pub global_hits: usize,

    /// Number of times any branch instruction was executed
    pub global_brns: usize,
}
impl BranchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the global hit rate.
    pub fn hit_rate(&self) -> f64 {
        if self.global_brns == 0 {
            return 0.0;
        }
        self.global_hits as f64 / self.global_brns as f64
    }

    /// Return the global hit count.
    pub fn global_hits(&self) -> usize { self.global_hits }

    /// Return the global miss count.
    pub fn global_miss(&self) -> usize { self.global_brns - self.global_hits }

    /// Return the total branch count.
    pub fn global_brns(&self) -> usize { self.global_brns }

    /// Record a predicted outcome alongside the resolved outcome.
    pub fn update(&mut self,
        record: &BranchRecord, predicted: Outcome, outcome: Outcome)
    {
        let hit = predicted == outcome;
        self.global_brns += 1;
        if hit { self.global_hits += 1; }

        let data = self.get_mut(record.pc);
        data.occ += 1;
        data.pat.push(outcome.into());
        if hit { data.hits += 1; }
    }

    /// Returns a reference to data collected for a particular branch.
    pub fn get(&self, pc: usize) -> Option<&BranchData> {
        self.data.get(&pc)
    }

    /// Returns a mutable reference to data collected for a particular branch.
    /// Creates a new entry if one doesn't already exist.
    pub fn get_mut(&mut self, pc: usize) -> &mut BranchData {
        self.data.entry(pc).or_default()
    }

    /// Returns the number of unique observed branch instructions.
    pub fn num_unique_branches(&self) -> usize {
        self.data.len()
    }

    /// Returns the 'n' most frequently executed branches.
    pub fn get_common_branches(&self, n: usize) -> Vec<(usize, &BranchData)> {
        self.data.iter()
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }

    /// Returns up to 'n' frequently executed branches that are predicted
    /// correctly no more than 'max_rate' of the time.
    pub fn get_low_rate_branches(&self, n: usize, max_rate: f64)
        -> Vec<(usize, &BranchData)>
    {
        self.data.iter()
            .filter(|(_, s)| s.hit_rate() <= max_rate)
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }
}

/// Container for per-branch statistics.
#[derive(Debug, Default)]
pub struct BranchData {
    /// Number of times this branch was encountered.
    pub occ: usize,

    /// Number of correct predictions for this branch.
    pub hits: usize,

    /// Record of all observed outcomes for this branch.
    pub pat: BitVec,
}
impl BranchData {
    /// Return the hit rate for this branch.
    pub fn hit_rate(&self) -> f64 {
        if self.occ == 0 {
            return 0.0;
        }
        self.hits as f64 / self.occ as f64
    }

    pub fn is_always_taken(&self) -> bool {
        self.pat.all()
    }

    pub fn is_never_taken(&self) -> bool {
        self.pat.not_any()
    }
}
