//! Implementation of a "TAgged GEometric history length" (TAGE) predictor.

pub mod component;
pub mod stat;
pub mod config;

pub use component::*;
pub use stat::*;
pub use config::*;

use rand::Rng;
use rand::rngs::StdRng;

use crate::history::*;
use crate::predictor::*;
use crate::{ ArchState, BranchRecord, Outcome };

/// Identifies a particular component in a [`TAGEPredictor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TAGEProvider {
    /// The base component
    Base,

    /// A tagged component
    Tagged(usize),
}

/// The index and tag computed by a single tagged component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TAGELookup {
    /// Index of the selected entry
    pub idx: usize,

    /// Tag computed for this branch
    pub tag: u16,

    /// Whether the selected entry matched the tag
    pub hit: bool,
}

/// Container for output from [`TAGEPredictor::lookup`], including the
/// predicted outcome and other metadata about how the prediction was made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TAGEPrediction {
    /// Program counter value used to make this prediction
    pub pc: usize,

    /// The component providing the prediction
    pub provider: TAGEProvider,

    /// A predicted direction
    pub outcome: Outcome,

    /// Alternate component used to provide a prediction
    pub alt_provider: TAGEProvider,

    /// Predicted direction from the alternate component
    pub alt_outcome: Outcome,

    /// Index and tag for each tagged component
    pub banks: Vec<TAGELookup>,
}

/// The "TAgged GEometric history length" predictor.
///
/// See the following:
///  - "A case for (partially) TAgged GEometric history length branch prediction"
///  (Seznec, 2006).
///
/// Tagged components are ordered by history length: the component at
/// index 0 has the shortest history. The predictor owns its global history,
/// so every call to [`TAGEPredictor::update`] must follow the matching call
/// to [`TAGEPredictor::predict`] in program order.
#[derive(Debug)]
pub struct TAGEPredictor<R: Rng = StdRng> {
    /// The configuration used to create this object
    pub cfg: TAGEConfig,

    pub stat: TAGEStats,

    /// Base component
    pub base: TAGEBaseComponent,

    /// Tagged components
    pub comp: Vec<TAGEComponent>,

    /// Global history register
    pub ghr: HistoryRegister,

    /// Source of random draws during allocation
    rng: R,

    /// The most recent prediction, consumed by the next update
    pending: Option<TAGEPrediction>,

    /// Number of updates since the last time 'useful' bits were cleared
    refresh_ctr: usize,

    /// Whether the next aging event clears the high plane of 'useful' bits
    refresh_msb: bool,
}

impl<R: Rng> TAGEPredictor<R> {
    /// Return the number of tagged components.
    pub fn num_tagged_components(&self) -> usize {
        self.comp.len()
    }

    /// Return the prediction waiting to be consumed by an update.
    pub fn pending(&self) -> Option<&TAGEPrediction> {
        self.pending.as_ref()
    }

    /// Access all tagged components for some program counter value.
    fn get_tagged_lookups(&self, pc: usize) -> Vec<TAGELookup> {
        self.comp.iter().map(|c| {
            let idx = c.get_index(pc);
            let tag = c.get_tag(pc);
            let hit = c.get_entry(idx).tag_matches(tag);
            TAGELookup { idx, tag, hit }
        }).collect()
    }

    /// Make a prediction for some program counter value without changing
    /// the state of the predictor.
    pub fn lookup(&self, pc: usize) -> TAGEPrediction {
        let banks = self.get_tagged_lookups(pc);

        // The base component provides the default predicted outcome
        // for cases where we miss in all tagged components
        let default_outcome = self.base.predict(pc);
        let mut result = TAGEPrediction {
            pc,
            provider: TAGEProvider::Base,
            outcome: default_outcome,
            alt_provider: TAGEProvider::Base,
            alt_outcome: default_outcome,
            banks,
        };

        // Scan from the shortest to the longest history length. Every hit
        // pushes the running prediction into the alternate, so the
        // longest-length hit ends up as the provider.
        for (comp_idx, lookup) in result.banks.iter().enumerate() {
            if lookup.hit {
                let entry = self.comp[comp_idx].get_entry(lookup.idx);
                result.alt_provider = result.provider;
                result.alt_outcome = result.outcome;
                result.provider = TAGEProvider::Tagged(comp_idx);
                result.outcome = entry.predict();
            }
        }
        result
    }

    /// Make a prediction for some program counter value.
    ///
    /// The result is held until the next call to [`TAGEPredictor::update`].
    pub fn predict(&mut self, pc: usize) -> Outcome {
        let prediction = self.lookup(pc);
        let outcome = prediction.outcome;
        self.pending = Some(prediction);
        outcome
    }

    /// Given the resolved outcome of the most recently predicted branch,
    /// update the state of the predictor.
    pub fn update(&mut self, pc: usize, outcome: Outcome) {
        let prediction = match self.pending.take() {
            Some(p) if p.pc == pc => p,
            Some(p) => {
                log::warn!("update for {:#x} doesn't match prediction for {:#x}",
                    pc, p.pc);
                self.lookup(pc)
            },
            None => {
                log::warn!("update for {:#x} without a prediction", pc);
                self.lookup(pc)
            },
        };

        match prediction.provider {
            TAGEProvider::Base => self.stat.base_provided += 1,
            TAGEProvider::Tagged(idx) => self.stat.comp_provided[idx] += 1,
        }
        if prediction.outcome != outcome {
            self.stat.misses += 1;
        }

        // The base component is always trained
        self.base.update(pc, outcome);

        // The 'useful' counter only moves when the alternate prediction
        // disagrees with the provider
        if let TAGEProvider::Tagged(idx) = prediction.provider {
            if prediction.alt_outcome != prediction.outcome {
                let entry_idx = prediction.banks[idx].idx;
                let entry = self.comp[idx].get_entry_mut(entry_idx);
                if prediction.outcome == outcome {
                    entry.useful.increment();
                } else {
                    entry.useful.decrement();
                }
            }
        }

        if (self.refresh_ctr + 1) % self.cfg.aging_interval == 0 {
            self.age_useful();
        }

        if let TAGEProvider::Tagged(idx) = prediction.provider {
            let entry_idx = prediction.banks[idx].idx;
            self.comp[idx].get_entry_mut(entry_idx).ctr.update(outcome);
        }

        if prediction.outcome != outcome {
            self.allocate(&prediction, outcome);
        }

        self.update_history(outcome);
        self.refresh_ctr = (self.refresh_ctr + 1) % self.cfg.aging_interval;
        self.stat.clk += 1;
    }

    /// Record an outcome in global history and update the folded history
    /// registers in each tagged component.
    ///
    /// [`TAGEPredictor::update`] already does this for predicted branches.
    pub fn update_history(&mut self, outcome: Outcome) {
        self.ghr.push(outcome);
        for comp in self.comp.iter_mut() {
            comp.update_history(&self.ghr);
        }
    }

    /// Clear one plane of the 'useful' counters in all tagged components,
    /// alternating between the high and low bit.
    fn age_useful(&mut self) {
        let mask = if self.refresh_msb { 1 << (USEFUL_BITS - 1) } else { 1 };
        log::debug!("clearing useful bits (mask {:#04b}) after {} updates",
            mask, self.stat.clk + 1);
        for comp in self.comp.iter_mut() {
            comp.clear_useful_bits(mask);
        }
        self.refresh_msb = !self.refresh_msb;
        self.stat.resets += 1;
    }

    /// Tagged components with a longer history than the provider.
    fn alloc_range(&self, provider: TAGEProvider) -> std::ops::Range<usize> {
        match provider {
            TAGEProvider::Base => 0..self.comp.len(),
            TAGEProvider::Tagged(idx) => (idx + 1)..self.comp.len(),
        }
    }

    /// Build a table of cumulative weights over all components eligible
    /// for allocation.
    ///
    /// A component is only eligible when the selected entry has its 'useful'
    /// counter set to zero. Components are visited from the longest history
    /// length toward the provider, and the weight doubles for each eligible
    /// component: given candidates with history lengths J and K (where
    /// J < K), J is twice as likely to be chosen.
    fn alloc_weights(&self, prediction: &TAGEPrediction) -> Vec<(usize, usize)> {
        let mut res = Vec::new();
        let mut weight = 1;
        let mut total = 0;
        for idx in self.alloc_range(prediction.provider).rev() {
            let entry = self.comp[idx].get_entry(prediction.banks[idx].idx);
            if entry.is_replaceable() {
                total += weight;
                res.push((idx, total));
                weight <<= 1;
            }
        }
        res
    }

    /// Try to allocate an entry after a misprediction.
    ///
    /// If every candidate entry is still useful, all of them are decayed
    /// instead so that space eventually frees up.
    fn allocate(&mut self, prediction: &TAGEPrediction, outcome: Outcome) {
        let range = self.alloc_range(prediction.provider);
        if range.is_empty() {
            return;
        }

        let weights = self.alloc_weights(prediction);
        let total = match weights.last() {
            Some((_, total)) => *total,
            None => {
                for idx in range {
                    let entry_idx = prediction.banks[idx].idx;
                    self.comp[idx].get_entry_mut(entry_idx).useful.decrement();
                }
                log::trace!("failed allocation for {:#x}", prediction.pc);
                self.stat.failed_alcs += 1;
                return;
            },
        };

        let draw = self.rng.gen_range(0..total);
        let selected = weights.iter().find(|(_, cum)| *cum > draw);
        if let Some(&(idx, _)) = selected {
            let TAGELookup { idx: entry_idx, tag, .. } = prediction.banks[idx];
            self.comp[idx].get_entry_mut(entry_idx).allocate(tag, outcome);
            log::trace!("allocated {:#x} in bank {} (entry {:#x}, tag {:#x})",
                prediction.pc, idx, entry_idx, tag);
            self.stat.alcs += 1;
        }
    }
}

impl<R: Rng> ConditionalPredictor for TAGEPredictor<R> {
    fn name(&self) -> &'static str { "TAGE" }

    fn predict_branch(&mut self, record: &BranchRecord) -> Outcome {
        self.predict(record.pc)
    }

    fn update_branch(&mut self,
        record: &BranchRecord,
        _state: &ArchState,
        outcome: Outcome
    )
    {
        self.update(record.pc, outcome);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;
    use rand::rngs::mock::StepRng;

    // Low 9 bits are nonzero, so the tag never matches an unused entry
    // while history is still empty.
    const PC: usize = 0x4000_1234;

    fn tage(cfg: TAGEConfig) -> TAGEPredictor {
        TAGEConfig { seed: Some(1), ..cfg }.build().unwrap()
    }

    fn default_tage() -> TAGEPredictor {
        tage(TAGEConfig::default())
    }

    /// Make the selected entry in a component match the next lookup for 'pc'.
    fn plant<R: Rng>(t: &mut TAGEPredictor<R>, comp: usize, pc: usize,
        ctr: u8, useful: u8) -> usize
    {
        let lookup = t.lookup(pc).banks[comp];
        let entry = t.comp[comp].get_entry_mut(lookup.idx);
        entry.tag = lookup.tag;
        entry.ctr.set(ctr);
        entry.useful.set(useful);
        lookup.idx
    }

    fn set_all_useful<R: Rng>(t: &mut TAGEPredictor<R>, val: u8) {
        for comp in t.comp.iter_mut() {
            for entry in comp.data.iter_mut() {
                entry.useful.set(val);
            }
        }
    }

    fn all_useful<R: Rng>(t: &TAGEPredictor<R>, f: impl Fn(u8) -> bool) -> bool {
        t.comp.iter().all(|c| c.data.iter().all(|e| f(e.useful.value())))
    }

    /// A fixed, irregular stream of outcomes.
    fn outcomes(n: usize) -> Vec<Outcome> {
        let mut x: u32 = 0x2545_f491;
        (0..n).map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            Outcome::from(x & 1 != 0)
        }).collect()
    }

    #[test]
    fn fresh_predictor_uses_base() {
        let mut t = default_tage();
        for pc in (PC..PC + 64).step_by(4) {
            let p = t.lookup(pc);
            assert_eq!(p.provider, TAGEProvider::Base);
            assert_eq!(p.outcome, Outcome::N);
            assert!(p.banks.iter().all(|b| !b.hit));
        }
        assert_eq!(t.predict(PC), Outcome::N);
        assert_eq!(t.pending().map(|p| p.pc), Some(PC));
    }

    #[test]
    fn zero_tag_hits_unused_entries() {
        let t = default_tage();
        // Low 9 bits are zero: the computed tag is zero in every bank,
        // matching the zero-initialized tags.
        let p = t.lookup(0x4000_1200);
        assert!(p.banks.iter().all(|b| b.hit && b.tag == 0));
        assert_eq!(p.provider, TAGEProvider::Tagged(3));
        assert_eq!(p.alt_provider, TAGEProvider::Tagged(2));
        // Unused entries start weakly taken
        assert_eq!(p.outcome, Outcome::T);
        assert_eq!(p.alt_outcome, Outcome::T);
    }

    #[test]
    fn longest_hit_provides() {
        let mut t = default_tage();
        plant(&mut t, 0, PC, 7, 0);
        plant(&mut t, 1, PC, 0, 0);
        plant(&mut t, 2, PC, 7, 0);

        let p = t.lookup(PC);
        assert_eq!(p.provider, TAGEProvider::Tagged(2));
        assert_eq!(p.outcome, Outcome::T);
        assert_eq!(p.alt_provider, TAGEProvider::Tagged(1));
        assert_eq!(p.alt_outcome, Outcome::N);
        assert!(!p.banks[3].hit);
    }

    #[test]
    fn useful_moves_on_disagreement() {
        // The provider predicts taken, the base component predicts not-taken
        let mut t = default_tage();
        let idx = plant(&mut t, 1, PC, 5, 1);
        assert_eq!(t.predict(PC), Outcome::T);
        t.update(PC, Outcome::T);
        let e = t.comp[1].get_entry(idx);
        assert_eq!(e.useful.value(), 2);
        assert_eq!(e.ctr.value(), 6);
        assert_eq!(t.stat.comp_provided[1], 1);
        assert_eq!(t.stat.alcs, 0);
    }

    #[test]
    fn useful_holds_on_agreement() {
        let mut t = default_tage();
        plant(&mut t, 1, PC, 5, 1);
        let idx = plant(&mut t, 2, PC, 4, 1);
        let p = t.lookup(PC);
        assert_eq!(p.provider, TAGEProvider::Tagged(2));
        assert_eq!(p.alt_outcome, p.outcome);

        t.predict(PC);
        t.update(PC, Outcome::N);
        let e = t.comp[2].get_entry(idx);
        assert_eq!(e.useful.value(), 1);
        assert_eq!(e.ctr.value(), 3);
    }

    #[test]
    fn allocation_skips_useful_and_shorter_banks() {
        let mut t = default_tage();
        plant(&mut t, 1, PC, 7, 0);
        let p = t.lookup(PC);
        t.comp[2].get_entry_mut(p.banks[2].idx).useful.set(1);

        assert_eq!(t.predict(PC), Outcome::T);
        t.update(PC, Outcome::N);

        // Bank 3 is the only eligible candidate
        let e3 = t.comp[3].get_entry(p.banks[3].idx);
        assert_eq!(e3.tag, p.banks[3].tag);
        assert_eq!(e3.ctr.value(), 3);
        assert_eq!(e3.useful.value(), 0);

        let e2 = t.comp[2].get_entry(p.banks[2].idx);
        assert_eq!(e2.tag, 0);
        assert_eq!(e2.useful.value(), 1);

        let e0 = t.comp[0].get_entry(p.banks[0].idx);
        assert_eq!(e0.tag, 0);
        assert_eq!(t.stat.alcs, 1);
        assert_eq!(t.stat.misses, 1);
    }

    #[test]
    fn failed_allocation_decays_candidates() {
        let mut t = default_tage();
        plant(&mut t, 1, PC, 7, 0);
        let p = t.lookup(PC);
        t.comp[2].get_entry_mut(p.banks[2].idx).useful.set(2);
        t.comp[3].get_entry_mut(p.banks[3].idx).useful.set(2);

        t.predict(PC);
        t.update(PC, Outcome::N);

        for comp in [2, 3] {
            let e = t.comp[comp].get_entry(p.banks[comp].idx);
            assert_eq!(e.useful.value(), 1);
            assert_eq!(e.tag, 0);
            assert_eq!(e.ctr.value(), 4);
        }
        assert_eq!(t.stat.alcs, 0);
        assert_eq!(t.stat.failed_alcs, 1);
    }

    #[test]
    fn longest_provider_never_allocates() {
        let mut t = default_tage();
        plant(&mut t, 3, PC, 7, 0);
        t.predict(PC);
        t.update(PC, Outcome::N);
        assert_eq!(t.stat.misses, 1);
        assert_eq!(t.stat.alcs, 0);
        assert_eq!(t.stat.failed_alcs, 0);
    }

    #[test]
    fn alloc_weights_favor_shorter_history() {
        let mut t = default_tage();
        let p = t.lookup(PC);
        assert_eq!(t.alloc_weights(&p), vec![(3, 1), (2, 3), (1, 7), (0, 15)]);

        t.comp[2].get_entry_mut(p.banks[2].idx).useful.set(1);
        assert_eq!(t.alloc_weights(&p), vec![(3, 1), (1, 3), (0, 7)]);

        let p1 = TAGEPrediction { provider: TAGEProvider::Tagged(1), ..p };
        assert_eq!(t.alloc_weights(&p1), vec![(3, 1)]);
    }

    #[test]
    fn draw_zero_selects_longest_candidate() {
        let cfg = TAGEConfig::default();
        let mut t = cfg.build_with_rng(StepRng::new(0, 0)).unwrap();
        let p = t.lookup(PC);
        assert_eq!(t.predict(PC), Outcome::N);
        t.update(PC, Outcome::T);

        let e3 = t.comp[3].get_entry(p.banks[3].idx);
        assert_eq!(e3.tag, p.banks[3].tag);
        assert_eq!(e3.ctr.value(), 4);
        for comp in 0..3 {
            assert_eq!(t.comp[comp].get_entry(p.banks[comp].idx).tag, 0);
        }
    }

    #[test]
    fn aging_alternates_bit_planes() {
        let mut t = tage(TAGEConfig { aging_interval: 8, ..Default::default() });
        set_all_useful(&mut t, 3);

        // Feeding back the predicted outcome never allocates
        for _ in 0..7 {
            let o = t.predict(PC);
            t.update(PC, o);
        }
        assert_eq!(t.stat.resets, 0);

        let o = t.predict(PC);
        t.update(PC, o);
        assert_eq!(t.stat.resets, 1);
        assert!(all_useful(&t, |u| u & 0b10 == 0));

        set_all_useful(&mut t, 3);
        for _ in 0..8 {
            let o = t.predict(PC);
            t.update(PC, o);
        }
        assert_eq!(t.stat.resets, 2);
        assert!(all_useful(&t, |u| u & 0b01 == 0));
        assert_eq!(t.stat.misses, 0);
    }

    #[test]
    fn history_round_trip() {
        let mut t = default_tage();
        let stream = outcomes(200);
        for o in stream.iter() {
            t.predict(PC);
            t.update(PC, *o);
        }
        assert_eq!(t.ghr.len(), 129);
        for (idx, o) in stream.iter().rev().take(t.ghr.len()).enumerate() {
            assert_eq!(t.ghr.get(idx), *o);
        }
    }

    #[test]
    fn folded_registers_track_history() {
        let mut t = default_tage();
        for (i, o) in outcomes(500).into_iter().enumerate() {
            let pc = PC + (i % 7) * 4;
            t.predict(pc);
            t.update(pc, o);
        }
        for c in t.comp.iter() {
            let range = 0..=c.history_len() - 1;
            let width = c.cfg.index_bits;
            let tag_width = c.cfg.tag_bits;
            assert_eq!(c.csr.output_usize(), t.ghr.fold(range.clone(), width));
            assert_eq!(c.tag_csr[0].output_usize(),
                t.ghr.fold(range.clone(), tag_width));
            assert_eq!(c.tag_csr[1].output_usize(),
                t.ghr.fold(range, tag_width - 1));
        }
    }

    #[test]
    fn update_without_predict_matches() {
        let mut a = default_tage();
        let mut b = default_tage();
        for (i, o) in outcomes(300).into_iter().enumerate() {
            let pc = PC + (i % 5) * 4;
            a.predict(pc);
            a.update(pc, o);
            b.update(pc, o);
        }
        assert_eq!(a.base.data, b.base.data);
        for (x, y) in a.comp.iter().zip(b.comp.iter()) {
            assert_eq!(x.data, y.data);
        }
        assert_eq!(a.ghr.data(), b.ghr.data());
        assert_eq!(a.stat, b.stat);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn counters_stay_in_range(
            branches in prop::collection::vec((0usize..16, any::<bool>()), 0..400),
        ) {
            let mut t = tage(TAGEConfig { aging_interval: 64, ..Default::default() });
            for (slot, taken) in branches {
                let pc = 0x8000 + slot * 0x24;
                t.predict(pc);
                t.update(pc, Outcome::from(taken));
            }
            let base_ok = t.base.data.iter().all(|c| c.value() <= 3);
            prop_assert!(base_ok);
            for c in t.comp.iter() {
                let entries_ok = c.data.iter().all(|e| {
                    e.ctr.value() <= 7 && e.useful.value() <= 3
                        && (e.tag as usize) < (1 << 9)
                });
                prop_assert!(entries_ok);
            }
        }
    }
}
