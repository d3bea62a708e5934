use crate::Outcome;
use crate::history::*;
use crate::predictor::*;

/// A base component in the TAGE predictor.
///
/// This is a plain table of counters indexed by the low bits of the
/// program counter.
#[derive(Clone, Debug)]
pub struct TAGEBaseComponent {
    pub cfg: TAGEBaseConfig,

    /// A table of saturating counters
    pub data: Vec<SaturatingCounter>,
}
impl TAGEBaseComponent {
    /// Return the predicted outcome for some program counter value.
    pub fn predict(&self, pc: usize) -> Outcome {
        self.get_entry(self.get_index(pc)).predict()
    }

    /// Train the counter associated with some program counter value.
    pub fn update(&mut self, pc: usize, outcome: Outcome) {
        let idx = self.get_index(pc);
        self.get_entry_mut(idx).update(outcome);
    }
}

impl PredictorTable for TAGEBaseComponent {
    type Entry = SaturatingCounter;

    fn size(&self) -> usize { self.cfg.size() }

    fn get_index(&self, pc: usize) -> usize {
        pc & self.index_mask()
    }

    fn get_entry(&self, idx: usize) -> &SaturatingCounter {
        let index = idx & self.index_mask();
        &self.data[index]
    }
    fn get_entry_mut(&mut self, idx: usize) -> &mut SaturatingCounter {
        let index = idx & self.index_mask();
        &mut self.data[index]
    }
}


/// An entry in some [TAGEComponent].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TAGEEntry {
    /// State machine tracking a branch outcome
    pub ctr: SaturatingCounter,

    /// The 'useful' counter, used to determine when the entry is
    /// eligible to be replaced
    pub useful: SaturatingCounter,

    /// Tag associated with this entry
    pub tag: u16,
}
impl TAGEEntry {
    pub fn new(ctr: SaturatingCounter, useful: SaturatingCounter) -> Self {
        Self { ctr, useful, tag: 0 }
    }

    /// Get the current predicted outcome.
    pub fn predict(&self) -> Outcome {
        self.ctr.predict()
    }

    /// Returns true if the provided tag matches this entry.
    pub fn tag_matches(&self, tag: u16) -> bool {
        self.tag == tag
    }

    /// Returns true if this entry can be replaced.
    pub fn is_replaceable(&self) -> bool {
        self.useful.value() == 0
    }

    /// Take this entry for a new branch context, starting from the weakest
    /// counter state in the direction of 'outcome'.
    pub fn allocate(&mut self, tag: u16, outcome: Outcome) {
        self.tag = tag;
        self.ctr.set_weak(outcome);
        self.useful.set(0);
    }
}

/// A tagged component in the TAGE predictor.
///
/// The index and tag are both hashed from the program counter and a
/// folded view of global history.
#[derive(Clone, Debug)]
pub struct TAGEComponent {
    pub cfg: TAGEComponentConfig,

    /// Table of entries
    pub data: Vec<TAGEEntry>,

    /// Folded global history used to form an index
    pub csr: FoldedHistoryRegister,

    /// Folded global history used to form a tag. The second register is one
    /// bit narrower than the first.
    pub tag_csr: [FoldedHistoryRegister; 2],
}
impl TAGEComponent {
    pub fn history_len(&self) -> usize { self.cfg.history_len }

    pub fn tag_mask(&self) -> usize {
        (1 << self.cfg.tag_bits) - 1
    }

    /// Number of entries whose 'useful' counter is nonzero.
    pub fn num_useful_entries(&self) -> usize {
        self.data.iter().filter(|e| !e.is_replaceable()).count()
    }

    /// Clear one plane of the 'useful' counter in all entries.
    pub fn clear_useful_bits(&mut self, mask: u8) {
        for entry in self.data.iter_mut() {
            entry.useful.clear_bits(mask);
        }
    }

    /// Given some reference to a [HistoryRegister] that was just shifted,
    /// update all of the folded history registers.
    pub fn update_history(&mut self, ghr: &HistoryRegister) {
        self.csr.update(ghr);
        for csr in self.tag_csr.iter_mut() {
            csr.update(ghr);
        }
    }
}

impl PredictorTable for TAGEComponent {
    type Entry = TAGEEntry;

    fn size(&self) -> usize { self.cfg.size() }

    // Each index bit is the matching folded history bit XOR'ed with the
    // matching program counter bit.
    fn get_index(&self, pc: usize) -> usize {
        let ghist_bits = self.csr.output_usize();
        (ghist_bits ^ pc) & self.index_mask()
    }

    fn get_entry(&self, idx: usize) -> &TAGEEntry {
        let index = idx & self.index_mask();
        &self.data[index]
    }
    fn get_entry_mut(&mut self, idx: usize) -> &mut TAGEEntry {
        let index = idx & self.index_mask();
        &mut self.data[index]
    }
}

impl TaggedPredictorTable for TAGEComponent {
    fn get_tag(&self, pc: usize) -> u16 {
        let ghist0_bits = self.tag_csr[0].output_usize();
        let ghist1_bits = self.tag_csr[1].output_usize() << 1;
        ((pc ^ ghist0_bits ^ ghist1_bits) & self.tag_mask()) as u16
    }
}
