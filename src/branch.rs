//! Types for representing branches and branch outcomes.
//!
//! These are the records a host simulator hands to a predictor: the
//! immutable description of a dynamic branch ([BranchRecord]), a view of
//! architectural state ([ArchState]), and the resolved [Outcome].

use serde::{ Deserialize, Serialize };

/// A branch outcome.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub enum Outcome {
    /// Not taken
    N = 0,
    /// Taken
    T = 1
}

impl Outcome {
    pub fn from_bool(b: bool) -> Self {
        match b {
            true => Self::T,
            false => Self::N,
        }
    }

    pub fn is_taken(&self) -> bool {
        matches!(self, Self::T)
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::T => "t",
            Self::N => "n",
        };
        write!(f, "{}", s)
    }
}

impl std::ops::Not for Outcome {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Self::N => Self::T,
            Self::T => Self::N,
        }
    }
}

impl From<bool> for Outcome {
    fn from(x: bool) -> Self {
        Self::from_bool(x)
    }
}
impl From<Outcome> for bool {
    fn from(x: Outcome) -> Self {
        x.is_taken()
    }
}

/// Representing different kinds of branch/control-flow instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub enum BranchKind {
    /// A direct conditional branch instruction.
    DirectBranch,

    /// A direct unconditional jump instruction.
    DirectJump,

    /// An indirect unconditional jump instruction.
    IndirectJump,

    /// A direct procedure call instruction.
    DirectCall,

    /// An indirect procedure call instruction.
    IndirectCall,

    /// A return instruction.
    Return,
}

/// An immutable record describing a single dynamic branch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchRecord {
    /// The program counter value for this branch
    pub pc: usize,

    /// The target address for this branch
    pub tgt: usize,

    /// The type/kind of branch
    pub kind: BranchKind,
}
impl BranchRecord {
    pub fn new(pc: usize, tgt: usize, kind: BranchKind) -> Self {
        Self { pc, tgt, kind }
    }

    /// Create a record for a direct conditional branch.
    pub fn conditional(pc: usize, tgt: usize) -> Self {
        Self::new(pc, tgt, BranchKind::DirectBranch)
    }

    /// Returns 'true' if this is a conditional instruction.
    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, BranchKind::DirectBranch)
    }

    /// Returns 'true' if this is an unconditional instruction.
    pub fn is_unconditional(&self) -> bool {
        !self.is_conditional()
    }

    /// Returns 'true' if this instruction indirectly specifies the target.
    pub fn is_indirect(&self) -> bool {
        matches!(self.kind,
            BranchKind::IndirectJump |
            BranchKind::IndirectCall |
            BranchKind::Return
        )
    }

    /// Returns 'true' if this is a "call" or "return".
    pub fn is_procedural(&self) -> bool {
        matches!(self.kind,
            BranchKind::DirectCall |
            BranchKind::IndirectCall |
            BranchKind::Return
        )
    }
}

/// Architectural state passed along by the host when a branch resolves.
///
/// Predictors in this crate don't consume any of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchState {
    /// Number of instructions retired before this branch
    pub retired: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_bool_conversions() {
        assert_eq!(Outcome::from(true), Outcome::T);
        assert_eq!(Outcome::from(false), Outcome::N);
        assert!(bool::from(Outcome::T));
        assert!(!bool::from(Outcome::N));
        assert_eq!(!Outcome::T, Outcome::N);
    }

    #[test]
    fn record_kinds() {
        let br = BranchRecord::conditional(0x1000, 0x2000);
        assert!(br.is_conditional());
        assert!(!br.is_indirect());

        let ret = BranchRecord::new(0x1000, 0x2000, BranchKind::Return);
        assert!(ret.is_unconditional());
        assert!(ret.is_indirect());
        assert!(ret.is_procedural());
    }
}
