//! Implementations of different branch predictors.

pub mod table;
pub mod counter;
pub mod tage;

pub use table::*;
pub use counter::*;
pub use tage::*;

use crate::{ ArchState, BranchRecord, Outcome };

/// Interface between a host simulator and a conditional branch predictor.
///
/// The host calls [`ConditionalPredictor::predict_branch`] before a branch
/// resolves and [`ConditionalPredictor::update_branch`] once the outcome is
/// known. Calls are made in program order, and each branch is predicted and
/// updated exactly once before the next branch is predicted.
pub trait ConditionalPredictor {
    fn name(&self) -> &'static str;

    /// Return the predicted outcome for a branch.
    fn predict_branch(&mut self, record: &BranchRecord) -> Outcome;

    /// Update the internal state of the predictor with the correct outcome.
    fn update_branch(&mut self,
        record: &BranchRecord,
        state: &ArchState,
        outcome: Outcome
    );
}
