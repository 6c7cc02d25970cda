//! Copy elision pass.
//!
//! Runs the copy analysis and deletes the copy nodes it proves unnecessary by
//! splicing each wrapper's operand into its place in the expression arena.

use crate::analysis::find_unnecessary_copies;
use crate::engine::FlowError;
use nacre_cfg::{ExprKind, Routine};
use tracing::debug;

/// Deletes value copies proven unnecessary by the copy analysis.
///
/// A single round is conservative around still-pending aliases; removing a
/// copy can unlock further removals, so [`run_to_fixpoint`] repeats rounds
/// until one removes nothing.
///
/// [`run_to_fixpoint`]: Self::run_to_fixpoint
#[derive(Debug, Default)]
pub struct CopyEliminator {
    /// Number of copy nodes removed in the last round.
    pub removed_count: usize,
}

/// Statistics for a copy elision run.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyElisionStats {
    /// Copies removed across all rounds.
    pub removed: usize,
    /// Rounds performed, including the final one that removed nothing.
    pub rounds: usize,
}

impl CopyEliminator {
    /// Creates a new copy eliminator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one analyze-and-rewrite round. Returns the number of copy nodes
    /// removed.
    pub fn run(&mut self, routine: &mut Routine) -> Result<usize, FlowError> {
        let removable = find_unnecessary_copies(routine)?;
        self.removed_count = 0;
        for node in removable {
            let ExprKind::Copy(inner) = *routine.expr_kind(node) else {
                continue;
            };
            // Splicing the operand into the wrapper's slot keeps every
            // parent reference to `node` valid.
            let inner_kind = routine.expr_kind(inner).clone();
            routine.exprs[node].kind = inner_kind;
            self.removed_count += 1;
        }
        debug!(removed = self.removed_count, routine = %routine.name, "copy elision round");
        Ok(self.removed_count)
    }

    /// Repeats [`run`](Self::run) until a round removes nothing.
    pub fn run_to_fixpoint(&mut self, routine: &mut Routine) -> Result<CopyElisionStats, FlowError> {
        let mut stats = CopyElisionStats::default();
        loop {
            let removed = self.run(routine)?;
            stats.rounds += 1;
            stats.removed += removed;
            if removed == 0 {
                return Ok(stats);
            }
        }
    }
}
