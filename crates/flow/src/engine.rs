//! Generic forward dataflow fixpoint engine.
//!
//! The engine owns the worklist, reachability and block ordering; an analysis
//! supplies the four lattice operations of [`ForwardAnalysis`] and is driven
//! to fixpoint. The lattices used here have finite height and monotone
//! transfers, so termination is bounded.

use nacre_cfg::{BlockId, Routine};
use nacre_data_structures::index::{Idx, IndexVec};
use smallvec::SmallVec;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::trace;

/// Structural CFG errors surfaced while driving an analysis.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlowError {
    /// The exit block cannot be reached from the entry.
    #[error("exit block bb{0} is unreachable from the entry")]
    ExitUnreachable(BlockId),
    /// A terminator names a block that does not exist in the routine.
    #[error("terminator of bb{0} targets missing block bb{1}")]
    MissingBlock(BlockId, BlockId),
}

/// A monotone forward dataflow analysis.
///
/// `State::default()` is the distinguished "uninitialized" state: the engine
/// uses it for blocks no transfer has produced a value for yet. It must act
/// as the identity of [`merge_states`] and compare equal only to itself.
///
/// [`merge_states`]: ForwardAnalysis::merge_states
pub trait ForwardAnalysis {
    /// The lattice element flowing along CFG edges.
    type State: Clone + Default;

    /// Returns the state entering the routine's entry block.
    fn initial_state(&mut self) -> Self::State;

    /// Compares two states of the same routine.
    fn states_equal(&self, a: &Self::State, b: &Self::State) -> bool;

    /// Joins two states flowing into the same block.
    fn merge_states(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Applies the block's transfer function to `input` and returns the
    /// state at the block's exit. `input` must not be mutated.
    fn process_block(&mut self, block: BlockId, input: &Self::State) -> Self::State;
}

/// Per-block states recorded by a completed fixpoint run.
#[derive(Debug)]
pub struct Fixpoint<S> {
    /// Reverse postorder of the blocks reachable from the entry.
    pub order: Vec<BlockId>,
    /// The input state each block was last processed with.
    pub block_in: IndexVec<BlockId, S>,
    /// The output state each block last produced.
    pub block_out: IndexVec<BlockId, S>,
    /// Total number of block visits performed.
    pub visits: usize,
}

/// Drives `analysis` over `routine` until no block's input state changes.
pub fn run_to_fixpoint<A: ForwardAnalysis>(
    routine: &Routine,
    analysis: &mut A,
) -> Result<Fixpoint<A::State>, FlowError> {
    let order = reverse_postorder(routine)?;
    let num_blocks = routine.blocks.len();

    let mut block_in: IndexVec<BlockId, A::State> =
        IndexVec::from_vec((0..num_blocks).map(|_| A::State::default()).collect());
    let mut block_out: IndexVec<BlockId, A::State> =
        IndexVec::from_vec((0..num_blocks).map(|_| A::State::default()).collect());
    let mut processed: IndexVec<BlockId, bool> = IndexVec::from_vec(vec![false; num_blocks]);
    let mut queued: IndexVec<BlockId, bool> = IndexVec::from_vec(vec![false; num_blocks]);

    let mut worklist: VecDeque<BlockId> = order.iter().copied().collect();
    for &block in &order {
        queued[block] = true;
    }

    let mut visits = 0usize;
    while let Some(block) = worklist.pop_front() {
        queued[block] = false;

        let mut input = A::State::default();
        if block == routine.entry {
            let initial = analysis.initial_state();
            input = analysis.merge_states(&input, &initial);
        }
        for &pred in &routine.block(block).predecessors {
            input = analysis.merge_states(&input, &block_out[pred]);
        }

        if processed[block] && analysis.states_equal(&input, &block_in[block]) {
            continue;
        }

        trace!(block = block.index(), "processing block");
        let output = analysis.process_block(block, &input);
        visits += 1;

        let changed = !processed[block] || !analysis.states_equal(&output, &block_out[block]);
        block_in[block] = input;
        block_out[block] = output;
        processed[block] = true;

        if changed {
            for succ in routine.successors(block) {
                if !queued[succ] {
                    queued[succ] = true;
                    worklist.push_back(succ);
                }
            }
        }
    }

    Ok(Fixpoint { order, block_in, block_out, visits })
}

/// Computes the reverse postorder of blocks reachable from the entry,
/// validating terminator targets along the way.
fn reverse_postorder(routine: &Routine) -> Result<Vec<BlockId>, FlowError> {
    let num_blocks = routine.blocks.len();
    let mut visited = vec![false; num_blocks];
    let mut postorder = Vec::with_capacity(num_blocks);

    let entry = routine.entry;
    visited[entry.index()] = true;
    let mut stack: Vec<(BlockId, SmallVec<[BlockId; 2]>, usize)> =
        vec![(entry, routine.successors(entry), 0)];

    loop {
        let (block, succ) = {
            let Some((block, succs, idx)) = stack.last_mut() else { break };
            if *idx == succs.len() {
                let block = *block;
                stack.pop();
                postorder.push(block);
                continue;
            }
            let succ = succs[*idx];
            *idx += 1;
            (*block, succ)
        };
        if succ.index() >= num_blocks {
            return Err(FlowError::MissingBlock(block, succ));
        }
        if !visited[succ.index()] {
            visited[succ.index()] = true;
            stack.push((succ, routine.successors(succ), 0));
        }
    }

    if !visited[routine.exit.index()] {
        return Err(FlowError::ExitUnreachable(routine.exit));
    }

    postorder.reverse();
    Ok(postorder)
}
