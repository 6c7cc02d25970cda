//! Copy-elimination dataflow analysis.
//!
//! Lowering wraps the right-hand side of value-semantics assignments in
//! [`ExprKind::Copy`] nodes. Many of those copies are unnecessary: when
//! neither endpoint of the assignment is subsequently mutated in an
//! aliasing-visible way, the copy can be deleted and the two variables may
//! alias the same object. This module proves copies removable with a monotone
//! forward dataflow over per-variable bitmasks of pending copies;
//! [`crate::transform::CopyEliminator`] performs the deletion.
//!
//! The analysis is deliberately one-sided: whenever a shape is not
//! recognized, nothing is reported removable for it. Deleting a copy the
//! analysis got wrong would make the compiler unsound, keeping one is merely
//! a missed optimization.

use crate::engine::{self, FlowError, ForwardAnalysis};
use nacre_cfg::{BlockId, ExprId, ExprKind, Routine, Stmt, Terminator, VarId, VarName, VarRef};
use nacre_data_structures::{
    fx::{FxHashMap, FxHashSet},
    index::Idx,
    newtype_index,
};
use smallvec::SmallVec;
use tracing::{debug, instrument};

newtype_index! {
    /// A dense identifier for a copy node, assigned on first encounter
    /// within one analysis run.
    pub struct CopyId;
}

/// A growable bitset over [`CopyId`]s.
///
/// Most routines intern only a handful of copies, so the word vector stays
/// inline in the common case. Trailing zero words are never stored, which
/// keeps equality structural.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyMask {
    bits: SmallVec<[u64; 1]>,
}

static EMPTY_MASK: CopyMask = CopyMask { bits: SmallVec::new_const() };

impl CopyMask {
    /// Creates an empty mask.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mask containing only `id`.
    #[must_use]
    pub fn singleton(id: CopyId) -> Self {
        let mut mask = Self::default();
        mask.insert(id);
        mask
    }

    /// Returns true if no ids are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns true if the mask contains `id`.
    #[must_use]
    pub fn contains(&self, id: CopyId) -> bool {
        let idx = id.index();
        let word = idx / 64;
        word < self.bits.len() && (self.bits[word] & (1u64 << (idx % 64))) != 0
    }

    /// Adds `id` to the mask. Returns true if it was not already present.
    pub fn insert(&mut self, id: CopyId) -> bool {
        let idx = id.index();
        let word = idx / 64;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        let bit = 1u64 << (idx % 64);
        let was_absent = (self.bits[word] & bit) == 0;
        self.bits[word] |= bit;
        was_absent
    }

    /// Adds the ids `0..n` to the mask.
    pub fn insert_first_n(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let words = n.div_ceil(64);
        if self.bits.len() < words {
            self.bits.resize(words, 0);
        }
        for word in &mut self.bits[..words - 1] {
            *word = u64::MAX;
        }
        let rem = n % 64;
        self.bits[words - 1] |= if rem == 0 { u64::MAX } else { (1u64 << rem) - 1 };
    }

    /// ORs `other` into the mask. Returns true if the mask changed.
    pub fn or_with(&mut self, other: &Self) -> bool {
        if self.bits.len() < other.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        let mut changed = false;
        for (word, &other_word) in self.bits.iter_mut().zip(&other.bits) {
            let old = *word;
            *word |= other_word;
            changed |= *word != old;
        }
        changed
    }

    /// Returns true if every id in the mask is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.bits
            .iter()
            .enumerate()
            .all(|(i, &word)| word & !other.bits.get(i).copied().unwrap_or(0) == 0)
    }

    /// Returns the number of ids in the mask.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// The dataflow state: a mask of pending copies per variable.
///
/// `state[v]` names the copies that, along some path to this program point,
/// established an aliasing pair with `v` as an endpoint and that are still
/// live. The `Default` value is the engine's distinguished uninitialized
/// state; it is the identity of [`merge`](Self::merge) and equal only to
/// itself.
#[derive(Clone, Debug, Default)]
pub struct CopyAnalysisState {
    masks: Option<Vec<CopyMask>>,
}

impl CopyAnalysisState {
    /// The state at routine entry: every variable has an empty mask.
    #[must_use]
    pub fn initial(var_count: usize) -> Self {
        Self { masks: Some(vec![CopyMask::default(); var_count]) }
    }

    /// Whether this is the distinguished uninitialized state.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.masks.is_none()
    }

    /// The mask pending against `var`. Empty in the uninitialized state.
    #[must_use]
    pub fn mask(&self, var: VarId) -> &CopyMask {
        self.masks.as_ref().map_or(&EMPTY_MASK, |masks| &masks[var.index()])
    }

    /// ORs the masks of all variables into a single mask.
    #[must_use]
    pub fn union_all(&self) -> CopyMask {
        let mut union = CopyMask::default();
        if let Some(masks) = &self.masks {
            for mask in masks {
                union.or_with(mask);
            }
        }
        union
    }

    /// State equality. The uninitialized state equals only itself; both
    /// operands are assumed to belong to the same routine.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        match (&self.masks, &other.masks) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Joins two states by pointwise OR. The uninitialized state is the
    /// identity.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        match (&self.masks, &other.masks) {
            (None, _) => other.clone(),
            (_, None) => self.clone(),
            (Some(a), Some(b)) => {
                debug_assert_eq!(a.len(), b.len());
                let mut masks = a.clone();
                for (mask, other_mask) in masks.iter_mut().zip(b) {
                    mask.or_with(other_mask);
                }
                Self { masks: Some(masks) }
            }
        }
    }

    /// Returns a state with `state[var] = mask`. Returns the receiver
    /// unchanged when the update is a no-op; callers must compare states
    /// with [`equals`](Self::equals), never by identity.
    #[must_use]
    pub fn with_value(mut self, var: VarId, mask: CopyMask) -> Self {
        if self.mask(var) == &mask {
            return self;
        }
        if let Some(masks) = &mut self.masks {
            masks[var.index()] = mask;
        }
        self
    }

    /// Records that copy `id` establishes aliasing between the assignment
    /// `target` and `source`: the target's previous aliases are dropped (it
    /// has been reassigned), while the source keeps its own and gains the
    /// new one. Returns the receiver unchanged when already in this form.
    #[must_use]
    pub fn with_copy_assignment(mut self, target: VarId, source: VarId, id: CopyId) -> Self {
        let target_mask = self.mask(target);
        if target_mask.count() == 1 && target_mask.contains(id) && self.mask(source).contains(id) {
            return self;
        }
        if let Some(masks) = &mut self.masks {
            masks[target.index()] = CopyMask::singleton(id);
            masks[source.index()].insert(id);
        }
        self
    }
}

/// Interns copy nodes into dense ids backing the mask representation.
/// Local to one analysis run on one routine.
#[derive(Debug, Default)]
struct CopyIndex {
    ids: FxHashMap<ExprId, CopyId>,
}

impl CopyIndex {
    /// Returns the id for `node`, assigning the next free one on first
    /// encounter.
    fn ensure(&mut self, node: ExprId) -> CopyId {
        let next = CopyId::from_usize(self.ids.len());
        *self.ids.entry(node).or_insert(next)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn iter(&self) -> impl Iterator<Item = (ExprId, CopyId)> + '_ {
        self.ids.iter().map(|(&node, &id)| (node, id))
    }
}

/// The copy-elimination analysis over one routine.
///
/// Holds the state that outlives individual block visits: the copy registry,
/// the `needed` mask of copies that became unremovable (it only grows over
/// the whole fixpoint run and is never reset per block), and the return-copy
/// candidates filtered at the exit block.
pub struct CopyAnalysis<'a> {
    routine: &'a Routine,
    copies: CopyIndex,
    needed: CopyMask,
    /// Copies wrapping returned variables, keyed by copy node. Candidates
    /// are never interned into the registry: one rejected by the exit filter
    /// stays retained even though its id was never marked needed.
    return_candidates: FxHashMap<ExprId, VarId>,
    /// The walker's current state while a block is being processed.
    state: CopyAnalysisState,
}

impl std::fmt::Debug for CopyAnalysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyAnalysis")
            .field("routine", &self.routine.name)
            .field("copies", &self.copies.len())
            .field("needed", &self.needed)
            .finish_non_exhaustive()
    }
}

impl<'a> CopyAnalysis<'a> {
    /// Creates the analysis for `routine`.
    #[must_use]
    pub fn new(routine: &'a Routine) -> Self {
        Self {
            routine,
            copies: CopyIndex::default(),
            needed: CopyMask::default(),
            return_candidates: FxHashMap::default(),
            state: CopyAnalysisState::default(),
        }
    }

    /// Runs the analysis to fixpoint and returns the set of copy nodes that
    /// are safe to remove. The empty set means none.
    pub fn run(mut self) -> Result<FxHashSet<ExprId>, FlowError> {
        engine::run_to_fixpoint(self.routine, &mut self)?;
        Ok(self.into_removable())
    }

    fn into_removable(self) -> FxHashSet<ExprId> {
        let Self { copies, needed, return_candidates, .. } = self;
        let mut removable: FxHashSet<ExprId> = return_candidates.into_keys().collect();
        for (node, id) in copies.iter() {
            if !needed.contains(id) {
                removable.insert(node);
            }
        }
        removable
    }

    /// Resolves `expr` as a direct, non-auto-global variable reference.
    fn as_direct_var(&self, expr: ExprId) -> Option<VarId> {
        let ExprKind::Var(var) = self.routine.expr_kind(expr) else { return None };
        let name = var.name.as_direct()?;
        if self.routine.flow.is_auto_global(name) {
            return None;
        }
        self.routine.flow.resolve(name)
    }

    /// As [`as_direct_var`](Self::as_direct_var), additionally rejecting
    /// reference-bound variables.
    fn as_qualifying_var(&self, expr: ExprId) -> Option<VarId> {
        let var = self.as_direct_var(expr)?;
        (!self.routine.flow.is_reference(var)).then_some(var)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match *stmt {
            Stmt::Expr(expr) => self.visit_expr(expr),
            Stmt::Return(Some(value)) => self.visit_return(value),
            Stmt::Return(None) => {}
        }
    }

    /// A returned `copy(var)` of a direct, non-auto-global variable becomes
    /// a removal candidate, decided by the exit filter. The operand is then
    /// visited normally; the inner reference is a plain read and marks
    /// nothing needed.
    fn visit_return(&mut self, value: ExprId) {
        if let ExprKind::Copy(inner) = *self.routine.expr_kind(value)
            && let Some(var) = self.as_direct_var(inner)
        {
            self.return_candidates.insert(value, var);
        }
        self.visit_expr(value);
    }

    fn visit_expr(&mut self, expr: ExprId) {
        let routine = self.routine;
        match routine.expr_kind(expr) {
            ExprKind::Lit(_) => {}
            ExprKind::Var(var) => self.visit_var(var),
            ExprKind::Copy(inner) => self.visit_expr(*inner),
            ExprKind::Assign { .. } => {
                self.visit_assign(expr);
            }
            ExprKind::CompoundAssign { target, value, .. }
            | ExprKind::RefAssign { target, value } => {
                self.visit_expr(*target);
                self.visit_expr(*value);
            }
            ExprKind::Binary(lhs, _, rhs) => {
                self.visit_expr(*lhs);
                self.visit_expr(*rhs);
            }
            ExprKind::Unary(_, operand) => self.visit_expr(*operand),
            ExprKind::Index { base, index } => {
                self.visit_expr(*base);
                self.visit_expr(*index);
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.visit_expr(arg.value);
                }
            }
        }
    }

    /// The kill step. Once an access might change a variable, every copy
    /// pending against it becomes observable and must be kept.
    fn visit_var(&mut self, var: &VarRef) {
        if let VarName::Dynamic(inner) = var.name {
            self.visit_expr(inner);
        }
        if !var.access.might_change() {
            return;
        }
        match &var.name {
            // A write through a computed name can touch any variable.
            VarName::Dynamic(_) => self.kill_all_pending(),
            VarName::Direct(name) => {
                let flow = &self.routine.flow;
                if flow.is_auto_global(name) {
                    return;
                }
                match flow.resolve(name) {
                    Some(var) if flow.is_reference(var) => {
                        // The variable may be aliased elsewhere; keep every
                        // copy interned so far.
                        // TODO: mark only the copies whose endpoints can
                        // alias `var` once points-to information exists.
                        self.needed.insert_first_n(self.copies.len());
                    }
                    Some(var) => {
                        self.needed.or_with(self.state.mask(var));
                    }
                    // Unknown name: assume any variable may change.
                    None => self.kill_all_pending(),
                }
            }
        }
    }

    fn kill_all_pending(&mut self) {
        self.needed.or_with(&self.state.union_all());
    }

    /// Transfers an assignment. Returns the target handle when the target is
    /// a qualifying direct variable, allowing nested assignments to chain.
    fn visit_assign(&mut self, expr: ExprId) -> Option<VarId> {
        let routine = self.routine;
        let ExprKind::Assign { target, value } = *routine.expr_kind(expr) else { return None };

        let Some(t) = self.as_qualifying_var(target) else {
            // Dynamic, auto-global, element and reference-bound targets get
            // the default recursion; visiting the target applies the kill
            // step.
            self.visit_expr(target);
            self.visit_expr(value);
            return None;
        };

        // Peel the copy wrapper, unless an earlier pass already removed it.
        let (inner, copy_node) = match *routine.expr_kind(value) {
            ExprKind::Copy(inner) => (inner, Some(value)),
            _ => (value, None),
        };

        if let Some(v) = self.as_qualifying_var(inner) {
            // Neither side is recursed into: the target write is a rebind,
            // not a mutation of the old value, and the source is a plain
            // read.
            self.record_alias(t, v, copy_node);
            return Some(t);
        }

        if let ExprKind::Assign { .. } = routine.expr_kind(inner) {
            if let Some(v) = self.visit_assign(inner) {
                self.record_alias(t, v, copy_node);
                return Some(t);
            }
            // The nested assignment did not qualify and has already been
            // visited; the target no longer aliases anything.
            self.set_state_value(t, CopyMask::default());
            return Some(t);
        }

        // Unrecognized source: reads inside may mark copies needed, then the
        // target starts fresh. The target reference itself is not visited.
        self.visit_expr(value);
        self.set_state_value(t, CopyMask::default());
        Some(t)
    }

    fn record_alias(&mut self, target: VarId, source: VarId, copy_node: Option<ExprId>) {
        let state = std::mem::take(&mut self.state);
        self.state = match copy_node {
            Some(node) => {
                let id = self.copies.ensure(node);
                state.with_copy_assignment(target, source, id)
            }
            // The copy was already elided: target and source are true
            // aliases and share one pending set.
            None => {
                let mask = state.mask(source).clone();
                state.with_value(target, mask)
            }
        };
    }

    fn set_state_value(&mut self, var: VarId, mask: CopyMask) {
        let state = std::mem::take(&mut self.state);
        self.state = state.with_value(var, mask);
    }

    /// Exit filter: a return copy of `var` survives only if every copy
    /// pending against `var` is already needed. Anything else would let the
    /// caller observe aliasing introduced by an elided copy.
    fn filter_return_candidates(&mut self) {
        let state = &self.state;
        let needed = &self.needed;
        self.return_candidates.retain(|_, var| state.mask(*var).is_subset_of(needed));
    }
}

impl ForwardAnalysis for CopyAnalysis<'_> {
    type State = CopyAnalysisState;

    fn initial_state(&mut self) -> CopyAnalysisState {
        CopyAnalysisState::initial(self.routine.flow.var_count())
    }

    fn states_equal(&self, a: &CopyAnalysisState, b: &CopyAnalysisState) -> bool {
        a.equals(b)
    }

    fn merge_states(&self, a: &CopyAnalysisState, b: &CopyAnalysisState) -> CopyAnalysisState {
        a.merge(b)
    }

    fn process_block(&mut self, block: BlockId, input: &CopyAnalysisState) -> CopyAnalysisState {
        let routine = self.routine;
        self.state = if input.is_default() {
            CopyAnalysisState::initial(routine.flow.var_count())
        } else {
            input.clone()
        };
        for stmt in &routine.block(block).stmts {
            self.visit_stmt(stmt);
        }
        if let Some(Terminator::Branch { condition, .. }) = &routine.block(block).terminator {
            self.visit_expr(*condition);
        }
        if block == routine.exit {
            self.filter_return_candidates();
        }
        std::mem::take(&mut self.state)
    }
}

/// Computes the set of copy nodes in `routine` that can be deleted without
/// changing observable behavior.
///
/// The returned set may be empty, which is equivalent to "none" for the
/// caller. Errors only on structurally malformed CFGs.
#[instrument(level = "debug", skip_all, fields(routine = %routine.name))]
pub fn find_unnecessary_copies(routine: &Routine) -> Result<FxHashSet<ExprId>, FlowError> {
    let removable = CopyAnalysis::new(routine).run()?;
    debug!(count = removable.len(), "copy analysis finished");
    Ok(removable)
}
