//! Per-routine flow context.

use crate::VarId;
use nacre_data_structures::{
    fx::{FxHashMap, FxHashSet},
    index::IndexVec,
};

/// A local variable known to the flow context.
#[derive(Clone, Debug)]
pub struct Local {
    /// The variable name.
    pub name: String,
    /// Whether the variable can be aliased through reference binding.
    pub is_reference: bool,
}

/// The per-routine variable table consulted by flow analyses.
///
/// Locals are enumerated densely starting at zero; the enumeration is fixed
/// before analysis starts and the context is read-only for the duration of an
/// analysis run.
#[derive(Clone, Debug, Default)]
pub struct FlowContext {
    locals: IndexVec<VarId, Local>,
    by_name: FxHashMap<String, VarId>,
    auto_globals: FxHashSet<String>,
}

impl FlowContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of locals.
    #[must_use]
    pub fn var_count(&self) -> usize {
        self.locals.len()
    }

    /// Resolves a direct variable name to its handle.
    ///
    /// Auto-globals are not locals and do not resolve.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    /// Declares a local variable, returning its handle.
    ///
    /// Redeclaring an existing name returns the original handle.
    pub fn declare(&mut self, name: &str) -> VarId {
        if let Some(&var) = self.by_name.get(name) {
            return var;
        }
        let var = self.locals.push(Local { name: name.to_owned(), is_reference: false });
        self.by_name.insert(name.to_owned(), var);
        var
    }

    /// Registers an auto-global name, implicitly present in every scope.
    pub fn declare_auto_global(&mut self, name: impl Into<String>) {
        self.auto_globals.insert(name.into());
    }

    /// Whether the name denotes an auto-global.
    #[must_use]
    pub fn is_auto_global(&self, name: &str) -> bool {
        self.auto_globals.contains(name)
    }

    /// Whether the local can be aliased through the language's reference
    /// binding feature.
    #[must_use]
    pub fn is_reference(&self, var: VarId) -> bool {
        self.locals[var].is_reference
    }

    /// Flags the local as aliasable through reference binding.
    pub fn mark_reference(&mut self, var: VarId) {
        self.locals[var].is_reference = true;
    }

    /// Returns the name of a local.
    #[must_use]
    pub fn name(&self, var: VarId) -> &str {
        &self.locals[var].name
    }

    /// Iterates over all local handles.
    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.locals.indices()
    }
}
