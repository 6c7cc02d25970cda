//! Rewriting passes that consume analysis results.

mod copy_elision;
pub use copy_elision::{CopyEliminator, CopyElisionStats};
