//! Dataflow analyses over routine CFGs.

mod copy_analysis;
pub use copy_analysis::{
    CopyAnalysis, CopyAnalysisState, CopyId, CopyMask, find_unnecessary_copies,
};
