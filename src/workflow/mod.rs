pub mod file_flow;
pub mod reconciler;

pub use file_flow::{FileFlow, FileResult};
pub use reconciler::{AbsorbOutcome, SyncReconciler, SyncState};
