pub mod reconciler;
pub mod scheduler;

pub use reconciler::{ReconcileOutcome, StateReconciler};
pub use scheduler::FeedScheduler;
