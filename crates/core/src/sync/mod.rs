//! Sync engine: reconciliation, retry queue and orchestration.

mod keys;
mod model;
mod orchestrator;
mod queue;
mod reconciler;
mod remote;
mod session;

pub use keys::*;
pub use model::*;
pub use orchestrator::*;
pub use queue::*;
pub use reconciler::*;
pub use remote::*;
pub use session::*;
