//! Audio unlock core.
//!
//! Leaves first: the pure precondition checker (`preconditions`), the
//! strategy-chain executor (`executor`), and the single-flight state machine
//! that owns both (`coordinator`).

pub mod coordinator;
pub mod executor;
pub mod preconditions;
pub mod state;

pub use coordinator::{CoordinatorSnapshot, GestureOverride, UnlockCoordinator, UnlockFuture};
pub use executor::{AttemptOutcome, UnlockExecutor, UnlockStrategy};
pub use preconditions::{check_preconditions, PreconditionInput, PreconditionPolicy};
pub use state::{AttemptRecord, AttemptResult, CoordinatorState};
