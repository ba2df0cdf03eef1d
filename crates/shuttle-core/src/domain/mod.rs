//! Domain model (IDs, tasks, queue view, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod state;
pub mod task;

pub use self::errors::{ShuttleError, SubscriptionError};
pub use self::events::QueueEvent;
pub use self::ids::TaskId;
pub use self::state::{QueueState, SchedulerState};
pub use self::task::{CompletedTask, MAX_PROGRESS, Priority, Task, validate_task_name};
