//! Queue module: priority ordering (aging) and the in-memory task store.

mod aging;
mod store;

pub use aging::AgingPolicy;
pub use store::TaskStore;
