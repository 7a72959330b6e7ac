//! Disposable read model storage (rebuildable from published events).

pub mod store;

pub use store::{InMemoryReadModelStore, ReadModelStore};
