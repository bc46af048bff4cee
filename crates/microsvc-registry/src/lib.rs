//! `microsvc-registry`: the service registry, its watchers, and
//! client-side node selection (§4.4, §4.5).

pub mod consul;
pub mod memory;
pub mod selector;
pub mod types;
pub mod watcher;

pub use consul::ConsulRegistry;
pub use memory::{MemoryRegistry, Registry, RegistryStats};
pub use selector::{RandomSelector, RoundRobinSelector, Selector, SelectorError};
pub use types::{Event, EventKind, Node, RegistryError, Service, ANY_VERSION};
pub use watcher::{Stopped, WatchItem, Watcher};
