//! `microsvc-service`: binds a handler table to a transport and runs the
//! request lifecycle (§4.7).

pub mod handler;
pub mod options;
pub mod service;

pub use handler::{FnHandler, MethodHandler};
pub use options::{ServiceOptions, TopicSubscription};
pub use service::Service;
