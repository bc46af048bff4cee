//! Client-side node selection (§4.5): given a non-empty node list, return
//! one. Random and round-robin strategies.

use super::types::Node;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectorError {
    #[error("cannot select from an empty node list")]
    EmptyNodeList,
}

/// Chooses one [`Node`] from a candidate list on every call.
pub trait Selector: Send + Sync {
    fn select(&self, nodes: &[Node]) -> Result<Node, SelectorError>;

    /// Clear any internal state (e.g. the round-robin cursor).
    fn reset(&self);
}

/// Uniform random selection.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl Selector for RandomSelector {
    fn select(&self, nodes: &[Node]) -> Result<Node, SelectorError> {
        if nodes.is_empty() {
            return Err(SelectorError::EmptyNodeList);
        }
        let index = rand::thread_rng().gen_range(0..nodes.len());
        Ok(nodes[index].clone())
    }

    fn reset(&self) {}
}

/// Round-robin selection via a monotonic atomic counter, safe under
/// concurrent calls (§4.5, §8 scenario 2). Indices wrap naturally when the
/// node list size changes between calls — no explicit renumbering.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    cursor: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self { cursor: AtomicUsize::new(0) }
    }
}

impl Selector for RoundRobinSelector {
    fn select(&self, nodes: &[Node]) -> Result<Node, SelectorError> {
        if nodes.is_empty() {
            return Err(SelectorError::EmptyNodeList);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % nodes.len();
        Ok(nodes[index].clone())
    }

    fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }
}
