//! Process-wide middleware registry used to back-fill a chain's `require`
//! set (§4.3 step 4, §9's "global module state → explicit init/reset").

use super::Middleware;
use std::collections::HashMap;
use std::sync::Arc;

/// Name → middleware map. Unlike [`crate::codec::CodecRegistry`] this has no
/// default entry: a `require`d name with nothing registered is silently
/// skipped, matching "looks it up... and appends" (no error specified).
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, middleware: Arc<dyn Middleware>) {
        self.entries.insert(middleware.name().to_string(), middleware);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
