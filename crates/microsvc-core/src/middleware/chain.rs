//! Middleware trait, continuation type, and the ordered chain builder
//! (§3 "Middleware entry", §4.3 "Chain semantics").

use crate::context::Context;
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::MiddlewareRegistry;

/// A future produced mid-chain, boxed so [`Next::run`] can recurse through
/// trait objects without knowing each middleware's concrete future type.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single step in the request pipeline. Implementations either mutate
/// `ctx` and call `next.run(ctx)` to continue (optionally running more code
/// on the return path), or **short-circuit** by returning without calling
/// `next` — the response already written to `ctx.response` stands.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stable name used for skip/require/anonymous matching and logging.
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &mut Context, next: Next<'_>);
}

/// The remainder of the chain, handed to each [`Middleware::handle`] call.
/// Calling [`Next::run`] invokes the next middleware (or the terminal
/// handler once the chain is exhausted).
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    terminal: &'a (dyn Fn(&mut Context) -> BoxFuture<'a, ()> + Send + Sync),
}

impl<'a> Next<'a> {
    fn new(
        remaining: &'a [Arc<dyn Middleware>],
        terminal: &'a (dyn Fn(&mut Context) -> BoxFuture<'a, ()> + Send + Sync),
    ) -> Self {
        Self { remaining, terminal }
    }

    /// Run the next step against `ctx`. Consumes `self` so a middleware
    /// cannot call `next` twice (each continuation is one-shot).
    pub fn run(self, ctx: &mut Context) -> BoxFuture<'a, ()> {
        match self.remaining.split_first() {
            Some((mw, rest)) => {
                let mw = mw.clone();
                let next = Next::new(rest, self.terminal);
                Box::pin(async move { mw.handle(ctx, next).await })
            }
            None => (self.terminal)(ctx),
        }
    }
}

/// A registered middleware plus its priority and entry-specific options
/// (§3 "Middleware entry": named middleware, priority, optional per-entry
/// options).
#[derive(Clone)]
pub struct MiddlewareEntry {
    pub name: String,
    pub priority: i32,
    pub middleware: Arc<dyn Middleware>,
    pub options: Option<serde_json::Value>,
}

impl MiddlewareEntry {
    pub fn new(priority: i32, middleware: Arc<dyn Middleware>) -> Self {
        Self {
            name: middleware.name().to_string(),
            priority,
            middleware,
            options: None,
        }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

const AUTH_TOKENS: &[&str] = &[
    "auth",
    "authentication",
    "authorize",
    "authorization",
    "jwt",
    "oauth",
    "bearer",
];

/// Ordered pipeline of [`MiddlewareEntry`] values plus the skip/require/
/// anonymous rules from §3 and the five-step build algorithm from §4.3.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<MiddlewareEntry>,
    skip: HashSet<String>,
    require: HashSet<String>,
    allow_anonymous: bool,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_middleware(mut self, entry: MiddlewareEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.skip.insert(name.into());
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.require.insert(name.into());
        self
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    fn is_auth_named(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        AUTH_TOKENS.iter().any(|token| lower.contains(token))
    }

    /// Build the ordered middleware list per §4.3's five steps: priority
    /// sort, skip filter, anonymous filter, require-set backfill from
    /// `registry`, done.
    pub fn resolve(&self, registry: &MiddlewareRegistry) -> Vec<Arc<dyn Middleware>> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut present: HashSet<String> = HashSet::new();
        let mut resolved: Vec<Arc<dyn Middleware>> = Vec::new();

        for entry in sorted {
            if self.skip.contains(&entry.name) {
                continue;
            }
            if self.allow_anonymous && Self::is_auth_named(&entry.name) {
                continue;
            }
            present.insert(entry.name.clone());
            resolved.push(entry.middleware);
        }

        for name in &self.require {
            if present.contains(name) {
                continue;
            }
            if let Some(middleware) = registry.get(name) {
                resolved.push(middleware);
            }
        }

        resolved
    }

    /// Resolve against `registry` and run the chain against `ctx`,
    /// terminating in `handler`.
    pub async fn run<F>(&self, ctx: &mut Context, registry: &MiddlewareRegistry, handler: F)
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, ()> + Send + Sync,
    {
        let resolved = self.resolve(registry);
        let next = Next::new(&resolved, &handler);
        next.run(ctx).await
    }
}
