//! Route resolution (§4.9), grounded on `mofa-gateway::router::trie::TrieRouter`:
//! despite the name, that router is a priority-sorted `Vec<RouteConfig>`
//! scanned linearly rather than an actual trie, and this one keeps that
//! shape. Two differences from the teacher: path templates use `:param`
//! segments instead of `{param}`, and resolution order is literal-first
//! then declaration order (§4.9) rather than an explicit `priority` field.

use crate::error::GatewayError;
use crate::types::{PathParams, RouteConfig};

#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route_id: String,
    pub path_params: PathParams,
}

/// Holds one service's routes in registration order. Resolution scans
/// literal (no `:param` segment) routes first, then parameterized routes,
/// each group in declaration order — the first match wins.
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteConfig>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route: RouteConfig) -> Result<(), GatewayError> {
        if route.id.trim().is_empty() {
            return Err(GatewayError::EmptyRouteId);
        }
        if self.routes.iter().any(|r| r.id == route.id) {
            return Err(GatewayError::DuplicateRoute(route.id));
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn deregister(&mut self, route_id: &str) -> Result<(), GatewayError> {
        let before = self.routes.len();
        self.routes.retain(|r| r.id != route_id);
        if self.routes.len() == before {
            return Err(GatewayError::RouteNotFound(route_id.to_string()));
        }
        Ok(())
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    pub fn route(&self, route_id: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    /// Resolve `(path, method)` to a route. `None` on no match at all;
    /// a route whose pattern matches but whose `method` excludes the
    /// request is skipped rather than returned as a method mismatch —
    /// callers that need to distinguish 404 from 403 should call
    /// [`Router::method_mismatch`] first.
    pub fn resolve(&self, path: &str, method: &str) -> Option<RouteMatch> {
        let literal = self.routes.iter().filter(|r| r.is_literal());
        let parameterized = self.routes.iter().filter(|r| !r.is_literal());

        for route in literal.chain(parameterized) {
            if !route_accepts_method(route, method) {
                continue;
            }
            if let Some(path_params) = match_path(&route.path_pattern, path) {
                return Some(RouteMatch { route_id: route.id.clone(), path_params });
            }
        }
        None
    }

    /// True if some route's pattern matches `path` but none accepts
    /// `method` — used to return 403 instead of 404 (§4.9 step 2).
    pub fn method_mismatch(&self, path: &str, method: &str) -> bool {
        let mut pattern_matched = false;
        for route in self.routes.iter() {
            if match_path(&route.path_pattern, path).is_some() {
                pattern_matched = true;
                if route_accepts_method(route, method) {
                    return false;
                }
            }
        }
        pattern_matched
    }
}

fn route_accepts_method(route: &RouteConfig, method: &str) -> bool {
    match &route.method {
        Some(m) => m.eq_ignore_ascii_case(method),
        None => true,
    }
}

/// Match `path` against `pattern`'s `:param` template, requiring equal
/// segment counts; a `:name` segment captures unconditionally, any other
/// segment must match verbatim.
fn match_path(pattern: &str, path: &str) -> Option<PathParams> {
    let pattern_segments: Vec<&str> = pattern.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = PathParams::new();
    for (pat, seg) in pattern_segments.iter().zip(path_segments.iter()) {
        if let Some(name) = pat.strip_prefix(':') {
            params.insert(name.to_string(), seg.to_string());
        } else if pat != seg {
            return None;
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, pattern: &str) -> RouteConfig {
        RouteConfig::new(id, pattern, "handle")
    }

    #[test]
    fn literal_route_wins_over_parameterized_with_same_shape() {
        let mut router = Router::new();
        router.register(route("param", "/orders/:id")).unwrap();
        router.register(route("literal", "/orders/pending")).unwrap();

        let found = router.resolve("/orders/pending", "GET").unwrap();
        assert_eq!(found.route_id, "literal");
    }

    #[test]
    fn parameterized_route_captures_segment() {
        let mut router = Router::new();
        router.register(route("param", "/orders/:id")).unwrap();

        let found = router.resolve("/orders/42", "GET").unwrap();
        assert_eq!(found.route_id, "param");
        assert_eq!(found.path_params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn ambiguity_among_same_kind_routes_resolves_by_declaration_order() {
        let mut router = Router::new();
        router.register(route("first", "/orders/:id")).unwrap();
        router.register(route("second", "/orders/:order_id")).unwrap();

        let found = router.resolve("/orders/7", "GET").unwrap();
        assert_eq!(found.route_id, "first");
    }

    #[test]
    fn no_match_is_none() {
        let router = Router::new();
        assert!(router.resolve("/missing", "GET").is_none());
    }

    #[test]
    fn method_restricted_route_is_not_matched_by_other_methods() {
        let mut router = Router::new();
        router.register(route("post-only", "/orders").with_method("POST")).unwrap();

        assert!(router.resolve("/orders", "GET").is_none());
        assert!(router.method_mismatch("/orders", "GET"));
        assert!(router.resolve("/orders", "POST").is_some());
    }

    #[test]
    fn duplicate_route_id_is_rejected() {
        let mut router = Router::new();
        router.register(route("a", "/a")).unwrap();
        let err = router.register(route("a", "/b")).unwrap_err();
        assert_eq!(err, GatewayError::DuplicateRoute("a".to_string()));
    }

    #[test]
    fn deregister_unknown_id_errors() {
        let mut router = Router::new();
        let err = router.deregister("ghost").unwrap_err();
        assert_eq!(err, GatewayError::RouteNotFound("ghost".to_string()));
    }
}
