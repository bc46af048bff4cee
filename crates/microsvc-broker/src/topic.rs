//! Topic wildcard matching (§4.6): `*` matches exactly one dot-separated
//! segment; `>` (where supported) matches one or more trailing segments.

/// Does `topic` match `pattern`? Segments are split on `.`.
///
/// - `*` matches exactly one segment (`user.*` matches `user.signup`, not
///   `user.a.b` and not `user`).
/// - `>` as the final pattern segment matches every remaining segment,
///   including none... actually at least one, since NATS-style semantics
///   require `>` to stand for one or more trailing tokens.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let topic_segments: Vec<&str> = topic.split('.').collect();

    for (index, pseg) in pattern_segments.iter().enumerate() {
        if *pseg == ">" {
            // `>` must be the final pattern segment and match at least one
            // remaining topic segment.
            return index == pattern_segments.len() - 1 && index < topic_segments.len();
        }
        let Some(tseg) = topic_segments.get(index) else { return false };
        if *pseg != "*" && pseg != tseg {
            return false;
        }
    }

    pattern_segments.len() == topic_segments.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_wildcard_matches_one_segment() {
        assert!(topic_matches("user.*", "user.signup"));
        assert!(topic_matches("user.*", "user.login"));
        assert!(!topic_matches("user.*", "system.alert"));
        assert!(!topic_matches("user.*", "user.a.b"));
    }

    #[test]
    fn leading_wildcard_matches_any_first_segment() {
        assert!(topic_matches("*.login", "user.login"));
        assert!(topic_matches("*.login", "admin.login"));
        assert!(!topic_matches("*.login", "user.signup"));
    }

    #[test]
    fn exact_topic_matches_itself() {
        assert!(topic_matches("system.alert", "system.alert"));
        assert!(!topic_matches("system.alert", "system.alerts"));
    }

    #[test]
    fn multi_segment_wildcard_matches_one_or_more_trailing_segments() {
        assert!(topic_matches("jobs.>", "jobs.created"));
        assert!(topic_matches("jobs.>", "jobs.created.high_priority"));
        assert!(!topic_matches("jobs.>", "jobs"));
        assert!(!topic_matches("jobs.>", "other.created"));
    }
}
