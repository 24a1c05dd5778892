//! Property tests for route matching.
//!
//! Invariants tested:
//! - A parameter captures any single non-empty segment
//! - Extra or missing segments never match
//! - Rewriting substitutes every captured parameter

use proptest::prelude::*;
use tower_mesh_gateway::RoutePattern;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_.~-]{1,12}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: `/api/users/:id` captures whatever the last segment is
    #[test]
    fn param_captures_segment(id in segment()) {
        let pattern = RoutePattern::parse("/api/users/:id");
        let params = pattern.matches(&format!("/api/users/{id}"));
        prop_assert!(params.is_some());
        let params = params.unwrap();
        prop_assert_eq!(params.get("id"), Some(id.as_str()));
    }

    /// Property: a path with an extra segment does not match
    #[test]
    fn extra_segment_does_not_match(id in segment(), extra in segment()) {
        let pattern = RoutePattern::parse("/api/users/:id");
        let path = format!("/api/users/{id}/{extra}");
        prop_assert!(pattern.matches(&path).is_none());
        prop_assert!(pattern.matches("/api/users").is_none());
    }

    /// Property: literal patterns match only themselves
    #[test]
    fn literal_matches_only_itself(a in segment(), b in segment()) {
        let pattern = RoutePattern::parse(&format!("/{a}"));
        let path = format!("/{a}");
        prop_assert!(pattern.matches(&path).is_some());
        prop_assert_eq!(pattern.matches(&format!("/{b}")).is_some(), a == b);
    }

    /// Property: every captured parameter appears in the rewritten path
    #[test]
    fn rewrite_substitutes_params(user in segment(), order in segment()) {
        let inbound = RoutePattern::parse("/api/users/:user/orders/:order");
        let rewrite = RoutePattern::parse("/v2/orders/:order/owner/:user");

        let params = inbound
            .matches(&format!("/api/users/{user}/orders/{order}"))
            .unwrap();
        prop_assert_eq!(
            rewrite.render(&params),
            format!("/v2/orders/{order}/owner/{user}")
        );
    }
}
