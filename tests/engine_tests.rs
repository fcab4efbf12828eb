//! Resolution engine tests: tie-break laws and documented scenarios

use std::sync::Arc;

use permcore::engine::decision;
use permcore::{Candidate, PolicyAdmin, PolicyStore, ResolutionEngine, StaticRoles};
use proptest::prelude::*;
use tempfile::TempDir;

/// The documented four-tier hierarchy:
/// guest(0) <- user(10) <- premium(50) <- admin(100), with
/// user: content.delete = deny, premium: content.* = allow, admin: * = allow.
fn documented_scenario(tmp: &TempDir) -> (Arc<PolicyStore>, ResolutionEngine) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(PolicyStore::open(tmp.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));

    admin.create_group("premium", 50).unwrap();
    admin.add_parent("premium", "user").unwrap();
    // admin sits on top of premium in this scenario
    admin.remove_parent("admin", "user").unwrap();
    admin.add_parent("admin", "premium").unwrap();

    admin.grant("user", "content.delete", false, false).unwrap();
    admin.grant("premium", "content.*", true, false).unwrap();
    admin.grant("admin", "*", true, false).unwrap();

    let roles = Arc::new(
        StaticRoles::new()
            .with_role("paying-customer", "premium")
            .with_role("root", "admin"),
    );
    let engine = ResolutionEngine::new(Arc::clone(&store), roles);
    (store, engine)
}

// ============================================================================
// DOCUMENTED SCENARIO
// ============================================================================

#[test]
fn specific_deny_beats_wider_allow_despite_lower_weight() {
    let tmp = TempDir::new().unwrap();
    let (_store, engine) = documented_scenario(&tmp);

    // content.delete (specificity 20, weight 10, deny) outranks
    // content.* (specificity 15, weight 50, allow)
    assert!(!engine.check_role("premium", "content.delete").unwrap());

    // The wider allow still covers everything else under content.
    assert!(engine.check_role("premium", "content.create").unwrap());
    assert!(engine.check_role("premium", "content.edit.draft").unwrap());

    // Nothing premium holds matches outside content.*
    assert!(!engine.check_role("premium", "billing.view").unwrap());
}

#[test]
fn documented_trace_output() {
    let tmp = TempDir::new().unwrap();
    let (_store, engine) = documented_scenario(&tmp);

    let trace = engine.trace("paying-customer", "content.delete").unwrap();

    assert_eq!(trace.user_id.as_deref(), Some("paying-customer"));
    assert_eq!(trace.role, "premium");
    assert_eq!(trace.node, "content.delete");
    assert!(!trace.result);
    assert_eq!(trace.inheritance_chain, vec!["premium", "user", "guest"]);

    // Winner first, then the outranked allow
    assert_eq!(trace.matches.len(), 2);
    assert_eq!(trace.matches[0].pattern, "content.delete");
    assert_eq!(trace.matches[0].group_id, "user");
    assert_eq!(trace.matches[0].specificity, 20);
    assert_eq!(trace.matches[0].weight, 10);
    assert!(!trace.matches[0].value);
    assert_eq!(trace.matches[1].pattern, "content.*");
    assert_eq!(trace.matches[1].group_id, "premium");
    assert_eq!(trace.matches[1].specificity, 15);
    assert_eq!(trace.matches[1].weight, 50);
}

#[test]
fn universal_wildcard_loses_to_any_specific_match() {
    let tmp = TempDir::new().unwrap();
    let (_store, engine) = documented_scenario(&tmp);

    // admin inherits the user-level deny on content.delete, and its
    // universal allow scores specificity 0, so the deny still wins.
    assert!(!engine.check_role("admin", "content.delete").unwrap());
    assert!(engine.check_role("admin", "anything.else").unwrap());
    assert!(engine.check("root", "billing.view").unwrap());
}

// ============================================================================
// RESOLUTION LAWS
// ============================================================================

#[test]
fn fail_closed_for_unknown_role() {
    let tmp = TempDir::new().unwrap();
    let (_store, engine) = documented_scenario(&tmp);

    assert!(!engine
        .check_role("nonexistent-role", "content.create")
        .unwrap());
    let trace = engine
        .trace_role("nonexistent-role", "content.create")
        .unwrap();
    assert!(!trace.result);
    assert!(trace.inheritance_chain.is_empty());
    assert!(trace.matches.is_empty());
}

#[test]
fn inheritance_monotonicity() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(PolicyStore::open(tmp.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));

    // b allows reports.view at weight 80; a holds an equally specific
    // deny at weight 5
    admin.create_group("b", 80).unwrap();
    admin.create_group("a", 5).unwrap();
    admin.add_parent("a", "b").unwrap();
    admin.grant("b", "reports.view", true, false).unwrap();
    admin.grant("a", "reports.view", false, false).unwrap();

    let engine = ResolutionEngine::new(store, Arc::new(StaticRoles::new()));

    // Equal specificity, b's weight 80 beats a's 5: the allow propagates
    assert!(engine.check_role("a", "reports.view").unwrap());
}

#[test]
fn deny_wins_exact_tie_across_groups() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(PolicyStore::open(tmp.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));

    admin.create_group("left", 30).unwrap();
    admin.create_group("right", 30).unwrap();
    admin.create_group("both", 0).unwrap();
    admin.add_parent("both", "left").unwrap();
    admin.add_parent("both", "right").unwrap();
    admin.grant("left", "files.write", true, false).unwrap();
    admin.grant("right", "files.write", false, false).unwrap();

    let engine = ResolutionEngine::new(store, Arc::new(StaticRoles::new()));
    assert!(!engine.check_role("both", "files.write").unwrap());
}

#[test]
fn diamond_ancestor_contributes_once() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(PolicyStore::open(tmp.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));

    admin.create_group("base", 0).unwrap();
    admin.create_group("left", 10).unwrap();
    admin.create_group("right", 20).unwrap();
    admin.create_group("top", 0).unwrap();
    admin.add_parent("left", "base").unwrap();
    admin.add_parent("right", "base").unwrap();
    admin.add_parent("top", "left").unwrap();
    admin.add_parent("top", "right").unwrap();
    admin.grant("base", "docs.read", true, false).unwrap();

    let engine = ResolutionEngine::new(store, Arc::new(StaticRoles::new()));

    assert!(engine.check_role("top", "docs.read").unwrap());
    let trace = engine.trace_role("top", "docs.read").unwrap();
    assert_eq!(trace.inheritance_chain, vec!["top", "left", "right", "base"]);
    assert_eq!(trace.matches.len(), 1);
}

// ============================================================================
// MATERIALIZED VIEW
// ============================================================================

#[test]
fn role_permissions_keeps_highest_weight_per_pattern() {
    let tmp = TempDir::new().unwrap();
    let (_store, engine) = documented_scenario(&tmp);

    let view = engine.role_permissions("premium").unwrap();
    assert_eq!(view.get("content.delete"), Some(&false));
    assert_eq!(view.get("content.*"), Some(&true));
    assert_eq!(view.len(), 2);

    let tmp2 = TempDir::new().unwrap();
    let store = Arc::new(PolicyStore::open(tmp2.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));

    // Same pattern in two groups: weight decides
    admin.create_group("heavy", 90).unwrap();
    admin.create_group("light", 10).unwrap();
    admin.create_group("member", 0).unwrap();
    admin.add_parent("member", "heavy").unwrap();
    admin.add_parent("member", "light").unwrap();
    admin.grant("heavy", "api.call", true, false).unwrap();
    admin.grant("light", "api.call", false, false).unwrap();

    let engine = ResolutionEngine::new(store, Arc::new(StaticRoles::new()));
    let view = engine.role_permissions("member").unwrap();
    assert_eq!(view.get("api.call"), Some(&true));
}

// ============================================================================
// CACHE BEHAVIOR ACROSS WRITES
// ============================================================================

#[test]
fn same_process_write_invalidates_cached_role() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(PolicyStore::open(tmp.path().join("policy.json")));
    let admin = PolicyAdmin::new(Arc::clone(&store));
    let engine = ResolutionEngine::new(Arc::clone(&store), Arc::new(StaticRoles::new()));

    assert!(!engine.check_role("user", "content.create").unwrap());
    admin.grant("user", "content.create", true, false).unwrap();
    assert!(engine.check_role("user", "content.create").unwrap());
}

#[test]
fn other_process_write_is_picked_up_lazily() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("policy.json");

    // Two handles on the same file stand in for two OS processes
    let store_a = Arc::new(PolicyStore::open(&path));
    let store_b = Arc::new(PolicyStore::open(&path));

    let engine = ResolutionEngine::new(Arc::clone(&store_a), Arc::new(StaticRoles::new()));
    let admin = PolicyAdmin::new(store_b);

    assert!(!engine.check_role("user", "content.create").unwrap());

    // Give the file mtime room to advance on coarse-granularity systems
    std::thread::sleep(std::time::Duration::from_millis(20));
    admin.grant("user", "content.create", true, false).unwrap();

    assert!(engine.check_role("user", "content.create").unwrap());
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}"
}

prop_compose! {
    fn concrete_pattern()(segments in prop::collection::vec(segment(), 1..6)) -> String {
        segments.join(".")
    }
}

proptest! {
    #[test]
    fn specificity_law(pattern in concrete_pattern(), wildcard in any::<bool>()) {
        let segments = pattern.split('.').count() as u32;
        let (pattern, expected) = if wildcard {
            (format!("{pattern}.*"), (segments + 1) * 10 - 5)
        } else {
            (pattern, segments * 10)
        };
        prop_assert_eq!(permcore::node::specificity(&pattern), expected);
    }

    #[test]
    fn deny_wins_any_exact_tie(
        pattern in concrete_pattern(),
        specificity in 0u32..100,
        weight in -100i64..100,
    ) {
        let mut candidates = vec![
            Candidate {
                pattern: pattern.clone(),
                group_id: "allowers".to_string(),
                value: true,
                specificity,
                weight,
            },
            Candidate {
                pattern,
                group_id: "deniers".to_string(),
                value: false,
                specificity,
                weight,
            },
        ];
        decision::rank(&mut candidates);
        prop_assert!(!decision::winner(&candidates).unwrap().value);
    }

    #[test]
    fn winner_has_maximal_specificity_then_weight(
        specs in prop::collection::vec((0u32..50, -50i64..50, any::<bool>()), 1..20)
    ) {
        let mut candidates: Vec<Candidate> = specs
            .iter()
            .enumerate()
            .map(|(i, &(specificity, weight, value))| Candidate {
                pattern: format!("p{i}"),
                group_id: format!("g{i}"),
                value,
                specificity,
                weight,
            })
            .collect();
        decision::rank(&mut candidates);
        let win = decision::winner(&candidates).unwrap();

        let max_spec = specs.iter().map(|s| s.0).max().unwrap();
        prop_assert_eq!(win.specificity, max_spec);

        let max_weight = specs
            .iter()
            .filter(|s| s.0 == max_spec)
            .map(|s| s.1)
            .max()
            .unwrap();
        prop_assert_eq!(win.weight, max_weight);
    }
}
