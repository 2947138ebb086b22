//! Onboarding, expansion, deletion and layout flows

use proptest::prelude::*;
use serde_json::json;
use skill_core::{
    EngineConfig, GraphStore, MemoryGraphStore, OracleError, OracleRequest, SkillTreeError, SkillTreeService,
};
use skill_core::oracle::OnboardingAnswer;
use skill_graph::types::palette;
use skill_graph::{check_forest, ForestViolation, LayoutStrategy, NewEdge, NodeType, UserId};
use skill_test_utils::{create_basic_tree, ScriptedOracle, SnapshotBuilder};
use std::sync::Arc;

type Service = SkillTreeService<MemoryGraphStore, ScriptedOracle>;

fn service(store: MemoryGraphStore, oracle: ScriptedOracle) -> Service {
    SkillTreeService::new(Arc::new(store), Arc::new(oracle), EngineConfig::default())
}

fn answers() -> Vec<OnboardingAnswer> {
    vec![
        OnboardingAnswer {
            question_id: "job".into(),
            question: "What do you do?".into(),
            answer: json!("I analyse sales data"),
        },
        OnboardingAnswer {
            question_id: "hobbies".into(),
            question: "Hobbies?".into(),
            answer: json!(["guitar"]),
        },
    ]
}

const ANALYST_TREE: &str = r#"{"nodes":[
    {"nodeType":"skill","label":"SQL","description":"Queries","requiredExp":80,"parentLabels":["Data Analyst"]},
    {"nodeType":"skill","label":"Joins","parentLabels":["SQL (skill)"],"suggestedResources":["docs"]},
    {"nodeType":"position","label":"Senior Analyst","parentLabels":["Unknown"]}
],"reasoning":"core skills"}"#;

#[tokio::test]
async fn test_onboarding_builds_one_branch_per_position() {
    let oracle = ScriptedOracle::new()
        .respond(
            r#"[{"category":"tech","currentPosition":"Data Analyst","reasoning":"works with data"},
                {"category":"music","currentPosition":"Guitarist"}]"#,
        )
        .respond(ANALYST_TREE)
        .fail(OracleError::Overloaded);
    let svc = service(MemoryGraphStore::new(), oracle);
    let user = UserId::new();

    let out = svc.onboard(user, answers()).await.unwrap();
    assert_eq!(out.graph.version, 1);
    assert_eq!(out.center.label, "You");
    assert_eq!(out.center.color, palette::CENTER);
    assert_eq!(out.current_nodes.len(), 1);
    assert_eq!(out.tree_nodes, 3);
    assert_eq!(out.skipped_classifications, 1);

    let current = &out.current_nodes[0];
    assert_eq!(current.label, "Data Analyst");
    assert_eq!(current.metadata["category"], "tech");
    assert_eq!(current.parent_ids, vec![out.center.id]);

    let snapshot = svc.snapshot(out.graph.id).await.unwrap();
    assert_eq!(snapshot.nodes.len(), 5);
    assert!(check_forest(&snapshot.nodes, &snapshot.edges).is_empty());

    let requests = svc.oracle().requests();
    assert!(matches!(requests[0], OracleRequest::Classify { .. }));
    assert!(matches!(&requests[1], OracleRequest::GenerateTree { position } if position.category == "tech"));
}

#[tokio::test]
async fn test_failed_classification_creates_nothing() {
    let svc = service(MemoryGraphStore::new(), ScriptedOracle::new().respond("no idea"));
    let user = UserId::new();

    let err = svc.onboard(user, answers()).await.unwrap_err();
    assert!(matches!(err, SkillTreeError::BadOracleResponse(_)));
    assert!(svc.store().graphs_by_user(user).await.unwrap().is_empty());
    assert_eq!(svc.store().node_count(), 0);
}

#[tokio::test]
async fn test_expansion_hangs_from_selected_node() {
    let tree = create_basic_tree();
    let oracle = ScriptedOracle::new().respond(
        r#"{"nodes":[
            {"nodeType":"skill","label":"Joins"},
            {"nodeType":"skill","label":"Window Functions","parentLabels":["Joins"]},
            {"nodeType":"cert","label":"SQL Cert","parentLabels":["Data Analyst"]}
        ]}"#,
    );
    let svc = service(tree.store(UserId::new()), oracle);

    let applied = svc.expand_node(tree.id("SQL"), "tech").await.unwrap();
    assert_eq!(applied.created.len(), 3);
    let (joins, window, cert) = (&applied.created[0], &applied.created[1], &applied.created[2]);
    assert_eq!(joins.parent_ids, vec![tree.id("SQL")]);
    assert!(joins.is_locked);
    assert_eq!(window.parent_ids, vec![joins.id]);
    // Existing nodes outside the selected branch resolve too
    assert_eq!(cert.parent_ids, vec![tree.id("Data Analyst")]);
    assert!(!cert.is_locked);

    let requests = svc.oracle().requests();
    assert!(matches!(&requests[0], OracleRequest::ExpandTree { node, category } if node.label == "SQL" && category == "tech"));
}

#[tokio::test]
async fn test_expansion_demotes_unproposable_types() {
    let tree = create_basic_tree();
    let oracle = ScriptedOracle::new().respond(
        r#"{"nodes":[{"nodeType":"center","label":"Root"},{"nodeType":"course","label":"Intro","parentLabels":["Root"]}]}"#,
    );
    let svc = service(tree.store(UserId::new()), oracle);

    let applied = svc.expand_node(tree.id("SQL"), "tech").await.unwrap();
    let (root, intro) = (&applied.created[0], &applied.created[1]);
    assert_eq!(root.node_type, NodeType::Skill);
    assert_eq!(root.color, palette::FALLBACK);
    assert_eq!(root.metadata["proposedType"], "center");
    assert_eq!(root.parent_ids, vec![tree.id("SQL")]);
    assert_eq!(intro.parent_ids, vec![root.id]);
    assert_eq!(intro.metadata["proposedType"], "course");

    let snapshot = svc.snapshot(tree.graph_id()).await.unwrap();
    assert!(check_forest(&snapshot.nodes, &snapshot.edges).is_empty());
}

fn deep_tree() -> SnapshotBuilder {
    create_basic_tree()
        .child("SQL", NodeType::Skill, "Joins")
        .child("Joins", NodeType::Skill, "Window Functions")
        .child("Data Analyst", NodeType::Cert, "Excel Cert")
}

#[tokio::test]
async fn test_delete_subtree_removes_descendants_and_edges() {
    let tree = deep_tree();
    let svc = service(tree.store(UserId::new()), ScriptedOracle::new());

    let removed = svc.delete_subtree(tree.id("SQL")).await.unwrap();
    assert_eq!(removed.nodes, 3);
    assert_eq!(removed.edges, 3);

    let snapshot = svc.snapshot(tree.graph_id()).await.unwrap();
    let labels: Vec<&str> = snapshot.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, ["You", "Data Analyst", "Excel Cert"]);
    assert!(check_forest(&snapshot.nodes, &snapshot.edges).is_empty());
}

#[tokio::test]
async fn test_center_cannot_be_deleted() {
    let tree = deep_tree();
    let svc = service(tree.store(UserId::new()), ScriptedOracle::new());

    let err = svc.delete_subtree(tree.id("You")).await.unwrap_err();
    assert!(matches!(err, SkillTreeError::Rejected(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(svc.store().node_count(), 6);
}

#[tokio::test]
async fn test_delete_graph_cascades() {
    let tree = deep_tree();
    let svc = service(tree.store(UserId::new()), ScriptedOracle::new());

    let removed = svc.delete_graph(tree.graph_id()).await.unwrap();
    assert_eq!(removed.nodes, 6);
    assert_eq!(removed.edges, 5);
    assert_eq!(svc.store().node_count(), 0);
    assert!(matches!(
        svc.snapshot(tree.graph_id()).await,
        Err(SkillTreeError::GraphNotFound(_))
    ));
}

#[tokio::test]
async fn test_layout_positions_are_persisted() {
    let tree = deep_tree();
    let svc = service(tree.store(UserId::new()), ScriptedOracle::new());

    let outcome = svc.layout_graph(tree.graph_id(), true).await.unwrap();
    assert_eq!(outcome.strategy, LayoutStrategy::Radial);

    for placed in &outcome.nodes {
        let stored = svc.store().get_node(placed.id).await.unwrap().unwrap();
        assert_eq!((stored.position_x, stored.position_y), (placed.position_x, placed.position_y));
        if placed.node_type == NodeType::Center {
            assert_eq!((stored.position_x, stored.position_y), (0.0, 0.0));
        } else {
            assert!(stored.position_x.hypot(stored.position_y) > 300.0);
        }
    }
}

#[tokio::test]
async fn test_check_graph_reports_second_parent() {
    let tree = deep_tree();
    let svc = service(tree.store(UserId::new()), ScriptedOracle::new());
    assert!(svc.check_graph(tree.graph_id()).await.unwrap().is_empty());

    svc.store()
        .insert_edge(NewEdge::new(tree.graph_id(), tree.id("Excel Cert"), tree.id("Joins")))
        .await
        .unwrap();
    let violations = svc.check_graph(tree.graph_id()).await.unwrap();
    assert_eq!(
        violations,
        vec![ForestViolation::MultipleParents {
            node: tree.id("Joins"),
            count: 2
        }]
    );
}

fn proposal_strategy() -> impl Strategy<Value = String> {
    // Each node names up to two parents: earlier nodes, later nodes or strangers
    prop::collection::vec(prop::collection::vec(0usize..20, 0..3), 1..12).prop_map(|parents| {
        let count = parents.len();
        let nodes: Vec<_> = parents
            .iter()
            .enumerate()
            .map(|(i, picks)| {
                let labels: Vec<String> = picks
                    .iter()
                    .map(|p| if *p < count { format!("N{p} (skill)") } else { format!("Stranger {p}") })
                    .collect();
                json!({"nodeType": "skill", "label": format!("N{i}"), "parentLabels": labels})
            })
            .collect();
        json!({ "nodes": nodes }).to_string()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_expansion_keeps_single_parents(proposal in proposal_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let violations = rt.block_on(async {
            let tree = create_basic_tree();
            let svc = service(tree.store(UserId::new()), ScriptedOracle::new().respond(proposal));
            svc.expand_node(tree.id("SQL"), "tech").await.unwrap();
            let snapshot = svc.snapshot(tree.graph_id()).await.unwrap();
            check_forest(&snapshot.nodes, &snapshot.edges)
        });
        prop_assert!(violations.is_empty(), "violations: {:?}", violations);
    }
}
