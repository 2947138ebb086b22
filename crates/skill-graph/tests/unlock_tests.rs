use chrono::Utc;
use proptest::prelude::*;
use skill_graph::prelude::*;
use skill_graph::{compute_lock_updates, EdgeId};
use std::collections::HashMap;

fn make(graph: GraphId, node_type: NodeType, label: &str, required: u32, current: u32, locked: bool) -> Node {
    Node::from_new(
        NodeId::new(),
        NewNode::new(graph, node_type, label)
            .with_required_exp(required)
            .with_current_exp(current)
            .locked(locked),
        Utc::now(),
    )
}

fn link(graph: GraphId, parent: &Node, child: &Node) -> Edge {
    Edge::from_new(EdgeId::new(), NewEdge::new(graph, parent.id, child.id))
}

/// Random tree: node 0 is the center, node i > 0 hangs off some j < i.
fn tree_strategy() -> impl Strategy<Value = (Vec<(usize, u32, u32)>, Vec<u32>)> {
    (2..16usize).prop_flat_map(|n| {
        let shape = (1..n)
            .map(|i| (0..i, 1..200u32, 0..200u32))
            .collect::<Vec<_>>();
        (shape, proptest::collection::vec(0..100u32, n))
    })
}

fn build(shape: &[(usize, u32, u32)]) -> (Vec<Node>, Vec<Edge>) {
    let graph = GraphId::new();
    let mut nodes = vec![make(graph, NodeType::Center, "center", 0, 0, false)];
    let mut edges = Vec::new();
    for (i, &(parent, required, current)) in shape.iter().enumerate() {
        let node = make(graph, NodeType::Skill, &format!("n{i}"), required, current.min(required), true);
        edges.push(link(graph, &nodes[parent], &node));
        nodes.push(node);
    }
    (nodes, edges)
}

proptest! {
    #[test]
    fn prop_unlock_is_monotone_in_exp((shape, bumps) in tree_strategy()) {
        let (nodes, edges) = build(&shape);
        let engine = UnlockEngine::new();
        let before = engine.evaluate(&nodes, &edges);

        let raised: Vec<Node> = nodes
            .iter()
            .zip(bumps.iter())
            .map(|(n, bump)| {
                let mut n = n.clone();
                n.current_exp += bump;
                n
            })
            .collect();
        let after = engine.evaluate(&raised, &edges);

        for (id, locked_before) in &before {
            if !locked_before {
                prop_assert_eq!(after.get(id), Some(&false), "node {} relocked", id);
            }
        }
    }

    #[test]
    fn prop_applying_updates_reaches_fixpoint((shape, _bumps) in tree_strategy()) {
        let (mut nodes, edges) = build(&shape);
        let report = compute_lock_updates(&nodes, &edges);
        let targets: HashMap<NodeId, bool> =
            report.updates.iter().map(|u| (u.node_id, u.locked)).collect();
        for node in &mut nodes {
            if let Some(&locked) = targets.get(&node.id) {
                node.is_locked = locked;
            }
        }
        prop_assert!(compute_lock_updates(&nodes, &edges).is_empty());
    }
}

#[test]
fn test_threshold_exactness() {
    let graph = GraphId::new();
    let center = make(graph, NodeType::Center, "C", 0, 0, false);
    for (exp, locked) in [(49, true), (50, false)] {
        let parent = make(graph, NodeType::Skill, "P", 100, exp, false);
        let child = make(graph, NodeType::Skill, "K", 100, 0, true);
        let edges = vec![link(graph, &center, &parent), link(graph, &parent, &child)];
        let state = UnlockEngine::new().evaluate(&[center.clone(), parent, child.clone()], &edges);
        assert_eq!(state[&child.id], locked, "parent at {exp} EXP");
    }
}

#[test]
fn test_child_of_current_unlocks_immediately() {
    let graph = GraphId::new();
    let c = make(graph, NodeType::Center, "C", 0, 0, false);
    let a = make(graph, NodeType::Current, "A", 0, 0, false);
    let b1 = make(graph, NodeType::Skill, "B1", 100, 0, true);
    let edges = vec![link(graph, &c, &a), link(graph, &a, &b1)];

    let report = compute_lock_updates(&[c, a, b1.clone()], &edges);
    assert_eq!(
        report.updates,
        vec![LockUpdate {
            node_id: b1.id,
            locked: false
        }]
    );
    assert_eq!(report.newly_unlocked, vec![b1.id]);
}

#[test]
fn test_custom_threshold() {
    let graph = GraphId::new();
    let center = make(graph, NodeType::Center, "C", 0, 0, false);
    let parent = make(graph, NodeType::Skill, "P", 100, 75, false);
    let child = make(graph, NodeType::Skill, "K", 100, 0, true);
    let edges = vec![link(graph, &center, &parent), link(graph, &parent, &child)];
    let nodes = [center, parent, child.clone()];

    assert!(!UnlockEngine::new().with_threshold(75.0).evaluate(&nodes, &edges)[&child.id]);
    assert!(UnlockEngine::new().with_threshold(80.0).evaluate(&nodes, &edges)[&child.id]);
}
