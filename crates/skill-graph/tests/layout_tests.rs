use chrono::Utc;
use proptest::prelude::*;
use skill_graph::layout::min_pairwise_distance;
use skill_graph::prelude::*;
use skill_graph::{EdgeId, LayoutOutcome};

fn nodes_with_center(graph: GraphId, count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let ty = if i == 0 { NodeType::Center } else { NodeType::Skill };
            Node::from_new(NodeId::new(), NewNode::new(graph, ty, format!("n{i}")), Utc::now())
        })
        .collect()
}

fn assert_total(out: &LayoutOutcome, count: usize) {
    assert_eq!(out.nodes.len(), count);
    for node in &out.nodes {
        assert!(node.position_x.is_finite(), "{} x = {}", node.label, node.position_x);
        assert!(node.position_y.is_finite(), "{} y = {}", node.label, node.position_y);
    }
}

proptest! {
    #[test]
    fn prop_layout_is_total_for_arbitrary_edges(
        count in 1..25usize,
        pairs in proptest::collection::vec((0..25usize, 0..25usize), 0..60),
        with_center in any::<bool>(),
    ) {
        let graph = GraphId::new();
        let mut nodes = nodes_with_center(graph, count);
        if !with_center {
            nodes[0].node_type = NodeType::Skill;
        }
        let edges: Vec<Edge> = pairs
            .into_iter()
            .filter(|&(a, b)| a < count && b < count)
            .map(|(a, b)| Edge::from_new(EdgeId::new(), NewEdge::new(graph, nodes[a].id, nodes[b].id)))
            .collect();

        let out = LayoutEngine::default().layout_with_report(&nodes, &edges);
        assert_total(&out, count);
        for (placed, original) in out.nodes.iter().zip(&nodes) {
            prop_assert_eq!(placed.id, original.id);
        }
    }

    #[test]
    fn prop_random_trees_take_radial_path(parents in proptest::collection::vec(any::<prop::sample::Index>(), 1..30)) {
        let graph = GraphId::new();
        let nodes = nodes_with_center(graph, parents.len() + 1);
        let edges: Vec<Edge> = parents
            .iter()
            .enumerate()
            .map(|(i, idx)| {
                let parent = idx.index(i + 1);
                Edge::from_new(EdgeId::new(), NewEdge::new(graph, nodes[parent].id, nodes[i + 1].id))
            })
            .collect();

        let out = LayoutEngine::default().layout_with_report(&nodes, &edges);
        prop_assert_eq!(out.strategy, LayoutStrategy::Radial);
        assert_total(&out, nodes.len());
        prop_assert_eq!((out.nodes[0].position_x, out.nodes[0].position_y), (0.0, 0.0));
    }
}

#[test]
fn test_relaxation_never_moves_the_center() {
    let graph = GraphId::new();
    let nodes = nodes_with_center(graph, 30);
    let edges: Vec<Edge> = (1..30)
        .map(|i| Edge::from_new(EdgeId::new(), NewEdge::new(graph, nodes[0].id, nodes[i].id)))
        .collect();
    let placed = LayoutEngine::default().layout(&nodes, &edges);
    assert_eq!((placed[0].position_x, placed[0].position_y), (0.0, 0.0));
}

#[test]
fn test_deep_chain_with_side_branches_is_spread() {
    // center -> current -> s1 -> s2 -> s3, each skill with two leaves
    let graph = GraphId::new();
    let mut nodes = nodes_with_center(graph, 1);
    let mut edges = Vec::new();
    let mut add = |nodes: &mut Vec<Node>, parent: usize, ty: NodeType| {
        let node = Node::from_new(NodeId::new(), NewNode::new(graph, ty, format!("n{}", nodes.len())), Utc::now());
        edges.push(Edge::from_new(EdgeId::new(), NewEdge::new(graph, nodes[parent].id, node.id)));
        nodes.push(node);
        nodes.len() - 1
    };
    let mut cursor = add(&mut nodes, 0, NodeType::Current);
    for _ in 0..3 {
        let next = add(&mut nodes, cursor, NodeType::Skill);
        add(&mut nodes, cursor, NodeType::Cert);
        add(&mut nodes, cursor, NodeType::Position);
        cursor = next;
    }

    let config = LayoutConfig::default();
    let placed = LayoutEngine::new(config.clone()).layout(&nodes, &edges);
    let min = min_pairwise_distance(&placed).unwrap();
    assert!(min > 0.5 * config.min_node_distance, "min distance {min}");
}
