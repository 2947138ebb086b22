//! Radial layout engine
//!
//! Places the center at the origin and every other node on a ring whose
//! radius grows with depth and, logarithmically, with subtree size. The
//! angle comes from a tidy tree pass over `[0, 2π)`. A bounded pairwise
//! repulsion then removes local overlaps.
//!
//! Layout is total. An inconsistent edge set falls back to breadth-first
//! rings, and a graph without a center falls back to a grid. Fallbacks are
//! logged, never returned as errors.

use crate::hierarchy::{Hierarchy, HierarchyError};
use crate::tidy::tidy_breadth;
use crate::types::{Edge, Node, NodeId, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Layout tuning. Every value is empirical and may be overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the first ring
    pub base_radius: f64,
    /// Added per level below the first
    pub radius_increment: f64,
    /// Multiplier of `ln(subtree_size + 1)` added to the radius
    pub subtree_radius_factor: f64,
    /// Pairs closer than this are pushed apart
    pub min_node_distance: f64,
    pub push_strength: f64,
    pub relaxation_iterations: usize,
    /// Cell size of the grid fallback
    pub grid_spacing: f64,
    /// Angular fan (radians) of siblings around their parent in the
    /// breadth-first fallback, divided by depth
    pub fallback_sibling_spread: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_radius: 350.0,
            radius_increment: 300.0,
            subtree_radius_factor: 50.0,
            min_node_distance: 200.0,
            push_strength: 5.0,
            relaxation_iterations: 50,
            grid_spacing: 350.0,
            fallback_sibling_spread: 0.35,
        }
    }
}

impl LayoutConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With ring radii
    #[inline]
    #[must_use]
    pub fn with_radii(mut self, base: f64, increment: f64) -> Self {
        self.base_radius = base;
        self.radius_increment = increment;
        self
    }

    /// With minimum node distance
    #[inline]
    #[must_use]
    pub fn with_min_node_distance(mut self, distance: f64) -> Self {
        self.min_node_distance = distance;
        self
    }

    /// With relaxation strength and iteration count
    #[inline]
    #[must_use]
    pub fn with_relaxation(mut self, push_strength: f64, iterations: usize) -> Self {
        self.push_strength = push_strength;
        self.relaxation_iterations = iterations;
        self
    }

    /// Radius of a node at `depth` whose subtree holds `subtree_size` nodes
    #[must_use]
    pub fn ring_radius(&self, depth: usize, subtree_size: usize) -> f64 {
        let level = depth.saturating_sub(1) as f64;
        self.base_radius
            + level * self.radius_increment
            + ((subtree_size + 1) as f64).ln() * self.subtree_radius_factor
    }
}

/// Why the radial pass was abandoned
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    /// Edge set is not a tree rooted at the center
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// A computed coordinate is NaN or infinite
    #[error("non-finite position for node {0}")]
    NonFinite(NodeId),
}

/// Which placement produced the positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    Radial,
    BreadthFirst,
    Grid,
}

/// Positioned nodes plus the strategy used
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutcome {
    pub nodes: Vec<Node>,
    pub strategy: LayoutStrategy,
}

/// Radial layout engine
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Copy of `nodes` with positions assigned
    #[must_use]
    pub fn layout(&self, nodes: &[Node], edges: &[Edge]) -> Vec<Node> {
        self.layout_with_report(nodes, edges).nodes
    }

    /// Like [`layout`](Self::layout), also reporting the strategy used
    #[must_use]
    pub fn layout_with_report(&self, nodes: &[Node], edges: &[Edge]) -> LayoutOutcome {
        let has_center = nodes.iter().any(|n| n.node_type == NodeType::Center);
        let (points, strategy) = if !has_center {
            tracing::debug!(nodes = nodes.len(), "no center node, using grid layout");
            (self.grid(nodes.len()), LayoutStrategy::Grid)
        } else {
            match self.radial(nodes, edges) {
                Ok(points) => (points, LayoutStrategy::Radial),
                Err(e) => {
                    tracing::warn!(error = %e, "radial layout failed, falling back to breadth-first rings");
                    (self.breadth_first(nodes, edges), LayoutStrategy::BreadthFirst)
                }
            }
        };

        let nodes = nodes
            .iter()
            .zip(points)
            .map(|(node, (x, y))| {
                let mut node = node.clone();
                node.position_x = x;
                node.position_y = y;
                node
            })
            .collect();
        LayoutOutcome { nodes, strategy }
    }

    /// Tidy-tree radial placement followed by relaxation
    pub fn radial(&self, nodes: &[Node], edges: &[Edge]) -> Result<Vec<(f64, f64)>, LayoutError> {
        let h = Hierarchy::build(nodes, edges)?;
        let angles = tidy_breadth(&h, TAU);

        let mut points = vec![(0.0, 0.0); nodes.len()];
        for (i, point) in points.iter_mut().enumerate() {
            if i == h.root() {
                continue;
            }
            let radius = self.config.ring_radius(h.depth(i), h.subtree_size(i));
            let angle = angles[i] - FRAC_PI_2;
            *point = (angle.cos() * radius, angle.sin() * radius);
            if !point.0.is_finite() || !point.1.is_finite() {
                return Err(LayoutError::NonFinite(nodes[i].id));
            }
        }

        self.relax(&mut points, &pinned_centers(nodes));
        Ok(points)
    }

    /// Concentric rings by breadth-first depth from the first center.
    ///
    /// Level 1 is spread evenly; deeper nodes take their parent's angle,
    /// fanned slightly when siblings share it. Nodes the walk cannot reach
    /// go on one extra outer ring.
    #[must_use]
    pub fn breadth_first(&self, nodes: &[Node], edges: &[Edge]) -> Vec<(f64, f64)> {
        let mut points = vec![(0.0, 0.0); nodes.len()];
        let Some(center) = nodes.iter().position(|n| n.node_type == NodeType::Center) else {
            return self.grid(nodes.len());
        };

        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id).or_insert(i);
        }
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for edge in edges {
            if let (Some(&from), Some(&to)) = (index.get(&edge.from_node_id), index.get(&edge.to_node_id)) {
                children[from].push(to);
            }
        }

        let mut visited = vec![false; nodes.len()];
        let mut angle = vec![0.0f64; nodes.len()];
        visited[center] = true;

        let first_ring: Vec<usize> = children[center]
            .iter()
            .copied()
            .filter(|&c| !std::mem::replace(&mut visited[c], true))
            .collect();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        let count = first_ring.len() as f64;
        for (k, &c) in first_ring.iter().enumerate() {
            angle[c] = k as f64 * TAU / count - FRAC_PI_2;
            points[c] = polar(angle[c], self.config.base_radius);
            queue.push_back((c, 1));
        }

        let mut deepest = usize::from(!first_ring.is_empty());
        while let Some((parent, level)) = queue.pop_front() {
            let fresh: Vec<usize> = children[parent]
                .iter()
                .copied()
                .filter(|&c| !std::mem::replace(&mut visited[c], true))
                .collect();
            let depth = level + 1;
            let radius = self.config.base_radius + (depth - 1) as f64 * self.config.radius_increment;
            let mid = (fresh.len() as f64 - 1.0) / 2.0;
            for (k, &c) in fresh.iter().enumerate() {
                angle[c] = angle[parent]
                    + (k as f64 - mid) * self.config.fallback_sibling_spread / depth as f64;
                points[c] = polar(angle[c], radius);
                queue.push_back((c, depth));
                deepest = deepest.max(depth);
            }
        }

        let stray: Vec<usize> = (0..nodes.len()).filter(|&i| !visited[i]).collect();
        if !stray.is_empty() {
            tracing::debug!(count = stray.len(), "unreachable nodes placed on outer ring");
            let radius = self.config.base_radius + deepest as f64 * self.config.radius_increment;
            let count = stray.len() as f64;
            for (k, &i) in stray.iter().enumerate() {
                points[i] = polar(k as f64 * TAU / count - FRAC_PI_2, radius);
            }
        }

        self.relax(&mut points, &pinned_centers(nodes));
        points
    }

    /// Row-major grid, `ceil(sqrt(n))` columns
    #[must_use]
    pub fn grid(&self, count: usize) -> Vec<(f64, f64)> {
        let cols = (count as f64).sqrt().ceil().max(1.0) as usize;
        (0..count)
            .map(|i| {
                let (row, col) = (i / cols, i % cols);
                (col as f64 * self.config.grid_spacing, row as f64 * self.config.grid_spacing)
            })
            .collect()
    }

    /// Pairwise repulsion of points closer than the minimum distance.
    ///
    /// Pairs involving a pinned point are skipped entirely. Coincident
    /// points have no direction and are left alone.
    pub fn relax(&self, points: &mut [(f64, f64)], pinned: &[bool]) {
        let min = self.config.min_node_distance;
        let iterations = self.config.relaxation_iterations;
        if iterations == 0 {
            return;
        }
        let scale = self.config.push_strength / iterations as f64;

        for _ in 0..iterations {
            for i in 0..points.len() {
                if pinned.get(i).copied().unwrap_or(false) {
                    continue;
                }
                for j in (i + 1)..points.len() {
                    if pinned.get(j).copied().unwrap_or(false) {
                        continue;
                    }
                    let dx = points[j].0 - points[i].0;
                    let dy = points[j].1 - points[i].1;
                    let distance = dx.hypot(dy);
                    if distance <= 0.0 || distance >= min {
                        continue;
                    }
                    let direction = dy.atan2(dx);
                    let push = (min - distance) / 2.0 * scale;
                    let (px, py) = (direction.cos() * push, direction.sin() * push);
                    points[i].0 -= px;
                    points[i].1 -= py;
                    points[j].0 += px;
                    points[j].1 += py;
                }
            }
        }
    }
}

/// Lay out with the default configuration
#[must_use]
pub fn layout(nodes: &[Node], edges: &[Edge]) -> Vec<Node> {
    LayoutEngine::default().layout(nodes, edges)
}

/// Smallest distance between any two positioned nodes, ignoring centers
#[must_use]
pub fn min_pairwise_distance(nodes: &[Node]) -> Option<f64> {
    let movable: Vec<&Node> = nodes.iter().filter(|n| n.node_type != NodeType::Center).collect();
    let mut best: Option<f64> = None;
    for (i, a) in movable.iter().enumerate() {
        for b in &movable[i + 1..] {
            let d = (a.position_x - b.position_x).hypot(a.position_y - b.position_y);
            best = Some(best.map_or(d, |m| m.min(d)));
        }
    }
    best
}

fn polar(angle: f64, radius: f64) -> (f64, f64) {
    (angle.cos() * radius, angle.sin() * radius)
}

fn pinned_centers(nodes: &[Node]) -> Vec<bool> {
    nodes.iter().map(|n| n.node_type == NodeType::Center).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeId, GraphId, NewEdge, NewNode};
    use chrono::Utc;

    struct Tree {
        graph: GraphId,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    }

    impl Tree {
        fn rooted() -> Self {
            let graph = GraphId::new();
            let center = Node::from_new(NodeId::new(), NewNode::new(graph, NodeType::Center, "me"), Utc::now());
            Self {
                graph,
                nodes: vec![center],
                edges: Vec::new(),
            }
        }

        fn child(&mut self, parent: usize, node_type: NodeType) -> usize {
            let label = format!("n{}", self.nodes.len());
            let node = Node::from_new(NodeId::new(), NewNode::new(self.graph, node_type, label), Utc::now());
            self.edges.push(Edge::from_new(
                EdgeId::new(),
                NewEdge::new(self.graph, self.nodes[parent].id, node.id),
            ));
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    #[test]
    fn center_is_pinned_at_origin() {
        let mut t = Tree::rooted();
        let a = t.child(0, NodeType::Current);
        t.child(a, NodeType::Skill);
        let out = LayoutEngine::default().layout_with_report(&t.nodes, &t.edges);
        assert_eq!(out.strategy, LayoutStrategy::Radial);
        assert_eq!((out.nodes[0].position_x, out.nodes[0].position_y), (0.0, 0.0));
        assert!(out.nodes.iter().all(|n| n.position_x.is_finite() && n.position_y.is_finite()));
    }

    #[test]
    fn single_child_sits_on_first_ring() {
        let mut t = Tree::rooted();
        t.child(0, NodeType::Current);
        let nodes = layout(&t.nodes, &t.edges);
        let expected = LayoutConfig::default().ring_radius(1, 1);
        // Lone child is centered at angle π, i.e. straight along +y
        assert!(nodes[1].position_x.abs() < 1e-6);
        assert!((nodes[1].position_y - expected).abs() < 1e-6);
    }

    #[test]
    fn radius_grows_with_depth() {
        let mut t = Tree::rooted();
        let a = t.child(0, NodeType::Current);
        let b = t.child(a, NodeType::Skill);
        let c = t.child(b, NodeType::Skill);
        let nodes = layout(&t.nodes, &t.edges);
        let r = |i: usize| nodes[i].position_x.hypot(nodes[i].position_y);
        assert!(r(a) < r(b));
        assert!(r(b) < r(c));
    }

    #[test]
    fn branched_tree_keeps_min_distance() {
        let mut t = Tree::rooted();
        for _ in 0..3 {
            let current = t.child(0, NodeType::Current);
            for _ in 0..3 {
                t.child(current, NodeType::Skill);
            }
        }
        let config = LayoutConfig::default();
        let nodes = LayoutEngine::new(config.clone()).layout(&t.nodes, &t.edges);
        let min = min_pairwise_distance(&nodes).unwrap();
        assert!(min >= 0.9 * config.min_node_distance, "min distance {min}");
    }

    #[test]
    fn relaxation_improves_crowded_ring() {
        let mut t = Tree::rooted();
        for _ in 0..20 {
            t.child(0, NodeType::Current);
        }
        let unrelaxed = LayoutEngine::new(LayoutConfig::default().with_relaxation(5.0, 0));
        let relaxed = LayoutEngine::default();

        let before = min_pairwise_distance(&unrelaxed.layout(&t.nodes, &t.edges)).unwrap();
        let after = min_pairwise_distance(&relaxed.layout(&t.nodes, &t.edges)).unwrap();
        assert!(before < 200.0);
        assert!(after >= before + 5.0, "before {before}, after {after}");
    }

    #[test]
    fn cycle_falls_back_to_rings() {
        let mut t = Tree::rooted();
        let a = t.child(0, NodeType::Current);
        let b = t.child(a, NodeType::Skill);
        let c = t.child(b, NodeType::Skill);
        // Re-point a's inbound edge at c: a -> b -> c -> a, center detached
        t.edges[0].from_node_id = t.nodes[c].id;

        let out = LayoutEngine::default().layout_with_report(&t.nodes, &t.edges);
        assert_eq!(out.strategy, LayoutStrategy::BreadthFirst);
        assert_eq!(out.nodes.len(), 4);
        assert!(out.nodes.iter().all(|n| n.position_x.is_finite() && n.position_y.is_finite()));
        assert_eq!((out.nodes[0].position_x, out.nodes[0].position_y), (0.0, 0.0));
        assert!(min_pairwise_distance(&out.nodes).unwrap() > 1.0);
    }

    #[test]
    fn orphan_falls_back_and_is_placed() {
        let mut t = Tree::rooted();
        let a = t.child(0, NodeType::Current);
        t.child(a, NodeType::Skill);
        let orphan = Node::from_new(NodeId::new(), NewNode::new(t.graph, NodeType::Skill, "loose"), Utc::now());
        t.nodes.push(orphan);

        let out = LayoutEngine::default().layout_with_report(&t.nodes, &t.edges);
        assert_eq!(out.strategy, LayoutStrategy::BreadthFirst);
        let loose = &out.nodes[3];
        assert!(loose.position_x.hypot(loose.position_y) > 300.0);
    }

    #[test]
    fn missing_center_uses_grid() {
        let graph = GraphId::new();
        let nodes: Vec<Node> = (0..5)
            .map(|i| Node::from_new(NodeId::new(), NewNode::new(graph, NodeType::Skill, format!("s{i}")), Utc::now()))
            .collect();
        let out = LayoutEngine::default().layout_with_report(&nodes, &[]);
        assert_eq!(out.strategy, LayoutStrategy::Grid);
        // 3 columns for 5 nodes
        assert_eq!((out.nodes[3].position_x, out.nodes[3].position_y), (0.0, 350.0));
        assert_eq!((out.nodes[4].position_x, out.nodes[4].position_y), (350.0, 350.0));
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(layout(&[], &[]).is_empty());
    }
}
