//! Tidy tree pass (Buchheim, Jünger and Leipert)
//!
//! Assigns every hierarchy node a breadth coordinate so that subtrees
//! never overlap and siblings are evenly packed, in linear time. The
//! result is normalized onto `[0, extent]`; the layout engine uses
//! `extent = 2π` and reads the coordinate as an angle.
//!
//! Separation between neighbours is `1` for siblings and `2` for
//! cousins, divided by the depth of the node being placed, so deeper
//! levels pack tighter angularly.

use crate::hierarchy::Hierarchy;

#[derive(Debug, Clone)]
struct Walker {
    parent: usize,
    children: Vec<usize>,
    /// Default ancestor
    ancestor: usize,
    /// Default ancestor handed down to later siblings
    sibling_ancestor: Option<usize>,
    prelim: f64,
    modifier: f64,
    change: f64,
    shift: f64,
    thread: Option<usize>,
    /// Position among siblings
    number: usize,
    depth: usize,
}

struct Tidy {
    walkers: Vec<Walker>,
}

impl Tidy {
    fn new(h: &Hierarchy) -> Self {
        let n = h.len();
        // Index n is a virtual parent of the root
        let mut walkers: Vec<Walker> = (0..=n)
            .map(|i| Walker {
                parent: n,
                children: Vec::new(),
                ancestor: i,
                sibling_ancestor: None,
                prelim: 0.0,
                modifier: 0.0,
                change: 0.0,
                shift: 0.0,
                thread: None,
                number: 0,
                depth: 0,
            })
            .collect();

        for i in 0..n {
            walkers[i].parent = h.parent(i).unwrap_or(n);
            walkers[i].children = h.children(i).to_vec();
            walkers[i].depth = h.depth(i);
            for (k, &c) in h.children(i).iter().enumerate() {
                walkers[c].number = k;
            }
        }
        walkers[n].children = vec![h.root()];

        Self { walkers }
    }

    fn separation(&self, a: usize, b: usize) -> f64 {
        let base = if self.walkers[a].parent == self.walkers[b].parent {
            1.0
        } else {
            2.0
        };
        base / self.walkers[a].depth.max(1) as f64
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.walkers[v].children.first().copied().or(self.walkers[v].thread)
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.walkers[v].children.last().copied().or(self.walkers[v].thread)
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f64) {
        let span = self.walkers[wp].number as f64 - self.walkers[wm].number as f64;
        let change = shift / span;
        self.walkers[wp].change -= change;
        self.walkers[wp].shift += shift;
        self.walkers[wm].change += change;
        self.walkers[wp].prelim += shift;
        self.walkers[wp].modifier += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        let children = self.walkers[v].children.clone();
        for &w in children.iter().rev() {
            let walker = &mut self.walkers[w];
            walker.prelim += shift;
            walker.modifier += shift;
            change += walker.change;
            shift += walker.shift + change;
        }
    }

    fn next_ancestor(&self, vim: usize, v: usize, ancestor: usize) -> usize {
        let candidate = self.walkers[vim].ancestor;
        if self.walkers[candidate].parent == self.walkers[v].parent {
            candidate
        } else {
            ancestor
        }
    }

    fn apportion(&mut self, v: usize, left_sibling: Option<usize>, mut ancestor: usize) -> usize {
        let Some(w) = left_sibling else {
            return ancestor;
        };
        let parent = self.walkers[v].parent;

        let mut vip = v;
        let mut vop = v;
        let mut vim = w;
        let mut vom = self.walkers[parent].children[0];
        let mut sip = self.walkers[vip].modifier;
        let mut sop = self.walkers[vop].modifier;
        let mut sim = self.walkers[vim].modifier;
        let mut som = self.walkers[vom].modifier;

        let mut inner_left = self.next_right(vim);
        let mut inner_right = self.next_left(vip);
        while let (Some(l), Some(r)) = (inner_left, inner_right) {
            vim = l;
            vip = r;
            // Outer contours always reach at least as deep as inner ones
            vom = self.next_left(vom).unwrap_or(vom);
            vop = self.next_right(vop).unwrap_or(vop);
            self.walkers[vop].ancestor = v;

            let shift = self.walkers[vim].prelim + sim - self.walkers[vip].prelim - sip
                + self.separation(vim, vip);
            if shift > 0.0 {
                let from = self.next_ancestor(vim, v, ancestor);
                self.move_subtree(from, v, shift);
                sip += shift;
                sop += shift;
            }
            sim += self.walkers[vim].modifier;
            sip += self.walkers[vip].modifier;
            som += self.walkers[vom].modifier;
            sop += self.walkers[vop].modifier;

            inner_left = self.next_right(vim);
            inner_right = self.next_left(vip);
        }

        if let Some(l) = inner_left {
            if self.next_right(vop).is_none() {
                self.walkers[vop].thread = Some(l);
                self.walkers[vop].modifier += sim - sop;
            }
        }
        if let Some(r) = inner_right {
            if self.next_left(vom).is_none() {
                self.walkers[vom].thread = Some(r);
                self.walkers[vom].modifier += sip - som;
                ancestor = v;
            }
        }
        ancestor
    }

    fn first_walk(&mut self, v: usize) {
        let parent = self.walkers[v].parent;
        let number = self.walkers[v].number;
        let left_sibling = (number > 0).then(|| self.walkers[parent].children[number - 1]);

        if let (Some(&first), Some(&last)) = (
            self.walkers[v].children.first(),
            self.walkers[v].children.last(),
        ) {
            self.execute_shifts(v);
            let midpoint = (self.walkers[first].prelim + self.walkers[last].prelim) / 2.0;
            if let Some(w) = left_sibling {
                self.walkers[v].prelim = self.walkers[w].prelim + self.separation(v, w);
                self.walkers[v].modifier = self.walkers[v].prelim - midpoint;
            } else {
                self.walkers[v].prelim = midpoint;
            }
        } else if let Some(w) = left_sibling {
            self.walkers[v].prelim = self.walkers[w].prelim + self.separation(v, w);
        }

        let default_ancestor = self.walkers[parent]
            .sibling_ancestor
            .unwrap_or(self.walkers[parent].children[0]);
        let ancestor = self.apportion(v, left_sibling, default_ancestor);
        self.walkers[parent].sibling_ancestor = Some(ancestor);
    }
}

/// Breadth coordinate of every hierarchy node, normalized to `[0, extent]`.
///
/// Indices match the hierarchy's node indices.
#[must_use]
pub fn tidy_breadth(h: &Hierarchy, extent: f64) -> Vec<f64> {
    let n = h.len();
    let mut tidy = Tidy::new(h);

    for v in h.post_order() {
        tidy.first_walk(v);
    }
    let root = h.root();
    tidy.walkers[n].modifier = -tidy.walkers[root].prelim;

    let mut x = vec![0.0; n];
    for v in h.pre_order() {
        let parent = tidy.walkers[v].parent;
        let parent_mod = tidy.walkers[parent].modifier;
        x[v] = tidy.walkers[v].prelim + parent_mod;
        tidy.walkers[v].modifier += parent_mod;
    }

    let mut left = root;
    let mut right = root;
    for v in h.pre_order() {
        if x[v] < x[left] {
            left = v;
        }
        if x[v] > x[right] {
            right = v;
        }
    }
    let pad = if left == right {
        1.0
    } else {
        tidy.separation(left, right) / 2.0
    };
    let tx = pad - x[left];
    let kx = extent / (x[right] + pad + tx);

    x.iter().map(|&xi| (xi + tx) * kx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, EdgeId, GraphId, NewEdge, NewNode, Node, NodeId, NodeType};
    use chrono::Utc;

    fn tree(parents: &[Option<usize>]) -> (Vec<Node>, Vec<Edge>) {
        let graph = GraphId::new();
        let nodes: Vec<Node> = parents
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let ty = if p.is_none() { NodeType::Center } else { NodeType::Skill };
                Node::from_new(NodeId::new(), NewNode::new(graph, ty, format!("n{i}")), Utc::now())
            })
            .collect();
        let edges = parents
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                p.map(|p| Edge::from_new(EdgeId::new(), NewEdge::new(graph, nodes[p].id, nodes[i].id)))
            })
            .collect();
        (nodes, edges)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn star_is_evenly_spaced() {
        let (nodes, edges) = tree(&[None, Some(0), Some(0), Some(0), Some(0)]);
        let h = Hierarchy::build(&nodes, &edges).unwrap();
        let x = tidy_breadth(&h, 4.0);
        assert!(close(x[1], 0.5));
        assert!(close(x[2], 1.5));
        assert!(close(x[3], 2.5));
        assert!(close(x[4], 3.5));
        assert!(close(x[0], 2.0));
    }

    #[test]
    fn cousins_are_spread_wider_than_siblings() {
        // root -> a, b; a -> a1, a2; b -> b1, b2
        let (nodes, edges) = tree(&[None, Some(0), Some(0), Some(1), Some(1), Some(2), Some(2)]);
        let h = Hierarchy::build(&nodes, &edges).unwrap();
        let x = tidy_breadth(&h, 1.0);
        let sibling_gap = x[4] - x[3];
        let cousin_gap = x[5] - x[4];
        assert!(sibling_gap > 0.0);
        assert!(close(cousin_gap, 2.0 * sibling_gap));
        // Parents sit over their children
        assert!(close(x[1], (x[3] + x[4]) / 2.0));
        assert!(close(x[2], (x[5] + x[6]) / 2.0));
    }

    #[test]
    fn coordinates_stay_in_extent_and_keep_order() {
        let (nodes, edges) = tree(&[
            None,
            Some(0),
            Some(0),
            Some(0),
            Some(1),
            Some(1),
            Some(4),
            Some(4),
            Some(3),
            Some(8),
        ]);
        let h = Hierarchy::build(&nodes, &edges).unwrap();
        let extent = std::f64::consts::TAU;
        let x = tidy_breadth(&h, extent);
        assert!(x.iter().all(|v| v.is_finite() && *v >= 0.0 && *v <= extent));
        assert!(x[1] < x[2] && x[2] < x[3]);
        assert!(x[6] < x[7]);
    }

    #[test]
    fn lone_root_is_centered() {
        let (nodes, edges) = tree(&[None]);
        let h = Hierarchy::build(&nodes, &edges).unwrap();
        let x = tidy_breadth(&h, 2.0);
        assert!(close(x[0], 1.0));
    }
}
