use anyhow::{bail, Result};

use super::{NodeId, Tree};

mod circular;
mod diagonal;
mod radial;
mod rectangular;

/// Axis affected by branch-length scaling for a given layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingAxis {
    X,
    Both,
}

/// The layout strategies ("prerenderers"). A closed set: selecting an
/// unknown type by name is a recoverable error, not a lookup failure at
/// draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeType {
    Rectangular,
    Circular,
    Radial,
    Diagonal,
}

impl TreeType {
    pub const ALL: [TreeType; 4] = [
        TreeType::Rectangular,
        TreeType::Circular,
        TreeType::Radial,
        TreeType::Diagonal,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "rectangular" => Self::Rectangular,
            "circular" => Self::Circular,
            "radial" => Self::Radial,
            "diagonal" => Self::Diagonal,
            _ => bail!("\"{name}\" is not a known tree type"),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangular => "rectangular",
            Self::Circular => "circular",
            Self::Radial => "radial",
            Self::Diagonal => "diagonal",
        }
    }

    /// Compute every node's geometry for the current canvas and branch
    /// scale. Pure over the topology: rerunning without a structural
    /// change reproduces identical geometry.
    pub(crate) fn prerender(self, tree: &mut Tree) {
        match self {
            Self::Rectangular => rectangular::prerender(tree),
            Self::Circular => circular::prerender(tree),
            Self::Radial => radial::prerender(tree),
            Self::Diagonal => diagonal::prerender(tree),
        }
    }

    pub fn branch_scaling_axis(self) -> Option<ScalingAxis> {
        match self {
            Self::Rectangular => Some(ScalingAxis::X),
            Self::Circular | Self::Radial => Some(ScalingAxis::Both),
            // diagonal ignores branch lengths entirely
            Self::Diagonal => None,
        }
    }

    /// One unit of leaf spacing in world coordinates, used to pad node
    /// bounds and to derive font sizes.
    pub(crate) fn step(self, tree: &Tree) -> f32 {
        let leaves = tree.leaves.len().max(1) as f32;
        match self {
            Self::Rectangular | Self::Diagonal => (tree.canvas_height / (leaves + 2.0)).max(1.0),
            Self::Circular | Self::Radial => {
                let rim = tree.max_branch_length as f32 * tree.branch_scalar;
                (super::FULL_TURN * rim / leaves).max(1.0)
            }
        }
    }

    /// Radius of the summary marker replacing a collapsed subtree of
    /// `count` leaves.
    pub fn scale_collapsed_node(self, count: f32) -> f32 {
        match self {
            Self::Rectangular | Self::Diagonal => count.clamp(4.0, 80.0),
            Self::Circular | Self::Radial => (count * 0.5).clamp(4.0, 80.0),
        }
    }

    /// Text size derived from the vertical spacing available per leaf.
    pub fn calculate_font_size(self, ystep: f32) -> f32 {
        match self {
            Self::Rectangular | Self::Diagonal => (ystep / 2.0).min(15.0),
            Self::Circular | Self::Radial => (ystep / 2.0).min(12.0),
        }
    }

    /// Offset pushing a leaf label out to the ragged-alignment edge.
    pub(crate) fn label_offset(self, tree: &Tree, id: NodeId) -> f32 {
        match self {
            Self::Rectangular | Self::Diagonal => {
                let max_x = tree
                    .leaves
                    .iter()
                    .map(|&leaf| tree.nodes[leaf].centerx)
                    .fold(f32::NEG_INFINITY, f32::max);
                if max_x.is_finite() {
                    (max_x - tree.nodes[id].centerx).max(0.0)
                } else {
                    0.0
                }
            }
            Self::Circular | Self::Radial => {
                let distance = |node: &super::Branch| node.centerx.hypot(node.centery);
                let max_r = tree
                    .leaves
                    .iter()
                    .map(|&leaf| distance(&tree.nodes[leaf]))
                    .fold(f32::NEG_INFINITY, f32::max);
                if max_r.is_finite() {
                    (max_r - distance(&tree.nodes[id])).max(0.0)
                } else {
                    0.0
                }
            }
        }
    }

    /// Anchor position of an aligned label: the node center displaced by
    /// the alignment offset along the branch angle.
    pub(crate) fn label_align_point(self, tree: &Tree, id: NodeId) -> (f32, f32) {
        let offset = self.label_offset(tree, id);
        let node = &tree.nodes[id];
        (
            node.centerx + offset * node.angle.cos(),
            node.centery + offset * node.angle.sin(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{LoadOptions, NEWICK};
    use crate::tree::Tree;

    fn built(newick: &str, tree_type: TreeType) -> Tree {
        let mut tree = Tree::new();
        tree.tree_type = tree_type;
        tree.build(newick, &NEWICK, &LoadOptions::default(), None);
        tree
    }

    #[test]
    fn unknown_type_names_are_rejected() {
        assert!(TreeType::from_name("hierarchical").is_err());
        for tree_type in TreeType::ALL {
            assert_eq!(TreeType::from_name(tree_type.name()).unwrap(), tree_type);
        }
    }

    #[test]
    fn rectangular_orders_leaves_and_scales_x() {
        let tree = built("((A:1,B:2):0.5,C:3);", TreeType::Rectangular);
        let ys: Vec<f32> = tree
            .leaves
            .iter()
            .map(|&leaf| tree.nodes[leaf].centery)
            .collect();
        assert!(ys.windows(2).all(|pair| pair[0] < pair[1]));

        for &leaf in &tree.leaves {
            let expected =
                tree.nodes[leaf].total_branch_length as f32 * tree.branch_scalar;
            assert!((tree.nodes[leaf].centerx - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn circular_records_child_angle_span() {
        let tree = built("((A:1,B:2):0.5,C:3);", TreeType::Circular);
        let root = tree.root.unwrap();
        let root_node = &tree.nodes[root];
        assert!(root_node.min_child_angle <= root_node.max_child_angle);
        for &child in &root_node.children {
            let angle = tree.nodes[child].angle;
            assert!(angle >= root_node.min_child_angle - 1e-5);
            assert!(angle <= root_node.max_child_angle + 1e-5);
        }
    }

    #[test]
    fn circular_leaves_sit_on_the_rim() {
        let tree = built("((A:1,B:2):0.5,C:3);", TreeType::Circular);
        let rim = tree.max_branch_length as f32 * tree.branch_scalar;
        for &leaf in &tree.leaves {
            let node = &tree.nodes[leaf];
            assert!((node.centerx.hypot(node.centery) - rim).abs() < 1e-2);
            // the true branch end sits at the node's own radius
            let true_r = node.total_branch_length as f32 * tree.branch_scalar;
            assert!((node.interx.hypot(node.intery) - true_r).abs() < 1e-2);
        }
    }

    #[test]
    fn radial_children_start_at_parent_position() {
        let tree = built("((A:1,B:2):0.5,C:3);", TreeType::Radial);
        for id in 0..tree.nodes.len() {
            if let Some(parent) = tree.nodes[id].parent {
                assert!((tree.nodes[id].startx - tree.nodes[parent].centerx).abs() < 1e-4);
                assert!((tree.nodes[id].starty - tree.nodes[parent].centery).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn diagonal_ignores_branch_lengths() {
        let short = built("((A:1,B:1.5):0.5,C:9);", TreeType::Diagonal);
        let a = short.node_by_id("A").unwrap();
        let c = short.node_by_id("C").unwrap();
        // both leaves align to the same column regardless of length
        assert!((short.nodes[a].centerx - short.nodes[c].centerx).abs() < 1e-4);
    }

    #[test]
    fn prerender_is_idempotent() {
        for tree_type in TreeType::ALL {
            let mut tree = built("((A:1,B:2):0.5,C:3);", tree_type);
            let before: Vec<(f32, f32, f32)> = tree
                .nodes
                .iter()
                .map(|node| (node.centerx, node.centery, node.angle))
                .collect();
            tree_type.prerender(&mut tree);
            let after: Vec<(f32, f32, f32)> = tree
                .nodes
                .iter()
                .map(|node| (node.centerx, node.centery, node.angle))
                .collect();
            assert_eq!(before, after, "{}", tree_type.name());
        }
    }
}
