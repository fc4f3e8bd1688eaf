use crate::tree::{NodeId, Tree};

/// Slanted cladogram: branch lengths are ignored, every leaf aligns to the
/// right-hand column and internal nodes sit at the vertical midpoint of
/// their children, pushed left by their height in edges.
pub(super) fn prerender(tree: &mut Tree) {
    let Some(root) = tree.root else {
        return;
    };

    let leaves = tree.leaves.len().max(1) as f32;
    let ystep = (tree.canvas_height / (leaves + 2.0)).max(1.0);
    let max_height = node_height(tree, root).max(1);
    let xstep = tree.canvas_width / max_height as f32;
    tree.set_font_size(ystep);

    let mut leaf_index = 0usize;
    assign_centers(tree, root, ystep, xstep, &mut leaf_index);
    assign_connectors(tree, root);
}

/// Longest edge count from `id` down to any leaf.
fn node_height(tree: &Tree, id: NodeId) -> usize {
    tree.nodes[id]
        .children
        .iter()
        .map(|&child| node_height(tree, child) + 1)
        .max()
        .unwrap_or(0)
}

fn assign_centers(
    tree: &mut Tree,
    id: NodeId,
    ystep: f32,
    xstep: f32,
    leaf_index: &mut usize,
) -> f32 {
    let centerx = tree.canvas_width - node_height(tree, id) as f32 * xstep;

    let centery = if tree.nodes[id].leaf() {
        let y = *leaf_index as f32 * ystep;
        *leaf_index += 1;
        y
    } else {
        let children = tree.nodes[id].children.clone();
        let mut first = f32::INFINITY;
        let mut last = f32::NEG_INFINITY;
        for child in children {
            let y = assign_centers(tree, child, ystep, xstep, leaf_index);
            first = first.min(y);
            last = last.max(y);
        }
        (first + last) / 2.0
    };

    let node = &mut tree.nodes[id];
    node.centerx = centerx;
    node.centery = centery;
    node.angle = 0.0;
    centery
}

fn assign_connectors(tree: &mut Tree, id: NodeId) {
    let (px, py) = match tree.nodes[id].parent {
        Some(parent) => (tree.nodes[parent].centerx, tree.nodes[parent].centery),
        None => (tree.nodes[id].centerx, tree.nodes[id].centery),
    };
    let node = &mut tree.nodes[id];
    node.startx = px;
    node.starty = py;
    node.interx = node.centerx;
    node.intery = node.centery;

    let children = tree.nodes[id].children.clone();
    for child in children {
        assign_connectors(tree, child);
    }
}
