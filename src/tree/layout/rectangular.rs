use crate::tree::{NodeId, Tree};

/// Classic left-to-right phylogram: leaves stacked at even vertical steps,
/// horizontal extent proportional to cumulative branch length, elbow
/// connectors through `(startx, centery)`.
pub(super) fn prerender(tree: &mut Tree) {
    let Some(root) = tree.root else {
        return;
    };
    if tree.max_branch_length <= 0.0 {
        return;
    }

    let leaves = tree.leaves.len().max(1) as f32;
    let ystep = (tree.canvas_height / (leaves + 2.0)).max(1.0);

    tree.initial_branch_scalar = tree.canvas_width / tree.max_branch_length as f32;
    tree.branch_scalar = tree.initial_branch_scalar * tree.current_branch_scale;
    tree.set_font_size(ystep);

    let mut leaf_index = 0usize;
    assign_centers(tree, root, ystep, &mut leaf_index);
    assign_connectors(tree, root);
}

fn assign_centers(tree: &mut Tree, id: NodeId, ystep: f32, leaf_index: &mut usize) -> f32 {
    let centerx = tree.nodes[id].total_branch_length as f32 * tree.branch_scalar;

    let centery = if tree.nodes[id].leaf() {
        let y = *leaf_index as f32 * ystep;
        *leaf_index += 1;
        y
    } else {
        let children = tree.nodes[id].children.clone();
        let mut first = f32::INFINITY;
        let mut last = f32::NEG_INFINITY;
        for child in children {
            let y = assign_centers(tree, child, ystep, leaf_index);
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
    node.interx = px;
    node.intery = node.centery;

    let children = tree.nodes[id].children.clone();
    for child in children {
        assign_connectors(tree, child);
    }
}
