use crate::tree::{NodeId, Tree, FULL_TURN};

/// Circular layout: the root sits at the origin, leaves are spread at even
/// angles around the full circle and projected onto the outer rim; the
/// point where the true branch length ends is kept as the connector's
/// colour-switch point.
///
/// Keeping the root at the origin lets the connector renderer draw child
/// span arcs around `(0, 0)` at each node's radius.
pub(super) fn prerender(tree: &mut Tree) {
    let Some(root) = tree.root else {
        return;
    };
    if tree.max_branch_length <= 0.0 {
        return;
    }

    let leaves = tree.leaves.len().max(1) as f32;
    let angle_step = FULL_TURN / leaves;
    let rim = tree.canvas_width.min(tree.canvas_height) / 2.0;

    tree.initial_branch_scalar = rim / tree.max_branch_length as f32;
    tree.branch_scalar = tree.initial_branch_scalar * tree.current_branch_scale;
    tree.set_font_size(angle_step * rim);

    let mut leaf_index = 0usize;
    assign_angles(tree, root, angle_step, &mut leaf_index);
    assign_positions(tree, root);
}

fn assign_angles(tree: &mut Tree, id: NodeId, angle_step: f32, leaf_index: &mut usize) -> f32 {
    if tree.nodes[id].leaf() {
        let angle = *leaf_index as f32 * angle_step;
        *leaf_index += 1;
        tree.nodes[id].angle = angle;
        return angle;
    }

    let children = tree.nodes[id].children.clone();
    let mut min_angle = f32::INFINITY;
    let mut max_angle = f32::NEG_INFINITY;
    for child in children {
        let angle = assign_angles(tree, child, angle_step, leaf_index);
        min_angle = min_angle.min(angle);
        max_angle = max_angle.max(angle);
    }

    let node = &mut tree.nodes[id];
    node.min_child_angle = min_angle;
    node.max_child_angle = max_angle;
    node.angle = (min_angle + max_angle) / 2.0;
    node.angle
}

fn assign_positions(tree: &mut Tree, id: NodeId) {
    let scalar = tree.branch_scalar;
    let rim = tree.max_branch_length as f32 * scalar;

    let parent_radius = match tree.nodes[id].parent {
        Some(parent) => tree.nodes[parent].total_branch_length as f32 * scalar,
        None => 0.0,
    };
    let radius = tree.nodes[id].total_branch_length as f32 * scalar;

    let node = &mut tree.nodes[id];
    let (sin, cos) = node.angle.sin_cos();
    node.startx = parent_radius * cos;
    node.starty = parent_radius * sin;

    if node.leaf() {
        // project leaves onto the rim; the inter point marks where the
        // true branch ends and the extension segment begins
        node.interx = radius * cos;
        node.intery = radius * sin;
        node.centerx = rim * cos;
        node.centery = rim * sin;
    } else {
        node.centerx = radius * cos;
        node.centery = radius * sin;
        node.interx = node.centerx;
        node.intery = node.centery;
    }

    let children = tree.nodes[id].children.clone();
    for child in children {
        assign_positions(tree, child);
    }
}
