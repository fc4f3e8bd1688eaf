use crate::tree::{NodeId, Tree, FULL_TURN};

/// Equal-angle radial layout: each subtree receives an angular wedge
/// proportional to its share of descendant leaves; nodes branch outward
/// from the root at the origin along the wedge's mid-angle.
pub(super) fn prerender(tree: &mut Tree) {
    let Some(root) = tree.root else {
        return;
    };
    if tree.max_branch_length <= 0.0 {
        return;
    }

    let leaves = tree.leaves.len().max(1) as f32;
    let rim = tree.canvas_width.min(tree.canvas_height) / 2.0;

    tree.initial_branch_scalar = rim / tree.max_branch_length as f32;
    tree.branch_scalar = tree.initial_branch_scalar * tree.current_branch_scale;
    tree.set_font_size(FULL_TURN / leaves * rim);

    assign(tree, root, 0.0, FULL_TURN, (0.0, 0.0));
}

fn assign(tree: &mut Tree, id: NodeId, start_angle: f32, end_angle: f32, parent: (f32, f32)) {
    let mut span = end_angle - start_angle;
    if span <= f32::EPSILON {
        span = FULL_TURN;
    }
    let mid_angle = start_angle + span / 2.0;
    let length = tree.nodes[id].branch_length as f32 * tree.branch_scalar;

    let (sin, cos) = mid_angle.sin_cos();
    let position = if tree.nodes[id].parent.is_some() {
        (parent.0 + length * cos, parent.1 + length * sin)
    } else {
        parent
    };

    {
        let node = &mut tree.nodes[id];
        node.angle = mid_angle;
        node.startx = parent.0;
        node.starty = parent.1;
        node.centerx = position.0;
        node.centery = position.1;
        node.interx = position.0;
        node.intery = position.1;
    }

    let children = tree.nodes[id].children.clone();
    if children.is_empty() {
        return;
    }

    let total_leaves: usize = children
        .iter()
        .map(|&child| tree.child_count(child).max(1))
        .sum::<usize>()
        .max(1);

    let mut current = start_angle;
    let mut min_angle = f32::INFINITY;
    let mut max_angle = f32::NEG_INFINITY;
    for child in children {
        let fraction = tree.child_count(child).max(1) as f32 / total_leaves as f32;
        let child_span = span * fraction;
        assign(tree, child, current, current + child_span, position);
        min_angle = min_angle.min(tree.nodes[child].angle);
        max_angle = max_angle.max(tree.nodes[child].angle);
        current += child_span;
    }

    tree.nodes[id].min_child_angle = min_angle;
    tree.nodes[id].max_child_angle = max_angle;
}
