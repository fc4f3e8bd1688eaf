use eframe::egui::Color32;

use super::layout::TreeType;
use super::scene::{SceneGraph, ScenePrimitive, StrokeStyle};
use super::{NodeId, Tree};

/// Paint the connector from a node's proximal end to its center, plus the
/// child-span arc for circular internal nodes. One strategy per layout
/// family; circular is the reference implementation.
pub(crate) fn render(tree: &Tree, id: NodeId, scene: &mut SceneGraph) {
    match tree.tree_type {
        TreeType::Circular => circular(tree, id, scene),
        TreeType::Rectangular => rectangular(tree, id, scene),
        TreeType::Radial | TreeType::Diagonal => straight(tree, id, scene),
    }
}

fn stroke(tree: &Tree, colour: Color32) -> StrokeStyle {
    StrokeStyle {
        width: tree.line_width,
        colour,
    }
}

fn circular(tree: &Tree, id: NodeId, scene: &mut SceneGraph) {
    let node = tree.branch(id);
    let colour = tree.branch_colour_of(id);
    let start = tree.to_screen(node.startx, node.starty);
    let inter = tree.to_screen(node.interx, node.intery);
    let center = tree.to_screen(node.centerx, node.centery);

    if node.leaf() {
        scene.push(ScenePrimitive::StrokeLine {
            from: start,
            to: inter,
            style: stroke(tree, colour),
        });
        // rim extension beyond the true branch end; selection re-tints it
        let extension = if node.selected {
            tree.selected_colour
        } else {
            Color32::from_black_alpha(128)
        };
        scene.push(ScenePrimitive::StrokeLine {
            from: inter,
            to: center,
            style: stroke(tree, extension),
        });
    } else {
        scene.push(ScenePrimitive::StrokeLine {
            from: start,
            to: center,
            style: stroke(tree, colour),
        });
    }

    if node.children.len() > 1 && !node.collapsed {
        let radius = node.total_branch_length as f32 * tree.branch_scalar;
        scene.push(ScenePrimitive::StrokeArc {
            center: tree.to_screen(0.0, 0.0),
            radius: tree.screen_len(radius),
            start_angle: node.min_child_angle,
            end_angle: node.max_child_angle,
            // sweep the short way round when the span wraps through zero
            anticlockwise: node.max_child_angle < node.min_child_angle,
            style: stroke(tree, colour),
        });
    }
}

fn rectangular(tree: &Tree, id: NodeId, scene: &mut SceneGraph) {
    let node = tree.branch(id);
    let colour = tree.branch_colour_of(id);
    scene.push(ScenePrimitive::StrokePolyline {
        points: vec![
            tree.to_screen(node.startx, node.starty),
            tree.to_screen(node.interx, node.intery),
            tree.to_screen(node.centerx, node.centery),
        ],
        style: stroke(tree, colour),
    });
}

fn straight(tree: &Tree, id: NodeId, scene: &mut SceneGraph) {
    let node = tree.branch(id);
    let colour = tree.branch_colour_of(id);
    scene.push(ScenePrimitive::StrokeLine {
        from: tree.to_screen(node.startx, node.starty),
        to: tree.to_screen(node.centerx, node.centery),
        style: stroke(tree, colour),
    });
}
