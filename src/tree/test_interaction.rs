//! Cross-module scenario tests: build, draw, interact, export.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use eframe::egui::Color32;

use crate::parser::{LoadOptions, NEWICK};
use crate::tree::events::TreeEvent;
use crate::tree::layout::TreeType;
use crate::tree::scene::ScenePrimitive;
use crate::tree::shapes::NodeShape;
use crate::tree::{DisplayOptions, MetadataEntry, Tree};

fn built(newick: &str) -> Tree {
    let mut tree = Tree::new();
    tree.build(newick, &NEWICK, &LoadOptions::default(), None);
    tree
}

#[test]
fn three_leaf_scenario_round_trips() {
    let tree = built("(A:1,B:2,C:3);");
    let exported = tree.export_nwk();
    let rebuilt = built(&exported);

    assert_eq!(rebuilt.leaves.len(), 3);
    let lengths: Vec<f64> = rebuilt
        .leaves
        .iter()
        .map(|&leaf| rebuilt.nodes[leaf].branch_length)
        .collect();
    assert_eq!(lengths, vec![1.0, 2.0, 3.0]);
    let root = rebuilt.root.unwrap();
    assert_eq!(rebuilt.nodes[root].branch_length, 0.0);
}

#[test]
fn load_fires_loading_then_loaded() {
    let events: Rc<RefCell<Vec<TreeEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut tree = Tree::new();
    tree.add_listener(move |event| sink.borrow_mut().push(event.clone()));
    tree.load("((A:1,B:2):0.5,C:3);", &LoadOptions::default(), None);

    let events = events.borrow();
    assert_eq!(events.first(), Some(&TreeEvent::Loading));
    assert_eq!(events.last(), Some(&TreeEvent::Loaded));
}

#[test]
fn subtree_focus_detaches_and_reset_restores() {
    let events: Rc<RefCell<Vec<TreeEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut tree = built("((A:1,B:2)X:0.5,C:3);");
    tree.add_listener(move |event| sink.borrow_mut().push(event.clone()));

    let x = tree.node_by_id("X").unwrap();
    tree.redraw_from_branch(x);

    assert_eq!(tree.root, Some(x));
    assert_eq!(tree.nodes[x].parent, None);
    // the focused root's own length is zeroed for the focused view
    assert_eq!(tree.nodes[x].branch_length, 0.0);
    assert_eq!(tree.leaves.len(), 2);
    assert!(events
        .borrow()
        .iter()
        .any(|event| matches!(event, TreeEvent::SubtreeDrawn { node } if node == "X")));

    tree.reset_tree();
    let x = tree.node_by_id("X").unwrap();
    assert_eq!(tree.leaves.len(), 3);
    assert_ne!(tree.root, Some(x));
    assert_eq!(tree.nodes[x].branch_length, 0.5);
    assert!(tree.nodes[x].parent.is_some());
    assert!(tree.drawn);
}

#[test]
fn selected_leaves_tint_the_circular_rim_extension() {
    let mut tree = Tree::new();
    tree.tree_type = TreeType::Circular;
    tree.build("((A:1,B:2):0.5,C:3);", &NEWICK, &LoadOptions::default(), None);

    let untinted = tree
        .scene
        .primitives
        .iter()
        .filter(|p| {
            matches!(p, ScenePrimitive::StrokeLine { style, .. }
                if style.colour == tree.selected_colour)
        })
        .count();
    assert_eq!(untinted, 0);

    tree.select_nodes(&["A"]);
    let tinted = tree
        .scene
        .primitives
        .iter()
        .filter(|p| {
            matches!(p, ScenePrimitive::StrokeLine { style, .. }
                if style.colour == tree.selected_colour)
        })
        .count();
    assert!(tinted >= 2, "branch and rim extension are both re-tinted");
}

#[test]
fn circular_internals_draw_a_child_span_arc_until_collapsed() {
    let mut tree = Tree::new();
    tree.tree_type = TreeType::Circular;
    tree.build("(A:1,B:2,C:3);", &NEWICK, &LoadOptions::default(), None);

    let arcs = |tree: &Tree| {
        tree.scene
            .primitives
            .iter()
            .filter(|p| matches!(p, ScenePrimitive::StrokeArc { .. }))
            .count()
    };
    assert_eq!(arcs(&tree), 1);

    let root = tree.root.unwrap();
    tree.nodes[root].collapse();
    tree.draw(false);
    assert_eq!(arcs(&tree), 0);
    // the subtree is summarised by a translucent disc
    assert!(tree
        .scene
        .primitives
        .iter()
        .any(|p| matches!(p, ScenePrimitive::FillCircle { .. })));
}

#[test]
fn branch_scaling_follows_the_layout_axis() {
    let mut tree = Tree::new();
    tree.tree_type = TreeType::Rectangular;
    tree.build("((A:1,B:2):0.5,C:3);", &NEWICK, &LoadOptions::default(), None);

    let initial = tree.initial_branch_scalar;
    tree.set_branch_scale(2.0, None);
    assert!((tree.branch_scalar - initial * 2.0).abs() < 1e-4);

    // diagonal ignores branch lengths, so scaling is a no-op
    let mut diagonal = Tree::new();
    diagonal.tree_type = TreeType::Diagonal;
    diagonal.build("((A:1,B:2):0.5,C:3);", &NEWICK, &LoadOptions::default(), None);
    let before = diagonal.branch_scalar;
    diagonal.set_branch_scale(3.0, None);
    assert_eq!(diagonal.branch_scalar, before);
}

#[test]
fn metadata_colours_branches_by_dominant_category() {
    let mut tree = built("((A:1,B:2):0.5,C:3);");
    let mut metadata = HashMap::new();
    metadata.insert(
        "A".to_string(),
        vec![MetadataEntry {
            colour: Color32::RED,
            count: 5.0,
        }],
    );
    metadata.insert(
        "B".to_string(),
        vec![MetadataEntry {
            colour: Color32::BLUE,
            count: 1.0,
        }],
    );
    tree.set_metadata(&metadata);
    tree.colour_branches_by_leaf_metadata();

    let root = tree.root.unwrap();
    assert_eq!(tree.nodes[root].colour, Some(Color32::RED));
    let b = tree.node_by_id("B").unwrap();
    assert_eq!(tree.nodes[b].colour, Some(Color32::BLUE));
}

#[test]
fn set_node_display_updates_only_the_given_fields() {
    let mut tree = built("((A:1,B:2):0.5,C:3);");
    tree.set_node_display_csv(
        "A,B",
        &DisplayOptions {
            colour: Some(Color32::GREEN),
            shape: Some(NodeShape::Star),
            ..DisplayOptions::default()
        },
    );

    let a = tree.node_by_id("A").unwrap();
    assert_eq!(tree.nodes[a].colour, Some(Color32::GREEN));
    assert_eq!(tree.nodes[a].node_shape, NodeShape::Star);
    // untouched fields keep their defaults
    assert_eq!(tree.nodes[a].radius, 10.0);
    let c = tree.node_by_id("C").unwrap();
    assert_eq!(tree.nodes[c].colour, None);
}

#[test]
fn pruned_subtrees_are_left_out_of_the_scene() {
    let mut tree = built("((A:1,B:2)X:0.5,C:3);");
    let full = tree.scene.primitives.len();
    let x = tree.node_by_id("X").unwrap();
    tree.nodes[x].pruned = true;
    tree.draw(false);
    assert!(tree.scene.primitives.len() < full);
}

#[test]
fn interaction_is_a_noop_before_anything_is_drawn() {
    let mut tree = Tree::new();
    tree.clicked(10.0, 10.0, false);
    tree.dbl_clicked(10.0, 10.0);
    tree.on_hover(10.0, 10.0);
    tree.pickup(0.0, 0.0);
    tree.drag(50.0, 50.0);
    tree.drop_pointer();
    tree.scroll(1.0, false, 10.0, 10.0);
    assert!(!tree.drawn);
    assert!(tree.scene.primitives.is_empty());
}
