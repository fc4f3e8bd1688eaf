use std::time::{Duration, Instant};

use super::events::TreeEvent;
use super::layout::{ScalingAxis, TreeType};
use super::{BranchFlag, DisplayOptions, NodeId, Tooltip, Tree};

/// Wheel events inside this window are dropped, coalescing a fast scroll
/// into at most one transform update per window.
pub const WHEEL_COOLDOWN: Duration = Duration::from_millis(128);

/// Pointer travel below this (device pixels) is a click, not a drag.
pub const DRAG_DEADBAND: f32 = 5.0;

impl Tree {
    /// Inverse viewport transform: logical pointer position to world.
    pub fn translate_point(&self, x: f32, y: f32) -> (f32, f32) {
        let ratio = self.pixel_ratio;
        (
            (x * ratio - self.offsetx * ratio) / self.zoom,
            (y * ratio - self.offsety * ratio) / self.zoom,
        )
    }

    /// Hit-test `(x, y)` in world coordinates against the subtree at `id`.
    /// Children are tried in reverse order so nodes painted later, on top,
    /// win ties.
    pub fn clicked_node(&self, id: NodeId, x: f32, y: f32) -> Option<NodeId> {
        let node = &self.nodes[id];
        if x < node.maxx && x > node.minx && y < node.maxy && y > node.miny {
            return Some(id);
        }
        for &child in node.children.iter().rev() {
            if let Some(hit) = self.clicked_node(child, x, y) {
                return Some(hit);
            }
        }
        None
    }

    /// Node under a logical pointer position, if any.
    pub fn node_at_point(&self, x: f32, y: f32) -> Option<NodeId> {
        let root = self.root?;
        let (wx, wy) = self.translate_point(x, y);
        self.clicked_node(root, wx, wy)
    }

    /// Primary-button click. A release that ends a drag is swallowed; a
    /// hit toggles or cascades the click flag depending on the multi-select
    /// modifier; a miss clears the selection when configured to. Exactly
    /// one update event is fired per processed click.
    pub fn clicked(&mut self, x: f32, y: f32, multi_select_modifier: bool) {
        if self.dragging {
            self.dragging = false;
            return;
        }
        let Some(root) = self.root else {
            return;
        };
        if !self.drawn {
            return;
        }

        let flag = self.click_flag;
        let predicate = self.click_flag_predicate.clone();
        let multi = self.multi_select && multi_select_modifier;
        let hit = self.node_at_point(x, y);
        let mut node_ids = Vec::new();

        match hit {
            Some(id) if self.nodes[id].interactive => {
                if multi {
                    if self.nodes[id].leaf() {
                        let value = !self.nodes[id].flag(flag);
                        self.nodes[id].set_flag(flag, value);
                    } else if self.internal_nodes_selectable {
                        // select all if any descendant is unflagged, else clear
                        let some_unflagged = self
                            .child_properties(id, &|branch| branch.flag(flag))
                            .iter()
                            .any(|&flagged| !flagged);
                        self.cascade_flag(id, flag, some_unflagged, predicate.as_deref());
                    }
                    node_ids = self.get_node_ids_with_flag(flag, true);
                    self.draw(false);
                } else {
                    self.cascade_flag(root, flag, false, predicate.as_deref());
                    if self.internal_nodes_selectable || self.nodes[id].leaf() {
                        self.cascade_flag(id, flag, true, predicate.as_deref());
                        node_ids = self.child_ids(id);
                    }
                    self.draw(false);
                }
            }
            _ => {
                if self.unselect_on_click_away && !self.dragging && !multi {
                    self.cascade_flag(root, flag, false, predicate.as_deref());
                    self.draw(false);
                }
            }
        }

        if !self.pickedup {
            self.dragging = false;
        }
        self.nodes_updated(node_ids, flag);
    }

    /// Double-click: drop any selection below the node, then fold or
    /// unfold it.
    pub fn dbl_clicked(&mut self, x: f32, y: f32) {
        if self.root.is_none() || !self.drawn {
            return;
        }
        if let Some(id) = self.node_at_point(x, y) {
            self.cascade_flag(id, BranchFlag::Selected, false, None);
            self.nodes[id].toggle_collapsed();
        }
        if !self.pickedup {
            self.dragging = false;
        }
        self.draw(false);
    }

    /// Pointer move without a button down: exactly one node is hovered at
    /// a time, and internal nodes outside collapsed subtrees surface a
    /// tooltip with their descendant count.
    pub fn on_hover(&mut self, x: f32, y: f32) {
        let Some(root) = self.root else {
            return;
        };
        if !self.drawn {
            return;
        }

        let hit = self.node_at_point(x, y);
        match hit {
            Some(id)
                if self.nodes[id].interactive
                    && (self.internal_nodes_selectable || self.nodes[id].leaf()) =>
            {
                self.cascade_flag(root, BranchFlag::Hovered, false, None);
                self.nodes[id].hovered = true;
                self.hovering = true;
                if !self.nodes[id].leaf() && !self.has_collapsed_ancestor(id) {
                    self.tooltip = Some(Tooltip {
                        node: id,
                        child_count: self.child_count(id),
                        x,
                        y,
                    });
                } else {
                    self.tooltip = None;
                }
                self.draw(false);
            }
            _ => {
                if self.hovering {
                    self.hovering = false;
                    self.cascade_flag(root, BranchFlag::Hovered, false, None);
                    self.tooltip = None;
                    self.draw(false);
                }
            }
        }
    }

    /// Begin a potential drag: remember where the viewport and the pointer
    /// started.
    pub fn pickup(&mut self, x: f32, y: f32) {
        if !self.drawn {
            return;
        }
        self.origx = self.offsetx;
        self.origy = self.offsety;
        self.pickedup = true;
        self.startx = x;
        self.starty = y;
    }

    /// Pointer move with the button down. Inside the deadband the gesture
    /// still counts as a click; beyond it the viewport pans.
    pub fn drag(&mut self, x: f32, y: f32) {
        if !self.drawn || !self.pickedup {
            return;
        }
        let ratio = self.pixel_ratio;
        let xmove = (x - self.startx) * ratio;
        let ymove = (y - self.starty) * ratio;
        if xmove.abs() + ymove.abs() > DRAG_DEADBAND {
            self.dragging = true;
            self.offsetx = self.origx + xmove / ratio;
            self.offsety = self.origy + ymove / ratio;
            self.draw(false);
        }
    }

    /// Button release; drops the move tracking.
    pub fn drop_pointer(&mut self) {
        if !self.drawn {
            return;
        }
        self.pickedup = false;
    }

    /// One wheel notch: zoom a fixed log step, or with the modifier held,
    /// scale branch lengths multiplicatively around the pointer. Events
    /// inside the cooldown window are dropped.
    pub fn scroll(&mut self, delta: f32, branch_modifier: bool, x: f32, y: f32) {
        if !self.drawn || delta == 0.0 {
            return;
        }
        if let Some(last) = self.last_wheel {
            if last.elapsed() < WHEEL_COOLDOWN {
                return;
            }
        }

        let sign = if delta > 0.0 { 1.0f32 } else { -1.0f32 };
        if self.branch_scaling && branch_modifier {
            self.current_branch_scale *= self.branch_scaling_step.powf(sign);
            let scale = self.current_branch_scale;
            self.set_branch_scale(scale, Some((x, y)));
        } else {
            let new_zoom = self.zoom.log10() + sign * self.zoom_factor;
            self.set_zoom(new_zoom, Some((x, y)));
        }
        self.last_wheel = Some(Instant::now());
    }

    /// Set the zoom from a log-scale control value in the open interval
    /// (-2, 2); out-of-range calls are no-ops. The zoom point stays fixed
    /// on screen.
    pub fn set_zoom(&mut self, z: f32, point: Option<(f32, f32)>) {
        if z > -2.0 && z < 2.0 {
            let (px, py) = point.unwrap_or((self.canvas_width / 2.0, self.canvas_height / 2.0));
            let old_zoom = self.zoom;
            let new_zoom = 10f32.powf(z);
            self.zoom = new_zoom;
            self.offsetx = zoomed_offset(self.offsetx, px, old_zoom, new_zoom);
            self.offsety = zoomed_offset(self.offsety, py, old_zoom, new_zoom);
            self.draw(false);
        }
    }

    /// Stretch branch-length-driven spacing without changing the overall
    /// zoom, anchored at `point` along the layout's scaling axis. Layouts
    /// that ignore branch lengths ignore this too.
    pub fn set_branch_scale(&mut self, scale: f32, point: Option<(f32, f32)>) {
        let Some(axis) = self.tree_type.branch_scaling_axis() else {
            return;
        };
        if scale < 0.0 {
            return;
        }

        let previous = self.branch_scalar.max(f32::EPSILON);
        self.current_branch_scale = scale;
        self.branch_scalar = self.initial_branch_scalar * scale;
        let ratio = self.branch_scalar / previous;
        let (px, py) = point.unwrap_or((self.canvas_width / 2.0, self.canvas_height / 2.0));

        match axis {
            ScalingAxis::X => {
                self.offsetx += scaled_anchor_shift(self.offsetx, px, ratio);
            }
            ScalingAxis::Both => {
                self.offsetx += scaled_anchor_shift(self.offsetx, px, ratio);
                self.offsety += scaled_anchor_shift(self.offsety, py, ratio);
            }
        }
        self.draw(true);
    }

    /// Swap the active layout family by name. Unknown names fire a
    /// recoverable error and leave the current strategy active.
    pub fn set_tree_type(&mut self, name: &str) {
        let new_type = match TreeType::from_name(name) {
            Ok(tree_type) => tree_type,
            Err(err) => {
                self.load_error(err.to_string());
                return;
            }
        };
        let old = self.tree_type;
        self.tree_type = new_type;
        if self.drawn {
            self.drawn = false;
            self.draw(false);
        }
        self.fire(TreeEvent::TreeTypeChanged {
            old,
            new: new_type,
        });
    }

    pub fn set_node_size(&mut self, size: f32) {
        self.base_node_size = size;
        self.draw(false);
    }

    pub fn set_text_size(&mut self, size: f32) {
        self.text_size = size;
        self.draw(false);
    }

    pub fn set_font(&mut self, font: &str) {
        if font.parse::<f64>().is_ok() {
            return;
        }
        self.font = font.to_string();
        self.draw(false);
    }

    /// Derive the label size from the layout's vertical spacing.
    pub fn set_font_size(&mut self, ystep: f32) {
        self.text_size = self.tree_type.calculate_font_size(ystep);
    }

    /// Replace the selection with the subtrees of the listed node ids.
    pub fn select_nodes<S: AsRef<str>>(&mut self, ids: &[S]) {
        let Some(root) = self.root else {
            return;
        };
        self.cascade_flag(root, BranchFlag::Selected, false, None);
        for id in ids {
            if let Some(node) = self.node_by_id(id.as_ref()) {
                self.cascade_flag(node, BranchFlag::Selected, true, None);
            }
        }
        self.draw(false);
    }

    pub fn select_nodes_csv(&mut self, csv: &str) {
        let ids: Vec<&str> = csv.split(',').map(str::trim).collect();
        self.select_nodes(&ids);
    }

    /// Apply a partial style update to the listed nodes.
    pub fn set_node_display<S: AsRef<str>>(&mut self, ids: &[S], options: &DisplayOptions) {
        let mut touched = false;
        for id in ids {
            if let Some(node) = self.node_by_id(id.as_ref()) {
                self.nodes[node].set_display(options);
                touched = true;
            }
        }
        if touched {
            self.draw(false);
        }
    }

    pub fn set_node_display_csv(&mut self, csv: &str, options: &DisplayOptions) {
        let ids: Vec<&str> = csv.split(',').map(str::trim).collect();
        self.set_node_display(&ids, options);
    }

    pub fn clear_select(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        self.cascade_flag(root, BranchFlag::Selected, false, None);
        self.draw(false);
    }

    pub fn display_labels(&mut self) {
        self.show_labels = true;
        self.draw(false);
    }

    pub fn hide_labels(&mut self) {
        self.show_labels = false;
        self.draw(false);
    }

    pub fn toggle_labels(&mut self) {
        self.show_labels = !self.show_labels;
        self.draw(false);
    }
}

fn zoomed_offset(offset: f32, point: f32, old_zoom: f32, new_zoom: f32) -> f32 {
    -((((-offset) + point) / old_zoom * new_zoom) - point)
}

fn scaled_anchor_shift(offset: f32, point: f32, ratio: f32) -> f32 {
    let new_position = (point - offset) * ratio + offset;
    point - new_position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{LoadOptions, NEWICK};

    fn built(newick: &str) -> Tree {
        let mut tree = Tree::new();
        tree.build(newick, &NEWICK, &LoadOptions::default(), None);
        tree
    }

    #[test]
    fn zoom_is_invertible_inside_the_valid_range() {
        let mut tree = built("((A:1,B:2):0.5,C:3);");
        for z in [-1.5f32, -0.4, 0.0, 0.7, 1.9] {
            tree.set_zoom(z, None);
            assert!((tree.zoom - 10f32.powf(z)).abs() < 1e-4, "z = {z}");
        }
    }

    #[test]
    fn out_of_range_zoom_is_a_noop() {
        let mut tree = built("((A:1,B:2):0.5,C:3);");
        tree.set_zoom(0.5, None);
        let before = tree.zoom;
        tree.set_zoom(2.0, None);
        tree.set_zoom(-2.0, None);
        tree.set_zoom(7.3, None);
        assert_eq!(tree.zoom, before);
    }

    #[test]
    fn overlapping_hits_resolve_to_the_later_sibling() {
        let mut tree = built("(A:1,B:2);");
        let root = tree.root.unwrap();
        let a = tree.node_by_id("A").unwrap();
        let b = tree.node_by_id("B").unwrap();

        // keep the root's box away from the probe, overlap the leaves
        tree.nodes[root].minx = 1000.0;
        tree.nodes[root].maxx = 1001.0;
        tree.nodes[root].miny = 1000.0;
        tree.nodes[root].maxy = 1001.0;
        for id in [a, b] {
            tree.nodes[id].minx = -1.0;
            tree.nodes[id].maxx = 1.0;
            tree.nodes[id].miny = -1.0;
            tree.nodes[id].maxy = 1.0;
        }

        assert_eq!(tree.clicked_node(root, 0.0, 0.0), Some(b));
    }

    #[test]
    fn plain_click_selects_the_subtree_and_fires_one_update() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut tree = built("((A:1,B:2)X:0.5,C:3);");
        let updates: Rc<RefCell<Vec<Vec<String>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&updates);
        tree.add_listener(move |event| {
            if let TreeEvent::NodesUpdated { node_ids, .. } = event {
                sink.borrow_mut().push(node_ids.clone());
            }
        });

        // click the internal node X through the viewport transform
        let x = tree.node_by_id("X").unwrap();
        let world = (
            (tree.nodes[x].minx + tree.nodes[x].maxx) / 2.0,
            (tree.nodes[x].miny + tree.nodes[x].maxy) / 2.0,
        );
        let screen = tree.to_screen(world.0, world.1);
        let (lx, ly) = (
            screen.x / tree.pixel_ratio,
            screen.y / tree.pixel_ratio,
        );
        tree.clicked(lx, ly, false);

        let mut selected = tree.get_selected_node_ids();
        selected.sort();
        assert_eq!(selected, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(updates.borrow().len(), 1);
        assert_eq!(updates.borrow()[0].len(), 2);
    }

    #[test]
    fn multi_select_click_on_internal_selects_all_unless_all_selected() {
        let mut tree = built("((A:1,B:2)X:0.5,C:3);");
        let x = tree.node_by_id("X").unwrap();
        let world = (
            (tree.nodes[x].minx + tree.nodes[x].maxx) / 2.0,
            (tree.nodes[x].miny + tree.nodes[x].maxy) / 2.0,
        );
        let screen = tree.to_screen(world.0, world.1);
        let (lx, ly) = (screen.x / tree.pixel_ratio, screen.y / tree.pixel_ratio);

        // first modified click: some descendants unselected -> select all
        tree.clicked(lx, ly, true);
        assert_eq!(tree.get_selected_node_ids().len(), 2);
        // second: everything selected -> clear
        tree.clicked(lx, ly, true);
        assert!(tree.get_selected_node_ids().is_empty());
    }

    #[test]
    fn empty_space_click_clears_selection() {
        let mut tree = built("((A:1,B:2):0.5,C:3);");
        tree.select_nodes(&["A"]);
        assert!(!tree.get_selected_node_ids().is_empty());
        tree.clicked(-10_000.0, -10_000.0, false);
        assert!(tree.get_selected_node_ids().is_empty());
    }

    #[test]
    fn drag_below_the_deadband_stays_a_click() {
        let mut tree = built("((A:1,B:2):0.5,C:3);");
        let (ox, oy) = (tree.offsetx, tree.offsety);
        tree.pickup(100.0, 100.0);
        tree.drag(101.0, 101.0);
        assert!(!tree.dragging);
        assert_eq!((tree.offsetx, tree.offsety), (ox, oy));

        tree.drag(140.0, 100.0);
        assert!(tree.dragging);
        assert!((tree.offsetx - (ox + 40.0)).abs() < 1e-4);
        tree.drop_pointer();
        assert!(!tree.pickedup);
    }

    #[test]
    fn wheel_events_inside_the_cooldown_are_dropped() {
        let mut tree = built("((A:1,B:2):0.5,C:3);");
        let before = tree.zoom;
        tree.scroll(1.0, false, 200.0, 200.0);
        let after_first = tree.zoom;
        assert!(after_first > before);
        // immediate second notch is swallowed by the cooldown
        tree.scroll(1.0, false, 200.0, 200.0);
        assert_eq!(tree.zoom, after_first);
    }

    #[test]
    fn unknown_tree_type_keeps_the_current_strategy() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut tree = built("((A:1,B:2):0.5,C:3);");
        let errors = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&errors);
        tree.add_listener(move |event| {
            if matches!(event, TreeEvent::Error { .. }) {
                *sink.borrow_mut() += 1;
            }
        });

        let before = tree.tree_type;
        tree.set_tree_type("hierarchical");
        assert_eq!(tree.tree_type, before);
        assert_eq!(*errors.borrow(), 1);

        tree.set_tree_type("circular");
        assert_eq!(tree.tree_type, TreeType::Circular);
    }

    #[test]
    fn double_click_toggles_collapse_and_clears_subtree_selection() {
        let mut tree = built("((A:1,B:2)X:0.5,C:3);");
        tree.select_nodes(&["A"]);
        let x = tree.node_by_id("X").unwrap();
        let world = (
            (tree.nodes[x].minx + tree.nodes[x].maxx) / 2.0,
            (tree.nodes[x].miny + tree.nodes[x].maxy) / 2.0,
        );
        let screen = tree.to_screen(world.0, world.1);
        tree.dbl_clicked(screen.x / tree.pixel_ratio, screen.y / tree.pixel_ratio);
        assert!(tree.nodes[x].collapsed);
        assert!(tree.get_selected_node_ids().is_empty());
    }

    #[test]
    fn hover_is_exclusive_and_surfaces_a_tooltip_on_internals() {
        let mut tree = built("((A:1,B:2)X:0.5,C:3);");
        let x = tree.node_by_id("X").unwrap();
        let world = (
            (tree.nodes[x].minx + tree.nodes[x].maxx) / 2.0,
            (tree.nodes[x].miny + tree.nodes[x].maxy) / 2.0,
        );
        let screen = tree.to_screen(world.0, world.1);
        tree.on_hover(screen.x / tree.pixel_ratio, screen.y / tree.pixel_ratio);

        assert!(tree.nodes[x].hovered);
        assert_eq!(tree.nodes.iter().filter(|node| node.hovered).count(), 1);
        let tooltip = tree.tooltip.expect("internal node hover opens a tooltip");
        assert_eq!(tooltip.child_count, 2);

        tree.on_hover(-10_000.0, -10_000.0);
        assert!(tree.tooltip.is_none());
        assert!(!tree.nodes[x].hovered);
    }
}
