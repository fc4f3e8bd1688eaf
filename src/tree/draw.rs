use eframe::egui::{Align2, Color32, Pos2};

use super::scene::{SceneGraph, ScenePrimitive, StrokeStyle};
use super::shapes::{self, NodeFrame, ShapeContext};
use super::{connectors, Highlighter, NodeId, ResolvedLeafStyle, Tree, HALF_TURN, QUARTER_TURN};

/// Axis-aligned box in world coordinates, returned by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub minx: f32,
    pub miny: f32,
    pub maxx: f32,
    pub maxy: f32,
}

/// Label width approximation, in the same units as the font size. Good
/// enough for bounds and auto-fit; on-screen text is laid out by the host
/// toolkit.
pub(crate) fn approx_text_width(text: &str, font_size: f32) -> f32 {
    (text.chars().count() as f32 * font_size * 0.56).max(2.0)
}

impl Tree {
    /// World to screen: scale by zoom, then shift by the DPR-corrected pan
    /// offset.
    pub fn to_screen(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(
            x * self.zoom + self.offsetx * self.pixel_ratio,
            y * self.zoom + self.offsety * self.pixel_ratio,
        )
    }

    pub(crate) fn screen_len(&self, value: f32) -> f32 {
        value * self.zoom
    }

    /// Resolved branch colour: selection wins, then the node's own colour,
    /// then the tree default.
    pub fn branch_colour_of(&self, id: NodeId) -> Color32 {
        let node = &self.nodes[id];
        if node.selected {
            return self.selected_colour;
        }
        node.colour.unwrap_or(self.branch_colour)
    }

    fn resolve_colour(&self, id: NodeId, specified: Option<Color32>) -> Color32 {
        let node = &self.nodes[id];
        if node.selected {
            return self.selected_colour;
        }
        specified.or(node.colour).unwrap_or(self.branch_colour)
    }

    pub(crate) fn leaf_style_of(&self, id: NodeId, include_zoom: bool) -> ResolvedLeafStyle {
        let node = &self.nodes[id];
        let line_width = node.leaf_style.line_width.unwrap_or(self.line_width)
            / if include_zoom { self.zoom } else { 1.0 };
        ResolvedLeafStyle {
            line_width,
            stroke_style: self.resolve_colour(id, node.leaf_style.stroke_style),
            fill_style: self.resolve_colour(id, node.leaf_style.fill_style),
        }
    }

    pub fn text_colour_of(&self, id: NodeId) -> Color32 {
        let node = &self.nodes[id];
        if node.selected {
            return self.selected_colour;
        }
        if node.is_highlighted() {
            return self.highlight_colour;
        }
        if self.back_colour && !node.children.is_empty() {
            let child_colours = self.child_colours(id);
            if child_colours.len() == 1 {
                return child_colours[0];
            }
        }
        node.label_style
            .colour
            .or(node.colour)
            .unwrap_or(self.branch_colour)
    }

    pub fn text_size_of(&self, id: NodeId) -> f32 {
        self.nodes[id].label_style.text_size.unwrap_or(self.text_size)
    }

    pub fn label_width(&self, id: NodeId) -> f32 {
        approx_text_width(self.nodes[id].get_label(), self.text_size_of(id))
    }

    pub fn node_radius_of(&self, id: NodeId) -> f32 {
        let node = &self.nodes[id];
        if node.leaf() {
            self.base_node_size * node.radius
        } else {
            self.base_node_size / node.radius
        }
    }

    pub fn node_diameter_of(&self, id: NodeId) -> f32 {
        self.node_radius_of(id) * 2.0
    }

    fn highlight_line_width(&self, include_zoom: bool) -> f32 {
        self.highlight_width / if include_zoom { self.zoom } else { 1.0 }
    }

    fn highlight_radius(&self, id: NodeId, include_zoom: bool) -> f32 {
        let mut offset = self.highlight_line_width(include_zoom) * self.highlight_size;
        offset += self.leaf_style_of(id, include_zoom).line_width / self.highlight_size;
        if self.nodes[id].leaf() {
            self.node_radius_of(id) + offset
        } else {
            offset * 0.666
        }
    }

    fn highlight_size_of(&self, id: NodeId, include_zoom: bool) -> f32 {
        self.highlight_radius(id, include_zoom) + self.highlight_line_width(include_zoom)
    }

    pub fn has_label_connector(&self, id: NodeId) -> bool {
        if !self.align_labels {
            return false;
        }
        self.tree_type.label_offset(self, id) > self.node_diameter_of(id)
    }

    /// Where the label begins, measured from the node center along the
    /// branch angle: diameter, plus either the highlight ring allowance or
    /// half the stroke width, plus zoom-adjusted padding.
    pub fn label_start_x(&self, id: NodeId, include_zoom: bool) -> f32 {
        let line_width = self.leaf_style_of(id, include_zoom).line_width;
        let has_connector = self.has_label_connector(id);
        let highlighted = self.nodes[id].is_highlighted();

        let mut offset = self.node_diameter_of(id);
        if highlighted && !has_connector {
            offset += self.highlight_size_of(id, include_zoom) - self.node_radius_of(id);
        }
        if !highlighted && !has_connector {
            offset += line_width / 2.0;
        }

        let padding = if include_zoom {
            self.label_padding.min(self.label_padding / self.zoom)
        } else {
            self.label_padding
        };
        offset + padding
    }

    /// Total visual extent along the branch angle: node radius plus, when
    /// labels are visible, the label offset and width.
    pub(crate) fn total_label_length(&self, id: NodeId, include_zoom: bool) -> f32 {
        let mut length = self.node_radius_of(id);
        if self.show_labels || (self.hover_label && self.nodes[id].is_highlighted()) {
            length += self.label_start_x(id, include_zoom) + self.label_width(id);
        }
        length
    }

    /// Box covering the node's total visual extent, flipped for branches
    /// pointing into the left half-circle and padded by one layout step.
    pub fn node_bounds(&self, id: NodeId) -> Bounds {
        let (x, y) = if self.align_labels {
            self.tree_type.label_align_point(self, id)
        } else {
            (self.nodes[id].centerx, self.nodes[id].centery)
        };
        let node_size = self.node_radius_of(id);
        let total_length = self.total_label_length(id, false);
        let angle = self.nodes[id].angle;

        let (minx, miny, maxx, maxy);
        if angle > QUARTER_TURN && angle < HALF_TURN + QUARTER_TURN {
            minx = x + total_length * angle.cos();
            miny = y + total_length * angle.sin();
            maxx = x - node_size;
            maxy = y - node_size;
        } else {
            minx = x - node_size;
            miny = y - node_size;
            maxx = x + total_length * angle.cos();
            maxy = y + total_length * angle.sin();
        }

        let step = self.tree_type.step(self);
        Bounds {
            minx: minx.min(maxx).min(x - step),
            miny: miny.min(maxy).min(y - step),
            maxx: minx.max(maxx).max(x + step),
            maxy: miny.max(maxy).max(y + step),
        }
    }

    /// Union of every leaf's bounds; `None` while the tree is empty.
    pub fn tree_bounds(&self) -> Option<Bounds> {
        let mut leaves = self.leaves.iter();
        let first = *leaves.next()?;
        let mut union = self.node_bounds(first);
        for &leaf in leaves {
            let bounds = self.node_bounds(leaf);
            union.minx = union.minx.min(bounds.minx);
            union.miny = union.miny.min(bounds.miny);
            union.maxx = union.maxx.max(bounds.maxx);
            union.maxy = union.maxy.max(bounds.maxy);
        }
        Some(union)
    }

    /// Fit the whole tree into the canvas: zoom to the tighter of the two
    /// axis ratios, center the shorter axis, pad the longer one.
    pub fn fit_in_panel(&mut self) {
        let Some(bounds) = self.tree_bounds() else {
            return;
        };
        let canvas = (
            self.canvas_width - self.padding * 2.0,
            self.canvas_height - self.padding * 2.0,
        );
        let tree_size = (
            (bounds.maxx - bounds.minx).max(1e-6),
            (bounds.maxy - bounds.miny).max(1e-6),
        );
        let x_ratio = canvas.0 / tree_size.0;
        let y_ratio = canvas.1 / tree_size.1;
        self.zoom = x_ratio.min(y_ratio);

        self.offsetx = -bounds.minx * self.zoom;
        self.offsety = -bounds.miny * self.zoom;
        if x_ratio > y_ratio {
            self.offsetx += self.padding + (canvas.0 - tree_size.0 * self.zoom) / 2.0;
            self.offsety += self.padding;
        } else {
            self.offsetx += self.padding;
            self.offsety += self.padding + (canvas.1 - tree_size.1 * self.zoom) / 2.0;
        }
        self.offsetx /= self.pixel_ratio;
        self.offsety /= self.pixel_ratio;
    }

    /// Resize the drawing surface (device pixels). The caller decides when
    /// to redraw.
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.canvas_width = width.max(1.0);
        self.canvas_height = height.max(1.0);
    }

    /// Produce a fresh frame: run the layout if needed, auto-fit on a
    /// first draw, then walk the tree painting connectors, nodes and
    /// labels, and finally flush the deferred highlight rings so they sit
    /// above everything else.
    pub fn draw(&mut self, force_redraw: bool) {
        self.highlighters.clear();

        let Some(root) = self.root else {
            return;
        };
        if self.max_branch_length == 0.0 {
            self.load_error("all branches in the tree are identical");
            return;
        }

        if !self.drawn || force_redraw {
            self.tree_type.prerender(self);
            if !force_redraw {
                self.fit_in_panel();
            }
        }

        let mut scene = SceneGraph::new(self.canvas_width, self.canvas_height);
        self.draw_subtree(root, &mut scene);

        let highlighters = std::mem::take(&mut self.highlighters);
        for highlighter in &highlighters {
            self.draw_highlight(highlighter, &mut scene);
        }
        self.highlighters = highlighters;

        self.drawn = true;
        self.scene = scene;
    }

    fn draw_subtree(&mut self, id: NodeId, scene: &mut SceneGraph) {
        if self.nodes[id].pruned {
            return;
        }
        connectors::render(self, id, scene);
        self.draw_node(id, scene);
        if !self.nodes[id].collapsed {
            let children = self.nodes[id].children.clone();
            for child in children {
                self.draw_subtree(child, scene);
            }
        }
    }

    fn draw_node(&mut self, id: NodeId, scene: &mut SceneGraph) {
        let node_radius = self.node_radius_of(id);
        // pull the drawn center back so the shape's edge, not its middle,
        // touches the end of the branch
        let theta = node_radius;

        let node = &self.nodes[id];
        let (center_x, center_y) = if node.leaf() {
            (
                theta * node.angle.cos() + node.centerx,
                theta * node.angle.sin() + node.centery,
            )
        } else {
            (node.centerx, node.centery)
        };
        let collapsed = node.collapsed;
        let leaf = node.leaf();
        let highlighted = node.is_highlighted();

        self.set_node_dimensions(id, center_x, center_y, node_radius);

        if collapsed {
            self.draw_collapsed(id, center_x, center_y, scene);
        } else if leaf {
            self.draw_leaf(id, scene);
        }

        if highlighted {
            self.highlighters.push(Highlighter {
                node: id,
                centerx: center_x,
                centery: center_y,
            });
        }
    }

    fn set_node_dimensions(&mut self, id: NodeId, center_x: f32, center_y: f32, radius: f32) {
        let mut bounded_radius = radius;
        if radius * self.zoom < 5.0 || !self.nodes[id].leaf() {
            bounded_radius = 5.0 / self.zoom;
        }
        let node = &mut self.nodes[id];
        node.minx = center_x - bounded_radius;
        node.maxx = center_x + bounded_radius;
        node.miny = center_y - bounded_radius;
        node.maxy = center_y + bounded_radius;
    }

    /// Translucent summary disc sized by the number of hidden leaves.
    fn draw_collapsed(&self, id: NodeId, center_x: f32, center_y: f32, scene: &mut SceneGraph) {
        let leaf_count = self.child_count(id) as f32;
        let radius = self.tree_type.scale_collapsed_node(leaf_count);
        let base = self
            .default_collapsed
            .map(|range| range.colour)
            .unwrap_or(Color32::from_rgb(128, 0, 128));
        let colour =
            Color32::from_rgba_unmultiplied(base.r(), base.g(), base.b(), 77);
        scene.push(ScenePrimitive::FillCircle {
            center: self.to_screen(center_x, center_y),
            radius: self.screen_len(radius),
            colour,
        });
    }

    fn draw_leaf(&mut self, id: NodeId, scene: &mut SceneGraph) {
        let mut offset = 0.0;
        if self.align_labels {
            self.draw_label_connector(id, scene);
            offset = self.label_start_x(id, true) + self.tree_type.label_offset(self, id).abs();
        }
        if self.show_labels || (self.hover_label && self.nodes[id].is_highlighted()) {
            self.draw_label(id, scene);
        }

        let style = self.leaf_style_of(id, true);
        let radius = self.node_radius_of(id);
        let node = &self.nodes[id];
        let frame = NodeFrame::new(self, (node.centerx, node.centery), node.angle);
        let ctx = ShapeContext {
            offset: offset.abs(),
            metadata: node.metadata.as_deref(),
            rect_multiplier: self.rect_multiplier,
        };
        shapes::render(node.node_shape, scene, &frame, radius, style, &ctx);
    }

    fn draw_label_connector(&self, id: NodeId, scene: &mut SceneGraph) {
        let offset = self.tree_type.label_offset(self, id);
        if offset <= 0.0 {
            return;
        }
        let colour = if self.nodes[id].is_highlighted() {
            self.highlight_colour
        } else {
            self.branch_colour_of(id)
        };
        let node = &self.nodes[id];
        let frame = NodeFrame::new(self, (node.centerx, node.centery), node.angle);
        scene.push(ScenePrimitive::StrokeLine {
            from: frame.point(self.node_radius_of(id), 0.0),
            to: frame.point(offset + self.node_diameter_of(id), 0.0),
            style: StrokeStyle {
                width: (self.line_width / 4.0).max(0.25),
                colour,
            },
        });
    }

    fn draw_label(&mut self, id: NodeId, scene: &mut SceneGraph) {
        let font_size = self.text_size_of(id);
        let label = self.nodes[id].get_label().to_string();
        if label.is_empty() {
            return;
        }
        let label_width = self.label_width(id);

        let widest = self.max_label_width.entry(self.tree_type).or_insert(0.0);
        if label_width > *widest {
            *widest = label_width;
        }

        let mut tx = self.label_start_x(id, true);
        if self.align_labels {
            tx += self.tree_type.label_offset(self, id).abs();
        }

        let node = &self.nodes[id];
        let mut angle = node.angle;
        // keep text upright for branches pointing into the left half-circle
        if node.angle > QUARTER_TURN && node.angle < HALF_TURN + QUARTER_TURN {
            angle += HALF_TURN;
            tx = -tx - label_width;
        }

        let frame = NodeFrame::new(self, (node.centerx, node.centery), angle);
        let anchor = frame.point(tx, 0.0);
        let colour = self.text_colour_of(id);
        scene.push(ScenePrimitive::Text {
            text: label,
            anchor,
            angle,
            align: Align2::LEFT_CENTER,
            size: self.screen_len(font_size),
            colour,
        });
    }

    /// Highlight rings are painted after every node so sibling shapes can
    /// never occlude them.
    fn draw_highlight(&self, highlighter: &Highlighter, scene: &mut SceneGraph) {
        let id = highlighter.node;
        scene.push(ScenePrimitive::StrokeCircle {
            center: self.to_screen(highlighter.centerx, highlighter.centery),
            radius: self.screen_len(self.highlight_radius(id, true)),
            style: StrokeStyle {
                width: self.screen_len(self.highlight_line_width(true)),
                colour: self.highlight_colour,
            },
        });
    }
}
