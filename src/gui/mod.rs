use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};
use log::{error, info};
use rfd::FileDialog;

use crate::app::AppConfig;
use crate::tree::events::TreeEvent;
use crate::tree::layout::TreeType;
use crate::tree::scene::{SceneGraph, ScenePrimitive};
use crate::tree::Tree;
use crate::{export, io};

/// eframe shell around the tree engine: translates pointer and wheel
/// input into engine calls and paints the engine's scene graph.
pub struct ArborGui {
    tree: Tree,
    events: Rc<RefCell<Vec<TreeEvent>>>,
    status: String,
    last_error: Option<String>,
    pending_path: Option<PathBuf>,
}

impl ArborGui {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let mut tree = Tree::new();
        if let Ok(tree_type) = TreeType::from_name(&config.tree_type) {
            tree.tree_type = tree_type;
        }
        tree.show_labels = config.labels;

        let events: Rc<RefCell<Vec<TreeEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        tree.add_listener(move |event| sink.borrow_mut().push(event.clone()));

        Self {
            pending_path: config.tree_path,
            tree,
            events,
            status: "no tree loaded".to_string(),
            last_error: None,
        }
    }

    fn open_file(&mut self, path: &Path) {
        match io::load_tree_file(&mut self.tree, path) {
            Ok(()) => {
                self.last_error = None;
                info!("loaded {}", path.display());
            }
            Err(err) => {
                error!("{err:#}");
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn drain_events(&mut self) {
        let events: Vec<TreeEvent> = self.events.borrow_mut().drain(..).collect();
        for event in events {
            match event {
                TreeEvent::Loaded => {
                    self.status = format!("{} leaves", self.tree.leaves.len());
                }
                TreeEvent::Error { message } => self.last_error = Some(message),
                TreeEvent::SubtreeDrawn { node } => {
                    self.status = format!("subtree rooted at {node}");
                }
                TreeEvent::TreeTypeChanged { new, .. } => {
                    self.status = format!("{} layout", new.name());
                }
                TreeEvent::NodesUpdated { node_ids, .. } => {
                    if !node_ids.is_empty() {
                        self.status = format!("{} nodes selected", node_ids.len());
                    }
                }
                TreeEvent::Loading => {}
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                let picked = FileDialog::new()
                    .add_filter("tree files", &["nwk", "tre", "tree", "newick", "txt"])
                    .pick_file();
                if let Some(path) = picked {
                    self.open_file(&path);
                }
            }

            let current = self.tree.tree_type;
            egui::ComboBox::from_id_salt("tree-type")
                .selected_text(current.name())
                .show_ui(ui, |ui| {
                    for tree_type in TreeType::ALL {
                        if ui
                            .selectable_label(current == tree_type, tree_type.name())
                            .clicked()
                            && tree_type != current
                        {
                            self.tree.set_tree_type(tree_type.name());
                        }
                    }
                });

            let mut labels = self.tree.show_labels;
            if ui.checkbox(&mut labels, "labels").changed() {
                self.tree.toggle_labels();
            }
            let mut align = self.tree.align_labels;
            if ui.checkbox(&mut align, "align").changed() {
                self.tree.align_labels = align;
                self.tree.draw(false);
            }

            if ui.button("Fit").clicked() && self.tree.drawn {
                self.tree.fit_in_panel();
                self.tree.draw(false);
            }
            if ui.button("Reset").clicked() {
                self.tree.reset_tree();
            }
            if ui.button("Export PNG").clicked() {
                let picked = FileDialog::new().set_file_name("tree.png").save_file();
                if let Some(path) = picked {
                    match export::write_png(&self.tree.scene, &path) {
                        Ok(()) => info!("wrote {}", path.display()),
                        Err(err) => self.last_error = Some(err.to_string()),
                    }
                }
            }

            ui.separator();
            ui.label(&self.status);
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(available, Sense::click_and_drag());
        let pixels_per_point = ui.ctx().pixels_per_point();

        self.tree.pixel_ratio = pixels_per_point;
        let device = available * pixels_per_point;
        if (device.x - self.tree.canvas_width).abs() > 0.5
            || (device.y - self.tree.canvas_height).abs() > 0.5
        {
            self.tree.set_size(device.x, device.y);
            self.tree.draw(false);
        }

        let to_local = |pos: Pos2| pos - rect.min.to_vec2();
        let modifiers = ui.input(|input| input.modifiers);
        let multi_select = modifiers.command || modifiers.ctrl;

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pos = to_local(pos);
                self.tree.dbl_clicked(pos.x, pos.y);
            }
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pos = to_local(pos);
                self.tree.clicked(pos.x, pos.y, multi_select);
            }
        }

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pos = to_local(pos);
                self.tree.pickup(pos.x, pos.y);
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pos = to_local(pos);
                self.tree.drag(pos.x, pos.y);
            }
        }
        if response.drag_stopped() {
            self.tree.drop_pointer();
        }

        if let Some(pos) = response.hover_pos() {
            let local = to_local(pos);
            if !response.dragged() {
                self.tree.on_hover(local.x, local.y);
            }
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll != 0.0 {
                self.tree.scroll(scroll, multi_select, local.x, local.y);
            }
        }

        paint_scene(ui.painter(), rect, &self.tree.scene, pixels_per_point);

        if let Some(tooltip) = self.tree.tooltip {
            let anchor = rect.min + Vec2::new(tooltip.x + 14.0, tooltip.y + 14.0);
            ui.painter().text(
                anchor,
                Align2::LEFT_TOP,
                format!("{} child nodes", tooltip.child_count),
                FontId::proportional(12.0),
                Color32::DARK_GRAY,
            );
        }
        if let Some(message) = &self.last_error {
            ui.painter().text(
                rect.left_bottom() + Vec2::new(8.0, -8.0),
                Align2::LEFT_BOTTOM,
                message,
                FontId::proportional(12.0),
                Color32::RED,
            );
        }
    }
}

impl eframe::App for ArborGui {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(path) = self.pending_path.take() {
            self.open_file(&path);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        self.drain_events();
    }
}

/// Paint the engine's device-pixel scene into an egui rect (logical
/// points).
fn paint_scene(painter: &egui::Painter, rect: Rect, scene: &SceneGraph, pixels_per_point: f32) {
    let map = |pos: Pos2| rect.min + Vec2::new(pos.x, pos.y) / pixels_per_point;

    for primitive in &scene.primitives {
        match primitive {
            ScenePrimitive::FillRect { rect: r, colour } => {
                painter.rect_filled(Rect::from_min_max(map(r.min), map(r.max)), 0.0, *colour);
            }
            ScenePrimitive::FillCircle {
                center,
                radius,
                colour,
            } => {
                painter.circle_filled(map(*center), radius / pixels_per_point, *colour);
            }
            ScenePrimitive::FillPolygon { points, colour } => {
                let mapped: Vec<Pos2> = points.iter().map(|p| map(*p)).collect();
                painter.add(egui::Shape::convex_polygon(mapped, *colour, Stroke::NONE));
            }
            ScenePrimitive::FillPieSlice {
                center,
                radius,
                start_angle,
                end_angle,
                colour,
            } => {
                let mut points = vec![map(*center)];
                points.extend(
                    export::arc_points(*center, *radius, *start_angle, *end_angle)
                        .into_iter()
                        .map(map),
                );
                painter.add(egui::Shape::convex_polygon(points, *colour, Stroke::NONE));
            }
            ScenePrimitive::StrokeLine { from, to, style } => {
                painter.line_segment(
                    [map(*from), map(*to)],
                    Stroke::new(style.width / pixels_per_point, style.colour),
                );
            }
            ScenePrimitive::StrokePolyline { points, style } => {
                let mapped: Vec<Pos2> = points.iter().map(|p| map(*p)).collect();
                painter.add(egui::Shape::line(
                    mapped,
                    Stroke::new(style.width / pixels_per_point, style.colour),
                ));
            }
            ScenePrimitive::StrokeCircle {
                center,
                radius,
                style,
            } => {
                painter.circle_stroke(
                    map(*center),
                    radius / pixels_per_point,
                    Stroke::new(style.width / pixels_per_point, style.colour),
                );
            }
            ScenePrimitive::StrokeArc {
                center,
                radius,
                start_angle,
                end_angle,
                anticlockwise: _,
                style,
            } => {
                let mapped: Vec<Pos2> =
                    export::arc_points(*center, *radius, *start_angle, *end_angle)
                        .into_iter()
                        .map(map)
                        .collect();
                painter.add(egui::Shape::line(
                    mapped,
                    Stroke::new(style.width / pixels_per_point, style.colour),
                ));
            }
            ScenePrimitive::Text {
                text,
                anchor,
                angle,
                align,
                size,
                colour,
            } => {
                let font = FontId::proportional(size / pixels_per_point);
                if angle.abs() < 1e-3 {
                    painter.text(map(*anchor), *align, text, font, *colour);
                } else {
                    let galley = painter.layout_no_wrap(text.clone(), font, *colour);
                    // anchor is the left-center of the rotated baseline
                    let half_height = galley.size().y / 2.0;
                    let offset = Vec2::new(half_height * angle.sin(), -half_height * angle.cos());
                    let pos = map(*anchor) + offset;
                    painter.add(
                        egui::epaint::TextShape::new(pos, galley, *colour).with_angle(*angle),
                    );
                }
            }
        }
    }
}
