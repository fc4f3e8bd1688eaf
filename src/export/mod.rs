use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use eframe::egui::Color32;
use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::tree::scene::{SceneGraph, ScenePrimitive, StrokeStyle};
use crate::tree::FULL_TURN;

const ARC_SEGMENTS: usize = 24;

/// Rasterize a scene graph onto a white pixmap of the scene's size.
///
/// Text primitives are not rasterized here; labels are laid out by the GUI
/// toolkit and the export carries the tree geometry.
pub fn render_pixmap(scene: &SceneGraph) -> Result<Pixmap> {
    let width = scene.width.round().max(1.0) as u32;
    let height = scene.height.round().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate a {width}x{height} pixmap"))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    for primitive in &scene.primitives {
        render_primitive(&mut pixmap, primitive);
    }
    Ok(pixmap)
}

pub fn png_bytes(scene: &SceneGraph) -> Result<Vec<u8>> {
    render_pixmap(scene)?
        .encode_png()
        .context("failed to encode PNG")
}

/// The current raster as a `data:image/png;base64,...` URL.
pub fn png_data_url(scene: &SceneGraph) -> Result<String> {
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(png_bytes(scene)?)
    ))
}

pub fn write_png(scene: &SceneGraph, path: &Path) -> Result<()> {
    let bytes = png_bytes(scene)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write PNG to {}", path.display()))
}

fn to_colour(colour: Color32) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(colour.r(), colour.g(), colour.b(), colour.a())
}

fn fill_paint(colour: Color32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_colour(colour));
    paint.anti_alias = true;
    paint
}

fn stroke_settings(style: &StrokeStyle) -> Stroke {
    Stroke {
        width: style.width.max(0.1),
        line_cap: LineCap::Round,
        ..Stroke::default()
    }
}

fn polygon_path(points: &[eframe::egui::Pos2], close: bool) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    let first = points.first()?;
    builder.move_to(first.x, first.y);
    for point in &points[1..] {
        builder.line_to(point.x, point.y);
    }
    if close {
        builder.close();
    }
    builder.finish()
}

/// Sample an arc as a polyline. A span whose end sits below its start
/// wraps forward through the 0/2π boundary, matching the connector's
/// sweep-direction rule for child spans crossing zero.
pub(crate) fn arc_points(
    center: eframe::egui::Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
) -> Vec<eframe::egui::Pos2> {
    let mut sweep = end_angle - start_angle;
    if sweep < 0.0 {
        sweep += FULL_TURN;
    }

    (0..=ARC_SEGMENTS)
        .map(|i| {
            let angle = start_angle + sweep * i as f32 / ARC_SEGMENTS as f32;
            eframe::egui::Pos2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

fn render_primitive(pixmap: &mut Pixmap, primitive: &ScenePrimitive) {
    match primitive {
        ScenePrimitive::FillRect { rect, colour } => {
            let Some(ts_rect) = tiny_skia::Rect::from_xywh(
                rect.min.x,
                rect.min.y,
                rect.width().max(0.0),
                rect.height().max(0.0),
            ) else {
                return;
            };
            pixmap.fill_rect(ts_rect, &fill_paint(*colour), Transform::identity(), None);
        }
        ScenePrimitive::FillCircle {
            center,
            radius,
            colour,
        } => {
            let mut builder = PathBuilder::new();
            builder.push_circle(center.x, center.y, radius.max(0.1));
            if let Some(path) = builder.finish() {
                pixmap.fill_path(
                    &path,
                    &fill_paint(*colour),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::FillPolygon { points, colour } => {
            if let Some(path) = polygon_path(points, true) {
                pixmap.fill_path(
                    &path,
                    &fill_paint(*colour),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::FillPieSlice {
            center,
            radius,
            start_angle,
            end_angle,
            colour,
        } => {
            let mut points = vec![*center];
            points.extend(arc_points(*center, *radius, *start_angle, *end_angle));
            if let Some(path) = polygon_path(&points, true) {
                pixmap.fill_path(
                    &path,
                    &fill_paint(*colour),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::StrokeLine { from, to, style } => {
            if let Some(path) = polygon_path(&[*from, *to], false) {
                pixmap.stroke_path(
                    &path,
                    &fill_paint(style.colour),
                    &stroke_settings(style),
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::StrokePolyline { points, style } => {
            if let Some(path) = polygon_path(points, false) {
                pixmap.stroke_path(
                    &path,
                    &fill_paint(style.colour),
                    &stroke_settings(style),
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::StrokeCircle {
            center,
            radius,
            style,
        } => {
            let mut builder = PathBuilder::new();
            builder.push_circle(center.x, center.y, radius.max(0.1));
            if let Some(path) = builder.finish() {
                pixmap.stroke_path(
                    &path,
                    &fill_paint(style.colour),
                    &stroke_settings(style),
                    Transform::identity(),
                    None,
                );
            }
        }
        ScenePrimitive::StrokeArc {
            center,
            radius,
            start_angle,
            end_angle,
            anticlockwise: _,
            style,
        } => {
            let points = arc_points(*center, *radius, *start_angle, *end_angle);
            if let Some(path) = polygon_path(&points, false) {
                pixmap.stroke_path(
                    &path,
                    &fill_paint(style.colour),
                    &stroke_settings(style),
                    Transform::identity(),
                    None,
                );
            }
        }
        // labels are painted by the toolkit layer
        ScenePrimitive::Text { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{LoadOptions, NEWICK};
    use crate::tree::Tree;

    fn drawn_tree() -> Tree {
        let mut tree = Tree::new();
        tree.build("((A:1,B:2):0.5,C:3);", &NEWICK, &LoadOptions::default(), None);
        tree
    }

    #[test]
    fn pixmap_matches_the_scene_size() {
        let tree = drawn_tree();
        let pixmap = render_pixmap(&tree.scene).unwrap();
        assert_eq!(pixmap.width(), tree.canvas_width.round() as u32);
        assert_eq!(pixmap.height(), tree.canvas_height.round() as u32);
    }

    #[test]
    fn data_url_is_base64_png() {
        let tree = drawn_tree();
        let url = png_data_url(&tree.scene).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > 100);
    }

    #[test]
    fn arc_spans_wrap_forward_through_zero() {
        let center = eframe::egui::Pos2::new(0.0, 0.0);
        // end below start: the sweep continues through the 0/2π boundary
        let wrapped = arc_points(center, 1.0, 1.0, 0.5);
        let first = wrapped.first().unwrap();
        let last = wrapped.last().unwrap();
        assert!((first.x - 1.0f32.cos()).abs() < 1e-5);
        assert!((last.x - 0.5f32.cos()).abs() < 1e-5);
        // halfway round the long way, below the x-axis
        let mid = wrapped[ARC_SEGMENTS / 2];
        assert!(mid.y < 0.0);

        // a plain span stays inside [start, end]
        let plain = arc_points(center, 1.0, 0.5, 1.0);
        assert!(plain.iter().all(|p| p.y >= 0.0));
    }
}
