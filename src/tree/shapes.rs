use anyhow::{bail, Result};
use eframe::egui::Pos2;

use super::scene::{SceneGraph, ScenePrimitive, StrokeStyle};
use super::{MetadataEntry, ResolvedLeafStyle, Tree, FULL_TURN};

/// The interchangeable tip-painting strategies. A closed set; string keys
/// from config go through [`NodeShape::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeShape {
    Circle,
    Square,
    Triangle,
    Star,
    RectangleStack,
    CircleStack,
    Pie,
}

impl NodeShape {
    pub const ALL: [NodeShape; 7] = [
        NodeShape::Circle,
        NodeShape::Square,
        NodeShape::Triangle,
        NodeShape::Star,
        NodeShape::RectangleStack,
        NodeShape::CircleStack,
        NodeShape::Pie,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "circle" => Self::Circle,
            "square" => Self::Square,
            "triangle" => Self::Triangle,
            "star" => Self::Star,
            "rectangle" => Self::RectangleStack,
            "circlestack" => Self::CircleStack,
            "pie" => Self::Pie,
            _ => bail!("\"{name}\" is not a known node shape"),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Star => "star",
            Self::RectangleStack => "rectangle",
            Self::CircleStack => "circlestack",
            Self::Pie => "pie",
        }
    }
}

/// Node-local drawing frame: origin at the branch tip, x-axis pointing
/// along the branch angle. Converts local coordinates straight into
/// screen space through the tree's viewport transform.
pub struct NodeFrame<'a> {
    tree: &'a Tree,
    origin: (f32, f32),
    angle: f32,
}

impl<'a> NodeFrame<'a> {
    pub fn new(tree: &'a Tree, origin: (f32, f32), angle: f32) -> Self {
        Self {
            tree,
            origin,
            angle,
        }
    }

    pub fn point(&self, x: f32, y: f32) -> Pos2 {
        let (sin, cos) = self.angle.sin_cos();
        let wx = self.origin.0 + x * cos - y * sin;
        let wy = self.origin.1 + x * sin + y * cos;
        self.tree.to_screen(wx, wy)
    }

    pub fn len(&self, value: f32) -> f32 {
        value * self.tree.zoom
    }

    pub fn absolute_angle(&self, local: f32) -> f32 {
        self.angle + local
    }
}

/// Per-node extras resolved by the caller: connector offset from the
/// branch tip, metadata categories, and the rectangle-stack width scale.
pub struct ShapeContext<'a> {
    pub offset: f32,
    pub metadata: Option<&'a [MetadataEntry]>,
    pub rect_multiplier: f32,
}

const DEFAULT_METADATA: [MetadataEntry; 1] = [MetadataEntry {
    colour: eframe::egui::Color32::BLACK,
    count: 1.0,
}];

/// Side of the square inscribed in a circle of `radius`; every shape is
/// normalized so its area equals this square's.
fn square_side(radius: f32) -> f32 {
    radius * std::f32::consts::SQRT_2
}

fn equal_area_radius(radius: f32) -> f32 {
    (square_side(radius).powi(2) / std::f32::consts::PI).sqrt()
}

pub(crate) fn render(
    shape: NodeShape,
    scene: &mut SceneGraph,
    frame: &NodeFrame<'_>,
    radius: f32,
    style: ResolvedLeafStyle,
    ctx: &ShapeContext<'_>,
) {
    match shape {
        NodeShape::Circle => circle(scene, frame, radius, style),
        NodeShape::Square => square(scene, frame, radius, style),
        NodeShape::Triangle => triangle(scene, frame, radius, style),
        NodeShape::Star => star(scene, frame, radius, style),
        NodeShape::RectangleStack => rectangle_stack(scene, frame, radius, ctx),
        NodeShape::CircleStack => circle_stack(scene, frame, radius, ctx),
        NodeShape::Pie => pie(scene, frame, radius, ctx),
    }
}

/// Straight stub from the branch tip to a shape whose near edge sits away
/// from the origin.
fn draw_connector(
    scene: &mut SceneGraph,
    frame: &NodeFrame<'_>,
    connecting_offset: f32,
    style: ResolvedLeafStyle,
) {
    scene.push(ScenePrimitive::StrokeLine {
        from: frame.point(0.0, 0.0),
        to: frame.point(connecting_offset, 0.0),
        style: StrokeStyle {
            width: frame.len(style.line_width).max(0.5),
            colour: style.stroke_style,
        },
    });
}

/// Fill always; stroke only when the width is positive and the stroke
/// colour actually differs from the fill.
fn commit_polygon(
    scene: &mut SceneGraph,
    points: Vec<Pos2>,
    frame: &NodeFrame<'_>,
    style: ResolvedLeafStyle,
) {
    scene.push(ScenePrimitive::FillPolygon {
        points: points.clone(),
        colour: style.fill_style,
    });
    if style.line_width > 0.0 && style.stroke_style != style.fill_style {
        let mut outline = points;
        if let Some(&first) = outline.first() {
            outline.push(first);
        }
        scene.push(ScenePrimitive::StrokePolyline {
            points: outline,
            style: StrokeStyle {
                width: frame.len(style.line_width).max(0.5),
                colour: style.stroke_style,
            },
        });
    }
}

fn circle(scene: &mut SceneGraph, frame: &NodeFrame<'_>, radius: f32, style: ResolvedLeafStyle) {
    let scaled_radius = equal_area_radius(radius);
    draw_connector(scene, frame, radius - scaled_radius, style);

    let center = frame.point(radius, 0.0);
    scene.push(ScenePrimitive::FillCircle {
        center,
        radius: frame.len(scaled_radius),
        colour: style.fill_style,
    });
    if style.line_width > 0.0 && style.stroke_style != style.fill_style {
        scene.push(ScenePrimitive::StrokeCircle {
            center,
            radius: frame.len(scaled_radius),
            style: StrokeStyle {
                width: frame.len(style.line_width).max(0.5),
                colour: style.stroke_style,
            },
        });
    }
}

fn square(scene: &mut SceneGraph, frame: &NodeFrame<'_>, radius: f32, style: ResolvedLeafStyle) {
    let side = square_side(radius);
    let start_x = radius - side / 2.0;
    draw_connector(scene, frame, start_x, style);

    let points = vec![
        frame.point(start_x, -side / 2.0),
        frame.point(start_x + side, -side / 2.0),
        frame.point(start_x + side, side / 2.0),
        frame.point(start_x, side / 2.0),
    ];
    commit_polygon(scene, points, frame, style);
}

fn triangle(scene: &mut SceneGraph, frame: &NodeFrame<'_>, radius: f32, style: ResolvedLeafStyle) {
    let side = 2.0 * radius * (30.0f32).to_radians().cos();
    let height = (3.0f32).sqrt() / 2.0 * side;
    let midpoint = (1.0 / (3.0f32).sqrt()) * (side / 2.0);
    draw_connector(scene, frame, radius - midpoint, style);

    let points = vec![
        frame.point(radius + side / 2.0, midpoint),
        frame.point(radius, -(height - midpoint)),
        frame.point(radius - side / 2.0, midpoint),
    ];
    commit_polygon(scene, points, frame, style);
}

fn star(scene: &mut SceneGraph, frame: &NodeFrame<'_>, radius: f32, style: ResolvedLeafStyle) {
    let spikes = 5;
    let outer_radius = radius;
    let inner_radius = outer_radius * 0.5;
    let step = std::f32::consts::PI / spikes as f32;
    draw_connector(scene, frame, outer_radius - inner_radius, style);

    let cx = radius;
    let mut rot = std::f32::consts::PI / 2.0 * 3.0;
    let mut points = vec![frame.point(cx, -outer_radius)];
    for _ in 0..spikes {
        points.push(frame.point(cx + rot.cos() * outer_radius, rot.sin() * outer_radius));
        rot += step;
        points.push(frame.point(cx + rot.cos() * inner_radius, rot.sin() * inner_radius));
        rot += step;
    }
    commit_polygon(scene, points, frame, style);
}

/// Horizontal bar partitioned by count share; total width scales with the
/// summed counts times the tree's rectangle multiplier.
fn rectangle_stack(
    scene: &mut SceneGraph,
    frame: &NodeFrame<'_>,
    radius: f32,
    ctx: &ShapeContext<'_>,
) {
    let side = square_side(radius);
    let offset = if ctx.offset == 0.0 { radius } else { ctx.offset };
    let data = ctx.metadata.unwrap_or(&DEFAULT_METADATA);

    let sum_counts: f64 = data.iter().map(|entry| entry.count).sum();
    if sum_counts <= 0.0 {
        return;
    }
    let total_width = sum_counts as f32 * ctx.rect_multiplier;

    let mut start_x = offset - side / 2.0;
    for entry in data {
        let width = (entry.count / sum_counts) as f32 * total_width;
        let points = vec![
            frame.point(start_x, -side / 2.0),
            frame.point(start_x + width, -side / 2.0),
            frame.point(start_x + width, side / 2.0),
            frame.point(start_x, side / 2.0),
        ];
        scene.push(ScenePrimitive::FillPolygon {
            points,
            colour: entry.colour,
        });
        start_x += width;
    }
}

/// Adjoining circles along the branch axis, radii scaled by each entry's
/// share of the maximum count.
fn circle_stack(
    scene: &mut SceneGraph,
    frame: &NodeFrame<'_>,
    radius: f32,
    ctx: &ShapeContext<'_>,
) {
    let scaled_radius = equal_area_radius(radius);
    let data = ctx.metadata.unwrap_or(&DEFAULT_METADATA);

    let max_count = data.iter().map(|entry| entry.count).fold(0.0f64, f64::max);
    if max_count <= 0.0 {
        return;
    }

    let mut offset = ctx.offset;
    for entry in data {
        let current_radius = scaled_radius * (entry.count / max_count) as f32;
        if entry.count > 0.0 {
            offset += current_radius;
        }
        scene.push(ScenePrimitive::FillCircle {
            center: frame.point(offset, 0.0),
            radius: frame.len(current_radius),
            colour: entry.colour,
        });
        offset += current_radius;
    }
}

/// Full circle partitioned into angular slices by count share.
fn pie(scene: &mut SceneGraph, frame: &NodeFrame<'_>, radius: f32, ctx: &ShapeContext<'_>) {
    let scaled_radius = equal_area_radius(radius);
    let data = ctx.metadata.unwrap_or(&DEFAULT_METADATA);

    let sum_counts: f64 = data.iter().map(|entry| entry.count).sum();
    if sum_counts <= 0.0 {
        return;
    }

    let center = frame.point(ctx.offset, 0.0);
    let mut start_angle = 0.0f32;
    for entry in data {
        let end_angle = start_angle + (entry.count / sum_counts) as f32 * FULL_TURN;
        scene.push(ScenePrimitive::FillPieSlice {
            center,
            radius: frame.len(scaled_radius),
            start_angle: frame.absolute_angle(start_angle),
            end_angle: frame.absolute_angle(end_angle),
            colour: entry.colour,
        });
        start_angle = end_angle;
    }
}
