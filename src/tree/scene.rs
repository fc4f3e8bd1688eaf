use eframe::egui::{Align2, Color32, Pos2, Rect};

/// Stroke settings shared by every line-like primitive.
#[derive(Debug, Clone, Copy)]
pub struct StrokeStyle {
    pub width: f32,
    pub colour: Color32,
}

/// One drawing command in screen space (device pixels).
///
/// The engine renders a frame into a flat list of these; the egui shell and
/// the tiny-skia exporter are two consumers of the same list.
#[derive(Debug, Clone)]
pub enum ScenePrimitive {
    FillRect {
        rect: Rect,
        colour: Color32,
    },
    FillCircle {
        center: Pos2,
        radius: f32,
        colour: Color32,
    },
    FillPolygon {
        points: Vec<Pos2>,
        colour: Color32,
    },
    FillPieSlice {
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        colour: Color32,
    },
    StrokeLine {
        from: Pos2,
        to: Pos2,
        style: StrokeStyle,
    },
    StrokePolyline {
        points: Vec<Pos2>,
        style: StrokeStyle,
    },
    StrokeCircle {
        center: Pos2,
        radius: f32,
        style: StrokeStyle,
    },
    StrokeArc {
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
        style: StrokeStyle,
    },
    Text {
        text: String,
        anchor: Pos2,
        angle: f32,
        align: Align2,
        size: f32,
        colour: Color32,
    },
}

/// The retained output of one `Tree::draw` call.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub width: f32,
    pub height: f32,
    pub primitives: Vec<ScenePrimitive>,
}

impl SceneGraph {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            primitives: Vec::new(),
        }
    }

    pub fn push(&mut self, primitive: ScenePrimitive) {
        self.primitives.push(primitive);
    }
}
