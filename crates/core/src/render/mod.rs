use serde::{Deserialize, Serialize};

/// Linear RGBA colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgba = Rgba::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// Point in normalised device coordinates, `[-1, 1]` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

/// Drawing surface a plugin renders into during `update`.
///
/// This stands in for the graphics backend: whatever a plugin draws here is
/// a side effect of the current frame and is never handed back as data.
pub trait Canvas {
    /// Called by the host before each `update`.
    fn begin_frame(&mut self) {}

    fn clear(&mut self, color: Rgba);
    fn line_strip(&mut self, points: &[Point], color: Rgba);
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Clear(Rgba),
    LineStrip { points: Vec<Point>, color: Rgba },
    FillRect { rect: Rect, color: Rgba },
}

/// Headless canvas that keeps the commands of the current frame.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    frames: u64,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Colour of the last clear issued this frame, if any.
    pub fn clear_color(&self) -> Option<Rgba> {
        self.commands.iter().rev().find_map(|command| match command {
            DrawCommand::Clear(color) => Some(*color),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    /// Starts a new frame, dropping the previous frame's commands.
    fn begin_frame(&mut self) {
        self.commands.clear();
        self.frames += 1;
    }

    fn clear(&mut self, color: Rgba) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn line_strip(&mut self, points: &[Point], color: Rgba) {
        self.commands.push(DrawCommand::LineStrip {
            points: points.to_vec(),
            color,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }
}
