use compact_str::CompactString;

use crate::domain::page::{PageSpec, Rect};

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PathSegment {
    Move { x: f64, y: f64 },
    Line { x: f64, y: f64 },
    Quad { cx: f64, cy: f64, x: f64, y: f64 },
    Cubic { c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64 },
    Close,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Closed counter-clockwise outline starting at the rect's origin.
    pub fn rect(rect: Rect) -> Self {
        let Rect {
            x,
            y,
            width,
            height,
        } = rect;
        Self::new(vec![
            PathSegment::Move { x, y },
            PathSegment::Line { x: x + width, y },
            PathSegment::Line {
                x: x + width,
                y: y + height,
            },
            PathSegment::Line { x, y: y + height },
            PathSegment::Close,
        ])
    }
}

/// Colors are CSS color strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub stroke: Option<CompactString>,
    pub fill: Option<CompactString>,
    pub line_width: f64,
}

impl Style {
    pub fn stroked(color: &str) -> Self {
        Self {
            stroke: Some(color.into()),
            ..Self::default()
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke: Some("#000".into()),
            fill: None,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    pub code_point: u32,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub font_family: CompactString,
    pub font_size_sp: f64,
    pub baseline: CompactString,
    pub glyphs: Vec<Glyph>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Save,
    Restore,
    /// 2D affine matrix `[a b c d e f]`.
    Transform {
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        e: f64,
        f: f64,
    },
    DrawPath { path: Path, style: Style },
    DrawText { run: TextRun },
}

/// A page plus the drawing commands for it, in y-up point coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub page: PageSpec,
    pub commands: Vec<Command>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_path_is_closed_outline() {
        let path = Path::rect(Rect {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        });

        assert_eq!(
            path.segments,
            vec![
                PathSegment::Move { x: 10.0, y: 20.0 },
                PathSegment::Line { x: 40.0, y: 20.0 },
                PathSegment::Line { x: 40.0, y: 60.0 },
                PathSegment::Line { x: 10.0, y: 60.0 },
                PathSegment::Close,
            ]
        );
    }

    #[test]
    fn default_style_is_thin_black_stroke() {
        let style = Style::default();
        assert_eq!(style.stroke.as_deref(), Some("#000"));
        assert_eq!(style.fill, None);
        assert_eq!(style.line_width, 1.0);
    }
}
