//! Wire types for the layout API and their mapping onto the domain.
//!
//! Commands and path segments are tagged with an `op` field. Inbound scenes
//! are lenient: missing margins become zero, missing style and text fields
//! get the renderer defaults, and commands this server cannot represent
//! (images, clip paths) are dropped.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::domain::page::{Insets, PageSpec};
use crate::domain::scene::{Command, Glyph, Path, PathSegment, Scene, Style, TextRun};

const DEFAULT_FONT_FAMILY: &str = "System";
const DEFAULT_FONT_SIZE: f64 = 12.0;
const DEFAULT_BASELINE: &str = "alphabetic";

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Pt,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SceneVersion {
    #[default]
    #[serde(rename = "scene-v1")]
    V1,
}

fn y_up() -> bool {
    true
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct InsetsDTO {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl From<Insets> for InsetsDTO {
    fn from(value: Insets) -> Self {
        Self {
            top: value.top,
            left: value.left,
            right: value.right,
            bottom: value.bottom,
        }
    }
}

impl From<InsetsDTO> for Insets {
    fn from(value: InsetsDTO) -> Self {
        Insets::new(value.top, value.left, value.right, value.bottom)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpecDTO {
    pub width_pt: f64,
    pub height_pt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margins: Option<InsetsDTO>,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "y_up")]
    pub y_up: bool,
}

impl PageSpecDTO {
    fn into_page(self, missing_margins: Insets) -> PageSpec {
        let margins = self.margins.map_or(missing_margins, Insets::from);
        PageSpec::with_margins(self.width_pt, self.height_pt, margins)
    }
}

impl From<&PageSpec> for PageSpecDTO {
    fn from(value: &PageSpec) -> Self {
        Self {
            width_pt: value.width_pt,
            height_pt: value.height_pt,
            margins: Some(value.margins.into()),
            units: Units::Pt,
            y_up: true,
        }
    }
}

/// A page layout request; absent margins mean the default page margins.
impl From<PageSpecDTO> for PageSpec {
    fn from(value: PageSpecDTO) -> Self {
        value.into_page(Insets::default())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathSegmentDTO {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    QuadTo { cx: f64, cy: f64, x: f64, y: f64 },
    CubicTo { c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64 },
    ClosePath,
    /// Arcs and anything newer; degraded to a close.
    #[serde(other)]
    Unsupported,
}

impl From<PathSegment> for PathSegmentDTO {
    fn from(value: PathSegment) -> Self {
        match value {
            PathSegment::Move { x, y } => Self::MoveTo { x, y },
            PathSegment::Line { x, y } => Self::LineTo { x, y },
            PathSegment::Quad { cx, cy, x, y } => Self::QuadTo { cx, cy, x, y },
            PathSegment::Cubic {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            } => Self::CubicTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            },
            PathSegment::Close => Self::ClosePath,
        }
    }
}

impl From<PathSegmentDTO> for PathSegment {
    fn from(value: PathSegmentDTO) -> Self {
        match value {
            PathSegmentDTO::MoveTo { x, y } => Self::Move { x, y },
            PathSegmentDTO::LineTo { x, y } => Self::Line { x, y },
            PathSegmentDTO::QuadTo { cx, cy, x, y } => Self::Quad { cx, cy, x, y },
            PathSegmentDTO::CubicTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            } => Self::Cubic {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            },
            PathSegmentDTO::ClosePath | PathSegmentDTO::Unsupported => Self::Close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PathDTO {
    pub segments: Vec<PathSegmentDTO>,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RgbaDTO {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

/// Either a CSS color string or an RGBA object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColorDTO {
    Css(CompactString),
    Rgba(RgbaDTO),
}

impl ColorDTO {
    /// Only CSS colors survive the trip into the domain.
    fn into_css(self) -> Option<CompactString> {
        match self {
            ColorDTO::Css(css) => Some(css),
            ColorDTO::Rgba(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDTO {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<ColorDTO>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<ColorDTO>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
}

impl From<&Style> for StyleDTO {
    fn from(value: &Style) -> Self {
        Self {
            stroke: value.stroke.clone().map(ColorDTO::Css),
            fill: value.fill.clone().map(ColorDTO::Css),
            line_width: Some(value.line_width),
        }
    }
}

impl From<StyleDTO> for Style {
    fn from(value: StyleDTO) -> Self {
        Self {
            stroke: value.stroke.and_then(ColorDTO::into_css),
            fill: value.fill.and_then(ColorDTO::into_css),
            line_width: value.line_width.unwrap_or(1.0),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphDTO {
    pub code_point: u32,
    #[serde(default)]
    pub dx: Option<f64>,
    #[serde(default)]
    pub dy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRunDTO {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<CompactString>,
    #[serde(default)]
    pub glyphs: Vec<GlyphDTO>,
}

impl From<&TextRun> for TextRunDTO {
    fn from(value: &TextRun) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            font_family: Some(value.font_family.clone()),
            font_size_pt: Some(value.font_size_sp),
            baseline: Some(value.baseline.clone()),
            glyphs: value
                .glyphs
                .iter()
                .map(|glyph| GlyphDTO {
                    code_point: glyph.code_point,
                    dx: Some(glyph.dx),
                    dy: Some(glyph.dy),
                })
                .collect(),
        }
    }
}

impl From<TextRunDTO> for TextRun {
    fn from(value: TextRunDTO) -> Self {
        Self {
            font_family: value.font_family.unwrap_or_else(|| DEFAULT_FONT_FAMILY.into()),
            font_size_sp: value.font_size_pt.unwrap_or(DEFAULT_FONT_SIZE),
            baseline: value.baseline.unwrap_or_else(|| DEFAULT_BASELINE.into()),
            glyphs: value
                .glyphs
                .into_iter()
                .map(|glyph| Glyph {
                    code_point: glyph.code_point,
                    dx: glyph.dx.unwrap_or_default(),
                    dy: glyph.dy.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum CommandDTO {
    Save {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<CompactString>,
    },
    Restore,
    Transform {
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        e: f64,
        f: f64,
    },
    Path {
        path: PathDTO,
        #[serde(default)]
        style: StyleDTO,
    },
    Text {
        run: TextRunDTO,
    },
    /// Images, clip paths and other commands the domain has no model for.
    #[serde(other)]
    Unsupported,
}

impl From<&Command> for CommandDTO {
    fn from(value: &Command) -> Self {
        match value {
            Command::Save => Self::Save { id: None },
            Command::Restore => Self::Restore,
            &Command::Transform { a, b, c, d, e, f } => Self::Transform { a, b, c, d, e, f },
            Command::DrawPath { path, style } => Self::Path {
                path: PathDTO {
                    segments: path.segments.iter().copied().map(Into::into).collect(),
                },
                style: style.into(),
            },
            Command::DrawText { run } => Self::Text { run: run.into() },
        }
    }
}

impl CommandDTO {
    fn into_command(self) -> Option<Command> {
        let command = match self {
            CommandDTO::Save { .. } => Command::Save,
            CommandDTO::Restore => Command::Restore,
            CommandDTO::Transform { a, b, c, d, e, f } => Command::Transform { a, b, c, d, e, f },
            CommandDTO::Path { path, style } => Command::DrawPath {
                path: Path::new(path.segments.into_iter().map(Into::into).collect()),
                style: style.into(),
            },
            CommandDTO::Text { run } => Command::DrawText { run: run.into() },
            CommandDTO::Unsupported => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDTO {
    #[serde(default)]
    pub version: SceneVersion,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "y_up")]
    pub y_up: bool,
    pub page: PageSpecDTO,
    #[serde(default)]
    pub commands: Vec<CommandDTO>,
}

impl From<&Scene> for SceneDTO {
    fn from(value: &Scene) -> Self {
        Self {
            version: SceneVersion::V1,
            units: Units::Pt,
            y_up: true,
            page: (&value.page).into(),
            commands: value.commands.iter().map(Into::into).collect(),
        }
    }
}

/// An inbound scene; absent margins mean no margins at all.
impl From<SceneDTO> for Scene {
    fn from(value: SceneDTO) -> Self {
        Self {
            page: value.page.into_page(Insets::ZERO),
            commands: value
                .commands
                .into_iter()
                .filter_map(CommandDTO::into_command)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDTO {
    pub error: CompactString,
}
