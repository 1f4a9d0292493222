use crate::domain::page::PageSpec;
use crate::domain::scene::{Command, Path, Scene, Style};

const PAGE_BORDER: &str = "#000";
const MARGIN_BOX: &str = "#888";

/// Turns a page into a scene. For now only the page border and the margin box
/// are drawn.
#[derive(Debug, Copy, Clone, Default)]
pub struct LayoutEngine;

impl LayoutEngine {
    pub fn layout(page: &PageSpec) -> Scene {
        let commands = vec![
            Command::DrawPath {
                path: Path::rect(page.bounds()),
                style: Style::stroked(PAGE_BORDER),
            },
            Command::DrawPath {
                path: Path::rect(page.content_box()),
                style: Style::stroked(MARGIN_BOX),
            },
        ];

        Scene {
            page: *page,
            commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::page::Insets;
    use crate::domain::scene::PathSegment;

    #[test]
    fn draws_border_then_margin_box() {
        let page = PageSpec::with_margins(200.0, 100.0, Insets::uniform(10.0));
        let scene = LayoutEngine::layout(&page);

        assert_eq!(scene.page, page);
        assert_eq!(scene.commands.len(), 2);

        let Command::DrawPath { path, style } = &scene.commands[0] else {
            panic!("expected a path, got {:?}", scene.commands[0]);
        };
        assert_eq!(style.stroke.as_deref(), Some("#000"));
        assert_eq!(path.segments[2], PathSegment::Line { x: 200.0, y: 100.0 });

        let Command::DrawPath { path, style } = &scene.commands[1] else {
            panic!("expected a path, got {:?}", scene.commands[1]);
        };
        assert_eq!(style.stroke.as_deref(), Some("#888"));
        assert_eq!(path.segments[0], PathSegment::Move { x: 10.0, y: 10.0 });
        assert_eq!(path.segments[2], PathSegment::Line { x: 190.0, y: 90.0 });
    }
}
