use crate::domain::errors::PageError;

/// Page margins in points.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Insets {
    pub const ZERO: Self = Self::uniform(0.0);

    pub const fn new(top: f64, left: f64, right: f64, bottom: f64) -> Self {
        Self {
            top,
            left,
            right,
            bottom,
        }
    }

    pub const fn uniform(inset: f64) -> Self {
        Self::new(inset, inset, inset, inset)
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    fn is_valid(&self) -> bool {
        [self.top, self.left, self.right, self.bottom]
            .iter()
            .all(|inset| inset.is_finite() && *inset >= 0.0)
    }
}

impl Default for Insets {
    fn default() -> Self {
        Self::new(48.0, 36.0, 36.0, 48.0)
    }
}

/// Axis-aligned box in page coordinates, origin bottom-left.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PageSpec {
    pub width_pt: f64,
    pub height_pt: f64,
    pub margins: Insets,
}

impl PageSpec {
    pub fn new(width_pt: f64, height_pt: f64) -> Self {
        Self::with_margins(width_pt, height_pt, Insets::default())
    }

    pub fn with_margins(width_pt: f64, height_pt: f64, margins: Insets) -> Self {
        Self {
            width_pt,
            height_pt,
            margins,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.width_pt,
            height: self.height_pt,
        }
    }

    /// The area inside the margins. With y pointing up, the box starts at the
    /// bottom margin.
    pub fn content_box(&self) -> Rect {
        Rect {
            x: self.margins.left,
            y: self.margins.bottom,
            width: self.width_pt - self.margins.horizontal(),
            height: self.height_pt - self.margins.vertical(),
        }
    }

    pub fn validate(&self) -> Result<(), PageError> {
        let (width, height) = (self.width_pt, self.height_pt);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PageError::InvalidSize { width, height });
        }
        if !self.margins.is_valid() {
            return Err(PageError::InvalidMargins);
        }

        let content = self.content_box();
        if content.width <= 0.0 || content.height <= 0.0 {
            return Err(PageError::NoContentArea { width, height });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_uses_default_margins() {
        let page = PageSpec::new(612.0, 792.0);
        assert_eq!(page.margins, Insets::new(48.0, 36.0, 36.0, 48.0));
        assert_eq!(
            page.content_box(),
            Rect {
                x: 36.0,
                y: 48.0,
                width: 540.0,
                height: 696.0
            }
        );
        assert!(page.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_pages() {
        assert!(matches!(
            PageSpec::new(0.0, 792.0).validate(),
            Err(PageError::InvalidSize { .. })
        ));
        assert!(matches!(
            PageSpec::new(f64::NAN, 792.0).validate(),
            Err(PageError::InvalidSize { .. })
        ));
        assert_eq!(
            PageSpec::with_margins(100.0, 100.0, Insets::new(-1.0, 0.0, 0.0, 0.0)).validate(),
            Err(PageError::InvalidMargins)
        );
        assert!(matches!(
            PageSpec::with_margins(60.0, 100.0, Insets::uniform(30.0)).validate(),
            Err(PageError::NoContentArea { .. })
        ));
    }

    #[test]
    fn zero_margins_are_valid() {
        let page = PageSpec::with_margins(200.0, 100.0, Insets::ZERO);
        assert!(page.validate().is_ok());
        assert_eq!(page.content_box(), page.bounds());
    }
}
