//! Domain Errors

use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum PageError {
    #[error("page size {width}x{height}pt must be finite and positive")]
    InvalidSize { width: f64, height: f64 },

    #[error("margins must be finite and non-negative")]
    InvalidMargins,

    #[error("margins leave no content area on a {width}x{height}pt page")]
    NoContentArea { width: f64, height: f64 },
}
