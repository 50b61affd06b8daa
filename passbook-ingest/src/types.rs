use serde::{Deserialize, Serialize};

/// Character-join tolerances used when rebuilding lines from positioned text,
/// in PDF user-space units.
///
/// Changing these changes line segmentation; `REFERENCE` reproduces the layout
/// the statement parser was built against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionTolerance {
    /// Horizontal gap above which two fragments on a line get a space between them.
    pub x: f32,
    /// Maximum baseline difference for two fragments to share a line.
    pub y: f32,
}

impl ExtractionTolerance {
    pub const REFERENCE: ExtractionTolerance = ExtractionTolerance { x: 2.0, y: 0.0 };
}

impl Default for ExtractionTolerance {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// A run of text placed at a position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: f32,
    /// Baseline, growing upwards as in PDF coordinates.
    pub y: f32,
    pub width: f32,
    pub text: String,
}

impl TextFragment {
    pub fn new(x: f32, y: f32, width: f32, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            width,
            text: text.into(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}
