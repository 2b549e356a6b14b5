//! Template-driven automation: locating UI elements on screen and the
//! background auto-accept loop built on top of it.

pub mod auto_accept;
pub mod templates;

pub use auto_accept::AutoAccept;
pub use templates::{TemplateId, TemplateLibrary, TemplateMatch, TemplateScanner};

/// Similarity required for each kind of scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Auto-accept clicks only above this.
    pub accept: f32,
    /// Post-submission retry probe.
    pub retry: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            accept: auto_accept::DEFAULT_ACCEPT_THRESHOLD,
            retry: 0.85,
        }
    }
}
