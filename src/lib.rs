//! domsnap
//!
//! A capture pipeline that turns live document subtrees into raster image
//! buffers without a platform screenshot facility: the target's hosting
//! document is frozen into an isolated snapshot, replayed inside a
//! disposable sandbox, and painted by a pluggable engine onto a shared
//! output surface.
//!
//! # Features
//!
//! - **Snapshot isolation**: captures never observe later mutation of the
//!   live document
//! - **Sandbox reuse**: one expensive container amortized across a batch
//! - **Deterministic ordering**: batch results delivered strictly in input
//!   order, with a per-result veto hook
//!
//! # Example
//!
//! ```no_run
//! use domsnap::{CaptureOptions, Capturer, Document};
//!
//! # #[tokio::main]
//! # async fn main() -> domsnap::Result<()> {
//! let doc = Document::new("<html><body><div id='hero'><h1>Hello</h1></div></body></html>");
//! let mut capturer = Capturer::new();
//! let result = capturer.capture(&doc.select("#hero"), &CaptureOptions::default()).await?;
//! println!("{}x{} at scale {}", result.width(), result.height(), result.scale());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod dom;
pub mod options;
pub mod paint;
pub mod resources;
pub mod sandbox;
pub mod snapshot;
pub mod surface;

pub use capture::{capture, capture_all, CaptureResult, Capturer, ResultAction};
pub use dom::{Document, DocumentHandle, NodeHandle, ViewMetrics};
pub use options::{CaptureOptions, ResolvedOptions, DEFAULT_TIMEOUT_MS};
pub use paint::{BlockPaintEngine, PaintEngine};
pub use resources::{AssetCache, NoopWaiter, ResourceWaiter};
#[cfg(feature = "http")]
pub use resources::HttpWaiter;
pub use snapshot::{ResourceRef, Snapshot};
pub use surface::{Color, Surface, SurfaceRef};

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
