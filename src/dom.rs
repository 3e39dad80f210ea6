//! Live-document model consumed by capture requests.
//!
//! A [`Document`] is the host of capture targets: HTML source plus the view
//! metrics (pixel ratio, viewport, scroll offsets) that option resolution
//! reads. Documents stay mutable through a shared [`DocumentHandle`]; a
//! snapshot taken from a document owns its own copy of everything it needs,
//! so later mutation never reaches it.

use std::sync::{Arc, Mutex, PoisonError};

use crate::Viewport;

/// Presentation metrics of a hosting document
///
/// These feed the option resolver: the configured scale defaults to
/// `device_pixel_ratio`, the window size to `viewport`, and the capture
/// scroll position to `scroll_x`/`scroll_y`.
#[derive(Debug, Clone, Copy)]
pub struct ViewMetrics {
    /// Device pixel ratio of the hosting view
    pub device_pixel_ratio: f32,
    /// Viewport dimensions in CSS pixels
    pub viewport: Viewport,
    /// Horizontal scroll offset
    pub scroll_x: i32,
    /// Vertical scroll offset
    pub scroll_y: i32,
}

impl Default for ViewMetrics {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            viewport: Viewport::default(),
            scroll_x: 0,
            scroll_y: 0,
        }
    }
}

#[derive(Debug)]
struct DocumentState {
    html: String,
    base_url: Option<String>,
    metrics: ViewMetrics,
}

/// A live hosting document
///
/// Construct one with [`Document::new`] and hand out [`NodeHandle`]s via
/// [`DocumentHandle::select`]. The document can be mutated at any time
/// (`set_html`); snapshots produced earlier are unaffected.
#[derive(Debug)]
pub struct Document;

impl Document {
    /// Create a document from HTML source with default view metrics
    pub fn new(html: impl Into<String>) -> DocumentHandle {
        Self::with_metrics(html, ViewMetrics::default())
    }

    /// Create a document with explicit view metrics
    pub fn with_metrics(html: impl Into<String>, metrics: ViewMetrics) -> DocumentHandle {
        DocumentHandle {
            state: Arc::new(Mutex::new(DocumentState {
                html: html.into(),
                base_url: None,
                metrics,
            })),
        }
    }
}

/// Shared handle to a live document
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    state: Arc<Mutex<DocumentState>>,
}

impl DocumentHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the base URL used to resolve relative asset references
    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.lock().base_url = Some(base_url.into());
    }

    /// Replace the document's HTML source (a live mutation)
    pub fn set_html(&self, html: impl Into<String>) {
        self.lock().html = html.into();
    }

    /// Replace the document's view metrics
    pub fn set_metrics(&self, metrics: ViewMetrics) {
        self.lock().metrics = metrics;
    }

    /// Current HTML source
    pub fn html(&self) -> String {
        self.lock().html.clone()
    }

    /// Current base URL, if any
    pub fn base_url(&self) -> Option<String> {
        self.lock().base_url.clone()
    }

    /// Current view metrics
    pub fn metrics(&self) -> ViewMetrics {
        self.lock().metrics
    }

    /// Create a target handle for the first element matching `selector`
    pub fn select(&self, selector: impl Into<String>) -> NodeHandle {
        NodeHandle {
            selector: selector.into(),
            document: Some(self.clone()),
        }
    }

    /// Whether two handles refer to the same live document
    pub fn same_document(&self, other: &DocumentHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// A target node reference: a selector plus its hosting document
///
/// A handle without a hosting document (see [`NodeHandle::detached`]) is an
/// invalid capture request and is rejected before any sandbox work starts.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    selector: String,
    document: Option<DocumentHandle>,
}

impl NodeHandle {
    /// Create a handle that is not attached to any document
    pub fn detached(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            document: None,
        }
    }

    /// The selector identifying the target subtree
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The hosting document, if the handle is attached
    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }
}
