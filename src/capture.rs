//! The capture orchestrator: drives one or more targets end-to-end.
//!
//! Each target runs resolve → clone → await resources → paint →
//! teardown/deliver, strictly in input order. The sandbox and the output
//! surface are single-writer resources owned by the orchestrator for the
//! duration of one capture and explicitly handed to the next; nothing in a
//! batch ever runs concurrently.

use std::sync::Arc;

use crate::dom::NodeHandle;
use crate::error::{Error, Result};
use crate::options::{CaptureOptions, ResolvedOptions};
use crate::paint::{BlockPaintEngine, PaintEngine};
use crate::resources::{default_waiter, ResourceWaiter};
use crate::sandbox::SandboxManager;
use crate::snapshot::{clone_target, Snapshot};
use crate::surface::{lock_surface, shared, Surface, SurfaceRef};

/// Decision returned by the per-result hook of a multi-target capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    /// Proceed to the next target
    Continue,
    /// Stop the batch; remaining targets are never captured
    Stop,
}

type OnResultHandler = Arc<dyn Fn(&CaptureResult) -> ResultAction + Send + Sync>;
type OnSnapshotHandler = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// A delivered capture: a handle onto the painted surface.
///
/// Unless the batch ran with `copy_output_per_result`, every result of a
/// batch aliases the same surface instance: the pixels a result exposes are
/// overwritten in place when the next capture paints. This trade favors
/// throughput; opt into per-result copies to retain results safely.
#[derive(Clone)]
pub struct CaptureResult {
    surface: SurfaceRef,
}

impl CaptureResult {
    fn new(surface: SurfaceRef) -> Self {
        Self { surface }
    }

    /// Surface width in device pixels
    pub fn width(&self) -> u32 {
        lock_surface(&self.surface).width()
    }

    /// Surface height in device pixels
    pub fn height(&self) -> u32 {
        lock_surface(&self.surface).height()
    }

    /// Scale factor the surface was painted at
    pub fn scale(&self) -> f32 {
        lock_surface(&self.surface).scale()
    }

    /// A copy of the RGBA8 pixel buffer
    pub fn pixels(&self) -> Vec<u8> {
        lock_surface(&self.surface).pixels().to_vec()
    }

    /// Hex SHA-256 of the current pixel content
    pub fn digest(&self) -> String {
        lock_surface(&self.surface).digest()
    }

    /// Whether two results alias the same surface instance
    pub fn shares_surface(&self, other: &CaptureResult) -> bool {
        Arc::ptr_eq(&self.surface, &other.surface)
    }

    /// The underlying surface handle
    pub fn surface(&self) -> SurfaceRef {
        self.surface.clone()
    }
}

impl std::fmt::Debug for CaptureResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let surface = lock_surface(&self.surface);
        f.debug_struct("CaptureResult")
            .field("width", &surface.width())
            .field("height", &surface.height())
            .field("scale", &surface.scale())
            .finish()
    }
}

/// Drives captures: owns the paint engine, the sandbox lifecycle, the
/// resource waiter, and the registered hooks.
///
/// # Example
///
/// ```no_run
/// use domsnap::{Capturer, CaptureOptions, Document};
///
/// # #[tokio::main]
/// # async fn main() -> domsnap::Result<()> {
/// let doc = Document::new("<html><body><div id='hero'>Hi</div></body></html>");
/// let mut capturer = Capturer::new();
/// let result = capturer.capture(&doc.select("#hero"), &CaptureOptions::default()).await?;
/// println!("{}x{}", result.width(), result.height());
/// # Ok(())
/// # }
/// ```
pub struct Capturer<P: PaintEngine = BlockPaintEngine> {
    engine: P,
    waiter: Box<dyn ResourceWaiter>,
    sandboxes: SandboxManager,
    on_result: Option<OnResultHandler>,
    on_snapshot: Option<OnSnapshotHandler>,
}

impl Capturer<BlockPaintEngine> {
    /// A capturer with the built-in block engine and the default waiter
    pub fn new() -> Self {
        Self::with_engine(BlockPaintEngine::new())
    }
}

impl Default for Capturer<BlockPaintEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PaintEngine> Capturer<P> {
    /// A capturer around a caller-supplied paint engine
    pub fn with_engine(engine: P) -> Self {
        Self {
            engine,
            waiter: default_waiter(),
            sandboxes: SandboxManager::new(),
            on_result: None,
            on_snapshot: None,
        }
    }

    /// Replace the resource waiter
    pub fn set_waiter(&mut self, waiter: Box<dyn ResourceWaiter>) {
        self.waiter = waiter;
    }

    /// Register the per-result hook. Required for multi-target batches;
    /// optional (but honored) for single captures.
    pub fn on_result<F>(&mut self, cb: F)
    where
        F: Fn(&CaptureResult) -> ResultAction + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(cb));
    }

    /// Remove a previously registered result hook if any
    pub fn clear_on_result(&mut self) {
        self.on_result = None;
    }

    /// Register an inspection hook invoked with each snapshot before it is
    /// installed. No control-flow effect.
    pub fn on_snapshot<F>(&mut self, cb: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.on_snapshot = Some(Arc::new(cb));
    }

    /// Remove a previously registered snapshot hook if any
    pub fn clear_on_snapshot(&mut self) {
        self.on_snapshot = None;
    }

    /// Sandboxes created so far (diagnostic)
    pub fn sandbox_creations(&self) -> usize {
        self.sandboxes.created()
    }

    /// Sandboxes torn down so far (diagnostic)
    pub fn sandbox_teardowns(&self) -> usize {
        self.sandboxes.torn_down()
    }

    /// Whether a sandbox is currently kept for reuse
    pub fn sandbox_alive(&self) -> bool {
        self.sandboxes.is_alive()
    }

    /// Capture a single target
    pub async fn capture(
        &mut self,
        target: &NodeHandle,
        overrides: &CaptureOptions,
    ) -> Result<CaptureResult> {
        let mut results = self
            .run_batch(std::slice::from_ref(target), overrides)
            .await?;
        results
            .pop()
            .ok_or_else(|| Error::Other("single capture produced no result".into()))
    }

    /// Capture a batch of targets, strictly in input order.
    ///
    /// Every target is validated against the whole batch before any
    /// sandbox work starts; a registered result hook is required when more
    /// than one target is requested.
    pub async fn capture_all(
        &mut self,
        targets: &[NodeHandle],
        overrides: &CaptureOptions,
    ) -> Result<Vec<CaptureResult>> {
        self.run_batch(targets, overrides).await
    }

    async fn run_batch(
        &mut self,
        targets: &[NodeHandle],
        overrides: &CaptureOptions,
    ) -> Result<Vec<CaptureResult>> {
        // Fail-fast precondition over the whole batch: no sandbox may come
        // into existence if any request is invalid.
        for (position, target) in targets.iter().enumerate() {
            if target.document().is_none() {
                return Err(Error::MissingDocument(position));
            }
        }
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        if targets.len() > 1 && self.on_result.is_none() {
            return Err(Error::ConfigError(
                "a result hook is required when capturing multiple targets".into(),
            ));
        }

        let Some(first_document) = targets[0].document() else {
            return Err(Error::MissingDocument(0));
        };
        let options = ResolvedOptions::resolve(&first_document.metrics(), overrides);
        log::debug!(
            "capturing {} target(s) at scale {}, window {}x{}",
            targets.len(),
            options.scale,
            options.window_width,
            options.window_height
        );

        // One output surface per batch, shared across deliveries unless the
        // caller opted into per-result copies.
        let surface: SurfaceRef = shared(Surface::empty());
        let total = targets.len();
        let mut results = Vec::with_capacity(total);

        for (position, target) in targets.iter().enumerate() {
            let mut sandbox = self.sandboxes.acquire(&options).await?;

            let snapshot = match clone_target(target, &options) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Best-effort teardown: the owned handle is dropped, not
                    // handed back for reuse.
                    drop(sandbox);
                    return Err(e);
                }
            };
            if let Some(cb) = &self.on_snapshot {
                cb(&snapshot);
            }
            sandbox.install(snapshot);

            let ready = sandbox.resolve_assets(self.waiter.as_ref(), &options).await;
            if !ready {
                log::debug!("position {} painting with unresolved assets", position);
            }

            let painted = {
                let mut surface = lock_surface(&surface);
                match sandbox.snapshot() {
                    Some(snapshot) => {
                        self.engine
                            .paint(snapshot, sandbox.assets(), &mut surface, &options)
                    }
                    None => Err(Error::PaintError("no snapshot installed".into())),
                }
            };
            if let Err(e) = painted {
                drop(sandbox);
                return Err(e);
            }

            // Teardown policy: only the last request of the batch may tear
            // down, and only when the sandbox is not being kept.
            let last = position + 1 == total;
            self.sandboxes
                .release(sandbox, last && !options.keep_sandbox_after_capture);

            let result = if options.copy_output_per_result {
                let copy = lock_surface(&surface).clone();
                CaptureResult::new(shared(copy))
            } else {
                CaptureResult::new(surface.clone())
            };

            if let Some(cb) = &self.on_result {
                match cb(&result) {
                    ResultAction::Continue => {}
                    ResultAction::Stop => {
                        log::debug!("result hook stopped the batch after position {}", position);
                        return Err(Error::Vetoed(position));
                    }
                }
            }
            results.push(result);
        }

        Ok(results)
    }
}

/// Capture a single target with a throwaway default capturer
pub async fn capture(target: &NodeHandle, overrides: &CaptureOptions) -> Result<CaptureResult> {
    Capturer::new().capture(target, overrides).await
}

/// Capture a batch with a throwaway default capturer; `hook` decides after
/// each delivered result whether to continue
pub async fn capture_all<F>(
    targets: &[NodeHandle],
    overrides: &CaptureOptions,
    hook: F,
) -> Result<Vec<CaptureResult>>
where
    F: Fn(&CaptureResult) -> ResultAction + Send + Sync + 'static,
{
    let mut capturer = Capturer::new();
    capturer.on_result(hook);
    capturer.capture_all(targets, overrides).await
}
