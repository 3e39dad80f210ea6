//! Sandbox lifecycle: the disposable container a snapshot is hosted in
//! while it gets painted.
//!
//! Opening a sandbox is the most expensive step in the pipeline (it stands
//! for forcing layout and style computation on a throwaway host), so one
//! instance is reused across the requests of a batch and, when
//! `keep_sandbox_after_capture` is set, across batches on the same
//! capturer. The manager hands out an owned handle; the orchestrator gives
//! it back through [`SandboxManager::release`] with an explicit teardown
//! decision.

use crate::error::Result;
use crate::options::ResolvedOptions;
use crate::resources::AssetCache;
use crate::snapshot::Snapshot;
use crate::Viewport;

/// The disposable container hosting a snapshot for painting
#[derive(Debug)]
pub struct Sandbox {
    generation: usize,
    viewport: Viewport,
    scale: f32,
    snapshot: Option<Snapshot>,
    assets: AssetCache,
}

impl Sandbox {
    /// Open a fresh sandbox sized for the batch configuration.
    ///
    /// Async because creation is a suspension point of the pipeline: the
    /// container has to be "loaded" before the first snapshot can be
    /// installed into it.
    async fn open(generation: usize, options: &ResolvedOptions) -> Result<Self> {
        let sandbox = Self {
            generation,
            viewport: Viewport {
                width: options.window_width,
                height: options.window_height,
            },
            scale: options.scale,
            snapshot: None,
            assets: AssetCache::new(),
        };
        log::debug!(
            "sandbox #{} opened at {}x{} (scale {})",
            sandbox.generation,
            sandbox.viewport.width,
            sandbox.viewport.height,
            sandbox.scale
        );
        tokio::task::yield_now().await;
        Ok(sandbox)
    }

    fn reconfigure(&mut self, options: &ResolvedOptions) {
        self.viewport = Viewport {
            width: options.window_width,
            height: options.window_height,
        };
        self.scale = options.scale;
    }

    /// Install a snapshot, dropping the previously hosted one along with
    /// its asset cache.
    pub fn install(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
        self.assets = AssetCache::new();
    }

    /// The currently hosted snapshot
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Assets resolved for the hosted snapshot
    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Mutable access for the resource waiter
    pub fn assets_mut(&mut self) -> &mut AssetCache {
        &mut self.assets
    }

    /// Resolve the hosted snapshot's assets through `waiter`, bounded by
    /// the configured timeout. Never fails; `false` means some assets will
    /// paint as absent.
    pub async fn resolve_assets(
        &mut self,
        waiter: &dyn crate::resources::ResourceWaiter,
        options: &ResolvedOptions,
    ) -> bool {
        match &self.snapshot {
            Some(snapshot) => {
                crate::resources::await_ready(waiter, snapshot, &mut self.assets, options).await
            }
            None => true,
        }
    }

    /// Monotonic creation index of this sandbox
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Viewport the sandbox was loaded at
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

/// Creates, hands out, and tears down the single sandbox of a capturer
#[derive(Debug, Default)]
pub struct SandboxManager {
    current: Option<Sandbox>,
    created: usize,
    torn_down: usize,
}

impl SandboxManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the kept sandbox (reconfigured for this batch) or open a
    /// fresh one. The caller owns the handle until [`release`].
    ///
    /// [`release`]: SandboxManager::release
    pub async fn acquire(&mut self, options: &ResolvedOptions) -> Result<Sandbox> {
        match self.current.take() {
            Some(mut sandbox) => {
                sandbox.reconfigure(options);
                Ok(sandbox)
            }
            None => {
                self.created += 1;
                Sandbox::open(self.created, options).await
            }
        }
    }

    /// Give the sandbox back: keep it for the next acquire, or tear it
    /// down (the handle is dropped).
    pub fn release(&mut self, sandbox: Sandbox, tear_down: bool) {
        if tear_down {
            log::debug!("sandbox #{} torn down", sandbox.generation());
            self.torn_down += 1;
            drop(sandbox);
        } else {
            self.current = Some(sandbox);
        }
    }

    /// Number of sandboxes created so far
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of sandboxes torn down so far
    pub fn torn_down(&self) -> usize {
        self.torn_down
    }

    /// Whether a sandbox is currently kept for reuse
    pub fn is_alive(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ViewMetrics;
    use crate::options::{CaptureOptions, ResolvedOptions};

    fn options() -> ResolvedOptions {
        ResolvedOptions::resolve(&ViewMetrics::default(), &CaptureOptions::default())
    }

    #[tokio::test]
    async fn acquire_creates_once_and_reuses() {
        let mut manager = SandboxManager::new();
        let sandbox = manager.acquire(&options()).await.unwrap();
        assert_eq!(manager.created(), 1);
        manager.release(sandbox, false);
        assert!(manager.is_alive());

        let again = manager.acquire(&options()).await.unwrap();
        assert_eq!(manager.created(), 1);
        assert_eq!(again.generation(), 1);
        manager.release(again, false);
    }

    #[tokio::test]
    async fn release_with_teardown_drops_the_sandbox() {
        let mut manager = SandboxManager::new();
        let sandbox = manager.acquire(&options()).await.unwrap();
        manager.release(sandbox, true);
        assert!(!manager.is_alive());
        assert_eq!(manager.torn_down(), 1);

        let fresh = manager.acquire(&options()).await.unwrap();
        assert_eq!(manager.created(), 2);
        assert_eq!(fresh.generation(), 2);
        manager.release(fresh, true);
    }

    #[tokio::test]
    async fn reuse_reconfigures_the_viewport() {
        let mut manager = SandboxManager::new();
        let sandbox = manager.acquire(&options()).await.unwrap();
        manager.release(sandbox, false);

        let metrics = ViewMetrics::default();
        let overrides = CaptureOptions {
            window_width: Some(320),
            window_height: Some(200),
            ..Default::default()
        };
        let reopened = manager
            .acquire(&ResolvedOptions::resolve(&metrics, &overrides))
            .await
            .unwrap();
        assert_eq!(reopened.viewport().width, 320);
        assert_eq!(reopened.viewport().height, 200);
        manager.release(reopened, false);
    }

    #[tokio::test]
    async fn install_replaces_the_hosted_snapshot() {
        use crate::dom::Document;
        use crate::snapshot::clone_target;

        let mut manager = SandboxManager::new();
        let mut sandbox = manager.acquire(&options()).await.unwrap();
        assert!(sandbox.snapshot().is_none());

        let doc = Document::new("<html><body><div id='a'>one</div><div id='b'>two</div></body></html>");
        let first = clone_target(&doc.select("#a"), &options()).unwrap();
        let second = clone_target(&doc.select("#b"), &options()).unwrap();

        sandbox.install(first);
        assert!(sandbox.snapshot().map(|s| s.markup().contains("one")).unwrap_or(false));
        sandbox.install(second);
        assert!(sandbox.snapshot().map(|s| s.markup().contains("two")).unwrap_or(false));
        manager.release(sandbox, true);
    }
}
