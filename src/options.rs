//! Option resolution: builtin defaults, document-derived defaults, and
//! caller overrides merged into one immutable record per batch.

use crate::dom::ViewMetrics;
use crate::surface::Color;

/// Default bound for resource readiness waiting, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15000;

/// Caller-supplied overrides for a capture
///
/// Every field is optional; unset fields fall back to values derived from
/// the first target's hosting document, then to builtin constants. See
/// [`ResolvedOptions::resolve`] for the exact defaults.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Raster scale factor (defaults to the document's device pixel ratio)
    pub scale: Option<f32>,
    /// Sandbox window width in CSS pixels (defaults to the document viewport)
    pub window_width: Option<u32>,
    /// Sandbox window height in CSS pixels (defaults to the document viewport)
    pub window_height: Option<u32>,
    /// Horizontal scroll offset applied inside the sandbox
    pub scroll_x: Option<i32>,
    /// Vertical scroll offset applied inside the sandbox
    pub scroll_y: Option<i32>,
    /// Bound for resource readiness waiting, in milliseconds
    pub timeout_ms: Option<u64>,
    /// Keep the sandbox alive after the last capture of the batch
    pub keep_sandbox_after_capture: Option<bool>,
    /// Fetch assets whose origin differs from the hosting document's
    pub allow_cross_origin_assets: Option<bool>,
    /// Deep-copy the output surface into each delivered result
    pub copy_output_per_result: Option<bool>,
    /// Surface background color
    pub background_color: Option<Color>,
    /// Subtrees matching this selector are skipped while cloning
    pub ignore_selector: Option<String>,
}

/// Fully-resolved configuration for one batch
///
/// Built once from the first request's hosting document and the caller
/// overrides, then read-only for the rest of the batch.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub scale: f32,
    pub window_width: u32,
    pub window_height: u32,
    pub scroll_x: i32,
    pub scroll_y: i32,
    pub timeout_ms: u64,
    pub keep_sandbox_after_capture: bool,
    pub allow_cross_origin_assets: bool,
    pub copy_output_per_result: bool,
    pub background_color: Color,
    pub ignore_selector: Option<String>,
}

impl ResolvedOptions {
    /// Merge builtin defaults, document metrics, and caller overrides.
    ///
    /// Pure and infallible: a non-positive scale (from metrics or override)
    /// falls back to 1.
    pub fn resolve(metrics: &ViewMetrics, overrides: &CaptureOptions) -> Self {
        let document_scale = if metrics.device_pixel_ratio > 0.0 {
            metrics.device_pixel_ratio
        } else {
            1.0
        };
        let scale = match overrides.scale {
            Some(s) if s > 0.0 => s,
            Some(_) => 1.0,
            None => document_scale,
        };

        Self {
            scale,
            window_width: overrides.window_width.unwrap_or(metrics.viewport.width),
            window_height: overrides.window_height.unwrap_or(metrics.viewport.height),
            scroll_x: overrides.scroll_x.unwrap_or(metrics.scroll_x),
            scroll_y: overrides.scroll_y.unwrap_or(metrics.scroll_y),
            timeout_ms: overrides.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            keep_sandbox_after_capture: overrides.keep_sandbox_after_capture.unwrap_or(true),
            allow_cross_origin_assets: overrides.allow_cross_origin_assets.unwrap_or(false),
            copy_output_per_result: overrides.copy_output_per_result.unwrap_or(false),
            background_color: overrides.background_color.unwrap_or(Color::WHITE),
            ignore_selector: overrides.ignore_selector.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Viewport;

    #[test]
    fn builtin_defaults() {
        let resolved = ResolvedOptions::resolve(&ViewMetrics::default(), &CaptureOptions::default());
        assert_eq!(resolved.scale, 1.0);
        assert_eq!(resolved.window_width, 1280);
        assert_eq!(resolved.window_height, 720);
        assert_eq!(resolved.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(resolved.keep_sandbox_after_capture);
        assert!(!resolved.allow_cross_origin_assets);
        assert!(!resolved.copy_output_per_result);
        assert_eq!(resolved.background_color, Color::WHITE);
    }

    #[test]
    fn document_metrics_take_precedence_over_builtins() {
        let metrics = ViewMetrics {
            device_pixel_ratio: 2.0,
            viewport: Viewport { width: 800, height: 600 },
            scroll_x: 10,
            scroll_y: 20,
        };
        let resolved = ResolvedOptions::resolve(&metrics, &CaptureOptions::default());
        assert_eq!(resolved.scale, 2.0);
        assert_eq!(resolved.window_width, 800);
        assert_eq!(resolved.window_height, 600);
        assert_eq!(resolved.scroll_x, 10);
        assert_eq!(resolved.scroll_y, 20);
    }

    #[test]
    fn overrides_take_precedence_over_metrics() {
        let metrics = ViewMetrics {
            device_pixel_ratio: 2.0,
            viewport: Viewport { width: 800, height: 600 },
            scroll_x: 0,
            scroll_y: 0,
        };
        let overrides = CaptureOptions {
            scale: Some(3.0),
            window_width: Some(1024),
            timeout_ms: Some(50),
            copy_output_per_result: Some(true),
            ..Default::default()
        };
        let resolved = ResolvedOptions::resolve(&metrics, &overrides);
        assert_eq!(resolved.scale, 3.0);
        assert_eq!(resolved.window_width, 1024);
        assert_eq!(resolved.window_height, 600);
        assert_eq!(resolved.timeout_ms, 50);
        assert!(resolved.copy_output_per_result);
    }

    #[test]
    fn bogus_scale_falls_back_to_one() {
        let metrics = ViewMetrics {
            device_pixel_ratio: 0.0,
            ..Default::default()
        };
        let resolved = ResolvedOptions::resolve(&metrics, &CaptureOptions::default());
        assert_eq!(resolved.scale, 1.0);

        let overrides = CaptureOptions {
            scale: Some(-2.0),
            ..Default::default()
        };
        let resolved = ResolvedOptions::resolve(&ViewMetrics::default(), &overrides);
        assert_eq!(resolved.scale, 1.0);
    }
}
