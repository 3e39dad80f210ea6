//! Snapshot cloning: an isolated, presentation-frozen copy of the target
//! subtree.
//!
//! A [`Snapshot`] owns every string it needs (serialized markup, stylesheet
//! text, resolved resource URLs), so once produced it never observes later
//! mutation of the live document. Cloning is idempotent for identical live
//! document state.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::dom::NodeHandle;
use crate::error::{Error, Result};
use crate::options::ResolvedOptions;
use crate::Viewport;

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// An external asset referenced by a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Resolved URL (absolute when a document base URL was available)
    pub url: String,
    /// Whether the asset's origin differs from the hosting document's
    pub cross_origin: bool,
}

/// An isolated, style-frozen copy of a document subtree
///
/// Owned by the sandbox that hosts it; replaced wholesale when the sandbox
/// is reused for the next request.
#[derive(Debug, Clone)]
pub struct Snapshot {
    markup: String,
    stylesheets: Vec<String>,
    resources: Vec<ResourceRef>,
    base_url: Option<String>,
    viewport: Viewport,
    scale: f32,
    scroll: (i32, i32),
}

impl Snapshot {
    /// Serialized markup of the captured subtree
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Stylesheet text frozen from the hosting document at clone time
    pub fn stylesheets(&self) -> &[String] {
        &self.stylesheets
    }

    /// External assets referenced by the subtree
    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    /// Base URL the resource references were resolved against
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Viewport the snapshot was positioned at
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Scale the snapshot will be painted at
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Scroll offset the snapshot was positioned at
    pub fn scroll(&self) -> (i32, i32) {
        self.scroll
    }
}

/// Produce a snapshot of `target` positioned per the resolved options.
///
/// The target must be attached; the orchestrator checks that before any
/// sandbox work, so an unattached handle here is a caller bug surfaced as
/// `CloneError`. `<script>` subtrees are never copied, and subtrees
/// matching `ignore_selector` are skipped.
pub fn clone_target(target: &NodeHandle, options: &ResolvedOptions) -> Result<Snapshot> {
    let document = target
        .document()
        .ok_or_else(|| Error::CloneError(format!("target '{}' has no hosting document", target.selector())))?;

    let html_source = document.html();
    let base_url = document.base_url();
    let parsed = Html::parse_document(&html_source);

    let selector = Selector::parse(target.selector())
        .map_err(|e| Error::CloneError(format!("invalid target selector '{}': {:?}", target.selector(), e)))?;
    let root = parsed
        .select(&selector)
        .next()
        .ok_or_else(|| Error::CloneError(format!("no element matches '{}'", target.selector())))?;

    let mut ignored = HashSet::new();
    if let Some(ignore) = options.ignore_selector.as_deref() {
        let ignore_selector = Selector::parse(ignore)
            .map_err(|e| Error::CloneError(format!("invalid ignore selector '{}': {:?}", ignore, e)))?;
        for skipped in parsed.select(&ignore_selector) {
            ignored.insert(skipped.id());
        }
    }

    let mut markup = String::new();
    serialize_element(root, &ignored, &mut markup);

    // Freeze every stylesheet in the hosting document. The clone carries the
    // text itself, not references into the live tree.
    let style_selector = Selector::parse("style")
        .map_err(|e| Error::CloneError(format!("style selector: {:?}", e)))?;
    let stylesheets: Vec<String> = parsed
        .select(&style_selector)
        .map(|style| style.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect();

    let resources = collect_resources(root, &ignored, base_url.as_deref());

    log::debug!(
        "cloned '{}': {} bytes of markup, {} stylesheet(s), {} resource(s)",
        target.selector(),
        markup.len(),
        stylesheets.len(),
        resources.len()
    );

    Ok(Snapshot {
        markup,
        stylesheets,
        resources,
        base_url,
        viewport: Viewport {
            width: options.window_width,
            height: options.window_height,
        },
        scale: options.scale,
        scroll: (options.scroll_x, options.scroll_y),
    })
}

fn serialize_element(element: ElementRef<'_>, ignored: &HashSet<ego_tree::NodeId>, out: &mut String) {
    if ignored.contains(&element.id()) {
        return;
    }
    let name = element.value().name();
    if name == "script" {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        push_escaped(value, true, out);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            serialize_element(child_element, ignored, out);
        } else if let Some(text) = child.value().as_text() {
            push_escaped(text, false, out);
        }
        // Comments, doctypes, and processing instructions are not copied.
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped(text: &str, in_attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn collect_resources(
    root: ElementRef<'_>,
    ignored: &HashSet<ego_tree::NodeId>,
    base_url: Option<&str>,
) -> Vec<ResourceRef> {
    let mut resources = Vec::new();
    let mut seen = HashSet::new();
    let base = base_url.and_then(|b| Url::parse(b).ok());

    for descendant in root.descendants() {
        let Some(element) = ElementRef::wrap(descendant) else {
            continue;
        };
        if ignored.contains(&element.id()) || element.value().name() != "img" {
            continue;
        }
        // Ignored ancestors were skipped during serialization too.
        if element
            .ancestors()
            .any(|ancestor| ignored.contains(&ancestor.id()))
        {
            continue;
        }
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        if src.trim().is_empty() {
            continue;
        }
        let resource = classify_resource(src, base.as_ref());
        if seen.insert(resource.url.clone()) {
            resources.push(resource);
        }
    }
    resources
}

fn classify_resource(src: &str, base: Option<&Url>) -> ResourceRef {
    if src.starts_with("data:") {
        return ResourceRef {
            url: src.to_string(),
            cross_origin: false,
        };
    }
    match base {
        Some(base) => match base.join(src) {
            Ok(resolved) => {
                let cross_origin = resolved.origin() != base.origin();
                ResourceRef {
                    url: resolved.to_string(),
                    cross_origin,
                }
            }
            Err(_) => ResourceRef {
                url: src.to_string(),
                cross_origin: false,
            },
        },
        None => {
            // Absolute references without a document origin to compare
            // against are conservatively treated as cross-origin.
            let cross_origin = Url::parse(src).is_ok();
            ResourceRef {
                url: src.to_string(),
                cross_origin,
            }
        }
    }
}
