//! The paint seam and the built-in block paint engine.
//!
//! The pipeline only guarantees scheduling and lifecycle correctness; what
//! the pixels look like is the engine's business. [`BlockPaintEngine`] is a
//! deliberately simple software engine: it lays the snapshot out as a
//! vertical stack of blocks, lowers them to a small paint-command list, and
//! rasterizes those commands into the output surface. Richer engines can
//! read the snapshot's frozen stylesheets; this one does not.

use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::options::ResolvedOptions;
use crate::resources::AssetCache;
use crate::snapshot::Snapshot;
use crate::surface::{Color, Surface};

/// Consumes a snapshot and produces pixels into the output surface.
///
/// The engine owns surface sizing: it must reset the surface to the
/// target's bounding size times the configured scale before drawing.
pub trait PaintEngine: Send {
    fn paint(
        &mut self,
        snapshot: &Snapshot,
        assets: &AssetCache,
        surface: &mut Surface,
        options: &ResolvedOptions,
    ) -> Result<()>;
}

const PAGE_MARGIN: u32 = 8;
const LINE_HEIGHT: u32 = 8;
const CHAR_WIDTH: u32 = 8;
const IMAGE_WIDTH: u32 = 120;
const IMAGE_HEIGHT: u32 = 80;

const INK: Color = Color::BLACK;
const IMAGE_FILL: Color = Color { r: 180, g: 180, b: 180, a: 255 };
const IMAGE_BORDER: Color = Color { r: 96, g: 96, b: 96, a: 255 };

#[derive(Debug, Clone, PartialEq)]
enum BlockKind {
    Heading,
    Paragraph,
    Image { url: String },
}

#[derive(Debug, Clone)]
struct LayoutBlock {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    kind: BlockKind,
    lines: Vec<String>,
    text_scale: u32,
}

/// Paint commands lowered from the layout, in paint order
#[derive(Debug, Clone, PartialEq)]
enum PaintCommand {
    SolidRect { x: i32, y: i32, width: u32, height: u32, color: Color },
    Text { x: i32, y: i32, line: String, text_scale: u32 },
}

/// The built-in block layout engine
#[derive(Debug, Default)]
pub struct BlockPaintEngine;

impl BlockPaintEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PaintEngine for BlockPaintEngine {
    fn paint(
        &mut self,
        snapshot: &Snapshot,
        assets: &AssetCache,
        surface: &mut Surface,
        options: &ResolvedOptions,
    ) -> Result<()> {
        let blocks = layout(snapshot);
        let content_width = snapshot.viewport().width.max(2 * PAGE_MARGIN);
        let content_height = blocks
            .iter()
            .map(|b| (b.y + b.height as i32).max(0) as u32)
            .max()
            .unwrap_or(0)
            + PAGE_MARGIN;

        let scale = snapshot.scale();
        surface.reset(
            scale_len(content_width, scale),
            scale_len(content_height, scale),
            scale,
            options.background_color,
        );

        let commands = lower(&blocks, assets);
        log::debug!(
            "painting {} block(s) as {} command(s) at scale {}",
            blocks.len(),
            commands.len(),
            scale
        );
        rasterize(&commands, snapshot.scroll(), scale, surface);
        Ok(())
    }
}

fn scale_len(len: u32, scale: f32) -> u32 {
    ((len as f32) * scale).ceil() as u32
}

/// Stack the snapshot's renderable content vertically: headings at double
/// text scale, paragraphs wrapped at an estimated character width, images
/// as fixed boxes.
fn layout(snapshot: &Snapshot) -> Vec<LayoutBlock> {
    let fragment = Html::parse_fragment(snapshot.markup());
    let content_width = snapshot.viewport().width.max(2 * PAGE_MARGIN);
    let inner_width = content_width - 2 * PAGE_MARGIN;

    let mut blocks = Vec::new();
    let mut y = PAGE_MARGIN as i32;

    for node in fragment.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                push_text_block(&mut blocks, &mut y, element, inner_width, 2, BlockKind::Heading);
            }
            "p" | "li" | "blockquote" | "pre" => {
                push_text_block(&mut blocks, &mut y, element, inner_width, 1, BlockKind::Paragraph);
            }
            "img" => {
                let Some(src) = element.value().attr("src") else {
                    continue;
                };
                let url = resolve_reference(src, snapshot);
                let width = IMAGE_WIDTH.min(inner_width);
                blocks.push(LayoutBlock {
                    x: PAGE_MARGIN as i32,
                    y,
                    width,
                    height: IMAGE_HEIGHT,
                    kind: BlockKind::Image { url },
                    lines: Vec::new(),
                    text_scale: 1,
                });
                y += IMAGE_HEIGHT as i32 + PAGE_MARGIN as i32;
            }
            _ => {}
        }
    }

    // A subtree with no block-level content still paints its bare text.
    if blocks.is_empty() {
        let text = fragment.root_element().text().collect::<String>();
        if !text.trim().is_empty() {
            let lines = wrap(&text, inner_width, 1);
            let height = (lines.len() as u32) * LINE_HEIGHT + PAGE_MARGIN;
            blocks.push(LayoutBlock {
                x: PAGE_MARGIN as i32,
                y,
                width: inner_width,
                height,
                kind: BlockKind::Paragraph,
                lines,
                text_scale: 1,
            });
        }
    }

    blocks
}

fn push_text_block(
    blocks: &mut Vec<LayoutBlock>,
    y: &mut i32,
    element: ElementRef<'_>,
    inner_width: u32,
    text_scale: u32,
    kind: BlockKind,
) {
    let text = element.text().collect::<String>();
    if text.trim().is_empty() {
        return;
    }
    let lines = wrap(&text, inner_width, text_scale);
    let height = (lines.len() as u32) * LINE_HEIGHT * text_scale + PAGE_MARGIN;
    blocks.push(LayoutBlock {
        x: PAGE_MARGIN as i32,
        y: *y,
        width: inner_width,
        height,
        kind,
        lines,
        text_scale,
    });
    *y += height as i32 + PAGE_MARGIN as i32;
}

/// Greedy word wrap at an estimated glyph width
fn wrap(text: &str, inner_width: u32, text_scale: u32) -> Vec<String> {
    let chars_per_line = (inner_width / (CHAR_WIDTH * text_scale)).max(1) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > chars_per_line {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Re-resolve an in-markup reference the way the cloner did, so image
/// blocks key into the asset cache by resolved URL.
fn resolve_reference(src: &str, snapshot: &Snapshot) -> String {
    snapshot
        .resources()
        .iter()
        .find(|r| r.url == src || r.url.ends_with(src))
        .map(|r| r.url.clone())
        .unwrap_or_else(|| src.to_string())
}

fn lower(blocks: &[LayoutBlock], assets: &AssetCache) -> Vec<PaintCommand> {
    let mut commands = Vec::new();
    for block in blocks {
        match &block.kind {
            BlockKind::Image { url } => {
                // Absent assets paint as absent.
                if assets.contains(url) {
                    commands.push(PaintCommand::SolidRect {
                        x: block.x,
                        y: block.y,
                        width: block.width,
                        height: block.height,
                        color: IMAGE_BORDER,
                    });
                    commands.push(PaintCommand::SolidRect {
                        x: block.x + 2,
                        y: block.y + 2,
                        width: block.width.saturating_sub(4),
                        height: block.height.saturating_sub(4),
                        color: IMAGE_FILL,
                    });
                }
            }
            BlockKind::Heading | BlockKind::Paragraph => {
                let mut line_y = block.y;
                for line in &block.lines {
                    commands.push(PaintCommand::Text {
                        x: block.x,
                        y: line_y,
                        line: line.clone(),
                        text_scale: block.text_scale,
                    });
                    line_y += (LINE_HEIGHT * block.text_scale) as i32;
                }
            }
        }
    }
    commands
}

fn rasterize(commands: &[PaintCommand], scroll: (i32, i32), scale: f32, surface: &mut Surface) {
    let offset = |v: i32, shift: i32| (((v - shift) as f32) * scale).round() as i32;
    for command in commands {
        match command {
            PaintCommand::SolidRect { x, y, width, height, color } => {
                surface.fill_rect(
                    offset(*x, scroll.0),
                    offset(*y, scroll.1),
                    scale_len(*width, scale),
                    scale_len(*height, scale),
                    *color,
                );
            }
            PaintCommand::Text { x, y, line, text_scale } => {
                // Each glyph becomes a filled cell; crude, but deterministic
                // and proportional to the text it stands for.
                let cell = CHAR_WIDTH * text_scale;
                for (i, c) in line.chars().enumerate() {
                    if c.is_whitespace() {
                        continue;
                    }
                    surface.fill_rect(
                        offset(*x + (i as u32 * cell) as i32, scroll.0),
                        offset(*y + 1, scroll.1),
                        scale_len(cell - 1, scale),
                        scale_len(LINE_HEIGHT * text_scale - 2, scale),
                        INK,
                    );
                }
            }
        }
    }
}
