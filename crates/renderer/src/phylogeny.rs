//! Circular ("fan") phylogeny figures.
//!
//! Tips are spread evenly around the circle in tree order and every node
//! sits at a radius proportional to its distance from the root. Each edge
//! is a radial segment; each internal node gets an arc spanning its
//! children. Branches are coloured by clade.

use std::f64::consts::PI;
use std::fmt::Write;

use biodiv_common::{BiodivError, BiodivResult, Color};
use phylo::{CladeAssignment, NodeId, PhyloTree};
use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;
use tracing::debug;

/// Fallback colours for clades without one configured.
pub const DEFAULT_CLADE_COLORS: &[&str] = &["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];

/// Appearance of the phylogeny figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeStyle {
    /// Width and height of the square figure in pixels
    pub size: u32,
    pub tip_labels: bool,
    pub font_size: f32,
    pub stroke_width: f32,
    /// Colour of branches outside every clade
    pub branch_color: Color,
    /// Colour per clade, in clade order
    pub clade_colors: Vec<Color>,
    pub background: Color,
}

impl Default for TreeStyle {
    fn default() -> Self {
        Self {
            size: 800,
            tip_labels: true,
            font_size: 11.0,
            stroke_width: 1.5,
            branch_color: Color::rgba(90, 90, 90, 255),
            clade_colors: Vec::new(),
            background: Color::rgba(255, 255, 255, 255),
        }
    }
}

impl TreeStyle {
    /// Colour of clade `index`.
    pub fn clade_color(&self, index: usize) -> Color {
        self.clade_colors.get(index).cloned().unwrap_or_else(|| {
            Color::Hex(DEFAULT_CLADE_COLORS[index % DEFAULT_CLADE_COLORS.len()].to_string())
        })
    }

    fn edge_color(&self, clades: &CladeAssignment, node: NodeId) -> String {
        match clades.clade_index(node) {
            Some(i) => self.clade_color(i).to_hex(),
            None => self.branch_color.to_hex(),
        }
    }
}

/// Polar position of every node, indexed by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularLayout {
    /// Angle in radians, clockwise from east in screen coordinates
    pub angles: Vec<f64>,
    /// Distance from the center
    pub radii: Vec<f64>,
}

impl CircularLayout {
    /// Lay `tree` out on a circle of `radius`, the first tip at 12 o'clock.
    pub fn new(tree: &PhyloTree, radius: f64) -> Self {
        let n = tree.len();
        let mut angles = vec![0.0; n];

        let tips: Vec<NodeId> = tree.tips().collect();
        let step = 2.0 * PI / tips.len().max(1) as f64;
        for (i, tip) in tips.iter().enumerate() {
            angles[tip.index()] = -PI / 2.0 + i as f64 * step;
        }
        // Children always have larger ids than their parent
        for id in (0..n).rev().map(NodeId) {
            let children = tree.children(id);
            if let (Some(first), Some(last)) = (children.first(), children.last()) {
                angles[id.index()] = (angles[first.index()] + angles[last.index()]) / 2.0;
            }
        }

        let height = tree.height();
        let scale = if height > 0.0 { radius / height } else { 0.0 };
        let radii = tree.node_depths().into_iter().map(|d| d * scale).collect();

        Self { angles, radii }
    }

    /// Offset of a node from the center.
    pub fn position(&self, id: NodeId) -> (f64, f64) {
        self.point(self.radii[id.index()], self.angles[id.index()])
    }

    fn point(&self, radius: f64, angle: f64) -> (f64, f64) {
        (radius * angle.cos(), radius * angle.sin())
    }
}

/// Draw `tree` as a circular SVG figure.
pub fn render_tree_svg(tree: &PhyloTree, clades: &CladeAssignment, style: &TreeStyle) -> String {
    let size = style.size as f64;
    let center = size / 2.0;
    let margin = if style.tip_labels {
        size * 0.2
    } else {
        style.stroke_width as f64 * 4.0
    };
    let radius = (center - margin).max(1.0);
    let layout = CircularLayout::new(tree, radius);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{0}" viewBox="0 0 {0} {0}">"#,
        style.size
    );
    let (_, _, _, bg_alpha) = style.background.to_rgba();
    if bg_alpha > 0 {
        let _ = writeln!(
            svg,
            r#"<rect width="{0}" height="{0}" fill="{1}"/>"#,
            style.size,
            style.background.to_hex()
        );
    }

    let _ = writeln!(
        svg,
        r#"<g id="branches" fill="none" stroke-linecap="round" stroke-width="{}" transform="translate({:.2} {:.2})">"#,
        style.stroke_width, center, center
    );
    for id in tree.preorder() {
        let color = style.edge_color(clades, id);
        let angle = layout.angles[id.index()];
        let r = layout.radii[id.index()];

        if let Some(parent) = tree.parent(id) {
            let (x0, y0) = layout.point(layout.radii[parent.index()], angle);
            let (x1, y1) = layout.point(r, angle);
            let _ = writeln!(
                svg,
                r#"<path d="M{:.2},{:.2} L{:.2},{:.2}" stroke="{}"/>"#,
                x0, y0, x1, y1, color
            );
        }

        let children = tree.children(id);
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            let start = layout.angles[first.index()];
            let end = layout.angles[last.index()];
            if end - start > 1e-9 && r > 0.0 {
                let (x0, y0) = layout.point(r, start);
                let (x1, y1) = layout.point(r, end);
                let large_arc = u8::from(end - start > PI);
                let _ = writeln!(
                    svg,
                    r#"<path d="M{:.2},{:.2} A{:.2},{:.2} 0 {} 1 {:.2},{:.2}" stroke="{}"/>"#,
                    x0, y0, r, r, large_arc, x1, y1, color
                );
            }
        }
    }
    svg.push_str("</g>\n");

    if style.tip_labels {
        let _ = writeln!(
            svg,
            r#"<g id="tip-labels" font-family="sans-serif" font-style="italic" font-size="{}" transform="translate({:.2} {:.2})">"#,
            style.font_size, center, center
        );
        let gap = style.font_size as f64 * 0.5;
        for tip in tree.tips() {
            let label = tree.node(tip).label.as_deref().unwrap_or_default();
            let angle = layout.angles[tip.index()];
            let (x, y) = layout.point(layout.radii[tip.index()] + gap, angle);
            let mut degrees = angle.to_degrees();
            // Keep text upright on the left half
            let anchor = if angle.cos() < 0.0 {
                degrees += 180.0;
                "end"
            } else {
                "start"
            };
            let _ = writeln!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="{}" dominant-baseline="middle" transform="rotate({:.2} {:.2} {:.2})" fill="{}">{}</text>"#,
                x,
                y,
                anchor,
                degrees,
                x,
                y,
                style.branch_color.to_hex(),
                escape_xml(&label.replace('_', " "))
            );
        }
        svg.push_str("</g>\n");
    }

    if !clades.clades().is_empty() {
        svg.push_str(r#"<g id="clade-legend" font-family="sans-serif" font-size="12">"#);
        svg.push('\n');
        for (i, clade) in clades.clades().iter().enumerate() {
            let y = 12.0 + i as f64 * 18.0;
            let color = style.clade_color(i).to_hex();
            let _ = writeln!(
                svg,
                r#"<rect x="10" y="{:.1}" width="12" height="12" fill="{}"/><text x="28" y="{:.1}">{}</text>"#,
                y,
                color,
                y + 10.0,
                escape_xml(&clade.name)
            );
        }
        svg.push_str("</g>\n");
    }

    svg.push_str("</svg>\n");

    debug!(
        nodes = tree.len(),
        tips = tree.num_tips(),
        clades = clades.clades().len(),
        bytes = svg.len(),
        "Rendered circular phylogeny"
    );

    svg
}

/// Rasterize an SVG document onto a `width` x `height` canvas, scaled to fit
/// and centered.
pub fn rasterize_svg(svg: &str, width: u32, height: u32) -> BiodivResult<Pixmap> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| BiodivError::RenderError(format!("invalid SVG: {}", e)))?;

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        BiodivError::RenderError(format!("cannot allocate a {}x{} canvas", width, height))
    })?;

    let svg_size = tree.size();
    let scale = (width as f32 / svg_size.width()).min(height as f32 / svg_size.height());
    let offset_x = (width as f32 - svg_size.width() * scale) / 2.0;
    let offset_y = (height as f32 - svg_size.height() * scale) / 2.0;

    let transform = tiny_skia::Transform::from_scale(scale, scale).post_translate(offset_x, offset_y);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Ok(pixmap)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
