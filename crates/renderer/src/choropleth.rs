//! Choropleth maps of per-cell values on a grid template.

use biodiv_common::{BiodivError, BiodivResult, CellMap, Color, ColorRamp, GridTemplate};
use geo::LineString;
use serde::{Deserialize, Serialize};
use tiny_skia::{ColorU8, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use crate::legend::{draw_legend, LEGEND_HEIGHT};

/// Appearance of a choropleth map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStyle {
    /// Edge length of one grid cell in pixels
    pub pixels_per_cell: u32,
    pub ramp: ColorRamp,
    /// Fill for cells without a value
    pub background: Color,
    pub coastline_color: Color,
    pub coastline_width: f32,
    /// Draw the colour bar strip under the map
    pub legend: bool,
    pub text_color: Color,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            pixels_per_cell: 4,
            ramp: ColorRamp::builtin("viridis").unwrap_or(ColorRamp { stops: Vec::new() }),
            background: Color::transparent(),
            coastline_color: Color::rgba(60, 60, 60, 255),
            coastline_width: 1.0,
            legend: true,
            text_color: Color::rgba(20, 20, 20, 255),
        }
    }
}

/// Canvas size for `template` under `style`.
pub fn map_dimensions(template: &GridTemplate, style: &MapStyle) -> BiodivResult<(u32, u32)> {
    let ppc = style.pixels_per_cell.max(1);
    let scaled = |cells: usize| u32::try_from(cells).ok().and_then(|n| n.checked_mul(ppc));
    let legend = if style.legend { LEGEND_HEIGHT } else { 0 };

    match (scaled(template.ncols), scaled(template.nrows).and_then(|h| h.checked_add(legend))) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(BiodivError::RenderError(format!(
            "{}x{} cells at {} pixels per cell exceed the canvas size limit",
            template.ncols, template.nrows, ppc
        ))),
    }
}

/// Draw `values` on `template`, one square of `pixels_per_cell` per cell.
///
/// The ramp is stretched over the observed min/max. Coastline lines must be
/// in the template's CRS and are stroked over the cells.
pub fn render_choropleth(
    template: &GridTemplate,
    values: &CellMap<f64>,
    coastline: &[LineString<f64>],
    style: &MapStyle,
) -> BiodivResult<Pixmap> {
    style
        .ramp
        .validate()
        .map_err(|e| BiodivError::RenderError(format!("invalid colour ramp: {}", e)))?;

    let ppc = style.pixels_per_cell.max(1) as usize;
    let (width, height) = map_dimensions(template, style)?;
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        BiodivError::RenderError(format!("cannot allocate a {}x{} canvas", width, height))
    })?;

    let (r, g, b, a) = style.background.to_rgba();
    pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

    let (min, max) = value_range(values);
    let ramp = style.ramp.rescaled(min, max);
    let canvas_width = width as usize;
    let pixels = pixmap.pixels_mut();

    for (&cell, &value) in values {
        let Some((row, col)) = template.row_col(cell) else {
            return Err(BiodivError::RenderError(format!("{} is outside the grid", cell)));
        };
        let (r, g, b, a) = ramp.color_for(value).to_rgba();
        let color = ColorU8::from_rgba(r, g, b, a).premultiply();
        for py in row * ppc..(row + 1) * ppc {
            let start = py * canvas_width + col * ppc;
            pixels[start..start + ppc].fill(color);
        }
    }

    if !coastline.is_empty() {
        stroke_coastline(&mut pixmap, template, coastline, style);
    }

    if style.legend && !values.is_empty() {
        let top = (template.nrows * ppc) as f32;
        draw_legend(&mut pixmap, top, &style.ramp, min, max, &style.text_color);
    }

    debug!(
        cells = values.len(),
        width = width,
        height = height,
        min = min,
        max = max,
        "Rendered choropleth"
    );

    Ok(pixmap)
}

/// Min and max of the map values; (0, 0) when there are none.
pub fn value_range(values: &CellMap<f64>) -> (f64, f64) {
    let mut iter = values.values().copied().filter(|v| v.is_finite());
    let Some(first) = iter.next() else {
        return (0.0, 0.0);
    };
    iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn stroke_coastline(pixmap: &mut Pixmap, template: &GridTemplate, lines: &[LineString<f64>], style: &MapStyle) {
    let ppc = style.pixels_per_cell.max(1) as f64;
    let to_px = |x: f64, y: f64| -> (f32, f32) {
        (
            ((x - template.extent.min_x) / template.res_x * ppc) as f32,
            ((template.extent.max_y - y) / template.res_y * ppc) as f32,
        )
    };

    let mut pb = PathBuilder::new();
    for line in lines {
        let mut points = line.coords().map(|c| to_px(c.x, c.y));
        let Some((x0, y0)) = points.next() else {
            continue;
        };
        pb.move_to(x0, y0);
        for (x, y) in points {
            pb.line_to(x, y);
        }
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let (r, g, b, a) = style.coastline_color.to_rgba();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: style.coastline_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    // The legend strip stays clear of map strokes
    let map_height = template.nrows as f32 * ppc as f32;
    let clip = tiny_skia::Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, map_height)
        .and_then(|rect| {
            let mut mask = tiny_skia::Mask::new(pixmap.width(), pixmap.height())?;
            mask.fill_path(
                &PathBuilder::from_rect(rect),
                tiny_skia::FillRule::Winding,
                false,
                Transform::identity(),
            );
            Some(mask)
        });
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), clip.as_ref());
}
