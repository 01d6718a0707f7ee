//! Colour bar legend with min/max labels.
//!
//! Labels are drawn as seven-segment glyphs stroked with tiny-skia, so the
//! renderer needs no font files.

use biodiv_common::{Color, ColorRamp};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Height of the legend strip below a map, in pixels.
pub const LEGEND_HEIGHT: u32 = 40;

const MARGIN: f32 = 8.0;
const BAR_HEIGHT: f32 = 10.0;
const GLYPH_HEIGHT: f32 = 12.0;

//  aaa
// f   b
//  ggg
// e   c
//  ddd
const SEG_A: u8 = 1;
const SEG_B: u8 = 1 << 1;
const SEG_C: u8 = 1 << 2;
const SEG_D: u8 = 1 << 3;
const SEG_E: u8 = 1 << 4;
const SEG_F: u8 = 1 << 5;
const SEG_G: u8 = 1 << 6;

const DIGITS: [u8; 10] = [
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F,
    SEG_B | SEG_C,
    SEG_A | SEG_B | SEG_G | SEG_E | SEG_D,
    SEG_A | SEG_B | SEG_G | SEG_C | SEG_D,
    SEG_F | SEG_G | SEG_B | SEG_C,
    SEG_A | SEG_F | SEG_G | SEG_C | SEG_D,
    SEG_A | SEG_F | SEG_G | SEG_E | SEG_C | SEG_D,
    SEG_A | SEG_B | SEG_C,
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_F | SEG_G,
];

/// Legend label for a value: integers plainly, other values with one decimal.
pub fn format_legend_value(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Draw a horizontal colour bar for `ramp` over [min, max] into the strip
/// starting at `top`, with the two extremes labelled underneath.
pub fn draw_legend(pixmap: &mut Pixmap, top: f32, ramp: &ColorRamp, min: f64, max: f64, text_color: &Color) {
    let width = pixmap.width() as f32;
    let bar_left = MARGIN;
    let bar_width = (width - 2.0 * MARGIN).max(1.0);
    let bar_top = top + 6.0;

    let ramp = ramp.rescaled(min, max);
    let steps = bar_width.ceil() as usize;
    let mut paint = Paint::default();
    paint.anti_alias = false;
    for i in 0..steps {
        let t = if steps > 1 { i as f64 / (steps - 1) as f64 } else { 0.0 };
        let (r, g, b, a) = ramp.color_for(min + t * (max - min)).to_rgba();
        paint.set_color_rgba8(r, g, b, a);
        if let Some(rect) = Rect::from_xywh(bar_left + i as f32, bar_top, 1.0, BAR_HEIGHT) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    let label_y = bar_top + BAR_HEIGHT + 4.0;
    let min_text = format_legend_value(min);
    let max_text = format_legend_value(max);
    draw_text(pixmap, bar_left, label_y, &min_text, GLYPH_HEIGHT, text_color);
    let max_left = bar_left + bar_width - text_width(&max_text, GLYPH_HEIGHT);
    draw_text(pixmap, max_left.max(bar_left), label_y, &max_text, GLYPH_HEIGHT, text_color);
}

/// Advance width of `text` drawn at `height`.
pub fn text_width(text: &str, height: f32) -> f32 {
    let (advance, _) = glyph_metrics(height);
    text.chars().count() as f32 * advance
}

fn glyph_metrics(height: f32) -> (f32, f32) {
    let glyph_width = height * 0.55;
    (glyph_width + height * 0.25, glyph_width)
}

/// Draw `text` with its top-left corner at (x, y). Characters other than
/// digits, '-' and '.' are skipped but still advance.
pub fn draw_text(pixmap: &mut Pixmap, x: f32, y: f32, text: &str, height: f32, color: &Color) {
    let (advance, glyph_width) = glyph_metrics(height);

    let (r, g, b, a) = color.to_rgba();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;

    let stroke = Stroke {
        width: (height * 0.12).max(1.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    for (i, ch) in text.chars().enumerate() {
        let left = x + i as f32 * advance;
        let mut pb = PathBuilder::new();
        glyph_path(&mut pb, ch, left, y, glyph_width, height);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

fn glyph_path(pb: &mut PathBuilder, ch: char, left: f32, top: f32, w: f32, h: f32) {
    let right = left + w;
    let mid = top + h / 2.0;
    let bottom = top + h;

    let segments = match ch {
        '0'..='9' => DIGITS[ch as usize - '0' as usize],
        '-' => SEG_G,
        '.' => {
            let cx = left + w / 2.0;
            pb.move_to(cx, bottom - h * 0.05);
            pb.line_to(cx, bottom);
            return;
        }
        _ => return,
    };

    let lines = [
        (SEG_A, (left, top), (right, top)),
        (SEG_B, (right, top), (right, mid)),
        (SEG_C, (right, mid), (right, bottom)),
        (SEG_D, (left, bottom), (right, bottom)),
        (SEG_E, (left, mid), (left, bottom)),
        (SEG_F, (left, top), (left, mid)),
        (SEG_G, (left, mid), (right, mid)),
    ];
    for (bit, (x1, y1), (x2, y2)) in lines {
        if segments & bit != 0 {
            pb.move_to(x1, y1);
            pb.line_to(x2, y2);
        }
    }
}
