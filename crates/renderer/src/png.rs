//! PNG encoding for rendered figures.
//!
//! Choropleths are drawn from a colour ramp over a few hundred distinct
//! values at most, so most maps fit an indexed PNG (color type 3). Images
//! with more than 256 colours fall back to RGBA (color type 6).
//!
//! Use [`encode_pixmap`] for tiny-skia canvases and [`create_png_auto`]
//! for raw straight-alpha RGBA buffers.

use std::collections::HashMap;
use std::io::Write;

use biodiv_common::{BiodivError, BiodivResult};
use rayon::prelude::*;
use tiny_skia::Pixmap;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

type Palette = Vec<(u8, u8, u8, u8)>;

/// Encode a tiny-skia canvas, undoing its premultiplied alpha first.
pub fn encode_pixmap(pixmap: &Pixmap) -> BiodivResult<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    create_png_auto(&rgba, pixmap.width() as usize, pixmap.height() as usize)
}

/// Create a PNG, indexed when the image has at most 256 colours.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> BiodivResult<Vec<u8>> {
    check_buffer(pixels, width, height)?;
    let num_pixels = width * height;

    let palette_result = if num_pixels >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette_sequential(pixels)
    };

    match palette_result {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

fn check_buffer(pixels: &[u8], width: usize, height: usize) -> BiodivResult<()> {
    if width == 0 || height == 0 {
        return Err(BiodivError::RenderError(format!(
            "cannot encode an empty {}x{} image",
            width, height
        )));
    }
    if pixels.len() != width * height * 4 {
        return Err(BiodivError::RenderError(format!(
            "RGBA buffer holds {} bytes, expected {} for {}x{}",
            pixels.len(),
            width * height * 4,
            width,
            height
        )));
    }
    Ok(())
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

#[inline(always)]
fn unpack_color(packed: u32) -> (u8, u8, u8, u8) {
    (
        packed as u8,
        (packed >> 8) as u8,
        (packed >> 16) as u8,
        (packed >> 24) as u8,
    )
}

fn extract_palette_sequential(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk[0], chunk[1], chunk[2], chunk[3]);

        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Two parallel passes: collect per-chunk colour sets, then map pixels to
/// palette indices once the merged set is known to fit.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let chunk_pixels = (pixels.len() / 4 / rayon::current_num_threads()).max(256);
    let chunk_size = chunk_pixels * 4;

    let unique_colors: Vec<u32> = pixels
        .par_chunks(chunk_size)
        .flat_map(|chunk| {
            let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for pixel in chunk.chunks_exact(4) {
                local.insert(pack_color(pixel[0], pixel[1], pixel[2], pixel[3]), ());
                if local.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local.into_keys().collect::<Vec<_>>()
        })
        .collect();

    let mut global_colors: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    for packed in unique_colors {
        if !global_colors.contains_key(&packed) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            global_colors.insert(packed, palette.len() as u8);
            palette.push(unpack_color(packed));
        }
    }

    let mut indices = vec![0u8; pixels.len() / 4];
    indices
        .par_chunks_mut(chunk_pixels)
        .zip(pixels.par_chunks(chunk_size))
        .for_each(|(idx_chunk, pixel_chunk)| {
            for (idx, pixel) in idx_chunk.iter_mut().zip(pixel_chunk.chunks_exact(4)) {
                let packed = pack_color(pixel[0], pixel[1], pixel[2], pixel[3]);
                *idx = global_colors.get(&packed).copied().unwrap_or(0);
            }
        });

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from a palette and one index per pixel.
///
/// A tRNS chunk is written only when some palette entry is translucent.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
) -> BiodivResult<Vec<u8>> {
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(BiodivError::RenderError(format!(
            "indexed PNG needs 1 to {} palette entries, got {}",
            MAX_PALETTE_SIZE,
            palette.len()
        )));
    }
    if indices.len() != width * height {
        return Err(BiodivError::RenderError(format!(
            "{} palette indices for a {}x{} image",
            indices.len(),
            width,
            height
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|&(_, _, _, a)| a < 255) {
        let trns: Vec<u8> = palette.iter().map(|&(_, _, _, a)| a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create an RGBA PNG (color type 6) from straight-alpha pixel data.
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> BiodivResult<Vec<u8>> {
    check_buffer(pixels, width, height)?;

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));

    let idat = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(color_type);
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    ihdr
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each `row_bytes`-long scanline with filter type 0 and deflate.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> BiodivResult<Vec<u8>> {
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(&uncompressed)
        .and_then(|_| encoder.finish())
        .map_err(|e| BiodivError::RenderError(format!("IDAT compression failed: {}", e)))
}
