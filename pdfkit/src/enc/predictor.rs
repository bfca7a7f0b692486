//! PNG and TIFF predictors (spec §4.1, SUPPLEMENTED FEATURES): Flate/LZW
//! streams carrying image samples are very commonly predictor-filtered, and
//! decoding them without undoing the predictor produces garbage pixels.

use crate::error::{self, Result};

#[derive(Copy, Clone, Debug)]
pub struct PredictorParams {
    /// 1 = none, 2 = TIFF, 10-15 = PNG (the specific PNG filter type is
    /// stored per-row, this is just "PNG predictor is in use").
    pub predictor: u8,
    pub columns: usize,
    pub colors: usize,
    pub bits_per_component: usize,
}

impl PredictorParams {
    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component) + 7) / 8
    }
    fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component + 7) / 8
    }
}

pub fn undo(data: &[u8], p: &PredictorParams) -> Result<Vec<u8>> {
    if p.predictor == 2 {
        return Ok(undo_tiff(data, p));
    }
    undo_png(data, p)
}

pub fn apply(data: &[u8], p: &PredictorParams) -> Vec<u8> {
    if p.predictor == 2 {
        return apply_tiff(data, p);
    }
    apply_png(data, p)
}

fn undo_tiff(data: &[u8], p: &PredictorParams) -> Vec<u8> {
    if p.bits_per_component != 8 {
        // sub-byte TIFF prediction is rare in the wild; pass through rather
        // than risk corrupting a stream we can't safely bit-unpack here.
        return data.to_vec();
    }
    let bpp = p.bytes_per_pixel();
    let row_bytes = p.row_bytes();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    out
}

fn apply_tiff(data: &[u8], p: &PredictorParams) -> Vec<u8> {
    if p.bits_per_component != 8 {
        return data.to_vec();
    }
    let bpp = p.bytes_per_pixel();
    let row_bytes = p.row_bytes();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in (bpp..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - bpp]);
        }
    }
    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i32, b as i32, c as i32);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn undo_png(data: &[u8], p: &PredictorParams) -> Result<Vec<u8>> {
    let bpp = p.bytes_per_pixel().max(1);
    let row_bytes = p.row_bytes();
    let stride = row_bytes + 1; // leading filter-type byte per row
    if stride == 0 {
        return error::FilterDecodeSnafu {
            stage: "Predictor",
            reason: "zero-width row".to_string(),
        }
        .fail();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    for chunk in data.chunks(stride) {
        if chunk.len() < 2 {
            break;
        }
        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();
        row.resize(row_bytes, 0);
        for i in 0..row.len() {
            let a = if i >= bpp { row[i - bpp] } else { 0 };
            let b = prev_row[i];
            let c = if i >= bpp { prev_row[i - bpp] } else { 0 };
            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(a),
                2 => row[i].wrapping_add(b),
                3 => row[i].wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(a, b, c)),
                other => {
                    return error::FilterDecodeSnafu {
                        stage: "Predictor",
                        reason: format!("unknown PNG filter type {other}"),
                    }
                    .fail()
                }
            };
        }
        out.extend_from_slice(&row);
        prev_row = row;
    }
    Ok(out)
}

fn apply_png(data: &[u8], p: &PredictorParams) -> Vec<u8> {
    // Always emits filter type 2 (Up) rows: cheap to compute and, unlike
    // type 0, still gets most of the benefit on image-like data.
    let row_bytes = p.row_bytes();
    let mut out = Vec::with_capacity(data.len() + data.len() / row_bytes.max(1) + 1);
    let mut prev_row = vec![0u8; row_bytes];
    for chunk in data.chunks(row_bytes) {
        out.push(2u8);
        for (i, &b) in chunk.iter().enumerate() {
            out.push(b.wrapping_sub(prev_row[i]));
        }
        prev_row[..chunk.len()].copy_from_slice(chunk);
    }
    out
}
