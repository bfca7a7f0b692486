//! LZW (spec §4.1), via `weezl` — the teacher's own `lzw` crate is
//! decode-only and unmaintained (see SPEC_FULL AMBIENT STACK); `weezl`
//! supports both directions and the PDF "early change" parameter.

use crate::error::{self, Result};
use weezl::{decode::Decoder, encode::Encoder, BitOrder};

pub fn decode(data: &[u8], early_change: bool, max_size: usize) -> Result<Vec<u8>> {
    // weezl's `new` constructor matches GIF-style early code-size change;
    // `with_tiff_size_switch` matches the non-early-change TIFF variant.
    // PDF's `/EarlyChange` parameter (default 1) picks between the two.
    let mut decoder = if early_change {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    decoder
        .into_stream(&mut out)
        .decode_all(data)
        .status
        .map_err(|e| {
            error::FilterDecodeSnafu {
                stage: "LZWDecode",
                reason: e.to_string(),
            }
            .build()
        })?;
    if out.len() > max_size {
        return error::DecompressionLimitSnafu.fail();
    }
    Ok(out)
}

pub fn encode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut encoder = if early_change {
        Encoder::new(BitOrder::Msb, 8)
    } else {
        Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    encoder
        .into_stream(&mut out)
        .encode_all(data)
        .status
        .map_err(|e| {
            error::FilterDecodeSnafu {
                stage: "LZWEncode",
                reason: e.to_string(),
            }
            .build()
        })?;
    Ok(out)
}
