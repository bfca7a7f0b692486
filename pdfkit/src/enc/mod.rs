//! The filter pipeline (C2): turns a stream's still-encoded bytes into the
//! decoded bytes the semantic layer (C4) and content processor (C6) work
//! with, and turns them back for the optimizer's recompression pass (C10).
//!
//! A stream's `/Filter` entry (spec §4.1) is always a chain: a single name
//! or an array of names, each with an optional parallel `/DecodeParms`
//! dictionary. [`decode_stream`] and [`encode_stream`] walk that chain.

mod ascii85;
mod asciihex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use predictor::PredictorParams;

use crate::error::{self, Result};
use crate::object::{Dictionary, Primitive, Resolve};

/// Ceiling on a single filter stage's decoded output, enforced independently
/// at each stage of the chain (spec §4.1, "MaxDecompressedSize" / I2).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Filter {
    ASCIIHexDecode,
    ASCII85Decode,
    LZWDecode,
    FlateDecode,
    RunLengthDecode,
    /// Named but intentionally unimplemented (image codecs handled by the
    /// `image` crate at the optimizer boundary, not by this pipeline —
    /// spec §1 Non-goals: decoding image *pixel* data is out of scope here).
    DCTDecode,
    CCITTFaxDecode,
    JPXDecode,
}

impl Filter {
    pub fn from_name(name: &str) -> Result<Filter> {
        Ok(match name {
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            "JPXDecode" => Filter::JPXDecode,
            other => return error::UnsupportedFilterSnafu { name: other.to_string() }.fail(),
        })
    }

    /// Whether this filter pipeline stage can re-encode as well as decode.
    /// Image codecs are opaque passthroughs here; see module docs.
    pub fn is_text_filter(self) -> bool {
        !matches!(self, Filter::DCTDecode | Filter::CCITTFaxDecode | Filter::JPXDecode)
    }
}

/// One `/DecodeParms` entry, minimal subset actually consumed by the chain.
#[derive(Clone, Default, Debug)]
pub struct DecodeParms {
    pub predictor: Option<PredictorParams>,
    pub early_change: bool,
}

fn parse_decode_parms(dict: Option<&Dictionary>, resolve: &dyn Resolve) -> Result<DecodeParms> {
    let Some(dict) = dict else {
        return Ok(DecodeParms::default());
    };
    let predictor = match dict.get("Predictor") {
        Some(p) => {
            let predictor = p.clone().resolve(resolve)?.as_integer()?;
            if predictor <= 1 {
                None
            } else {
                let columns = field_default(dict, "Columns", 1, resolve)?;
                let colors = field_default(dict, "Colors", 1, resolve)?;
                let bpc = field_default(dict, "BitsPerComponent", 8, resolve)?;
                Some(PredictorParams {
                    predictor: predictor as u8,
                    columns: columns as usize,
                    colors: colors as usize,
                    bits_per_component: bpc as usize,
                })
            }
        }
        None => None,
    };
    let early_change = match dict.get("EarlyChange") {
        Some(p) => p.clone().resolve(resolve)?.as_integer()? != 0,
        None => true,
    };
    Ok(DecodeParms { predictor, early_change })
}

fn field_default(dict: &Dictionary, key: &str, default: i64, resolve: &dyn Resolve) -> Result<i64> {
    match dict.get(key) {
        Some(p) => p.clone().resolve(resolve)?.as_integer(),
        None => Ok(default),
    }
}

/// Normalizes `/Filter` + `/DecodeParms` (each may be a bare value or an
/// array) into a parallel list of filter stages.
pub fn filter_chain(
    filter: Option<&Primitive>,
    parms: Option<&Primitive>,
    resolve: &dyn Resolve,
) -> Result<Vec<(Filter, DecodeParms)>> {
    let filters: Vec<String> = match filter {
        None => Vec::new(),
        Some(Primitive::Name(n)) => vec![n.clone()],
        Some(other) => other
            .clone()
            .resolve(resolve)?
            .into_array()?
            .into_iter()
            .map(|p| p.resolve(resolve)?.into_name())
            .collect::<Result<_>>()?,
    };
    let parms_list: Vec<Option<Dictionary>> = match parms {
        None => vec![None; filters.len()],
        Some(Primitive::Dictionary(d)) => vec![Some(d.clone())],
        Some(other) => other
            .clone()
            .resolve(resolve)?
            .into_array()?
            .into_iter()
            .map(|p| match p.resolve(resolve)? {
                Primitive::Null => Ok(None),
                other => Ok(Some(other.into_dictionary()?)),
            })
            .collect::<Result<_>>()?,
    };

    filters
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let filter = Filter::from_name(&name)?;
            let parms = parse_decode_parms(parms_list.get(i).and_then(|p| p.as_ref()), resolve)?;
            Ok((filter, parms))
        })
        .collect()
}

/// Decodes `data` through every stage of `chain`, bounding each stage's
/// output by `max_size` (spec §4.1 I2).
pub fn decode_stream(data: &[u8], chain: &[(Filter, DecodeParms)], max_size: usize) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    for (filter, parms) in chain {
        buf = decode_stage(&buf, *filter, parms, max_size)?;
    }
    Ok(buf)
}

fn decode_stage(data: &[u8], filter: Filter, parms: &DecodeParms, max_size: usize) -> Result<Vec<u8>> {
    let decoded = match filter {
        Filter::ASCIIHexDecode => asciihex::decode(data)?,
        Filter::ASCII85Decode => ascii85::decode(data)?,
        Filter::LZWDecode => lzw::decode(data, parms.early_change, max_size)?,
        Filter::FlateDecode => flate::decode(data, max_size)?,
        Filter::RunLengthDecode => runlength::decode(data)?,
        Filter::DCTDecode | Filter::CCITTFaxDecode | Filter::JPXDecode => data.to_vec(),
    };
    if decoded.len() > max_size {
        return error::DecompressionLimitSnafu.fail();
    }
    match &parms.predictor {
        Some(p) if filter.is_text_filter() => predictor::undo(&decoded, p),
        _ => Ok(decoded),
    }
}

/// Re-encodes `data` through `chain`, in the same order it would be decoded
/// (i.e. encoding runs stages in reverse, since the *last* filter listed is
/// applied last when encoding an already-plain stream fresh). The optimizer
/// (C10) only ever calls this with a freshly-chosen, single-stage chain.
pub fn encode_stream(data: &[u8], chain: &[(Filter, DecodeParms)]) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    for (filter, parms) in chain.iter().rev() {
        buf = encode_stage(&buf, *filter, parms)?;
    }
    Ok(buf)
}

fn encode_stage(data: &[u8], filter: Filter, parms: &DecodeParms) -> Result<Vec<u8>> {
    let data = match &parms.predictor {
        Some(p) if filter.is_text_filter() => predictor::apply(data, p),
        _ => data.to_vec(),
    };
    match filter {
        Filter::ASCIIHexDecode => Ok(asciihex::encode(&data)),
        Filter::ASCII85Decode => Ok(ascii85::encode(&data)),
        Filter::LZWDecode => lzw::encode(&data, parms.early_change),
        Filter::FlateDecode => Ok(flate::encode(&data)),
        Filter::RunLengthDecode => Ok(runlength::encode(&data)),
        Filter::DCTDecode | Filter::CCITTFaxDecode | Filter::JPXDecode => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flate_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let chain = vec![(Filter::FlateDecode, DecodeParms::default())];
        let encoded = encode_stream(&data, &chain).unwrap();
        let decoded = decode_stream(&encoded, &chain, DEFAULT_MAX_DECOMPRESSED_SIZE).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn chained_ascii85_then_flate_round_trips() {
        let data = b"some content stream bytes, repeated ".repeat(8);
        let chain = vec![
            (Filter::FlateDecode, DecodeParms::default()),
            (Filter::ASCII85Decode, DecodeParms::default()),
        ];
        let encoded = encode_stream(&data, &chain).unwrap();
        let decoded = decode_stream(&encoded, &chain, DEFAULT_MAX_DECOMPRESSED_SIZE).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn decompression_limit_is_enforced() {
        let data = vec![0u8; 1024];
        let chain = vec![(Filter::FlateDecode, DecodeParms::default())];
        let encoded = encode_stream(&data, &chain).unwrap();
        let err = decode_stream(&encoded, &chain, 16).unwrap_err();
        assert!(matches!(err, crate::error::PdfError::DecompressionLimit));
    }
}
