use crate::error::{self, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Read;

pub fn decode(data: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .by_ref()
        .take(max_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| {
            error::FilterDecodeSnafu {
                stage: "FlateDecode",
                reason: e.to_string(),
            }
            .build()
        })?;
    Ok(out)
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    std::io::Write::write_all(&mut encoder, data).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}
