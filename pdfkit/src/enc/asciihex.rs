use crate::error::{self, Result};

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'>' {
            break;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        let d = (b as char).to_digit(16).ok_or_else(|| {
            error::FilterDecodeSnafu {
                stage: "ASCIIHexDecode",
                reason: format!("invalid hex digit {:#x}", b),
            }
            .build()
        })?;
        digits.push(d as u8);
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2 + 1);
    for &b in data {
        out.extend_from_slice(format!("{:02X}", b).as_bytes());
    }
    out.push(b'>');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"PDF stream bytes".to_vec();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }
}
