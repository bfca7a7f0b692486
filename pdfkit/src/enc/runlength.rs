use crate::error::Result;

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let count = len as usize + 1;
                let end = (i + count).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                if i >= data.len() {
                    break;
                }
                let count = 257 - len as usize;
                out.extend(std::iter::repeat(data[i]).take(count));
                i += 1;
            }
        }
    }
    Ok(out)
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 64 + 2);
    let mut i = 0;
    while i < data.len() {
        let run_end = i + data[i..].iter().take_while(|&&b| b == data[i]).count();
        let run_len = (run_end - i).min(128);
        if run_len >= 2 {
            out.push((257 - run_len) as u8);
            out.push(data[i]);
            i += run_len;
            continue;
        }
        let start = i;
        let mut j = i + 1;
        while j < data.len() && j - start < 128 {
            let next_run = data[j..].iter().take_while(|&&b| b == data[j]).count();
            if next_run >= 2 {
                break;
            }
            j += 1;
        }
        out.push((j - start - 1) as u8);
        out.extend_from_slice(&data[start..j]);
        i = j;
    }
    out.push(128);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_runs() {
        let data = b"aaaaaaaabcdefg hhhhhhhhhhhhhhhhhhhhhhhhhhhh".to_vec();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }

    #[test]
    fn round_trips_empty() {
        let data: Vec<u8> = Vec::new();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }
}
