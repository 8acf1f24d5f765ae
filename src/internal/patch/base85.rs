//! Decoding for binary hunk payloads: GNU base85 groups and zlib inflation.

use std::io::Read;

use flate2::read::ZlibDecoder;

/// The base85 alphabet binary patches are encoded with.
const EN85: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

fn de85(ch: u8) -> Option<u32> {
    EN85.iter().position(|&c| c == ch).map(|i| i as u32)
}

/// Decode `len` bytes out of base85 `src`. Every 5 input characters carry 4
/// output bytes; the final group may carry fewer.
pub fn decode_85(src: &[u8], len: usize) -> Result<Vec<u8>, String> {
    let mut dst = Vec::with_capacity(len);
    let mut remaining = len;
    let mut input = src.iter();

    let mut next = || -> Result<u32, String> {
        let ch = *input.next().ok_or("truncated base85 sequence")?;
        de85(ch).ok_or_else(|| format!("invalid base85 alphabet {}", ch as char))
    };

    while remaining > 0 {
        let mut acc: u32 = 0;
        for _ in 0..4 {
            acc = acc * 85 + next()?;
        }
        let de = next()?;
        acc = acc
            .checked_mul(85)
            .and_then(|a| a.checked_add(de))
            .ok_or("invalid base85 sequence")?;

        let cnt = remaining.min(4);
        remaining -= cnt;
        for _ in 0..cnt {
            acc = acc.rotate_left(8);
            dst.push((acc & 0xff) as u8);
        }
    }
    Ok(dst)
}

/// Inflate a zlib stream; the result must be exactly `expected_len` bytes.
pub fn inflate(data: &[u8], expected_len: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut decoder = ZlibDecoder::new(data);
    decoder.read_to_end(&mut out).ok()?;
    if out.len() != expected_len {
        return None;
    }
    Some(out)
}
