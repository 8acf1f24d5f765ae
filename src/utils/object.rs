//! Loose blob storage: zlib-deflated, SHA-1 content-addressed files under
//! `objects/xx/<38 hex>`, with a `blob <len>\0` header.

use std::fs;
use std::io;
use std::io::{Read, Write};
use std::path::PathBuf;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use crate::utils::path;

/// SHA-1 of `data` as a blob object, in hex.
pub fn hash_blob(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn object_path(hash: &str) -> PathBuf {
    path::objects().join(&hash[..2]).join(&hash[2..])
}

pub fn has_blob(hash: &str) -> bool {
    hash.len() == 40 && object_path(hash).is_file()
}

/// Store `data` as a loose blob, returning its hash. Writing an object that
/// already exists is a no-op.
pub fn write_blob(data: &[u8]) -> io::Result<String> {
    let hash = hash_blob(data);
    let target = object_path(&hash);
    if target.is_file() {
        return Ok(hash);
    }
    fs::create_dir_all(target.parent().unwrap())?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(format!("blob {}\0", data.len()).as_bytes())?;
    encoder.write_all(data)?;
    fs::write(&target, encoder.finish()?)?;
    Ok(hash)
}

/// Read a loose blob back, stripping and validating the header.
pub fn read_blob(hash: &str) -> io::Result<Vec<u8>> {
    let compressed = fs::read(object_path(hash))?;
    let mut raw = Vec::new();
    ZlibDecoder::new(&compressed[..]).read_to_end(&mut raw)?;
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "object header missing"))?;
    let header = String::from_utf8_lossy(&raw[..nul]);
    let declared: usize = header
        .strip_prefix("blob ")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "not a blob object"))?;
    let data = raw.split_off(nul + 1);
    if data.len() != declared {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("blob {hash} length mismatch"),
        ));
    }
    Ok(data)
}
