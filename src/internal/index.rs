//! The staging index: a sorted set of `(path, mode, hash)` entries persisted
//! in a binary file with a SHA-1 trailer checksum.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use sha1::{Digest, Sha1};

const INDEX_SIGNATURE: &[u8; 4] = b"MIDX";
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub mode: u32,
    pub hash: String,
}

#[derive(Debug, Default)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read(path)?;
        if data.len() < 12 + 20 {
            return Err(invalid("index file too short"));
        }
        let (body, trailer) = data.split_at(data.len() - 20);
        let checksum = Sha1::digest(body);
        if checksum.as_slice() != trailer {
            return Err(invalid("index checksum mismatch"));
        }

        let mut cursor = Cursor::new(body);
        let mut signature = [0u8; 4];
        cursor.read_exact(&mut signature)?;
        if &signature != INDEX_SIGNATURE {
            return Err(invalid("not an index file"));
        }
        if cursor.read_u32::<BigEndian>()? != INDEX_VERSION {
            return Err(invalid("unsupported index version"));
        }
        let count = cursor.read_u32::<BigEndian>()?;

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let mode = cursor.read_u32::<BigEndian>()?;
            let mut hash = [0u8; 20];
            cursor.read_exact(&mut hash)?;
            let name_len = cursor.read_u16::<BigEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            cursor.read_exact(&mut name)?;
            let name = String::from_utf8(name).map_err(|_| invalid("non-UTF8 index path"))?;
            entries.insert(
                name.clone(),
                IndexEntry {
                    name,
                    mode,
                    hash: hex::encode(hash),
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut body = Vec::new();
        body.write_all(INDEX_SIGNATURE)?;
        body.write_u32::<BigEndian>(INDEX_VERSION)?;
        body.write_u32::<BigEndian>(self.entries.len() as u32)?;
        for entry in self.entries.values() {
            body.write_u32::<BigEndian>(entry.mode)?;
            let raw = hex::decode(&entry.hash).map_err(|_| invalid("bad hash in index"))?;
            body.write_all(&raw)?;
            body.write_u16::<BigEndian>(entry.name.len() as u16)?;
            body.write_all(entry.name.as_bytes())?;
        }
        let checksum = Sha1::digest(&body);
        body.extend_from_slice(checksum.as_slice());
        fs::write(path, body)
    }

    pub fn add(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn update(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.get(name)
    }

    pub fn tracked(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn verify_hash(&self, name: &str, hash: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.hash == hash)
    }

    pub fn tracked_entries(&self) -> Vec<&IndexEntry> {
        self.entries.values().collect()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}
