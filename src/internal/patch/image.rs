//! In-memory file images: a byte buffer plus a line table covering it
//! contiguously. The pre/postimage of every fragment and the target file are
//! all images; application splices one image into another.

/// Marks a line that appears unchanged on both sides of a hunk.
pub const LINE_COMMON: u8 = 1;

/// A line is `len` bytes long, including the terminating LF except for an
/// incomplete final line. The hash ignores whitespace so the matcher can
/// cheaply skip candidates that cannot match even with whitespace fuzz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub len: usize,
    pub hash: u32,
    pub flag: u8,
}

/// Whitespace-insensitive rolling hash of one line, truncated to 24 bits.
pub fn hash_line(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_whitespace() {
            h = h.wrapping_mul(3).wrapping_add(b as u32);
        }
    }
    h & 0x00ff_ffff
}

/// Length of the first line in `buf`, including its LF when present.
pub fn line_len(buf: &[u8]) -> usize {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => pos + 1,
        None => buf.len(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Image {
    pub buf: Vec<u8>,
    pub lines: Vec<Line>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image over `buf`, splitting it into LF-terminated lines.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let len = line_len(&buf[offset..]);
            lines.push(Line {
                len,
                hash: hash_line(&buf[offset..offset + len]),
                flag: 0,
            });
            offset += len;
        }
        Self { buf, lines }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one line, keeping the buffer and line table in lockstep.
    pub fn push_line(&mut self, bytes: &[u8], flag: u8) {
        self.lines.push(Line {
            len: bytes.len(),
            hash: hash_line(bytes),
            flag,
        });
        self.buf.extend_from_slice(bytes);
    }

    /// Byte offset where logical line `lno` starts.
    pub fn start_of_line(&self, lno: usize) -> usize {
        self.lines[..lno].iter().map(|l| l.len).sum()
    }

    pub fn remove_first_line(&mut self) {
        let len = self.lines[0].len;
        self.buf.drain(..len);
        self.lines.remove(0);
    }

    pub fn remove_last_line(&mut self) {
        let line = self.lines.pop().expect("image has no lines");
        self.buf.truncate(self.buf.len() - line.len);
    }

    /// Drop a trailing LF shared by an inaccurately terminated file, keeping
    /// the line table consistent with the buffer.
    pub fn strip_final_newline(&mut self) {
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if let Some(last) = self.lines.last_mut() {
                last.len -= 1;
            }
        }
    }

    /// Replace the preimage-sized run of lines starting at `pos` with the
    /// postimage, splicing both the byte buffer and the line table.
    pub fn update(&mut self, pos: usize, preimage: &Image, postimage: &Image) {
        let start = self.start_of_line(pos);
        let remove: usize = self.lines[pos..pos + preimage.lines.len()]
            .iter()
            .map(|l| l.len)
            .sum();
        self.buf
            .splice(start..start + remove, postimage.buf.iter().copied());
        self.lines.splice(
            pos..pos + preimage.lines.len(),
            postimage.lines.iter().copied(),
        );
    }
}
