//! The unified-diff patch engine: stream parsing, fuzzy application against
//! preimages, whitespace correction, binary hunks, and reject emission.

pub mod applier;
pub mod base85;
pub mod header;
pub mod image;
pub mod matcher;
pub mod parse;
pub mod pipeline;
pub mod reject;
pub mod stats;
pub mod ws;

use std::io;

use thiserror::Error;

/// Identifies a patch inside the session arena; the file table refers to
/// patches by id rather than by reference.
pub type PatchId = usize;

/// Three-state flag for properties the patch stream may leave undeclared
/// until enough of the patch has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ternary {
    #[default]
    Unknown,
    No,
    Yes,
}

impl Ternary {
    pub fn is_yes(self) -> bool {
        self == Ternary::Yes
    }

    pub fn is_unknown(self) -> bool {
        self == Ternary::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryMethod {
    Delta,
    Literal,
}

/// One decoded binary hunk; `data` is already inflated to the original length
/// declared in the hunk header.
#[derive(Debug, Clone)]
pub struct BinaryHunk {
    pub method: BinaryMethod,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BinaryPatch {
    pub forward: BinaryHunk,
    /// Present only for reversible binary patches.
    pub reverse: Option<BinaryHunk>,
}

/// One hunk, delimited by a `@@ -a,b +c,d @@` header. `raw` keeps the header
/// and body verbatim for reject files.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub old_pos: usize,
    pub old_lines: usize,
    pub new_pos: usize,
    pub new_lines: usize,
    /// Unchanged context line counts at each end of the hunk body.
    pub leading: usize,
    pub trailing: usize,
    pub raw: Vec<u8>,
    pub rejected: bool,
}

/// One logical file change: names, modes, flags, and the hunks to apply.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    /// Name derived from the `diff --git` header, used as a fallback when the
    /// extended headers never name the file (mode-only changes, empty files).
    pub def_name: Option<String>,
    pub old_mode: u32,
    pub new_mode: u32,
    pub is_new: Ternary,
    pub is_delete: Ternary,
    pub is_rename: bool,
    pub is_copy: bool,
    pub is_binary: bool,
    pub is_toplevel_relative: bool,
    pub inaccurate_eof: bool,
    pub recount: bool,
    pub rejected: bool,
    /// Similarity score (0-100) from rename/copy headers.
    pub score: u32,
    pub ws_rule: u32,
    pub lines_added: usize,
    pub lines_deleted: usize,
    pub old_sha1_prefix: String,
    pub new_sha1_prefix: String,
    pub fragments: Vec<Fragment>,
    pub binary: Option<BinaryPatch>,
    pub result: Option<Vec<u8>>,
}

impl Patch {
    /// The name a diagnostic should call this patch.
    pub fn best_name(&self) -> &str {
        self.old_name
            .as_deref()
            .or(self.new_name.as_deref())
            .unwrap_or("(unknown)")
    }

    pub fn output_name(&self) -> &str {
        self.new_name
            .as_deref()
            .or(self.old_name.as_deref())
            .unwrap_or("(unknown)")
    }
}

/// What the file table knows about a path touched earlier in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEntry {
    /// A previous patch produced this path; its result is the current
    /// in-memory contents.
    Applied(PatchId),
    WasDeleted,
    /// Reserved for the delete half of a type-change split.
    ToBeDeleted,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch fragment without header at line {line}: {text}")]
    FragmentWithoutHeader { line: usize, text: String },
    #[error("malformed patch header at line {line}: {msg}")]
    MalformedHeader { line: usize, msg: String },
    #[error("corrupt patch at line {0}")]
    Corrupt(usize),
    #[error("corrupt binary patch at line {line}: {text}")]
    CorruptBinary { line: usize, text: String },
    #[error("unrecognized binary patch at line {0}")]
    UnrecognizedBinary(usize),
    #[error("patch with only garbage at line {0}")]
    OnlyGarbage(usize),
    #[error("unrecognized whitespace option '{0}'")]
    BadWhitespaceOption(String),
    #[error("cannot reverse-apply a binary patch without the reverse hunk to '{0}'")]
    IrreversibleBinary(String),
    #[error("the patch applies to '{name}' ({hash}), which does not match the current contents")]
    PreimageMismatch { name: String, hash: String },
    #[error("{0}: already exists in working directory")]
    PathConflict(String),
    #[error("{0}: does not exist in index")]
    IndexMissing(String),
    #[error("{count} lines add whitespace errors")]
    WhitespaceViolation { count: usize },
    #[error("new file {0} depends on old contents")]
    NewFileDependsOnOld(String),
    #[error("deleted file {0} still has contents")]
    DeletedFileHasContents(String),
    #[error("{0}")]
    Apply(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
