//! The apply session: resolving each patch's preimage (in-memory chain,
//! index, or working tree), applying, recording results in the file table,
//! and writing everything back out under the index lock.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::internal::index::{Index, IndexEntry};
use crate::utils::{object, path, util};

use super::applier;
use super::parse::{parse_patch_stream, reverse_patches, ParseContext};
use super::reject::{self, say_patch_name};
use super::stats;
use super::ws::{WsErrorAction, WS_DEFAULT_RULE};
use super::{FileEntry, Patch, PatchError, Ternary};

/// Everything the CLI surface decides about a session.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub apply: bool,
    pub check: bool,
    pub check_index: bool,
    pub cached: bool,
    pub diffstat: bool,
    pub numstat: bool,
    pub summary: bool,
    pub apply_in_reverse: bool,
    pub apply_with_reject: bool,
    pub apply_verbosely: bool,
    pub no_add: bool,
    pub unidiff_zero: bool,
    pub inaccurate_eof: bool,
    pub recount: bool,
    pub p_value: usize,
    pub p_value_known: bool,
    /// Context floor: the matcher may not shrink context below this many
    /// lines. The default forbids shrinking entirely.
    pub p_context: usize,
    pub ws_action: WsErrorAction,
    pub ws_rule: u32,
    pub squelch_ws_errors: usize,
    /// `--directory` root, normalized to end with `/`.
    pub root: Option<String>,
    /// `--include`/`--exclude` patterns in option order; `true` marks include.
    pub limit_by_name: Vec<(String, bool)>,
    pub has_include: bool,
    /// `\n` normally, NUL under `-z`.
    pub line_termination: u8,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            apply: true,
            check: false,
            check_index: false,
            cached: false,
            diffstat: false,
            numstat: false,
            summary: false,
            apply_in_reverse: false,
            apply_with_reject: false,
            apply_verbosely: false,
            no_add: false,
            unidiff_zero: false,
            inaccurate_eof: false,
            recount: false,
            p_value: 1,
            p_value_known: false,
            p_context: usize::MAX,
            ws_action: WsErrorAction::default(),
            ws_rule: WS_DEFAULT_RULE,
            squelch_ws_errors: 5,
            root: None,
            limit_by_name: Vec::new(),
            has_include: false,
            line_termination: b'\n',
        }
    }
}

/// Whitespace bookkeeping shared between parse and apply.
#[derive(Debug, Default)]
pub struct WsState {
    pub error_count: usize,
    pub applied_after_fixing: usize,
}

/// Where a patch's preimage bytes come from.
enum Source {
    Empty,
    Memory(Vec<u8>),
    Blob(String),
    WorkTree,
}

/// Resolve a patch path against the repository working directory when inside
/// a repository, or the current directory otherwise.
pub(crate) fn target_path(name: &str) -> PathBuf {
    if util::repo_exists() {
        util::workdir_to_absolute(name)
    } else {
        PathBuf::from(name)
    }
}

fn read_old_data(path: &Path) -> Result<Vec<u8>, PatchError> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        Ok(target.to_string_lossy().into_owned().into_bytes())
    } else {
        Ok(fs::read(path)?)
    }
}

/// Advisory lock guarding index write-back; released on every exit path.
struct LockFile {
    path: PathBuf,
    committed: bool,
}

impl LockFile {
    fn acquire(target: &Path) -> Result<Self, PatchError> {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                PatchError::Apply(format!("unable to create '{}': {e}", path.display()))
            })?;
        Ok(Self {
            path,
            committed: false,
        })
    }

    /// Replace `target` with the lock file contents written by the caller.
    fn commit(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Shell-style pattern match for `--include`/`--exclude` (`*`, `?`, `[...]`).
fn fnmatch(pattern: &str, name: &str) -> bool {
    fn class_match(p: &[u8], c: u8) -> Option<(bool, usize)> {
        let mut i = 1;
        let negate = matches!(p.get(1), Some(&b'!') | Some(&b'^'));
        if negate {
            i += 1;
        }
        let mut matched = false;
        let mut first = true;
        while let Some(&b) = p.get(i) {
            if b == b']' && !first {
                return Some((matched != negate, i + 1));
            }
            first = false;
            if p.get(i + 1) == Some(&b'-') && p.get(i + 2).is_some_and(|&e| e != b']') {
                if b <= c && c <= p[i + 2] {
                    matched = true;
                }
                i += 3;
            } else {
                if b == c {
                    matched = true;
                }
                i += 1;
            }
        }
        None
    }

    fn matches(p: &[u8], n: &[u8]) -> bool {
        match p.first() {
            None => n.is_empty(),
            Some(&b'*') => (0..=n.len()).any(|i| matches(&p[1..], &n[i..])),
            Some(&b'?') => !n.is_empty() && matches(&p[1..], &n[1..]),
            Some(&b'[') => match n.first().and_then(|&c| class_match(p, c)) {
                Some((true, consumed)) => matches(&p[consumed..], &n[1..]),
                _ => false,
            },
            Some(&c) => n.first() == Some(&c) && matches(&p[1..], &n[1..]),
        }
    }

    matches(pattern.as_bytes(), name.as_bytes())
}

pub struct Session {
    pub opts: ApplyOptions,
    pub patches: Vec<Patch>,
    pub ws: WsState,
    fn_table: HashMap<String, FileEntry>,
    index: Option<Index>,
    index_dirty: bool,
    lock: Option<LockFile>,
    update_index: bool,
    skipped_patches: usize,
}

impl Session {
    pub fn new(opts: ApplyOptions) -> Self {
        Self {
            opts,
            patches: Vec::new(),
            ws: WsState::default(),
            fn_table: HashMap::new(),
            index: None,
            index_dirty: false,
            lock: None,
            update_index: false,
            skipped_patches: 0,
        }
    }

    /// Process one patch input end to end. Returns `true` when any patch in
    /// it failed or was rejected.
    pub fn run(&mut self, buffer: &[u8], input_name: &str) -> Result<bool, PatchError> {
        self.fn_table.clear();

        let mut ctx = ParseContext {
            line_nr: 1,
            p_value: self.opts.p_value,
            p_value_known: self.opts.p_value_known,
            root: self.opts.root.clone(),
            reverse: self.opts.apply_in_reverse,
            ws_action: self.opts.ws_action,
            default_ws_rule: self.opts.ws_rule,
            squelch_ws_errors: self.opts.squelch_ws_errors,
            ws_error_count: self.ws.error_count,
            input_name: input_name.to_string(),
            apply_or_check: self.opts.apply || self.opts.check,
        };
        let mut patches =
            parse_patch_stream(&mut ctx, buffer, self.opts.inaccurate_eof, self.opts.recount)?;
        self.ws.error_count = ctx.ws_error_count;

        if self.opts.apply_in_reverse {
            reverse_patches(&mut patches);
        }

        let mut skipped = 0;
        patches.retain(|patch| {
            let keep = self.use_patch(patch);
            if !keep {
                skipped += 1;
            }
            keep
        });
        self.patches = patches;
        self.skipped_patches = skipped;
        tracing::debug!(
            patches = self.patches.len(),
            skipped,
            "parsed patch input {input_name}"
        );

        let mut apply = self.opts.apply;
        if self.ws.error_count > 0 && self.opts.ws_action == WsErrorAction::Die {
            apply = false;
        }
        self.update_index = self.opts.check_index && apply;

        if self.opts.check_index && self.index.is_none() {
            if self.update_index {
                self.lock = Some(LockFile::acquire(&path::index())?);
            }
            let index = Index::load(path::index())
                .map_err(|e| PatchError::Apply(format!("unable to read index file: {e}")))?;
            self.index = Some(index);
        }

        let mut errs = false;
        if self.opts.check || apply {
            let failed = self.check_patch_list();
            if failed && !self.opts.apply_with_reject {
                return Ok(true);
            }
            errs |= failed;
        }

        if apply && self.write_out_results()? {
            errs = true;
        }

        if self.opts.diffstat {
            stats::print_diffstat(&self.patches);
        }
        if self.opts.numstat {
            stats::print_numstat(&self.patches, self.opts.line_termination);
        }
        if self.opts.summary {
            stats::print_summary(&self.patches);
        }

        Ok(errs)
    }

    /// Session wrap-up: whitespace error summary and index commit.
    pub fn finish(&mut self) -> Result<(), PatchError> {
        if self.ws.error_count > 0 {
            if self.opts.squelch_ws_errors > 0 && self.opts.squelch_ws_errors < self.ws.error_count
            {
                let squelched = self.ws.error_count - self.opts.squelch_ws_errors;
                eprintln!(
                    "warning: squelched {squelched} whitespace error{}",
                    if squelched == 1 { "" } else { "s" }
                );
            }
            if self.opts.ws_action == WsErrorAction::Die {
                return Err(PatchError::WhitespaceViolation {
                    count: self.ws.error_count,
                });
            }
            if self.ws.applied_after_fixing > 0 && self.opts.apply {
                eprintln!(
                    "warning: {} line{} applied after fixing whitespace errors.",
                    self.ws.applied_after_fixing,
                    if self.ws.applied_after_fixing == 1 { "" } else { "s" }
                );
            } else {
                eprintln!(
                    "warning: {} line{} add{} whitespace errors.",
                    self.ws.error_count,
                    if self.ws.error_count == 1 { "" } else { "s" },
                    if self.ws.error_count == 1 { "s" } else { "" }
                );
            }
        }

        if self.update_index && self.index_dirty {
            let lock = self
                .lock
                .take()
                .ok_or_else(|| PatchError::Apply("index lock lost".to_string()))?;
            let index = self.index.as_ref().expect("index loaded");
            index.save(&lock.path)?;
            lock.commit(&path::index())
                .map_err(|e| PatchError::Apply(format!("unable to write new index file: {e}")))?;
        }
        Ok(())
    }

    fn use_patch(&self, patch: &Patch) -> bool {
        let pathname = patch.output_name();
        for (pattern, include) in &self.opts.limit_by_name {
            if fnmatch(pattern, pathname) {
                return *include;
            }
        }
        // If we had any include, a path matching no rule is not used;
        // otherwise we saw a bunch of excludes (or none) and it is used.
        !self.opts.has_include
    }

    /// Record incoming deletions so a later creation at the same path knows
    /// it is the second half of a type-change split.
    fn prepare_fn_table(&mut self) {
        for patch in &self.patches {
            if patch.new_name.is_none() || patch.is_rename {
                if let Some(old_name) = &patch.old_name {
                    self.fn_table
                        .insert(old_name.clone(), FileEntry::ToBeDeleted);
                }
            }
        }
    }

    fn add_to_fn_table(&mut self, idx: usize) {
        let patch = &self.patches[idx];
        // Always record new_name unless the patch is a deletion; this covers
        // normal diffs, creations and copies.
        if let Some(new_name) = &patch.new_name {
            self.fn_table
                .insert(new_name.clone(), FileEntry::Applied(idx));
        }
        // Record a tombstone on rename/deletion so later patches cannot use
        // the old name.
        if patch.new_name.is_none() || patch.is_rename {
            if let Some(old_name) = &patch.old_name {
                self.fn_table
                    .insert(old_name.clone(), FileEntry::WasDeleted);
            }
        }
    }

    fn check_patch_list(&mut self) -> bool {
        self.prepare_fn_table();
        let mut err = false;
        for idx in 0..self.patches.len() {
            if self.opts.apply_verbosely {
                say_patch_name("Checking patch ", &self.patches[idx], "...");
            }
            if let Err(e) = self.check_patch(idx) {
                eprintln!("error: {e}");
                err = true;
            }
        }
        err
    }

    fn check_patch(&mut self, idx: usize) -> Result<(), PatchError> {
        let mut patch = std::mem::take(&mut self.patches[idx]);
        let result = self.check_patch_inner(&mut patch);
        patch.rejected = result.is_err();
        self.patches[idx] = patch;
        if result.is_ok() {
            self.add_to_fn_table(idx);
        }
        result
    }

    fn check_patch_inner(&mut self, patch: &mut Patch) -> Result<(), PatchError> {
        let source = self.check_preimage(patch)?;
        let old_name = patch.old_name.clone();
        let new_name = patch.new_name.clone();

        // A type-change diff is always split into a patch to delete the old
        // path, immediately followed by a patch to create the new one, so the
        // target existing is fine when the file table says it is on its way
        // out.
        let ok_if_exists = matches!(
            new_name.as_deref().and_then(|n| self.fn_table.get(n)),
            Some(FileEntry::WasDeleted) | Some(FileEntry::ToBeDeleted)
        );

        if let Some(new_name) = &new_name {
            if patch.is_new.is_yes() || patch.is_rename || patch.is_copy {
                if self.opts.check_index
                    && !ok_if_exists
                    && self.index.as_ref().is_some_and(|i| i.tracked(new_name))
                {
                    return Err(PatchError::Apply(format!(
                        "{new_name}: already exists in index"
                    )));
                }
                if !self.opts.cached {
                    self.check_to_create_blob(new_name, ok_if_exists)?;
                }
                if patch.new_mode == 0 {
                    patch.new_mode = if patch.is_new.is_yes() {
                        0o100644
                    } else {
                        patch.old_mode
                    };
                }
            }

            if let Some(old_name) = &old_name {
                let same = old_name == new_name;
                if patch.new_mode == 0 {
                    patch.new_mode = patch.old_mode;
                }
                if (patch.old_mode ^ patch.new_mode) & 0o170000 != 0 {
                    return Err(PatchError::Apply(format!(
                        "new mode ({:o}) of {new_name} does not match old mode ({:o}){}{}",
                        patch.new_mode,
                        patch.old_mode,
                        if same { "" } else { " of " },
                        if same { "" } else { old_name }
                    )));
                }
            }
        }

        self.apply_data(patch, source)
    }

    fn check_preimage(&mut self, patch: &mut Patch) -> Result<Source, PatchError> {
        let old_name = match patch.old_name.clone() {
            Some(name) => name,
            None => return Ok(Source::Empty),
        };

        let mut st_mode: u32 = 0;
        let mut source = Source::WorkTree;
        let mut stat_missing = false;
        let mut stat_mode: Option<u32> = None;

        let entry = if patch.is_copy || patch.is_rename {
            None
        } else {
            self.fn_table.get(&old_name).copied()
        };
        let in_memory = matches!(entry, Some(FileEntry::Applied(_)));

        match entry {
            Some(FileEntry::Applied(id)) => {
                st_mode = self.patches[id].new_mode;
                source = Source::Memory(self.patches[id].result.clone().unwrap_or_default());
            }
            Some(FileEntry::WasDeleted) => {
                return Err(PatchError::Apply(format!(
                    "{old_name}: has been deleted/renamed"
                )));
            }
            _ => {
                // ToBeDeleted marks are consumed here: the path is handled
                // like any on-disk file.
                if !self.opts.cached {
                    match fs::symlink_metadata(target_path(&old_name)) {
                        Ok(meta) => stat_mode = Some(util::file_mode(&meta)),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => stat_missing = true,
                        Err(e) => {
                            return Err(PatchError::Apply(format!("{old_name}: {e}")));
                        }
                    }
                }
            }
        }

        if self.opts.check_index && !in_memory {
            let index_entry = self
                .index
                .as_ref()
                .expect("index loaded for --index")
                .get(&old_name)
                .cloned();
            match index_entry {
                None => {
                    if patch.is_new.is_unknown() {
                        return Ok(self.promote_to_creation(patch));
                    }
                    return Err(PatchError::IndexMissing(old_name));
                }
                Some(ie) => {
                    if self.opts.cached {
                        st_mode = ie.mode;
                        source = Source::Blob(ie.hash);
                    } else if stat_missing {
                        // Staged but missing from the working tree; the
                        // staged blob is the preimage.
                        st_mode = ie.mode;
                        stat_mode = Some(ie.mode);
                        stat_missing = false;
                        source = Source::Blob(ie.hash);
                    } else {
                        let data = read_old_data(&target_path(&old_name))?;
                        if object::hash_blob(&data) != ie.hash {
                            return Err(PatchError::Apply(format!(
                                "{old_name}: does not match index"
                            )));
                        }
                        source = Source::Memory(data);
                    }
                }
            }
        } else if stat_missing {
            if patch.is_new.is_unknown() {
                return Ok(self.promote_to_creation(patch));
            }
            return Err(PatchError::Apply(format!(
                "{old_name}: No such file or directory"
            )));
        }

        if !self.opts.cached && !in_memory {
            if let Some(mode) = stat_mode {
                st_mode = mode;
            }
        }

        if patch.is_new.is_unknown() {
            patch.is_new = Ternary::No;
        }
        if patch.old_mode == 0 {
            patch.old_mode = st_mode;
        }
        if st_mode != 0 && (st_mode ^ patch.old_mode) & 0o170000 != 0 {
            return Err(PatchError::Apply(format!("{old_name}: wrong type")));
        }
        if st_mode != 0 && st_mode != patch.old_mode {
            eprintln!(
                "warning: {old_name} has type {:o}, expected {:o}",
                st_mode, patch.old_mode
            );
        }
        if patch.new_mode == 0 && !patch.is_delete.is_yes() {
            patch.new_mode = st_mode;
        }
        Ok(source)
    }

    /// A patch whose target is absent and whose creation flag was still
    /// undecided turns into a creation.
    fn promote_to_creation(&self, patch: &mut Patch) -> Source {
        patch.is_new = Ternary::Yes;
        patch.is_delete = Ternary::No;
        patch.old_name = None;
        Source::Empty
    }

    fn check_to_create_blob(&self, new_name: &str, ok_if_exists: bool) -> Result<(), PatchError> {
        match fs::symlink_metadata(target_path(new_name)) {
            Ok(meta) => {
                if meta.is_dir() || ok_if_exists {
                    Ok(())
                } else {
                    Err(PatchError::PathConflict(new_name.to_string()))
                }
            }
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory =>
            {
                Ok(())
            }
            Err(e) => Err(PatchError::Apply(format!("{new_name}: {e}"))),
        }
    }

    fn apply_data(&mut self, patch: &mut Patch, source: Source) -> Result<(), PatchError> {
        let buf = match source {
            Source::Empty => Vec::new(),
            Source::Memory(data) => data,
            Source::Blob(hash) => object::read_blob(&hash)
                .map_err(|_| PatchError::Apply(format!("read of {} failed", patch.best_name())))?,
            Source::WorkTree => {
                let name = patch.old_name.clone().expect("worktree source has a name");
                read_old_data(&target_path(&name))
                    .map_err(|_| PatchError::Apply(format!("read of {name} failed")))?
            }
        };

        let mut image = if patch.is_binary {
            super::image::Image {
                buf,
                lines: Vec::new(),
            }
        } else {
            super::image::Image::from_bytes(buf)
        };

        applier::apply_fragments(&self.opts, &mut self.ws, &mut image, patch)?;

        if patch.is_delete.is_yes() && !image.buf.is_empty() {
            return Err(PatchError::Apply(
                "removal patch leaves file contents".to_string(),
            ));
        }
        patch.result = Some(image.buf);
        Ok(())
    }

    fn write_out_results(&mut self) -> Result<bool, PatchError> {
        if self.patches.is_empty() && self.skipped_patches == 0 {
            eprintln!("error: No changes");
            return Ok(true);
        }

        let mut errs = false;
        // phase zero removes, phase one creates
        for phase in 0..2 {
            for idx in 0..self.patches.len() {
                if self.patches[idx].rejected {
                    errs = true;
                    continue;
                }
                self.write_out_one_result(idx, phase)?;
                if phase == 1 && reject::write_out_one_reject(&self.patches[idx], self.opts.apply_verbosely)? {
                    errs = true;
                }
            }
        }
        Ok(errs)
    }

    fn write_out_one_result(&mut self, idx: usize, phase: usize) -> Result<(), PatchError> {
        let patch = std::mem::take(&mut self.patches[idx]);
        let result = self.write_out_one_result_inner(&patch, phase);
        self.patches[idx] = patch;
        result
    }

    fn write_out_one_result_inner(&mut self, patch: &Patch, phase: usize) -> Result<(), PatchError> {
        if patch.is_delete.is_yes() {
            if phase == 0 {
                self.remove_file(patch, true)?;
            }
            return Ok(());
        }
        if patch.is_new.is_yes() || patch.is_copy {
            if phase == 1 {
                self.create_file(patch)?;
            }
            return Ok(());
        }
        // Rename or modification boils down to the same thing: remove the
        // old, write the new.
        if phase == 0 {
            self.remove_file(patch, patch.is_rename)?;
        }
        if phase == 1 {
            self.create_file(patch)?;
        }
        Ok(())
    }

    fn remove_file(&mut self, patch: &Patch, rmdir_empty: bool) -> Result<(), PatchError> {
        let old_name = match &patch.old_name {
            Some(name) => name,
            None => return Ok(()),
        };
        if self.update_index {
            if let Some(index) = self.index.as_mut() {
                if index.remove(old_name) {
                    self.index_dirty = true;
                }
            }
        }
        if !self.opts.cached {
            let target = target_path(old_name);
            match fs::remove_file(&target) {
                Ok(()) => {
                    if rmdir_empty {
                        util::clear_empty_dir(&target);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(_) => eprintln!("warning: unable to unlink {old_name}"),
            }
        }
        Ok(())
    }

    fn create_file(&mut self, patch: &Patch) -> Result<(), PatchError> {
        let new_name = patch.new_name.as_deref().expect("creation has a new name");
        let mode = if patch.new_mode != 0 {
            patch.new_mode
        } else {
            0o100644
        };
        let empty = Vec::new();
        let buf = patch.result.as_ref().unwrap_or(&empty);
        self.create_one_file(new_name, mode, buf)?;
        self.add_index_file(new_name, mode, buf)
    }

    fn create_one_file(&self, name: &str, mode: u32, buf: &[u8]) -> Result<(), PatchError> {
        if self.opts.cached {
            return Ok(());
        }
        let target = target_path(name);
        let first_try = try_create_file(&target, mode, buf);
        let err = match first_try {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if err.kind() == io::ErrorKind::NotFound {
            // Optimistically assumed the directories exist; create them and
            // try again.
            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            if try_create_file(&target, mode, buf).is_ok() {
                return Ok(());
            }
        }

        // We may be trying to create a file where a directory used to be.
        if let Ok(meta) = fs::symlink_metadata(&target) {
            if meta.is_dir() {
                let _ = fs::remove_dir(&target);
                if try_create_file(&target, mode, buf).is_ok() {
                    return Ok(());
                }
            }
        }

        // The target exists: write through a temporary and rename into place.
        let tmp = PathBuf::from(format!("{}~{}", target.display(), std::process::id()));
        try_create_file(&tmp, mode, buf)
            .map_err(|e| PatchError::Apply(format!("unable to write file {name} mode {mode:o}: {e}")))?;
        fs::rename(&tmp, &target).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PatchError::Apply(format!("unable to write file {name} mode {mode:o}: {e}"))
        })?;
        Ok(())
    }

    fn add_index_file(&mut self, name: &str, mode: u32, buf: &[u8]) -> Result<(), PatchError> {
        if !self.update_index {
            return Ok(());
        }
        let hash = object::write_blob(buf).map_err(|e| {
            PatchError::Apply(format!(
                "unable to create backing store for newly created file {name}: {e}"
            ))
        })?;
        self.index.as_mut().expect("index loaded").add(IndexEntry {
            name: name.to_string(),
            mode,
            hash,
        });
        self.index_dirty = true;
        Ok(())
    }
}

/// Write a file with `O_CREAT | O_EXCL` semantics; symlink modes become
/// actual symlinks.
fn try_create_file(path: &Path, mode: u32, buf: &[u8]) -> io::Result<()> {
    if mode == 0o120000 {
        #[cfg(unix)]
        {
            let target = String::from_utf8_lossy(buf).into_owned();
            return std::os::unix::fs::symlink(target, path);
        }
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(buf)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let bits = if mode & 0o100 != 0 { 0o755 } else { 0o644 };
        file.set_permissions(fs::Permissions::from_mode(bits))?;
    }
    Ok(())
}
