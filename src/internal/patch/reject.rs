//! Reject files: `.rej` sidecars carrying verbatim the hunks that did not
//! apply, plus the patch-name diagnostics shared with the checker.

use std::fs;
use std::io::Write;

use super::header::quote_c_style;
use super::pipeline::target_path;
use super::{Patch, PatchError};

const PATH_MAX: usize = 4096;

/// The name a patch should be called in diagnostics, quoted when needed and
/// showing `old => new` for renames.
pub fn display_name(patch: &Patch) -> String {
    let quote = |name: &str| quote_c_style(name).unwrap_or_else(|| name.to_string());
    match (&patch.old_name, &patch.new_name) {
        (Some(old), Some(new)) if old != new => format!("{} => {}", quote(old), quote(new)),
        _ => quote(patch.output_name()),
    }
}

pub fn say_patch_name(pre: &str, patch: &Patch, post: &str) {
    eprintln!("{pre}{}{post}", display_name(patch));
}

/// Emit `<new_name>.rej` for a patch with rejected fragments. Returns `true`
/// when rejects were written (the session must then exit nonzero).
pub fn write_out_one_reject(patch: &Patch, verbose: bool) -> Result<bool, PatchError> {
    let rejected = patch.fragments.iter().filter(|f| f.rejected).count();
    if rejected == 0 {
        if verbose {
            say_patch_name("Applied patch ", patch, " cleanly.");
        }
        return Ok(false);
    }

    let name = patch
        .new_name
        .as_deref()
        .ok_or_else(|| PatchError::Apply("internal error: reject without new name".to_string()))?;

    // Say this even without --verbose.
    say_patch_name("Applying patch ", patch, &format!(" with {rejected} rejects..."));

    let mut name = name.to_string();
    if name.len() + 5 > PATH_MAX {
        name.truncate(PATH_MAX - 5);
        eprintln!("warning: truncating .rej filename to {name}.rej");
    }

    let rej_path = target_path(&format!("{name}.rej"));
    let mut rej = fs::File::create(&rej_path).map_err(|e| {
        PatchError::Apply(format!("cannot open {}: {e}", rej_path.display()))
    })?;

    // Normal tools never deal with .rej, so do not pretend this is a git
    // patch by saying --git nor give extended headers. The trailing TAB and
    // the note at the end of the line keep "kompare" happy.
    writeln!(rej, "diff a/{name} b/{name}\t(rejected hunks)")?;
    for (nr, frag) in patch.fragments.iter().enumerate() {
        if !frag.rejected {
            eprintln!("Hunk #{} applied cleanly.", nr + 1);
            continue;
        }
        eprintln!("Rejected hunk #{}.", nr + 1);
        rej.write_all(&frag.raw)?;
        if frag.raw.last() != Some(&b'\n') {
            writeln!(rej)?;
        }
    }
    Ok(true)
}
