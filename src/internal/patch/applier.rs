//! Applying fragments to a target image: replaying hunk bodies into pre- and
//! postimages, retrying with reduced context, and the binary literal/delta
//! path.

use crate::utils::{object, util};

use super::image::{line_len, Image, LINE_COMMON};
use super::matcher::find_pos;
use super::pipeline::{ApplyOptions, WsState};
use super::ws::{self, WsErrorAction};
use super::{BinaryMethod, Patch, PatchError};

const NULL_SHA1: &str = "0000000000000000000000000000000000000000";

/// Replay one fragment body into a preimage/postimage pair and splice the
/// postimage into `img` wherever the matcher locates the preimage. Returns
/// `Err(())` when no location can be found.
pub fn apply_one_fragment(
    opts: &ApplyOptions,
    ws_state: &mut WsState,
    img: &mut Image,
    frag: &super::Fragment,
    inaccurate_eof: bool,
    ws_rule: u32,
    hunk_nr: usize,
) -> Result<(), ()> {
    let raw = &frag.raw;
    let fix_ws = opts.ws_action == WsErrorAction::Correct;
    let mut preimage = Image::new();
    let mut postimage = Image::new();
    let mut new_blank_lines_at_end = 0;

    let mut offset = 0;
    while offset < raw.len() {
        let rest = &raw[offset..];
        let len = line_len(rest);
        if len == 0 {
            break;
        }

        // "plen" is how much of the line to use as patch data: drop the
        // marker byte, and when the next line is "\ No newline" also drop
        // the trailing newline.
        let mut plen = len as isize - 1;
        if raw.len() > offset + len && raw[offset + len] == b'\\' {
            plen -= 1;
        }
        let mut first = rest[0];
        if opts.apply_in_reverse {
            if first == b'-' {
                first = b'+';
            } else if first == b'+' {
                first = b'-';
            }
        }

        let mut added_blank_line = false;
        match first {
            b'\n' => {
                // newer GNU diff, empty context line
                if plen >= 0 {
                    preimage.push_line(b"\n", LINE_COMMON);
                    postimage.push_line(b"\n", LINE_COMMON);
                }
            }
            b' ' | b'-' | b'+' => {
                let content = &rest[1..1 + plen.max(0) as usize];
                if first != b'+' {
                    let flag = if first == b' ' { LINE_COMMON } else { 0 };
                    preimage.push_line(content, flag);
                }
                if first != b'-' && !(first == b'+' && opts.no_add) {
                    let flag = if first == b'+' { 0 } else { LINE_COMMON };
                    if first == b'+' && fix_ws && ws_state.error_count > 0 {
                        let fixed = ws::fix_copy(content, ws_rule);
                        if fixed != content {
                            ws_state.applied_after_fixing += 1;
                        }
                        added_blank_line = fixed == b"\n";
                        postimage.push_line(&fixed, flag);
                    } else {
                        added_blank_line = first == b'+' && content == b"\n";
                        postimage.push_line(content, flag);
                    }
                }
            }
            // the header and "\ No newline" markers were handled at parse time
            b'@' | b'\\' => {}
            _ => {
                if opts.apply_verbosely {
                    eprintln!("error: invalid start of line: '{}'", first as char);
                }
                return Err(());
            }
        }
        if added_blank_line {
            new_blank_lines_at_end += 1;
        } else {
            new_blank_lines_at_end = 0;
        }
        offset += len;
    }

    if inaccurate_eof
        && preimage.buf.last() == Some(&b'\n')
        && postimage.buf.last() == Some(&b'\n')
    {
        preimage.strip_final_newline();
        postimage.strip_final_newline();
    }

    let mut leading = frag.leading;
    let mut trailing = frag.trailing;

    // A hunk to change lines at the beginning would begin with
    // "@@ -1,L +N,M @@", but -U0 that inserts before the second line also
    // has this pattern; a hunk to add to an empty file begins with
    // "@@ -0,0 +N,M @@". Either way, (oldpos <= 1) must match at the
    // beginning.
    let mut match_beginning = frag.old_pos == 0 || (frag.old_pos == 1 && !opts.unidiff_zero);

    // A hunk without trailing lines must match at the end, except that we
    // cannot tell if the patch was generated with --unified=0.
    let mut match_end = !opts.unidiff_zero && trailing == 0;

    let mut pos: isize = if frag.new_pos > 0 {
        frag.new_pos as isize - 1
    } else {
        0
    };

    let applied_pos = loop {
        if let Some(found) = find_pos(
            img,
            &mut preimage,
            &mut postimage,
            pos,
            ws_rule,
            match_beginning,
            match_end,
            fix_ws,
        ) {
            break Some(found);
        }

        // Am I at my context limits?
        if leading <= opts.p_context && trailing <= opts.p_context {
            break None;
        }
        if match_beginning || match_end {
            match_beginning = false;
            match_end = false;
            continue;
        }

        // Reduce the number of context lines: reduce both leading and
        // trailing if they are equal, otherwise just the larger one.
        if leading >= trailing {
            preimage.remove_first_line();
            postimage.remove_first_line();
            pos -= 1;
            leading -= 1;
        }
        if trailing > leading {
            preimage.remove_last_line();
            postimage.remove_last_line();
            trailing -= 1;
        }
    };

    let applied_pos = match applied_pos {
        Some(found) => found,
        None => {
            if opts.apply_verbosely {
                eprintln!(
                    "error: while searching for:\n{}",
                    String::from_utf8_lossy(&preimage.buf)
                );
            }
            return Err(());
        }
    };

    // If the patch application adds blank lines at the end of the image,
    // and the patch applies at the end, drop those added blank lines.
    if fix_ws && new_blank_lines_at_end > 0 && preimage.lines.len() + applied_pos == img.lines.len()
    {
        for _ in 0..new_blank_lines_at_end {
            postimage.remove_last_line();
        }
    }

    if leading != frag.leading || trailing != frag.trailing {
        eprintln!(
            "Context reduced to ({leading}/{trailing}) to apply fragment at {}",
            applied_pos + 1
        );
    }
    let drift = applied_pos as isize + 1 - frag.new_pos as isize;
    if frag.new_pos > 0 && drift != 0 {
        eprintln!(
            "Hunk #{hunk_nr} succeeded at {} (offset {drift} line{}).",
            applied_pos + 1,
            if drift.abs() == 1 { "" } else { "s" }
        );
    }

    img.update(applied_pos, &preimage, &postimage);
    Ok(())
}

/// Apply every fragment of `patch` to `img`; under `--reject` failures are
/// recorded on the fragment instead of failing the patch.
pub fn apply_fragments(
    opts: &ApplyOptions,
    ws_state: &mut WsState,
    img: &mut Image,
    patch: &mut Patch,
) -> Result<(), PatchError> {
    if patch.is_binary {
        return apply_binary(opts, img, patch);
    }

    let name = patch.best_name().to_string();
    let inaccurate_eof = patch.inaccurate_eof;
    let ws_rule = patch.ws_rule;
    for (nr, frag) in patch.fragments.iter_mut().enumerate() {
        if apply_one_fragment(opts, ws_state, img, frag, inaccurate_eof, ws_rule, nr + 1).is_err()
        {
            eprintln!("error: patch failed: {}:{}", name, frag.old_pos);
            if !opts.apply_with_reject {
                return Err(PatchError::Apply(format!("{name}: patch does not apply")));
            }
            frag.rejected = true;
        }
    }
    Ok(())
}

/// Apply a git-format delta to `base`: two varint sizes followed by
/// copy/insert opcodes.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Option<Vec<u8>> {
    fn varint(data: &[u8], pos: &mut usize) -> Option<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = *data.get(*pos)?;
            *pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Some(value);
            }
            shift += 7;
            if shift > 63 {
                return None;
            }
        }
    }

    let mut pos = 0;
    let src_size = varint(delta, &mut pos)?;
    if src_size != base.len() as u64 {
        return None;
    }
    let dst_size = varint(delta, &mut pos)?;

    let mut out = Vec::with_capacity(dst_size as usize);
    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;
        if cmd & 0x80 != 0 {
            let mut copy_offset: usize = 0;
            let mut copy_size: usize = 0;
            for i in 0..4 {
                if cmd & (1 << i) != 0 {
                    copy_offset |= usize::from(*delta.get(pos)?) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if cmd & (0x10 << i) != 0 {
                    copy_size |= usize::from(*delta.get(pos)?) << (8 * i);
                    pos += 1;
                }
            }
            if copy_size == 0 {
                copy_size = 0x10000;
            }
            out.extend_from_slice(base.get(copy_offset..copy_offset + copy_size)?);
        } else if cmd != 0 {
            out.extend_from_slice(delta.get(pos..pos + cmd as usize)?);
            pos += cmd as usize;
        } else {
            // cmd == 0 is reserved
            return None;
        }
    }
    if out.len() as u64 != dst_size {
        return None;
    }
    Some(out)
}

/// Produce the binary postimage in `img` from the selected hunk.
fn apply_binary_fragment(
    opts: &ApplyOptions,
    img: &mut Image,
    patch: &Patch,
) -> Result<(), PatchError> {
    let name = patch.best_name().to_string();
    let binary = patch
        .binary
        .as_ref()
        .ok_or_else(|| PatchError::Apply(format!("cannot apply binary patch to '{name}' without the binary data")))?;

    // A binary patch is irreversible without the optional second hunk.
    let hunk = if opts.apply_in_reverse {
        binary
            .reverse
            .as_ref()
            .ok_or_else(|| PatchError::IrreversibleBinary(name.clone()))?
    } else {
        &binary.forward
    };

    match hunk.method {
        BinaryMethod::Delta => {
            let result = apply_delta(&img.buf, &hunk.data)
                .ok_or_else(|| PatchError::Apply(format!("binary patch does not apply to '{name}'")))?;
            img.buf = result;
        }
        BinaryMethod::Literal => {
            img.buf = hunk.data.clone();
        }
    }
    img.lines.clear();
    Ok(())
}

/// Apply a binary patch: verify the preimage hash, produce the postimage
/// (from the object store when available, otherwise from the hunk data), and
/// verify the result hash.
fn apply_binary(opts: &ApplyOptions, img: &mut Image, patch: &mut Patch) -> Result<(), PatchError> {
    let name = patch.best_name().to_string();

    // For safety, require the index line to carry the full textual hashes.
    if patch.old_sha1_prefix.len() != 40
        || patch.new_sha1_prefix.len() != 40
        || !patch.old_sha1_prefix.bytes().all(|b| b.is_ascii_hexdigit())
        || !patch.new_sha1_prefix.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(PatchError::Apply(format!(
            "cannot apply binary patch to '{name}' without full index line"
        )));
    }

    if patch.old_name.is_some() {
        // See if the old one matches what the patch applies to.
        let hash = object::hash_blob(&img.buf);
        if hash != patch.old_sha1_prefix {
            return Err(PatchError::PreimageMismatch { name, hash });
        }
    } else if !img.is_empty() {
        // Otherwise, the old one must be empty.
        return Err(PatchError::Apply(format!(
            "the patch applies to an empty '{name}' but it is not empty"
        )));
    }

    if patch.new_sha1_prefix == NULL_SHA1 {
        // deletion patch
        img.buf.clear();
        img.lines.clear();
        return Ok(());
    }

    if util::repo_exists() && object::has_blob(&patch.new_sha1_prefix) {
        // We already have the postimage.
        let result = object::read_blob(&patch.new_sha1_prefix).map_err(|_| {
            PatchError::Apply(format!(
                "the necessary postimage {} for '{name}' cannot be read",
                patch.new_sha1_prefix
            ))
        })?;
        img.buf = result;
        img.lines.clear();
        return Ok(());
    }

    // The buffer matches the preimage; apply the hunk data and verify the
    // result.
    apply_binary_fragment(opts, img, patch)?;
    let hash = object::hash_blob(&img.buf);
    if hash != patch.new_sha1_prefix {
        return Err(PatchError::Apply(format!(
            "binary patch to '{name}' creates incorrect result (expecting {}, got {hash})",
            patch.new_sha1_prefix
        )));
    }
    Ok(())
}
