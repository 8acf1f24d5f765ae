//! Parsing of the patch stream body: unified-diff fragments, recounting,
//! binary hunks, and the chunk loop that turns a byte stream into patches.

use super::base85;
use super::header::find_header;
use super::image::line_len;
use super::ws::{self, WsErrorAction, WS_DEFAULT_RULE};
use super::{
    BinaryHunk, BinaryMethod, BinaryPatch, Fragment, Patch, PatchError, Ternary,
};

/// All mutable parser state, threaded through the stream instead of living in
/// globals: the current input line, the latched `-p` value, the configured
/// root, and the whitespace bookkeeping shared with the applier.
#[derive(Debug)]
pub struct ParseContext {
    pub line_nr: usize,
    pub p_value: usize,
    pub p_value_known: bool,
    /// `--directory` root, normalized to end with `/`.
    pub root: Option<String>,
    pub reverse: bool,
    pub ws_action: WsErrorAction,
    pub default_ws_rule: u32,
    /// Print at most this many individual whitespace errors; 0 prints all.
    pub squelch_ws_errors: usize,
    pub ws_error_count: usize,
    pub input_name: String,
    /// Whether the session will apply or check; garbage-only patches are
    /// fatal only then.
    pub apply_or_check: bool,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            line_nr: 1,
            p_value: 1,
            p_value_known: false,
            root: None,
            reverse: false,
            ws_action: WsErrorAction::default(),
            default_ws_rule: WS_DEFAULT_RULE,
            squelch_ws_errors: 5,
            ws_error_count: 0,
            input_name: "<stdin>".to_string(),
            apply_or_check: true,
        }
    }
}

fn parse_num(line: &[u8]) -> Option<(usize, usize)> {
    let digits = line.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let value = std::str::from_utf8(&line[..digits]).ok()?.parse().ok()?;
    Some((value, digits))
}

fn parse_range(
    line: &[u8],
    offset: usize,
    expect: &[u8],
    p1: &mut usize,
    p2: &mut usize,
) -> Option<usize> {
    if offset >= line.len() {
        return None;
    }
    let mut pos = offset;
    let (value, digits) = parse_num(&line[pos..])?;
    *p1 = value;
    pos += digits;

    *p2 = 1;
    if line.get(pos) == Some(&b',') {
        let (value, digits) = parse_num(&line[pos + 1..])?;
        *p2 = value;
        pos += digits + 1;
    }

    if !line[pos..].starts_with(expect) {
        return None;
    }
    Some(pos + expect.len())
}

/// Parse a fragment header of the form `@@ -a,b +c,d @@` (`,b` and `,d`
/// default to 1 when absent).
pub fn parse_fragment_header(line: &[u8], fragment: &mut Fragment) -> Option<usize> {
    if line.is_empty() || line[line.len() - 1] != b'\n' {
        return None;
    }
    let offset = parse_range(line, 4, b" +", &mut fragment.old_pos, &mut fragment.old_lines)?;
    parse_range(line, offset, b" @@", &mut fragment.new_pos, &mut fragment.new_lines)
}

/// Under `--recount`, ignore the header counts and recompute them from the
/// fragment body.
fn recount_diff(buffer: &[u8], fragment: &mut Fragment) {
    if buffer.is_empty() {
        eprintln!("warning: recount: ignore empty hunk");
        return;
    }
    let mut oldlines = 0;
    let mut newlines = 0;
    let mut offset = 0;
    while offset < buffer.len() {
        let rest = &buffer[offset..];
        let len = line_len(rest);
        match rest[0] {
            b' ' | b'\n' => {
                newlines += 1;
                oldlines += 1;
            }
            b'-' => oldlines += 1,
            b'+' => newlines += 1,
            b'\\' => {}
            b'@' => {
                if rest.len() < 3 || !rest.starts_with(b"@@ ") {
                    eprintln!(
                        "warning: recount: unexpected line: {}",
                        String::from_utf8_lossy(&rest[..len.saturating_sub(1)])
                    );
                    return;
                }
                break;
            }
            b'd' => {
                if rest.len() < 5 || !rest.starts_with(b"diff ") {
                    eprintln!(
                        "warning: recount: unexpected line: {}",
                        String::from_utf8_lossy(&rest[..len.saturating_sub(1)])
                    );
                    return;
                }
                break;
            }
            _ => {
                eprintln!(
                    "warning: recount: unexpected line: {}",
                    String::from_utf8_lossy(&rest[..len.saturating_sub(1)])
                );
                return;
            }
        }
        offset += len;
    }
    fragment.old_lines = oldlines;
    fragment.new_lines = newlines;
}

fn check_whitespace(ctx: &mut ParseContext, line: &[u8], ws_rule: u32) {
    let result = ws::check(&line[1..], ws_rule);
    if result == 0 {
        return;
    }
    ctx.ws_error_count += 1;
    if ctx.squelch_ws_errors != 0 && ctx.squelch_ws_errors < ctx.ws_error_count {
        return;
    }
    let content = &line[1..];
    let content = match content.last() {
        Some(&b'\n') => &content[..content.len() - 1],
        _ => content,
    };
    eprintln!(
        "{}:{}: {}.\n{}",
        ctx.input_name,
        ctx.line_nr,
        ws::error_string(result),
        String::from_utf8_lossy(content)
    );
}

/// Parse one unified-diff fragment starting at its `@@` header; returns the
/// byte length of the fragment (header plus body).
fn parse_fragment(
    ctx: &mut ParseContext,
    buffer: &[u8],
    patch: &mut Patch,
    fragment: &mut Fragment,
) -> Result<usize, PatchError> {
    let header_len = line_len(buffer);
    if parse_fragment_header(&buffer[..header_len], fragment).is_none() {
        return Err(PatchError::Corrupt(ctx.line_nr));
    }
    if patch.recount {
        recount_diff(&buffer[header_len..], fragment);
    }

    let mut oldlines = fragment.old_lines;
    let mut newlines = fragment.new_lines;
    let mut leading = 0;
    let mut trailing = 0;
    let mut added = 0;
    let mut deleted = 0;

    ctx.line_nr += 1;
    let mut offset = header_len;
    while offset < buffer.len() {
        if oldlines == 0 && newlines == 0 {
            break;
        }
        let rest = &buffer[offset..];
        let len = line_len(rest);
        if len == 0 || rest[len - 1] != b'\n' {
            return Err(PatchError::Corrupt(ctx.line_nr));
        }
        match rest[0] {
            // newer GNU diff, an empty context line
            b'\n' | b' ' => {
                if oldlines == 0 || newlines == 0 {
                    return Err(PatchError::Corrupt(ctx.line_nr));
                }
                oldlines -= 1;
                newlines -= 1;
                if deleted == 0 && added == 0 {
                    leading += 1;
                }
                trailing += 1;
            }
            b'-' => {
                if oldlines == 0 {
                    return Err(PatchError::Corrupt(ctx.line_nr));
                }
                if ctx.reverse && ctx.ws_action != WsErrorAction::Nowarn {
                    check_whitespace(ctx, &rest[..len], patch.ws_rule);
                }
                deleted += 1;
                oldlines -= 1;
                trailing = 0;
            }
            b'+' => {
                if newlines == 0 {
                    return Err(PatchError::Corrupt(ctx.line_nr));
                }
                if !ctx.reverse && ctx.ws_action != WsErrorAction::Nowarn {
                    check_whitespace(ctx, &rest[..len], patch.ws_rule);
                }
                added += 1;
                newlines -= 1;
                trailing = 0;
            }
            // We allow "\ No newline at end of file". Depending on locale
            // settings when the patch was produced we don't know what this
            // line looks like; the only thing we know is that it begins with
            // "\ ". Checking for 12 is just a sanity check.
            b'\\' => {
                if len < 12 || !rest.starts_with(b"\\ ") {
                    return Err(PatchError::Corrupt(ctx.line_nr));
                }
            }
            _ => return Err(PatchError::Corrupt(ctx.line_nr)),
        }
        offset += len;
        ctx.line_nr += 1;
    }
    if oldlines != 0 || newlines != 0 {
        return Err(PatchError::Corrupt(ctx.line_nr));
    }
    fragment.leading = leading;
    fragment.trailing = trailing;

    // If a fragment ends with an incomplete line, we failed to include it in
    // the loop because we hit oldlines == newlines == 0 before seeing it.
    if buffer.len() > offset + 12 && buffer[offset..].starts_with(b"\\ ") {
        offset += line_len(&buffer[offset..]);
    }

    patch.lines_added += added;
    patch.lines_deleted += deleted;

    Ok(offset)
}

/// Parse the run of fragments belonging to one patch; returns the total byte
/// length consumed.
pub fn parse_single_patch(
    ctx: &mut ParseContext,
    buffer: &[u8],
    patch: &mut Patch,
) -> Result<usize, PatchError> {
    let mut offset = 0;
    let mut oldlines = 0;
    let mut newlines = 0;
    let mut context = 0;

    while buffer.len() > offset + 4 && buffer[offset..].starts_with(b"@@ -") {
        let mut fragment = Fragment::default();
        let len = parse_fragment(ctx, &buffer[offset..], patch, &mut fragment)?;
        if len == 0 {
            return Err(PatchError::Corrupt(ctx.line_nr));
        }
        fragment.raw = buffer[offset..offset + len].to_vec();
        oldlines += fragment.old_lines;
        newlines += fragment.new_lines;
        context += fragment.leading + fragment.trailing;
        patch.fragments.push(fragment);
        offset += len;
    }

    // If something was removed (i.e. we have old-lines) it cannot be a
    // creation, and if something was added it cannot be a deletion. The
    // reverse is not true: --unified=0 patches that only add are not
    // necessarily creations, so a single-hunk patch stays undecided.
    if patch.is_new.is_unknown() && (oldlines > 0 || patch.fragments.len() > 1) {
        patch.is_new = Ternary::No;
    }
    if patch.is_delete.is_unknown() && (newlines > 0 || patch.fragments.len() > 1) {
        patch.is_delete = Ternary::No;
    }

    if patch.is_new.is_yes() && oldlines > 0 {
        return Err(PatchError::NewFileDependsOnOld(
            patch.output_name().to_string(),
        ));
    }
    if patch.is_delete.is_yes() && newlines > 0 {
        return Err(PatchError::DeletedFileHasContents(
            patch.best_name().to_string(),
        ));
    }
    if !patch.is_delete.is_yes() && newlines == 0 && context > 0 {
        eprintln!(
            "** warning: file {} becomes empty but is not deleted",
            patch.output_name()
        );
    }

    Ok(offset)
}

/// Parse one binary hunk (`literal`/`delta` header, base85 data lines, blank
/// terminator). Returns the decoded hunk and the bytes consumed, or `None`
/// when the buffer does not start with a binary hunk at all.
fn parse_binary_hunk(
    ctx: &mut ParseContext,
    buffer: &[u8],
) -> Result<Option<(BinaryHunk, usize)>, PatchError> {
    let llen = line_len(buffer);
    let first = &buffer[..llen];

    let (method, origlen) = if let Some(rest) = first.strip_prefix(b"delta ") {
        (BinaryMethod::Delta, parse_num(rest).map(|(v, _)| v))
    } else if let Some(rest) = first.strip_prefix(b"literal ") {
        (BinaryMethod::Literal, parse_num(rest).map(|(v, _)| v))
    } else {
        return Ok(None);
    };
    let origlen = origlen.ok_or_else(|| PatchError::CorruptBinary {
        line: ctx.line_nr,
        text: String::from_utf8_lossy(&first[..llen.saturating_sub(1)]).into_owned(),
    })?;

    ctx.line_nr += 1;
    let mut offset = llen;
    let mut data = Vec::new();
    loop {
        let rest = &buffer[offset..];
        if rest.is_empty() {
            return Err(PatchError::CorruptBinary {
                line: ctx.line_nr,
                text: "unterminated binary hunk".to_string(),
            });
        }
        let llen = line_len(rest);
        let corrupt = |ctx: &ParseContext| PatchError::CorruptBinary {
            line: ctx.line_nr.saturating_sub(1),
            text: String::from_utf8_lossy(&rest[..llen.saturating_sub(1)]).into_owned(),
        };
        ctx.line_nr += 1;
        if llen == 1 {
            // consume the blank terminator line
            offset += 1;
            break;
        }
        // Minimum line is "A00000\n" which is 7 bytes, and the line length
        // must be a multiple of 5 plus 2.
        if llen < 7 || (llen - 2) % 5 != 0 || rest[llen - 1] != b'\n' {
            return Err(corrupt(ctx));
        }
        let max_byte_length = (llen - 2) / 5 * 4;
        let byte_length = match rest[0] {
            c @ b'A'..=b'Z' => (c - b'A') as usize + 1,
            c @ b'a'..=b'z' => (c - b'a') as usize + 27,
            _ => return Err(corrupt(ctx)),
        };
        // If the input length was not a multiple of 4, there is filler at the
        // end, but the filler never exceeds 3 bytes.
        if byte_length > max_byte_length || byte_length <= max_byte_length - 4 {
            return Err(corrupt(ctx));
        }
        let decoded = base85::decode_85(&rest[1..llen - 1], byte_length)
            .map_err(|_| corrupt(ctx))?;
        data.extend_from_slice(&decoded);
        offset += llen;
    }

    let inflated = base85::inflate(&data, origlen).ok_or(PatchError::CorruptBinary {
        line: ctx.line_nr - 1,
        text: "inflate failed or length mismatch".to_string(),
    })?;
    Ok(Some((
        BinaryHunk {
            method,
            data: inflated,
        },
        offset,
    )))
}

/// Parse the hunks following a `GIT binary patch` line: a mandatory forward
/// hunk, optionally followed by a reverse hunk in the same format.
fn parse_binary(
    ctx: &mut ParseContext,
    buffer: &[u8],
    patch: &mut Patch,
) -> Result<usize, PatchError> {
    let (forward, mut used) = parse_binary_hunk(ctx, buffer)?
        .ok_or(PatchError::UnrecognizedBinary(ctx.line_nr.saturating_sub(1)))?;
    let reverse = match parse_binary_hunk(ctx, &buffer[used..])? {
        Some((hunk, used_reverse)) => {
            used += used_reverse;
            Some(hunk)
        }
        None => None,
    };
    patch.binary = Some(BinaryPatch { forward, reverse });
    patch.is_binary = true;
    Ok(used)
}

fn metadata_changes(patch: &Patch) -> bool {
    patch.is_rename
        || patch.is_copy
        || patch.is_new.is_yes()
        || patch.is_delete.is_yes()
        || (patch.old_mode != 0 && patch.new_mode != 0 && patch.old_mode != patch.new_mode)
}

/// Parse one patch (header plus content) out of the stream; `None` when no
/// further patch header can be found.
pub fn parse_chunk(
    ctx: &mut ParseContext,
    buffer: &[u8],
    patch: &mut Patch,
) -> Result<Option<usize>, PatchError> {
    let (offset, hdrsize) = match find_header(ctx, buffer, patch)? {
        Some(found) => found,
        None => return Ok(None),
    };

    patch.ws_rule = ctx.default_ws_rule;

    let hd = offset + hdrsize;
    let mut patchsize = parse_single_patch(ctx, &buffer[hd..], patch)?;

    if patchsize == 0 {
        const GIT_BINARY: &[u8] = b"GIT binary patch\n";
        let rest = &buffer[hd..];
        let llen = line_len(rest);

        if rest[..llen] == *GIT_BINARY {
            ctx.line_nr += 1;
            let used = parse_binary(ctx, &rest[llen..], patch)?;
            patchsize = used + llen;
        } else if llen >= 8 && rest[..llen].ends_with(b" differ\n") {
            for binhdr in [b"Binary files ".as_slice(), b"Files ".as_slice()] {
                if rest[..llen].starts_with(binhdr) {
                    ctx.line_nr += 1;
                    patch.is_binary = true;
                    patchsize = llen;
                    break;
                }
            }
        }

        // An empty patch cannot be applied if it is a text patch without
        // metadata change. A binary patch appears empty to us here.
        if ctx.apply_or_check && !patch.is_binary && !metadata_changes(patch) {
            return Err(PatchError::OnlyGarbage(ctx.line_nr));
        }
    }

    Ok(Some(hd + patchsize))
}

/// Parse the whole input into patch records, in input order.
pub fn parse_patch_stream(
    ctx: &mut ParseContext,
    buffer: &[u8],
    inaccurate_eof: bool,
    recount: bool,
) -> Result<Vec<Patch>, PatchError> {
    let mut patches = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let mut patch = Patch {
            inaccurate_eof,
            recount,
            ..Patch::default()
        };
        match parse_chunk(ctx, &buffer[offset..], &mut patch)? {
            Some(used) => {
                patches.push(patch);
                offset += used;
            }
            None => break,
        }
    }
    Ok(patches)
}

/// Swap the two sides of every patch, for `--reverse`.
pub fn reverse_patches(patches: &mut [Patch]) {
    for patch in patches {
        std::mem::swap(&mut patch.old_name, &mut patch.new_name);
        std::mem::swap(&mut patch.old_mode, &mut patch.new_mode);
        std::mem::swap(&mut patch.is_new, &mut patch.is_delete);
        std::mem::swap(&mut patch.lines_added, &mut patch.lines_deleted);
        std::mem::swap(&mut patch.old_sha1_prefix, &mut patch.new_sha1_prefix);
        for fragment in &mut patch.fragments {
            std::mem::swap(&mut fragment.old_pos, &mut fragment.new_pos);
            std::mem::swap(&mut fragment.old_lines, &mut fragment.new_lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn ctx() -> ParseContext {
        ParseContext::default()
    }

    const SIMPLE: &[u8] = b"--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";

    #[test]
    fn test_parse_fragment_header_counts() {
        let mut frag = Fragment::default();
        parse_fragment_header(b"@@ -1,3 +1,3 @@\n", &mut frag).unwrap();
        assert_eq!((frag.old_pos, frag.old_lines), (1, 3));
        assert_eq!((frag.new_pos, frag.new_lines), (1, 3));
    }

    #[test]
    fn test_parse_fragment_header_defaults_to_one() {
        let mut frag = Fragment::default();
        parse_fragment_header(b"@@ -5 +7 @@\n", &mut frag).unwrap();
        assert_eq!((frag.old_pos, frag.old_lines), (5, 1));
        assert_eq!((frag.new_pos, frag.new_lines), (7, 1));
    }

    #[test]
    fn test_parse_fragment_header_rejects_malformed() {
        let mut frag = Fragment::default();
        assert!(parse_fragment_header(b"@@ -1,x +1 @@\n", &mut frag).is_none());
        assert!(parse_fragment_header(b"@@ -1,3 +1,3 @@", &mut frag).is_none());
    }

    #[test]
    fn test_parse_stream_simple_patch() {
        let mut c = ctx();
        let patches = parse_patch_stream(&mut c, SIMPLE, false, false).unwrap();
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert_eq!(patch.old_name.as_deref(), Some("f.txt"));
        assert_eq!(patch.fragments.len(), 1);
        let frag = &patch.fragments[0];
        assert_eq!(frag.leading, 1);
        assert_eq!(frag.trailing, 1);
        assert_eq!(patch.lines_added, 1);
        assert_eq!(patch.lines_deleted, 1);
        assert!(frag.raw.starts_with(b"@@ -1,3"));
        assert!(frag.raw.ends_with(b" c\n"));
    }

    #[test]
    fn test_fragment_count_mismatch_is_corrupt() {
        let mut c = ctx();
        let body = b"--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n";
        let err = parse_patch_stream(&mut c, body, false, false);
        assert!(matches!(err, Err(PatchError::Corrupt(_))));
    }

    #[test]
    fn test_gnu_empty_context_line() {
        let mut c = ctx();
        let body = b"--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n\n-b\n+B\n";
        let patches = parse_patch_stream(&mut c, body, false, false).unwrap();
        let frag = &patches[0].fragments[0];
        assert_eq!(frag.leading, 2);
        assert_eq!(frag.old_lines, 3);
    }

    #[test]
    fn test_no_newline_marker_is_consumed() {
        let mut c = ctx();
        let body = b"--- a/f\n+++ b/f\n@@ -1 +1 @@\n-old\n+new\n\\ No newline at end of file\n";
        let patches = parse_patch_stream(&mut c, body, false, false).unwrap();
        assert_eq!(patches.len(), 1);
        assert!(patches[0].fragments[0].raw.ends_with(b"No newline at end of file\n"));
    }

    #[test]
    fn test_recount_overrides_header() {
        let mut c = ctx();
        let body = b"--- a/f\n+++ b/f\n@@ -1,999 +1,999 @@\n a\n-b\n+B\n c\n";
        let patches = parse_patch_stream(&mut c, body, false, true).unwrap();
        let frag = &patches[0].fragments[0];
        assert_eq!(frag.old_lines, 3);
        assert_eq!(frag.new_lines, 3);
    }

    #[test]
    fn test_two_patches_in_one_stream() {
        let mut c = ctx();
        let mut body = SIMPLE.to_vec();
        body.extend_from_slice(b"--- a/g.txt\n+++ b/g.txt\n@@ -1 +1 @@\n-x\n+y\n");
        let patches = parse_patch_stream(&mut c, &body, false, false).unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[1].new_name.as_deref(), Some("g.txt"));
    }

    #[test]
    fn test_reverse_patches_swaps_sides() {
        let mut c = ctx();
        let body = b"--- a/f\n+++ /dev/null\n@@ -1 +0,0 @@\n-gone\n";
        let mut patches = parse_patch_stream(&mut c, body, false, false).unwrap();
        assert!(patches[0].is_delete.is_yes());
        reverse_patches(&mut patches);
        assert!(patches[0].is_new.is_yes());
        assert_eq!(patches[0].new_name.as_deref(), Some("f"));
        let frag = &patches[0].fragments[0];
        assert_eq!(frag.old_lines, 0);
        assert_eq!(frag.new_lines, 1);
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Build a binary hunk body (length bytes + base85 lines + terminator).
    fn encode_binary_hunk(keyword: &str, payload: &[u8]) -> Vec<u8> {
        const EN85: &[u8; 85] =
            b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";
        let deflated = deflate(payload);
        let mut out = format!("{keyword} {}\n", payload.len()).into_bytes();
        for chunk in deflated.chunks(52) {
            let len_char = if chunk.len() <= 26 {
                b'A' + (chunk.len() - 1) as u8
            } else {
                b'a' + (chunk.len() - 27) as u8
            };
            out.push(len_char);
            for group in chunk.chunks(4) {
                let mut acc: u32 = 0;
                for i in 0..4 {
                    acc = (acc << 8) | u32::from(*group.get(i).unwrap_or(&0));
                }
                let mut encoded = [0u8; 5];
                for slot in encoded.iter_mut().rev() {
                    *slot = EN85[(acc % 85) as usize];
                    acc /= 85;
                }
                out.extend_from_slice(&encoded);
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out
    }

    #[test]
    fn test_parse_binary_literal_hunk() {
        let mut c = ctx();
        let mut body = b"diff --git a/bin.dat b/bin.dat\nindex ce013625030ba8dba906f756967f9e9ca394464a..e69de29bb2d1d6434b8b29ae775ad8c2e48c5391 100644\nGIT binary patch\n".to_vec();
        body.extend_from_slice(&encode_binary_hunk("literal", b"\x00\x01\x02new binary contents"));
        let patches = parse_patch_stream(&mut c, &body, false, false).unwrap();
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert!(patch.is_binary);
        let binary = patch.binary.as_ref().unwrap();
        assert_eq!(binary.forward.method, BinaryMethod::Literal);
        assert_eq!(binary.forward.data, b"\x00\x01\x02new binary contents");
        assert!(binary.reverse.is_none());
    }

    #[test]
    fn test_parse_binary_with_reverse_hunk() {
        let mut c = ctx();
        let mut body = b"diff --git a/bin.dat b/bin.dat\nindex ce013625030ba8dba906f756967f9e9ca394464a..e69de29bb2d1d6434b8b29ae775ad8c2e48c5391 100644\nGIT binary patch\n".to_vec();
        body.extend_from_slice(&encode_binary_hunk("literal", b"forward bytes"));
        body.extend_from_slice(&encode_binary_hunk("literal", b"reverse bytes"));
        let patches = parse_patch_stream(&mut c, &body, false, false).unwrap();
        let binary = patches[0].binary.as_ref().unwrap();
        assert_eq!(binary.forward.data, b"forward bytes");
        assert_eq!(binary.reverse.as_ref().unwrap().data, b"reverse bytes");
    }

    #[test]
    fn test_parse_binary_corrupt_data_line() {
        let mut c = ctx();
        let body = b"diff --git a/bin.dat b/bin.dat\nindex ce01362..e69de29 100644\nGIT binary patch\nliteral 10\nA!!\n\n";
        let err = parse_patch_stream(&mut c, body, false, false);
        assert!(matches!(err, Err(PatchError::CorruptBinary { .. })));
    }

    #[test]
    fn test_binary_files_differ_marker() {
        let mut c = ctx();
        let body = b"diff --git a/bin.dat b/bin.dat\nindex ce01362..e69de29 100644\nBinary files a/bin.dat and b/bin.dat differ\n";
        let patches = parse_patch_stream(&mut c, body, false, false).unwrap();
        assert!(patches[0].is_binary);
        assert!(patches[0].binary.is_none());
    }

    #[test]
    fn test_garbage_only_patch_is_fatal() {
        let mut c = ctx();
        let body = b"diff --git a/f b/f\nindex ce01362..e69de29 100644\njust some trailing text\n";
        let err = parse_patch_stream(&mut c, body, false, false);
        assert!(matches!(err, Err(PatchError::OnlyGarbage(_))));
    }

    #[test]
    fn test_mode_change_only_patch_is_ok() {
        let mut c = ctx();
        let body = b"diff --git a/script.sh b/script.sh\nold mode 100644\nnew mode 100755\n";
        let patches = parse_patch_stream(&mut c, body, false, false).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].old_mode, 0o100644);
        assert_eq!(patches[0].new_mode, 0o100755);
        assert!(patches[0].fragments.is_empty());
    }
}
