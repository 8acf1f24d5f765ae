//! Patch header recognition: `diff --git` headers with their extended header
//! lines, traditional `---`/`+++` headers, and the filename extraction rules
//! both dialects share (C-style quoting, `-p` stripping, `--directory` root).

use super::image::line_len;
use super::parse::{parse_fragment_header, ParseContext};
use super::{Patch, PatchError, Ternary};

pub const TERM_SPACE: u32 = 1;
pub const TERM_TAB: u32 = 2;

pub fn is_dev_null(line: &[u8]) -> bool {
    line.starts_with(b"/dev/null") && line.get(9).is_some_and(|b| b.is_ascii_whitespace())
}

/// Collapse runs of `/` so `--index` can cope with sloppy patch paths.
fn squash_slash(name: String) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_slash = false;
    for ch in name.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

/// Parse a C-style quoted string starting at `line[0] == '"'`. Returns the
/// unquoted bytes and the index one past the closing quote.
pub fn unquote_c_style(line: &[u8]) -> Option<(Vec<u8>, usize)> {
    if line.first() != Some(&b'"') {
        return None;
    }
    let mut out = Vec::new();
    let mut i = 1;
    while i < line.len() {
        match line[i] {
            b'"' => return Some((out, i + 1)),
            b'\\' => {
                i += 1;
                let esc = *line.get(i)?;
                match esc {
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0b),
                    b'\\' => out.push(b'\\'),
                    b'"' => out.push(b'"'),
                    b'0'..=b'7' => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 3 {
                            match line.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        i -= 1;
                        out.push(value as u8);
                    }
                    _ => return None,
                }
                i += 1;
            }
            b'\n' => return None,
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    None
}

/// Quote a path for output the way diff tools expect, or `None` when the name
/// needs no quoting.
pub fn quote_c_style(name: &str) -> Option<String> {
    let needs_quoting = name
        .bytes()
        .any(|b| b < 0x20 || b == 0x7f || b >= 0x80 || b == b'"' || b == b'\\');
    if !needs_quoting {
        return None;
    }
    let mut out = String::from("\"");
    for b in name.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            0x0c => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x0b => out.push_str("\\v"),
            b if b < 0x20 || b == 0x7f || b >= 0x80 => {
                out.push_str(&format!("\\{:03o}", b));
            }
            b => out.push(b as char),
        }
    }
    out.push('"');
    Some(out)
}

fn name_terminates(c: u8, terminate: u32) -> bool {
    match c {
        b' ' => terminate & TERM_SPACE != 0,
        b'\t' => terminate & TERM_TAB != 0,
        _ => true,
    }
}

/// Extract a filename from `line`, stripping `p_value` leading components and
/// prepending the configured root. `def` is a previously derived name; the
/// shorter of the two wins when one is a prefix of the other (so `file` beats
/// `file.orig` and `file~`).
pub fn find_name(
    ctx: &ParseContext,
    line: &[u8],
    def: Option<String>,
    p_value: usize,
    terminate: u32,
) -> Option<String> {
    if line.first() == Some(&b'"') {
        if let Some((unquoted, _)) = unquote_c_style(line) {
            let name = String::from_utf8_lossy(&unquoted).into_owned();
            let mut rest = name.as_str();
            let mut stripped = true;
            for _ in 0..p_value {
                match rest.find('/') {
                    Some(pos) => rest = &rest[pos + 1..],
                    None => {
                        stripped = false;
                        break;
                    }
                }
            }
            if stripped {
                let mut out = String::new();
                if let Some(root) = &ctx.root {
                    out.push_str(root);
                }
                out.push_str(rest);
                return Some(squash_slash(out));
            }
        }
    }

    let mut start: usize = 0;
    let mut pos = 0;
    let mut p_remaining = p_value as i64;
    while pos < line.len() {
        let c = line[pos];
        if c.is_ascii_whitespace() {
            if c == b'\n' {
                break;
            }
            if name_terminates(c, terminate) {
                break;
            }
        }
        pos += 1;
        if c == b'/' {
            p_remaining -= 1;
            if p_remaining == 0 {
                start = pos;
            }
        }
    }

    let len = pos.saturating_sub(start);
    if len == 0 {
        return def.map(squash_slash);
    }
    let found = String::from_utf8_lossy(&line[start..pos]).into_owned();

    if let Some(def) = def {
        if def.len() < found.len() && found.starts_with(&def) {
            return Some(squash_slash(def));
        }
    }

    let mut out = String::new();
    if let Some(root) = &ctx.root {
        out.push_str(root);
    }
    out.push_str(&found);
    Some(squash_slash(out))
}

/// Given the text after `--- ` or `+++ `, guess the `-p` strip count for a
/// traditional patch. Only a name with no slash at all is an unambiguous
/// p=0; anything else keeps the latched value.
fn guess_p_value(ctx: &ParseContext, nameline: &[u8]) -> i64 {
    if is_dev_null(nameline) {
        return -1;
    }
    let name = match find_name(ctx, nameline, None, 0, TERM_SPACE | TERM_TAB) {
        Some(name) => name,
        None => return -1,
    };
    if !name.contains('/') {
        0
    } else {
        -1
    }
}

/// Get the name info from the `---`/`+++` lines of a traditional patch.
pub fn parse_traditional_patch(
    ctx: &mut ParseContext,
    first: &[u8],
    second: &[u8],
    patch: &mut Patch,
) -> Result<(), PatchError> {
    let first = &first[4..]; // skip "--- "
    let second = &second[4..]; // skip "+++ "

    if !ctx.p_value_known {
        let mut p = guess_p_value(ctx, first);
        let q = guess_p_value(ctx, second);
        if p < 0 {
            p = q;
        }
        if p >= 0 && p == q {
            ctx.p_value = p as usize;
            ctx.p_value_known = true;
        }
    }

    let name;
    if is_dev_null(first) {
        patch.is_new = Ternary::Yes;
        patch.is_delete = Ternary::No;
        name = find_name(ctx, second, None, ctx.p_value, TERM_SPACE | TERM_TAB);
        patch.new_name = name.clone();
    } else if is_dev_null(second) {
        patch.is_new = Ternary::No;
        patch.is_delete = Ternary::Yes;
        name = find_name(ctx, first, None, ctx.p_value, TERM_SPACE | TERM_TAB);
        patch.old_name = name.clone();
    } else {
        let def = find_name(ctx, first, None, ctx.p_value, TERM_SPACE | TERM_TAB);
        name = find_name(ctx, second, def, ctx.p_value, TERM_SPACE | TERM_TAB);
        patch.old_name = name.clone();
        patch.new_name = name.clone();
    }
    if name.is_none() {
        return Err(PatchError::MalformedHeader {
            line: ctx.line_nr,
            msg: "unable to find filename in patch".to_string(),
        });
    }
    Ok(())
}

fn stop_at_slash(line: &[u8]) -> Option<usize> {
    line.iter().position(|&b| b == b'/')
}

/// Extract the name that appears on both sides of a `diff --git` line. Rename
/// patches get nothing here, which is fine because the rename headers carry
/// the names. What matters is mode-only changes and creation or deletion of
/// empty files, where both sides are the same name under `a/` and `b/`.
fn git_header_name(line: &[u8]) -> Option<String> {
    let line = &line[b"diff --git ".len()..];

    if line.first() == Some(&b'"') {
        let (first, second_start) = unquote_c_style(line)?;
        let cp = stop_at_slash(&first)?;
        if cp == 0 {
            return None;
        }
        let first = &first[cp + 1..];

        let mut second = second_start;
        while second < line.len() && line[second].is_ascii_whitespace() {
            second += 1;
        }
        if second >= line.len() {
            return None;
        }

        if line[second] == b'"' {
            let (sp, _) = unquote_c_style(&line[second..])?;
            let cp = stop_at_slash(&sp)?;
            if cp == 0 {
                return None;
            }
            if &sp[cp + 1..] != first {
                return None;
            }
            return Some(String::from_utf8_lossy(first).into_owned());
        }

        // unquoted second
        let cp = stop_at_slash(&line[second..])?;
        if cp == 0 {
            return None;
        }
        let rest = &line[second + cp + 1..];
        if rest.len() != first.len() + 1 || &rest[..first.len()] != first {
            return None;
        }
        return Some(String::from_utf8_lossy(first).into_owned());
    }

    // unquoted first name
    let name_start = stop_at_slash(line)?;
    if name_start == 0 {
        return None;
    }
    let name = &line[name_start + 1..];

    // a double quote, if any, must start the second name
    if let Some(quote) = name.iter().position(|&b| b == b'"') {
        let (sp, _) = unquote_c_style(&name[quote..])?;
        let np = stop_at_slash(&sp)?;
        if np == 0 {
            return None;
        }
        let candidate = &sp[np + 1..];
        let len = candidate.len();
        if len < quote && &name[..len] == candidate && name[len].is_ascii_whitespace() {
            return Some(String::from_utf8_lossy(candidate).into_owned());
        }
        return None;
    }

    // Accept a name only if it shows up twice, exactly the same form.
    let mut len = 0;
    loop {
        match name.get(len) {
            None | Some(&b'\n') => return None,
            Some(&b'\t') | Some(&b' ') => {
                let mut second = len;
                loop {
                    match name.get(second) {
                        None | Some(&b'\n') => return None,
                        Some(&b'/') => {
                            second += 1;
                            break;
                        }
                        _ => second += 1,
                    }
                }
                if name.get(second + len) == Some(&b'\n')
                    && name.get(second..second + len) == Some(&name[..len])
                {
                    return Some(String::from_utf8_lossy(&name[..len]).into_owned());
                }
                len += 1;
            }
            Some(_) => len += 1,
        }
    }
}

fn parse_octal(line: &[u8]) -> u32 {
    let mut value = 0u32;
    for &b in line {
        match b {
            b'0'..=b'7' => value = value * 8 + u32::from(b - b'0'),
            _ => break,
        }
    }
    value
}

fn parse_decimal(line: &[u8]) -> u32 {
    let mut value = 0u32;
    for &b in line {
        match b {
            b'0'..=b'9' => value = value.saturating_mul(10).saturating_add(u32::from(b - b'0')),
            _ => break,
        }
    }
    value
}

fn gitdiff_verify_name(
    ctx: &ParseContext,
    line: &[u8],
    is_null: bool,
    orig_name: Option<String>,
    oldnew: &str,
) -> Result<Option<String>, PatchError> {
    match orig_name {
        None if !is_null => Ok(find_name(ctx, line, None, ctx.p_value, TERM_TAB)),
        Some(name) => {
            if is_null {
                return Err(PatchError::MalformedHeader {
                    line: ctx.line_nr,
                    msg: format!("expected /dev/null, got {name}"),
                });
            }
            let another = find_name(ctx, line, None, ctx.p_value, TERM_TAB);
            if another.as_deref() != Some(name.as_str()) {
                return Err(PatchError::MalformedHeader {
                    line: ctx.line_nr,
                    msg: format!("inconsistent {oldnew} filename"),
                });
            }
            Ok(Some(name))
        }
        None => {
            if !line.starts_with(b"/dev/null") || line.get(9) != Some(&b'\n') {
                return Err(PatchError::MalformedHeader {
                    line: ctx.line_nr,
                    msg: "expected /dev/null".to_string(),
                });
            }
            Ok(None)
        }
    }
}

type HeaderHandler = fn(&mut ParseContext, &[u8], &mut Patch) -> Result<bool, PatchError>;

fn gitdiff_hdrend(_ctx: &mut ParseContext, _line: &[u8], _patch: &mut Patch) -> Result<bool, PatchError> {
    Ok(false)
}

fn gitdiff_oldname(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.old_name = gitdiff_verify_name(
        ctx,
        line,
        patch.is_new.is_yes(),
        patch.old_name.take(),
        "old",
    )?;
    Ok(true)
}

fn gitdiff_newname(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.new_name = gitdiff_verify_name(
        ctx,
        line,
        patch.is_delete.is_yes(),
        patch.new_name.take(),
        "new",
    )?;
    Ok(true)
}

fn gitdiff_oldmode(_ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.old_mode = parse_octal(line);
    Ok(true)
}

fn gitdiff_newmode(_ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.new_mode = parse_octal(line);
    Ok(true)
}

fn gitdiff_delete(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_delete = Ternary::Yes;
    patch.old_name = patch.def_name.clone();
    gitdiff_oldmode(ctx, line, patch)
}

fn gitdiff_newfile(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_new = Ternary::Yes;
    patch.new_name = patch.def_name.clone();
    gitdiff_newmode(ctx, line, patch)
}

fn gitdiff_copysrc(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_copy = true;
    patch.old_name = find_name(ctx, line, None, 0, 0);
    Ok(true)
}

fn gitdiff_copydst(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_copy = true;
    patch.new_name = find_name(ctx, line, None, 0, 0);
    Ok(true)
}

fn gitdiff_renamesrc(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_rename = true;
    patch.old_name = find_name(ctx, line, None, 0, 0);
    Ok(true)
}

fn gitdiff_renamedst(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.is_rename = true;
    patch.new_name = find_name(ctx, line, None, 0, 0);
    Ok(true)
}

fn gitdiff_similarity(_ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.score = parse_decimal(line);
    Ok(true)
}

fn gitdiff_dissimilarity(_ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    patch.score = parse_decimal(line);
    Ok(true)
}

fn gitdiff_index(ctx: &mut ParseContext, line: &[u8], patch: &mut Patch) -> Result<bool, PatchError> {
    // index line is N hexadecimal, "..", N hexadecimal, and optional space
    // with octal mode
    let dots = match line.windows(2).position(|w| w == b"..") {
        Some(pos) if pos <= 40 => pos,
        _ => return Ok(true),
    };
    let old_hex = &line[..dots];
    let rest = &line[dots + 2..];
    let end = rest
        .iter()
        .position(|&b| b == b' ' || b == b'\n')
        .unwrap_or(rest.len());
    let new_hex = &rest[..end];
    if new_hex.len() > 40 {
        return Ok(true);
    }
    if !old_hex.iter().all(u8::is_ascii_hexdigit) || !new_hex.iter().all(u8::is_ascii_hexdigit) {
        return Err(PatchError::MalformedHeader {
            line: ctx.line_nr,
            msg: "invalid hex in index line".to_string(),
        });
    }
    patch.old_sha1_prefix = String::from_utf8_lossy(old_hex).into_owned();
    patch.new_sha1_prefix = String::from_utf8_lossy(new_hex).into_owned();
    if rest.get(end) == Some(&b' ') {
        patch.old_mode = parse_octal(&rest[end + 1..]);
    }
    Ok(true)
}

/// Normal for a diff that doesn't change anything: we fall through into the
/// next diff. Tell the parser to break out.
fn gitdiff_unrecognized(_ctx: &mut ParseContext, _line: &[u8], _patch: &mut Patch) -> Result<bool, PatchError> {
    Ok(false)
}

const OPTABLE: &[(&str, HeaderHandler)] = &[
    ("@@ -", gitdiff_hdrend),
    ("--- ", gitdiff_oldname),
    ("+++ ", gitdiff_newname),
    ("old mode ", gitdiff_oldmode),
    ("new mode ", gitdiff_newmode),
    ("deleted file mode ", gitdiff_delete),
    ("new file mode ", gitdiff_newfile),
    ("copy from ", gitdiff_copysrc),
    ("copy to ", gitdiff_copydst),
    ("rename old ", gitdiff_renamesrc),
    ("rename new ", gitdiff_renamedst),
    ("rename from ", gitdiff_renamesrc),
    ("rename to ", gitdiff_renamedst),
    ("similarity index ", gitdiff_similarity),
    ("dissimilarity index ", gitdiff_dissimilarity),
    ("index ", gitdiff_index),
    ("", gitdiff_unrecognized),
];

/// Parse a `diff --git` header and the extended header lines following it.
/// Returns the byte offset where the header block ends; a return equal to the
/// first line's length means no extended headers followed and the line should
/// not be taken as a patch start.
pub fn parse_git_header(
    ctx: &mut ParseContext,
    buffer: &[u8],
    first_len: usize,
    patch: &mut Patch,
) -> Result<usize, PatchError> {
    // A git diff has explicit new/delete information, so we don't guess.
    patch.is_new = Ternary::No;
    patch.is_delete = Ternary::No;

    // Some things may not have the old name in the rest of the headers
    // anywhere (pure mode changes, or removing or adding empty files), so we
    // get the default name from the header itself.
    patch.def_name = git_header_name(&buffer[..first_len]).map(|name| {
        let mut full = String::new();
        if let Some(root) = &ctx.root {
            full.push_str(root);
        }
        full.push_str(&name);
        full
    });

    ctx.line_nr += 1;
    let mut offset = first_len;
    while offset < buffer.len() {
        let rest = &buffer[offset..];
        let len = line_len(rest);
        if len == 0 || rest[len - 1] != b'\n' {
            break;
        }
        let line = &rest[..len];
        for (prefix, handler) in OPTABLE {
            if line.len() < prefix.len() || !line.starts_with(prefix.as_bytes()) {
                continue;
            }
            if !handler(ctx, &line[prefix.len()..], patch)? {
                return Ok(offset);
            }
            break;
        }
        offset += len;
        ctx.line_nr += 1;
    }
    Ok(offset)
}

/// Scan forward for the next patch header. Returns the offset where the patch
/// starts and the size of its header block, or `None` at end of input.
pub fn find_header(
    ctx: &mut ParseContext,
    buffer: &[u8],
    patch: &mut Patch,
) -> Result<Option<(usize, usize)>, PatchError> {
    patch.is_toplevel_relative = false;
    patch.is_rename = false;
    patch.is_copy = false;
    patch.is_new = Ternary::Unknown;
    patch.is_delete = Ternary::Unknown;
    patch.old_mode = 0;
    patch.new_mode = 0;
    patch.old_name = None;
    patch.new_name = None;

    let mut offset = 0;
    while offset < buffer.len() {
        let rest = &buffer[offset..];
        let len = line_len(rest);
        if len == 0 {
            break;
        }
        let line = &rest[..len];

        // Testing this early allows us to take a few shortcuts..
        if len < 6 {
            offset += len;
            ctx.line_nr += 1;
            continue;
        }

        // Make sure we don't find any unconnected patch fragments. That's a
        // sign that we didn't find a header, and that a patch has become
        // corrupted/broken up.
        if line.starts_with(b"@@ -") {
            let mut dummy = super::Fragment::default();
            if parse_fragment_header(line, &mut dummy).is_some() {
                return Err(PatchError::FragmentWithoutHeader {
                    line: ctx.line_nr,
                    text: String::from_utf8_lossy(&line[..len - 1]).into_owned(),
                });
            }
        }

        if rest.len() < len + 6 {
            break;
        }

        // Git patch? It might not have a real patch, just a rename or mode
        // change, so we handle that specially.
        if line.starts_with(b"diff --git ") {
            let git_hdr_len = parse_git_header(ctx, rest, len, patch)?;
            if git_hdr_len <= len {
                offset += len;
                continue;
            }
            if patch.old_name.is_none() && patch.new_name.is_none() {
                match &patch.def_name {
                    None => {
                        return Err(PatchError::MalformedHeader {
                            line: ctx.line_nr,
                            msg: "git diff header lacks filename information".to_string(),
                        })
                    }
                    Some(def) => {
                        patch.old_name = Some(def.clone());
                        patch.new_name = Some(def.clone());
                    }
                }
            }
            patch.is_toplevel_relative = true;
            return Ok(Some((offset, git_hdr_len)));
        }

        // --- followed by +++ ?
        if line.starts_with(b"--- ") && rest[len..].starts_with(b"+++ ") {
            // We only accept unified patches, so we want it to at least have
            // "@@ -a,b +c,d @@\n", which is 14 chars minimum.
            let next_len = line_len(&rest[len..]);
            if rest.len() >= len + next_len + 14 && rest[len + next_len..].starts_with(b"@@ -") {
                parse_traditional_patch(ctx, line, &rest[len..len + next_len], patch)?;
                ctx.line_nr += 2;
                return Ok(Some((offset, len + next_len)));
            }
        }

        offset += len;
        ctx.line_nr += 1;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::default()
    }

    #[test]
    fn test_unquote_c_style_escapes() {
        let (name, used) = unquote_c_style(b"\"a/sp ace\\t\\\"x\\\"\\101\" rest").unwrap();
        assert_eq!(name, b"a/sp ace\t\"x\"A");
        assert_eq!(&b"\"a/sp ace\\t\\\"x\\\"\\101\" rest"[used..], b" rest");
        assert!(unquote_c_style(b"\"unterminated").is_none());
    }

    #[test]
    fn test_quote_c_style() {
        assert_eq!(quote_c_style("plain/path.txt"), None);
        assert_eq!(
            quote_c_style("with\ttab").as_deref(),
            Some("\"with\\ttab\"")
        );
        assert_eq!(quote_c_style("q\"uote").as_deref(), Some("\"q\\\"uote\""));
    }

    #[test]
    fn test_find_name_strips_components() {
        let c = ctx();
        let name = find_name(&c, b"a/dir/file.c\n", None, 1, TERM_TAB);
        assert_eq!(name.as_deref(), Some("dir/file.c"));
        let name = find_name(&c, b"a/dir/file.c\n", None, 2, TERM_TAB);
        assert_eq!(name.as_deref(), Some("file.c"));
    }

    #[test]
    fn test_find_name_prefers_shorter_def() {
        let c = ctx();
        let def = Some("file.c".to_string());
        let name = find_name(&c, b"file.c.orig\n", def, 0, TERM_SPACE | TERM_TAB);
        assert_eq!(name.as_deref(), Some("file.c"));
    }

    #[test]
    fn test_find_name_quoted_with_root() {
        let mut c = ctx();
        c.root = Some("sub/".to_string());
        let name = find_name(&c, b"\"a/dir/sp ace.c\"\n", None, 1, TERM_TAB);
        assert_eq!(name.as_deref(), Some("sub/dir/sp ace.c"));
    }

    #[test]
    fn test_find_name_squashes_slashes() {
        let c = ctx();
        let name = find_name(&c, b"a//dir///file.c\n", None, 1, TERM_TAB);
        assert_eq!(name.as_deref(), Some("dir/file.c"));
    }

    #[test]
    fn test_git_header_name_simple() {
        let name = git_header_name(b"diff --git a/hello.txt b/hello.txt\n");
        assert_eq!(name.as_deref(), Some("hello.txt"));
    }

    #[test]
    fn test_git_header_name_mismatch_gives_nothing() {
        assert_eq!(git_header_name(b"diff --git a/one.txt b/two.txt\n"), None);
    }

    #[test]
    fn test_git_header_name_with_spaces() {
        let name = git_header_name(b"diff --git a/sp ace.txt b/sp ace.txt\n");
        assert_eq!(name.as_deref(), Some("sp ace.txt"));
    }

    #[test]
    fn test_git_header_name_quoted() {
        let name = git_header_name(b"diff --git \"a/ta\\tb.txt\" \"b/ta\\tb.txt\"\n");
        assert_eq!(name.as_deref(), Some("ta\tb.txt"));
    }

    #[test]
    fn test_parse_git_header_new_file() {
        let mut c = ctx();
        let buffer = b"diff --git a/new.txt b/new.txt\nnew file mode 100644\nindex 0000000..ce01362\n--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1 @@\n+hello\n";
        let first_len = line_len(buffer);
        let mut patch = Patch::default();
        let consumed = parse_git_header(&mut c, buffer, first_len, &mut patch).unwrap();
        assert!(patch.is_new.is_yes());
        assert_eq!(patch.new_mode, 0o100644);
        assert_eq!(patch.new_name.as_deref(), Some("new.txt"));
        assert_eq!(patch.old_name, None);
        assert_eq!(patch.old_sha1_prefix, "0000000");
        // consumed everything up to the @@ line
        assert!(buffer[consumed..].starts_with(b"@@ -0,0"));
    }

    #[test]
    fn test_parse_git_header_rename() {
        let mut c = ctx();
        let buffer = b"diff --git a/old.txt b/new.txt\nsimilarity index 90%\nrename from old.txt\nrename to new.txt\n";
        let first_len = line_len(buffer);
        let mut patch = Patch::default();
        parse_git_header(&mut c, buffer, first_len, &mut patch).unwrap();
        assert!(patch.is_rename);
        assert_eq!(patch.score, 90);
        assert_eq!(patch.old_name.as_deref(), Some("old.txt"));
        assert_eq!(patch.new_name.as_deref(), Some("new.txt"));
    }

    #[test]
    fn test_parse_git_header_index_with_mode() {
        let mut c = ctx();
        let buffer = b"diff --git a/f b/f\nindex ce01362..e69de29 100755\n";
        let first_len = line_len(buffer);
        let mut patch = Patch::default();
        parse_git_header(&mut c, buffer, first_len, &mut patch).unwrap();
        assert_eq!(patch.old_sha1_prefix, "ce01362");
        assert_eq!(patch.new_sha1_prefix, "e69de29");
        assert_eq!(patch.old_mode, 0o100755);
    }

    #[test]
    fn test_parse_git_header_rejects_bad_hex() {
        let mut c = ctx();
        let buffer = b"diff --git a/f b/f\nindex zz..qq\n";
        let first_len = line_len(buffer);
        let mut patch = Patch::default();
        let err = parse_git_header(&mut c, buffer, first_len, &mut patch);
        assert!(matches!(err, Err(PatchError::MalformedHeader { .. })));
    }

    #[test]
    fn test_traditional_dev_null_creation() {
        let mut c = ctx();
        let mut patch = Patch::default();
        parse_traditional_patch(
            &mut c,
            b"--- /dev/null\n",
            b"+++ b/created.txt\n",
            &mut patch,
        )
        .unwrap();
        assert!(patch.is_new.is_yes());
        assert_eq!(patch.new_name.as_deref(), Some("created.txt"));
    }

    #[test]
    fn test_traditional_guesses_p_zero_for_plain_names() {
        let mut c = ctx();
        c.p_value = 1;
        let mut patch = Patch::default();
        parse_traditional_patch(&mut c, b"--- plain.txt\n", b"+++ plain.txt\n", &mut patch)
            .unwrap();
        assert!(c.p_value_known);
        assert_eq!(c.p_value, 0);
        assert_eq!(patch.old_name.as_deref(), Some("plain.txt"));
    }

    #[test]
    fn test_find_header_skips_garbage_lines() {
        let mut c = ctx();
        c.line_nr = 1;
        let buffer = b"Some cover letter text.\nMore prose here.\n--- a/f.txt\n+++ b/f.txt\n@@ -1,1 +1,1 @@\n-x\n+y\n";
        let mut patch = Patch::default();
        let (offset, hdrsize) = find_header(&mut c, buffer, &mut patch).unwrap().unwrap();
        assert!(buffer[offset..].starts_with(b"--- a/f.txt"));
        assert_eq!(hdrsize, b"--- a/f.txt\n+++ b/f.txt\n".len());
        assert_eq!(patch.old_name.as_deref(), Some("f.txt"));
    }

    #[test]
    fn test_find_header_rejects_orphan_fragment() {
        let mut c = ctx();
        let buffer = b"@@ -1,2 +1,2 @@\n ctx\n-a\n+b\n";
        let mut patch = Patch::default();
        let err = find_header(&mut c, buffer, &mut patch);
        assert!(matches!(
            err,
            Err(PatchError::FragmentWithoutHeader { .. })
        ));
    }
}
