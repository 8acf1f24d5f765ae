//! Locating a preimage inside a target image: hash-gated exact matching,
//! search outward from the expected line, and the whitespace-tolerant match
//! that rewrites the postimage's context bytes with the fixed preimage.

use super::image::{Image, LINE_COMMON};
use super::ws;

/// Update the preimage with whitespace fixes and adjust the common context
/// lines of the postimage in place. Added lines keep their original bytes;
/// context lines carry the fixed bytes. This is possible because whitespace
/// fixing never makes a line grow.
fn update_pre_post_images(preimage: &mut Image, postimage: &mut Image, fixed: Vec<u8>) {
    let flags: Vec<u8> = preimage.lines.iter().map(|l| l.flag).collect();
    let mut fixed_preimage = Image::from_bytes(fixed);
    debug_assert_eq!(fixed_preimage.lines.len(), flags.len());
    for (line, flag) in fixed_preimage.lines.iter_mut().zip(flags) {
        line.flag = flag;
    }
    *preimage = fixed_preimage;

    let old_buf = std::mem::take(&mut postimage.buf);
    let mut new_buf = Vec::with_capacity(old_buf.len());
    let mut old_offset = 0;
    let mut ctx = 0;
    let mut fixed_offset = 0;
    for line in postimage.lines.iter_mut() {
        let len = line.len;
        if line.flag & LINE_COMMON == 0 {
            // an added line, no counterpart in the preimage
            new_buf.extend_from_slice(&old_buf[old_offset..old_offset + len]);
            old_offset += len;
            continue;
        }

        // a common context: skip it in the original postimage and find the
        // corresponding line in the fixed preimage
        old_offset += len;
        while ctx < preimage.lines.len() && preimage.lines[ctx].flag & LINE_COMMON == 0 {
            fixed_offset += preimage.lines[ctx].len;
            ctx += 1;
        }
        let fixed_len = preimage.lines[ctx].len;
        new_buf.extend_from_slice(&preimage.buf[fixed_offset..fixed_offset + fixed_len]);
        line.len = fixed_len;
        line.hash = preimage.lines[ctx].hash;
        fixed_offset += fixed_len;
        ctx += 1;
    }
    postimage.buf = new_buf;
}

#[allow(clippy::too_many_arguments)]
fn match_fragment(
    img: &Image,
    preimage: &mut Image,
    postimage: &mut Image,
    try_byte: usize,
    try_lno: usize,
    ws_rule: u32,
    match_beginning: bool,
    match_end: bool,
    fix_ws: bool,
) -> bool {
    if preimage.lines.len() + try_lno > img.lines.len() {
        return false;
    }
    if match_beginning && try_lno != 0 {
        return false;
    }
    if match_end && preimage.lines.len() + try_lno != img.lines.len() {
        return false;
    }

    // quick hash check
    for (i, line) in preimage.lines.iter().enumerate() {
        if line.hash != img.lines[try_lno + i].hash {
            return false;
        }
    }

    // Do we have an exact match? If we were told to match at the end, size
    // must be exactly at try+fragsize; otherwise try+fragsize must still be
    // within the image.
    let in_range = if match_end {
        try_byte + preimage.len() == img.len()
    } else {
        try_byte + preimage.len() <= img.len()
    };
    if in_range && img.buf[try_byte..try_byte + preimage.len()] == preimage.buf[..] {
        return true;
    }

    if !fix_ws {
        return false;
    }

    // The hunk does not apply byte-by-byte, but the hash says it might with
    // whitespace fuzz: the preimage was taken either before the target's
    // whitespace got fixed, or before the target's breakage appeared. Either
    // way the fixed forms must agree.
    let mut fixed = Vec::with_capacity(preimage.len());
    let mut orig_offset = 0;
    let mut target_offset = try_byte;
    for (i, line) in preimage.lines.iter().enumerate() {
        let old_len = line.len;
        let target_len = img.lines[try_lno + i].len;
        let fixed_line = ws::fix_copy(&preimage.buf[orig_offset..orig_offset + old_len], ws_rule);
        let fixed_target =
            ws::fix_copy(&img.buf[target_offset..target_offset + target_len], ws_rule);
        if fixed_line != fixed_target {
            return false;
        }
        fixed.extend_from_slice(&fixed_line);
        orig_offset += old_len;
        target_offset += target_len;
    }

    // The preimage is based on a version with whitespace breakage, and fixing
    // it makes the hunk match. Take the fix together with the real change.
    update_pre_post_images(preimage, postimage, fixed);
    true
}

/// Search for the preimage around line `line` of `img`, alternating one line
/// backward and one line forward; the backward candidate of each pair is
/// tried first, so at equal distance the earlier position wins. Returns the
/// matched line, or `None`. On a whitespace-tolerant match the pre- and
/// postimage are rewritten in place.
#[allow(clippy::too_many_arguments)]
pub fn find_pos(
    img: &Image,
    preimage: &mut Image,
    postimage: &mut Image,
    line: isize,
    ws_rule: u32,
    match_beginning: bool,
    match_end: bool,
    fix_ws: bool,
) -> Option<usize> {
    if preimage.lines.len() > img.lines.len() {
        return None;
    }

    // If match_beginning or match_end is specified, there is no point
    // starting from a wrong line that will never match.
    let line = if match_beginning {
        0
    } else if match_end {
        img.lines.len() - preimage.lines.len()
    } else {
        line.clamp(0, img.lines.len() as isize) as usize
    };

    let start = img.start_of_line(line);
    let mut backwards = start;
    let mut backwards_lno = line;
    let mut forwards = start;
    let mut forwards_lno = line;

    let mut try_byte = start;
    let mut try_lno = line;
    let mut i: u64 = 0;
    loop {
        if match_fragment(
            img,
            preimage,
            postimage,
            try_byte,
            try_lno,
            ws_rule,
            match_beginning,
            match_end,
            fix_ws,
        ) {
            return Some(try_lno);
        }

        loop {
            if backwards_lno == 0 && forwards_lno == img.lines.len() {
                return None;
            }
            if i % 2 == 0 {
                if backwards_lno == 0 {
                    i += 1;
                    continue;
                }
                backwards_lno -= 1;
                backwards -= img.lines[backwards_lno].len;
                try_byte = backwards;
                try_lno = backwards_lno;
            } else {
                if forwards_lno == img.lines.len() {
                    i += 1;
                    continue;
                }
                forwards += img.lines[forwards_lno].len;
                forwards_lno += 1;
                try_byte = forwards;
                try_lno = forwards_lno;
            }
            break;
        }
        i += 1;
    }
}
