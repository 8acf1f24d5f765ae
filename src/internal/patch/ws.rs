//! Whitespace rules: per-path violation detection on added lines and the
//! rewrite used by `--whitespace=fix` and the whitespace-tolerant matcher.

use super::PatchError;

pub const WS_TRAILING_SPACE: u32 = 1 << 0;
pub const WS_SPACE_BEFORE_TAB: u32 = 1 << 1;
pub const WS_INDENT_WITH_NON_TAB: u32 = 1 << 2;
pub const WS_CR_AT_EOL: u32 = 1 << 3;
pub const WS_TAB_IN_INDENT: u32 = 1 << 4;
pub const WS_BLANK_AT_EOF: u32 = 1 << 5;

pub const WS_DEFAULT_RULE: u32 = WS_TRAILING_SPACE | WS_SPACE_BEFORE_TAB;

const TAB_WIDTH: usize = 8;

/// What to do about whitespace errors on lines the patch introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WsErrorAction {
    Nowarn,
    #[default]
    Warn,
    Die,
    Correct,
}

/// Parse a `--whitespace=` option or an `apply.whitespace` config value.
/// Returns the action and whether individual errors should be squelched.
pub fn parse_action(option: &str) -> Result<(WsErrorAction, bool), PatchError> {
    match option {
        "warn" => Ok((WsErrorAction::Warn, true)),
        "nowarn" => Ok((WsErrorAction::Nowarn, true)),
        "error" => Ok((WsErrorAction::Die, true)),
        "error-all" => Ok((WsErrorAction::Die, false)),
        "strip" | "fix" => Ok((WsErrorAction::Correct, true)),
        _ => Err(PatchError::BadWhitespaceOption(option.to_string())),
    }
}

/// Parse a `core.whitespace` style comma-separated rule list into a bitmask.
/// Unknown names are ignored; a `-` prefix clears the rule.
pub fn parse_rule(value: &str) -> u32 {
    let mut rule = WS_DEFAULT_RULE;
    for item in value.split(',') {
        let item = item.trim();
        let (negated, name) = match item.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, item),
        };
        let bit = match name {
            "trailing-space" => WS_TRAILING_SPACE,
            "space-before-tab" => WS_SPACE_BEFORE_TAB,
            "indent-with-non-tab" => WS_INDENT_WITH_NON_TAB,
            "cr-at-eol" => WS_CR_AT_EOL,
            "tab-in-indent" => WS_TAB_IN_INDENT,
            "blank-at-eof" => WS_BLANK_AT_EOF,
            _ => continue,
        };
        if negated {
            rule &= !bit;
        } else {
            rule |= bit;
        }
    }
    rule
}

/// Check one added line (without its leading `+`) against `rule`, returning
/// the bits of the violations found.
pub fn check(line: &[u8], rule: u32) -> u32 {
    let mut result = 0;
    let content = match line.last() {
        Some(&b'\n') => &line[..line.len() - 1],
        _ => line,
    };
    // With cr-at-eol the CR is part of the terminator, not trailing space.
    let content = if rule & WS_CR_AT_EOL != 0 {
        match content.last() {
            Some(&b'\r') => &content[..content.len() - 1],
            _ => content,
        }
    } else {
        content
    };

    if rule & WS_TRAILING_SPACE != 0 {
        if let Some(&last) = content.last() {
            if last == b' ' || last == b'\t' || last == b'\r' {
                result |= WS_TRAILING_SPACE;
            }
        }
    }

    let indent_len = content
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(content.len());
    let indent = &content[..indent_len];

    if rule & WS_SPACE_BEFORE_TAB != 0 {
        let mut seen_space = false;
        for &b in indent {
            match b {
                b' ' => seen_space = true,
                b'\t' if seen_space => {
                    result |= WS_SPACE_BEFORE_TAB;
                    break;
                }
                _ => {}
            }
        }
    }

    if rule & WS_INDENT_WITH_NON_TAB != 0 {
        let mut run = 0;
        for &b in indent {
            if b == b' ' {
                run += 1;
                if run >= TAB_WIDTH {
                    result |= WS_INDENT_WITH_NON_TAB;
                    break;
                }
            } else {
                run = 0;
            }
        }
    }

    if rule & WS_TAB_IN_INDENT != 0 && indent.contains(&b'\t') {
        result |= WS_TAB_IN_INDENT;
    }

    result
}

/// Human-readable description of a violation bitmask.
pub fn error_string(violations: u32) -> String {
    let mut parts = Vec::new();
    if violations & WS_TRAILING_SPACE != 0 {
        parts.push("trailing whitespace");
    }
    if violations & WS_SPACE_BEFORE_TAB != 0 {
        parts.push("space before tab in indent");
    }
    if violations & WS_INDENT_WITH_NON_TAB != 0 {
        parts.push("indent with spaces");
    }
    if violations & WS_TAB_IN_INDENT != 0 {
        parts.push("tab in indent");
    }
    parts.join(", ")
}

/// Copy `src` (one line, trailing LF included if any) with the whitespace
/// breakages `rule` covers rewritten. The output is never longer than the
/// input; that invariant is what allows the matcher to rewrite context bytes
/// of the postimage in place. `tab-in-indent` would expand and is therefore
/// detected but never fixed.
pub fn fix_copy(src: &[u8], rule: u32) -> Vec<u8> {
    let (content, eol): (&[u8], &[u8]) = match src.last() {
        Some(&b'\n') => (&src[..src.len() - 1], b"\n"),
        _ => (src, b""),
    };

    let mut content = content;
    if rule & WS_TRAILING_SPACE != 0 {
        while let Some(&last) = content.last() {
            if last == b' ' || last == b'\t' || last == b'\r' {
                content = &content[..content.len() - 1];
            } else {
                break;
            }
        }
    }

    let indent_len = content
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(content.len());
    let (indent, rest) = content.split_at(indent_len);

    let mut out = Vec::with_capacity(src.len());
    if rule & (WS_SPACE_BEFORE_TAB | WS_INDENT_WITH_NON_TAB) != 0 && !indent.is_empty() {
        out.extend_from_slice(&fix_indent(indent, rule));
    } else {
        out.extend_from_slice(indent);
    }
    out.extend_from_slice(rest);
    out.extend_from_slice(eol);
    out
}

/// Rewrite an all-whitespace indent without the offending byte sequences.
fn fix_indent(indent: &[u8], rule: u32) -> Vec<u8> {
    let violations = check(indent, rule & (WS_SPACE_BEFORE_TAB | WS_INDENT_WITH_NON_TAB));
    if violations == 0 {
        return indent.to_vec();
    }

    let mut out = Vec::with_capacity(indent.len());
    if violations & WS_INDENT_WITH_NON_TAB != 0 {
        // Re-emit the reached column as tabs plus a space remainder.
        let mut width = 0;
        for &b in indent {
            match b {
                b'\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                _ => width += 1,
            }
        }
        out.resize(width / TAB_WIDTH, b'\t');
        out.resize(width / TAB_WIDTH + width % TAB_WIDTH, b' ');
    } else {
        // Drop the spaces a following tab would swallow anyway.
        for &b in indent {
            if b == b'\t' {
                while out.last() == Some(&b' ') {
                    out.pop();
                }
            }
            out.push(b);
        }
    }
    out
}
