//! Diffstat, numstat, and summary output over a parsed patch list, printed
//! in the formats diff tools have always used.

use std::io::Write;

use colored::Colorize;

use super::header::quote_c_style;
use super::Patch;

fn quoted_name(patch: &Patch) -> String {
    let name = patch.output_name();
    quote_c_style(name).unwrap_or_else(|| name.to_string())
}

/// Scaled diffstat: one line per file with a +/- graph, then a total line.
pub fn print_diffstat(patches: &[Patch]) {
    let max_change = patches
        .iter()
        .map(|p| p.lines_added + p.lines_deleted)
        .max()
        .unwrap_or(0);
    let max_len = patches
        .iter()
        .map(|p| quoted_name(p).len())
        .max()
        .unwrap_or(0);

    let mut files = 0;
    let mut adds = 0;
    let mut dels = 0;
    for patch in patches {
        files += 1;
        adds += patch.lines_added;
        dels += patch.lines_deleted;
        show_stats(patch, max_change, max_len);
    }
    println!(" {files} files changed, {adds} insertions(+), {dels} deletions(-)");
}

fn show_stats(patch: &Patch, max_change: usize, max_len: usize) {
    let mut qname = quoted_name(patch);

    // scale the filename
    let max = max_len.min(50);
    if qname.len() > max {
        // cut at a directory boundary when one is in reach
        let start = qname.len() + 3 - max;
        let cut = qname[start..]
            .find('/')
            .map(|pos| start + pos)
            .unwrap_or(start);
        qname = format!("...{}", &qname[cut..]);
    }

    if patch.is_binary {
        println!(" {qname:<max$} |  Bin");
        return;
    }

    // scale the add/delete graph
    let graph_width = if max + max_change > 70 {
        70 - max
    } else {
        max_change
    };
    let mut add = patch.lines_added;
    let mut del = patch.lines_deleted;
    if max_change > 0 {
        let total = ((add + del) * graph_width + max_change / 2) / max_change;
        add = (add * graph_width + max_change / 2) / max_change;
        del = total - add;
    }
    println!(
        " {qname:<max$} |{:5} {}{}",
        patch.lines_added + patch.lines_deleted,
        "+".repeat(add).green(),
        "-".repeat(del).red()
    );
}

/// Tab-separated added/deleted counts per file; `-` for binary patches.
pub fn print_numstat(patches: &[Patch], line_termination: u8) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for patch in patches {
        if patch.is_binary {
            let _ = write!(out, "-\t-\t");
        } else {
            let _ = write!(out, "{}\t{}\t", patch.lines_added, patch.lines_deleted);
        }
        let name = patch.output_name();
        if line_termination == 0 {
            let _ = out.write_all(name.as_bytes());
        } else {
            let _ = out.write_all(
                quote_c_style(name)
                    .unwrap_or_else(|| name.to_string())
                    .as_bytes(),
            );
        }
        let _ = out.write_all(&[line_termination]);
    }
    let _ = out.flush();
}

fn show_file_mode_name(newdelete: &str, mode: u32, name: &str) {
    if mode != 0 {
        println!(" {newdelete} mode {mode:06o} {name}");
    } else {
        println!(" {newdelete} {name}");
    }
}

fn show_mode_change(patch: &Patch, show_name: bool) {
    if patch.old_mode != 0 && patch.new_mode != 0 && patch.old_mode != patch.new_mode {
        if show_name {
            println!(
                " mode change {:06o} => {:06o} {}",
                patch.old_mode,
                patch.new_mode,
                patch.output_name()
            );
        } else {
            println!(" mode change {:06o} => {:06o}", patch.old_mode, patch.new_mode);
        }
    }
}

fn show_rename_copy(patch: &Patch) {
    let renamecopy = if patch.is_rename { "rename" } else { "copy" };
    let old_name = patch.old_name.as_deref().unwrap_or("");
    let new_name = patch.new_name.as_deref().unwrap_or("");

    // Find the common leading directory prefix.
    let mut prefix = 0;
    loop {
        let old_rest = &old_name[prefix..];
        let new_rest = &new_name[prefix..];
        match (old_rest.find('/'), new_rest.find('/')) {
            (Some(slash_old), Some(slash_new))
                if slash_old == slash_new
                    && old_rest[..slash_old] == new_rest[..slash_new] =>
            {
                prefix += slash_old + 1;
            }
            _ => break,
        }
    }

    if prefix > 0 {
        println!(
            " {renamecopy} {}{{{} => {}}} ({}%)",
            &old_name[..prefix],
            &old_name[prefix..],
            &new_name[prefix..],
            patch.score
        );
    } else {
        println!(" {renamecopy} {old_name} => {new_name} ({}%)", patch.score);
    }
    show_mode_change(patch, false);
}

/// Create/delete/rename/mode summary, one entry per patch.
pub fn print_summary(patches: &[Patch]) {
    for patch in patches {
        if patch.is_new.is_yes() {
            show_file_mode_name("create", patch.new_mode, patch.output_name());
        } else if patch.is_delete.is_yes() {
            show_file_mode_name("delete", patch.old_mode, patch.best_name());
        } else if patch.is_rename || patch.is_copy {
            show_rename_copy(patch);
        } else if patch.score != 0 {
            println!(" rewrite {} ({}%)", patch.output_name(), patch.score);
            show_mode_change(patch, false);
        } else {
            show_mode_change(patch, true);
        }
    }
}
