//! The apply command: flag surface for the patch engine and the driver that
//! feeds patch inputs through a session.

use std::fs;
use std::io;
use std::io::Read;
use std::path::PathBuf;

use clap::Parser;

use crate::internal::config::Config;
use crate::internal::patch::pipeline::{ApplyOptions, Session};
use crate::internal::patch::ws::{self, WsErrorAction};
use crate::internal::patch::PatchError;
use crate::utils::util;

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Patch files to apply; reads stdin when none are given or for "-"
    #[clap(value_name = "PATCH")]
    pub patch: Vec<PathBuf>,

    /// Instead of applying the patch, output diffstat for the input
    #[clap(long)]
    pub stat: bool,

    /// Show the number of added and deleted lines in decimal notation
    #[clap(long)]
    pub numstat: bool,

    /// Instead of applying the patch, output a summary for the input
    #[clap(long)]
    pub summary: bool,

    /// Instead of applying the patch, see if the patch is applicable
    #[clap(long)]
    pub check: bool,

    /// Make sure the patch is applicable to the current index
    #[clap(long)]
    pub index: bool,

    /// Apply a patch without touching the working tree
    #[clap(long)]
    pub cached: bool,

    /// Also apply the patch (use with --stat/--summary/--check)
    #[clap(long)]
    pub apply: bool,

    /// Remove <NUM> leading slashes from traditional diff paths
    #[clap(short = 'p', value_name = "NUM")]
    pub strip: Option<usize>,

    /// Ensure at least <NUM> lines of context match
    #[clap(short = 'C', value_name = "NUM")]
    pub context: Option<usize>,

    /// Detect new or modified lines that have whitespace errors
    #[clap(long, value_name = "ACTION")]
    pub whitespace: Option<String>,

    /// Apply the patch in reverse
    #[clap(short = 'R', long)]
    pub reverse: bool,

    /// Leave the rejected hunks in corresponding *.rej files
    #[clap(long)]
    pub reject: bool,

    /// Don't expect at least one line of context
    #[clap(long)]
    pub unidiff_zero: bool,

    /// Tolerate incorrectly detected missing new-line at the end of file
    #[clap(long)]
    pub inaccurate_eof: bool,

    /// Do not trust the line counts in the hunk headers
    #[clap(long)]
    pub recount: bool,

    /// Prepend <ROOT> to all filenames
    #[clap(long, value_name = "ROOT")]
    pub directory: Option<String>,

    /// Apply changes matching the given path
    #[clap(long, value_name = "PATH")]
    pub include: Vec<String>,

    /// Don't apply changes matching the given path
    #[clap(long, value_name = "PATH")]
    pub exclude: Vec<String>,

    /// Ignore additions made by the patch
    #[clap(long)]
    pub no_add: bool,

    /// Paths are separated with NUL character
    #[clap(short = 'z')]
    pub null_terminated: bool,

    /// Report progress on stderr
    #[clap(short = 'v', long)]
    pub verbose: bool,
}

fn build_options(args: &ApplyArgs) -> Result<ApplyOptions, PatchError> {
    let mut opts = ApplyOptions {
        diffstat: args.stat,
        numstat: args.numstat,
        summary: args.summary,
        check: args.check,
        apply_in_reverse: args.reverse,
        unidiff_zero: args.unidiff_zero,
        inaccurate_eof: args.inaccurate_eof,
        recount: args.recount,
        no_add: args.no_add,
        apply_verbosely: args.verbose,
        ..ApplyOptions::default()
    };

    if args.reject {
        opts.apply_with_reject = true;
        opts.apply_verbosely = true;
    }
    if !args.apply && (args.stat || args.numstat || args.summary || args.check) {
        opts.apply = false;
    }

    let in_repo = util::repo_exists();
    if args.index && !in_repo {
        return Err(PatchError::Apply("--index outside a repository".to_string()));
    }
    if args.cached {
        if !in_repo {
            return Err(PatchError::Apply("--cached outside a repository".to_string()));
        }
        opts.cached = true;
        opts.check_index = true;
    }
    if args.index {
        opts.check_index = true;
    }

    if let Some(p) = args.strip {
        opts.p_value = p;
        opts.p_value_known = true;
    }
    if let Some(context) = args.context {
        opts.p_context = context;
    }

    // --whitespace beats apply.whitespace from the config; without either,
    // warn when applying and stay quiet otherwise.
    let config_action = if in_repo {
        Config::get("apply", None, "whitespace")
    } else {
        None
    };
    match args.whitespace.as_deref().or(config_action.as_deref()) {
        Some(option) => {
            let (action, squelch) = ws::parse_action(option)?;
            opts.ws_action = action;
            if !squelch {
                opts.squelch_ws_errors = 0;
            }
        }
        None => {
            opts.ws_action = if opts.apply {
                WsErrorAction::Warn
            } else {
                WsErrorAction::Nowarn
            };
        }
    }
    if in_repo {
        if let Some(rule) = Config::get("core", None, "whitespace") {
            opts.ws_rule = ws::parse_rule(&rule);
        }
    }

    if let Some(root) = &args.directory {
        let mut root = root.clone();
        if !root.is_empty() && !root.ends_with('/') {
            root.push('/');
        }
        if !root.is_empty() {
            opts.root = Some(root);
        }
    }

    for pattern in &args.exclude {
        opts.limit_by_name.push((pattern.clone(), false));
    }
    for pattern in &args.include {
        opts.limit_by_name.push((pattern.clone(), true));
        opts.has_include = true;
    }

    if args.null_terminated {
        opts.line_termination = 0;
    }

    Ok(opts)
}

/// Run the apply session over all inputs. `Ok(true)` means at least one
/// patch failed or was rejected (exit code 1); `Err` is a stream-fatal or
/// I/O condition.
pub fn execute(args: ApplyArgs) -> Result<bool, PatchError> {
    tracing::debug!("apply args: {:?}", args);
    let opts = build_options(&args)?;
    let mut session = Session::new(opts);
    let mut errs = false;

    if args.patch.is_empty() {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        errs |= session.run(&buffer, "<stdin>")?;
    } else {
        for path in &args.patch {
            let (buffer, name) = if path.as_os_str() == "-" {
                let mut buffer = Vec::new();
                io::stdin().read_to_end(&mut buffer)?;
                (buffer, "<stdin>".to_string())
            } else {
                let buffer = fs::read(path).map_err(|e| {
                    PatchError::Apply(format!("can't open patch '{}': {e}", path.display()))
                })?;
                (buffer, path.display().to_string())
            };
            errs |= session.run(&buffer, &name)?;
        }
    }

    session.finish()?;
    Ok(errs)
}
