//! Initialize a repository: storage directory, empty index, objects dir, and
//! a default config file.

use std::fs;
use std::io;
use std::path::PathBuf;

use clap::Parser;

use crate::internal::index::Index;
use crate::utils::util;

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Repository directory (default: current directory)
    #[arg(long, default_value = ".", help = "Repository directory path")]
    pub repo_directory: PathBuf,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, default_value_t = false, help = "Suppress non-essential output")]
    pub quiet: bool,
}

pub fn execute(args: InitArgs) -> io::Result<()> {
    let storage = args.repo_directory.join(util::ROOT_DIR);
    let reinit = storage.is_dir();
    if reinit && !args.quiet {
        eprintln!(
            "warning: reinitializing existing repository in {}",
            args.repo_directory.display()
        );
    }

    fs::create_dir_all(storage.join("objects"))?;
    if !storage.join("index").exists() {
        Index::new().save(storage.join("index"))?;
    }
    if !storage.join("config").exists() {
        fs::write(storage.join("config"), "[core]\n\trepositoryformatversion = 0\n")?;
    }

    if !args.quiet {
        println!("Initialized empty mend repository in {}", storage.display());
    }
    Ok(())
}
