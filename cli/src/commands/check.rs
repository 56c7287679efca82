use anyhow::{bail, Result};

use super::pipeline::analyze_file;

pub fn check_files(paths: &[String], debug_ast: bool, no_color: bool) -> Result<()> {
    if no_color {
        colored::control::set_override(false);
    }

    let mut failed = false;
    for path in paths {
        if analyze_file(path, debug_ast)?.is_none() {
            failed = true;
        }
    }

    if failed {
        bail!("aborting due to previous errors");
    }
    Ok(())
}
