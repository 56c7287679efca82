//! The front half of both commands: load, parse, analyze, report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use twill_parser::typed::TypedProgram;
use twill_parser::{check, parse_program, stringify_program};

use crate::diagnostics;

/// Read and analyze one source file. Diagnostics go to stderr;
/// `Ok(None)` means the file was rejected (wrong extension or errors)
/// and the caller should count the run as failed where that matters.
pub fn analyze_file(path: &str, debug_ast: bool) -> Result<Option<TypedProgram>> {
    if Path::new(path).extension().and_then(|ext| ext.to_str()) != Some("twl") {
        eprintln!("skipping `{}`: expected a .twl source file", path);
        return Ok(None);
    }

    let source = fs::read_to_string(path).with_context(|| format!("could not read `{}`", path))?;

    let ast = match parse_program(&source) {
        Ok(ast) => ast,
        Err(err) => {
            eprint!("{}", diagnostics::render_parse_error(path, &source, &err));
            return Ok(None);
        }
    };

    let typed = match check(&ast) {
        Ok(typed) => typed,
        Err(errors) => {
            for err in &errors {
                eprint!("{}", diagnostics::render_type_error(path, &source, err));
            }
            return Ok(None);
        }
    };

    if debug_ast {
        println!("#######################");
        println!("##        AST        ##");
        println!("#######################");
        println!();
        println!("{}", stringify_program(&typed));
        println!();
    }

    Ok(Some(typed))
}
