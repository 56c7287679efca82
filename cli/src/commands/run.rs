use anyhow::{bail, Result};
use compiler::compile;
use vm::{disassemble, VM};

use super::pipeline::analyze_file;

pub fn run_files(
    paths: &[String],
    debug_ast: bool,
    debug_disassembly: bool,
    no_color: bool,
) -> Result<()> {
    if no_color {
        colored::control::set_override(false);
    }

    let mut failed = false;
    for path in paths {
        if !run_file(path, debug_ast, debug_disassembly)? {
            failed = true;
        }
    }

    if failed {
        bail!("aborting due to previous errors");
    }
    Ok(())
}

fn run_file(path: &str, debug_ast: bool, debug_disassembly: bool) -> Result<bool> {
    let Some(typed) = analyze_file(path, debug_ast)? else {
        return Ok(false);
    };

    let compiled = match compile(&typed) {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(false);
        }
    };

    if debug_disassembly {
        println!("#######################");
        println!("##    Disassembly    ##");
        println!("#######################");
        println!();
        println!("main");
        println!("{}", disassemble(&compiled.main));
        for (i, func) in compiled.funcs.iter().enumerate() {
            println!("#{}", i);
            println!("{}", disassemble(func));
        }
    }

    let mut vm = VM::new(compiled.main, compiled.funcs);
    if let Err(err) = vm.run() {
        eprintln!("runtime error: {}", err);
        return Ok(false);
    }

    Ok(true)
}
