#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use compiler::compile;
use twill_parser::{check, parse_program};
use vm::{RuntimeError, VM};

/// A `Print` sink tests can read back after the VM is done with it.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("print output is UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Full pipeline: parse, check, compile, execute; returns captured
/// standard output.
pub fn run(source: &str) -> String {
    try_run(source).expect("runtime error")
}

pub fn try_run(source: &str) -> Result<String, RuntimeError> {
    let prog = parse_program(source).expect("parse failed");
    let typed = check(&prog).expect("type check failed");
    let compiled = compile(&typed).expect("compile failed");

    let buf = SharedBuf::default();
    let mut vm = VM::with_output(compiled.main, compiled.funcs, Box::new(buf.clone()));
    vm.run()?;
    Ok(buf.contents())
}

/// Output lines, without trailing newline noise.
pub fn run_lines(source: &str) -> Vec<String> {
    run(source).lines().map(str::to_string).collect()
}
