//! Typed tree to bytecode.
//!
//! Each function (the main body included) compiles inside an `Assembly`:
//! the prototype being emitted plus the register-stack state. Register 0
//! is the return-value slot, registers `1..=N` are reserved for the
//! scope's locals in record order, and `stack_ptr` tracks the next free
//! temporary above them. Expressions push temporaries; statements pop
//! them back, so `stack_ptr == reserved_regs` at every statement
//! boundary.

use memory::FuncPrototype;
use twill_parser::ast::{BinOp, UnaryOp};
use twill_parser::scope::{LocalRecord, UpvalueRecord};
use twill_parser::typed::{TypedExpr, TypedExprKind, TypedFunc, TypedProgram, TypedStmt};
use twill_parser::Type;
use vm::instruction::{BinaryKind, Instruction};
use vm::machine::REGISTER_COUNT;

use crate::error::CompileError;
use crate::jumps::{Placeholder, UNRESOLVED_ADDR};

/// The compiler's output: the top-level main prototype plus every nested
/// function prototype, in the order `FuncConst` indexes them.
#[derive(Debug)]
pub struct CompiledProgram {
    pub main: FuncPrototype,
    pub funcs: Vec<FuncPrototype>,
}

/// Compile an analyzed program. The input is assumed semantically valid;
/// unknown names or mistyped operands indicate a front-end bug and
/// panic.
pub fn compile(program: &TypedProgram) -> Result<CompiledProgram, CompileError> {
    let mut compiler = Compiler {
        assemblies: Vec::new(),
        funcs: Vec::new(),
    };

    compiler
        .assemblies
        .push(Assembly::new(&program.locals, &program.upvalues)?);
    for stmt in &program.stmts {
        compiler.compile_stmt(stmt)?;
    }
    // Terminate the main body before execution can run off the end.
    compiler.current().emit(Instruction::Halt);

    let main = compiler.assemblies.pop().expect("main assembly").proto;
    Ok(CompiledProgram {
        main,
        funcs: compiler.funcs,
    })
}

/// Per-function compiler state.
struct Assembly {
    proto: FuncPrototype,
    /// Next free register for temporaries; starts at `reserved_regs`.
    stack_ptr: u32,
    return_regs: u32,
    local_regs: u32,
    /// `return_regs + local_regs`; a register is on the register stack
    /// iff its address is at least this.
    reserved_regs: u32,
}

impl Assembly {
    fn new(locals: &[LocalRecord], upvalues: &[UpvalueRecord]) -> Result<Self, CompileError> {
        let return_regs = 1u32;
        let local_regs = locals.len() as u32;
        let reserved_regs = return_regs + local_regs;
        if reserved_regs as usize > REGISTER_COUNT {
            return Err(CompileError::TooManyLocals {
                count: locals.len(),
            });
        }

        Ok(Self {
            proto: FuncPrototype {
                bytecode: Vec::new(),
                constants: Vec::new(),
                locals: locals.to_vec(),
                upvalues: upvalues.to_vec(),
            },
            stack_ptr: reserved_regs,
            return_regs,
            local_regs,
            reserved_regs,
        })
    }

    fn emit(&mut self, inst: Instruction) {
        inst.encode(&mut self.proto.bytecode);
    }

    fn offset(&self) -> u32 {
        self.proto.bytecode.len() as u32
    }

    fn is_on_stack(&self, reg: u32) -> bool {
        reg >= self.reserved_regs
    }

    fn check_register(&self, reg: u32) -> Result<(), CompileError> {
        if (reg as usize) < REGISTER_COUNT {
            Ok(())
        } else {
            Err(CompileError::RegisterOverflow)
        }
    }

    fn push_if_stacked(&mut self, reg: u32) {
        if self.is_on_stack(reg) {
            debug_assert_eq!(reg, self.stack_ptr, "pushed register must be the stack top");
            self.stack_ptr = reg + 1;
        }
    }

    fn pop_if_stacked(&mut self, reg: u32) {
        if self.is_on_stack(reg) {
            debug_assert_eq!(reg + 1, self.stack_ptr, "popped register must be the stack top");
            self.stack_ptr = reg;
        }
    }

    /// Register holding the named local. Unknown names are a front-end
    /// contract violation.
    fn local_register(&self, name: &str) -> u32 {
        for record in &self.proto.locals {
            if record.name == name {
                debug_assert!((record.lookup_index as u32) < self.local_regs);
                return self.return_regs + record.lookup_index as u32;
            }
        }
        panic!("unknown local variable `{}`", name);
    }

    /// Position of `name` in this prototype's upvalue list, which is the
    /// index `LoadUpVal`/`SetUpVal` take at runtime.
    fn upvalue_position(&self, name: &str) -> Option<u32> {
        self.proto
            .upvalues
            .iter()
            .position(|record| record.name == name)
            .map(|pos| pos as u32)
    }

    /// Intern a string constant, reusing an existing pool entry.
    #[cfg(feature = "strings")]
    fn add_constant(&mut self, value: &str) -> u32 {
        if let Some(index) = self.proto.constants.iter().position(|c| c == value) {
            return index as u32;
        }
        let index = self.proto.constants.len() as u32;
        self.proto.constants.push(value.to_string());
        index
    }
}

struct Compiler {
    /// LIFO stack of assemblies; the innermost function being compiled is
    /// on top.
    assemblies: Vec<Assembly>,
    /// The flat prototype pool, owned by the orchestrator. A prototype's
    /// index here is fixed before its body compiles so nested literals
    /// (and recursion) see stable indices.
    funcs: Vec<FuncPrototype>,
}

impl Compiler {
    fn current(&mut self) -> &mut Assembly {
        self.assemblies.last_mut().expect("assembly stack underflow")
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn compile_stmt(&mut self, stmt: &TypedStmt) -> Result<(), CompileError> {
        self.compile_stmt_inner(stmt)?;
        let asm = self.current();
        debug_assert_eq!(
            asm.stack_ptr, asm.reserved_regs,
            "register stack must drain at statement boundaries"
        );
        Ok(())
    }

    fn compile_stmt_inner(&mut self, stmt: &TypedStmt) -> Result<(), CompileError> {
        match stmt {
            TypedStmt::Let { name, value } => self.compile_store(name, value),
            TypedStmt::Assign { name, value } => {
                if let Some(index) = self.current().upvalue_position(name) {
                    // Captured variable: load the value onto the register
                    // stack, then write it through the cell.
                    let sp = self.current().stack_ptr;
                    let source = self.compile_expr(value, sp)?;
                    self.current().emit(Instruction::SetUpVal {
                        source,
                        index: index as i32,
                    });
                    self.current().pop_if_stacked(source);
                    Ok(())
                } else {
                    self.compile_store(name, value)
                }
            }
            TypedStmt::Print { value } => {
                let sp = self.current().stack_ptr;
                let source = self.compile_expr(value, sp)?;
                self.current().emit(Instruction::Print { source });
                self.current().pop_if_stacked(source);
                Ok(())
            }
            TypedStmt::Return { value } => {
                match value {
                    Some(value) => {
                        let sp = self.current().stack_ptr;
                        let source = self.compile_expr(value, sp)?;
                        self.current().emit(Instruction::Return { source });
                        self.current().pop_if_stacked(source);
                    }
                    // Bare return: keep whatever r0 already holds.
                    None => self.current().emit(Instruction::Return { source: 0 }),
                }
                Ok(())
            }
            TypedStmt::If { clauses, else_body } => self.compile_if(clauses, else_body.as_deref()),
            TypedStmt::While { cond, body } => self.compile_while(cond, body),
            TypedStmt::Expr { value } => {
                let sp = self.current().stack_ptr;
                let produced = self.compile_expr(value, sp)?;
                self.current().pop_if_stacked(produced);
                Ok(())
            }
        }
    }

    /// `let x := e` and plain local assignment compile identically: the
    /// destination is the variable's reserved register.
    fn compile_store(&mut self, name: &str, value: &TypedExpr) -> Result<(), CompileError> {
        let dest = self.current().local_register(name);
        let produced = self.compile_expr(value, dest)?;
        // A variable-to-variable binding produces the source variable's
        // register; everything else already wrote into `dest`.
        if produced != dest && !self.current().is_on_stack(produced) {
            self.current().emit(Instruction::Move {
                source: produced,
                dest,
            });
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        clauses: &[twill_parser::typed::TypedClause],
        else_body: Option<&[TypedStmt]>,
    ) -> Result<(), CompileError> {
        let mut done = Placeholder::new();

        // Test chain: each clause branches to its body when its condition
        // holds; control falls through to the next test otherwise.
        let mut body_targets = Vec::with_capacity(clauses.len() + 1);
        for clause in clauses {
            let sp = self.current().stack_ptr;
            let test = self.compile_expr(&clause.cond, sp)?;
            self.current().pop_if_stacked(test);

            let mut target = Placeholder::new();
            self.emit_forward_branch(
                Instruction::BrTrue {
                    test,
                    addr: UNRESOLVED_ADDR,
                },
                &mut target,
            );
            body_targets.push(target);
        }

        // No test matched: jump to the else body, or past the statement.
        match else_body {
            Some(_) => {
                let mut target = Placeholder::new();
                self.emit_forward_branch(
                    Instruction::BrAlways {
                        addr: UNRESOLVED_ADDR,
                    },
                    &mut target,
                );
                body_targets.push(target);
            }
            None => {
                self.emit_forward_branch(
                    Instruction::BrAlways {
                        addr: UNRESOLVED_ADDR,
                    },
                    &mut done,
                );
            }
        }

        // Bodies, in source order; every body but the last jumps to done.
        let mut bodies: Vec<&[TypedStmt]> = clauses.iter().map(|c| c.body.as_slice()).collect();
        if let Some(body) = else_body {
            bodies.push(body);
        }

        let total = bodies.len();
        for (i, (mut target, body)) in body_targets.into_iter().zip(bodies).enumerate() {
            self.resolve_here(&mut target);
            for stmt in body {
                self.compile_stmt(stmt)?;
            }
            if i + 1 < total {
                self.emit_forward_branch(
                    Instruction::BrAlways {
                        addr: UNRESOLVED_ADDR,
                    },
                    &mut done,
                );
            }
        }

        self.resolve_here(&mut done);
        Ok(())
    }

    fn compile_while(&mut self, cond: &TypedExpr, body: &[TypedStmt]) -> Result<(), CompileError> {
        // The backward branch target is known up front; only the exit is
        // patched forward.
        let loop_start = self.current().offset();

        let sp = self.current().stack_ptr;
        let test = self.compile_expr(cond, sp)?;
        self.current().pop_if_stacked(test);

        let mut exit = Placeholder::new();
        self.emit_forward_branch(
            Instruction::BrFalse {
                test,
                addr: UNRESOLVED_ADDR,
            },
            &mut exit,
        );

        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        self.current().emit(Instruction::BrAlways { addr: loop_start });

        self.resolve_here(&mut exit);
        Ok(())
    }

    fn emit_forward_branch(&mut self, inst: Instruction, target: &mut Placeholder) {
        let asm = self.current();
        asm.emit(inst);
        target.add_site(asm.proto.bytecode.len());
    }

    fn resolve_here(&mut self, target: &mut Placeholder) {
        let asm = self.current();
        let offset = asm.offset();
        target.resolve(offset, &mut asm.proto.bytecode);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Compile `expr`, preferring to leave the result in `dest`. Returns
    /// the register actually holding the result: a bare identifier
    /// produces its variable's reserved register with no emission at all.
    /// If the returned register is on the register stack it has been
    /// pushed, and the caller owns popping it.
    fn compile_expr(&mut self, expr: &TypedExpr, dest: u32) -> Result<u32, CompileError> {
        self.current().check_register(dest)?;

        match &expr.kind {
            TypedExprKind::Int(value) => {
                self.current().emit(Instruction::IntConst {
                    value: *value,
                    dest,
                });
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
            TypedExprKind::Dec(value) => {
                self.current().emit(Instruction::DecConst {
                    value: *value,
                    dest,
                });
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
            TypedExprKind::Bool(value) => {
                self.current().emit(Instruction::BoolConst {
                    value: i32::from(*value),
                    dest,
                });
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
            TypedExprKind::Str(value) => self.compile_str(value, dest),
            TypedExprKind::Ident(name) => {
                if let Some(index) = self.current().upvalue_position(name) {
                    self.current().emit(Instruction::LoadUpVal {
                        index: index as i32,
                        dest,
                    });
                    self.current().push_if_stacked(dest);
                    Ok(dest)
                } else {
                    Ok(self.current().local_register(name))
                }
            }
            TypedExprKind::Unary { op, operand } => {
                let sp = self.current().stack_ptr;
                let source = self.compile_expr(operand, sp)?;
                let UnaryOp::Neg = *op;
                let inst = match operand.ty {
                    Type::Int => Instruction::IntNeg {
                        operand: source,
                        dest,
                    },
                    Type::Dec => Instruction::DecNeg {
                        operand: source,
                        dest,
                    },
                    ref other => panic!("negation of non-numeric kind `{}`", other),
                };
                self.current().emit(inst);
                self.current().pop_if_stacked(source);
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
            TypedExprKind::Binary { op, lhs, rhs } => {
                let sp = self.current().stack_ptr;
                let left = self.compile_expr(lhs, sp)?;
                let sp = self.current().stack_ptr;
                let right = self.compile_expr(rhs, sp)?;

                // Opcode group follows the left operand's static kind.
                let kind = binary_kind(*op);
                let inst = match lhs.ty {
                    Type::Int => Instruction::IntBinary {
                        kind,
                        left,
                        right,
                        dest,
                    },
                    Type::Dec => Instruction::DecBinary {
                        kind,
                        left,
                        right,
                        dest,
                    },
                    ref other => panic!(
                        "operator `{}` on non-numeric kind `{}`",
                        op.symbol(),
                        other
                    ),
                };
                self.current().emit(inst);
                self.current().pop_if_stacked(right);
                self.current().pop_if_stacked(left);
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
            TypedExprKind::Call { callee, args } => self.compile_dispatch(callee, args, dest),
            TypedExprKind::Func(func) => {
                let index = self.compile_func(func)?;
                self.current().emit(Instruction::FuncConst { index, dest });
                self.current().push_if_stacked(dest);
                Ok(dest)
            }
        }
    }

    #[cfg(feature = "strings")]
    fn compile_str(&mut self, value: &str, dest: u32) -> Result<u32, CompileError> {
        let index = self.current().add_constant(value);
        self.current().emit(Instruction::StrConst { index, dest });
        self.current().push_if_stacked(dest);
        Ok(dest)
    }

    #[cfg(not(feature = "strings"))]
    fn compile_str(&mut self, _value: &str, _dest: u32) -> Result<u32, CompileError> {
        Err(CompileError::StringsDisabled)
    }

    /// Calls. The callee compiles first, then every argument is
    /// materialized into consecutive register-stack slots (Dispatch
    /// copies a contiguous block into the callee frame). After emission
    /// the argument block is popped for reuse, and the returned value is
    /// moved out of r0 into `dest`.
    fn compile_dispatch(
        &mut self,
        callee: &TypedExpr,
        args: &[TypedExpr],
        dest: u32,
    ) -> Result<u32, CompileError> {
        let sp = self.current().stack_ptr;
        let callee_reg = self.compile_expr(callee, sp)?;

        let mut first_arg = 0u32;
        for (i, arg) in args.iter().enumerate() {
            let sp = self.current().stack_ptr;
            let produced = self.compile_expr(arg, sp)?;
            let slot = if produced == sp {
                produced
            } else {
                // A bare variable resolves to its reserved register;
                // copy it into the contiguous argument block.
                self.current().check_register(sp)?;
                self.current().emit(Instruction::Move {
                    source: produced,
                    dest: sp,
                });
                self.current().push_if_stacked(sp);
                sp
            };
            if i == 0 {
                first_arg = slot;
            }
        }

        self.current().emit(Instruction::Dispatch {
            source: callee_reg,
            first_arg,
        });

        // The callee frame copied the arguments out; the block is free.
        if !args.is_empty() {
            self.current().stack_ptr = first_arg;
        }
        if self.current().is_on_stack(callee_reg) {
            self.current().stack_ptr = callee_reg;
        }

        // The return value lands in r0; surface it at the requested
        // destination.
        if dest != 0 {
            self.current().emit(Instruction::Move { source: 0, dest });
            self.current().push_if_stacked(dest);
            Ok(dest)
        } else {
            Ok(0)
        }
    }

    /// Compile a function literal to a fresh prototype and return its
    /// pool index. The slot is reserved before the body compiles so the
    /// index is stable for recursion and nested literals.
    fn compile_func(&mut self, func: &TypedFunc) -> Result<u32, CompileError> {
        let assembly = Assembly::new(&func.locals, &func.upvalues)?;

        let index = self.funcs.len() as u32;
        self.funcs.push(FuncPrototype::default());

        self.assemblies.push(assembly);
        for stmt in &func.body {
            self.compile_stmt(stmt)?;
        }
        // Fall-through returns whatever r0 holds.
        self.current().emit(Instruction::Return { source: 0 });

        let assembly = self.assemblies.pop().expect("function assembly");
        self.funcs[index as usize] = assembly.proto;
        Ok(index)
    }
}

fn binary_kind(op: BinOp) -> BinaryKind {
    match op {
        BinOp::Lt => BinaryKind::LT,
        BinOp::LtEq => BinaryKind::LTEq,
        BinOp::Gt => BinaryKind::GT,
        BinOp::GtEq => BinaryKind::GTEq,
        BinOp::Eq => BinaryKind::Eq,
        BinOp::Add => BinaryKind::Add,
        BinOp::Sub => BinaryKind::Sub,
        BinOp::Mul => BinaryKind::Mul,
        BinOp::Div => BinaryKind::Div,
    }
}
