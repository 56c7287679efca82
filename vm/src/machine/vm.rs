use std::io::{self, Write};
use std::rc::Rc;

use memory::{ClosureObj, FuncPrototype, Heap, UpvalueCell, UpvalueLocation, Value};

use crate::error::RuntimeError;
use crate::instruction::{BinaryKind, Instruction};

use super::frame::{StackFrame, REGISTER_COUNT};

/// The virtual machine.
///
/// State is an instruction pointer (a byte offset into the current
/// frame's prototype bytecode), a call stack of frames (the active frame
/// on top), the closure/upvalue heap, and the pool of nested function
/// prototypes that `FuncConst` instantiates. `Print` writes to the
/// injectable `out` collaborator.
pub struct VM {
    frames: Vec<StackFrame>,
    heap: Heap,
    funcs: Vec<Rc<FuncPrototype>>,
    ip: usize,
    /// Handles of upvalue cells still aliasing a live frame's register.
    open_upvalues: Vec<u32>,
    out: Box<dyn Write>,
}

impl VM {
    /// Create a VM over a compiled main prototype and its nested function
    /// pool, printing to standard output.
    pub fn new(main: FuncPrototype, funcs: Vec<FuncPrototype>) -> Self {
        Self::with_output(main, funcs, Box::new(io::stdout()))
    }

    /// Same as [`VM::new`] but with an explicit `Print` sink; tests use
    /// this to capture output.
    pub fn with_output(
        main: FuncPrototype,
        funcs: Vec<FuncPrototype>,
        out: Box<dyn Write>,
    ) -> Self {
        let mut heap = Heap::new();
        // The root scope has nothing to capture, so the main closure's
        // upvalue vector is empty.
        let main_closure = heap.alloc_closure(ClosureObj {
            prototype: Rc::new(main),
            upvalues: Vec::new(),
        });

        Self {
            frames: vec![StackFrame::new(main_closure)],
            heap,
            funcs: funcs.into_iter().map(Rc::new).collect(),
            ip: 0,
            open_upvalues: Vec::new(),
            out,
        }
    }

    /// Run until `Halt` or the first fatal error.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let proto = self.current_prototype()?;
            let (inst, next_ip) = Instruction::decode_at(&proto.bytecode, self.ip)?;
            self.ip = next_ip;

            match inst {
                Instruction::Nop => {}
                Instruction::Halt => return Ok(()),

                Instruction::BoolConst { value, dest } => {
                    self.write_reg(dest, Value::Bool(value != 0))?;
                }
                Instruction::IntConst { value, dest } => {
                    self.write_reg(dest, Value::Int(value))?;
                }
                Instruction::DecConst { value, dest } => {
                    self.write_reg(dest, Value::Dec(value))?;
                }
                Instruction::StrConst { index, dest } => {
                    let constant = proto
                        .constants
                        .get(index as usize)
                        .ok_or(RuntimeError::BadConstantIndex(index))?;
                    let value = Value::Str(Rc::from(constant.as_str()));
                    self.write_reg(dest, value)?;
                }
                Instruction::FuncConst { index, dest } => {
                    let handle = self.instantiate_closure(index)?;
                    self.write_reg(dest, Value::Closure(handle))?;
                }

                Instruction::Move { source, dest } => {
                    // Raw copy: an unset source stays unset, matching the
                    // r0 plumbing around calls.
                    let value = self.read_raw(source)?;
                    self.write_raw(dest, value)?;
                }

                Instruction::LoadUpVal { index, dest } => {
                    let value = self.load_upvalue(index)?;
                    self.write_reg(dest, value)?;
                }
                Instruction::SetUpVal { source, index } => {
                    let value = self.read_reg(source)?;
                    self.store_upvalue(index, value)?;
                }

                Instruction::BrAlways { addr } => {
                    self.ip = addr as usize;
                }
                Instruction::BrTrue { test, addr } => {
                    if self.read_bool(test)? {
                        self.ip = addr as usize;
                    }
                }
                Instruction::BrFalse { test, addr } => {
                    if !self.read_bool(test)? {
                        self.ip = addr as usize;
                    }
                }

                Instruction::Dispatch { source, first_arg } => {
                    self.dispatch(source, first_arg)?;
                }
                Instruction::Return { source } => {
                    self.do_return(source)?;
                }

                Instruction::IntBinary { kind, left, right, dest } => {
                    let left = self.read_int(left)?;
                    let right = self.read_int(right)?;
                    let result = match kind {
                        BinaryKind::LT => Value::Bool(left < right),
                        BinaryKind::LTEq => Value::Bool(left <= right),
                        BinaryKind::GT => Value::Bool(left > right),
                        BinaryKind::GTEq => Value::Bool(left >= right),
                        BinaryKind::Eq => Value::Bool(left == right),
                        BinaryKind::Add => Value::Int(left.wrapping_add(right)),
                        BinaryKind::Sub => Value::Int(left.wrapping_sub(right)),
                        BinaryKind::Mul => Value::Int(left.wrapping_mul(right)),
                        // Integer division yields a decimal.
                        BinaryKind::Div => Value::Dec(left as f32 / right as f32),
                    };
                    self.write_reg(dest, result)?;
                }
                Instruction::IntNeg { operand, dest } => {
                    let value = self.read_int(operand)?;
                    self.write_reg(dest, Value::Int(value.wrapping_neg()))?;
                }

                Instruction::DecBinary { kind, left, right, dest } => {
                    let left = self.read_dec(left)?;
                    let right = self.read_dec(right)?;
                    let result = match kind {
                        BinaryKind::LT => Value::Bool(left < right),
                        BinaryKind::LTEq => Value::Bool(left <= right),
                        BinaryKind::GT => Value::Bool(left > right),
                        BinaryKind::GTEq => Value::Bool(left >= right),
                        BinaryKind::Eq => Value::Bool(left == right),
                        BinaryKind::Add => Value::Dec(left + right),
                        BinaryKind::Sub => Value::Dec(left - right),
                        BinaryKind::Mul => Value::Dec(left * right),
                        BinaryKind::Div => Value::Dec(left / right),
                    };
                    self.write_reg(dest, result)?;
                }
                Instruction::DecNeg { operand, dest } => {
                    let value = self.read_dec(operand)?;
                    self.write_reg(dest, Value::Dec(-value))?;
                }

                Instruction::Print { source } => {
                    let value = self.read_reg(source)?;
                    writeln!(self.out, "{}", value)
                        .map_err(|e| RuntimeError::Io(e.to_string()))?;
                }
            }
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn dispatch(&mut self, source: u32, first_arg: u32) -> Result<(), RuntimeError> {
        let closure_handle = self.read_closure(source)?;
        let callee_proto = self
            .heap
            .get_closure(closure_handle)
            .ok_or(RuntimeError::BadClosureHandle(closure_handle))?
            .prototype
            .clone();

        // The callee's locals list doubles as its argument count: the
        // caller laid the arguments out contiguously from `first_arg`.
        let arg_count = callee_proto.locals.len();
        if 1 + arg_count > REGISTER_COUNT {
            return Err(RuntimeError::RegisterOutOfRange {
                register: arg_count as u32,
            });
        }

        let mut callee_frame = StackFrame::new(closure_handle);
        let caller_idx = self.frames.len() - 1;
        for i in 0..arg_count {
            let src = first_arg as usize + i;
            if src >= REGISTER_COUNT {
                return Err(RuntimeError::RegisterOutOfRange { register: src as u32 });
            }
            callee_frame.registers[1 + i] = self.frames[caller_idx].registers[src].clone();
        }

        // `ip` already points at the instruction after this Dispatch;
        // that is where the caller resumes.
        self.frames[caller_idx].return_to_address = self.ip;
        self.frames.push(callee_frame);
        self.ip = 0;
        Ok(())
    }

    fn do_return(&mut self, source: u32) -> Result<(), RuntimeError> {
        if self.frames.len() < 2 {
            return Err(RuntimeError::CallStackUnderflow);
        }

        let top_idx = self.frames.len() - 1;
        if source > 0 {
            let idx = self.register_index(source)?;
            let value = self.frames[top_idx].registers[idx].clone();
            self.frames[top_idx].registers[0] = value;
        }

        // The frame is about to die: preserve every captured register by
        // copying its contents into the capturing cells.
        self.close_upvalues(top_idx);

        let top = self.frames.pop().expect("checked above");
        let lower = self.frames.last_mut().expect("checked above");
        lower.registers[0] = top.registers[0].clone();
        self.ip = lower.return_to_address;
        Ok(())
    }

    // ========================================================================
    // Closures and upvalues
    // ========================================================================

    /// Build a closure over nested prototype `index`, resolving each
    /// upvalue record against the current frame (the enclosing frame at
    /// the moment `FuncConst` executes).
    fn instantiate_closure(&mut self, index: u32) -> Result<u32, RuntimeError> {
        let proto = self
            .funcs
            .get(index as usize)
            .cloned()
            .ok_or(RuntimeError::BadPrototypeIndex(index))?;

        let frame_idx = self.frames.len() - 1;
        let enclosing_closure = self.frames[frame_idx].closure;

        let mut captured = Vec::with_capacity(proto.upvalues.len());
        for record in &proto.upvalues {
            if record.local_to_parent {
                // The captured variable is a local of the enclosing
                // frame; its register is 1 + lookup_index.
                let register = 1 + record.lookup_index;
                captured.push(self.capture_upvalue(frame_idx, register));
            } else {
                // The enclosing closure already carries a cell for this
                // variable; share it.
                let parent = self
                    .heap
                    .get_closure(enclosing_closure)
                    .ok_or(RuntimeError::BadClosureHandle(enclosing_closure))?;
                let handle = *parent
                    .upvalues
                    .get(record.lookup_index)
                    .ok_or(RuntimeError::BadUpvalueIndex(record.lookup_index as i32))?;
                captured.push(handle);
            }
        }

        Ok(self.heap.alloc_closure(ClosureObj {
            prototype: proto,
            upvalues: captured,
        }))
    }

    /// Find or create the open cell aliasing `registers[register]` of
    /// frame `frame_idx`. Sibling closures capturing the same parent
    /// local must share one cell, so capture is deduplicated.
    fn capture_upvalue(&mut self, frame_idx: usize, register: usize) -> u32 {
        for &handle in &self.open_upvalues {
            if let Some(cell) = self.heap.get_upvalue(handle) {
                if let UpvalueLocation::Open { frame, register: r } = cell.location {
                    if frame == frame_idx && r == register {
                        return handle;
                    }
                }
            }
        }

        let handle = self.heap.alloc_upvalue(UpvalueCell {
            location: UpvalueLocation::Open {
                frame: frame_idx,
                register,
            },
        });
        self.open_upvalues.push(handle);
        handle
    }

    /// Close every open cell pointing into frame `frame_idx`. Must run
    /// while the frame is still on the stack.
    fn close_upvalues(&mut self, frame_idx: usize) {
        let handles = std::mem::take(&mut self.open_upvalues);
        for handle in handles {
            let location = match self.heap.get_upvalue(handle) {
                Some(cell) => cell.location.clone(),
                None => continue,
            };
            match location {
                UpvalueLocation::Open { frame, register } if frame == frame_idx => {
                    let value = self.frames[frame].registers[register].clone();
                    if let Some(cell) = self.heap.get_upvalue_mut(handle) {
                        cell.location = UpvalueLocation::Closed(value);
                    }
                }
                _ => self.open_upvalues.push(handle),
            }
        }
    }

    fn upvalue_handle(&self, index: i32) -> Result<u32, RuntimeError> {
        if index < 0 {
            return Err(RuntimeError::BadUpvalueIndex(index));
        }
        let frame = self.frames.last().expect("frame stack is never empty");
        let closure = self
            .heap
            .get_closure(frame.closure)
            .ok_or(RuntimeError::BadClosureHandle(frame.closure))?;
        closure
            .upvalues
            .get(index as usize)
            .copied()
            .ok_or(RuntimeError::BadUpvalueIndex(index))
    }

    fn load_upvalue(&self, index: i32) -> Result<Value, RuntimeError> {
        let handle = self.upvalue_handle(index)?;
        let cell = self
            .heap
            .get_upvalue(handle)
            .ok_or(RuntimeError::BadUpvalueHandle(handle))?;
        match &cell.location {
            UpvalueLocation::Open { frame, register } => self.frames[*frame].registers[*register]
                .clone()
                .ok_or(RuntimeError::UnsetRegister {
                    register: *register as u32,
                }),
            UpvalueLocation::Closed(value) => {
                value.clone().ok_or(RuntimeError::UnsetRegister { register: 0 })
            }
        }
    }

    /// Write through the cell; every closure sharing it observes the new
    /// value immediately.
    fn store_upvalue(&mut self, index: i32, value: Value) -> Result<(), RuntimeError> {
        let handle = self.upvalue_handle(index)?;
        let location = self
            .heap
            .get_upvalue(handle)
            .ok_or(RuntimeError::BadUpvalueHandle(handle))?
            .location
            .clone();
        match location {
            UpvalueLocation::Open { frame, register } => {
                self.frames[frame].registers[register] = Some(value);
            }
            UpvalueLocation::Closed(_) => {
                let cell = self
                    .heap
                    .get_upvalue_mut(handle)
                    .ok_or(RuntimeError::BadUpvalueHandle(handle))?;
                cell.location = UpvalueLocation::Closed(Some(value));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Register access
    // ========================================================================

    fn current_prototype(&self) -> Result<Rc<FuncPrototype>, RuntimeError> {
        let frame = self.frames.last().expect("frame stack is never empty");
        Ok(self
            .heap
            .get_closure(frame.closure)
            .ok_or(RuntimeError::BadClosureHandle(frame.closure))?
            .prototype
            .clone())
    }

    fn register_index(&self, register: u32) -> Result<usize, RuntimeError> {
        if (register as usize) < REGISTER_COUNT {
            Ok(register as usize)
        } else {
            Err(RuntimeError::RegisterOutOfRange { register })
        }
    }

    fn read_raw(&self, register: u32) -> Result<Option<Value>, RuntimeError> {
        let idx = self.register_index(register)?;
        let frame = self.frames.last().expect("frame stack is never empty");
        Ok(frame.registers[idx].clone())
    }

    fn write_raw(&mut self, register: u32, value: Option<Value>) -> Result<(), RuntimeError> {
        let idx = self.register_index(register)?;
        let frame = self.frames.last_mut().expect("frame stack is never empty");
        frame.registers[idx] = value;
        Ok(())
    }

    fn read_reg(&self, register: u32) -> Result<Value, RuntimeError> {
        self.read_raw(register)?
            .ok_or(RuntimeError::UnsetRegister { register })
    }

    fn write_reg(&mut self, register: u32, value: Value) -> Result<(), RuntimeError> {
        self.write_raw(register, Some(value))
    }

    fn read_int(&self, register: u32) -> Result<i32, RuntimeError> {
        let value = self.read_reg(register)?;
        value.as_int().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "Int",
            found: value.kind_name().to_string(),
        })
    }

    fn read_dec(&self, register: u32) -> Result<f32, RuntimeError> {
        let value = self.read_reg(register)?;
        value.as_dec().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "Dec",
            found: value.kind_name().to_string(),
        })
    }

    fn read_bool(&self, register: u32) -> Result<bool, RuntimeError> {
        let value = self.read_reg(register)?;
        value.as_bool().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "Bool",
            found: value.kind_name().to_string(),
        })
    }

    fn read_closure(&self, register: u32) -> Result<u32, RuntimeError> {
        let value = self.read_reg(register)?;
        value.as_closure().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "Fn",
            found: value.kind_name().to_string(),
        })
    }
}
