use twill_parser::typed::{TypedExprKind, TypedProgram, TypedStmt};
use twill_parser::{check, parse_program, Type};

fn analyze(source: &str) -> TypedProgram {
    let prog = parse_program(source).expect("parse failed");
    check(&prog).expect("type check failed")
}

fn analyze_err(source: &str) -> Vec<twill_parser::TypeError> {
    let prog = parse_program(source).expect("parse failed");
    check(&prog).expect_err("type check unexpectedly succeeded")
}

/// Digs the function literal out of `let <name> := fn...;`.
fn func_of<'a>(
    program: &'a TypedProgram,
    stmt_index: usize,
) -> &'a twill_parser::typed::TypedFunc {
    let TypedStmt::Let { value, .. } = &program.stmts[stmt_index] else {
        panic!("expected let statement");
    };
    let TypedExprKind::Func(f) = &value.kind else {
        panic!("expected function literal");
    };
    f
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn root_locals_follow_declaration_order() {
    let prog = analyze("let a := 1; let b := 2.0; let c := true;");
    let names: Vec<_> = prog.locals.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    for (i, local) in prog.locals.iter().enumerate() {
        assert_eq!(local.lookup_index, i);
        assert!(!local.is_parameter);
    }
    assert!(prog.upvalues.is_empty());
}

#[test]
fn parameters_come_first_and_are_flagged() {
    let prog = analyze(
        "let f := fn(x: Int, y: Int): Int {\
           let z := x + y;\
           return z;\
         };",
    );
    let f = func_of(&prog, 0);
    let names: Vec<_> = f.locals.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["x", "y", "z"]);
    assert!(f.locals[0].is_parameter);
    assert!(f.locals[1].is_parameter);
    assert!(!f.locals[2].is_parameter);
}

#[test]
fn capture_of_parent_local_is_local_to_parent() {
    let prog = analyze(
        "let mk := fn(): Int {\
           let n := 0;\
           let inc := fn(): Int { n := n + 1; return n; };\
           return inc();\
         };",
    );
    let mk = func_of(&prog, 0);
    let TypedStmt::Let { value, .. } = &mk.body[1] else {
        panic!("expected inner let");
    };
    let TypedExprKind::Func(inc) = &value.kind else {
        panic!("expected inner fn");
    };

    assert_eq!(inc.upvalues.len(), 1);
    let up = &inc.upvalues[0];
    assert_eq!(up.name, "n");
    assert!(up.local_to_parent);
    // `n` is mk's first local.
    assert_eq!(up.lookup_index, 0);
    // Repeated uses of `n` register once.
    assert_eq!(inc.upvalues.len(), 1);
}

#[test]
fn transitive_capture_threads_through_middle_scope() {
    let prog = analyze(
        "let outer := fn(): Int {\
           let x := 7;\
           let middle := fn(): Int {\
             let inner := fn(): Int { return x; };\
             return inner();\
           };\
           return middle();\
         };",
    );
    let outer = func_of(&prog, 0);
    let TypedStmt::Let { value, .. } = &outer.body[1] else {
        panic!("expected middle let");
    };
    let TypedExprKind::Func(middle) = &value.kind else {
        panic!("expected middle fn");
    };
    let TypedStmt::Let { value, .. } = &middle.body[0] else {
        panic!("expected inner let");
    };
    let TypedExprKind::Func(inner) = &value.kind else {
        panic!("expected inner fn");
    };

    // The middle function never mentions `x` itself but still carries the
    // record the inner capture resolves through.
    assert_eq!(middle.upvalues.len(), 1);
    assert!(middle.upvalues[0].local_to_parent);
    assert_eq!(middle.upvalues[0].lookup_index, 0);

    assert_eq!(inner.upvalues.len(), 1);
    assert!(!inner.upvalues[0].local_to_parent);
    assert_eq!(inner.upvalues[0].lookup_index, 0);
}

#[test]
fn recursion_captures_the_function_itself() {
    let prog = analyze(
        "let fact := fn(n: Int): Int {\
           if n <= 1: return 1; end \
           return n * fact(n - 1);\
         };",
    );
    let fact = func_of(&prog, 0);
    assert_eq!(fact.upvalues.len(), 1);
    assert_eq!(fact.upvalues[0].name, "fact");
    assert!(fact.upvalues[0].local_to_parent);
    assert_eq!(fact.upvalues[0].lookup_index, 0);
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn integer_division_promotes_to_dec() {
    let prog = analyze("let q := 5 / 2;");
    let TypedStmt::Let { value, .. } = &prog.stmts[0] else {
        panic!("expected let");
    };
    assert_eq!(value.ty, Type::Dec);
}

#[test]
fn comparisons_yield_bool() {
    let prog = analyze("let b := 1 < 2; let c := 1.5 == 2.5;");
    for stmt in &prog.stmts {
        let TypedStmt::Let { value, .. } = stmt else {
            panic!("expected let");
        };
        assert_eq!(value.ty, Type::Bool);
    }
}

#[test]
fn rejects_mixed_operand_kinds() {
    let errs = analyze_err("let x := 1 + 2.0;");
    assert!(errs[0].message.contains("incompatible operand types"));
}

#[test]
fn rejects_non_bool_condition() {
    let errs = analyze_err("if 1: print 1; end");
    assert!(errs[0].message.contains("must have type `Bool`"));
}

#[test]
fn rejects_redeclaration() {
    let errs = analyze_err("let x := 1; let x := 2;");
    assert!(errs[0].message.contains("already been declared"));
}

#[test]
fn rejects_assignment_type_change() {
    let errs = analyze_err("let x := 1; x := 2.0;");
    assert!(errs[0].message.contains("cannot be assigned"));
}

#[test]
fn rejects_undeclared_assignment_and_use() {
    let errs = analyze_err("y := 1; print z;");
    assert_eq!(errs.len(), 2);
    assert!(errs[0].message.contains("before it has been declared"));
    assert!(errs[1].message.contains("undeclared"));
}

#[test]
fn rejects_top_level_return() {
    let errs = analyze_err("return 1;");
    assert!(errs[0].message.contains("outside of a function"));
}

#[test]
fn rejects_return_type_mismatch() {
    let errs = analyze_err("let f := fn(): Int { return 1.0; };");
    assert!(errs[0].message.contains("declared to return"));
}

#[test]
fn rejects_arity_and_argument_type_mismatches() {
    let errs = analyze_err(
        "let f := fn(x: Int): Int { return x; };\
         let a := f();\
         let b := f(1.0);",
    );
    assert!(errs.iter().any(|e| e.message.contains("argument(s) passed")));
    assert!(errs.iter().any(|e| e.message.contains("argument 1 has type")));
}

#[test]
fn rejects_calling_non_function() {
    let errs = analyze_err("let x := 1; x();");
    assert!(errs[0].message.contains("cannot call a value of type `Int`"));
}

#[test]
fn rejects_unknown_annotation() {
    let errs = analyze_err("let f := fn(x: Complex): Int { return 1; };");
    assert!(errs[0].message.contains("unknown type `Complex`"));
}

#[test]
fn function_annotations_carry_through_call_types() {
    let prog = analyze(
        "let twice := fn(f: (Int) => Int, x: Int): Int { return f(f(x)); };\
         let sq := fn(x: Int): Int { return x * x; };\
         let r := twice(sq, 3);",
    );
    let TypedStmt::Let { value, .. } = &prog.stmts[2] else {
        panic!("expected let");
    };
    assert_eq!(value.ty, Type::Int);
}

#[test]
fn strings_type_check_for_print() {
    let prog = analyze("let s := \"hi\"; print s;");
    let TypedStmt::Let { value, .. } = &prog.stmts[0] else {
        panic!("expected let");
    };
    assert_eq!(value.ty, Type::Str);
}

#[test]
fn shadowing_parent_scope_is_allowed() {
    let prog = analyze(
        "let x := 1;\
         let f := fn(): Int { let x := 2; return x; };",
    );
    let f = func_of(&prog, 1);
    // The inner `x` is a fresh local, not a capture.
    assert!(f.upvalues.is_empty());
    assert_eq!(f.locals[0].name, "x");
}
