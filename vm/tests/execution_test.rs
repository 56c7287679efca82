mod support;

use support::{run, run_lines};

// ============================================================================
// Arithmetic and literals
// ============================================================================

#[test]
fn adds_integers() {
    assert_eq!(run_lines("print 1 + 2;"), ["3"]);
}

#[test]
fn integer_division_prints_a_decimal() {
    assert_eq!(run_lines("print 5 / 2;"), ["2.5"]);
}

#[test]
fn exact_integer_division_still_promotes() {
    // 6 / 3 is a decimal 2, printed in shortest form.
    assert_eq!(run_lines("print 6 / 3;"), ["2"]);
}

#[test]
fn decimal_arithmetic() {
    assert_eq!(run_lines("print 1.5 + 2.25;"), ["3.75"]);
    assert_eq!(run_lines("print 2.0 * 3.5;"), ["7"]);
    assert_eq!(run_lines("print 1.0 / 4.0;"), ["0.25"]);
}

#[test]
fn promoted_quotient_feeds_decimal_operators() {
    // 5 / 2 has static kind Dec, so + selects the decimal block.
    assert_eq!(run_lines("print 5 / 2 + 0.5;"), ["3"]);
}

#[test]
fn unary_negation() {
    assert_eq!(
        run_lines("print -(3 + 4); print -2.5; print - -1;"),
        ["-7", "-2.5", "1"]
    );
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(run_lines("print 1 / 0;"), ["inf"]);
    assert_eq!(run_lines("print -1.0 / 0.0;"), ["-inf"]);
}

#[test]
fn comparisons_print_booleans() {
    assert_eq!(
        run_lines("print 1 < 2; print 2.5 >= 9.0; print 3 == 3; print true;"),
        ["true", "false", "true", "true"]
    );
}

#[test]
fn operator_precedence_is_respected() {
    assert_eq!(run_lines("print 1 + 2 * 3; print (1 + 2) * 3;"), ["7", "9"]);
}

#[test]
fn strings_print_verbatim() {
    assert_eq!(run_lines("print \"hello world\";"), ["hello world"]);
    assert_eq!(run("print \"a\\tb\";"), "a\tb\n");
}

// ============================================================================
// Variables and control flow
// ============================================================================

#[test]
fn variables_hold_their_values() {
    assert_eq!(
        run_lines("let x := 4; let y := x; x := 9; print x; print y;"),
        ["9", "4"]
    );
}

#[test]
fn if_elif_else_selects_the_matching_clause() {
    let source = "\
        let x := 2;\n\
        if x == 1: print 10;\n\
        elif x == 2: print 20;\n\
        else: print 30; end";
    assert_eq!(run_lines(source), ["20"]);
}

#[test]
fn if_without_match_falls_through() {
    assert_eq!(
        run_lines("let x := 5; if x == 1: print 10; end print 99;"),
        ["99"]
    );
}

#[test]
fn else_clause_catches_everything() {
    let source = "\
        let x := 7;\n\
        if x == 1: print 10;\n\
        elif x == 2: print 20;\n\
        else: print 30; end";
    assert_eq!(run_lines(source), ["30"]);
}

#[test]
fn elif_chain_tests_in_order() {
    let source = "\
        let classify := fn(n: Int): Int {\n\
          if n < 0: return -1;\n\
          elif n == 0: return 0;\n\
          elif n < 10: return 1;\n\
          else: return 2; end\n\
        };\n\
        print classify(-5);\n\
        print classify(0);\n\
        print classify(7);\n\
        print classify(99);";
    assert_eq!(run_lines(source), ["-1", "0", "1", "2"]);
}

#[test]
fn while_loops_accumulate() {
    let source = "\
        let i := 0;\n\
        let sum := 0;\n\
        while i < 5:\n\
          sum := sum + i;\n\
          i := i + 1;\n\
        end\n\
        print sum;";
    assert_eq!(run_lines(source), ["10"]);
}

#[test]
fn while_with_false_condition_never_runs() {
    assert_eq!(run_lines("while false: print 1; end print 2;"), ["2"]);
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn calls_a_square_function() {
    assert_eq!(
        run_lines("let f := fn(x: Int): Int { return x * x; }; print f(7);"),
        ["49"]
    );
}

#[test]
fn recursion_computes_factorial() {
    let source = "\
        let fact := fn(n: Int): Int {\n\
          if n <= 1: return 1; end\n\
          return n * fact(n - 1);\n\
        };\n\
        print fact(5);\n\
        print fact(10);";
    assert_eq!(run_lines(source), ["120", "3628800"]);
}

#[test]
fn multiple_arguments_arrive_in_order() {
    let source = "\
        let sub := fn(a: Int, b: Int): Int { return a - b; };\n\
        let x := 10;\n\
        let y := 4;\n\
        print sub(x, y);\n\
        print sub(y, x);";
    assert_eq!(run_lines(source), ["6", "-6"]);
}

#[test]
fn call_results_compose_in_expressions() {
    let source = "\
        let f := fn(x: Int): Int { return x * x; };\n\
        print f(3) + f(4);";
    assert_eq!(run_lines(source), ["25"]);
}

#[test]
fn functions_are_first_class_arguments() {
    let source = "\
        let twice := fn(f: (Int) => Int, x: Int): Int { return f(f(x)); };\n\
        let sq := fn(x: Int): Int { return x * x; };\n\
        print twice(sq, 3);";
    assert_eq!(run_lines(source), ["81"]);
}

#[test]
fn zero_parameter_zero_local_function_returns() {
    assert_eq!(
        run_lines("let f := fn(): Int { return 42; }; print f();"),
        ["42"]
    );
}

#[test]
fn nested_calls_keep_caller_registers_intact() {
    // The inner dispatch overwrites r0; the outer expression's partial
    // results must survive on the register stack.
    let source = "\
        let id := fn(x: Int): Int { return x; };\n\
        print 100 + id(23);";
    assert_eq!(run_lines(source), ["123"]);
}

#[test]
fn deep_recursion_unwinds_cleanly() {
    let source = "\
        let count := fn(n: Int): Int {\n\
          if n == 0: return 0; end\n\
          return 1 + count(n - 1);\n\
        };\n\
        print count(200);";
    assert_eq!(run_lines(source), ["200"]);
}
