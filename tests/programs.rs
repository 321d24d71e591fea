use kl::{Error, Interpreter, RuntimeError, run_source};

fn output_of(source: &str) -> String {
    let mut interp = Interpreter::new(Vec::new());
    if let Err(e) = run_source(&mut interp, source) {
        panic!("Program failed:\n{}\nError: {}", source, e);
    }
    String::from_utf8_lossy(&interp.into_output()).to_string()
}

fn error_of(source: &str) -> Error {
    let mut interp = Interpreter::new(Vec::new());
    match run_source(&mut interp, source) {
        Ok(()) => panic!("Program was expected to fail:\n{}", source),
        Err(e) => e,
    }
}

fn runtime_error_of(source: &str) -> RuntimeError {
    match error_of(source) {
        Error::Runtime(e) => e,
        other => panic!("Expected a runtime error, got {:?}", other),
    }
}

#[test]
fn print_uses_plus_as_separator() {
    assert_eq!(output_of("num x = 2; num y = 3; print(x + y);"), "23\n");
}

#[test]
fn while_loop_counts() {
    assert_eq!(
        output_of("num n = 0; while (n < 3) { n++; print(n); }"),
        "1\n2\n3\n"
    );
}

#[test]
fn if_prints_when_true() {
    assert_eq!(
        output_of("num a = 10; if (a > 5) { print(\"big\"); }"),
        "big\n"
    );
}

#[test]
fn inferred_number_prints_shortest_form() {
    assert_eq!(output_of("var f = 2.5; print(f);"), "2.5\n");
    assert_eq!(output_of("var t = 0.1 + 0.2; print(t);"), "0.30000000000000004\n");
}

#[test]
fn postfix_increments_in_place() {
    assert_eq!(output_of("num x = 1; x++; x++; print(x);"), "3\n");
}

#[test]
fn string_items_are_concatenated() {
    assert_eq!(output_of("str s = \"hi\"; print(s + s);"), "hihi\n");
}

#[test]
fn print_items_keep_their_order() {
    assert_eq!(
        output_of("str a = \"<\"; num b = 7; str c = \">\"; print(a + b + c); print(c + b + a);"),
        "<7>\n>7<\n"
    );
}

#[test]
fn block_locals_do_not_leak() {
    let mut interp = Interpreter::new(Vec::new());
    run_source(&mut interp, "if (1) { num t = 7; }").unwrap();
    assert!(!interp.root().contains("t"));
    // An unbound name reads as zero afterwards
    run_source(&mut interp, "print(t);").unwrap();
    assert_eq!(interp.output().as_slice(), b"0\n");
}

#[test]
fn return_skips_the_rest_of_the_body() {
    let source = r#"
        num calls = 0;
        func num early(num x) {
            calls = calls + 1;
            return x * 2;
            calls = calls + 100;
            print("never");
        }
        print(early(4));
        print(calls);
    "#;
    assert_eq!(output_of(source), "8\n1\n");
}

#[test]
fn arity_is_checked() {
    let source = "func num add(num a, num b) { return a + b; } print(add(1));";
    assert!(matches!(
        runtime_error_of(source),
        RuntimeError::ArityMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

#[test]
fn numeric_identities_hold() {
    let source = r#"
        import math;
        func num check(num x) {
            num ok = x - x == 0;
            ok = ok & (x * 1 == x);
            ok = ok & ((x % 1 == 0) == is_integer(x));
            return ok;
        }
        print(check(3) + check(-2.75) + check(0.1) + check(1e300) + check(-17));
    "#;
    assert_eq!(output_of(source), "11111\n");
}

#[test]
fn elif_and_else_branches() {
    let source = r#"
        func str classify(num n) {
            str label = "none";
            if (n < 0) { return "negative"; }
            elif (n == 0) { return "zero"; }
            else { return "positive"; }
            return label;
        }
        print(classify(-3) + " " + classify(0) + " " + classify(9));
    "#;
    assert_eq!(output_of(source), "negative zero positive\n");
}

#[test]
fn recursion_fact_and_fib() {
    let source = r#"
        func num fact(num n) {
            if (n <= 1) { return 1; }
            return n * fact(n - 1);
        }
        func num fib(num n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        print(fact(6));
        print(fib(15));
    "#;
    assert_eq!(output_of(source), "720\n610\n");
}

#[test]
fn function_bodies_see_two_scopes() {
    // Nested bodies replace the function frame, leaving only the globals
    let source = r#"
        num g = 1;
        num loops = 1;
        func num probe(num local) {
            num inner = local + g;
            while (loops > 0) {
                print(local + ":" + g + ":" + inner);
                loops--;
            }
            return inner;
        }
        print(probe(5));
    "#;
    assert_eq!(output_of(source), "0:1:0\n6\n");
}

#[test]
fn parameters_shadow_globals() {
    let source = r#"
        num x = 100;
        func num bump(num x) { x++; return x; }
        print(bump(1) + " " + x);
    "#;
    assert_eq!(output_of(source), "2 100\n");
}

#[test]
fn builtins_after_import() {
    let source = r#"
        import math;
        import text;
        print(gcd(12, 18) + " " + lcm(4, 6) + " " + factorial(0));
        print(is_prime(97) + is_even(3) + is_odd(3) + is_palindrome(12321));
        print(upper("kl") + lower("KL") + reverse("abc") + len("four"));
        print(join("-", "a", "b", "c") + " " + concat("x", "y") + " " + repeat("ab", 3));
        print(floor(2.7) + " " + ceil(2.1) + " " + abs(0 - 3) + " " + pow(2, 10));
    "#;
    assert_eq!(
        output_of(source),
        "6 12 1\n1011\nKLklcba4\na-b-c xy ababab\n2 3 3 1024\n"
    );
}

#[test]
fn module_constants_are_readable_and_fixed() {
    assert_eq!(
        output_of("import math; print(PI == 3.141592653589793);"),
        "1\n"
    );
    assert!(matches!(
        runtime_error_of("import math; TAU = 6;"),
        RuntimeError::ReadOnlyConstant { .. }
    ));
    // Before the import the name is simply unknown
    assert_eq!(output_of("print(E);"), "0\n");
}

#[test]
fn assignment_needs_a_binding() {
    assert!(matches!(
        runtime_error_of("count = 1;"),
        RuntimeError::Env(kl::environment::EnvError::UndefinedVariable(..))
    ));
}

#[test]
fn failures_are_reported_by_layer() {
    assert!(matches!(error_of("num x = 1 $ 2;"), Error::Lex(_)));
    assert!(matches!(error_of("str s = \"open;"), Error::Lex(_)));
    assert!(matches!(error_of("num x = ;"), Error::Parse(_)));
    assert!(matches!(error_of("5++;"), Error::Parse(_)));
    assert!(matches!(
        runtime_error_of("print(nothing(1));"),
        RuntimeError::UndefinedFunction { .. }
    ));
    assert!(matches!(
        runtime_error_of("num x = 3 / (2 - 2);"),
        RuntimeError::DivisionByZero { .. }
    ));
    assert!(matches!(
        runtime_error_of("import text; print(len(42));"),
        RuntimeError::BadBuiltinSignature { .. }
    ));
    assert!(matches!(
        runtime_error_of("import text; print(len(repeat(\"ab\", 9223372036854775807)));"),
        RuntimeError::Domain { .. }
    ));
    assert!(matches!(
        runtime_error_of("import math; assert(1 == 2);"),
        RuntimeError::Domain { .. }
    ));
    assert!(matches!(
        runtime_error_of("import physics;"),
        RuntimeError::UnknownModule { .. }
    ));
    assert!(matches!(
        runtime_error_of("return 5;"),
        RuntimeError::ReturnOutsideFunction { .. }
    ));
}

#[test]
fn error_messages_carry_the_layer_prefix() {
    assert_eq!(
        error_of("print(undefined_fn());").to_string(),
        "RuntimeError: undefined function 'undefined_fn'"
    );
    assert!(error_of("num = 1;").to_string().starts_with("ParseError: "));
    assert!(error_of("num x = #;").to_string().starts_with("LexError: "));
}

#[test]
fn output_before_a_failure_is_kept() {
    let mut interp = Interpreter::new(Vec::new());
    let result = run_source(&mut interp, "print(1); num x = 1 / 0; print(2);");
    assert!(result.is_err());
    assert_eq!(interp.output().as_slice(), b"1\n");
}

#[test]
fn parse_errors_run_nothing() {
    let mut interp = Interpreter::new(Vec::new());
    assert!(run_source(&mut interp, "print(1); print(2").is_err());
    assert!(interp.output().is_empty());
}

#[test]
fn interpreter_state_persists_between_runs() {
    let mut interp = Interpreter::new(Vec::new());
    run_source(&mut interp, "func num sq(num v) { return v * v; } num base = 4;").unwrap();
    run_source(&mut interp, "print(sq(base));").unwrap();
    assert_eq!(interp.output().as_slice(), b"16\n");
    assert_eq!(interp.dump_functions(), "func num sq(num v)\n");
}

#[test]
fn precedence_and_power() {
    let source = r#"
        print((1 + 2 * 3));
        print((2 ^ 3 ^ 2));
        print((0 - 2 ^ 2));
        print((7 % 4 * 2));
        print((1 + 1 == 2));
        print((6 & 3 | 8));
        print((5 xor 1));
    "#;
    assert_eq!(output_of(source), "7\n512\n-4\n6\n1\n10\n4\n");
}
