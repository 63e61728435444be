use rillc::frontend::parser::Parser;
use rillc::middle::resolve::NameAnalysis;
use rillc::middle::ty::{self, BasicKind};
use rillc::middle::type_check::{SemanticErrorKind, TypeAnalysis};
use rillc::SourceFile;

// ── Helpers ──────────────────────────────────────────────────────────────

/// Runs parse + name analysis + type analysis and returns the semantic
/// error kinds in the order they were reported.
fn check(source_text: &str) -> Vec<SemanticErrorKind> {
    let source = SourceFile::from_string(source_text);
    let program = Parser::parse_program(&source).expect("program should parse");
    let names = NameAnalysis::build(&program);
    assert!(names.passed(), "name analysis should pass for {source_text}");
    let types = TypeAnalysis::check(&program, &names);

    assert_eq!(
        types.passed(),
        types.errors.is_empty(),
        "passed() must agree with the error list"
    );

    types.errors.iter().map(|e| e.kind).collect()
}

fn assert_clean(source_text: &str) {
    let errors = check(source_text);
    assert!(errors.is_empty(), "expected no errors, got {errors:?}");
}

fn assert_errors(source_text: &str, expected: &[SemanticErrorKind]) {
    let errors = check(source_text);
    assert_eq!(errors, expected, "for source: {source_text}");
}

// ── Flyweight identity ───────────────────────────────────────────────────

#[test]
fn basic_types_are_interned() {
    assert_eq!(ty::basic(BasicKind::Int), ty::basic(BasicKind::Int));
    assert_eq!(ty::basic(BasicKind::Byte), ty::basic(BasicKind::Byte));
    assert_ne!(ty::basic(BasicKind::Int), ty::basic(BasicKind::Byte));
}

#[test]
fn array_types_are_interned_by_base_and_length() {
    assert_eq!(ty::array(BasicKind::Byte, 4), ty::array(BasicKind::Byte, 4));
    assert_ne!(ty::array(BasicKind::Byte, 4), ty::array(BasicKind::Byte, 5));
    assert_ne!(ty::array(BasicKind::Byte, 4), ty::array(BasicKind::Int, 4));
}

#[test]
fn function_types_are_interned_by_signature() {
    let a = ty::function(
        vec![ty::basic(BasicKind::Int)],
        ty::basic(BasicKind::Void),
    );
    let b = ty::function(
        vec![ty::basic(BasicKind::Int)],
        ty::basic(BasicKind::Void),
    );
    let c = ty::function(
        vec![ty::basic(BasicKind::Byte)],
        ty::basic(BasicKind::Void),
    );

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn type_sizes() {
    assert_eq!(ty::basic(BasicKind::Int).size(), 8);
    assert_eq!(ty::basic(BasicKind::Byte).size(), 1);
    assert_eq!(ty::basic(BasicKind::Bool).size(), 1);
    assert_eq!(ty::array(BasicKind::Int, 10).size(), 80);
    assert_eq!(ty::array(BasicKind::Byte, 10).size(), 10);
}

#[test]
fn void_is_not_a_variable_type() {
    assert!(!ty::basic(BasicKind::Void).valid_var_type());
    assert!(!ty::error().valid_var_type());
    assert!(ty::basic(BasicKind::Int).valid_var_type());
    assert!(ty::array(BasicKind::Bool, 3).valid_var_type());
}

// ── Well-typed programs ──────────────────────────────────────────────────

#[test]
fn clean_program_passes() {
    assert_clean(
        r#"
        g: int;
        add: int(a: int, b: int) {
            return a + b;
        }
        main: void() {
            x: int;
            x = add(g, 2000);
            write x;
        }
        "#,
    );
}

#[test]
fn byte_arithmetic_stays_byte() {
    assert_clean("main: void() { a: byte; a = 1 + 2; }");
}

#[test]
fn mixed_arithmetic_promotes() {
    assert_clean("main: void() { a: byte; b: int; b = a + 300; }");
}

#[test]
fn assignment_widens_byte_source() {
    assert_clean("main: void() { a: byte; b: int; b = a; }");
}

#[test]
fn array_assignment_with_equal_bases() {
    assert_clean("main: void() { a: byte array[4]; b: byte array[8]; a = b; }");
}

#[test]
fn chained_assignment() {
    assert_clean("main: void() { a: int; b: int; a = b = 1000; }");
}

#[test]
fn havoc_is_bool() {
    assert_clean("main: void() { b: bool; b = havoc; }");
}

#[test]
fn string_literal_assigns_to_byte_array() {
    assert_clean(r#"main: void() { s: byte array[16]; s = "hello"; }"#);
}

#[test]
fn equality_widens_byte_side() {
    assert_clean("main: void() { x: int; b: bool; b = x == 0; }");
}

#[test]
fn byte_argument_widens_to_int_formal() {
    assert_clean(
        r#"
        f: void(x: int) { }
        main: void() { b: byte; f(b); }
        "#,
    );
}

#[test]
fn byte_return_widens_in_int_function() {
    assert_clean("f: int() { return 1; }");
}

#[test]
fn recursion_is_well_typed() {
    assert_clean(
        r#"
        count: void(n: int) {
            if (n > 0) {
                count(n - 1);
            }
        }
        "#,
    );
}

// ── Semantic error detection ─────────────────────────────────────────────
// Each test drives one kind from the closed diagnostic set.

#[test]
fn arithmetic_on_bool() {
    assert_errors(
        "main: void() { b: bool; n: int; n = b + n; }",
        &[SemanticErrorKind::MathOperand],
    );
}

#[test]
fn negation_of_bool() {
    assert_errors(
        "main: void() { b: bool; n: int; n = -b; }",
        &[SemanticErrorKind::MathOperand],
    );
}

#[test]
fn post_increment_of_bool() {
    assert_errors(
        "main: void() { b: bool; b++; }",
        &[SemanticErrorKind::MathOperand],
    );
}

#[test]
fn logical_on_int() {
    assert_errors(
        "main: void() { b: bool; n: int; b = n && b; }",
        &[SemanticErrorKind::LogicOperand],
    );
}

#[test]
fn not_on_int() {
    assert_errors(
        "main: void() { b: bool; n: int; b = !n; }",
        &[SemanticErrorKind::LogicOperand],
    );
}

#[test]
fn relational_on_bool() {
    assert_errors(
        "main: void() { b: bool; c: bool; c = b < c; }",
        &[
            SemanticErrorKind::RelationalOperand,
            SemanticErrorKind::RelationalOperand,
        ],
    );
}

#[test]
fn equality_on_arrays() {
    assert_errors(
        "main: void() { a: int array[2]; b: int array[2]; c: bool; c = a == b; }",
        &[
            SemanticErrorKind::EqualityOperand,
            SemanticErrorKind::EqualityOperand,
        ],
    );
}

#[test]
fn equality_between_int_and_bool() {
    assert_errors(
        "main: void() { n: int; b: bool; c: bool; c = n == b; }",
        &[SemanticErrorKind::EqualityOperation],
    );
}

#[test]
fn assignment_of_function() {
    assert_errors(
        r#"
        f: void() { }
        main: void() { n: int; n = f; }
        "#,
        &[SemanticErrorKind::AssignOperand],
    );
}

#[test]
fn assignment_of_mismatched_arrays() {
    assert_errors(
        "main: void() { a: int array[2]; b: byte array[2]; a = b; }",
        &[SemanticErrorKind::AssignOperation],
    );
}

#[test]
fn assignment_int_into_byte_is_rejected() {
    assert_errors(
        "main: void() { a: byte; n: int; a = n; }",
        &[SemanticErrorKind::AssignOperation],
    );
}

#[test]
fn indexing_a_scalar() {
    assert_errors(
        "main: void() { n: int; m: int; m = n[0]; }",
        &[SemanticErrorKind::IndexBase],
    );
}

#[test]
fn indexing_with_a_bool() {
    assert_errors(
        "main: void() { a: int array[4]; b: bool; n: int; n = a[b]; }",
        &[SemanticErrorKind::IndexType],
    );
}

#[test]
fn calling_a_variable() {
    assert_errors(
        "main: void() { n: int; m: int; m = n(); }",
        &[SemanticErrorKind::Callee],
    );
}

#[test]
fn call_with_wrong_arity() {
    assert_errors(
        r#"
        f: int(a: int, b: int) { return a; }
        main: void() { n: int; n = f(1000); }
        "#,
        &[SemanticErrorKind::ArgCount],
    );
}

#[test]
fn call_with_mismatched_argument() {
    assert_errors(
        r#"
        f: int(a: int) { return a; }
        main: void() { n: int; b: bool; n = f(b); }
        "#,
        &[SemanticErrorKind::ArgMismatch],
    );
}

#[test]
fn return_without_value() {
    assert_errors(
        "f: int() { return; }",
        &[SemanticErrorKind::MissingReturnValue],
    );
}

#[test]
fn return_with_value_in_void_function() {
    assert_errors(
        "f: void() { return 1; }",
        &[SemanticErrorKind::ReturnValueInVoid],
    );
}

#[test]
fn return_of_wrong_type() {
    assert_errors(
        "f: int() { b: bool; return b; }",
        &[SemanticErrorKind::BadReturnValue],
    );
}

#[test]
fn if_condition_must_be_bool() {
    assert_errors(
        "main: void() { n: int; if (n) { } }",
        &[SemanticErrorKind::IfCondition],
    );
}

#[test]
fn while_condition_must_be_bool() {
    assert_errors(
        "main: void() { n: int; while (n) { } }",
        &[SemanticErrorKind::WhileCondition],
    );
}

#[test]
fn reading_a_function() {
    assert_errors(
        r#"
        f: void() { }
        main: void() { read f; }
        "#,
        &[SemanticErrorKind::ReadFunction],
    );
}

#[test]
fn reading_a_byte_scalar_is_illegal() {
    assert_errors(
        "main: void() { b: byte; read b; }",
        &[SemanticErrorKind::ReadOther],
    );
}

#[test]
fn reading_an_int_array_is_illegal() {
    assert_errors(
        "main: void() { a: int array[4]; read a; }",
        &[SemanticErrorKind::ReadOther],
    );
}

#[test]
fn reading_a_byte_array_is_fine() {
    assert_clean("main: void() { a: byte array[4]; read a; }");
}

#[test]
fn writing_a_function() {
    assert_errors(
        r#"
        f: void() { }
        main: void() { write f; }
        "#,
        &[SemanticErrorKind::WriteFunction],
    );
}

#[test]
fn writing_a_void_call() {
    assert_errors(
        r#"
        f: void() { }
        main: void() { write f(); }
        "#,
        &[SemanticErrorKind::WriteVoid],
    );
}

#[test]
fn writing_a_non_byte_array() {
    assert_errors(
        "main: void() { a: int array[4]; write a; }",
        &[SemanticErrorKind::WriteArray],
    );
}

// ── Poisoning and continuation ───────────────────────────────────────────

#[test]
fn poisoned_operand_does_not_cascade() {
    // `b + n` fails once on `b`; the enclosing condition check is silenced
    // by the poison type.
    assert_errors(
        "main: void() { b: bool; n: int; if (b + n) { } }",
        &[SemanticErrorKind::MathOperand],
    );
}

#[test]
fn analysis_continues_past_the_first_error() {
    // The first condition poisons quietly after one report; the second is
    // an independent mistake and still surfaces.
    assert_errors(
        "main: void() { b: bool; n: int; if (b + n) { } if (n) { } }",
        &[
            SemanticErrorKind::MathOperand,
            SemanticErrorKind::IfCondition,
        ],
    );
}

#[test]
fn error_positions_are_1_based() {
    let source = SourceFile::from_string("main: void() { b: bool; b = b + 1; }");
    let program = Parser::parse_program(&source).expect("program should parse");
    let names = NameAnalysis::build(&program);
    let types = TypeAnalysis::check(&program, &names);

    assert_eq!(types.errors.len(), 1);
    let pos = types.errors[0].pos;
    assert_eq!(pos.line, 1);
    // The offending operand is the `b` in `b + 1`
    assert_eq!(pos.col, 29);
}

// ── Literal typing and widening annotations ──────────────────────────────

#[test]
fn small_literal_is_byte_large_literal_is_int() {
    use rillc::frontend::ast::{DeclKind, ExpressionKind, StatementKind};

    let source = SourceFile::from_string("main: void() { a: byte; n: int; a = 255; n = 256; }");
    let program = Parser::parse_program(&source).expect("program should parse");
    let names = NameAnalysis::build(&program);
    let types = TypeAnalysis::check(&program, &names);
    assert!(types.passed());

    let DeclKind::Fn(function) = &program.globals[0].kind else {
        panic!("expected a function");
    };

    let mut literal_types = Vec::new();
    for statement in &function.body {
        if let StatementKind::Assign(assign) = &statement.kind {
            let ExpressionKind::Assignment { value, .. } = &assign.kind else {
                panic!("expected an assignment");
            };
            literal_types.push(types.node_type(value.id).expect("literal is typed").clone());
        }
    }

    assert_eq!(literal_types[0], ty::basic(BasicKind::Byte));
    assert_eq!(literal_types[1], ty::basic(BasicKind::Int));
}

#[test]
fn widening_is_recorded_only_on_byte_nodes() {
    use rillc::frontend::ast::{DeclKind, ExpressionKind, StatementKind};

    // `a` is byte (widened), `n` is int (must not be)
    let source =
        SourceFile::from_string("main: void() { a: byte; n: int; m: int; m = a + n; }");
    let program = Parser::parse_program(&source).expect("program should parse");
    let names = NameAnalysis::build(&program);
    let types = TypeAnalysis::check(&program, &names);
    assert!(types.passed());

    let DeclKind::Fn(function) = &program.globals[0].kind else {
        panic!("expected a function");
    };

    let StatementKind::Assign(assign) = &function.body.last().unwrap().kind else {
        panic!("expected the assignment");
    };
    let ExpressionKind::Assignment { value, .. } = &assign.kind else {
        panic!("expected an assignment expression");
    };
    let ExpressionKind::Binary { lhs, rhs, .. } = &value.kind else {
        panic!("expected a binary expression");
    };

    assert!(
        types.coercion(lhs.id).is_some(),
        "byte side must carry a widening annotation"
    );
    assert_eq!(
        types.coercion(lhs.id).unwrap(),
        &ty::basic(BasicKind::Int)
    );
    assert!(
        types.coercion(rhs.id).is_none(),
        "int side must never be widened"
    );
    // The widened node itself still reads as byte; the annotation is the
    // coerce-as record.
    assert_eq!(types.node_type(lhs.id).unwrap(), &ty::basic(BasicKind::Byte));
}
