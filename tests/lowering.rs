use rillc::compile_to_ir;
use rillc::middle::ir::{IrProgram, Procedure, QuadKind};
use rillc::SourceFile;

// ── Helpers ──────────────────────────────────────────────────────────────

fn lower(source_text: &str) -> IrProgram {
    let source = SourceFile::from_string(source_text);
    compile_to_ir(&source).expect("program should compile")
}

fn proc_named<'p>(program: &'p IrProgram, name: &str) -> &'p Procedure {
    program
        .procedures()
        .iter()
        .find(|p| p.name() == name)
        .unwrap_or_else(|| panic!("no procedure named {name}"))
}

/// The body of a procedure as bare operation strings (no label gutter).
fn body_reprs(program: &IrProgram, name: &str) -> Vec<String> {
    proc_named(program, name)
        .body()
        .iter()
        .map(|quad| quad.repr())
        .collect()
}

// ── End-to-end scenarios ─────────────────────────────────────────────────

#[test]
fn constant_byte_addition() {
    let program = lower("main: void() { a: byte; a = 1 + 2; }");

    assert_eq!(
        body_reprs(&program, "main"),
        ["[varTmp0] := 1 ADD8 2", "[a] := [varTmp0]"]
    );
}

#[test]
fn byte_plus_int_promotes_through_a_temp() {
    let program = lower("main: void() { a: byte; b: int; b = a + 300; }");

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "[varTmp0] := [a]",
            "[varTmp1] := [varTmp0] ADD64 300",
            "[b] := [varTmp1]",
        ]
    );
}

#[test]
fn if_lowering_branches_around_the_body() {
    let program = lower("main: void() { x: int; y: int; if (x == 0) { y = 1; } }");

    // The widened zero is an immediate, so it re-tags at 8 bytes with no
    // copy; `y = 1` likewise assigns the literal directly.
    assert_eq!(
        body_reprs(&program, "main"),
        [
            "[varTmp0] := [x] EQ64 0",
            "IFZ [varTmp0] GOTO lbl1",
            "[y] := 1",
            "nop",
        ]
    );

    let main = proc_named(&program, "main");
    let exit = main.body().last().expect("body is nonempty");
    assert_eq!(exit.labels().len(), 1);
    assert_eq!(exit.labels()[0].name(), "lbl1");
}

#[test]
fn while_lowering() {
    let program = lower("main: void() { i: int; n: int; while (i < n) { i++; } }");

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "nop",
            "[varTmp0] := [i] LT64 [n]",
            "IFZ [varTmp0] GOTO lbl2",
            "[i] := [i] ADD64 1",
            "goto lbl1",
            "nop",
        ]
    );

    let main = proc_named(&program, "main");
    assert_eq!(main.body()[0].labels()[0].name(), "lbl1");
    assert_eq!(main.body()[5].labels()[0].name(), "lbl2");
}

#[test]
fn call_with_return_value() {
    let program = lower(
        r#"
        f: int(x: int, y: int) { return x; }
        main: void() { a: int; b: int; r: int; r = f(a, b); }
        "#,
    );

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "setarg 1 [a]",
            "setarg 2 [b]",
            "call fun_f",
            "getret [varTmp0]",
            "[r] := [varTmp0]",
        ]
    );
}

#[test]
fn array_index_with_word_element() {
    let program = lower("main: void() { arr: int array[10]; i: int; x: int; x = arr[i]; }");

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "[varTmp0] := [i] MULT64 8",
            "addrTmp1 := [arr] ADD64 [varTmp0]",
            "[x] := [addrTmp1]",
        ]
    );
}

#[test]
fn array_index_with_byte_element() {
    let program = lower("main: void() { a: byte array[8]; i: int; b: byte; b = a[i]; }");

    assert_eq!(
        body_reprs(&program, "main"),
        ["addrTmp0 := [a] ADD64 [i]", "[b] := [addrTmp0]"]
    );
}

#[test]
fn semantic_errors_stop_the_pipeline() {
    let source = SourceFile::from_string("main: void() { b: bool; n: int; if (b + n) { } }");
    let error = compile_to_ir(&source).expect_err("type analysis should fail");
    assert!(matches!(
        error,
        rillc::CompileError::TypeAnalysisFailed
    ));
}

// ── Statement shapes ─────────────────────────────────────────────────────

#[test]
fn if_else_lowering() {
    let program = lower(
        "main: void() { b: bool; n: int; if (b) { n = 1000; } else { n = 2000; } }",
    );

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "IFZ [b] GOTO lbl1",
            "[n] := 1000",
            "goto lbl2",
            "nop",
            "[n] := 2000",
            "nop",
        ]
    );

    let main = proc_named(&program, "main");
    assert_eq!(main.body()[3].labels()[0].name(), "lbl1");
    assert_eq!(main.body()[5].labels()[0].name(), "lbl2");
}

#[test]
fn havoc_fills_a_fresh_temporary() {
    let program = lower("main: void() { b: bool; b = havoc; }");

    assert_eq!(
        body_reprs(&program, "main"),
        ["HAVOC [varTmp0]", "[b] := [varTmp0]"]
    );
}

#[test]
fn read_and_write_lower_to_runtime_quads() {
    let program = lower("main: void() { n: int; read n; write n; write true; }");

    assert_eq!(
        body_reprs(&program, "main"),
        ["READ [n]", "WRITE [n]", "WRITE 1"]
    );
}

#[test]
fn post_decrement_uses_sub64() {
    let program = lower("main: void() { i: int; i--; }");

    assert_eq!(body_reprs(&program, "main"), ["[i] := [i] SUB64 1"]);
}

#[test]
fn logical_ops_are_8_bit_and_evaluate_both_sides() {
    let program = lower("main: void() { p: bool; q: bool; r: bool; r = p && q || true; }");

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "[varTmp0] := [p] AND8 [q]",
            "[varTmp1] := [varTmp0] OR8 1",
            "[r] := [varTmp1]",
        ]
    );
}

#[test]
fn unary_lowering() {
    let program = lower("main: void() { n: int; b: bool; n = -n; b = !b; }");

    assert_eq!(
        body_reprs(&program, "main"),
        [
            "[varTmp0] := NEG64 [n]",
            "[n] := [varTmp0]",
            "[varTmp1] := NOT8 [b]",
            "[b] := [varTmp1]",
        ]
    );
}

#[test]
fn void_call_statement_has_no_getret() {
    let program = lower(
        r#"
        f: void(a: int) { }
        main: void() { f(1000); }
        "#,
    );

    assert_eq!(
        body_reprs(&program, "main"),
        ["setarg 1 1000", "call fun_f"]
    );
}

#[test]
fn formals_materialize_through_getargs() {
    let program = lower("f: void(a: int, b: byte, c: bool) { }");

    assert_eq!(
        body_reprs(&program, "f"),
        ["getarg 1 [a]", "getarg 2 [b]", "getarg 3 [c]"]
    );

    let f = proc_named(&program, "f");
    let widths = f
        .formals()
        .iter()
        .map(|(_, opd)| opd.width())
        .collect::<Vec<_>>();
    assert_eq!(widths, [8, 1, 1]);
}

// ── Program-level storage ────────────────────────────────────────────────

#[test]
fn globals_are_gathered_and_reachable() {
    let program = lower(
        r#"
        g: int;
        main: void() { g = 1000; }
        "#,
    );

    assert_eq!(program.globals().len(), 1);
    assert_eq!(body_reprs(&program, "main"), ["[g] := 1000"]);

    let text = program.to_text(false);
    assert!(text.contains("[BEGIN GLOBALS]"));
    assert!(text.contains("g (global var of 8 bytes)"));
}

#[test]
fn string_pool_preserves_insertion_order() {
    let program = lower(r#"main: void() { write "hi"; write "there"; write "hi"; }"#);

    let names = program
        .strings()
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_str()))
        .collect::<Vec<_>>();

    assert_eq!(
        names,
        [
            ("str0", "\"hi\""),
            ("str1", "\"there\""),
            ("str2", "\"hi\""),
        ]
    );

    assert_eq!(
        body_reprs(&program, "main"),
        ["WRITE [str0]", "WRITE [str1]", "WRITE [str2]"]
    );
}

// ── Structural invariants ────────────────────────────────────────────────

#[test]
fn binop_width_tags_match_operand_widths() {
    let program = lower(
        r#"
        main: void() {
            a: byte; b: byte; c: byte;
            x: int; y: int; z: int;
            p: bool; q: bool; r: bool;
            c = a + b;
            z = x * y;
            r = p && q;
            r = a < b;
            r = x == y;
            z = x + a;
            x++;
        }
        "#,
    );

    let mut seen = 0;
    for procedure in program.procedures() {
        for quad in procedure.body() {
            if let QuadKind::BinOp { op, lhs, rhs, .. } = &quad.kind {
                seen += 1;
                if op.is_wide() {
                    assert_eq!(lhs.width(), 8, "64-bit op with narrow lhs: {quad}");
                    assert_eq!(rhs.width(), 8, "64-bit op with narrow rhs: {quad}");
                } else {
                    assert!(
                        lhs.width() == 1 || rhs.width() == 1,
                        "8-bit op with two wide operands: {quad}"
                    );
                }
            }
        }
    }

    assert!(seen >= 7, "expected to inspect every binary op, saw {seen}");
}

#[test]
fn every_return_funnels_to_the_single_leave() {
    let program = lower(
        r#"
        f: int(n: int) {
            if (n > 0) { return 1000; }
            return 2000;
        }
        "#,
    );

    let f = proc_named(&program, "f");

    // Exactly one leave, outside the body
    assert!(matches!(f.leave().kind, QuadKind::Leave { .. }));
    for quad in f.body() {
        assert!(!matches!(quad.kind, QuadKind::Leave { .. } | QuadKind::Enter { .. }));
    }

    // Both returns jump to the leave label
    let leave_label = f.leave_label().name();
    let jumps_to_leave = f
        .body()
        .iter()
        .filter(|quad| {
            matches!(&quad.kind, QuadKind::Jmp { target } if target.name() == leave_label)
        })
        .count();
    assert_eq!(jumps_to_leave, 2);

    // And every setret is immediately followed by that jump
    for (i, quad) in f.body().iter().enumerate() {
        if matches!(quad.kind, QuadKind::SetRet { .. }) {
            let next = &f.body()[i + 1];
            assert!(
                matches!(&next.kind, QuadKind::Jmp { target } if target.name() == leave_label)
            );
        }
    }
}

#[test]
fn labels_are_unique_across_the_program() {
    let program = lower(
        r#"
        f: int(n: int) {
            while (n > 0) { n--; }
            if (n == 0) { return 1000; } else { return 2000; }
        }
        main: void() {
            x: int;
            if (havoc) { x = f(5000); }
        }
        "#,
    );

    let mut seen = std::collections::HashSet::new();
    for procedure in program.procedures() {
        let quads = std::iter::once(procedure.enter())
            .chain(procedure.body())
            .chain(std::iter::once(procedure.leave()));

        for quad in quads {
            for label in quad.labels() {
                assert!(
                    seen.insert(label.name().to_string()),
                    "label {label} attached twice"
                );
            }
        }
    }

    // Reserved entry labels are present exactly once
    assert!(seen.contains("fun_f"));
    assert!(seen.contains("main"));
}

#[test]
fn every_expression_node_is_typed() {
    use rillc::frontend::ast::{DeclKind, Expression, ExpressionKind, StatementKind};
    use rillc::frontend::parser::Parser;
    use rillc::middle::resolve::NameAnalysis;
    use rillc::middle::type_check::TypeAnalysis;

    fn collect<'e>(expression: &'e Expression, out: &mut Vec<&'e Expression>) {
        out.push(expression);
        match &expression.kind {
            ExpressionKind::Index { base, index } => {
                collect(base, out);
                collect(index, out);
            }
            ExpressionKind::Call { arguments, .. } => {
                for argument in arguments {
                    collect(argument, out);
                }
            }
            ExpressionKind::Assignment { target, value } => {
                collect(target, out);
                collect(value, out);
            }
            ExpressionKind::Binary { lhs, rhs, .. } => {
                collect(lhs, out);
                collect(rhs, out);
            }
            ExpressionKind::Unary { operand, .. } => collect(operand, out),
            _ => {}
        }
    }

    fn collect_stmts<'e>(
        statements: &'e [rillc::frontend::ast::Statement],
        out: &mut Vec<&'e Expression>,
    ) {
        for statement in statements {
            match &statement.kind {
                StatementKind::Assign(e)
                | StatementKind::PostIncrement(e)
                | StatementKind::PostDecrement(e)
                | StatementKind::Read(e)
                | StatementKind::Write(e)
                | StatementKind::Call(e) => collect(e, out),
                StatementKind::If { condition, body } => {
                    collect(condition, out);
                    collect_stmts(body, out);
                }
                StatementKind::IfElse {
                    condition,
                    then_body,
                    else_body,
                } => {
                    collect(condition, out);
                    collect_stmts(then_body, out);
                    collect_stmts(else_body, out);
                }
                StatementKind::While { condition, body } => {
                    collect(condition, out);
                    collect_stmts(body, out);
                }
                StatementKind::Return(Some(e)) => collect(e, out),
                StatementKind::Return(None) | StatementKind::VarDecl(_) => {}
            }
        }
    }

    let source = SourceFile::from_string(
        r#"
        f: int(n: int) { return n * 2000; }
        main: void() {
            a: byte array[4];
            i: int;
            b: bool;
            i = f(a[0] + 300);
            b = havoc && !(i == 0);
            write "done";
        }
        "#,
    );

    let program = Parser::parse_program(&source).expect("program should parse");
    let names = NameAnalysis::build(&program);
    assert!(names.passed());
    let types = TypeAnalysis::check(&program, &names);
    assert!(types.passed());

    let mut expressions = Vec::new();
    for decl in &program.globals {
        if let DeclKind::Fn(function) = &decl.kind {
            collect_stmts(&function.body, &mut expressions);
        }
    }

    assert!(expressions.len() > 15, "walker should find the whole tree");
    for expression in expressions {
        assert!(
            types.node_type(expression.id).is_some(),
            "untyped expression at {:?}",
            expression.span
        );
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

#[test]
fn procedure_dump_shape() {
    let program = lower(
        r#"
        f: int(x: int) { return x + 1000; }
        main: void() { r: int; r = f(2000); }
        "#,
    );

    let text = program.to_text(false);

    assert!(text.contains("[BEGIN f LOCALS]"));
    assert!(text.contains("x (formal arg of 8 bytes)"));
    assert!(text.contains("varTmp0 (tmp var of 8 bytes)"));
    assert!(text.contains("[END f LOCALS]"));
    assert!(text.contains("[BEGIN main LOCALS]"));
    assert!(text.contains("r (local var of 8 bytes)"));

    // Entry labels are reserved names; the leave label is generated
    let f = proc_named(&program, "f");
    assert_eq!(f.enter().labels()[0].name(), "fun_f");
    assert!(f.leave_label().name().starts_with("lbl"));

    let main = proc_named(&program, "main");
    assert_eq!(main.enter().labels()[0].name(), "main");
}

#[test]
fn quad_lines_have_a_12_column_label_gutter() {
    let program = lower("main: void() { n: int; n = 1000; }");
    let main = proc_named(&program, "main");

    let enter = main.enter().to_text(false);
    assert!(enter.starts_with("main: "));
    assert_eq!(enter.len() - "enter main".len(), 12);

    let unlabeled = main.body()[0].to_text(false);
    assert!(unlabeled[..12].chars().all(|c| c == ' '));
    assert_eq!(unlabeled.trim_start(), "[n] := 1000");
}

#[test]
fn verbose_rendering_carries_comments() {
    let program = lower("main: void() { n: int; n = 1000; }");
    let main = proc_named(&program, "main");

    let assign = &main.body()[0];
    assert_eq!(assign.comment(), Some("assignment"));
    assert!(assign.to_text(true).ends_with("#assignment"));
    assert!(!assign.to_text(false).contains('#'));
}
