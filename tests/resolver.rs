use treelox as lox;

use lox::ast::{Expr, ExprId, Stmt};
use lox::error::LoxError;
use lox::parser::Parser;
use lox::resolver::{Resolver, SideTable};
use lox::scanner::Scanner;

fn parse(source: &str) -> Vec<Stmt> {
    let tokens = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("source should scan cleanly");

    let (statements, errors) = Parser::new(tokens).parse();
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);

    statements
}

fn resolve(source: &str) -> Result<SideTable, Vec<LoxError>> {
    Resolver::new().resolve(&parse(source))
}

fn resolve_errors(source: &str) -> Vec<String> {
    match resolve(source) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Side-table distance checks
// ─────────────────────────────────────────────────────────────────────────

/// Collect `(lexeme, id)` for every Variable occurrence, in source order.
fn variable_ids(statements: &[Stmt]) -> Vec<(String, ExprId)> {
    let mut out = Vec::new();
    for stmt in statements {
        walk_stmt(stmt, &mut out);
    }
    out
}

fn walk_stmt(stmt: &Stmt, out: &mut Vec<(String, ExprId)>) {
    match stmt {
        Stmt::Expression(e) | Stmt::Print(e) => walk_expr(e, out),
        Stmt::Var { initializer, .. } => {
            if let Some(e) = initializer {
                walk_expr(e, out);
            }
        }
        Stmt::Block(stmts) => stmts.iter().for_each(|s| walk_stmt(s, out)),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_expr(condition, out);
            walk_stmt(then_branch, out);
            if let Some(e) = else_branch {
                walk_stmt(e, out);
            }
        }
        Stmt::While { condition, body } => {
            walk_expr(condition, out);
            walk_stmt(body, out);
        }
        Stmt::Function(decl) => decl.body.iter().for_each(|s| walk_stmt(s, out)),
        Stmt::Return { value, .. } => {
            if let Some(e) = value {
                walk_expr(e, out);
            }
        }
        Stmt::Class {
            superclass,
            methods,
            ..
        } => {
            if let Some(e) = superclass {
                walk_expr(e, out);
            }
            for method in methods {
                method.body.iter().for_each(|s| walk_stmt(s, out));
            }
        }
    }
}

fn walk_expr(expr: &Expr, out: &mut Vec<(String, ExprId)>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Grouping(inner) => walk_expr(inner, out),
        Expr::Unary { right, .. } => walk_expr(right, out),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            walk_expr(left, out);
            walk_expr(right, out);
        }
        Expr::Variable { id, name } => out.push((name.lexeme.clone(), *id)),
        Expr::Assign { id, name, value } => {
            out.push((name.lexeme.clone(), *id));
            walk_expr(value, out);
        }
        Expr::Call {
            callee, arguments, ..
        } => {
            walk_expr(callee, out);
            arguments.iter().for_each(|a| walk_expr(a, out));
        }
        Expr::Get { object, .. } => walk_expr(object, out),
        Expr::Set { object, value, .. } => {
            walk_expr(object, out);
            walk_expr(value, out);
        }
        Expr::This { id, keyword } => out.push((keyword.lexeme.clone(), *id)),
        Expr::Super { id, keyword, .. } => out.push((keyword.lexeme.clone(), *id)),
    }
}

#[test]
fn distances_count_scopes_between_use_and_declaration() {
    let source = r#"
        var a = 1;
        {
            var b = 2;
            fun f(p) {
                print a;
                print b;
                print p;
            }
        }
    "#;

    let statements = parse(source);
    let table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    let vars = variable_ids(&statements);
    assert_eq!(vars.len(), 3);

    let (ref a_name, a_id) = vars[0];
    let (ref b_name, b_id) = vars[1];
    let (ref p_name, p_id) = vars[2];
    assert_eq!((a_name.as_str(), b_name.as_str(), p_name.as_str()), ("a", "b", "p"));

    // `a` is global: no side-table entry, lookup falls back to globals.
    assert_eq!(table.get(&a_id), None);

    // `b` lives one scope out from the function body (body → block).
    assert_eq!(table.get(&b_id), Some(&1));

    // `p` is a parameter in the innermost scope.
    assert_eq!(table.get(&p_id), Some(&0));
}

#[test]
fn shadowing_resolves_to_the_nearest_declaration() {
    let source = r#"
        {
            var x = 1;
            {
                var x = 2;
                print x;
            }
            print x;
        }
    "#;

    let statements = parse(source);
    let table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    let vars = variable_ids(&statements);
    let (_, inner_id) = vars[0];
    let (_, outer_id) = vars[1];

    // Both reads hit the scope they appear in directly.
    assert_eq!(table.get(&inner_id), Some(&0));
    assert_eq!(table.get(&outer_id), Some(&0));
}

#[test]
fn reads_through_blocks_accumulate_distance() {
    let source = r#"
        {
            var x = 1;
            {
                {
                    print x;
                }
            }
        }
    "#;

    let statements = parse(source);
    let table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    let vars = variable_ids(&statements);
    assert_eq!(table.get(&vars[0].1), Some(&2));
}

#[test]
fn this_resolves_through_the_method_binding_layer() {
    let source = r#"
        class Cake {
            taste() {
                print this;
            }
        }
    "#;

    let statements = parse(source);
    let table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    let vars = variable_ids(&statements);
    let (ref name, id) = vars[0];
    assert_eq!(name, "this");

    // method body scope (0) → `this` layer (1).
    assert_eq!(table.get(&id), Some(&1));
}

#[test]
fn super_resolves_one_layer_beyond_this() {
    let source = r#"
        class A { cook() { print 1; } }
        class B < A {
            cook() {
                super.cook();
            }
        }
    "#;

    let statements = parse(source);
    let table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    let vars = variable_ids(&statements);
    let super_entry = vars
        .iter()
        .find(|(name, _)| name == "super")
        .expect("super occurrence");

    // method body (0) → `this` layer (1) → `super` layer (2).
    assert_eq!(table.get(&super_entry.1), Some(&2));
}

// ─────────────────────────────────────────────────────────────────────────
// Static rejection
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_declaration_in_same_scope_is_rejected() {
    let errors = resolve_errors("{ var a = 1; var a = 2; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("already declared"), "{}", errors[0]);
}

#[test]
fn shadowing_in_a_nested_scope_is_allowed() {
    assert!(resolve("{ var a = 1; { var a = 2; } }").is_ok());
}

#[test]
fn reading_a_variable_in_its_own_initializer_is_rejected() {
    let errors = resolve_errors("fun f() { var a = a; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("its own initializer"), "{}", errors[0]);
}

#[test]
fn top_level_return_is_rejected() {
    let errors = resolve_errors("return 1;");

    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].contains("Cannot return from top-level code"),
        "{}",
        errors[0]
    );
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    let errors = resolve_errors("class A { init() { return 1; } }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("initializer"), "{}", errors[0]);

    // A bare `return;` in init is fine.
    assert!(resolve("class A { init() { return; } }").is_ok());
}

#[test]
fn this_outside_a_class_is_rejected() {
    let errors = resolve_errors("print this;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("'this'"), "{}", errors[0]);

    let errors = resolve_errors("fun f() { return this; }");
    assert_eq!(errors.len(), 1);
}

#[test]
fn super_misuse_is_rejected() {
    let errors = resolve_errors("fun f() { super.cook(); }");
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].contains("outside of a class"),
        "{}",
        errors[0]
    );

    let errors = resolve_errors("class A { cook() { super.cook(); } }");
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].contains("no superclass"),
        "{}",
        errors[0]
    );
}

#[test]
fn self_inheritance_is_rejected() {
    let errors = resolve_errors("class A < A {}");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("inherit from itself"), "{}", errors[0]);
}

#[test]
fn errors_aggregate_across_the_whole_program() {
    let errors = resolve_errors("return 1;\nprint this;\n{ var a = 1; var a = 2; }");

    assert_eq!(errors.len(), 3);
}
