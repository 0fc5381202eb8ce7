use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use treelox as lox;

use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;

/// Print sink that keeps a handle on its buffer after the interpreter takes
/// ownership of the writer.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `source` through the whole pipeline with a fresh interpreter,
/// capturing everything `print` writes.
fn run_program(source: &str) -> (String, Result<(), LoxError>) {
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

    let result = run_with(source, &mut interpreter);

    (buf.contents(), result)
}

/// Run `source` against an existing interpreter, as a REPL line would.
fn run_with(source: &str, interpreter: &mut Interpreter) -> Result<(), LoxError> {
    let tokens = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("source should scan cleanly");

    let (statements, errors) = Parser::new(tokens).parse();
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);

    let side_table = Resolver::new()
        .resolve(&statements)
        .expect("program should resolve");

    interpreter.interpret(&statements, &side_table)
}

fn output_of(source: &str) -> String {
    let (output, result) = run_program(source);
    result.expect("program should run cleanly");
    output
}

fn error_of(source: &str) -> String {
    let (_, result) = run_program(source);
    result.expect_err("program should fail at runtime").to_string()
}

// ─────────────────────────────────────────────────────────────────────────
// Arithmetic, stringify, truthiness
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic_follows_precedence_and_associativity() {
    assert_eq!(output_of("print 2 + 3 * 4;"), "14\n");
    assert_eq!(output_of("print 1 - 2 - 3;"), "-4\n");
    assert_eq!(output_of("print (2 + 3) * 4;"), "20\n");
}

#[test]
fn stringify_drops_the_trailing_zero_of_integral_numbers() {
    assert_eq!(output_of("print 2.5;"), "2.5\n");
    assert_eq!(output_of("print 4 / 2;"), "2\n");
    assert_eq!(output_of("print -0.0 - 1 + 1;"), "0\n");
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(output_of("print 1 / 0;"), "inf\n");
    assert_eq!(output_of("print -1 / 0;"), "-inf\n");
    assert_eq!(output_of("print 0 / 0;"), "NaN\n");
}

#[test]
fn plus_concatenates_strings_and_rejects_mixes() {
    assert_eq!(output_of("print \"a\" + \"b\";"), "ab\n");

    let message = error_of("print 1 + \"a\";");
    assert!(
        message.contains("Operands must be two numbers or two strings."),
        "{}",
        message
    );
}

#[test]
fn only_nil_and_false_are_falsey() {
    assert_eq!(output_of("print !nil;"), "true\n");
    assert_eq!(output_of("print !false;"), "true\n");
    assert_eq!(output_of("print !0;"), "false\n");
    assert_eq!(output_of("print !\"\";"), "false\n");
}

#[test]
fn logical_operators_return_operand_values() {
    assert_eq!(output_of("print nil or \"yes\";"), "yes\n");
    assert_eq!(output_of("print false and 1;"), "false\n");
    assert_eq!(output_of("print 1 and 2;"), "2\n");

    // Short circuit: the right side must not run.
    assert_eq!(
        output_of("fun boom() { print \"boom\"; } true or boom(); print \"ok\";"),
        "ok\n"
    );
}

#[test]
fn comparison_requires_numbers() {
    assert_eq!(output_of("print 1 < 2;"), "true\n");

    let message = error_of("print \"a\" < \"b\";");
    assert!(message.contains("Operands must be numbers."), "{}", message);
}

#[test]
fn equality_never_type_errors() {
    assert_eq!(output_of("print 1 == \"1\";"), "false\n");
    assert_eq!(output_of("print nil == nil;"), "true\n");
    assert_eq!(output_of("print nil == false;"), "false\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Variables and control flow
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn uninitialized_variables_read_as_nil() {
    assert_eq!(output_of("var a; print a;"), "nil\n");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    let message = error_of("print missing;");
    assert!(
        message.contains("Undefined variable 'missing'."),
        "{}",
        message
    );
    assert!(message.contains("[line 1]"), "{}", message);
}

#[test]
fn assignment_evaluates_to_the_assigned_value() {
    assert_eq!(output_of("var a = 1; print a = 2; print a;"), "2\n2\n");
}

#[test]
fn blocks_shadow_and_restore() {
    let source = r#"
        var a = "outer";
        {
            var a = "inner";
            print a;
        }
        print a;
    "#;
    assert_eq!(output_of(source), "inner\nouter\n");
}

#[test]
fn for_loop_runs_the_desugared_while() {
    assert_eq!(
        output_of("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn if_else_picks_by_truthiness() {
    assert_eq!(output_of("if (0) print \"then\"; else print \"else\";"), "then\n");
    assert_eq!(output_of("if (nil) print \"then\"; else print \"else\";"), "else\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Functions and closures
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(output_of("fun f() {} print f();"), "nil\n");
}

#[test]
fn closures_capture_independent_environments() {
    let source = r#"
        fun make_counter() {
            var count = 0;
            fun tick() {
                count = count + 1;
                print count;
            }
            return tick;
        }

        var a = make_counter();
        var b = make_counter();
        a();
        a();
        b();
    "#;
    assert_eq!(output_of(source), "1\n2\n1\n");
}

#[test]
fn closures_bind_at_declaration_not_call_time() {
    let source = r#"
        var a = "global";
        {
            fun show() { print a; }
            show();
            var a = "block";
            show();
        }
    "#;
    assert_eq!(output_of(source), "global\nglobal\n");
}

#[test]
fn return_unwinds_out_of_nested_loops() {
    let source = r#"
        fun first_over(limit) {
            for (var i = 0; ; i = i + 1) {
                if (i > limit) return i;
            }
        }
        print first_over(3);
    "#;
    assert_eq!(output_of(source), "4\n");
}

#[test]
fn call_arity_is_checked() {
    let message = error_of("fun f(a, b) {} f(1);");
    assert!(
        message.contains("Expected 2 arguments but got 1."),
        "{}",
        message
    );
}

#[test]
fn only_functions_and_classes_are_callable() {
    let message = error_of("\"not a function\"();");
    assert!(
        message.contains("Can only call functions and classes."),
        "{}",
        message
    );
}

#[test]
fn function_values_stringify_by_name() {
    assert_eq!(output_of("fun cook() {} print cook;"), "<fn cook>\n");
    assert_eq!(output_of("print clock;"), "<native fn clock>\n");
}

#[test]
fn clock_returns_a_number() {
    assert_eq!(output_of("print clock() >= 0;"), "true\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class Box {
            label() { return "method"; }
        }
        var b = Box();
        print b.label();
        b.label = "field";
        print b.label;
    "#;
    assert_eq!(output_of(source), "method\nfield\n");
}

#[test]
fn methods_dispatch_through_this() {
    let source = r#"
        class A {
            test() { print this.kind(); }
            kind() { return "A"; }
        }
        class B < A {
            kind() { return "B"; }
        }
        B().test();
    "#;
    assert_eq!(output_of(source), "B\n");
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Person {
            init(name) { this.name = name; }
            greet() { print this.name; }
        }
        var greet = Person("jane").greet;
        greet();
    "#;
    assert_eq!(output_of(source), "jane\n");
}

#[test]
fn super_starts_lookup_above_the_defining_class() {
    let source = r#"
        class A { cook() { print "A"; } }
        class B < A { cook() { super.cook(); } }
        class C < B {}
        C().cook();
    "#;
    assert_eq!(output_of(source), "A\n");
}

#[test]
fn init_arity_applies_to_construction() {
    let message = error_of("class P { init(a, b) {} } P(1);");
    assert!(
        message.contains("Expected 2 arguments but got 1."),
        "{}",
        message
    );
}

#[test]
fn early_return_from_init_still_yields_the_instance() {
    let source = r#"
        class Task {
            init() {
                this.done = true;
                return;
            }
        }
        print Task().done;
    "#;
    assert_eq!(output_of(source), "true\n");
}

#[test]
fn calling_init_directly_returns_the_instance() {
    let source = r#"
        class Task {
            init() { this.runs = true; }
        }
        var t = Task();
        print t.init() == t;
    "#;
    assert_eq!(output_of(source), "true\n");
}

#[test]
fn instances_and_classes_stringify_by_name() {
    assert_eq!(output_of("class Cake {} print Cake;"), "Cake\n");
    assert_eq!(output_of("class Cake {} print Cake();"), "Cake instance\n");
}

#[test]
fn undefined_property_is_a_runtime_error() {
    let message = error_of("class C {} print C().missing;");
    assert!(
        message.contains("Undefined property 'missing'."),
        "{}",
        message
    );
}

#[test]
fn properties_require_an_instance() {
    let message = error_of("print (1).x;");
    assert!(message.contains("Only instances have properties."), "{}", message);

    let message = error_of("1 .x = 2;");
    assert!(message.contains("Only instances have fields."), "{}", message);
}

#[test]
fn superclass_must_be_a_class() {
    let message = error_of("var NotAClass = 1; class C < NotAClass {}");
    assert!(message.contains("Superclass must be a class."), "{}", message);
}

#[test]
fn inherited_methods_are_found_through_the_chain() {
    let source = r#"
        class A { cook() { print "base"; } }
        class B < A {}
        B().cook();
    "#;
    assert_eq!(output_of(source), "base\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Interpreter state across passes
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn globals_persist_across_interpret_calls() {
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

    run_with("var a = 1; fun bump() { a = a + 1; }", &mut interpreter)
        .expect("first pass should run");
    run_with("bump(); print a;", &mut interpreter).expect("second pass should run");

    assert_eq!(buf.contents(), "2\n");
}

#[test]
fn runtime_error_leaves_the_interpreter_usable() {
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

    run_with("var a = 1;", &mut interpreter).expect("first pass should run");
    assert!(run_with("print missing;", &mut interpreter).is_err());
    run_with("print a;", &mut interpreter).expect("state should survive the error");

    assert_eq!(buf.contents(), "1\n");
}

#[test]
fn identical_programs_produce_identical_output() {
    let source = r#"
        class Shape {
            init(name) { this.name = name; }
            describe() { return this.name + "!"; }
        }
        var shapes = Shape("circle");
        print shapes.describe();
        for (var i = 0; i < 2; i = i + 1) print i * 3;
    "#;

    assert_eq!(output_of(source), output_of(source));
    assert_eq!(output_of(source), "circle!\n0\n3\n");
}
