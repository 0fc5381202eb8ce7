//! Canonical parenthesized rendering of expression trees.
//!
//! Used by the `parse` CLI subcommand and by tests that assert the parser is
//! deterministic: the printed form makes grouping explicit, so
//! `1 - 2 - 3` renders as `(- (- 1.0 2.0) 3.0)` and any associativity or
//! precedence bug is visible in the output.

use crate::ast::{Expr, LiteralValue};

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(value) => self.print_literal(value),

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", self.print(callee));
                for argument in arguments {
                    out.push(' ');
                    out.push_str(&self.print(argument));
                }
                out.push(')');
                out
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    /// Numbers always show a decimal point (`3` prints as `3.0`) so the
    /// canonical form is unambiguous about literal kinds.
    fn print_literal(&self, value: &LiteralValue) -> String {
        match value {
            LiteralValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }

            LiteralValue::Str(s) => s.clone(),

            LiteralValue::True => "true".to_string(),

            LiteralValue::False => "false".to_string(),

            LiteralValue::Nil => "nil".to_string(),
        }
    }
}
