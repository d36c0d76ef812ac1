//! Script linter built on the oxc parser and AST visitor.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BinaryExpression, ChainElement, DebuggerStatement, Expression, ExpressionStatement,
    UnaryOperator, WithStatement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::{LineIndex, Violation};

/// Lint a classic (non-module) browser script.
pub fn lint(source: &str) -> Vec<Violation> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

    let mut violations: Vec<Violation> = parsed
        .errors
        .iter()
        .map(|e| Violation::new("syntax", 0, e.to_string()))
        .collect();

    if parsed.panicked {
        return violations;
    }

    let index = LineIndex::new(source);
    let mut linter = ScriptLinter {
        index: &index,
        violations: Vec::new(),
    };
    linter.visit_program(&parsed.program);

    violations.extend(linter.violations);
    violations.sort_by_key(|v| v.line);
    violations
}

struct ScriptLinter<'i> {
    index: &'i LineIndex,
    violations: Vec<Violation>,
}

impl ScriptLinter<'_> {
    fn push(&mut self, rule: &'static str, offset: u32, message: String) {
        let line = self.index.line(offset as usize);
        self.violations.push(Violation::new(rule, line, message));
    }
}

impl<'a> Visit<'a> for ScriptLinter<'_> {
    fn visit_debugger_statement(&mut self, it: &DebuggerStatement) {
        self.push("no-debugger", it.span.start, "Forgotten 'debugger' statement?".to_string());
    }

    fn visit_with_statement(&mut self, it: &WithStatement<'a>) {
        self.push("no-with", it.span.start, "Don't use 'with'.".to_string());
        walk::walk_with_statement(self, it);
    }

    fn visit_binary_expression(&mut self, it: &BinaryExpression<'a>) {
        let op = it.operator.as_str();
        if op == "==" || op == "!=" {
            if let Some(literal) = loose_literal(&it.left).or_else(|| loose_literal(&it.right)) {
                self.push(
                    "eqeqeq",
                    it.span.start,
                    format!(
                        "Use '{}=' to compare with '{}'.",
                        if op == "==" { "==" } else { "!=" },
                        literal
                    ),
                );
            }
        }
        walk::walk_binary_expression(self, it);
    }

    fn visit_expression_statement(&mut self, it: &ExpressionStatement<'a>) {
        if !has_effect(&it.expression) {
            self.push(
                "no-unused-expressions",
                it.span.start,
                "Expected an assignment or function call and instead saw an expression."
                    .to_string(),
            );
        }
        walk::walk_expression_statement(self, it);
    }
}

/// Whether a statement-level expression does something. Short-circuit and
/// ternary forms count as unused, even when a branch calls.
fn has_effect(expr: &Expression) -> bool {
    match expr.without_parentheses() {
        Expression::CallExpression(_)
        | Expression::NewExpression(_)
        | Expression::AssignmentExpression(_)
        | Expression::UpdateExpression(_)
        | Expression::AwaitExpression(_)
        | Expression::YieldExpression(_)
        | Expression::SequenceExpression(_)
        | Expression::TaggedTemplateExpression(_)
        | Expression::ImportExpression(_) => true,
        Expression::UnaryExpression(unary) => unary.operator == UnaryOperator::Delete,
        Expression::ChainExpression(chain) => {
            matches!(chain.expression, ChainElement::CallExpression(_))
        }
        _ => false,
    }
}

/// Literals that make a loose comparison ambiguous.
fn loose_literal(expr: &Expression) -> Option<&'static str> {
    match expr.without_parentheses() {
        Expression::NullLiteral(_) => Some("null"),
        Expression::BooleanLiteral(b) => Some(if b.value { "true" } else { "false" }),
        Expression::NumericLiteral(n) if n.value == 0.0 => Some("0"),
        Expression::StringLiteral(s) if s.value.as_str().is_empty() => Some("''"),
        Expression::Identifier(id) if id.name.as_str() == "undefined" => Some("undefined"),
        _ => None,
    }
}
