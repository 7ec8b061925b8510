//! Renders a parsed [`File`] as Python source.
//!
//! Rendering is a pure walk over the tree. The indentation depth is passed
//! down explicitly and every nested block adds one level.

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::ast::{
    AdditiveOp, ComparisonOp, Expression, File, LogicalOp, MultiplicativeOp, Statement,
};
use crate::parser::MAX_NESTING_DEPTH;

const DEFAULT_INDENT_WIDTH: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(width) => width,
    None => panic!("indent width must be non-zero"),
};

/// Words the target language refuses as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

#[derive(Debug, thiserror::Error, Serialize)]
pub enum GenerationError {
    #[error("`{name}` is a reserved word in Python and cannot be used as a name")]
    ReservedWord { name: String },
    #[error("`{name}` is not a valid Python identifier")]
    InvalidIdentifier { name: String },
    #[error("integer literal `{literal}` has a leading zero, which Python rejects")]
    LeadingZero { literal: String },
    #[error("tree nests deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indent {
    /// A zero width would flatten every block into its parent.
    Spaces(NonZeroUsize),
    Tab,
}

impl Indent {
    /// `None` for a width of zero.
    pub fn spaces(width: usize) -> Option<Self> {
        NonZeroUsize::new(width).map(Indent::Spaces)
    }

    fn unit(self) -> String {
        match self {
            Indent::Spaces(width) => " ".repeat(width.get()),
            Indent::Tab => "\t".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub indent: Indent,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            indent: Indent::Spaces(DEFAULT_INDENT_WIDTH),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Generator {
    indent_unit: String,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(&GeneratorOptions::default())
    }
}

impl Generator {
    pub fn new(options: &GeneratorOptions) -> Self {
        Self {
            indent_unit: options.indent.unit(),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(statements = file.statements.len()))]
    pub fn generate(&self, file: &File) -> Result<String, GenerationError> {
        let mut output = String::new();
        for statement in &file.statements {
            output.push_str(&self.generate_statement(statement, 0)?);
        }
        Ok(output)
    }

    fn generate_block(&self, body: &[Statement], depth: usize) -> Result<String, GenerationError> {
        if body.is_empty() {
            return Ok(format!("{}pass\n", self.indent_unit.repeat(depth)));
        }
        let mut output = String::new();
        for statement in body {
            output.push_str(&self.generate_statement(statement, depth)?);
        }
        Ok(output)
    }

    fn generate_statement(
        &self,
        statement: &Statement,
        depth: usize,
    ) -> Result<String, GenerationError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(GenerationError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        let indentation = self.indent_unit.repeat(depth);
        let rendered = match statement {
            Statement::Function(function) => {
                let name = identifier(&function.name)?;
                let parameters = function
                    .parameters
                    .iter()
                    .map(|parameter| identifier(parameter))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                let body = self.generate_block(&function.body, depth + 1)?;
                format!("{indentation}def {name}({parameters}):\n{body}\n")
            }
            Statement::If(stmt) => {
                let condition = self.generate_expression(&stmt.condition)?;
                let then_body = self.generate_block(&stmt.then_body, depth + 1)?;
                let mut rendered = format!("{indentation}if ({condition}):\n{then_body}");
                if let Some(else_body) = &stmt.else_body {
                    let else_body = self.generate_block(else_body, depth + 1)?;
                    rendered.push_str(&format!("{indentation}else:\n{else_body}"));
                }
                rendered
            }
            Statement::Print { value } => {
                format!("{indentation}print({})\n", self.generate_expression(value)?)
            }
            Statement::VarDecl { name, value } | Statement::Assignment { name, value } => {
                format!(
                    "{indentation}{} = {}\n",
                    identifier(name)?,
                    self.generate_expression(value)?
                )
            }
            Statement::Return { value: Some(value) } => {
                format!("{indentation}return {}\n", self.generate_expression(value)?)
            }
            Statement::Return { value: None } => format!("{indentation}return\n"),
            Statement::Expression { expr } => {
                format!("{indentation}{}\n", self.generate_expression(expr)?)
            }
        };
        Ok(rendered)
    }

    pub fn generate_expression(&self, expr: &Expression) -> Result<String, GenerationError> {
        self.render_expression(expr, 0)
    }

    fn render_expression(
        &self,
        expr: &Expression,
        nesting: usize,
    ) -> Result<String, GenerationError> {
        if nesting > MAX_NESTING_DEPTH {
            return Err(GenerationError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        match expr {
            Expression::Logical { left, op, right } => {
                self.generate_binary(expr, left, logical_symbol(*op), right, nesting)
            }
            Expression::Comparison { left, op, right } => {
                self.generate_binary(expr, left, comparison_symbol(*op), right, nesting)
            }
            Expression::Additive { left, op, right } => {
                self.generate_binary(expr, left, additive_symbol(*op), right, nesting)
            }
            Expression::Multiplicative { left, op, right } => {
                self.generate_binary(expr, left, multiplicative_symbol(*op), right, nesting)
            }
            Expression::FuncCall { callee, args } => {
                let callee = identifier(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.render_expression(arg, nesting + 1))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                Ok(format!("{callee}({args})"))
            }
            Expression::Var(name) => Ok(identifier(name)?.to_string()),
            Expression::IntegerLiteral(value) => integer_literal(value).map(str::to_string),
            Expression::StringLiteral(value) => Ok(value.clone()),
            Expression::BooleanLiteral(true) => Ok("True".to_string()),
            Expression::BooleanLiteral(false) => Ok("False".to_string()),
        }
    }

    fn generate_binary(
        &self,
        parent: &Expression,
        left: &Expression,
        op: &str,
        right: &Expression,
        nesting: usize,
    ) -> Result<String, GenerationError> {
        let left = self.generate_operand(parent, left, false, nesting)?;
        let right = self.generate_operand(parent, right, true, nesting)?;
        Ok(format!("{left} {op} {right}"))
    }

    fn generate_operand(
        &self,
        parent: &Expression,
        child: &Expression,
        is_right: bool,
        nesting: usize,
    ) -> Result<String, GenerationError> {
        let rendered = self.render_expression(child, nesting + 1)?;
        if needs_parentheses(parent, child, is_right) {
            Ok(format!("({rendered})"))
        } else {
            Ok(rendered)
        }
    }
}

/// Higher binds tighter. Leaves and calls never need grouping.
fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Logical { op: LogicalOp::Or, .. } => 1,
        Expression::Logical { op: LogicalOp::And, .. } => 2,
        Expression::Comparison { op, .. } if op.is_equality() => 3,
        Expression::Comparison { .. } => 4,
        Expression::Additive { .. } => 5,
        Expression::Multiplicative { .. } => 6,
        _ => 7,
    }
}

fn needs_parentheses(parent: &Expression, child: &Expression, is_right: bool) -> bool {
    // Python chains comparisons, so `a < b < c` is not `(a < b) < c`.
    if matches!(parent, Expression::Comparison { .. })
        && matches!(child, Expression::Comparison { .. })
    {
        return true;
    }
    let (parent, child) = (precedence(parent), precedence(child));
    child < parent || (is_right && child == parent)
}

fn identifier(name: &str) -> Result<&str, GenerationError> {
    if RESERVED_WORDS.contains(&name) {
        return Err(GenerationError::ReservedWord {
            name: name.to_string(),
        });
    }
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(GenerationError::InvalidIdentifier {
            name: name.to_string(),
        });
    }
    Ok(name)
}

fn integer_literal(literal: &str) -> Result<&str, GenerationError> {
    if literal.len() > 1 && literal.starts_with('0') {
        return Err(GenerationError::LeadingZero {
            literal: literal.to_string(),
        });
    }
    Ok(literal)
}

fn logical_symbol(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "and",
        LogicalOp::Or => "or",
    }
}

fn comparison_symbol(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::StrictEqual | ComparisonOp::Equal => "==",
        ComparisonOp::StrictNotEqual | ComparisonOp::NotEqual => "!=",
        ComparisonOp::Greater => ">",
        ComparisonOp::GreaterEqual => ">=",
        ComparisonOp::Less => "<",
        ComparisonOp::LessEqual => "<=",
    }
}

fn additive_symbol(op: AdditiveOp) -> &'static str {
    match op {
        AdditiveOp::Add => "+",
        AdditiveOp::Subtract => "-",
    }
}

fn multiplicative_symbol(op: MultiplicativeOp) -> &'static str {
    match op {
        MultiplicativeOp::Multiply => "*",
        MultiplicativeOp::Divide => "/",
    }
}

/// Renders `file` with the default options.
pub fn generate(file: &File) -> Result<String, GenerationError> {
    Generator::default().generate(file)
}
