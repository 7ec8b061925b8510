use serde::Serialize;

/// The root of every parsed program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct File {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct If {
    pub condition: Expression,
    pub then_body: Vec<Statement>,
    /// `else if` is stored as an else body holding a single nested `If`.
    pub else_body: Option<Vec<Statement>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Statement {
    Function(Function),
    If(If),
    Print {
        value: Expression,
    },
    VarDecl {
        name: String,
        value: Expression,
    },
    Assignment {
        name: String,
        value: Expression,
    },
    Return {
        value: Option<Expression>,
    },
    Expression {
        expr: Expression,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Expression {
    Logical {
        left: Box<Expression>,
        op: LogicalOp,
        right: Box<Expression>,
    },
    Comparison {
        left: Box<Expression>,
        op: ComparisonOp,
        right: Box<Expression>,
    },
    Additive {
        left: Box<Expression>,
        op: AdditiveOp,
        right: Box<Expression>,
    },
    Multiplicative {
        left: Box<Expression>,
        op: MultiplicativeOp,
        right: Box<Expression>,
    },
    FuncCall {
        callee: String,
        args: Vec<Expression>,
    },
    Var(String),
    IntegerLiteral(String),
    /// Holds the literal including its quotes.
    StringLiteral(String),
    BooleanLiteral(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ComparisonOp {
    StrictEqual,
    StrictNotEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl ComparisonOp {
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            ComparisonOp::StrictEqual
                | ComparisonOp::StrictNotEqual
                | ComparisonOp::Equal
                | ComparisonOp::NotEqual
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AdditiveOp {
    Add,
    Subtract,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MultiplicativeOp {
    Multiply,
    Divide,
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Var(name.into())
    }

    pub fn integer(value: impl Into<String>) -> Self {
        Expression::IntegerLiteral(value.into())
    }

    pub fn additive(left: Expression, op: AdditiveOp, right: Expression) -> Self {
        Expression::Additive {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn multiplicative(left: Expression, op: MultiplicativeOp, right: Expression) -> Self {
        Expression::Multiplicative {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn comparison(left: Expression, op: ComparisonOp, right: Expression) -> Self {
        Expression::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn logical(left: Expression, op: LogicalOp, right: Expression) -> Self {
        Expression::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}
