#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Source range of a token or node. `offset` and `len` count chars, which is what the
/// lexer walks and what diagnostics underline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub pos: Position,
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(pos: Position, offset: usize, len: usize) -> Self {
        Self { pos, offset, len }
    }

    pub fn dummy() -> Self {
        Self::new(Position::new(1, 1), 0, 0)
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Span from the start of `self` to the end of `other`.
    pub fn to(&self, other: Span) -> Span {
        let end = other.end().max(self.end());
        Span::new(self.pos, self.offset, end - self.offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(f64),
    String(String),
    Boolean(bool),
    Color(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Modulo,
            "==" => BinaryOp::Equals,
            "!=" => BinaryOp::NotEquals,
            "<" => BinaryOp::LessThan,
            ">" => BinaryOp::GreaterThan,
            "<=" => BinaryOp::LessOrEqual,
            ">=" => BinaryOp::GreaterOrEqual,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl AssignOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "=" => AssignOp::Assign,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Subtract,
            "*=" => AssignOp::Multiply,
            "/=" => AssignOp::Divide,
            "%=" => AssignOp::Modulo,
            _ => return None,
        };
        Some(op)
    }

    /// Arithmetic operator a compound assignment expands to.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Subtract => Some(BinaryOp::Subtract),
            AssignOp::Multiply => Some(BinaryOp::Multiply),
            AssignOp::Divide => Some(BinaryOp::Divide),
            AssignOp::Modulo => Some(BinaryOp::Modulo),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant {
        span: Span,
        value: Constant,
    },
    Identifier {
        span: Span,
        name: String,
    },
    Paren {
        span: Span,
        inner: Box<Expr>,
    },
    Unary {
        span: Span,
        op: UnaryOp,
        op_span: Span,
        operand: Box<Expr>,
    },
    Binary {
        span: Span,
        op: BinaryOp,
        op_span: Span,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        span: Span,
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Constant { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Paren { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub span: Span,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    Block(Vec<Statement>),
    If(Box<Statement>),
}

#[derive(Debug, Clone)]
pub enum Statement {
    VariableDeclaration {
        span: Span,
        name: String,
        name_span: Span,
        value: Expr,
    },
    Assignment {
        span: Span,
        name: String,
        name_span: Span,
        op: AssignOp,
        op_span: Span,
        value: Expr,
    },
    Return {
        span: Span,
        value: Expr,
    },
    FunctionDeclaration {
        span: Span,
        name: String,
        name_span: Span,
        params: Vec<Param>,
        body: Vec<Statement>,
    },
    Call {
        span: Span,
        name: String,
        args: Vec<Expr>,
    },
    If {
        span: Span,
        condition: Expr,
        then_body: Vec<Statement>,
        else_branch: Option<ElseBranch>,
    },
    Attribute {
        span: Span,
        name: String,
        name_span: Span,
    },
    Comment {
        span: Span,
        text: String,
    },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration { span, .. }
            | Statement::Assignment { span, .. }
            | Statement::Return { span, .. }
            | Statement::FunctionDeclaration { span, .. }
            | Statement::Call { span, .. }
            | Statement::If { span, .. }
            | Statement::Attribute { span, .. }
            | Statement::Comment { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub span: Span,
    pub lines: Vec<Statement>,
}
