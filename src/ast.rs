// File: src/ast.rs
//
// AST definitions for the Quill programming language. A single Node type
// carries every construct: leaves hold their payload in Kind, operator
// nodes hold operands in left/right. The tree is read-only once the
// parser hands it over; evaluation never rewrites nodes.

/// One parsed tree node. `parenthesized` marks a completed `( ... )`
/// sub-expression so the folding pass treats it as a single atom;
/// `postfix` marks operators that take the earlier tree as their RIGHT
/// operand when claiming the root during insertion; no current operator
/// sets it, but the insertion rule is defined over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Kind,
    pub line: usize,
    pub column: usize,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
    pub parenthesized: bool,
    pub postfix: bool,
}

impl Node {
    pub fn new(kind: Kind, line: usize, column: usize) -> Self {
        Self { kind, line, column, left: None, right: None, parenthesized: false, postfix: false }
    }

    pub fn with_right(kind: Kind, line: usize, column: usize, right: Node) -> Self {
        let mut node = Self::new(kind, line, column);
        node.right = Some(Box::new(right));
        node
    }

    pub fn is_operator(&self) -> bool {
        self.kind.op_symbol().is_some()
    }
}

/// A user-defined function: parameter names plus an immutable body that
/// is re-executed for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

/// One arm of an if/else chain; `cond` is None for the trailing `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub cond: Option<Node>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// Placeholder: empty fold root, valueless statement result.
    Empty,
    /// Poisoned subtree left behind by error recovery.
    Error,

    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ident(String),

    // Binary operators; operands in left/right.
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    ScopeAccess,
    // Unary operators; operand in right.
    Pos,
    Neg,

    List(Vec<Node>),
    Block { name: Option<String>, body: Vec<Node> },
    FuncDef(FuncDef),
    TypeDef { name: String, body: Vec<Node> },
    Call { name: String, args: Vec<Node> },
    Return(Option<Box<Node>>),
    Break,
    BreakAll,
    While { cond: Box<Node>, body: Vec<Node> },
    If { branches: Vec<IfBranch> },

    /// Raw-list terminator emitted by the statement builder; folds away.
    EndOfExpr,
}

impl Kind {
    /// Printable symbol for operator kinds, used in diagnostics.
    pub fn op_symbol(&self) -> Option<&'static str> {
        match self {
            Kind::Assign => Some("="),
            Kind::Plus => Some("+"),
            Kind::Minus => Some("-"),
            Kind::Star => Some("*"),
            Kind::Slash => Some("/"),
            Kind::EqEq => Some("=="),
            Kind::NotEq => Some("!="),
            Kind::ScopeAccess => Some("::"),
            Kind::Pos => Some("+"),
            Kind::Neg => Some("-"),
            _ => None,
        }
    }
}

/// Static binding strength. HIGHER values sit closer to the root of the
/// statement tree (bind looser); atoms are 1. The fold inserts a node
/// above the root when its precedence is >= the root's, which is what
/// makes later same-precedence operators claim earlier ones as their
/// left operand.
pub fn precedence(kind: &Kind) -> u32 {
    match kind {
        Kind::Assign => 300,
        Kind::EqEq | Kind::NotEq => 100,
        Kind::Plus | Kind::Minus => 40,
        Kind::Star | Kind::Slash => 30,
        Kind::Pos | Kind::Neg => 20,
        Kind::ScopeAccess => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_binds_loosest() {
        assert!(precedence(&Kind::Assign) > precedence(&Kind::EqEq));
        assert!(precedence(&Kind::EqEq) > precedence(&Kind::Plus));
        assert!(precedence(&Kind::Plus) > precedence(&Kind::Star));
        assert!(precedence(&Kind::Star) > precedence(&Kind::Neg));
        assert!(precedence(&Kind::Neg) > precedence(&Kind::ScopeAccess));
    }

    #[test]
    fn atoms_share_the_floor() {
        assert_eq!(precedence(&Kind::Int(1)), 1);
        assert_eq!(precedence(&Kind::Ident("x".to_string())), 1);
        assert_eq!(precedence(&Kind::List(vec![])), 1);
        assert_eq!(precedence(&Kind::Call { name: "f".to_string(), args: vec![] }), 1);
    }
}
