// File: src/parser.rs
//
// Precedence-insertion parser for the Quill programming language.
// Transforms a token stream into a list of top-level AST nodes.
//
// Instead of recursive descent over a grammar, expressions are parsed in
// two passes per statement: a flat "raw" sequence of atoms is collected
// up to the statement terminator, then folded into a tree by inserting
// each node at the depth its static precedence selects. Composite forms
// (blocks, if/else, while, def, type, calls, lists) have dedicated
// sub-parsers that consume tokens directly and re-invoke atom collection
// and folding for their nested expressions.
//
// Brace-terminated forms rewrite their closing `}` token into an
// EndOfExpr terminator in place, which is why statements ending in a
// block need no trailing `;`.
//
// Syntax errors are recorded with their position; the cursor skips to a
// recovery token and the malformed construct becomes an Error node, so
// every later statement still parses.

use crate::ast::{precedence, FuncDef, IfBranch, Kind, Node};
use crate::errors::{Diagnostic, SourceLocation, Stage};
use crate::lexer::{Token, TokenKind};

/// Parser maintains a cursor into the token stream and accumulates
/// diagnostics instead of failing fast.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    source: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_name: &str) -> Self {
        Parser { tokens, index: 0, source: source_name.to_string(), diagnostics: Vec::new() }
    }

    /// Parses the whole stream into top-level statements.
    pub fn parse(&mut self) -> Vec<Node> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            match self.peek().kind {
                TokenKind::Semicolon | TokenKind::EndOfExpr => self.advance(),
                _ => {
                    let raw = self.build_expression();
                    let statement = self.fold_expression(raw);
                    if !matches!(statement.kind, Kind::Empty) {
                        statements.push(statement);
                    }
                }
            }
        }
        statements
    }

    // ----- cursor helpers -----

    fn peek(&self) -> &Token {
        // The stream always ends with Eof, so the clamp only matters
        // after over-eager recovery.
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() {
            self.index += 1;
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn location(&self) -> (usize, usize) {
        let token = self.peek();
        (token.line, token.column)
    }

    // ----- error recovery -----

    fn record_error(&mut self, line: usize, column: usize, message: String) {
        self.diagnostics.push(Diagnostic::error(
            Stage::Parser,
            &self.source,
            SourceLocation::new(line, column),
            message,
        ));
    }

    /// Records a syntax error, skips ahead until the cursor sits on
    /// `recovery` (or Eof), and returns a poisoned node for the spot.
    fn error_and_skip_to(
        &mut self,
        recovery: TokenKind,
        line: usize,
        column: usize,
        message: String,
    ) -> Node {
        self.record_error(line, column, message);
        while !self.at_eof() && self.peek().kind != recovery {
            self.advance();
        }
        Node::new(Kind::Error, line, column)
    }

    // ----- statement assembly -----

    /// Collects one statement's atoms up to `;`, an EndOfExpr terminator,
    /// or Eof (which is a missing-semicolon error for a non-empty
    /// statement). The returned list always ends with an EndOfExpr
    /// marker node.
    fn build_expression(&mut self) -> Vec<Node> {
        let mut raw = Vec::new();
        loop {
            let (line, column) = self.location();
            match self.peek().kind {
                TokenKind::Semicolon | TokenKind::EndOfExpr => {
                    self.advance();
                    raw.push(Node::new(Kind::EndOfExpr, line, column));
                    return raw;
                }
                TokenKind::Eof => {
                    if !raw.is_empty() {
                        self.record_error(
                            line,
                            column,
                            "Missing ';' at end of statement.".to_string(),
                        );
                        raw.clear();
                        raw.push(Node::new(Kind::Error, line, column));
                    }
                    raw.push(Node::new(Kind::EndOfExpr, line, column));
                    return raw;
                }
                _ => {
                    let atom = self.parse_atom();
                    raw.push(atom);
                }
            }
        }
    }

    /// Folds a raw atom list into a single tree. An Error atom aborts the
    /// fold and poisons the whole statement.
    fn fold_expression(&mut self, raw: Vec<Node>) -> Node {
        let (line, column) =
            raw.first().map(|node| (node.line, node.column)).unwrap_or((0, 0));
        let mut root = Node::new(Kind::Empty, line, column);
        for node in raw {
            match node.kind {
                Kind::EndOfExpr => break,
                Kind::Error => return node,
                _ => insert_in_ast(&mut root, node),
            }
        }
        root
    }

    // ----- atoms -----

    fn parse_atom(&mut self) -> Node {
        let token = self.peek().clone();
        let (line, column) = (token.line, token.column);

        match token.kind {
            TokenKind::Ident(name) => match name.as_str() {
                "if" => self.parse_if_chain(),
                "while" => self.parse_while(),
                "def" => self.parse_func_def(),
                "type" => self.parse_type_def(),
                "return" => self.parse_return(),
                "break" => {
                    self.advance();
                    Node::new(Kind::Break, line, column)
                }
                "break_all" => {
                    self.advance();
                    Node::new(Kind::BreakAll, line, column)
                }
                "else" => self.error_and_skip_to(
                    TokenKind::Semicolon,
                    line,
                    column,
                    "Unexpected 'else' without a preceding 'if'.".to_string(),
                ),
                _ => match self.peek_at(1).map(|t| &t.kind) {
                    Some(TokenKind::LBrace) => self.parse_named_block(name),
                    Some(TokenKind::LParen) => self.parse_call(name),
                    _ => {
                        self.advance();
                        Node::new(Kind::Ident(name), line, column)
                    }
                },
            },

            TokenKind::Int(value) => {
                self.advance();
                Node::new(Kind::Int(value), line, column)
            }
            TokenKind::Float(value) => {
                self.advance();
                Node::new(Kind::Float(value), line, column)
            }
            TokenKind::Bool(value) => {
                self.advance();
                Node::new(Kind::Bool(value), line, column)
            }
            TokenKind::Str(value) => {
                self.advance();
                Node::new(Kind::Str(value), line, column)
            }

            TokenKind::LBracket => self.parse_list(),
            TokenKind::LParen => self.parse_paren(),
            TokenKind::LBrace => {
                let body = self.parse_block();
                Node::new(Kind::Block { name: None, body }, line, column)
            }

            TokenKind::Plus | TokenKind::Minus if self.at_unary_position() => self.parse_unary(),

            TokenKind::Assign
            | TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::ColonColon => {
                self.advance();
                let kind = match token.kind {
                    TokenKind::Assign => Kind::Assign,
                    TokenKind::EqEq => Kind::EqEq,
                    TokenKind::NotEq => Kind::NotEq,
                    TokenKind::Plus => Kind::Plus,
                    TokenKind::Minus => Kind::Minus,
                    TokenKind::Star => Kind::Star,
                    TokenKind::Slash => Kind::Slash,
                    _ => Kind::ScopeAccess,
                };
                Node::new(kind, line, column)
            }

            TokenKind::Error => {
                self.advance();
                Node::new(Kind::Error, line, column)
            }

            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket | TokenKind::Comma => {
                let symbol = match token.kind {
                    TokenKind::RParen => ")",
                    TokenKind::RBrace => "}",
                    TokenKind::RBracket => "]",
                    _ => ",",
                };
                self.advance();
                self.error_and_skip_to(
                    TokenKind::Semicolon,
                    line,
                    column,
                    format!("Unexpected '{}'.", symbol),
                )
            }

            // build_expression never hands these to parse_atom.
            TokenKind::Semicolon | TokenKind::EndOfExpr | TokenKind::Eof => {
                self.advance();
                Node::new(Kind::Empty, line, column)
            }
        }
    }

    /// A `+`/`-` is a unary prefix when nothing that could serve as a
    /// left operand precedes it.
    fn at_unary_position(&self) -> bool {
        if self.index == 0 {
            return true;
        }
        let prev = &self.tokens[self.index - 1];
        prev.is_op()
            || matches!(
                prev.kind,
                TokenKind::Semicolon
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
                    | TokenKind::Comma
                    | TokenKind::EndOfExpr
            )
    }

    fn parse_unary(&mut self) -> Node {
        let token = self.peek().clone();
        let kind = if token.kind == TokenKind::Plus { Kind::Pos } else { Kind::Neg };
        self.advance();
        let operand = self.parse_atom();
        Node::with_right(kind, token.line, token.column, operand)
    }

    // ----- composite forms -----

    /// `( expr )` — the result is marked parenthesized so the fold treats
    /// it as one atom.
    fn parse_paren(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // (
        let mut root = Node::new(Kind::Empty, line, column);
        loop {
            let (at_line, at_column) = self.location();
            match self.peek().kind {
                TokenKind::RParen => {
                    self.advance();
                    root.parenthesized = true;
                    return root;
                }
                TokenKind::Semicolon => {
                    return self.error_and_skip_to(
                        TokenKind::Semicolon,
                        at_line,
                        at_column,
                        "Cannot have ';' inside parentheses.".to_string(),
                    );
                }
                TokenKind::Eof => {
                    self.record_error(line, column, "Missing ')'.".to_string());
                    return Node::new(Kind::Error, line, column);
                }
                _ => {
                    let atom = self.parse_atom();
                    if matches!(atom.kind, Kind::Error) {
                        return atom;
                    }
                    insert_in_ast(&mut root, atom);
                }
            }
        }
    }

    /// `[ item, item, ... ]` with each item a full folded expression.
    fn parse_list(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // [
        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RBracket => {
                    self.advance();
                    return Node::new(Kind::List(items), line, column);
                }
                TokenKind::Comma => self.advance(),
                TokenKind::Eof => {
                    self.record_error(line, column, "Missing ']'.".to_string());
                    return Node::new(Kind::Error, line, column);
                }
                _ => {
                    let item = self.parse_list_item();
                    match item.kind {
                        Kind::Error => return item,
                        Kind::Empty => {}
                        _ => items.push(item),
                    }
                }
            }
        }
    }

    fn parse_list_item(&mut self) -> Node {
        let (line, column) = self.location();
        let mut root = Node::new(Kind::Empty, line, column);
        loop {
            let (at_line, at_column) = self.location();
            match self.peek().kind {
                TokenKind::Comma | TokenKind::RBracket => return root,
                TokenKind::Semicolon => {
                    return self.error_and_skip_to(
                        TokenKind::Semicolon,
                        at_line,
                        at_column,
                        "Unexpected ';' inside a list.".to_string(),
                    );
                }
                TokenKind::Eof => {
                    self.record_error(line, column, "Missing ']'.".to_string());
                    return Node::new(Kind::Error, line, column);
                }
                _ => {
                    let atom = self.parse_atom();
                    if matches!(atom.kind, Kind::Error) {
                        return atom;
                    }
                    insert_in_ast(&mut root, atom);
                }
            }
        }
    }

    /// `name ( arg, arg, ... )`.
    fn parse_call(&mut self, name: String) -> Node {
        let (line, column) = self.location();
        self.advance(); // name
        self.advance(); // (
        let mut args = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RParen => {
                    self.advance();
                    return Node::new(Kind::Call { name, args }, line, column);
                }
                TokenKind::Comma => self.advance(),
                TokenKind::Eof | TokenKind::Semicolon => {
                    self.record_error(line, column, "Missing ')'.".to_string());
                    return Node::new(Kind::Error, line, column);
                }
                _ => {
                    let arg = self.parse_call_arg();
                    match arg.kind {
                        Kind::Error => return arg,
                        Kind::Empty => {}
                        _ => args.push(arg),
                    }
                }
            }
        }
    }

    fn parse_call_arg(&mut self) -> Node {
        let (line, column) = self.location();
        let mut root = Node::new(Kind::Empty, line, column);
        loop {
            match self.peek().kind {
                TokenKind::Comma | TokenKind::RParen | TokenKind::Semicolon | TokenKind::Eof => {
                    return root;
                }
                _ => {
                    let atom = self.parse_atom();
                    if matches!(atom.kind, Kind::Error) {
                        return atom;
                    }
                    insert_in_ast(&mut root, atom);
                }
            }
        }
    }

    /// Statement list between `{` and `}`. Leaves the cursor ON the
    /// closing brace, rewritten in place to EndOfExpr so the enclosing
    /// statement terminates without a `;`.
    fn parse_block(&mut self) -> Vec<Node> {
        let (line, column) = self.location();
        if self.peek().kind != TokenKind::LBrace {
            let error = self.error_and_skip_to(
                TokenKind::Semicolon,
                line,
                column,
                "Expected '{'.".to_string(),
            );
            return vec![error];
        }
        self.advance(); // {
        let mut body = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RBrace => {
                    self.tokens[self.index].kind = TokenKind::EndOfExpr;
                    return body;
                }
                TokenKind::Eof => {
                    self.record_error(line, column, "Missing '}'.".to_string());
                    body.push(Node::new(Kind::Error, line, column));
                    return body;
                }
                TokenKind::Semicolon | TokenKind::EndOfExpr => self.advance(),
                _ => {
                    let raw = self.build_expression();
                    let statement = self.fold_expression(raw);
                    if !matches!(statement.kind, Kind::Empty) {
                        body.push(statement);
                    }
                }
            }
        }
    }

    fn parse_named_block(&mut self, name: String) -> Node {
        let (line, column) = self.location();
        self.advance(); // name
        let body = self.parse_block();
        Node::new(Kind::Block { name: Some(name), body }, line, column)
    }

    /// `def name(p1, p2) { body }`.
    fn parse_func_def(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // def

        let name = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            _ => {
                return self.error_and_skip_to(
                    TokenKind::Semicolon,
                    line,
                    column,
                    "Expected a function name after 'def'.".to_string(),
                );
            }
        };

        if self.peek().kind != TokenKind::LParen {
            return self.error_and_skip_to(
                TokenKind::Semicolon,
                line,
                column,
                format!("Expected '(' after function name '{}'.", name),
            );
        }
        self.advance(); // (

        let mut params = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::Comma => self.advance(),
                TokenKind::Ident(param) => {
                    params.push(param);
                    self.advance();
                }
                TokenKind::Eof => {
                    self.record_error(line, column, "Missing ')'.".to_string());
                    return Node::new(Kind::Error, line, column);
                }
                _ => {
                    return self.error_and_skip_to(
                        TokenKind::Semicolon,
                        line,
                        column,
                        "Function parameters must be identifiers.".to_string(),
                    );
                }
            }
        }

        let body = self.parse_block();
        if body_poisoned(&body) {
            return Node::new(Kind::Error, line, column);
        }
        Node::new(Kind::FuncDef(FuncDef { name, params, body }), line, column)
    }

    /// `type Name { body }`.
    fn parse_type_def(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // type

        let name = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            _ => {
                return self.error_and_skip_to(
                    TokenKind::Semicolon,
                    line,
                    column,
                    "Expected a type name after 'type'.".to_string(),
                );
            }
        };

        let body = self.parse_block();
        if body_poisoned(&body) {
            return Node::new(Kind::Error, line, column);
        }
        Node::new(Kind::TypeDef { name, body }, line, column)
    }

    /// `while (cond) { body }`.
    fn parse_while(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // while

        if self.peek().kind != TokenKind::LParen {
            return self.error_and_skip_to(
                TokenKind::Semicolon,
                line,
                column,
                "Expected '(' after 'while'.".to_string(),
            );
        }
        let cond = self.parse_paren();
        if matches!(cond.kind, Kind::Error) {
            return cond;
        }

        let body = self.parse_block();
        if body_poisoned(&body) {
            return Node::new(Kind::Error, line, column);
        }
        Node::new(Kind::While { cond: Box::new(cond), body }, line, column)
    }

    /// `if (cond) { .. } else if (cond) { .. } else { .. }` with at most
    /// one trailing else. Leaves the cursor on the final EndOfExpr.
    fn parse_if_chain(&mut self) -> Node {
        let (line, column) = self.location();
        let mut branches = Vec::new();

        match self.parse_if_branch() {
            Ok(branch) => branches.push(branch),
            Err(error) => return error,
        }

        loop {
            let next_is_else = matches!(
                self.peek_at(1).map(|t| &t.kind),
                Some(TokenKind::Ident(name)) if name == "else"
            );
            if !next_is_else {
                break;
            }
            match self.peek_at(2).map(|t| t.kind.clone()) {
                Some(TokenKind::Ident(name)) if name == "if" => {
                    self.advance(); // EndOfExpr of the previous branch
                    self.advance(); // else
                    match self.parse_if_branch() {
                        Ok(branch) => branches.push(branch),
                        Err(error) => return error,
                    }
                }
                Some(TokenKind::LBrace) => {
                    let (else_line, else_column) = self
                        .peek_at(1)
                        .map(|t| (t.line, t.column))
                        .unwrap_or((line, column));
                    self.advance(); // EndOfExpr of the previous branch
                    self.advance(); // else
                    let body = self.parse_block();
                    if body_poisoned(&body) {
                        return Node::new(Kind::Error, else_line, else_column);
                    }
                    branches.push(IfBranch { cond: None, body });
                    if matches!(
                        self.peek_at(1).map(|t| &t.kind),
                        Some(TokenKind::Ident(name)) if name == "else"
                    ) {
                        self.advance();
                        return self.error_and_skip_to(
                            TokenKind::Semicolon,
                            else_line,
                            else_column,
                            "Cannot have more than one 'else' branch.".to_string(),
                        );
                    }
                    break;
                }
                _ => {
                    let (else_line, else_column) = self
                        .peek_at(1)
                        .map(|t| (t.line, t.column))
                        .unwrap_or((line, column));
                    self.advance();
                    return self.error_and_skip_to(
                        TokenKind::Semicolon,
                        else_line,
                        else_column,
                        "Expected '{' or 'if' after 'else'.".to_string(),
                    );
                }
            }
        }

        Node::new(Kind::If { branches }, line, column)
    }

    fn parse_if_branch(&mut self) -> Result<IfBranch, Node> {
        let (line, column) = self.location();
        self.advance(); // if

        if self.peek().kind != TokenKind::LParen {
            return Err(self.error_and_skip_to(
                TokenKind::Semicolon,
                line,
                column,
                "Expected '(' after 'if'.".to_string(),
            ));
        }
        let cond = self.parse_paren();
        if matches!(cond.kind, Kind::Error) {
            return Err(cond);
        }

        let body = self.parse_block();
        if body_poisoned(&body) {
            return Err(Node::new(Kind::Error, line, column));
        }
        Ok(IfBranch { cond: Some(cond), body })
    }

    /// `return;` or `return expr;`.
    fn parse_return(&mut self) -> Node {
        let (line, column) = self.location();
        self.advance(); // return

        let mut root = Node::new(Kind::Empty, line, column);
        loop {
            match self.peek().kind {
                TokenKind::Semicolon | TokenKind::EndOfExpr | TokenKind::Eof => break,
                _ => {
                    let atom = self.parse_atom();
                    if matches!(atom.kind, Kind::Error) {
                        return atom;
                    }
                    insert_in_ast(&mut root, atom);
                }
            }
        }

        let value = match root.kind {
            Kind::Empty => None,
            _ => Some(Box::new(root)),
        };
        Node::new(Kind::Return(value), line, column)
    }
}

/// True when block recovery left a poisoned statement behind. A loop or
/// definition built on such a body must not reach the evaluator: a
/// `while` whose body failed to parse would otherwise spin forever.
fn body_poisoned(body: &[Node]) -> bool {
    body.iter().any(|statement| matches!(statement.kind, Kind::Error))
}

/// Inserts `node` into the tree rooted at `root`:
/// 1. an empty root is replaced by the node;
/// 2. a parenthesized root is claimed by the node as its operand;
/// 3. a parenthesized node descends into the root's right spine;
/// 4. a node whose precedence is >= the root's claims the root (so the
///    later of two equal-precedence operators wins the root — keep this
///    associativity exactly as is);
/// 5. anything else descends into the root's right spine and attaches at
///    the first empty slot.
pub fn insert_in_ast(root: &mut Node, node: Node) {
    // A bare Empty node carries nothing; only a parenthesized one (`()`)
    // is a real atom.
    if matches!(node.kind, Kind::Empty) && !node.parenthesized {
        return;
    }

    if matches!(root.kind, Kind::Empty) && !root.parenthesized {
        *root = node;
        return;
    }

    if root.parenthesized {
        claim_root(root, node);
        return;
    }

    if node.parenthesized {
        descend_right(root, node);
        return;
    }

    if precedence(&node.kind) >= precedence(&root.kind) {
        claim_root(root, node);
        return;
    }

    descend_right(root, node);
}

fn claim_root(root: &mut Node, node: Node) {
    let postfix = node.postfix;
    let prev = std::mem::replace(root, node);
    if postfix {
        root.right = Some(Box::new(prev));
    } else {
        root.left = Some(Box::new(prev));
    }
}

fn descend_right(root: &mut Node, node: Node) {
    match root.right.as_deref_mut() {
        Some(right) => insert_in_ast(right, node),
        None => root.right = Some(Box::new(node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> (Vec<Node>, Vec<Diagnostic>) {
        let (tokens, lex_diagnostics) = tokenize(source, "<test>");
        assert!(lex_diagnostics.is_empty(), "lex errors: {:?}", lex_diagnostics);
        let mut parser = Parser::new(tokens, "<test>");
        let statements = parser.parse();
        (statements, parser.diagnostics)
    }

    fn parse_one(source: &str) -> Node {
        let (statements, diagnostics) = parse_source(source);
        assert!(diagnostics.is_empty(), "parse errors: {:?}", diagnostics);
        assert_eq!(statements.len(), 1, "expected one statement: {:?}", statements);
        statements.into_iter().next().unwrap()
    }

    #[test]
    fn multiplication_binds_below_addition() {
        // 2 + 3 * 4 => +(2, *(3, 4))
        let root = parse_one("2 + 3 * 4;");
        assert_eq!(root.kind, Kind::Plus);
        assert_eq!(root.left.as_ref().unwrap().kind, Kind::Int(2));
        let right = root.right.as_ref().unwrap();
        assert_eq!(right.kind, Kind::Star);
        assert_eq!(right.left.as_ref().unwrap().kind, Kind::Int(3));
        assert_eq!(right.right.as_ref().unwrap().kind, Kind::Int(4));
    }

    #[test]
    fn later_same_precedence_operator_claims_the_root() {
        // 10 - 4 - 3 => -( -(10, 4), 3)
        let root = parse_one("10 - 4 - 3;");
        assert_eq!(root.kind, Kind::Minus);
        assert_eq!(root.right.as_ref().unwrap().kind, Kind::Int(3));
        let left = root.left.as_ref().unwrap();
        assert_eq!(left.kind, Kind::Minus);
        assert_eq!(left.left.as_ref().unwrap().kind, Kind::Int(10));
        assert_eq!(left.right.as_ref().unwrap().kind, Kind::Int(4));
    }

    #[test]
    fn chained_assignment_nests_in_the_target() {
        // a = b = 1 => =( =(a, b), 1); the outer target is not a name.
        let root = parse_one("a = b = 1;");
        assert_eq!(root.kind, Kind::Assign);
        assert_eq!(root.right.as_ref().unwrap().kind, Kind::Int(1));
        let left = root.left.as_ref().unwrap();
        assert_eq!(left.kind, Kind::Assign);
        assert_eq!(left.left.as_ref().unwrap().kind, Kind::Ident("a".to_string()));
        assert_eq!(left.right.as_ref().unwrap().kind, Kind::Ident("b".to_string()));
    }

    #[test]
    fn parenthesized_expression_binds_as_one_atom() {
        // (2 + 3) * 4 => *(+(2, 3), 4)
        let root = parse_one("(2 + 3) * 4;");
        assert_eq!(root.kind, Kind::Star);
        let left = root.left.as_ref().unwrap();
        assert!(left.parenthesized);
        assert_eq!(left.kind, Kind::Plus);
        assert_eq!(root.right.as_ref().unwrap().kind, Kind::Int(4));
    }

    #[test]
    fn scope_access_binds_tightest() {
        // x = a::b + 1 => =(x, +(::(a, b), 1))
        let root = parse_one("x = a::b + 1;");
        assert_eq!(root.kind, Kind::Assign);
        let rhs = root.right.as_ref().unwrap();
        assert_eq!(rhs.kind, Kind::Plus);
        let access = rhs.left.as_ref().unwrap();
        assert_eq!(access.kind, Kind::ScopeAccess);
        assert_eq!(access.left.as_ref().unwrap().kind, Kind::Ident("a".to_string()));
        assert_eq!(access.right.as_ref().unwrap().kind, Kind::Ident("b".to_string()));
    }

    #[test]
    fn nested_scope_access_chains_left() {
        // a::b::c => ::( ::(a, b), c)
        let root = parse_one("a::b::c;");
        assert_eq!(root.kind, Kind::ScopeAccess);
        assert_eq!(root.right.as_ref().unwrap().kind, Kind::Ident("c".to_string()));
        let left = root.left.as_ref().unwrap();
        assert_eq!(left.kind, Kind::ScopeAccess);
    }

    #[test]
    fn leading_minus_is_unary() {
        let root = parse_one("x = -5;");
        let rhs = root.right.as_ref().unwrap();
        assert_eq!(rhs.kind, Kind::Neg);
        assert!(rhs.left.is_none());
        assert_eq!(rhs.right.as_ref().unwrap().kind, Kind::Int(5));
    }

    #[test]
    fn unary_after_operator_and_in_lists() {
        let root = parse_one("x = 1 - -2;");
        let rhs = root.right.as_ref().unwrap();
        assert_eq!(rhs.kind, Kind::Minus);
        assert_eq!(rhs.right.as_ref().unwrap().kind, Kind::Neg);

        let list = parse_one("l = [-1, +2];");
        match &list.right.as_ref().unwrap().kind {
            Kind::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].kind, Kind::Neg);
                assert_eq!(items[1].kind, Kind::Pos);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn list_items_are_full_expressions() {
        let root = parse_one("l = [1 + 2, \"a\"];");
        match &root.right.as_ref().unwrap().kind {
            Kind::List(items) => {
                assert_eq!(items[0].kind, Kind::Plus);
                assert_eq!(items[1].kind, Kind::Str("a".to_string()));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn block_terminated_statement_needs_no_semicolon() {
        let (statements, diagnostics) = parse_source("counters { n = 0; }\nx = 1;");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(statements.len(), 2);
        match &statements[0].kind {
            Kind::Block { name: Some(name), body } => {
                assert_eq!(name, "counters");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected named block, got {:?}", other),
        }
    }

    #[test]
    fn parses_function_definition() {
        let root = parse_one("def add(a, b) { return a + b; }");
        match root.kind {
            Kind::FuncDef(def) => {
                assert_eq!(def.name, "add");
                assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(def.body.len(), 1);
                assert!(matches!(def.body[0].kind, Kind::Return(Some(_))));
            }
            other => panic!("expected func def, got {:?}", other),
        }
    }

    #[test]
    fn parses_if_else_chain() {
        let root = parse_one("if (a == 1) { x = 1; } else if (a == 2) { x = 2; } else { x = 3; }");
        match root.kind {
            Kind::If { branches } => {
                assert_eq!(branches.len(), 3);
                assert!(branches[0].cond.is_some());
                assert!(branches[1].cond.is_some());
                assert!(branches[2].cond.is_none());
            }
            other => panic!("expected if chain, got {:?}", other),
        }
    }

    #[test]
    fn double_else_is_a_syntax_error() {
        let (_, diagnostics) =
            parse_source("if (true) { x = 1; } else { x = 2; } else { x = 3; };");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("more than one 'else'")));
    }

    #[test]
    fn parses_while_loop() {
        let root = parse_one("while (i != 10) { i = i + 1; }");
        match root.kind {
            Kind::While { cond, body } => {
                assert_eq!(cond.kind, Kind::NotEq);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn semicolon_inside_parentheses_is_an_error() {
        let (_, diagnostics) = parse_source("x = (1 + 2;);");
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "Cannot have ';' inside parentheses."));
    }

    #[test]
    fn missing_semicolon_is_reported_with_position() {
        let (_, diagnostics) = parse_source("x = 1");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .to_string()
            .starts_with("[Parser] Syntax Error in '<test>'"));
        assert!(diagnostics[0].message.contains("Missing ';'"));
    }

    #[test]
    fn bad_statement_does_not_hide_later_statements() {
        let (statements, diagnostics) = parse_source("a = 1;\nb = );\nc = 3;");
        assert!(!diagnostics.is_empty());
        let sound: Vec<_> = statements
            .iter()
            .filter(|s| !matches!(s.kind, Kind::Error))
            .collect();
        assert_eq!(sound.len(), 2);
    }

    #[test]
    fn while_without_a_braced_body_is_poisoned() {
        let (statements, diagnostics) = parse_source("while (true) x = 1;");
        assert!(diagnostics.iter().any(|d| d.message == "Expected '{'."));
        assert!(statements.iter().all(|s| !matches!(s.kind, Kind::While { .. })));
        assert!(statements.iter().any(|s| matches!(s.kind, Kind::Error)));
    }

    #[test]
    fn definitions_with_unparsed_bodies_are_poisoned() {
        let (statements, _) = parse_source("def f() return 1;\ntype point x = 0;\nif (true) y = 2;");
        for statement in &statements {
            assert!(
                matches!(statement.kind, Kind::Error),
                "expected poisoned statement, got {:?}",
                statement.kind
            );
        }
    }

    #[test]
    fn calls_parse_nested_argument_expressions() {
        let root = parse_one("print(1 + 2, f(3));");
        match root.kind {
            Kind::Call { name, args } => {
                assert_eq!(name, "print");
                assert_eq!(args.len(), 2);
                assert_eq!(args[0].kind, Kind::Plus);
                assert!(matches!(args[1].kind, Kind::Call { .. }));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }
}
