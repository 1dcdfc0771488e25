// File: src/lexer.rs
//
// Hand-written scanner for Quill source. Produces a flat token stream
// with 1-based line/column positions; lexical problems are recorded as
// diagnostics and scanning continues, so one stray character never hides
// the rest of the file.

use crate::errors::{Diagnostic, SourceLocation, Stage};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),

    Assign,     // =
    EqEq,       // ==
    NotEq,      // !=
    Plus,
    Minus,
    Star,
    Slash,
    ColonColon, // ::

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,

    /// Statement terminator the parser writes over a closing `}` so
    /// brace-terminated forms need no trailing `;`. Never lexed.
    EndOfExpr,
    Error,
    Eof,
}

impl TokenKind {
    pub fn is_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::ColonColon
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }

    pub fn is_op(&self) -> bool {
        self.kind.is_op()
    }
}

/// Scans `source` into tokens, ending with an Eof token.
pub fn tokenize(source: &str, source_name: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut column = 1;

    let error = |line: usize, column: usize, message: String| {
        Diagnostic::error(Stage::Lexer, source_name, SourceLocation::new(line, column), message)
    };

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;
        let start_column = column;

        match c {
            '\n' => {
                line += 1;
                column = 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                column += 1;
                i += 1;
            }

            // Line and nestable block comments.
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                let mut depth = 1;
                i += 2;
                column += 2;
                while i < chars.len() && depth > 0 {
                    if chars[i] == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
                        depth += 1;
                        i += 2;
                        column += 2;
                    } else if chars[i] == '*' && i + 1 < chars.len() && chars[i + 1] == '/' {
                        depth -= 1;
                        i += 2;
                        column += 2;
                    } else {
                        if chars[i] == '\n' {
                            line += 1;
                            column = 1;
                        } else {
                            column += 1;
                        }
                        i += 1;
                    }
                }
                if depth > 0 {
                    diagnostics.push(error(
                        start_line,
                        start_column,
                        "Unterminated block comment.".to_string(),
                    ));
                }
            }

            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    ident.push(chars[i]);
                    i += 1;
                    column += 1;
                }
                let kind = match ident.as_str() {
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    _ => TokenKind::Ident(ident),
                };
                tokens.push(Token::new(kind, start_line, start_column));
            }

            c if c.is_ascii_digit() => {
                let mut literal = String::new();
                let mut dots = 0;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        // `1.` followed by a non-digit belongs to the next
                        // token, not this literal.
                        if i + 1 >= chars.len() || !chars[i + 1].is_ascii_digit() {
                            break;
                        }
                        dots += 1;
                    }
                    literal.push(chars[i]);
                    i += 1;
                    column += 1;
                }
                let kind = if dots > 1 {
                    diagnostics.push(error(
                        start_line,
                        start_column,
                        format!("Number '{}' has more than one decimal point.", literal),
                    ));
                    TokenKind::Error
                } else if dots == 1 {
                    match literal.parse::<f64>() {
                        Ok(v) => TokenKind::Float(v),
                        Err(_) => {
                            diagnostics.push(error(
                                start_line,
                                start_column,
                                format!("Malformed number '{}'.", literal),
                            ));
                            TokenKind::Error
                        }
                    }
                } else {
                    match literal.parse::<i64>() {
                        Ok(v) => TokenKind::Int(v),
                        Err(_) => {
                            diagnostics.push(error(
                                start_line,
                                start_column,
                                format!("Integer '{}' is out of range.", literal),
                            ));
                            TokenKind::Error
                        }
                    }
                };
                tokens.push(Token::new(kind, start_line, start_column));
            }

            '"' => {
                let mut text = String::new();
                let mut closed = false;
                i += 1;
                column += 1;
                while i < chars.len() {
                    match chars[i] {
                        '"' => {
                            closed = true;
                            i += 1;
                            column += 1;
                            break;
                        }
                        '\\' if i + 1 < chars.len() => {
                            let escaped = match chars[i + 1] {
                                'n' => '\n',
                                'r' => '\r',
                                't' => '\t',
                                '\\' => '\\',
                                '"' => '"',
                                other => {
                                    diagnostics.push(error(
                                        line,
                                        column,
                                        format!("Unknown escape sequence '\\{}'.", other),
                                    ));
                                    other
                                }
                            };
                            text.push(escaped);
                            i += 2;
                            column += 2;
                        }
                        '\n' => {
                            text.push('\n');
                            line += 1;
                            column = 1;
                            i += 1;
                        }
                        other => {
                            text.push(other);
                            column += 1;
                            i += 1;
                        }
                    }
                }
                if !closed {
                    diagnostics.push(error(
                        start_line,
                        start_column,
                        "Unterminated string literal.".to_string(),
                    ));
                }
                tokens.push(Token::new(TokenKind::Str(text), start_line, start_column));
            }

            '=' | '!' | ':' => {
                let two = if i + 1 < chars.len() { Some(chars[i + 1]) } else { None };
                let (kind, width) = match (c, two) {
                    ('=', Some('=')) => (TokenKind::EqEq, 2),
                    ('!', Some('=')) => (TokenKind::NotEq, 2),
                    (':', Some(':')) => (TokenKind::ColonColon, 2),
                    ('=', _) => (TokenKind::Assign, 1),
                    _ => {
                        diagnostics.push(error(
                            start_line,
                            start_column,
                            format!("Unexpected character '{}'.", c),
                        ));
                        (TokenKind::Error, 1)
                    }
                };
                i += width;
                column += width;
                tokens.push(Token::new(kind, start_line, start_column));
            }

            '+' | '-' | '*' | '/' | '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' => {
                let kind = match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ',' => TokenKind::Comma,
                    _ => TokenKind::Semicolon,
                };
                tokens.push(Token::new(kind, start_line, start_column));
                i += 1;
                column += 1;
            }

            other => {
                diagnostics.push(error(
                    start_line,
                    start_column,
                    format!("Unexpected character '{}'.", other),
                ));
                i += 1;
                column += 1;
            }
        }
    }

    tokens.push(Token::new(TokenKind::Eof, line, column));
    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = tokenize(source, "<test>");
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_assignment_statement() {
        assert_eq!(
            kinds("x = 41 + 1;"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Assign,
                TokenKind::Int(41),
                TokenKind::Plus,
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_two_char_operators() {
        assert_eq!(
            kinds("a == b != c::d"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::EqEq,
                TokenKind::Ident("b".to_string()),
                TokenKind::NotEq,
                TokenKind::Ident("c".to_string()),
                TokenKind::ColonColon,
                TokenKind::Ident("d".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_bools_and_floats() {
        assert_eq!(
            kinds("flag = true; pi = 3.14;"),
            vec![
                TokenKind::Ident("flag".to_string()),
                TokenKind::Assign,
                TokenKind::Bool(true),
                TokenKind::Semicolon,
                TokenKind::Ident("pi".to_string()),
                TokenKind::Assign,
                TokenKind::Float(3.14),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\n""#),
            vec![TokenKind::Str("a\tb\n".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn nested_block_comments() {
        assert_eq!(
            kinds("1 /* outer /* inner */ still out */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn double_dot_number_is_error_token() {
        let (tokens, diagnostics) = tokenize("x = 1.2.3;", "<test>");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Error));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().contains("more than one decimal point"));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, diagnostics) = tokenize("s = \"oops", "<test>");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().starts_with("[Lexer] Lexical Error in '<test>'"));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Str("oops".to_string())));
    }

    #[test]
    fn tracks_line_and_column() {
        let (tokens, _) = tokenize("a = 1;\n  b = 2;", "<test>");
        let b = tokens.iter().find(|t| t.kind == TokenKind::Ident("b".to_string()));
        let b = b.cloned().unwrap();
        assert_eq!((b.line, b.column), (2, 3));
    }
}
