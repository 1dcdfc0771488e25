// Integration tests for the Quill lexer and parser
//
// These tests feed complete source snippets through both front-end
// stages and check the statement shapes and the recorded diagnostics.
// The finer-grained precedence-insertion cases live next to the parser
// as unit tests.

use quill::ast::Kind;
use quill::lexer::tokenize;
use quill::parser::Parser;

fn parse(code: &str) -> (Vec<quill::ast::Node>, Vec<String>) {
    let (tokens, lex_diagnostics) = tokenize(code, "<test>");
    let mut parser = Parser::new(tokens, "<test>");
    let statements = parser.parse();
    let mut messages: Vec<String> = lex_diagnostics.iter().map(|d| d.message.clone()).collect();
    messages.extend(parser.diagnostics.iter().map(|d| d.message.clone()));
    (statements, messages)
}

#[test]
fn statements_split_on_semicolons() {
    let (statements, messages) = parse("a = 1; b = 2; c = a + b;");
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
    assert_eq!(statements.len(), 3);
    for statement in &statements {
        assert!(matches!(statement.kind, Kind::Assign));
    }
}

#[test]
fn block_statements_need_no_semicolon() {
    let (statements, messages) = parse("setup { x = 1; }\ny = 2;");
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
    assert_eq!(statements.len(), 2);
    assert!(matches!(statements[0].kind, Kind::Block { .. }));
    assert!(matches!(statements[1].kind, Kind::Assign));
}

#[test]
fn missing_semicolon_is_reported_at_end_of_input() {
    let (_, messages) = parse("a = 1");
    assert_eq!(messages, vec!["Missing ';' at end of statement."]);
}

#[test]
fn semicolon_inside_parentheses_is_rejected() {
    let (_, messages) = parse("x = (1; + 2);");
    assert!(
        messages.iter().any(|m| m == "Cannot have ';' inside parentheses."),
        "got {:?}",
        messages
    );
}

#[test]
fn double_else_is_rejected() {
    let (_, messages) = parse("if (true) { a = 1; } else { a = 2; } else { a = 3; }");
    assert!(
        messages.iter().any(|m| m == "Cannot have more than one 'else' branch."),
        "got {:?}",
        messages
    );
}

#[test]
fn parse_errors_do_not_poison_neighbors() {
    let (statements, messages) = parse("a = 1;\nb = );\nc = 3;");
    assert!(!messages.is_empty());
    let good: Vec<_> = statements
        .iter()
        .filter(|s| matches!(s.kind, Kind::Assign))
        .collect();
    assert_eq!(good.len(), 2);
}

#[test]
fn unterminated_string_is_a_lexical_error() {
    let (_, messages) = parse("x = \"abc;");
    assert!(
        messages.iter().any(|m| m.contains("Unterminated string")),
        "got {:?}",
        messages
    );
}

#[test]
fn nested_block_comments_lex_cleanly() {
    let (statements, messages) = parse("/* outer /* inner */ still outer */ x = 1;");
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
    assert_eq!(statements.len(), 1);
}

#[test]
fn assignment_binds_loosest() {
    let (statements, _) = parse("x = 1 + 2 * 3;");
    assert_eq!(statements.len(), 1);
    let root = &statements[0];
    assert!(matches!(root.kind, Kind::Assign));
    let rhs = root.right.as_deref().unwrap();
    assert!(matches!(rhs.kind, Kind::Plus));
    let product = rhs.right.as_deref().unwrap();
    assert!(matches!(product.kind, Kind::Star));
}

#[test]
fn scope_access_binds_tighter_than_arithmetic() {
    let (statements, _) = parse("x = a::b + 1;");
    let root = &statements[0];
    let rhs = root.right.as_deref().unwrap();
    assert!(matches!(rhs.kind, Kind::Plus));
    let left = rhs.left.as_deref().unwrap();
    assert!(matches!(left.kind, Kind::ScopeAccess));
}
