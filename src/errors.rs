// File: src/errors.rs
//
// Diagnostics for the Quill interpreter. Every pipeline stage (lexer,
// parser, evaluator) accumulates Diagnostic values instead of aborting;
// Display produces the stable bracket format tests assert on, render()
// adds terminal color.

use colored::Colorize;
use std::fmt;

/// Source position, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Eval,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Lexer => "Lexer",
            Stage::Parser => "Parser",
            Stage::Eval => "Eval",
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Stage::Lexer => "Lexical Error",
            Stage::Parser => "Syntax Error",
            Stage::Eval => "Evaluation Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A recorded problem: where it happened, which stage saw it, what went
/// wrong. `source` is the file name (or `<repl>`, `<test>`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub source: String,
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(stage: Stage, source: &str, location: SourceLocation, message: String) -> Self {
        Self { stage, severity: Severity::Error, source: source.to_string(), location, message }
    }

    pub fn warning(stage: Stage, source: &str, location: SourceLocation, message: String) -> Self {
        Self { stage, severity: Severity::Warning, source: source.to_string(), location, message }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn kind(&self) -> &'static str {
        match self.severity {
            Severity::Error => self.stage.kind(),
            Severity::Warning => "Warning",
        }
    }

    /// Colored rendering for terminals; same wording as Display.
    pub fn render(&self) -> String {
        let tag = format!("[{}]", self.stage.label());
        let kind = self.kind();
        let colored_kind = match self.severity {
            Severity::Error => kind.red().bold(),
            Severity::Warning => kind.yellow().bold(),
        };
        format!(
            "{} {} in '{}' @ {}: {}",
            tag.bright_blue(),
            colored_kind,
            self.source,
            self.location.to_string().dimmed(),
            self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {} in '{}' @ {}: {}",
            self.stage.label(),
            self.kind(),
            self.source,
            self.location,
            self.message
        )
    }
}

/// Levenshtein distance, used for "Did you mean?" suggestions on
/// undefined names.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(len1 + 1) {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = std::cmp::min(
                std::cmp::min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1),
                matrix[i - 1][j - 1] + cost,
            );
        }
    }

    matrix[len1][len2]
}

/// Closest candidate within distance 2, or None.
pub fn find_closest_match<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(target, candidate);
        if distance <= 2 && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.as_str());
        }
    }

    best_match
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_bracket_format() {
        let d = Diagnostic::error(
            Stage::Parser,
            "main.quill",
            SourceLocation::new(3, 7),
            "Missing ';' at end of statement.".to_string(),
        );
        assert_eq!(
            d.to_string(),
            "[Parser] Syntax Error in 'main.quill' @ (3, 7): Missing ';' at end of statement."
        );
    }

    #[test]
    fn warning_kind_overrides_stage_kind() {
        let d = Diagnostic::warning(
            Stage::Eval,
            "<test>",
            SourceLocation::new(1, 5),
            "Potential data loss casting 'float' to 'int'.".to_string(),
        );
        assert!(d.to_string().starts_with("[Eval] Warning in '<test>' @ (1, 5):"));
    }

    #[test]
    fn closest_match_within_two_edits() {
        let names = vec!["counter".to_string(), "total".to_string()];
        assert_eq!(find_closest_match("countr", &names), Some("counter"));
        assert_eq!(find_closest_match("xyz", &names), None);
    }
}
