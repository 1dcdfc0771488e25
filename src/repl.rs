// File: src/repl.rs
//
// Interactive REPL (Read-Eval-Print Loop) for the Quill programming
// language. Provides an interactive shell for executing Quill code with:
// - Multi-line input support for blocks, functions, and lists
// - Command history with up/down arrow navigation
// - Special commands (:help, :clear, :quit, :vars, :reset)
// - Persistent interpreter state across inputs

use crate::interpreter::{Interpreter, Value};
use crate::lexer;
use crate::parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// REPL session that maintains interpreter state and handles user
/// interaction.
pub struct Repl {
    interpreter: Interpreter,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { interpreter: Interpreter::with_source("<repl>"), editor })
    }

    fn show_banner(&self) {
        println!(
            "{}",
            format!("Quill v{} interactive shell", env!("CARGO_PKG_VERSION")).bright_cyan()
        );
        println!(
            "  Type {} for commands, {} to leave.",
            ":help".bright_yellow(),
            ":quit".bright_yellow()
        );
        println!("  Statements end with ';'; unclosed delimiters continue on the next line.");
        println!();
    }

    /// Starts the REPL loop.
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "quill> ".bright_green().to_string()
            } else {
                "....> ".bright_blue().to_string()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    // Commands only apply outside multi-line input.
                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_input_complete(&buffer) {
                        self.eval_input(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (use :quit or Ctrl+D to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles special REPL commands starting with ':'.
    /// Returns true to continue the loop, false to quit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" | ":exit" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":clear" | ":c" => {
                print!("\x1B[2J\x1B[1;1H");
                self.show_banner();
                true
            }
            ":vars" | ":v" => {
                self.show_variables();
                true
            }
            ":reset" | ":r" => {
                self.interpreter = Interpreter::with_source("<repl>");
                println!("{}", "Environment reset".bright_green());
                true
            }
            _ => {
                println!(
                    "{} Unknown command: {}. Type {} for available commands.",
                    "Error:".bright_red(),
                    cmd.bright_yellow(),
                    ":help".bright_yellow()
                );
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "REPL commands:".bright_cyan().bold());
        println!("  {}  or :h   Display this help message", ":help".bright_yellow());
        println!("  {}  or :q   Exit the REPL", ":quit".bright_yellow());
        println!("  {} or :c   Clear the screen", ":clear".bright_yellow());
        println!("  {}  or :v   Show global variables", ":vars".bright_yellow());
        println!("  {} or :r   Reset the interpreter", ":reset".bright_yellow());
        println!();
        println!("{}", "Examples:".bright_cyan().bold());
        println!("  {}", "quill> x = 42;".dimmed());
        println!("  {}", "quill> def greet(name) {".dimmed());
        println!("  {}", "....>     print(\"Hello,\", name);".dimmed());
        println!("  {}", "....> }".dimmed());
        println!("  {}", "quill> greet(\"World\");".dimmed());
        println!();
    }

    /// Lists the global bindings with their declared types.
    fn show_variables(&self) {
        println!();
        println!("{}", "Global variables:".bright_cyan().bold());
        let bindings = self.interpreter.globals();
        if bindings.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for binding in bindings {
            println!(
                "  {} {} = {}",
                binding.name.bright_yellow(),
                format!(": {}", binding.ty).dimmed(),
                binding.value.render(&self.interpreter.scopes)
            );
        }
        println!();
    }

    /// Runs one complete input against the persistent interpreter and
    /// echoes non-empty results.
    fn eval_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }

        let (tokens, lex_diagnostics) = lexer::tokenize(input, "<repl>");
        self.interpreter.diagnostics.extend(lex_diagnostics);
        let mut parser = parser::Parser::new(tokens, "<repl>");
        let statements = parser.parse();
        self.interpreter.diagnostics.append(&mut parser.diagnostics);

        let results = self.interpreter.run(&statements);
        for diagnostic in self.interpreter.diagnostics.drain(..) {
            eprintln!("{}", diagnostic.render());
        }
        for value in results {
            match value {
                Value::Empty | Value::Error => {}
                other => {
                    println!(
                        "{} {}",
                        "=>".bright_blue(),
                        other.render(&self.interpreter.scopes).bright_white()
                    );
                }
            }
        }
    }
}

/// True when every brace, bracket, and parenthesis is balanced and no
/// string or block comment is left open.
fn is_input_complete(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return true;
    }

    let mut braces = 0i32;
    let mut brackets = 0i32;
    let mut parens = 0i32;
    let mut in_string = false;
    let mut escape_next = false;
    let mut line_comment = false;
    let mut block_depth = 0usize;

    let mut chars = trimmed.chars().peekable();
    while let Some(ch) = chars.next() {
        if line_comment {
            if ch == '\n' {
                line_comment = false;
            }
            continue;
        }
        if block_depth > 0 {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                block_depth -= 1;
            } else if ch == '/' && chars.peek() == Some(&'*') {
                chars.next();
                block_depth += 1;
            }
            continue;
        }
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '/' if !in_string => match chars.peek() {
                Some('/') => {
                    chars.next();
                    line_comment = true;
                }
                Some('*') => {
                    chars.next();
                    block_depth = 1;
                }
                _ => {}
            },
            '{' if !in_string => braces += 1,
            '}' if !in_string => braces -= 1,
            '[' if !in_string => brackets += 1,
            ']' if !in_string => brackets -= 1,
            '(' if !in_string => parens += 1,
            ')' if !in_string => parens -= 1,
            _ => {}
        }
    }

    !in_string && block_depth == 0 && braces <= 0 && brackets <= 0 && parens <= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_input_is_complete() {
        assert!(is_input_complete("x = 1;"));
        assert!(is_input_complete("print([1, 2, 3]);"));
        assert!(is_input_complete(""));
    }

    #[test]
    fn open_delimiters_continue_input() {
        assert!(!is_input_complete("def f(a) {"));
        assert!(!is_input_complete("x = [1, 2,"));
        assert!(!is_input_complete("print(\"unterminated"));
    }

    #[test]
    fn comments_hide_delimiters() {
        assert!(is_input_complete("x = 1; // {"));
        assert!(is_input_complete("/* { [ ( */ y = 2;"));
        assert!(!is_input_complete("/* open comment"));
    }
}
