//! A source-to-source transpiler from a small C-style scripting language to
//! Python.
//!
//! Translation runs as three full passes: [`scanner::scan`] turns text into
//! tokens, [`parser::parse`] builds a [`ast::File`], and
//! [`generator::generate`] renders that tree as Python.

pub mod ast;
pub mod diagnostics;
pub mod generator;
pub mod parser;
pub mod scanner;

use tracing::debug;

pub use generator::{GenerationError, Generator, GeneratorOptions, Indent};
pub use parser::ParseError;
pub use scanner::LexError;

#[derive(Debug, thiserror::Error)]
pub enum TranspileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Generate(#[from] GenerationError),
}

/// Runs the whole pipeline over `source`.
pub fn transpile(source: &str, options: &GeneratorOptions) -> Result<String, TranspileError> {
    let tokens = scanner::scan(source)?;
    debug!(token_count = tokens.len(), "Tokenized source");
    let file = parser::parse(tokens)?;
    debug!(statements = file.statements.len(), "Parsed source");
    let output = Generator::new(options).generate(&file)?;
    debug!(output_len = output.len(), "Generated target text");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpiles_prints_branches_and_calls() {
        let source = r#"
function greet(name, times) {
    if (times > 1) {
        print(name);
        greet(name, times - 1);
    } else {
        print("last");
    }
}

greet('hi', 2 + 1);
console.log((1 + 2) * 3);
"#;
        let output = transpile(source, &GeneratorOptions::default()).expect("transpile source");
        assert_eq!(
            output,
            concat!(
                "def greet(name, times):\n",
                "    if (times > 1):\n",
                "        print(name)\n",
                "        greet(name, times - 1)\n",
                "    else:\n",
                "        print(\"last\")\n",
                "\n",
                "greet('hi', 2 + 1)\n",
                "print((1 + 2) * 3)\n",
            )
        );
    }

    #[test]
    fn each_stage_error_is_wrapped() {
        let options = GeneratorOptions::default();
        assert!(matches!(
            transpile("print(@);", &options),
            Err(TranspileError::Lex(_))
        ));
        assert!(matches!(
            transpile("function f( {", &options),
            Err(TranspileError::Parse(_))
        ));
        assert!(matches!(
            transpile("var pass = 1;", &options),
            Err(TranspileError::Generate(_))
        ));
    }

    #[test]
    fn empty_source_produces_empty_output() {
        assert_eq!(
            transpile("  \n// nothing here\n", &GeneratorOptions::default())
                .expect("transpile source"),
            ""
        );
    }

    #[test]
    fn repeated_runs_are_independent() {
        let options = GeneratorOptions::default();
        let first = transpile("print(1);", &options).expect("first run");
        transpile("print(", &options).expect_err("broken input");
        let second = transpile("print(1);", &options).expect("second run");
        assert_eq!(first, second);
    }
}
