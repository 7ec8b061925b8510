use std::env;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, trace};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use jspy::diagnostics::{
    diagnostic_from_anyhow, diagnostic_from_generation_error, diagnostic_from_lex_error,
    diagnostic_from_parse_error, CompilerDiagnostic, DiagnosticStage,
};
use jspy::{ast, parser, scanner, Generator, GeneratorOptions, Indent};

fn main() -> anyhow::Result<()> {
    initialize_logging()?;

    let jspy = Jspy::parse();

    let result = match jspy.subcmd {
        JspySubcommand::Build(build) => run_build(&build).map(|_| ()),
        JspySubcommand::Tokens(dump) => dump_tokens(&dump.source).map(|json| println!("{json}")),
        JspySubcommand::Ast(dump) => dump_ast(&dump.source).map(|json| println!("{json}")),
    };

    if let Err(diagnostic) = result {
        eprintln!("{}", diagnostic.render_terminal_auto());
        std::process::exit(1);
    }

    Ok(())
}

fn run_build(build: &Build) -> Result<PathBuf, CompilerDiagnostic> {
    let source_path = build.source.as_path();
    let source = read_source(source_path)?;
    trace!(source_len = source.len(), "Read input file");

    let tokens = scanner::scan(&source)
        .map_err(|err| diagnostic_from_lex_error(&source, Some(source_path), &err))?;
    if let Some(emit_dir) = &build.emit_dir {
        std::fs::create_dir_all(emit_dir)
            .with_context(|| format!("failed to create {}", emit_dir.display()))
            .map_err(|err| io_diagnostic(&err))?;
        let tokens_path = emit_dir.join("tokens.json");
        write_json(&tokens_path, &tokens)?;
        trace!(tokens_path = %tokens_path.display(), "Tokenized source file");
    }

    let ast = parser::parse(tokens)
        .map_err(|err| diagnostic_from_parse_error(&source, Some(source_path), &err))?;
    if let Some(emit_dir) = &build.emit_dir {
        let ast_path = emit_dir.join("ast.json");
        write_json(&ast_path, &ast)?;
        debug!(ast_path = %ast_path.display(), "Parsed source file");
    }

    let output = Generator::new(&build.generator_options())
        .generate(&ast)
        .map_err(|err| diagnostic_from_generation_error(&source, Some(source_path), &err))?;

    let output_path = build
        .output
        .clone()
        .unwrap_or_else(|| source_path.with_extension("py"));
    std::fs::write(&output_path, output)
        .with_context(|| format!("failed to write {}", output_path.display()))
        .map_err(|err| io_diagnostic(&err))?;
    info!(output_path = %output_path.display(), "Python source written");

    Ok(output_path)
}

fn dump_tokens(source_path: &Path) -> Result<String, CompilerDiagnostic> {
    let source = read_source(source_path)?;
    let tokens = scanner::scan(&source)
        .map_err(|err| diagnostic_from_lex_error(&source, Some(source_path), &err))?;
    to_json(&tokens)
}

fn dump_ast(source_path: &Path) -> Result<String, CompilerDiagnostic> {
    let source = read_source(source_path)?;
    let ast = parse_source(&source, source_path)?;
    to_json(&ast)
}

fn parse_source(source: &str, source_path: &Path) -> Result<ast::File, CompilerDiagnostic> {
    let tokens = scanner::scan(source)
        .map_err(|err| diagnostic_from_lex_error(source, Some(source_path), &err))?;
    parser::parse(tokens)
        .map_err(|err| diagnostic_from_parse_error(source, Some(source_path), &err))
}

fn read_source(path: &Path) -> Result<String, CompilerDiagnostic> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(|err| io_diagnostic(&err))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CompilerDiagnostic> {
    serde_json::to_string_pretty(value)
        .context("failed to serialize to JSON")
        .map_err(|err| io_diagnostic(&err))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CompilerDiagnostic> {
    let json = to_json(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))
        .map_err(|err| io_diagnostic(&err))
}

fn io_diagnostic(error: &anyhow::Error) -> CompilerDiagnostic {
    diagnostic_from_anyhow(DiagnosticStage::Io, "JSPY-IO-001", "I/O failed", error)
}

fn initialize_logging() -> anyhow::Result<()> {
    let env_filter = env::var("RUST_LOG").unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_str(&env_filter)?),
        )
        .init();
    Ok(())
}

#[derive(clap::Parser)]
#[clap(name = "jspy", about = "Translate a small C-style scripting language into Python.")]
struct Jspy {
    #[clap(subcommand)]
    subcmd: JspySubcommand,
}

#[derive(clap::Subcommand)]
enum JspySubcommand {
    /// Translate a source file and write the Python output.
    Build(Build),
    /// Print the scanned tokens as JSON.
    Tokens(Dump),
    /// Print the parsed syntax tree as JSON.
    Ast(Dump),
}

#[derive(clap::Parser, Debug)]
struct Build {
    /// Path to the source file
    source: PathBuf,

    /// Output path (defaults to the source path with a `.py` extension)
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Directory receiving `tokens.json` and `ast.json`
    #[clap(long)]
    emit_dir: Option<PathBuf>,

    /// Spaces per indentation level
    #[clap(long, default_value = "4")]
    indent_width: NonZeroUsize,

    /// Indent with tabs instead of spaces
    #[clap(long, default_value = "false")]
    tabs: bool,
}

impl Build {
    fn generator_options(&self) -> GeneratorOptions {
        let indent = if self.tabs {
            Indent::Tab
        } else {
            Indent::Spaces(self.indent_width)
        };
        GeneratorOptions { indent }
    }
}

#[derive(clap::Parser, Debug)]
struct Dump {
    /// Path to the source file
    source: PathBuf,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn build_for(source: PathBuf) -> Build {
        Build {
            source,
            output: None,
            emit_dir: None,
            indent_width: NonZeroUsize::new(4).expect("non-zero width"),
            tabs: false,
        }
    }

    #[test]
    fn build_writes_python_next_to_the_source() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("main.js");
        fs::write(&source_path, "function f() { print(1); }\nf();\n").expect("write source");

        let output_path = run_build(&build_for(source_path)).expect("build source");

        assert_eq!(output_path, tmp.path().join("main.py"));
        let output = fs::read_to_string(&output_path).expect("read output");
        assert_eq!(output, "def f():\n    print(1)\n\nf()\n");
    }

    #[test]
    fn build_overwrites_output_and_emits_artifacts() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("main.js");
        let output_path = tmp.path().join("out.py");
        let emit_dir = tmp.path().join("artifacts");
        fs::write(&source_path, "if (a) { print(a); }\n").expect("write source");
        fs::write(&output_path, "stale").expect("write stale output");

        let mut build = build_for(source_path);
        build.output = Some(output_path.clone());
        build.emit_dir = Some(emit_dir.clone());
        build.tabs = true;
        run_build(&build).expect("build source");

        assert_eq!(
            fs::read_to_string(&output_path).expect("read output"),
            "if (a):\n\tprint(a)\n"
        );
        let tokens: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(emit_dir.join("tokens.json")).expect("read tokens"),
        )
        .expect("tokens are json");
        assert_eq!(tokens[0]["kind"], "if");
        let ast: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(emit_dir.join("ast.json")).expect("read ast"),
        )
        .expect("ast is json");
        assert!(ast["statements"][0]["If"].is_object());
    }

    #[test]
    fn build_reports_stage_failures_without_writing_output() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("broken.js");
        fs::write(&source_path, "function f() {\n").expect("write source");

        let diagnostic = run_build(&build_for(source_path)).expect_err("parse should fail");

        assert_eq!(diagnostic.stage, DiagnosticStage::Parse);
        assert!(!tmp.path().join("broken.py").exists());
    }

    #[test]
    fn missing_source_is_an_io_failure() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let diagnostic =
            run_build(&build_for(tmp.path().join("absent.js"))).expect_err("read should fail");
        assert_eq!(diagnostic.stage, DiagnosticStage::Io);
        assert!(diagnostic.message.contains("absent.js"));
    }

    #[test]
    fn command_line_flags_map_to_generator_options() {
        let jspy = Jspy::try_parse_from(["jspy", "build", "main.js", "--indent-width", "2"])
            .expect("parse arguments");
        let JspySubcommand::Build(build) = jspy.subcmd else {
            panic!("expected build subcommand");
        };
        assert_eq!(build.source, PathBuf::from("main.js"));
        assert_eq!(build.generator_options().indent, Indent::spaces(2).expect("non-zero width"));

        let jspy = Jspy::try_parse_from(["jspy", "build", "main.js", "--tabs"])
            .expect("parse arguments");
        let JspySubcommand::Build(build) = jspy.subcmd else {
            panic!("expected build subcommand");
        };
        assert_eq!(build.generator_options().indent, Indent::Tab);
    }

    #[test]
    fn zero_indent_width_is_refused() {
        let err = Jspy::try_parse_from(["jspy", "build", "main.js", "--indent-width", "0"])
            .err()
            .expect("zero width should be refused");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("--indent-width"));
    }

    #[test]
    fn tokens_subcommand_prints_the_token_list() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("main.js");
        fs::write(&source_path, "print(x); // done\n").expect("write source");

        let json = dump_tokens(&source_path).expect("dump tokens");

        let tokens: serde_json::Value = serde_json::from_str(&json).expect("tokens are json");
        let kinds = tokens
            .as_array()
            .expect("token list")
            .iter()
            .map(|token| token["kind"].as_str().expect("kind").to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            ["print", "open_paren", "identifier", "close_paren", "semicolon", "comment"]
        );
        assert_eq!(tokens[2]["lexeme"], "x");
    }

    #[test]
    fn ast_subcommand_prints_the_syntax_tree() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("main.js");
        fs::write(&source_path, "var x = 1 + 2;\nprint(x);\n").expect("write source");

        let json = dump_ast(&source_path).expect("dump ast");

        let ast: serde_json::Value = serde_json::from_str(&json).expect("ast is json");
        assert_eq!(ast["statements"][0]["VarDecl"]["name"], "x");
        assert!(ast["statements"][1]["Print"].is_object());
    }

    #[test]
    fn dump_subcommands_report_stage_failures() {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let source_path = tmp.path().join("main.js");
        fs::write(&source_path, "print(@);").expect("write source");

        let diagnostic = dump_tokens(&source_path).expect_err("scan should fail");
        assert_eq!(diagnostic.stage, DiagnosticStage::Scan);
        let diagnostic = dump_ast(&source_path).expect_err("scan should fail");
        assert_eq!(diagnostic.stage, DiagnosticStage::Scan);
    }
}
