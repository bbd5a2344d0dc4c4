use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use nelmo_core::codegen_js::NATIVE_NAMESPACE;
use nelmo_core::{Environment, Expr, Value, compile_exprs, evaluate_exprs, parse_source};
use tracing::{debug, info};
use walkdir::WalkDir;

const SOURCE_EXTENSION: &str = "elm";

#[derive(Parser, Debug)]
#[command(version, about = "Compile Nelmo sources to JavaScript", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Source file, or a directory of .elm files (reads stdin when omitted)"
    )]
    input: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Output file, or output directory for a directory input"
    )]
    output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "js",
        help = "Output format: js, ast"
    )]
    emit: String,

    #[arg(long, help = "Also evaluate the program and print its final value")]
    run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Js,
    Ast,
}

impl Emit {
    fn from_format(format: &str) -> Result<Self> {
        match format {
            "js" => Ok(Emit::Js),
            "ast" => Ok(Emit::Ast),
            other => bail!("unsupported emit format: {other}"),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Emit::Js => "js",
            Emit::Ast => "ast",
        }
    }

    fn render(self, exprs: &[Expr]) -> String {
        match self {
            Emit::Js => compile_exprs(exprs),
            Emit::Ast => exprs.iter().map(|expr| format!("{expr:#?}\n")).collect(),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    execute(cli)
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn execute(cli: Cli) -> Result<()> {
    let emit = Emit::from_format(&cli.emit)?;

    match &cli.input {
        Some(input) if input.is_dir() => {
            if cli.run {
                bail!("--run needs a single input file");
            }
            compile_directory(input, cli.output.as_deref(), emit)
        }
        Some(input) => {
            let source = fs::read_to_string(input)
                .with_context(|| format!("failed to read input file {}", input.display()))?;
            let output = cli
                .output
                .clone()
                .unwrap_or_else(|| input.with_extension(emit.extension()));
            compile_file(&source, Some(&output), emit, cli.run)
                .with_context(|| format!("failed to compile {}", input.display()))
        }
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            compile_file(&source, cli.output.as_deref(), emit, cli.run)
        }
    }
}

fn compile_file(source: &str, output: Option<&Path>, emit: Emit, run: bool) -> Result<()> {
    let exprs = parse_source(source)?;
    let rendered = emit.render(&exprs);

    match output {
        Some(path) => write_output(path, rendered.as_bytes())?,
        None => io::stdout().write_all(rendered.as_bytes())?,
    }

    if run {
        let value = evaluate_exprs(&exprs, &mut native_environment())?;
        println!("Program evaluated to {value}");
    }

    Ok(())
}

fn compile_directory(root: &Path, output: Option<&Path>, emit: Emit) -> Result<()> {
    let sources = collect_sources(root)?;
    if sources.is_empty() {
        bail!("no .{SOURCE_EXTENSION} files found under {}", root.display());
    }

    for path in &sources {
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let target = match output {
            Some(dir) => dir.join(relative),
            None => path.clone(),
        }
        .with_extension(emit.extension());

        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?;
        compile_file(&source, Some(&target), emit, false)
            .with_context(|| format!("failed to compile {}", path.display()))?;
        info!(source = %path.display(), output = %target.display(), "compiled");
    }

    Ok(())
}

fn collect_sources(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    debug!(count = files.len(), root = %root.display(), "collected sources");
    Ok(files)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

/// Host bindings reachable through `Native` when running a program.
fn native_environment() -> Environment {
    let console = Value::record([
        (
            "log",
            Value::native("console.log", |args| {
                let line = join_arguments(args);
                println!("{line}");
                Ok(Value::String(line))
            }),
        ),
        (
            "error",
            Value::native("console.error", |args| {
                let line = join_arguments(args);
                eprintln!("{line}");
                Ok(Value::String(line))
            }),
        ),
    ]);

    let mut env = Environment::new();
    env.define(NATIVE_NAMESPACE, Value::record([("console", console)]));
    env
}

fn join_arguments(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn nelmo() -> Command {
        Command::cargo_bin("nelmo-cli").expect("binary exists")
    }

    #[test]
    fn compiles_file_next_to_input() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("main.elm");
        fs::write(&input_path, "answer : Int\nanswer = 42\n").expect("write input");

        nelmo().arg("--input").arg(&input_path).assert().success();

        let js = fs::read_to_string(dir.path().join("main.js")).expect("read output");
        assert_eq!(js, "var answer = 42;\n");
    }

    #[test]
    fn writes_to_explicit_output() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.elm");
        fs::write(&input_path, "log = Native.console.log\nlog \"hi\"").expect("write input");
        let output_path = dir.path().join("build/out.js");

        nelmo()
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let js = fs::read_to_string(&output_path).expect("read output");
        assert_eq!(js, "var log = console.log;\nlog(\"hi\");\n");
    }

    #[test]
    fn compiles_stdin_to_stdout() {
        nelmo()
            .write_stdin("1 + 2 * 3")
            .assert()
            .success()
            .stdout("1 + (2 * 3);\n");
    }

    #[test]
    fn emits_ast() {
        nelmo()
            .arg("--emit")
            .arg("ast")
            .write_stdin("foo.bar")
            .assert()
            .success()
            .stdout(predicate::str::contains("Dot").and(predicate::str::contains("\"bar\"")));
    }

    #[test]
    fn runs_program_with_native_console() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("main.elm");
        fs::write(
            &input_path,
            "log = Native.console.log\nlog \"hello\" \"world\"\n41 + 1\n",
        )
        .expect("write input");

        nelmo()
            .arg("--input")
            .arg(&input_path)
            .arg("--run")
            .assert()
            .success()
            .stdout(predicate::str::contains("hello world"))
            .stdout(predicate::str::contains("Program evaluated to 42"));

        assert!(dir.path().join("main.js").exists(), "js output was not created");
    }

    #[test]
    fn runs_program_with_definitions_across_lines() {
        nelmo()
            .arg("--run")
            .write_stdin("square = \\n -> n * n\nsquare 7 == 49\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Program evaluated to True"));
    }

    #[test]
    fn reports_runaway_recursion() {
        nelmo()
            .arg("--run")
            .write_stdin("forever = \\n -> forever n\nforever 1\n")
            .assert()
            .failure()
            .stderr(predicate::str::contains("evaluation nested too deeply"));
    }

    #[test]
    fn compiles_directory_tree() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).expect("create source tree");
        fs::write(src.join("a.elm"), "42").expect("write a");
        fs::write(src.join("nested/b.elm"), "\"foo\"").expect("write b");
        fs::write(src.join("notes.txt"), "not a source").expect("write notes");
        let out = dir.path().join("out");

        nelmo()
            .arg("--input")
            .arg(&src)
            .arg("--output")
            .arg(&out)
            .assert()
            .success();

        assert_eq!(fs::read_to_string(out.join("a.js")).expect("read a"), "42;\n");
        assert_eq!(
            fs::read_to_string(out.join("nested/b.js")).expect("read b"),
            "\"foo\";\n"
        );
        assert!(!out.join("notes.js").exists());
    }

    #[test]
    fn rejects_unsupported_emit_format() {
        nelmo()
            .arg("--emit")
            .arg("wasm")
            .write_stdin("42")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported emit format: wasm"));
    }

    #[test]
    fn reports_type_errors() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("bad.elm");
        fs::write(&input_path, "answer : Int\nanswer = \"foo\"").expect("write input");

        nelmo()
            .arg("--input")
            .arg(&input_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid value"));

        assert!(!dir.path().join("bad.js").exists());
    }

    #[test]
    fn reports_unclosed_string() {
        nelmo()
            .write_stdin("\"foo")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unclosed String"));
    }
}
