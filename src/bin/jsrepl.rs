// パス: src/bin/jsrepl.rs
// 役割: コマンドライン引数を解釈して対話モードかスクリプトモードを起動する
// 意図: オプションを `ReplOptions` に集め、ログ購読者の初期化はここだけで行う
// 関連ファイル: src/repl/mod.rs, src/repl/cmd.rs, src/lib.rs
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use jsrepl::errors::ReplError;
use jsrepl::repl::{run_repl, run_script, ReplOptions};

/// `-h` はソース位置ヒントの無効化に使うため、ヘルプは `--help` のみ。
#[derive(Debug, Parser)]
#[command(name = "jsrepl", version, about = "Interactive ECMAScript shell", disable_help_flag = true)]
struct Args {
    /// Dump the AST as JSON
    #[arg(short = 'A', long)]
    dump_ast: bool,
    /// Dump the lowered bytecode
    #[arg(short = 'd', long)]
    dump_bytecode: bool,
    /// Run the bytecode instead of the tree walker
    #[arg(short = 'b', long)]
    run_bytecode: bool,
    /// Optimize the bytecode before running or dumping it
    #[arg(short = 'p', long)]
    optimize_bytecode: bool,
    /// Treat the input as a module
    #[arg(short = 'm', long)]
    as_module: bool,
    /// Print the value of the last statement
    #[arg(short = 'l', long)]
    print_last_result: bool,
    /// Disable ANSI colors
    #[arg(short = 'i', long)]
    disable_ansi_colors: bool,
    /// Disable source location hints
    #[arg(short = 'h', long)]
    disable_source_location_hints: bool,
    /// Disable live syntax highlighting
    #[arg(short = 's', long)]
    no_syntax_highlight: bool,
    /// Evaluate the argument as a script
    #[arg(short = 'c', long = "evaluate", value_name = "SCRIPT")]
    evaluate: Option<String>,
    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
    /// Paths to script files
    scripts: Vec<PathBuf>,
}

impl Args {
    fn options(&self) -> ReplOptions {
        ReplOptions {
            dump_ast: self.dump_ast,
            dump_bytecode: self.dump_bytecode,
            run_bytecode: self.run_bytecode,
            optimize_bytecode: self.optimize_bytecode,
            as_module: self.as_module,
            print_last_result: self.print_last_result,
            strip_ansi: self.disable_ansi_colors,
            disable_source_location_hints: self.disable_source_location_hints,
            no_syntax_highlight: self.no_syntax_highlight,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("JSREPL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// ファイルを連結した 1 つのソースにする。UTF-8 でない内容は置換文字で読む。
fn read_sources(paths: &[PathBuf]) -> Result<String, ReplError> {
    if paths.len() > 1 {
        warn!("Multiple files supplied, this will concatenate the sources and resolve modules as if it was the first file");
    }
    let mut source = String::new();
    for path in paths {
        let bytes = fs::read(path).map_err(|source| ReplError::Read {
            path: path.display().to_string(),
            source,
        })?;
        source.push_str(&String::from_utf8_lossy(&bytes));
    }
    Ok(source)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();
    let options = args.options();

    if let Some(script) = &args.evaluate {
        return exit_code(run_script(options, script, "eval"));
    }
    if let Some(first) = args.scripts.first() {
        let source = match read_sources(&args.scripts) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("{}", err);
                return ExitCode::FAILURE;
            }
        };
        let name = first.display().to_string();
        return exit_code(run_script(options, &source, &name));
    }
    exit_code(run_repl(options))
}
