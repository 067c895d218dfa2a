//! Purpose: `colxor` CLI entry point.
//! Role: Binary crate root; parses args, runs the pipeline, reports on stdout/stderr.
//! Invariants: The confirmation line (or `--json` summary) is the only stdout output.
//! Invariants: Errors and notices go to stderr, as JSON lines when stderr is not a TTY.
//! Invariants: Stage failures never abort the process; exit code comes from `RunReport`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

use colxor::core::compare::UniqueOrder;
use colxor::core::error::{Error, ErrorKind, to_exit_code};
use colxor::core::loader::LoadOptions;
use colxor::core::selection::{ColumnSelection, parse_column_list};
use colxor::core::writer::{LabelMode, WriteOptions};
use colxor::notice::{Notice, notice_json};
use colxor::pipeline::{PipelineConfig, RunReport, parse_delimiter, run_pipeline};

const DEFAULT_COLUMNS: [usize; 2] = [0, 1];

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `colxor --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    let config = cli.pipeline_config().map_err(|err| (err, color_mode))?;

    let report = run_pipeline(&config, |notice| emit_notice(notice, color_mode));
    emit_report(&report, cli.json, color_mode);
    Ok(report.exit_code(cli.strict))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "colxor",
    version,
    about = "Find values that appear in exactly one of the selected columns of a delimited file",
    long_about = None,
    after_help = r#"EXAMPLES
  $ colxor upcs.csv unique.csv --has-header
  $ colxor upcs.csv unique.csv -c 0,2,3 --order sorted
  $ colxor export.tsv unique.tsv -c 1 -c 4 --delimiter tab --label always

A value is written when exactly one selected column contains it. Columns are 0-based
and default to 0,1. Rows too short for a column are reported and skipped for that
column only."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(help = "Source table", value_hint = ValueHint::FilePath)]
    input: PathBuf,
    #[arg(help = "Destination table (created or truncated)", value_hint = ValueHint::FilePath)]
    output: PathBuf,
    #[arg(
        short = 'c',
        long = "columns",
        value_name = "IDX[,IDX...]",
        help = "Column indices to compare, 0-based; repeatable (default: 0,1)"
    )]
    columns: Vec<String>,
    #[arg(long, help = "Treat the first row as a header of column names")]
    has_header: bool,
    #[arg(
        long,
        default_value = ",",
        help = "Input field delimiter; a single ASCII character or `tab`"
    )]
    delimiter: String,
    #[arg(long, help = "Output field delimiter (default: same as --delimiter)")]
    output_delimiter: Option<String>,
    #[arg(long, default_value = "first-seen", value_enum, help = "Output row order")]
    order: OrderCli,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Second output field naming the compared columns: auto (only with a header)|always|never"
    )]
    label: LabelCli,
    #[arg(long, help = "Print a JSON run summary instead of the confirmation line")]
    json: bool,
    #[arg(long, help = "Exit non-zero when any row or stage fails")]
    strict: bool,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, Error> {
        let mut columns = parse_column_list(&self.columns)?;
        if self.columns.is_empty() {
            columns = DEFAULT_COLUMNS.to_vec();
        }
        let selection = ColumnSelection::new(columns)?;
        let delimiter = parse_delimiter(&self.delimiter)?;
        let output_delimiter = match &self.output_delimiter {
            Some(value) => parse_delimiter(value)?,
            None => delimiter,
        };
        Ok(PipelineConfig {
            input: self.input.clone(),
            output: self.output.clone(),
            selection,
            load: LoadOptions {
                has_header: self.has_header,
                delimiter,
            },
            write: WriteOptions {
                delimiter: output_delimiter,
                label: self.label.into(),
            },
            order: self.order.into(),
        })
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OrderCli {
    FirstSeen,
    Sorted,
}

impl From<OrderCli> for UniqueOrder {
    fn from(value: OrderCli) -> Self {
        match value {
            OrderCli::FirstSeen => UniqueOrder::FirstSeen,
            OrderCli::Sorted => UniqueOrder::Sorted,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LabelCli {
    Auto,
    Always,
    Never,
}

impl From<LabelCli> for LabelMode {
    fn from(value: LabelCli) -> Self {
        match value {
            LabelCli::Auto => LabelMode::Auto,
            LabelCli::Always => LabelMode::Always,
            LabelCli::Never => LabelMode::Never,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_report(report: &RunReport, json: bool, color_mode: ColorMode) {
    if let Some(err) = &report.load_error {
        emit_error(err, color_mode);
    }
    match &report.write {
        Ok(written) => {
            if json {
                let value = report
                    .summary()
                    .and_then(|summary| serde_json::to_value(summary).ok())
                    .unwrap_or(Value::Null);
                println!("{value}");
            } else {
                println!("Unique values written to: {}", written.path.display());
            }
        }
        Err(err) => emit_error(err, color_mode),
    }
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} (source: {})", notice.message, notice.source);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Malformed => "malformed input".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(row) = err.row() {
        inner.insert("row".to_string(), json!(row));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(row) = err.row() {
        lines.push(format!(
            "{} {row}",
            colorize_label("row:", use_color, AnsiColor::Yellow)
        ));
    }
    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
