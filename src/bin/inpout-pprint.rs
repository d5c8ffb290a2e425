//! Печать содержимого файлов inpout.
//!
//! Читает каждый файл как последовательность значений и выводит их в
//! читаемом виде или как JSON (по документу на строку). Ошибка в одном файле
//! не останавливает обработку остальных.

use std::{
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use inpout::{
    load_many,
    logging::{init_logging, FileConfig, LogFormat, LoggingConfig},
    LoadOptions, Settings, Value,
};
use owo_colors::OwoColorize;
use tracing::debug;

/// Суффикс, по которому режим `auto` распознаёт сжатые файлы.
const LZ4_SUFFIX: &str = "lz4";

#[derive(Parser, Debug)]
#[command(name = "inpout-pprint")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("INPOUT_GIT_COMMIT"), ", ", env!("INPOUT_BUILD_DATE"), ")"))]
#[command(about = "Pretty-print values stored in inpout files", long_about = None)]
struct Cli {
    /// Файлы для печати
    #[arg(required = true, help = "Files to print")]
    files: Vec<PathBuf>,
    /// Сколько значений печатать из каждого файла
    #[arg(short = 'n', long, help = "Print at most NUMBER values per file")]
    number: Option<usize>,
    /// Формат вывода
    #[arg(long, value_enum, default_value = "pretty")]
    output: OutputFormat,
    /// Как определить сжатие
    #[arg(long, value_enum, default_value = "auto")]
    compression: CompressionMode,
    /// Файл настроек (по умолчанию ./inpout.toml, если есть)
    #[arg(long, env = "INPOUT_CONFIG")]
    config: Option<PathBuf>,
    /// Подробные логи
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Только ошибки
    #[arg(short, long)]
    quiet: bool,
    /// Формат логов в stderr (перекрывает log_format из настроек)
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
    /// Каталог для файла логов (перекрывает log_dir из настроек)
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Без цвета
    #[arg(long, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new())]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Человекочитаемый многострочный вывод
    Pretty,
    /// JSON, по документу на строку
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CompressionMode {
    /// LZ4, если имя файла оканчивается на `.lz4`
    Auto,
    Lz4,
    None,
}

impl CompressionMode {
    fn is_compressed(
        self,
        path: &Path,
    ) -> bool {
        match self {
            Self::Auto => path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(LZ4_SUFFIX)),
            Self::Lz4 => true,
            Self::None => false,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let mut logging = LoggingConfig::from(&settings);
    if cli.verbose {
        logging.level = "debug".to_string();
    } else if cli.quiet {
        logging.level = "error".to_string();
    }
    if let Some(format) = cli.log_format {
        logging.console.format = format;
    }
    if let Some(dir) = &cli.log_dir {
        logging.file = Some(FileConfig::in_dir(dir.clone()));
    }
    let _logging = match init_logging(logging) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e}");
            None
        }
    };

    let color = !cli.no_color && io::stdout().is_terminal();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0usize;

    for path in &cli.files {
        let options = LoadOptions {
            compression: cli.compression.is_compressed(path),
            ..LoadOptions::from(&settings)
        };
        debug!(path = %path.display(), compression = options.compression, "Printing file");

        if let Err(e) = print_file(&mut out, path, &options, &cli, color) {
            failed += 1;
            let _ = out.flush();
            if color {
                eprintln!("{}: {e:#}", path.display().red());
            } else {
                eprintln!("{}: {e:#}", path.display());
            }
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("cannot load settings from {}", path.display()))?,
        None => Settings::load().context("cannot load settings")?,
    };
    Ok(settings)
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse::<LogFormat>().map_err(|e| e.to_string())
}

fn print_file<W: Write>(
    out: &mut W,
    path: &Path,
    options: &LoadOptions,
    cli: &Cli,
    color: bool,
) -> Result<()> {
    let values = load_many(path, options)?;

    if cli.output == OutputFormat::Pretty && cli.files.len() > 1 {
        let header = format!("==> {} <==", path.display());
        if color {
            writeln!(out, "{}", header.bold())?;
        } else {
            writeln!(out, "{header}")?;
        }
    }

    let limit = cli.number.unwrap_or(usize::MAX);
    for (i, value) in values.take(limit).enumerate() {
        let value = value.with_context(|| format!("reading value #{i}"))?;
        write_value(out, i, &value, cli.output, color)?;
    }
    out.flush()?;
    Ok(())
}

fn write_value<W: Write>(
    out: &mut W,
    index: usize,
    value: &Value,
    format: OutputFormat,
    color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Pretty => {
            let prefix = format!("[{index}]");
            if color {
                writeln!(out, "{} {value:#}", prefix.cyan())?;
            } else {
                writeln!(out, "{prefix} {value:#}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
