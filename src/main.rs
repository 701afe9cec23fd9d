//! Gentable - generate tables from column formulas

mod config;
mod error;

use std::env;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use gentable_core::storage::{load_definition, parse_reference_csv, write_csv, write_markdown};
use gentable_core::{Row, Table};
use gentable_engine::{Engine, Value, normalize};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, OutputFormat, load_config};
use crate::error::CliError;

fn print_usage() {
    eprintln!("Usage: gentable [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Table definition (.toml)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --param <NAME=EXPR>   Set a parameter (can be repeated)");
    eprintln!("  -r, --reference <CSV>     Load reference series from a CSV file");
    eprintln!("  -o, --output <FILE>       Write rows to a file (.csv or .md)");
    eprintln!("  --format <FORMAT>         Output format: markdown (default) or csv");
    eprintln!("  --max-rows <N>            Emit at most N rows");
    eprintln!("  --vectorized              Compute whole columns instead of rows");
    eprintln!("  --config <FILE>           Read settings from this config file");
    eprintln!("  --no-config               Ignore the user config file");
    eprintln!("  -c, --command <EXPR>      Evaluate an expression and print the result");
    eprintln!("  --normalize <EXPR>        Print the canonical form of an expression");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default)]
struct Options {
    file: Option<PathBuf>,
    params: Vec<String>,
    reference: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    max_rows: Option<usize>,
    vectorized: bool,
    config: Option<PathBuf>,
    no_config: bool,
    command: Option<String>,
    normalize: Option<String>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Options, CliError> {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = || -> Result<String, CliError> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| CliError::MissingValue(arg.to_string()))
        };
        match arg {
            "-h" | "--help" => opts.help = true,
            "-p" | "--param" => opts.params.push(value()?),
            "-r" | "--reference" => opts.reference = Some(PathBuf::from(value()?)),
            "-o" | "--output" => opts.output = Some(PathBuf::from(value()?)),
            "--format" => opts.format = Some(value()?.parse()?),
            "--max-rows" => {
                let raw = value()?;
                let n = raw.parse().map_err(|_| CliError::InvalidNumber {
                    option: arg.to_string(),
                    value: raw,
                })?;
                opts.max_rows = Some(n);
            }
            "--vectorized" => opts.vectorized = true,
            "--config" => opts.config = Some(PathBuf::from(value()?)),
            "--no-config" => opts.no_config = true,
            "-c" | "--command" => opts.command = Some(value()?),
            "--normalize" => opts.normalize = Some(value()?),
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(CliError::UnknownOption(other.to_string()));
            }
            other => {
                if opts.file.is_some() {
                    return Err(CliError::UnexpectedArgument(other.to_string()));
                }
                opts.file = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }
    Ok(opts)
}

/// GENTABLE_LOG, then RUST_LOG, then the config file, then `warn`.
fn init_logging(config: &Config) {
    let filter = ["GENTABLE_LOG", "RUST_LOG"]
        .iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| config.log.clone())
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };
    if opts.help {
        print_usage();
        return;
    }

    if let Err(e) = run(opts) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(opts: Options) -> anyhow::Result<()> {
    let config = if opts.no_config && opts.config.is_none() {
        Config::default()
    } else {
        load_config(opts.config.as_deref())?
    };
    init_logging(&config);
    tracing::debug!(?config, "configuration loaded");

    let engine = Engine::new();

    if let Some(raw) = &opts.normalize {
        match normalize(raw) {
            Ok(canonical) => println!("{}", canonical),
            Err(e) => {
                println!("#ERR: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let params = parse_params(&engine, &opts.params)?;

    if let Some(expr) = &opts.command {
        match engine.eval(expr, &params) {
            Ok(value) => print_value(&value),
            Err(e) => {
                println!("#ERR: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let file = opts.file.as_deref().ok_or(CliError::NoInput)?;
    let mut definition =
        load_definition(file).with_context(|| format!("loading {}", file.display()))?;
    if let Some(csv) = &opts.reference {
        let reference =
            parse_reference_csv(csv).with_context(|| format!("loading {}", csv.display()))?;
        definition.reference.extend(reference);
    }
    definition.parameters.extend(params);

    let mut table = Table::from_definition_with_engine(&definition, engine)?;

    if opts.vectorized {
        let columns = table.compute_all(&[])?;
        for name in table.evaluation_order() {
            if let Some(value) = columns.get(name) {
                println!("{}: {}", name, value);
            }
        }
        return Ok(());
    }

    let max_rows = opts.max_rows.or(config.max_rows).unwrap_or(usize::MAX);
    let rows = table
        .rows()
        .take(max_rows)
        .collect::<gentable_core::Result<Vec<Row>>>()?;
    let names: Vec<&str> = table.columns().map(|c| c.name()).collect();

    let format = opts
        .format
        .or_else(|| opts.output.as_deref().and_then(OutputFormat::from_path))
        .or(config.format)
        .unwrap_or_default();

    match &opts.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_rows(&mut file, format, &names, &rows)?;
            eprintln!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_rows(&mut stdout.lock(), format, &names, &rows)?;
        }
    }
    Ok(())
}

/// Each `name=expr` is evaluated as a constant expression that may refer
/// to parameters given before it.
fn parse_params(
    engine: &Engine,
    raw: &[String],
) -> anyhow::Result<std::collections::BTreeMap<String, Value>> {
    let mut params = std::collections::BTreeMap::new();
    for item in raw {
        let (name, expr) = item
            .split_once('=')
            .ok_or_else(|| CliError::InvalidParam(item.clone()))?;
        let name = name.trim();
        if !gentable_engine::is_valid_name(name) {
            return Err(CliError::InvalidParam(item.clone()).into());
        }
        let value = engine
            .eval(expr, &params)
            .with_context(|| format!("evaluating parameter {}", name))?;
        params.insert(name.to_string(), value);
    }
    Ok(params)
}

fn write_rows<W: Write>(
    out: &mut W,
    format: OutputFormat,
    names: &[&str],
    rows: &[Row],
) -> std::io::Result<()> {
    match format {
        OutputFormat::Markdown => write_markdown(out, names, rows),
        OutputFormat::Csv => write_csv(out, names, rows),
    }
}

/// Arrays print one element per line.
fn print_value(value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                println!("{}", item);
            }
        }
        other => println!("{}", other),
    }
}
