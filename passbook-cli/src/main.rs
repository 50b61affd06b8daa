use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use passbook_core::Table;
use passbook_ingest::{ParserConfig, StatementParser, extractor_for};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod repair_cmd;
mod state;

#[derive(Parser, Debug)]
#[command(name = "passbook", version, about = "Bank statement PDF to transaction table")]
struct Cli {
    /// Config file (default: ~/.passbook/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a statement (PDF, or pre-extracted .txt) into CSV
    Parse {
        #[arg(long)]
        input: PathBuf,

        /// Write CSV here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Parser settings written by `passbook repair` (overrides [parser] in config)
        #[arg(long)]
        parser: Option<PathBuf>,
    },

    /// Parse a statement and compare it with a reference CSV
    Check {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        expected: PathBuf,

        #[arg(long)]
        parser: Option<PathBuf>,
    },

    /// Search for parser settings that reproduce a bank's sample CSV
    Repair {
        /// Bank name, e.g. icici; samples live in <data-dir>/<bank>/
        #[arg(long)]
        target: String,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
    /// Print the effective config
    Show,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "passbook=info,passbook_core=info,passbook_ingest=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config_file = cli.config.as_deref();

    match cli.command {
        Command::Parse { input, out, parser } => {
            let parser = build_parser(config_file, parser.as_deref())?;
            let table = parse_input(&parser, &input)?;

            match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("create {}", path.display()))?;
                    table
                        .write_csv(BufWriter::new(file))
                        .with_context(|| format!("write {}", path.display()))?;
                    println!("Wrote {} rows to {}", table.len(), path.display());
                }
                None => table.write_csv(io::stdout().lock()).context("write CSV")?,
            }
        }

        Command::Check {
            input,
            expected,
            parser,
        } => {
            let parser = build_parser(config_file, parser.as_deref())?;
            let actual = parse_input(&parser, &input)?;

            let file =
                File::open(&expected).with_context(|| format!("open {}", expected.display()))?;
            let reference = Table::read_csv(file, &parser.config().schema)
                .with_context(|| format!("reading {}", expected.display()))?;

            let diff = actual.compare(&reference);
            if !diff.is_match() {
                bail!("{} does not match {}\n{}", input.display(), expected.display(), diff);
            }
            println!("OK: {} rows match {}", actual.len(), expected.display());
        }

        Command::Repair {
            target,
            data_dir,
            out_dir,
            max_attempts,
        } => {
            let cfg = config::load_config(config_file)?;
            let data_dir = data_dir.unwrap_or(cfg.repair.data_dir);
            let out_dir = out_dir.unwrap_or(cfg.repair.out_dir);
            let max_attempts = max_attempts.unwrap_or(cfg.repair.max_attempts);

            let report =
                repair_cmd::run_repair(&target, &cfg.parser, &data_dir, &out_dir, max_attempts)?;

            for stage in &report.trace {
                println!("- {:?}", stage);
            }
            println!(
                "\nAccepted after {} attempt(s); wrote {}",
                report.attempts,
                report.written.display()
            );
            println!(
                "Next: passbook parse --input <statement.pdf> --parser {}",
                report.written.display()
            );
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(config_file)?,
            ConfigCommand::Show => {
                let cfg = config::load_config(config_file)?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn build_parser(config_file: Option<&Path>, parser_file: Option<&Path>) -> Result<StatementParser> {
    let parser_cfg: ParserConfig = match parser_file {
        Some(p) => config::read_parser_config(p)?,
        None => config::load_config(config_file)?.parser,
    };
    StatementParser::new(parser_cfg).context("invalid parser configuration")
}

fn parse_input(parser: &StatementParser, input: &Path) -> Result<Table> {
    if !input.exists() {
        bail!("statement not found: {}", input.display());
    }
    let extractor = extractor_for(input, &parser.pdf_extractor());
    parser
        .parse_document(input, extractor.as_ref())
        .with_context(|| format!("parsing {}", input.display()))
}
