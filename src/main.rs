//! eggd-pandora main executable

pub mod case;
pub mod clinvar;
pub mod common;
pub mod decipher;
pub mod err;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Push clinical case data to DECIPHER and ClinVar",
    long_about = "This tool assembles case records from laboratory data and submits them to \
                  the DECIPHER patient registry and to ClinVar"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Case-related commands.
    Case(Case),
    /// DECIPHER related commands.
    Decipher(Decipher),
    /// ClinVar related commands.
    Clinvar(Clinvar),
}

/// Parsing of "case *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Case {
    /// The sub command to run
    #[command(subcommand)]
    command: CaseCommands,
}

/// Enum supporting the parsing of "case *" sub commands.
#[derive(Debug, Subcommand)]
enum CaseCommands {
    Assemble(case::Args),
}

/// Parsing of "decipher *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Decipher {
    /// The sub command to run
    #[command(subcommand)]
    command: DecipherCommands,
}

/// Enum supporting the parsing of "decipher *" sub commands.
#[derive(Debug, Subcommand)]
enum DecipherCommands {
    Submit(decipher::submit::Args),
}

/// Parsing of "clinvar *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Clinvar {
    /// The sub command to run
    #[command(subcommand)]
    command: ClinvarCommands,
}

/// Enum supporting the parsing of "clinvar *" sub commands.
#[derive(Debug, Subcommand)]
enum ClinvarCommands {
    Prepare(clinvar::prepare::Args),
    Submit(clinvar::submit::Args),
    Accession(clinvar::accession::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Case(case) => match &case.command {
                CaseCommands::Assemble(args) => case::run(&cli.common, args)?,
            },
            Commands::Decipher(decipher) => match &decipher.command {
                DecipherCommands::Submit(args) => decipher::submit::run(&cli.common, args)?,
            },
            Commands::Clinvar(clinvar) => match &clinvar.command {
                ClinvarCommands::Prepare(args) => clinvar::prepare::run(&cli.common, args)?,
                ClinvarCommands::Submit(args) => clinvar::submit::run(&cli.common, args)?,
                ClinvarCommands::Accession(args) => clinvar::accession::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
