//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod http;
pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Select the genome release to use.
#[derive(
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    strum::Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum GenomeRelease {
    /// GRCh37 / hg19
    #[serde(rename = "GRCh37")]
    #[strum(serialize = "GRCh37")]
    Grch37,
    /// GRCh38 / hg38
    #[default]
    #[serde(rename = "GRCh38")]
    #[strum(serialize = "GRCh38")]
    Grch38,
}

/// Coarse chromosome class, all we need for ploidy decisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Chrom {
    Auto, // or chrMT, but does not matter for hemizygosity
    X,
    Y,
}

impl std::str::FromStr for Chrom {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("chr")
            .or_else(|| s.strip_prefix("CHR"))
            .unwrap_or(s);
        Ok(match s {
            "X" | "x" => Chrom::X,
            "Y" | "y" => Chrom::Y,
            _ => Chrom::Auto,
        })
    }
}

/// The version of `eggd-pandora` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with all outgoing requests.
pub fn user_agent() -> String {
    format!("eggd-pandora/{}", VERSION)
}
