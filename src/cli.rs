use crate::params::Strategy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "isodecipher-rs",
    about = "Build polyA isoform panels from annotation and quantify per-cell isoform usage",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collapse a gene's isoforms into polyA groups and emit a feature panel
    BuildPanel(BuildPanelArgs),
    /// Assign BAM reads to panel features and build per-cell count tables
    Quantify(QuantifyArgs),
}

#[derive(clap::Args, Debug)]
pub struct BuildPanelArgs {
    /// Ensembl GTF file
    #[arg(long, value_name = "GTF")]
    pub gtf: PathBuf,

    /// Gene list file (one symbol per line)
    #[arg(long, value_name = "TXT")]
    pub genes: PathBuf,

    /// Output feature panel CSV; the per-gene summary lands next to it
    #[arg(short = 'o', long = "out", value_name = "CSV")]
    pub out: PathBuf,

    /// Window size (bp) around the representative transcript end
    #[arg(long = "polya-window", default_value_t = 200)]
    pub polya_window: i64,

    /// Collapse transcripts with 3' ends within this distance (bp)
    #[arg(long = "end-tolerance", default_value_t = 40)]
    pub end_tolerance: i64,

    /// Tolerance scaling strategy
    #[arg(long, value_enum, default_value_t = Strategy::Balanced)]
    pub strategy: Strategy,

    /// Optional TSV/CSV with per-gene overrides (gene, polyA_window, end_tolerance)
    #[arg(long = "custom-params", value_name = "TSV/CSV")]
    pub custom_params: Option<PathBuf>,

    /// Include single-transcript genes (skipped by default)
    #[arg(long = "no-skip-singleton")]
    pub no_skip_singleton: bool,

    /// Include genes that collapse into one group (skipped by default)
    #[arg(long = "no-skip-collapsed")]
    pub no_skip_collapsed: bool,
}

#[derive(clap::Args, Debug)]
pub struct QuantifyArgs {
    /// Cell Ranger BAM (possorted_genome_bam.bam)
    #[arg(long, value_name = "BAM")]
    pub bam: PathBuf,

    /// Feature panel CSV from build-panel
    #[arg(long, value_name = "CSV")]
    pub panel: PathBuf,

    /// Output file prefix
    #[arg(long = "out-prefix", value_name = "PREFIX")]
    pub out_prefix: String,
}
