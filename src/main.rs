use anyhow::Result;
use clap::Parser;
use isodecipher_rs::annotation::AnnotationDb;
use isodecipher_rs::cli::{Args, BuildPanelArgs, Command};
use isodecipher_rs::features::write_panel;
use isodecipher_rs::panel::{
    build_panel, read_gene_list, summary_path, write_summary, PanelConfig,
};
use isodecipher_rs::params::{BaseParams, OverrideTable};
use isodecipher_rs::quantify;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::BuildPanel(args) => run_build_panel(args),
        Command::Quantify(args) => {
            let stats = quantify::run(&args.bam, &args.panel, &args.out_prefix)?;
            tracing::info!(
                total_records = stats.total_records,
                usable_records = stats.usable_records,
                matched_records = stats.matched_records,
                evidence_keys = stats.evidence_keys,
                out_prefix = %args.out_prefix,
                "quantification complete"
            );
            Ok(())
        }
    }
}

fn run_build_panel(args: BuildPanelArgs) -> Result<()> {
    // Configuration errors are fatal before any gene is processed.
    let overrides = args
        .custom_params
        .as_deref()
        .map(OverrideTable::load)
        .transpose()?;

    let db = AnnotationDb::open(&args.gtf)?;
    let gene_list = read_gene_list(&args.genes)?;

    let config = PanelConfig {
        base: BaseParams {
            window: args.polya_window,
            tolerance: args.end_tolerance,
        },
        strategy: args.strategy,
        overrides,
        skip_singleton: !args.no_skip_singleton,
        skip_collapsed: !args.no_skip_collapsed,
    };

    let output = build_panel(&db, &gene_list, &config);

    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let summary = summary_path(&args.out);
    write_panel(&args.out, &output.features)?;
    write_summary(&summary, &output.summary)?;

    tracing::info!(
        genes = gene_list.len(),
        informative = output.informative_genes(),
        feature_rows = output.features.len(),
        panel = %args.out.display(),
        summary = %summary.display(),
        "feature panel written"
    );
    Ok(())
}
