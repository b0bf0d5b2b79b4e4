use crate::annotation::{AnnotationDb, Gene, Transcript};
use crate::cluster::{chain_cluster, ClusterEntry};
use crate::features::{EvidenceTier, FeatureRecord, FeatureType};
use crate::params::{select_parameters, BaseParams, OverrideTable, Strategy};
use crate::utr::{resolve_three_prime, TranscriptEnd};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Immunoglobulin heavy-chain genes whose polyA groups get semantic
/// short/long names when transcript naming allows it.
pub const IG_WHITELIST: [&str; 8] = [
    "IGHM", "IGHG1", "IGHG2", "IGHG3", "IGHG4", "IGHA1", "IGHA2", "IGHE",
];

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub base: BaseParams,
    pub strategy: Strategy,
    pub overrides: Option<OverrideTable>,
    /// Skip genes with at most one transcript.
    pub skip_singleton: bool,
    /// Skip genes whose transcripts collapse into a single group.
    pub skip_collapsed: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base: BaseParams { window: 200, tolerance: 40 },
            strategy: Strategy::Balanced,
            overrides: None,
            skip_singleton: true,
            skip_collapsed: true,
        }
    }
}

/// Per-gene outcome threaded into the summary table. Gene-level failures
/// are recorded here instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneOutcome {
    NotFound,
    NoTranscripts,
    SingleTranscript,
    Collapsed,
    Informative,
    Error(String),
}

impl fmt::Display for GeneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneOutcome::NotFound => f.write_str("not_found"),
            GeneOutcome::NoTranscripts => f.write_str("no_transcripts"),
            GeneOutcome::SingleTranscript => f.write_str("single_transcript"),
            GeneOutcome::Collapsed => f.write_str("collapsed"),
            GeneOutcome::Informative => f.write_str("informative"),
            GeneOutcome::Error(msg) => write!(f, "error:{msg}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSummaryRecord {
    pub gene: String,
    pub num_groups: usize,
    pub num_transcripts: usize,
    pub status: String,
}

#[derive(Debug, Default)]
pub struct PanelOutput {
    pub features: Vec<FeatureRecord>,
    pub summary: Vec<GeneSummaryRecord>,
}

impl PanelOutput {
    pub fn informative_genes(&self) -> usize {
        self.summary
            .iter()
            .filter(|s| s.status == "informative")
            .count()
    }
}

/// One polyA isoform group: transcripts of a gene sharing a 3' end within
/// the gene's tolerance.
struct PolyAGroup<'a> {
    id: String,
    members: Vec<GroupMember<'a>>,
    representative_end: i64,
}

struct GroupMember<'a> {
    tx: &'a Transcript,
    end: TranscriptEnd,
}

/// Build the feature panel for `gene_list`. Every listed gene produces
/// exactly one summary row; failed genes contribute no feature rows and do
/// not stop the run.
pub fn build_panel(db: &AnnotationDb, gene_list: &[String], config: &PanelConfig) -> PanelOutput {
    let mut out = PanelOutput::default();

    tracing::info!(genes = gene_list.len(), "building feature panel");

    for symbol in gene_list {
        let Some(gene) = db.gene(symbol) else {
            tracing::warn!(gene = %symbol, "gene not found in annotation");
            out.summary.push(summary_row(symbol, 0, 0, &GeneOutcome::NotFound));
            continue;
        };

        match process_gene(gene, config) {
            Ok(result) => {
                out.summary.push(summary_row(
                    symbol,
                    result.num_groups,
                    result.num_transcripts,
                    &result.outcome,
                ));
                out.features.extend(result.features);
            }
            Err(e) => {
                tracing::warn!(gene = %symbol, error = %e, "failed to process gene");
                out.summary
                    .push(summary_row(symbol, 0, 0, &GeneOutcome::Error(e.to_string())));
            }
        }
    }

    out
}

fn summary_row(
    gene: &str,
    num_groups: usize,
    num_transcripts: usize,
    outcome: &GeneOutcome,
) -> GeneSummaryRecord {
    GeneSummaryRecord {
        gene: gene.to_string(),
        num_groups,
        num_transcripts,
        status: outcome.to_string(),
    }
}

struct GeneResult {
    outcome: GeneOutcome,
    num_groups: usize,
    num_transcripts: usize,
    features: Vec<FeatureRecord>,
}

fn process_gene(gene: &Gene, config: &PanelConfig) -> Result<GeneResult> {
    let num_transcripts = gene.transcripts.len();

    if num_transcripts == 0 {
        tracing::warn!(gene = %gene.symbol, "no transcripts found");
        return Ok(GeneResult {
            outcome: GeneOutcome::NoTranscripts,
            num_groups: 0,
            num_transcripts: 0,
            features: Vec::new(),
        });
    }

    if config.skip_singleton && num_transcripts <= 1 {
        tracing::debug!(gene = %gene.symbol, "skipped: only one transcript");
        return Ok(GeneResult {
            outcome: GeneOutcome::SingleTranscript,
            num_groups: 0,
            num_transcripts,
            features: Vec::new(),
        });
    }

    let (window, tolerance) = select_parameters(
        &gene.symbol,
        num_transcripts,
        config.overrides.as_ref(),
        config.base,
        config.strategy,
    );
    tracing::debug!(gene = %gene.symbol, window, tolerance, "gene-specific parameters");

    let ends: Vec<TranscriptEnd> = gene.transcripts.iter().map(resolve_three_prime).collect();
    for (tx, end) in gene.transcripts.iter().zip(&ends) {
        tracing::debug!(
            gene = %gene.symbol,
            transcript = %tx.name,
            strand = %tx.strand,
            polya = end.polya_coord,
            utr = ?end.utr_length,
            status = %end.status,
            "transcript 3' end"
        );
    }

    let entries: Vec<ClusterEntry> = ends
        .iter()
        .enumerate()
        .map(|(i, e)| ClusterEntry { coord: e.polya_coord, member: i })
        .collect();
    let clusters = chain_cluster(entries, tolerance);
    let num_groups = clusters.len();
    tracing::debug!(gene = %gene.symbol, groups = num_groups, "clustered 3' ends");

    if config.skip_collapsed && num_groups <= 1 {
        tracing::debug!(gene = %gene.symbol, "skipped: collapsed into one group");
        return Ok(GeneResult {
            outcome: GeneOutcome::Collapsed,
            num_groups,
            num_transcripts,
            features: Vec::new(),
        });
    }

    let mut features = Vec::new();
    for (i, cluster) in clusters.iter().enumerate() {
        let members: Vec<GroupMember<'_>> = cluster
            .iter()
            .map(|entry| GroupMember {
                tx: &gene.transcripts[entry.member],
                end: ends[entry.member],
            })
            .collect();

        let coord_sum: i64 = cluster.iter().map(|e| e.coord).sum();
        let representative_end = coord_sum / cluster.len() as i64;

        let group = PolyAGroup {
            id: group_id(&gene.symbol, i + 1, &members),
            members,
            representative_end,
        };
        emit_group_features(&gene.symbol, &group, window, &mut features);
    }

    Ok(GeneResult {
        outcome: GeneOutcome::Informative,
        num_groups,
        num_transcripts,
        features,
    })
}

/// Default `{gene}_polyA{i}` id, upgraded to `{gene}_{label}` when the gene
/// is IG-whitelisted and every member name maps to the same label.
fn group_id(gene: &str, index: usize, members: &[GroupMember<'_>]) -> String {
    let default = format!("{gene}_polyA{index}");

    if !IG_WHITELIST.contains(&gene) {
        return default;
    }

    let mut labels = Vec::with_capacity(members.len());
    for member in members {
        match ig_label(gene, &member.tx.name) {
            Some(label) => labels.push(label),
            None => return default,
        }
    }

    match labels.split_first() {
        Some((first, rest)) if rest.iter().all(|l| l == first) => {
            format!("{gene}_{first}")
        }
        _ => {
            tracing::warn!(
                gene = %gene,
                transcripts = %members.iter().map(|m| m.tx.name.as_str()).collect::<Vec<_>>().join(";"),
                "mixed IG labels, keeping default group id"
            );
            default
        }
    }
}

/// Short/long label for an immunoglobulin transcript name, `None` when the
/// name matches no known pattern.
fn ig_label(gene: &str, tx_name: &str) -> Option<&'static str> {
    if tx_name == "IGHG1-203" {
        return Some("short");
    }
    if tx_name.ends_with("-201") {
        return Some("short");
    }
    if tx_name.ends_with("-202") {
        return Some("long");
    }
    tracing::warn!(gene = %gene, transcript = %tx_name, "unknown IG transcript name pattern");
    None
}

fn emit_group_features(
    gene: &str,
    group: &PolyAGroup<'_>,
    window: i64,
    out: &mut Vec<FeatureRecord>,
) {
    let first = &group.members[0];
    let tx_ids: Vec<&str> = group.members.iter().map(|m| m.tx.id.as_str()).collect();
    let tx_names: Vec<&str> = group.members.iter().map(|m| m.tx.name.as_str()).collect();

    let utrs: Vec<i64> = group
        .members
        .iter()
        .filter_map(|m| m.end.utr_length)
        .collect();
    let (avg_utr, min_utr, max_utr) = if utrs.is_empty() {
        (None, None, None)
    } else {
        let sum: i64 = utrs.iter().sum();
        (
            Some(sum as f64 / utrs.len() as f64),
            utrs.iter().min().copied(),
            utrs.iter().max().copied(),
        )
    };

    out.push(FeatureRecord {
        gene: gene.to_string(),
        polya_group: group.id.clone(),
        feature_type: FeatureType::PolyAWindow,
        feature_id: format!("{}_window", group.id),
        chrom: first.tx.chrom.clone(),
        start: group.representative_end - window,
        end: group.representative_end + window,
        strand: first.tx.strand,
        transcripts: tx_ids.join(";"),
        transcript_names: tx_names.join(";"),
        avg_utr_length: avg_utr,
        min_utr_length: min_utr,
        max_utr_length: max_utr,
        evidence_tier: EvidenceTier::Tier3PolyA,
    });

    // One last-exon feature per member, carrying the group's aggregate UTR
    // stats rather than per-transcript values.
    for member in &group.members {
        out.push(FeatureRecord {
            gene: gene.to_string(),
            polya_group: group.id.clone(),
            feature_type: FeatureType::LastExonGroup,
            feature_id: format!("{}_exon_{}", group.id, member.tx.id),
            chrom: member.tx.chrom.clone(),
            start: member.end.last_exon.start,
            end: member.end.last_exon.end,
            strand: member.tx.strand,
            transcripts: member.tx.id.clone(),
            transcript_names: member.tx.name.clone(),
            avg_utr_length: avg_utr,
            min_utr_length: min_utr,
            max_utr_length: max_utr,
            evidence_tier: EvidenceTier::Tier1Group,
        });
    }
}

/// Gene symbols from a text file: one per line, `#` comments and blanks
/// ignored, de-duplicated and sorted.
pub fn read_gene_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading gene list {}", path.display()))?;
    let mut genes: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect();
    genes.sort();
    genes.dedup();
    Ok(genes)
}

/// `panel.csv` -> `panel_summary.csv`; paths without a `.csv` extension get
/// `_summary.csv` appended.
pub fn summary_path(out: &Path) -> PathBuf {
    let s = out.to_string_lossy();
    match s.strip_suffix(".csv") {
        Some(stem) => PathBuf::from(format!("{stem}_summary.csv")),
        None => PathBuf::from(format!("{s}_summary.csv")),
    }
}

pub fn write_summary(path: &Path, summary: &[GeneSummaryRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating summary {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    if summary.is_empty() {
        writer.write_record(["gene", "num_groups", "num_transcripts", "status"])?;
    }
    for row in summary {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
