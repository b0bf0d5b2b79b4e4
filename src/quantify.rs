use crate::bam_input::BamInput;
use crate::features::{read_panel, EvidenceTier, FeatureIndex, FeatureRecord};
use crate::types::{HashMap, HashMapExt, HashSet, HashSetExt, Strand};
use anyhow::{Context, Result};
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::Read as HtsRead;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// One alignment record reduced to the fields quantification needs.
/// Decoupled from the BAM reader so assignment logic is testable against
/// synthetic streams.
///
/// Coordinate conventions follow htslib: `reference_start` is 0-based
/// inclusive, `reference_end` is 0-based exclusive (numerically the 1-based
/// inclusive end).
#[derive(Debug, Clone)]
pub struct AlignmentEvent {
    pub cell_barcode: Option<String>,
    pub umi: Option<String>,
    pub chrom: String,
    pub reference_start: i64,
    pub reference_end: i64,
    pub is_reverse: bool,
}

impl AlignmentEvent {
    /// The 3'-biased matching position: alignment end on the forward
    /// strand, alignment start on the reverse strand.
    pub fn matching_position(&self) -> i64 {
        if self.is_reverse {
            self.reference_start
        } else {
            self.reference_end
        }
    }

    pub fn strand(&self) -> Strand {
        if self.is_reverse {
            '-'
        } else {
            '+'
        }
    }
}

/// `(cell_barcode, gene, polyA_group)`.
pub type EvidenceKey = (String, String, String);

/// UMI evidence accumulated over one pass of the alignment stream. The UMI
/// sets grow monotonically and deduplicate repeated UMIs per key; the tier
/// counter counts every match event independently.
#[derive(Debug, Default)]
pub struct Evidence {
    umis: HashMap<EvidenceKey, HashSet<String>>,
    tier_counts: HashMap<EvidenceTier, u64>,
}

impl Evidence {
    pub fn new() -> Self {
        Self {
            umis: HashMap::new(),
            tier_counts: HashMap::new(),
        }
    }

    /// Record one event against the feature panel. Events missing either
    /// tag are skipped silently; a single event may match several features
    /// and every match bumps the tier counter.
    ///
    /// Returns the number of features hit.
    pub fn observe(
        &mut self,
        event: &AlignmentEvent,
        features: &[FeatureRecord],
        index: &FeatureIndex,
    ) -> usize {
        let (Some(cell), Some(umi)) = (&event.cell_barcode, &event.umi) else {
            return 0;
        };

        let hits = index.hits(&event.chrom, event.strand(), event.matching_position());
        for &idx in &hits {
            let feature = &features[idx];
            self.umis
                .entry((
                    cell.clone(),
                    feature.gene.clone(),
                    feature.polya_group.clone(),
                ))
                .or_insert_with(HashSet::new)
                .insert(umi.clone());
            *self.tier_counts.entry(feature.evidence_tier).or_insert(0) += 1;
        }
        hits.len()
    }

    pub fn num_keys(&self) -> usize {
        self.umis.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRecord {
    pub cell: String,
    pub gene: String,
    #[serde(rename = "polyA_group")]
    pub polya_group: String,
    #[serde(rename = "UMIs")]
    pub umis: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionRecord {
    pub cell: String,
    pub gene: String,
    #[serde(rename = "polyA_group")]
    pub polya_group: String,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRecord {
    pub evidence_tier: EvidenceTier,
    pub count: u64,
}

/// Count matrix: one row per non-empty evidence key, value = UMI set size.
/// Rows are sorted by `(cell, gene, group)` so re-aggregation from the same
/// evidence is byte-identical.
pub fn count_table(evidence: &Evidence) -> Vec<CountRecord> {
    let mut rows: Vec<CountRecord> = evidence
        .umis
        .iter()
        .map(|((cell, gene, group), umis)| CountRecord {
            cell: cell.clone(),
            gene: gene.clone(),
            polya_group: group.clone(),
            umis: umis.len() as u64,
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.cell, &a.gene, &a.polya_group).cmp(&(&b.cell, &b.gene, &b.polya_group))
    });
    rows
}

/// Per-(cell, gene) isoform usage fractions. Zero totals yield 0.0 for
/// every group rather than a division error.
pub fn fraction_table(counts: &[CountRecord]) -> Vec<FractionRecord> {
    let mut rows = Vec::with_capacity(counts.len());

    let mut i = 0;
    while i < counts.len() {
        let mut j = i;
        while j < counts.len()
            && counts[j].cell == counts[i].cell
            && counts[j].gene == counts[i].gene
        {
            j += 1;
        }
        let total: u64 = counts[i..j].iter().map(|r| r.umis).sum();
        for row in &counts[i..j] {
            let fraction = if total > 0 {
                row.umis as f64 / total as f64
            } else {
                0.0
            };
            rows.push(FractionRecord {
                cell: row.cell.clone(),
                gene: row.gene.clone(),
                polya_group: row.polya_group.clone(),
                fraction,
            });
        }
        i = j;
    }

    rows
}

/// One row per evidence tier with its accumulated match count.
pub fn qc_table(evidence: &Evidence) -> Vec<QcRecord> {
    let mut rows: Vec<QcRecord> = evidence
        .tier_counts
        .iter()
        .map(|(&evidence_tier, &count)| QcRecord { evidence_tier, count })
        .collect();
    rows.sort_by_key(|r| r.evidence_tier);
    rows
}

pub fn write_counts(path: &Path, rows: &[CountRecord]) -> Result<()> {
    write_table(path, rows, b',', &["cell", "gene", "polyA_group", "UMIs"])
}

pub fn write_fractions(path: &Path, rows: &[FractionRecord]) -> Result<()> {
    write_table(path, rows, b',', &["cell", "gene", "polyA_group", "fraction"])
}

pub fn write_qc(path: &Path, rows: &[QcRecord]) -> Result<()> {
    write_table(path, rows, b'\t', &["evidence_tier", "count"])
}

fn write_table<T: Serialize>(
    path: &Path,
    rows: &[T],
    delimiter: u8,
    header: &[&str],
) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));
    // serde only emits the header alongside the first row.
    if rows.is_empty() {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct ScanStats {
    pub total_records: u64,
    pub usable_records: u64,
    pub matched_records: u64,
    pub evidence_keys: u64,
}

/// Quantify isoform usage: scan the BAM once, assign usable reads to panel
/// features, then reduce to the three output tables.
pub fn run(bam_path: &Path, panel_path: &Path, out_prefix: &str) -> Result<ScanStats> {
    let features = read_panel(panel_path)?;
    tracing::info!(features = features.len(), panel = %panel_path.display(), "loaded feature panel");
    let index = FeatureIndex::build(&features);

    let mut bam = crate::bam_input::open_bam(bam_path)?;
    let mut evidence = Evidence::new();
    let mut stats = ScanStats::default();

    scan_bam(&mut bam, &features, &index, &mut evidence, &mut stats)?;
    stats.evidence_keys = evidence.num_keys() as u64;

    let counts = count_table(&evidence);
    let fractions = fraction_table(&counts);
    let qc = qc_table(&evidence);

    write_counts(Path::new(&format!("{out_prefix}_cell_x_polyA_counts.csv")), &counts)?;
    write_fractions(
        Path::new(&format!("{out_prefix}_cell_x_gene_isoform_fraction.csv")),
        &fractions,
    )?;
    write_qc(Path::new(&format!("{out_prefix}_isoform_qc.tsv")), &qc)?;

    Ok(stats)
}

fn scan_bam(
    bam: &mut BamInput,
    features: &[FeatureRecord],
    index: &FeatureIndex,
    evidence: &mut Evidence,
    stats: &mut ScanStats,
) -> Result<()> {
    for result in bam.reader.records() {
        let record = result?;
        stats.total_records += 1;

        if record.is_unmapped() || record.tid() < 0 {
            continue;
        }

        let cell_barcode = string_tag(&record, b"CB");
        let umi = string_tag(&record, b"UB");
        if cell_barcode.is_none() || umi.is_none() {
            continue;
        }
        stats.usable_records += 1;

        let chrom = match bam.target_names.get(record.tid() as usize) {
            Some(name) => name.clone(),
            None => continue,
        };

        let event = AlignmentEvent {
            cell_barcode,
            umi,
            chrom,
            reference_start: record.pos(),
            reference_end: record.cigar().end_pos(),
            is_reverse: record.is_reverse(),
        };

        if evidence.observe(&event, features, index) > 0 {
            stats.matched_records += 1;
        }
    }
    Ok(())
}

fn string_tag(record: &rust_htslib::bam::Record, tag: &[u8; 2]) -> Option<String> {
    match record.aux(tag) {
        Ok(Aux::String(s)) => Some(s.to_string()),
        _ => None,
    }
}
