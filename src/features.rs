use crate::types::{HashMap, HashMapExt, Strand};
use anyhow::{Context, Result};
use coitrees::{BasicCOITree, Interval as CoitreeInterval, IntervalTree as CoitreeIntervalTree};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    #[serde(rename = "polyA_window")]
    PolyAWindow,
    #[serde(rename = "last_exon_group")]
    LastExonGroup,
}

/// Confidence label for a read-to-feature match: a broad 3'-end window hit
/// versus a tighter per-transcript last-exon hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceTier {
    #[serde(rename = "tier1_group")]
    Tier1Group,
    #[serde(rename = "tier3_polyA")]
    Tier3PolyA,
}

impl fmt::Display for EvidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvidenceTier::Tier1Group => "tier1_group",
            EvidenceTier::Tier3PolyA => "tier3_polyA",
        };
        f.write_str(s)
    }
}

/// One row of the feature panel. Append-only: rows are never mutated after
/// emission. `Option` fields stay empty in the CSV when no member transcript
/// has a computable UTR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub gene: String,
    #[serde(rename = "polyA_group")]
    pub polya_group: String,
    pub feature_type: FeatureType,
    pub feature_id: String,
    pub chrom: String,
    /// 1-based inclusive.
    pub start: i64,
    /// 1-based inclusive.
    pub end: i64,
    pub strand: Strand,
    /// Semicolon-joined transcript ids.
    pub transcripts: String,
    /// Semicolon-joined transcript names.
    pub transcript_names: String,
    pub avg_utr_length: Option<f64>,
    pub min_utr_length: Option<i64>,
    pub max_utr_length: Option<i64>,
    pub evidence_tier: EvidenceTier,
}

pub const PANEL_HEADER: [&str; 14] = [
    "gene",
    "polyA_group",
    "feature_type",
    "feature_id",
    "chrom",
    "start",
    "end",
    "strand",
    "transcripts",
    "transcript_names",
    "avg_utr_length",
    "min_utr_length",
    "max_utr_length",
    "evidence_tier",
];

pub fn write_panel(path: &Path, features: &[FeatureRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating feature panel {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    // serde only emits the header alongside the first row; keep the header
    // present even when no gene produced features.
    if features.is_empty() {
        writer.write_record(PANEL_HEADER)?;
    }
    for row in features {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_panel(path: &Path) -> Result<Vec<FeatureRecord>> {
    let file = File::open(path)
        .with_context(|| format!("opening feature panel {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let mut features = Vec::new();
    for result in reader.deserialize::<FeatureRecord>() {
        features.push(result.with_context(|| format!("parsing {}", path.display()))?);
    }
    Ok(features)
}

/// Point-query index over feature rows, one interval tree per chromosome
/// and strand. Built once after the panel is loaded; queries return indices
/// into the feature slice the index was built from.
pub struct FeatureIndex {
    // Per chrom: (forward, reverse) trees. Unknown-strand features are not
    // indexed; reads always carry '+' or '-'.
    trees: HashMap<String, (Option<FeatureTree>, Option<FeatureTree>)>,
}

type FeatureTree = BasicCOITree<u32, u32>;

impl FeatureIndex {
    pub fn build(features: &[FeatureRecord]) -> Self {
        let mut intervals: HashMap<(String, bool), Vec<CoitreeInterval<u32>>> = HashMap::new();

        for (idx, feature) in features.iter().enumerate() {
            let reverse = match feature.strand {
                '+' => false,
                '-' => true,
                _ => continue,
            };
            // Intervals are 1-based inclusive; coitrees is end-inclusive,
            // so coordinates go in unchanged.
            intervals
                .entry((feature.chrom.clone(), reverse))
                .or_default()
                .push(CoitreeInterval::new(
                    feature.start as i32,
                    feature.end as i32,
                    idx as u32,
                ));
        }

        let mut trees: HashMap<String, (Option<FeatureTree>, Option<FeatureTree>)> =
            HashMap::new();
        for ((chrom, reverse), ivs) in intervals {
            let entry = trees.entry(chrom).or_insert((None, None));
            let slot = if reverse { &mut entry.1 } else { &mut entry.0 };
            *slot = Some(BasicCOITree::new(&ivs));
        }

        Self { trees }
    }

    /// Indices of all features on `chrom`/`strand` whose interval contains
    /// `pos` (inclusive on both ends).
    pub fn hits(&self, chrom: &str, strand: Strand, pos: i64) -> Vec<usize> {
        let Some((fw, rc)) = self.trees.get(chrom) else {
            return Vec::new();
        };
        let tree = match strand {
            '+' => fw.as_ref(),
            '-' => rc.as_ref(),
            _ => None,
        };
        let Some(tree) = tree else {
            return Vec::new();
        };

        let p = pos as i32;
        let mut found = Vec::new();
        tree.query(p, p, |node| {
            found.push(node.metadata as usize);
        });
        found.sort_unstable();
        found
    }
}
