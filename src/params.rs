use crate::types::{HashMap, HashMapExt};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Genes with more transcripts than this get the complex-gene tolerance
/// multiplier.
pub const COMPLEX_GENE_TRANSCRIPTS: usize = 15;

/// Fatal configuration errors, raised before any gene is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown strategy: {0} (choose from precise, balanced, sensitive)")]
    UnknownStrategy(String),

    #[error("malformed override file {path}: {reason}")]
    MalformedOverrideFile { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Clustering strategy: trades precision for sensitivity by scaling the
/// end tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// High precision, avoids false merging; best for known functional isoforms.
    Precise,
    /// Good default for most use cases.
    Balanced,
    /// Detects more signals; good for exploratory analysis.
    Sensitive,
}

impl Strategy {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "precise" => Ok(Strategy::Precise),
            "balanced" => Ok(Strategy::Balanced),
            "sensitive" => Ok(Strategy::Sensitive),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    /// `(complex_multiplier, standard_multiplier)` applied to the end
    /// tolerance.
    pub fn multipliers(self) -> (f64, f64) {
        match self {
            Strategy::Precise => (1.0, 0.5),
            Strategy::Balanced => (1.5, 1.0),
            Strategy::Sensitive => (2.0, 1.5),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Precise => "precise",
            Strategy::Balanced => "balanced",
            Strategy::Sensitive => "sensitive",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Base polyA window and end tolerance, before per-gene adjustment.
#[derive(Debug, Clone, Copy)]
pub struct BaseParams {
    pub window: i64,
    pub tolerance: i64,
}

#[derive(Debug, Deserialize)]
struct OverrideRow {
    gene: String,
    #[serde(rename = "polyA_window")]
    polya_window: i64,
    end_tolerance: i64,
}

/// User-supplied per-gene parameters; a listed gene wins unconditionally
/// over base values and strategy.
#[derive(Debug, Default, Clone)]
pub struct OverrideTable {
    params: HashMap<String, (i64, i64)>,
}

impl OverrideTable {
    /// Load a TSV or CSV with columns `gene, polyA_window, end_tolerance`.
    /// The delimiter is sniffed from the header line. Missing columns,
    /// unparsable values, and duplicate genes are all fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedOverrideFile {
            path: path.display().to_string(),
            reason,
        };

        let mut first_line = String::new();
        BufReader::new(File::open(path)?).read_line(&mut first_line)?;
        let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(|e| malformed(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .clone();
        for required in ["gene", "polyA_window", "end_tolerance"] {
            if !headers.iter().any(|h| h.trim() == required) {
                return Err(malformed(format!("missing required column '{required}'")));
            }
        }

        let mut params = HashMap::new();
        for result in reader.deserialize::<OverrideRow>() {
            let row = result.map_err(|e| malformed(e.to_string()))?;
            if params
                .insert(row.gene.clone(), (row.polya_window, row.end_tolerance))
                .is_some()
            {
                return Err(malformed(format!("duplicate gene '{}'", row.gene)));
            }
        }

        tracing::info!(
            path = %path.display(),
            genes = params.len(),
            "loaded gene-specific parameter overrides"
        );
        Ok(Self { params })
    }

    pub fn get(&self, gene: &str) -> Option<(i64, i64)> {
        self.params.get(gene).copied()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Build a table directly, bypassing file parsing.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, i64, i64)>) -> Self {
        let mut params = HashMap::new();
        for (gene, window, tolerance) in entries {
            params.insert(gene.to_string(), (window, tolerance));
        }
        Self { params }
    }
}

/// Pick `(window, tolerance)` for one gene. Overrides win unconditionally;
/// otherwise the strategy scales the tolerance by transcript count and the
/// window passes through unscaled.
pub fn select_parameters(
    gene: &str,
    num_transcripts: usize,
    overrides: Option<&OverrideTable>,
    base: BaseParams,
    strategy: Strategy,
) -> (i64, i64) {
    if let Some(params) = overrides.and_then(|t| t.get(gene)) {
        return params;
    }

    let (complex, standard) = strategy.multipliers();
    let multiplier = if num_transcripts > COMPLEX_GENE_TRANSCRIPTS {
        complex
    } else {
        standard
    };
    (base.window, (base.tolerance as f64 * multiplier) as i64)
}
