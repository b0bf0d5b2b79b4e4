use crate::types::{HashMap, HashMapExt, Strand, STRAND_UNKNOWN};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Bump when the serialized layout of `Gene`/`Transcript` changes so stale
/// caches are rebuilt instead of misread.
const CACHE_FORMAT_VERSION: u32 = 1;

const CACHE_EXTENSION: &str = "idb";

/// Genomic interval, 1-based inclusive on both ends (GTF convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub name: String,
    pub chrom: String,
    pub strand: Strand,
    /// Transcript bounds from the annotation; the fallback 3'-end when a
    /// transcript has no exon records.
    pub start: i64,
    pub end: i64,
    pub exons: Vec<Interval>,
    pub cds: Vec<Interval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gene {
    pub id: String,
    pub symbol: String,
    /// Transcripts in GTF record order.
    pub transcripts: Vec<Transcript>,
}

/// Gene-keyed annotation store parsed from a GTF, with an on-disk binary
/// cache next to the source file (`<gtf>.idb`). The cache is reused when it
/// is at least as new as the GTF and rebuilt otherwise.
pub struct AnnotationDb {
    genes: Vec<Gene>,
    symbol_to_idx: HashMap<String, usize>,
}

impl AnnotationDb {
    /// Open the annotation for `gtf`, going through the cache when fresh.
    pub fn open(gtf: &Path) -> Result<Self> {
        let cache = cache_path(gtf);
        if cache_is_fresh(gtf, &cache) {
            match Self::load_cache(&cache) {
                Ok(db) => {
                    tracing::info!(cache = %cache.display(), "re-using annotation cache");
                    return Ok(db);
                }
                Err(e) => {
                    tracing::warn!(cache = %cache.display(), error = %e, "annotation cache unreadable, rebuilding");
                }
            }
        }

        let db = Self::from_gtf(gtf)?;
        if let Err(e) = db.write_cache(&cache) {
            tracing::warn!(cache = %cache.display(), error = %e, "failed to write annotation cache");
        }
        Ok(db)
    }

    /// Parse a GTF directly, bypassing the cache.
    pub fn from_gtf(path: &Path) -> Result<Self> {
        let genes = load_gtf(path)?;
        Ok(Self::from_genes(genes))
    }

    pub fn from_genes(genes: Vec<Gene>) -> Self {
        let mut symbol_to_idx = HashMap::with_capacity(genes.len());
        for (idx, gene) in genes.iter().enumerate() {
            symbol_to_idx.entry(gene.symbol.clone()).or_insert(idx);
        }
        Self { genes, symbol_to_idx }
    }

    pub fn gene(&self, symbol: &str) -> Option<&Gene> {
        self.symbol_to_idx.get(symbol).map(|&idx| &self.genes[idx])
    }

    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    fn load_cache(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let (version, genes): (u32, Vec<Gene>) =
            bincode::deserialize_from(BufReader::new(file))
                .map_err(|e| anyhow!("cache deserialization failed: {e}"))?;
        if version != CACHE_FORMAT_VERSION {
            return Err(anyhow!(
                "cache format version {version} does not match expected {CACHE_FORMAT_VERSION}"
            ));
        }
        Ok(Self::from_genes(genes))
    }

    fn write_cache(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &(CACHE_FORMAT_VERSION, &self.genes))
            .map_err(|e| anyhow!("cache serialization failed: {e}"))?;
        Ok(())
    }
}

pub fn cache_path(gtf: &Path) -> PathBuf {
    let mut name = gtf.as_os_str().to_os_string();
    name.push(".");
    name.push(CACHE_EXTENSION);
    PathBuf::from(name)
}

/// A cache is fresh when it exists and the GTF has not been modified since
/// it was written.
pub fn cache_is_fresh(gtf: &Path, cache: &Path) -> bool {
    let Ok(cache_meta) = std::fs::metadata(cache) else {
        return false;
    };
    let Ok(gtf_meta) = std::fs::metadata(gtf) else {
        return false;
    };
    match (gtf_meta.modified(), cache_meta.modified()) {
        (Ok(gtf_mtime), Ok(cache_mtime)) => gtf_mtime <= cache_mtime,
        _ => false,
    }
}

fn load_gtf(path: &Path) -> Result<Vec<Gene>> {
    let reader = File::open(path).with_context(|| format!("opening GTF {}", path.display()))?;
    let mut reader = noodles::gtf::io::Reader::new(BufReader::new(reader));

    let mut genes: Vec<Gene> = Vec::new();
    let mut gene_idx_by_id: HashMap<String, usize> = HashMap::new();
    // transcript_id -> (gene index, transcript index within gene)
    let mut tx_idx_by_id: HashMap<String, (usize, usize)> = HashMap::new();

    for result in reader.record_bufs() {
        let record = result?;

        let feature_type: &[u8] = record.ty().as_ref();
        if feature_type != b"gene"
            && feature_type != b"transcript"
            && feature_type != b"exon"
            && feature_type != b"CDS"
        {
            continue;
        }

        let attrs = record.attributes();
        let gene_id = get_record_buf_attribute(attrs, b"gene_id")
            .ok_or_else(|| anyhow!("missing gene_id in GTF attributes"))?;

        let gene_idx = *gene_idx_by_id.entry(gene_id.clone()).or_insert_with(|| {
            genes.push(Gene {
                id: gene_id.clone(),
                symbol: String::new(),
                transcripts: Vec::new(),
            });
            genes.len() - 1
        });

        if let Some(symbol) = get_record_buf_attribute(attrs, b"gene_name") {
            if genes[gene_idx].symbol.is_empty() {
                genes[gene_idx].symbol = symbol;
            }
        }

        if feature_type == b"gene" {
            continue;
        }

        let transcript_id = get_record_buf_attribute(attrs, b"transcript_id")
            .ok_or_else(|| anyhow!("missing transcript_id in GTF attributes"))?;

        let start = record.start().get() as i64;
        let end = record.end().get() as i64;

        let (g_idx, t_idx) = *tx_idx_by_id.entry(transcript_id.clone()).or_insert_with(|| {
            let chrom = record.reference_sequence_name().to_string();
            let strand = strand_to_char(record.strand());
            let name =
                get_record_buf_attribute(attrs, b"transcript_name").unwrap_or_default();
            genes[gene_idx].transcripts.push(Transcript {
                id: transcript_id.clone(),
                name,
                chrom,
                strand,
                start,
                end,
                exons: Vec::new(),
                cds: Vec::new(),
            });
            (gene_idx, genes[gene_idx].transcripts.len() - 1)
        });

        let tx = &mut genes[g_idx].transcripts[t_idx];
        match feature_type {
            b"transcript" => {
                tx.start = start;
                tx.end = end;
                if tx.name.is_empty() {
                    if let Some(name) = get_record_buf_attribute(attrs, b"transcript_name") {
                        tx.name = name;
                    }
                }
            }
            b"exon" => tx.exons.push(Interval { start, end }),
            b"CDS" => tx.cds.push(Interval { start, end }),
            _ => unreachable!(),
        }
    }

    // Fall back to the bare gene_id when a gene carries no gene_name.
    for gene in &mut genes {
        if gene.symbol.is_empty() {
            gene.symbol = gene.id.clone();
        }
    }

    Ok(genes)
}

fn get_record_buf_attribute(
    attrs: &noodles::gff::feature::record_buf::Attributes,
    key: &[u8],
) -> Option<String> {
    let value = attrs.get(key)?;
    value.iter().next().map(|v| v.to_string())
}

fn strand_to_char(strand: noodles::gff::feature::record::Strand) -> Strand {
    use noodles::gff::feature::record::Strand;
    match strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
        Strand::None | Strand::Unknown => STRAND_UNKNOWN,
    }
}
