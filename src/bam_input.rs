use anyhow::Result;
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::path::Path;

pub struct BamInput {
    /// Target index -> reference name, from the BAM header.
    pub target_names: Vec<String>,
    pub reader: bam::Reader,
}

pub fn open_bam(path: &Path) -> Result<BamInput> {
    let reader = bam::Reader::from_path(path)?;
    let target_names = {
        let header = reader.header();
        header
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect()
    };
    Ok(BamInput { target_names, reader })
}
