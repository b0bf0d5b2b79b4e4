use crate::annotation::{Interval, Transcript};
use std::fmt;

/// Outcome of 3'-UTR computation for one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtrStatus {
    Valid,
    /// CDS overlaps or extends beyond the last exon; no distinct 3' UTR.
    InvalidOrNegative,
    MissingCds,
    MissingStrand,
}

impl fmt::Display for UtrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UtrStatus::Valid => "valid",
            UtrStatus::InvalidOrNegative => "invalid_or_negative",
            UtrStatus::MissingCds => "missing_CDS",
            UtrStatus::MissingStrand => "missing_strand",
        };
        f.write_str(s)
    }
}

/// The 3' end of one transcript: last exon, UTR length (when computable),
/// and the coordinate used for polyA clustering.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptEnd {
    pub last_exon: Interval,
    /// `Some` only when `status == Valid`; absent values never become a
    /// numeric sentinel.
    pub utr_length: Option<i64>,
    pub status: UtrStatus,
    /// `last_exon.end` on '+', `last_exon.start` on '-'; the transcript's
    /// own boundary when it has no exons. Unknown strand uses the '+' rule.
    pub polya_coord: i64,
}

/// Compute the 3' end of a transcript. Deterministic, no side effects.
pub fn resolve_three_prime(tx: &Transcript) -> TranscriptEnd {
    let minus = tx.strand == '-';

    let last_exon = if tx.exons.is_empty() {
        Interval { start: tx.start, end: tx.end }
    } else if minus {
        *tx.exons
            .iter()
            .min_by_key(|e| e.start)
            .expect("non-empty exon list")
    } else {
        // '+' and unknown strands both use the rightmost exon.
        *tx.exons
            .iter()
            .max_by_key(|e| e.end)
            .expect("non-empty exon list")
    };

    let polya_coord = if minus { last_exon.start } else { last_exon.end };

    if tx.cds.is_empty() {
        return TranscriptEnd {
            last_exon,
            utr_length: None,
            status: UtrStatus::MissingCds,
            polya_coord,
        };
    }

    let (utr_length, status) = match tx.strand {
        '+' => {
            let cds_end = tx.cds.iter().map(|c| c.end).max().expect("non-empty CDS list");
            classify(last_exon.end - cds_end)
        }
        '-' => {
            let cds_start = tx.cds.iter().map(|c| c.start).min().expect("non-empty CDS list");
            classify(cds_start - last_exon.start)
        }
        _ => (None, UtrStatus::MissingStrand),
    };

    TranscriptEnd { last_exon, utr_length, status, polya_coord }
}

fn classify(len: i64) -> (Option<i64>, UtrStatus) {
    if len > 0 {
        (Some(len), UtrStatus::Valid)
    } else {
        (None, UtrStatus::InvalidOrNegative)
    }
}
