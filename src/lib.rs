//! isodecipher-rs: map alternative 3'-end (polyA) isoforms per gene and
//! quantify single-cell evidence for each isoform group.
//!
//! # Library usage
//!
//! ```no_run
//! use isodecipher_rs::annotation::AnnotationDb;
//! use isodecipher_rs::panel::{build_panel, PanelConfig};
//! use isodecipher_rs::features::FeatureIndex;
//!
//! // Stage 1: collapse each gene's transcripts into polyA groups.
//! // let db = AnnotationDb::open(path_to_gtf)?;
//! // let output = build_panel(&db, &gene_list, &PanelConfig::default());
//! //
//! // Stage 2: assign reads to the emitted features.
//! // let index = FeatureIndex::build(&output.features);
//! // let mut evidence = isodecipher_rs::quantify::Evidence::new();
//! // for event in alignment_events {
//! //     evidence.observe(&event, &output.features, &index);
//! // }
//! ```

// Internal modules.
pub(crate) mod bam_input;
pub(crate) mod types;

// Public modules — stable API surface.
pub mod annotation;
pub mod cli;
pub mod cluster;
pub mod features;
pub mod panel;
pub mod params;
pub mod quantify;
pub mod utr;

// Flat re-exports for the most commonly used public types.
pub use annotation::{AnnotationDb, Gene, Interval, Transcript};
pub use features::{EvidenceTier, FeatureIndex, FeatureRecord, FeatureType};
pub use panel::{build_panel, GeneOutcome, PanelConfig, PanelOutput};
pub use params::{BaseParams, ConfigError, OverrideTable, Strategy};
pub use quantify::{AlignmentEvent, Evidence};
pub use utr::{resolve_three_prime, TranscriptEnd, UtrStatus};
