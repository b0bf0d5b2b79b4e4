use isodecipher_rs::features::{EvidenceTier, FeatureIndex, FeatureRecord, FeatureType};
use isodecipher_rs::quantify::{
    count_table, fraction_table, qc_table, AlignmentEvent, CountRecord, Evidence,
};

fn window_feature(gene: &str, group: &str, chrom: &str, start: i64, end: i64, strand: char) -> FeatureRecord {
    FeatureRecord {
        gene: gene.to_string(),
        polya_group: group.to_string(),
        feature_type: FeatureType::PolyAWindow,
        feature_id: format!("{group}_window"),
        chrom: chrom.to_string(),
        start,
        end,
        strand,
        transcripts: "T1".to_string(),
        transcript_names: format!("{gene}-201"),
        avg_utr_length: Some(100.0),
        min_utr_length: Some(100),
        max_utr_length: Some(100),
        evidence_tier: EvidenceTier::Tier3PolyA,
    }
}

fn exon_feature(gene: &str, group: &str, chrom: &str, start: i64, end: i64, strand: char) -> FeatureRecord {
    FeatureRecord {
        feature_type: FeatureType::LastExonGroup,
        feature_id: format!("{group}_exon_T1"),
        evidence_tier: EvidenceTier::Tier1Group,
        ..window_feature(gene, group, chrom, start, end, strand)
    }
}

fn event(cell: &str, umi: &str, chrom: &str, start: i64, end: i64, reverse: bool) -> AlignmentEvent {
    AlignmentEvent {
        cell_barcode: Some(cell.to_string()),
        umi: Some(umi.to_string()),
        chrom: chrom.to_string(),
        reference_start: start,
        reference_end: end,
        is_reverse: reverse,
    }
}

#[test]
fn forward_read_end_matches_window_feature() {
    let features = vec![window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+')];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    let hits = evidence.observe(&event("CELL1", "UMI1", "chr1", 50, 105, false), &features, &index);
    assert_eq!(hits, 1);

    let counts = count_table(&evidence);
    assert_eq!(
        counts,
        vec![CountRecord {
            cell: "CELL1".to_string(),
            gene: "G1".to_string(),
            polya_group: "G1_polyA1".to_string(),
            umis: 1,
        }]
    );

    let qc = qc_table(&evidence);
    assert_eq!(qc.len(), 1);
    assert_eq!(qc[0].evidence_tier, EvidenceTier::Tier3PolyA);
    assert_eq!(qc[0].count, 1);
}

#[test]
fn matching_position_depends_on_strand() {
    let fw = event("C", "U", "chr1", 50, 105, false);
    assert_eq!(fw.matching_position(), 105);
    assert_eq!(fw.strand(), '+');

    let rc = event("C", "U", "chr1", 50, 105, true);
    assert_eq!(rc.matching_position(), 50);
    assert_eq!(rc.strand(), '-');
}

#[test]
fn containment_is_inclusive_on_both_ends() {
    let features = vec![window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+')];
    let index = FeatureIndex::build(&features);

    assert_eq!(index.hits("chr1", '+', 100), vec![0]);
    assert_eq!(index.hits("chr1", '+', 110), vec![0]);
    assert!(index.hits("chr1", '+', 99).is_empty());
    assert!(index.hits("chr1", '+', 111).is_empty());
}

#[test]
fn chrom_and_strand_must_both_match() {
    let features = vec![window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+')];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    // Reverse read: matching position falls inside the window but the
    // strand differs.
    assert_eq!(
        evidence.observe(&event("C", "U", "chr1", 105, 200, true), &features, &index),
        0
    );
    // Wrong chromosome.
    assert_eq!(
        evidence.observe(&event("C", "U", "chr2", 50, 105, false), &features, &index),
        0
    );
    assert_eq!(evidence.num_keys(), 0);
}

#[test]
fn records_missing_tags_are_skipped_silently() {
    let features = vec![window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+')];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    let mut no_umi = event("CELL1", "UMI1", "chr1", 50, 105, false);
    no_umi.umi = None;
    let mut no_cell = event("CELL1", "UMI1", "chr1", 50, 105, false);
    no_cell.cell_barcode = None;

    assert_eq!(evidence.observe(&no_umi, &features, &index), 0);
    assert_eq!(evidence.observe(&no_cell, &features, &index), 0);
    assert!(count_table(&evidence).is_empty());
    assert!(qc_table(&evidence).is_empty());
}

#[test]
fn umis_deduplicate_but_tier_counts_do_not() {
    let features = vec![window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+')];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    evidence.observe(&event("CELL1", "UMI1", "chr1", 50, 105, false), &features, &index);
    evidence.observe(&event("CELL1", "UMI1", "chr1", 50, 107, false), &features, &index);
    evidence.observe(&event("CELL1", "UMI2", "chr1", 50, 108, false), &features, &index);

    let counts = count_table(&evidence);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].umis, 2);

    // Three match events, regardless of UMI dedup.
    assert_eq!(qc_table(&evidence)[0].count, 3);
}

#[test]
fn one_read_can_hit_window_and_exon_features() {
    let features = vec![
        window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+'),
        exon_feature("G1", "G1_polyA1", "chr1", 90, 120, '+'),
    ];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    let hits = evidence.observe(&event("CELL1", "UMI1", "chr1", 50, 105, false), &features, &index);
    assert_eq!(hits, 2);

    // Both hits fold into the same evidence key.
    let counts = count_table(&evidence);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].umis, 1);

    // Each tier counted once.
    let qc = qc_table(&evidence);
    assert_eq!(qc.len(), 2);
    assert!(qc.iter().all(|row| row.count == 1));
}

#[test]
fn fractions_sum_to_one_per_cell_gene() {
    let features = vec![
        window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+'),
        window_feature("G1", "G1_polyA2", "chr1", 500, 510, '+'),
    ];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    evidence.observe(&event("CELL1", "U1", "chr1", 50, 105, false), &features, &index);
    evidence.observe(&event("CELL1", "U2", "chr1", 50, 105, false), &features, &index);
    evidence.observe(&event("CELL1", "U3", "chr1", 450, 505, false), &features, &index);

    let counts = count_table(&evidence);
    let fractions = fraction_table(&counts);
    assert_eq!(fractions.len(), 2);

    let total: f64 = fractions.iter().map(|r| r.fraction).sum();
    assert!((total - 1.0).abs() < 1e-12);

    let by_group: Vec<(&str, f64)> = fractions
        .iter()
        .map(|r| (r.polya_group.as_str(), r.fraction))
        .collect();
    assert_eq!(by_group[0], ("G1_polyA1", 2.0 / 3.0));
    assert_eq!(by_group[1], ("G1_polyA2", 1.0 / 3.0));
}

#[test]
fn zero_total_yields_zero_fractions() {
    let counts = vec![
        CountRecord {
            cell: "CELL1".to_string(),
            gene: "G1".to_string(),
            polya_group: "G1_polyA1".to_string(),
            umis: 0,
        },
        CountRecord {
            cell: "CELL1".to_string(),
            gene: "G1".to_string(),
            polya_group: "G1_polyA2".to_string(),
            umis: 0,
        },
    ];
    let fractions = fraction_table(&counts);
    assert!(fractions.iter().all(|r| r.fraction == 0.0));
}

#[test]
fn aggregation_is_idempotent() {
    let features = vec![
        window_feature("G1", "G1_polyA1", "chr1", 100, 110, '+'),
        window_feature("G2", "G2_polyA1", "chr1", 900, 950, '-'),
    ];
    let index = FeatureIndex::build(&features);
    let mut evidence = Evidence::new();

    evidence.observe(&event("CELL1", "U1", "chr1", 50, 105, false), &features, &index);
    evidence.observe(&event("CELL2", "U2", "chr1", 920, 1000, true), &features, &index);
    evidence.observe(&event("CELL1", "U3", "chr1", 50, 108, false), &features, &index);

    let counts_a = count_table(&evidence);
    let counts_b = count_table(&evidence);
    assert_eq!(counts_a, counts_b);
    assert_eq!(fraction_table(&counts_a), fraction_table(&counts_b));
    assert_eq!(qc_table(&evidence), qc_table(&evidence));

    // Sorted by (cell, gene, group).
    assert_eq!(counts_a[0].cell, "CELL1");
    assert_eq!(counts_a[1].cell, "CELL2");
}
