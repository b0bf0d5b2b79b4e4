use isodecipher_rs::cluster::{chain_cluster, ClusterEntry};

fn entries(coords: &[i64]) -> Vec<ClusterEntry> {
    coords
        .iter()
        .enumerate()
        .map(|(member, &coord)| ClusterEntry { coord, member })
        .collect()
}

fn coords_of(groups: &[Vec<ClusterEntry>]) -> Vec<Vec<i64>> {
    groups
        .iter()
        .map(|g| g.iter().map(|e| e.coord).collect())
        .collect()
}

/// Each entry is compared to the last member added, not to the cluster's
/// first element: 0-10 and 10-20 are each within tolerance, so all three
/// coordinates land in one group even though the full span is twice the
/// tolerance.
#[test]
fn chain_of_adjacent_coords_merges_into_one_group() {
    let groups = chain_cluster(entries(&[0, 10, 20]), 10);
    assert_eq!(coords_of(&groups), vec![vec![0, 10, 20]]);
}

#[test]
fn gap_beyond_tolerance_splits_groups() {
    let groups = chain_cluster(entries(&[0, 10, 50, 55]), 10);
    assert_eq!(coords_of(&groups), vec![vec![0, 10], vec![50, 55]]);
}

#[test]
fn equal_coordinates_keep_input_order() {
    let input = vec![
        ClusterEntry { coord: 100, member: 2 },
        ClusterEntry { coord: 100, member: 0 },
        ClusterEntry { coord: 100, member: 1 },
    ];
    let groups = chain_cluster(input, 5);
    assert_eq!(groups.len(), 1);
    let members: Vec<usize> = groups[0].iter().map(|e| e.member).collect();
    assert_eq!(members, vec![2, 0, 1]);
}

#[test]
fn clustering_is_deterministic() {
    let input = entries(&[500, 100, 130, 480, 900]);
    let a = chain_cluster(input.clone(), 40);
    let b = chain_cluster(input, 40);
    assert_eq!(a, b);
    assert_eq!(coords_of(&a), vec![vec![100, 130], vec![480, 500], vec![900]]);
}

#[test]
fn boundary_distance_is_inclusive() {
    let groups = chain_cluster(entries(&[0, 40]), 40);
    assert_eq!(groups.len(), 1);

    let groups = chain_cluster(entries(&[0, 41]), 40);
    assert_eq!(groups.len(), 2);
}

#[test]
fn empty_and_singleton_inputs() {
    assert!(chain_cluster(Vec::new(), 10).is_empty());

    let groups = chain_cluster(entries(&[7]), 10);
    assert_eq!(coords_of(&groups), vec![vec![7]]);
}
