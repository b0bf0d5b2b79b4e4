//! Single-linkage chain clustering of transcript 3' ends.

/// One transcript's 3' end entering clustering. `member` indexes back into
/// the gene's transcript list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterEntry {
    pub coord: i64,
    pub member: usize,
}

/// Group entries whose 3' coordinates chain within `tolerance`.
///
/// Entries are stable-sorted by coordinate, then walked left to right: each
/// entry joins the open cluster when its distance to the *last entry added*
/// is within the tolerance, otherwise it opens a new cluster. Comparison is
/// deliberately to the previous member, not the cluster's first element or
/// centroid, so a chain of near-neighbors can span more than the tolerance
/// end to end. That drift is part of the output contract.
pub fn chain_cluster(mut entries: Vec<ClusterEntry>, tolerance: i64) -> Vec<Vec<ClusterEntry>> {
    entries.sort_by_key(|e| e.coord);

    let mut groups: Vec<Vec<ClusterEntry>> = Vec::new();
    let mut current: Vec<ClusterEntry> = Vec::new();

    for entry in entries {
        match current.last() {
            None => current.push(entry),
            Some(last) if (entry.coord - last.coord).abs() <= tolerance => {
                current.push(entry);
            }
            Some(_) => {
                groups.push(std::mem::take(&mut current));
                current.push(entry);
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
