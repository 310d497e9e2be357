/*
Divisive clustering of stations.

A node holding two or more stations starts with one leaf child per station. If every pair of
children is closer than the threshold the node terminates; otherwise the two stations furthest
apart become references, every child joins the nearer reference, and each side is rebuilt as a
fresh subtree. Recursion bottoms out at tight groups and single stations.

Termination comes in two flavours:
  Collapse: the tight node becomes final and is represented by its own centroid.
  FreezeChildren: the per-station children are marked final, one representative each.
*/

use std::str::FromStr;

use crate::error::{ClusterError, ClusterResult};
use crate::geo::Station;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Termination {
    #[default]
    Collapse,
    FreezeChildren,
}

impl FromStr for Termination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collapse" => Ok(Termination::Collapse),
            "freeze" | "freeze-children" => Ok(Termination::FreezeChildren),
            _ => Err(format!(
                "unknown termination {:?}, possible options are: (\"collapse\", \"freeze\")",
                s
            )),
        }
    }
}

/// Parameters for one clustering run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterConfig {
    threshold_km: f64,
    termination: Termination,
}

impl ClusterConfig {
    pub fn new(threshold_km: f64, termination: Termination) -> ClusterResult<Self> {
        if !threshold_km.is_finite() || threshold_km <= 0.0 {
            return Err(ClusterError::InvalidThreshold(threshold_km));
        }
        Ok(Self {
            threshold_km,
            termination,
        })
    }

    pub fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }
}

/// The station with the lowest mean distance to every other station. Ties go to the earliest.
/// Returns `None` only for an empty slice.
pub fn find_lowest_average_distance(stations: &[Station]) -> Option<Station> {
    if stations.len() < 2 {
        return stations.first().copied();
    }
    let others = (stations.len() - 1) as f64;
    let mut best: Option<(Station, f64)> = None;
    for (i, candidate) in stations.iter().enumerate() {
        let total: f64 = stations
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, other)| candidate.distance_km(other))
            .sum();
        let avg = total / others;
        match best {
            Some((_, best_avg)) if avg >= best_avg => {}
            _ => best = Some((*candidate, avg)),
        }
    }
    best.map(|(station, _)| station)
}

/// The pair of stations furthest apart, first-found under i < j ordering on ties.
pub fn find_furthest_stations(stations: &[Station]) -> ClusterResult<(Station, Station)> {
    let n = stations.len();
    if n < 2 {
        return Err(ClusterError::InsufficientPoints(n));
    }
    let mut pair = (stations[0], stations[1]);
    let mut max_distance = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = stations[i].distance_km(&stations[j]);
            if d > max_distance {
                max_distance = d;
                pair = (stations[i], stations[j]);
            }
        }
    }
    Ok(pair)
}

fn is_tight(stations: &[Station], threshold_km: f64) -> bool {
    stations.iter().enumerate().all(|(i, a)| {
        stations[i + 1..]
            .iter()
            .all(|b| a.distance_km(b) < threshold_km)
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterNode {
    centroid: Option<Station>,
    children: Vec<ClusterNode>,
    // Stations of a final node's tight group. Empty for interior nodes.
    members: Vec<Station>,
    is_final: bool,
}

impl ClusterNode {
    fn empty() -> Self {
        Self {
            centroid: None,
            children: Vec::new(),
            members: Vec::new(),
            is_final: true,
        }
    }

    fn leaf(station: Station) -> Self {
        Self {
            centroid: Some(station),
            children: Vec::new(),
            members: vec![station],
            is_final: true,
        }
    }

    /// Builds the divisive tree over `stations`.
    pub fn build(stations: Vec<Station>, config: &ClusterConfig) -> ClusterResult<Self> {
        match stations.len() {
            0 => Ok(Self::empty()),
            1 => Ok(Self::leaf(stations[0])),
            _ => {
                let mut node = Self {
                    centroid: find_lowest_average_distance(&stations),
                    children: stations.iter().copied().map(Self::leaf).collect(),
                    members: stations,
                    is_final: false,
                };
                node.split_or_terminate(config)?;
                Ok(node)
            }
        }
    }

    fn split_or_terminate(&mut self, config: &ClusterConfig) -> ClusterResult<()> {
        let centroids: Vec<Station> = self.children.iter().filter_map(|c| c.centroid).collect();
        if centroids.len() < 2 || is_tight(&centroids, config.threshold_km()) {
            self.terminate(config.termination());
            return Ok(());
        }

        let (a, b) = find_furthest_stations(&centroids)?;
        let (near_a, near_b): (Vec<ClusterNode>, Vec<ClusterNode>) =
            self.children.drain(..).partition(|child| match child.centroid {
                Some(c) => c.distance_km(&a) <= c.distance_km(&b),
                None => true,
            });

        // Only reachable with NaN coordinates; recursing would never shrink the set.
        if near_a.is_empty() || near_b.is_empty() {
            log::warn!(
                "could not separate {} stations around {} and {}, keeping them together",
                centroids.len(),
                a.id,
                b.id
            );
            self.children = near_a.into_iter().chain(near_b).collect();
            self.terminate(config.termination());
            return Ok(());
        }

        log::debug!(
            "splitting {} stations into {} + {} ({:.3} km apart)",
            centroids.len(),
            near_a.len(),
            near_b.len(),
            a.distance_km(&b)
        );
        let left = Self::build(flatten(&near_a), config)?;
        let right = Self::build(flatten(&near_b), config)?;
        self.children = vec![left, right];
        self.members.clear();
        Ok(())
    }

    fn terminate(&mut self, termination: Termination) {
        match termination {
            Termination::Collapse => {
                self.is_final = true;
                self.children.clear();
            }
            Termination::FreezeChildren => {
                for child in self.children.iter_mut() {
                    child.is_final = true;
                }
                self.members.clear();
            }
        }
    }

    pub fn centroid(&self) -> Option<&Station> {
        self.centroid.as_ref()
    }

    pub fn children(&self) -> &[ClusterNode] {
        &self.children
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_empty(&self) -> bool {
        self.centroid.is_none()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// One representative per tight group, in child order.
    pub fn cluster_free_list(&self) -> Vec<Station> {
        let mut out = Vec::new();
        self.collect_representatives(&mut out);
        out
    }

    fn collect_representatives(&self, out: &mut Vec<Station>) {
        if self.is_final {
            out.extend(self.centroid);
        } else {
            for child in &self.children {
                child.collect_representatives(out);
            }
        }
    }

    /// The tight groups themselves, aligned with `cluster_free_list`. Each group lists its
    /// representative first.
    pub fn clusters(&self) -> Vec<Vec<Station>> {
        let mut out = Vec::new();
        self.collect_clusters(&mut out);
        out
    }

    fn collect_clusters(&self, out: &mut Vec<Vec<Station>>) {
        if self.is_final {
            if let Some(centroid) = self.centroid {
                let mut group = vec![centroid];
                group.extend(self.members.iter().filter(|s| **s != centroid));
                out.push(group);
            }
        } else {
            for child in &self.children {
                child.collect_clusters(out);
            }
        }
    }

    fn stations(&self) -> Vec<Station> {
        if self.children.is_empty() {
            return self.members.clone();
        }
        flatten(&self.children)
    }
}

fn flatten(nodes: &[ClusterNode]) -> Vec<Station> {
    nodes.iter().flat_map(|n| n.stations()).collect()
}

/// Builds the tree and returns its representatives.
pub fn reduce(stations: Vec<Station>, config: &ClusterConfig) -> ClusterResult<Vec<Station>> {
    Ok(ClusterNode::build(stations, config)?.cluster_free_list())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold_km: f64) -> ClusterConfig {
        ClusterConfig::new(threshold_km, Termination::Collapse).unwrap()
    }

    fn frozen(threshold_km: f64) -> ClusterConfig {
        ClusterConfig::new(threshold_km, Termination::FreezeChildren).unwrap()
    }

    fn two_close_pairs() -> Vec<Station> {
        vec![
            Station::new(0, 0.0, 0.0),
            Station::new(1, 0.0, 0.001),
            Station::new(2, 50.0, 50.0),
            Station::new(3, 50.0, 50.001),
        ]
    }

    fn ids(stations: &[Station]) -> Vec<u64> {
        stations.iter().map(|s| s.id).collect()
    }

    fn assert_shape(node: &ClusterNode) {
        assert!(node.children().is_empty() || node.children().len() == 2);
        if !node.children().is_empty() {
            assert!(!node.is_final());
        }
        assert_eq!(node.is_empty(), node.centroid().is_none());
        for child in node.children() {
            assert_shape(child);
        }
    }

    #[test]
    fn lowest_average_of_singleton() {
        let s = Station::new(7, 10.0, 10.0);
        assert_eq!(find_lowest_average_distance(&[s]), Some(s));
        assert_eq!(find_lowest_average_distance(&[]), None);
    }

    #[test]
    fn lowest_average_picks_middle() {
        let stations = vec![
            Station::new(0, 0.0, 0.0),
            Station::new(1, 0.0, 1.0),
            Station::new(2, 0.0, 2.0),
        ];
        assert_eq!(find_lowest_average_distance(&stations).unwrap().id, 1);
    }

    #[test]
    fn lowest_average_ties_go_to_first() {
        let stations = vec![Station::new(4, 0.0, 0.0), Station::new(5, 0.0, 1.0)];
        assert_eq!(find_lowest_average_distance(&stations).unwrap().id, 4);
    }

    #[test]
    fn furthest_pair() {
        let stations = vec![
            Station::new(0, 0.0, 0.0),
            Station::new(1, 0.0, 1.0),
            Station::new(2, 0.0, 10.0),
        ];
        let (a, b) = find_furthest_stations(&stations).unwrap();
        assert_eq!((a.id, b.id), (0, 2));
    }

    #[test]
    fn furthest_pair_ties_go_to_first_pair() {
        let stations = vec![
            Station::new(0, 0.0, 0.0),
            Station::new(1, 0.0, 1.0),
            Station::new(2, 0.0, 0.0),
        ];
        let (a, b) = find_furthest_stations(&stations).unwrap();
        assert_eq!((a.id, b.id), (0, 1));
    }

    #[test]
    fn furthest_pair_skips_unmeasurable_first_pair() {
        let stations = vec![
            Station::new(0, f64::NAN, 0.0),
            Station::new(1, 0.0, 0.0),
            Station::new(2, 10.0, 10.0),
        ];
        let (a, b) = find_furthest_stations(&stations).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[test]
    fn furthest_pair_needs_two_stations() {
        assert_eq!(
            find_furthest_stations(&[]),
            Err(ClusterError::InsufficientPoints(0))
        );
        assert_eq!(
            find_furthest_stations(&[Station::new(0, 1.0, 1.0)]),
            Err(ClusterError::InsufficientPoints(1))
        );
    }

    #[test]
    fn rejects_bad_thresholds() {
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(ClusterConfig::new(t, Termination::Collapse).is_err());
        }
    }

    #[test]
    fn parses_termination() {
        assert_eq!("collapse".parse::<Termination>(), Ok(Termination::Collapse));
        assert_eq!("freeze".parse::<Termination>(), Ok(Termination::FreezeChildren));
        assert!("merge".parse::<Termination>().is_err());
    }

    #[test]
    fn empty_tree() {
        let tree = ClusterNode::build(Vec::new(), &config(1.0)).unwrap();
        assert!(tree.is_empty());
        assert!(tree.is_final());
        assert!(tree.children().is_empty());
        assert!(tree.cluster_free_list().is_empty());
        assert!(tree.clusters().is_empty());
    }

    #[test]
    fn single_station_tree() {
        let s = Station::new(3, 45.0, -75.0);
        let tree = ClusterNode::build(vec![s], &config(1.0)).unwrap();
        assert!(tree.is_final());
        assert_eq!(tree.centroid(), Some(&s));
        assert_eq!(tree.cluster_free_list(), vec![s]);
    }

    #[test]
    fn two_close_pairs_collapse_to_two() {
        let tree = ClusterNode::build(two_close_pairs(), &config(1.0)).unwrap();
        assert_shape(&tree);
        let reps = ids(&tree.cluster_free_list());
        assert_eq!(reps.len(), 2);
        assert_eq!(reps.iter().filter(|&&id| id < 2).count(), 1);
        assert_eq!(reps.iter().filter(|&&id| id >= 2).count(), 1);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn groups_line_up_with_representatives() {
        let tree = ClusterNode::build(two_close_pairs(), &config(1.0)).unwrap();
        let reps = tree.cluster_free_list();
        let groups = tree.clusters();
        assert_eq!(groups.len(), reps.len());
        for (group, rep) in groups.iter().zip(&reps) {
            assert_eq!(group.len(), 2);
            assert_eq!(group[0], *rep);
        }
        let mut all: Vec<u64> = groups.iter().flat_map(|g| ids(g)).collect();
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn freezing_keeps_one_per_station() {
        let tree = ClusterNode::build(two_close_pairs(), &frozen(1.0)).unwrap();
        assert_shape(&tree);
        assert!(!tree.is_final());
        assert_eq!(tree.children().len(), 2);
        for child in tree.children() {
            assert!(!child.is_final());
            assert!(child.children().iter().all(|c| c.is_final()));
        }
        let mut reps = ids(&tree.cluster_free_list());
        reps.sort();
        assert_eq!(reps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tight_set_collapses_to_centroid() {
        let stations = vec![
            Station::new(0, 43.0000, -79.0000),
            Station::new(1, 43.0010, -79.0000),
            Station::new(2, 43.0020, -79.0000),
        ];
        let reps = reduce(stations.clone(), &config(5.0)).unwrap();
        assert_eq!(ids(&reps), vec![1]);

        let frozen_reps = reduce(stations, &frozen(5.0)).unwrap();
        assert_eq!(ids(&frozen_reps), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_stations_collapse() {
        let stations = vec![
            Station::new(0, 10.0, 10.0),
            Station::new(1, 10.0, 10.0),
            Station::new(2, 10.0, 10.0),
        ];
        assert_eq!(ids(&reduce(stations, &config(0.5)).unwrap()), vec![0]);
    }

    #[test]
    fn distant_stations_stay_separate() {
        let stations = vec![
            Station::new(0, 0.0, 0.0),
            Station::new(1, 0.0, 10.0),
            Station::new(2, 10.0, 0.0),
            Station::new(3, 10.0, 10.0),
            Station::new(4, -10.0, -10.0),
        ];
        let tree = ClusterNode::build(stations, &config(1.0)).unwrap();
        assert_shape(&tree);
        let mut reps = ids(&tree.cluster_free_list());
        reps.sort();
        assert_eq!(reps, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reclustering_is_idempotent() {
        let cfg = config(1.0);
        let mut stations = two_close_pairs();
        stations.push(Station::new(4, -30.0, 120.0));
        stations.push(Station::new(5, -30.0, 120.002));
        let first = reduce(stations, &cfg).unwrap();
        let mut second = ids(&reduce(first.clone(), &cfg).unwrap());
        let mut first = ids(&first);
        first.sort();
        second.sort();
        assert_eq!(first, second);
    }

    #[test]
    fn equidistant_station_joins_first_reference() {
        let stations = vec![
            Station::new(0, 0.0, -1.0),
            Station::new(1, 0.0, 1.0),
            Station::new(2, 0.0, 0.0),
        ];
        let tree = ClusterNode::build(stations, &config(10.0)).unwrap();
        let mut left: Vec<u64> = tree.children()[0]
            .clusters()
            .iter()
            .flat_map(|g| ids(g))
            .collect();
        left.sort();
        assert_eq!(left, vec![0, 2]);
        assert_eq!(ids(&tree.children()[1].cluster_free_list()), vec![1]);
    }

    #[test]
    fn nan_station_does_not_recurse_forever() {
        let stations = vec![
            Station::new(0, f64::NAN, 0.0),
            Station::new(1, 0.0, 0.0),
            Station::new(2, 10.0, 10.0),
        ];

        let tree = ClusterNode::build(stations.clone(), &config(1.0)).unwrap();
        assert_shape(&tree);
        assert_eq!(ids(&tree.cluster_free_list()), vec![1, 2]);

        let tree = ClusterNode::build(stations, &frozen(1.0)).unwrap();
        assert_shape(&tree);
        assert_eq!(ids(&tree.cluster_free_list()), vec![1, 0, 2]);
    }

    #[test]
    fn output_never_exceeds_input() {
        let stations: Vec<Station> = (0..20)
            .map(|i| Station::new(i, 45.0 + (i % 5) as f64 * 0.001, -75.0 + (i / 5) as f64 * 0.3))
            .collect();
        for cfg in [config(1.0), frozen(1.0)] {
            let tree = ClusterNode::build(stations.clone(), &cfg).unwrap();
            assert_shape(&tree);
            assert!(tree.cluster_free_list().len() <= stations.len());
        }
        assert_eq!(reduce(stations, &config(1.0)).unwrap().len(), 4);
    }
}
