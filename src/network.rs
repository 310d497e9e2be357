use fnv::{FnvHashMap, FnvHashSet};

use crate::cluster::{ClusterConfig, ClusterNode};
use crate::error::ClusterResult;
use crate::geo::{Station, StationId};

/// The station graph clustering reads from and rewrites.
pub trait StationNetwork {
    fn list_stations(&self) -> Vec<Station>;

    /// Removes every station and every leg.
    fn clear(&mut self);

    /// Adds a station, optionally connected to stations already in the network.
    fn add_station(&mut self, station: Station, legs: Option<&[StationId]>);

    fn leg_count(&self) -> usize;
}

/// In-memory station graph with undirected legs. Stations keep insertion order.
#[derive(Debug, Default)]
pub struct ChargeNetwork {
    stations: Vec<Station>,
    index: FnvHashMap<StationId, usize>,
    legs: FnvHashMap<StationId, FnvHashSet<StationId>>,
}

impl ChargeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        let mut network = Self::new();
        for station in stations {
            network.add_station(station, None);
        }
        network
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.index.get(&id).map(|&idx| &self.stations[idx])
    }

    /// Connects two stations. Returns false if either is missing or they are the same station.
    pub fn connect(&mut self, a: StationId, b: StationId) -> bool {
        if a == b || !self.index.contains_key(&a) || !self.index.contains_key(&b) {
            return false;
        }
        self.legs.entry(a).or_default().insert(b);
        self.legs.entry(b).or_default().insert(a);
        true
    }

    pub fn legs(&self, id: StationId) -> Vec<StationId> {
        let mut out: Vec<StationId> = self
            .legs
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }
}

impl StationNetwork for ChargeNetwork {
    fn list_stations(&self) -> Vec<Station> {
        self.stations.clone()
    }

    fn clear(&mut self) {
        self.stations.clear();
        self.index.clear();
        self.legs.clear();
    }

    fn add_station(&mut self, station: Station, legs: Option<&[StationId]>) {
        match self.index.get(&station.id) {
            Some(&idx) => self.stations[idx] = station,
            None => {
                self.index.insert(station.id, self.stations.len());
                self.stations.push(station);
            }
        }
        for &other in legs.unwrap_or_default() {
            self.connect(station.id, other);
        }
    }

    fn leg_count(&self) -> usize {
        self.legs.values().map(|set| set.len()).sum::<usize>() / 2
    }
}

/// What a clustering pass did to a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterReport {
    pub input: usize,
    pub representatives: usize,
    pub legs_dropped: usize,
}

/// Replaces the network's stations with one representative per tight cluster.
///
/// Every leg in the network is destroyed; only station positions survive.
pub fn cluster_network<N: StationNetwork>(
    network: &mut N,
    config: &ClusterConfig,
) -> ClusterResult<ClusterReport> {
    let stations = network.list_stations();
    let input = stations.len();
    let legs_dropped = network.leg_count();

    let tree = ClusterNode::build(stations, config)?;
    let representatives = tree.cluster_free_list();

    network.clear();
    for station in &representatives {
        network.add_station(*station, None);
    }

    log::info!(
        "clustered {} stations into {} representatives ({} km threshold, {} legs dropped)",
        input,
        representatives.len(),
        config.threshold_km(),
        legs_dropped
    );

    Ok(ClusterReport {
        input,
        representatives: representatives.len(),
        legs_dropped,
    })
}
