//! Reduce a set of charging stations to one representative per tight geographic cluster.
//!
//! | Module           | Contents                                                       |
//! |------------------|----------------------------------------------------------------|
//! | [`geo`]          | `Station`, great-circle distance                               |
//! | [`cluster`]      | divisive cluster tree, centroid and furthest-pair selection    |
//! | [`network`]      | `StationNetwork` trait, `ChargeNetwork`, `cluster_network`     |
//! | [`stations_csv`] | station and leg CSV I/O                                        |
//! | [`error`]        | `ClusterError`, `ClusterResult`                                |

pub mod cluster;
pub mod error;
pub mod geo;
pub mod network;
pub mod stations_csv;

pub use cluster::{ClusterConfig, ClusterNode, Termination};
pub use error::{ClusterError, ClusterResult};
pub use geo::{great_circle_km, Station, StationId};
pub use network::{cluster_network, ChargeNetwork, ClusterReport, StationNetwork};
