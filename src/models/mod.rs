//! Data models for the node tracker: persisted entities, daily status rows,
//! and the wire shapes returned by the JSON-RPC API.

pub mod bootstrap;
pub mod geo;
pub mod peer;
pub mod registration;
pub mod server;
pub mod snapshot;
pub mod status;

pub use bootstrap::{BootstrapNode, BootstrapNodeResponse};
pub use geo::GeoLocation;
pub use peer::ReachablePeer;
pub use registration::{
    NodeRegistration, NodeType, RegisterNodeParams, RegistrationResponse, RegistrationStatus,
};
pub use server::{GrpcServer, JsonRpcServer, Network, ServerResponse};
pub use snapshot::{CountryStats, MapNode, NetworkSnapshot, NetworkStatsReport};
pub use status::{DailyStatus, NewDailyStatus, StatusItem};
