//! Tag listing operations, one module per registry API flavour

pub mod distribution;
pub mod docker_hub;
pub mod google;
pub mod quay;

pub use distribution::DistributionAdapter;
pub use docker_hub::DockerHubAdapter;
pub use google::GoogleRegistryAdapter;
pub use quay::QuayAdapter;
