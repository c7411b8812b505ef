// Grafana dashboard builder: typed panels, grid layout and JSON round-trip
pub mod application;
pub mod domain;
pub mod infrastructure;
