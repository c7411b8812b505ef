// Domain layer - Dashboard, panel and query model
pub mod color;
pub mod dashboard;
pub mod error;
pub mod layout;
pub mod panel;
pub mod query;
