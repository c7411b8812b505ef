// Application layer - Ports and use cases
pub mod dashboard_repository;
pub mod dashboard_service;
