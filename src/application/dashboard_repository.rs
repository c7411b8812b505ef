// Repository traits for the dashboard backend and the host inventory
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Fetch the raw JSON of the dashboard with the given uid
    async fn fetch(&self, uid: &str) -> anyhow::Result<String>;

    /// Store a dashboard document, returning the uid the backend assigned
    /// when it reports one
    async fn push(&self, document: &Value) -> anyhow::Result<Option<String>>;
}

#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Sorted names of the hosts in a host group
    async fn hosts_in_group(&self, group: &str) -> anyhow::Result<Vec<String>>;
}
