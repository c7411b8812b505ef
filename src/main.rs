// Main entry point - Dependency injection and dashboard publishing
use std::sync::Arc;

use grafana_dashboard_builder::application::dashboard_repository::HostDirectory;
use grafana_dashboard_builder::application::dashboard_service::DashboardService;
use grafana_dashboard_builder::infrastructure::config::{
    load_dashboards_config, load_grafana_config, load_zabbix_config,
};
use grafana_dashboard_builder::infrastructure::grafana_mapper::dashboard_to_json;
use grafana_dashboard_builder::infrastructure::grafana_repository::GrafanaRepository;
use grafana_dashboard_builder::infrastructure::zabbix_repository::ZabbixRepository;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dry_run = std::env::args().skip(1).any(|arg| arg == "--dry-run");

    // Load configuration
    let grafana_config = load_grafana_config()?;
    let dashboards_config = load_dashboards_config()?;

    // Create repositories (infrastructure layer)
    let repository = Arc::new(GrafanaRepository::new(
        grafana_config.grafana.url,
        grafana_config.grafana.token,
    ));

    let hosts: Option<Arc<dyn HostDirectory>> = if dashboards_config.uses_host_groups() {
        let zabbix_config = load_zabbix_config()?;
        Some(Arc::new(ZabbixRepository::new(
            zabbix_config.zabbix.url,
            zabbix_config.zabbix.username,
            zabbix_config.zabbix.password,
        )
        .with_legacy_auth(zabbix_config.zabbix.legacy_auth)))
    } else {
        None
    };

    // Create service (application layer)
    let service = DashboardService::new(repository, hosts, dashboards_config.import_policy);

    let mut failures = 0;
    for definition in &dashboards_config.dashboards {
        let mut dashboard = match service.build(definition, dashboards_config.layout).await {
            Ok(dashboard) => dashboard,
            Err(e) => {
                tracing::error!("Failed to build dashboard '{}': {:#}", definition.title, e);
                failures += 1;
                continue;
            }
        };

        if dry_run {
            tracing::info!("\n{}", dashboard);
            println!("{}", dashboard_to_json(&dashboard)?);
            continue;
        }

        if let Err(e) = service.publish(&mut dashboard).await {
            tracing::error!("{} could not be posted: {:#}", dashboard.title(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} dashboard(s) failed", failures);
    }

    Ok(())
}
