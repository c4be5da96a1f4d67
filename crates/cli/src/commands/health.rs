//! Service health and readiness

use anyhow::Result;
use colored::Colorize;
use sentinel_lib::{HealthResponse, ReadinessResponse};
use serde::Serialize;

use crate::client::ApiClient;
use crate::output::{color_status, print_warning, OutputFormat};

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

/// Show the service health probes
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (u16, HealthResponse) = client.get_with_status("healthz").await?;
    let (_, readiness): (u16, ReadinessResponse) = client.get_with_status("readyz").await?;

    if let OutputFormat::Json = format {
        let report = HealthReport { health, readiness };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let status = serde_json::to_value(health.status)?;
    println!("{}", "Sentinel Health".bold());
    println!("{}", "=".repeat(50));
    println!("Status:     {}", color_status(status.as_str().unwrap_or("unknown")));
    println!(
        "Ready:      {}",
        color_status(if readiness.ready { "ready" } else { "not ready" })
    );
    if let Some(reason) = &readiness.reason {
        print_warning(reason);
    }
    println!();

    let mut components: Vec<_> = health.components.iter().collect();
    components.sort_by(|a, b| a.0.cmp(b.0));
    println!("{}", "Components".bold());
    println!("{}", "-".repeat(50));
    for (name, component) in components {
        let status = serde_json::to_value(component.status)?;
        println!(
            "{:<12} {}{}",
            name,
            color_status(status.as_str().unwrap_or("unknown")),
            component
                .message
                .as_ref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        );
    }

    Ok(())
}
