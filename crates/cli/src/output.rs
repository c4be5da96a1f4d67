//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use sentinel_lib::{PredictResponse, RiskLevel, TrackedVariable};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Unit suffix for a tracked variable
pub fn unit(variable: TrackedVariable) -> &'static str {
    match variable {
        TrackedVariable::DissolvedOxygen | TrackedVariable::Ammonia => " mg/L",
        TrackedVariable::Temperature => " °C",
        TrackedVariable::Turbidity => " NTU",
        TrackedVariable::Ph => "",
    }
}

/// Format a reading with its unit
pub fn format_reading(variable: TrackedVariable, value: f64) -> String {
    format!("{:.2}{}", value, unit(variable))
}

/// Color a risk level by severity
pub fn color_risk_level(level: RiskLevel) -> String {
    match level {
        RiskLevel::Safe => level.as_str().green().bold().to_string(),
        RiskLevel::Warning => level.as_str().yellow().bold().to_string(),
        RiskLevel::DangerActionNeeded => level.as_str().red().bold().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Row for the forecast table
#[derive(Tabled, Serialize)]
struct ForecastRow {
    #[tabled(rename = "Variable")]
    variable: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Next Interval")]
    forecast: String,
}

/// Print a pond assessment
pub fn print_assessment(response: &PredictResponse, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    println!("{}", "Pond Assessment".bold());
    println!("{}", "=".repeat(50));
    println!("Species:    {}", response.species.cyan());
    println!(
        "Risk:       {} (score {})",
        color_risk_level(response.risk_level),
        response.score
    );
    println!();

    let rows: Vec<ForecastRow> = response
        .prediction_next_interval
        .iter()
        .map(|(variable, forecast)| ForecastRow {
            variable: variable.to_string(),
            current: response
                .current_values
                .value(variable)
                .map(|v| format_reading(variable, v))
                .unwrap_or_else(|| "-".to_string()),
            forecast: format_reading(variable, *forecast),
        })
        .collect();
    print_table(&rows, format);

    let missing: Vec<&str> = TrackedVariable::ALL
        .iter()
        .filter(|v| !response.prediction_next_interval.contains(**v))
        .map(TrackedVariable::as_str)
        .collect();
    if !missing.is_empty() {
        print_warning(&format!("No forecast for: {}", missing.join(", ")));
    }

    println!();
    if response.details.is_empty() {
        print_success("No risk factors detected");
    } else {
        println!("{}", "Risk Factors".bold());
        println!("{}", "-".repeat(50));
        for reason in &response.details {
            println!("  • {}", reason);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reading_units() {
        assert_eq!(format_reading(TrackedVariable::DissolvedOxygen, 5.126), "5.13 mg/L");
        assert_eq!(format_reading(TrackedVariable::Ph, 7.8), "7.80");
        assert_eq!(format_reading(TrackedVariable::Temperature, 28.0), "28.00 °C");
    }

    #[test]
    fn test_color_risk_level_keeps_label() {
        colored::control::set_override(false);
        assert_eq!(color_risk_level(RiskLevel::DangerActionNeeded), "DANGER_ACTION_NEEDED");
        assert_eq!(color_status("degraded"), "degraded");
    }
}
