//! Species threshold profiles

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, SpeciesList};
use crate::output::{print_table, OutputFormat};

/// Row for the species table
#[derive(Tabled, Serialize)]
struct SpeciesRow {
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "DO Danger/Warn")]
    dissolved_oxygen: String,
    #[tabled(rename = "pH Range")]
    ph: String,
    #[tabled(rename = "NH3 Warn/Danger")]
    ammonia: String,
    #[tabled(rename = "Temp Range")]
    temperature: String,
    #[tabled(rename = "Shock Δ")]
    shock: String,
}

/// List the species profiles known to the service
pub async fn list_species(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list: SpeciesList = client.get("v1/species").await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let rows: Vec<SpeciesRow> = list
        .species
        .iter()
        .map(|p| {
            let t = &p.thresholds;
            SpeciesRow {
                species: if p.is_default {
                    format!("{} {}", p.species, "(default)".dimmed())
                } else {
                    p.species.clone()
                },
                dissolved_oxygen: format!("{} / {} mg/L", t.do_danger, t.do_warning),
                ph: format!("{} - {}", t.ph_min, t.ph_max),
                ammonia: format!("{} / {} mg/L", t.ammonia_warning, t.ammonia_danger),
                temperature: format!("{} - {} °C", t.temp_min, t.temp_max),
                shock: format!("{} °C", t.temp_shock_delta),
            }
        })
        .collect();

    print_table(&rows, format);
    println!(
        "\nUnknown species are assessed with the {} profile",
        list.default_species.cyan()
    );
    Ok(())
}
