use anyhow::Result;
use edu_catalog::Roster;
use edu_core::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    edu_core::init()?;

    let app = App::new()?;
    tracing::info!("Edu Portal started");

    println!("Edu Portal");
    println!("  Config directory: {}", app.config().config_dir.display());

    // Catalog: the UI substitutes placeholder data when the store is down,
    // so a failure here is reported, not fatal.
    match app.catalog().list_published_modules().await {
        Ok(modules) => {
            println!("\nPublished modules: {}", modules.len());
            for module in modules.iter().take(10) {
                println!(
                    "  [{}] {} ({}, {} lessons)",
                    module.subject,
                    module.title,
                    module.grade,
                    module.lessons.len()
                );
            }
        }
        Err(e) => {
            tracing::error!("Failed to load catalog: {}", e);
            println!("\nCatalog: {}", e.user_message());
        }
    }

    let roster = Roster::demo();
    println!("\nDemo roster:");
    for student in roster.students() {
        let average = roster.average_progress(&student.id).unwrap_or_default();
        println!("  {} - {:.0}% average", student.name, average);
    }

    // Weather board
    if app.weather().is_none() {
        println!("\nWeather: disabled (no API key)");
        return Ok(());
    }

    match app.refresh_weather(false).await {
        Ok(report) => {
            println!(
                "\nWeather ({}): {}/{} locations available, {} alerts, updated {}",
                report.status.as_str(),
                report.available_count(),
                report.entries.len(),
                report.alert_count(),
                report.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            for entry in report.entries.iter().filter(|e| e.alert) {
                if let Some(snapshot) = &entry.snapshot {
                    println!(
                        "  ALERT {} ({}): {}, rain {:.1} mm, pressure {}",
                        entry.location.name,
                        entry.location.state,
                        snapshot.condition,
                        snapshot.rain_1h,
                        snapshot
                            .pressure
                            .map(|p| format!("{:.0} hPa", p))
                            .unwrap_or_else(|| "n/a".to_string())
                    );
                }
            }
        }
        Err(e) => {
            tracing::error!("Weather refresh failed: {}", e);
            println!("\nWeather: {}", e.user_message());
        }
    }

    Ok(())
}
