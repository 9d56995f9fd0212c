use std::path::Path;

use fairgrid_core::{LocalityMode, SchedulerConfig};

pub fn check_config(path: &str) -> anyhow::Result<()> {
    let config = SchedulerConfig::from_file(Path::new(path))?;

    let mode = match config.locality_mode() {
        LocalityMode::MissedOpportunities => "missed opportunities",
        LocalityMode::ElapsedTime => "elapsed time",
    };
    println!("✓ {path} is valid");
    println!("  locality relaxation: {mode}");
    println!(
        "  delay scheduling:    {}",
        if config.delay_scheduling_enabled() { "enabled" } else { "disabled" }
    );
    print!("{}", config.to_toml_string()?);

    Ok(())
}
