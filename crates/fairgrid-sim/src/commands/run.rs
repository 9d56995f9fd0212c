use std::path::Path;

use fairgrid_sim::{Scenario, run_scenario};

pub fn run(path: &str, format: &str) -> anyhow::Result<()> {
    let scenario = Scenario::from_file(Path::new(path))?;
    let report = run_scenario(&scenario)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("{report}");
        }
    }

    Ok(())
}
