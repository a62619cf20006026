use anyhow::Result;
use parley_ai::Settings;

use crate::output::OutputFormat;
use crate::output::json::print_json;

pub fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(settings);
    }
    print!("{}", settings.to_toml()?);
    Ok(())
}
