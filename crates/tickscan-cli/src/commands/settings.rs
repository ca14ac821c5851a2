use serde_json::json;

use crate::cli::SettingsArgs;
use crate::error::CliError;

pub fn run(args: &SettingsArgs, pretty: bool) -> Result<(), CliError> {
    let settings = args.algorithm.to_settings()?;
    let value = json!({ "algorithm": settings });

    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{rendered}");
    Ok(())
}
