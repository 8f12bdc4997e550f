//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `checkin_core` linkage.
//! - Resolve `CHECKIN_*` configuration and report the schema version of the
//!   configured database.

use checkin_core::db::migrations::current_version;
use checkin_core::EngineConfig;
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("checkin_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = EngineConfig::from_env().map_err(|err| err.to_string())?;
    config.init_logging().map_err(|err| err.to_string())?;

    let conn = config.open_database().map_err(|err| err.to_string())?;
    let schema_version = current_version(&conn).map_err(|err| err.to_string())?;
    info!("event=cli_probe module=cli status=ok schema_version={schema_version}");

    println!("checkin_core ping={}", checkin_core::ping());
    println!("checkin_core version={}", checkin_core::core_version());
    println!("checkin_core schema_version={schema_version}");
    Ok(())
}
