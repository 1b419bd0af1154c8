//! Maintenance entry point.
//!
//! # Responsibility
//! - Open the configured database and finish interrupted account deletes.
//! - Sweep favorites that still reference deleted recipes.
//! - Print a deterministic `key=value` summary for operators and scripts.

use log::{error, info};
use recipebox_core::db::open_db;
use recipebox_core::{core_version, sqlite_engine, CoreConfig};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=maintenance module=cli status=error error={err}");
            eprintln!("recipebox maintenance failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    let logging_active = config.init_logging()?;

    let conn = open_db(&config.db_path)?;
    let engine = sqlite_engine(&conn)?;

    let resumed = engine.resume_pending_deletions()?;
    let recipes_deleted: usize = resumed.iter().map(|deletion| deletion.recipes_deleted).sum();
    let favorites_repaired = engine.repair_dangling_favorites()?;

    info!(
        "event=maintenance module=cli status=ok accounts_deleted={} recipes_deleted={} favorites_repaired={}",
        resumed.len(),
        recipes_deleted,
        favorites_repaired
    );

    println!("recipebox_core version={}", core_version());
    println!("db_path={}", config.db_path.display());
    println!("logging={}", if logging_active { "file" } else { "off" });
    println!("accounts_deleted={}", resumed.len());
    println!("recipes_deleted={recipes_deleted}");
    println!("favorites_repaired={favorites_repaired}");
    Ok(())
}
