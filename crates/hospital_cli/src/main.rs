//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured document store and report per-collection totals.
//! - Exit non-zero when the store cannot be initialized.

use hospital_core::config::log_level_from_env;
use hospital_core::{
    get_store, init_logging, Condition, Configuration, Doctor, Document, PageQuery, Patient,
    Session, SessionResult,
};
use log::{error, info};
use std::process::ExitCode;

const LOG_DIR_NAME: &str = "hospital-logs";

fn main() -> ExitCode {
    println!("hospital_core ping={}", hospital_core::ping());
    println!("hospital_core version={}", hospital_core::core_version());

    let log_dir = std::env::temp_dir().join(LOG_DIR_NAME);
    if let Err(err) = init_logging(&log_level_from_env(), &log_dir.to_string_lossy()) {
        // Logging is best effort for the smoke probe.
        eprintln!("logging disabled: {err}");
    }

    let store = match get_store() {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_store_init module=cli status=error error={}", err);
            eprintln!("store init failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "store database={} location={}",
        store.config().database,
        store.config().location
    );

    let mut session = Session::new(store);
    let report = session.open().and_then(|()| {
        Ok(vec![
            count::<Patient>(&mut session)?,
            count::<Doctor>(&mut session)?,
            count::<Condition>(&mut session)?,
            count::<Configuration>(&mut session)?,
        ])
    });
    session.close();

    match report {
        Ok(lines) => {
            info!(
                "event=cli_report module=cli status=ok collections={}",
                lines.len()
            );
            for (collection, total) in lines {
                println!("{collection}={total}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("count failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn count<T: Document>(session: &mut Session<'_>) -> SessionResult<(&'static str, u64)> {
    let result = session.query::<T>(&PageQuery::new(0, 1))?;
    Ok((T::COLLECTION, result.total))
}
