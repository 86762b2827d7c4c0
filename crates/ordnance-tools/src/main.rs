//! # Ordnance Replay
//!
//! Runs a scenario file headlessly and prints the report as JSON.
//!
//! ```text
//! ordnance-replay scenarios/skirmish.toml
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use ordnance_tools::{run, Scenario};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("ordnance=info".parse()?))
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: ordnance-replay <scenario.toml>")?;

    info!("Ordnance replay {}", env!("CARGO_PKG_VERSION"));
    let scenario = Scenario::load_from(&path).with_context(|| format!("loading {path}"))?;
    let report = run(&scenario).with_context(|| format!("running {path}"))?;

    if !report.validation.passed {
        for violation in &report.validation.violations {
            tracing::warn!("{violation}");
        }
    }
    println!("{}", report.to_json()?);
    Ok(())
}
