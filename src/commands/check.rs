use anyhow::{Context, Result};
use log::debug;

use crate::domain::model::UpdateState;

use super::report::{describe, ensure_ok};
use super::services::{Services, build_manager};

/// Check the server for a newer build and print the outcome
#[tracing::instrument(skip(services))]
pub async fn check(services: Services, json: bool) -> Result<()> {
    let manager = build_manager(services)?;
    debug!("Checking {} for updates", manager.api_url());

    let state = manager.check_for_update().await;
    if json {
        let rendered =
            serde_json::to_string_pretty(&state).context("Failed to serialize update state")?;
        println!("{}", rendered);
    } else if !matches!(state, UpdateState::Error { .. }) {
        println!("{}", describe(&state));
    }

    ensure_ok(state)?;
    Ok(())
}
