//! Background session sweep.
//!
//! Expired sessions are already rejected at validation time; the sweep keeps
//! the `professor_sessions` table from accumulating dead rows between the
//! on-demand cleanups triggered from the admin dashboard.

use anyhow::{Context, Result};
use tokio::time::{Duration, sleep};
use tracing::{error, info};

use crate::web::{AppState, auth};

const SWEEP_INTERVAL_MINUTES: u64 = 15;

pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(SWEEP_INTERVAL_MINUTES * 60);
        loop {
            if let Err(err) = sweep_expired_sessions(&state).await {
                error!(?err, "session sweep failed");
            }
            sleep(interval).await;
        }
    });
}

async fn sweep_expired_sessions(state: &AppState) -> Result<()> {
    let removed = auth::clean_expired_sessions(state.pool_ref())
        .await
        .context("failed to delete expired sessions")?;

    if removed > 0 {
        info!(removed, "expired sessions swept");
    }

    Ok(())
}
