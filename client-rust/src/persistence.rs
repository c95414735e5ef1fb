//! persistence.rs — run artifacts written to disk
//!
//! One directory per run: the submitted scenario payload, the raw results
//! and whichever chart datasets were fetched, all pretty-printed JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use dtw_types::ChartSlot;

use crate::state::ScenarioState;

/// Write the run artifacts under `out_dir` and return the run directory.
pub async fn save_run(out_dir: &Path, state: &ScenarioState) -> Result<PathBuf> {
    let run_id = Uuid::new_v4().simple().to_string();
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let dir = out_dir.join(format!("run-{stamp}-{}", &run_id[..8]));
    fs::create_dir_all(dir.join("charts"))
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    write_json(&dir.join("scenario.json"), &state.request()).await?;
    write_json(&dir.join("results.json"), &state.results).await?;

    for slot in ChartSlot::ALL {
        if let Some(chart) = state.charts.get(slot) {
            let stem = slot.path().rsplit('/').next().unwrap_or("chart");
            write_json(&dir.join("charts").join(format!("{stem}.json")), chart).await?;
        }
    }

    info!("💾 Run saved to {}", dir.display());
    Ok(dir)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
