//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{MetaDb, WorkspaceCounts};
use serde::Serialize;

/// System status report
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub workspace: String,
    pub config_path: String,
    pub db_path: String,
    pub counts: WorkspaceCounts,
}

/// Gather the workspace status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusReport> {
    let counts = db.workspace_counts(&config.workspace).await?;
    Ok(StatusReport {
        workspace: config.workspace.clone(),
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        counts,
    })
}

/// Print the status report to console
pub fn print_status(status: &StatusReport) {
    println!("\nAssayer status");
    println!("  Workspace: {}", status.workspace);
    println!("  Config: {}", status.config_path);
    println!("  Database: {}", status.db_path);
    println!("\nRecords:");
    println!("  Chunks:             {}", status.counts.chunks);
    println!("  Classifications:    {}", status.counts.classifications);
    println!("  Boundaries:         {}", status.counts.boundaries);
    println!("  Validation scores:  {}", status.counts.validation_scores);
    println!("  Stability metrics:  {}", status.counts.stability_metrics);
    println!("  Relationship edges: {}", status.counts.relationship_edges);
    println!("  Retrieval metrics:  {}", status.counts.retrieval_metrics);
    println!("  Response metrics:   {}", status.counts.response_metrics);
    println!("  Rules:              {}", status.counts.rules);
}
