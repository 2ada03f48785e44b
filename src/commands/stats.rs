//! Stats command implementations

use crate::config::Config;
use crate::error::Result;
use crate::meta::{BoundaryStat, ClassificationStat, MetaDb, ValidationStats};

/// Classification stats: content type -> count, average confidence
pub async fn cmd_classification_stats(
    config: &Config,
    db: &MetaDb,
) -> Result<Vec<ClassificationStat>> {
    db.classification_stats(&config.workspace).await
}

/// Boundary stats: boundary type -> count, average score
pub async fn cmd_boundary_stats(config: &Config, db: &MetaDb) -> Result<Vec<BoundaryStat>> {
    db.boundary_stats(&config.workspace).await
}

/// Validation stats: status counts plus per-rule effectiveness
pub async fn cmd_validation_stats(config: &Config, db: &MetaDb) -> Result<ValidationStats> {
    db.validation_stats(&config.workspace).await
}

/// Print classification stats to console
pub fn print_classification_stats(stats: &[ClassificationStat]) {
    if stats.is_empty() {
        println!("No classifications recorded yet.");
        return;
    }

    println!("\nClassification stats:\n");
    for stat in stats {
        println!(
            "  {:<18} {:>6}  avg confidence {:.3}",
            stat.content_type, stat.count, stat.avg_confidence
        );
    }
}

/// Print boundary stats to console
pub fn print_boundary_stats(stats: &[BoundaryStat]) {
    if stats.is_empty() {
        println!("No boundaries recorded yet.");
        return;
    }

    println!("\nBoundary stats:\n");
    for stat in stats {
        println!(
            "  {:<12} {:>6}  avg score {:.3}",
            stat.boundary_type, stat.count, stat.avg_score
        );
    }
}

/// Print validation stats to console
pub fn print_validation_stats(stats: &ValidationStats) {
    if stats.statuses.is_empty() && stats.rule_effectiveness.is_empty() {
        println!("No validation records yet.");
        return;
    }

    if !stats.statuses.is_empty() {
        println!("\nValidation status:\n");
        for stat in &stats.statuses {
            println!(
                "  {:<14} {:>6}  avg score {:.3}",
                stat.validation_status, stat.count, stat.avg_score
            );
        }
    }

    if !stats.rule_effectiveness.is_empty() {
        println!("\nRule effectiveness:\n");
        for rule in &stats.rule_effectiveness {
            println!(
                "  {:<30} applied {:>6}  failures {:>6}",
                rule.name, rule.total_applied, rule.failures
            );
        }
    }
}
