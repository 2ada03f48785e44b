//! Rules command implementations

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::model::{RuleDefinition, Severity, ValidationRule};
use tracing::info;

/// Options for creating a rule from the CLI
#[derive(Debug, Clone)]
pub struct AddRuleOptions {
    pub name: String,
    pub rule_type: String,
    pub field: String,
    pub operator: String,
    /// JSON operand: scalar, or `[min, max]` for in_range
    pub value: String,
    pub priority: u8,
    pub severity: String,
}

/// Create a validation rule; invalid definitions are rejected here
pub async fn cmd_add_rule(
    config: &Config,
    db: &MetaDb,
    options: AddRuleOptions,
) -> Result<ValidationRule> {
    let value: serde_json::Value = serde_json::from_str(&options.value)
        .map_err(|e| Error::RuleDefinition(format!("operand is not valid JSON: {}", e)))?;

    let rule = ValidationRule::new(
        config.workspace.clone(),
        options.name,
        options.rule_type.parse()?,
        RuleDefinition {
            field: options.field,
            operator: options.operator.parse()?,
            value,
        },
        options.priority,
        options.severity.parse::<Severity>()?,
    );

    db.insert_rule(&rule).await?;
    info!("Created rule '{}' ({})", rule.name, rule.id);
    Ok(rule)
}

/// List the workspace's rules
pub async fn cmd_list_rules(config: &Config, db: &MetaDb) -> Result<Vec<ValidationRule>> {
    db.list_rules(&config.workspace).await
}

/// Delete a rule
pub async fn cmd_remove_rule(db: &MetaDb, rule_id: &str) -> Result<()> {
    db.delete_rule(rule_id).await?;
    info!("Removed rule {}", rule_id);
    Ok(())
}

/// Enable or disable a rule
pub async fn cmd_set_rule_active(db: &MetaDb, rule_id: &str, active: bool) -> Result<()> {
    db.set_rule_active(rule_id, active).await?;
    info!(
        "Rule {} {}",
        rule_id,
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Print rules to console
pub fn print_rules(rules: &[ValidationRule]) {
    if rules.is_empty() {
        println!("No rules defined. Add one with 'assayer rules add'.");
        return;
    }

    println!("\n{} rule(s):\n", rules.len());
    for rule in rules {
        let state = if rule.is_active { "active" } else { "inactive" };
        println!(
            "  [{:>3}] {} ({}, {}, {})",
            rule.priority, rule.name, rule.rule_type, rule.severity, state
        );
        println!(
            "        {} {} {}  (id: {})",
            rule.definition.field, rule.definition.operator, rule.definition.value, rule.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (Config, MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();
        (Config::default(), db, tmp)
    }

    fn options(name: &str) -> AddRuleOptions {
        AddRuleOptions {
            name: name.to_string(),
            rule_type: "content_quality".to_string(),
            field: "overall_validation_score".to_string(),
            operator: "greater_than".to_string(),
            value: "0.6".to_string(),
            priority: 50,
            severity: "warning".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_list_remove_rule() {
        let (config, db, _tmp) = setup().await;

        let rule = cmd_add_rule(&config, &db, options("min-quality")).await.unwrap();
        assert!(rule.is_active);

        let rules = cmd_list_rules(&config, &db).await.unwrap();
        assert_eq!(rules.len(), 1);

        cmd_set_rule_active(&db, &rule.id, false).await.unwrap();
        let rules = cmd_list_rules(&config, &db).await.unwrap();
        assert!(!rules[0].is_active);

        cmd_remove_rule(&db, &rule.id).await.unwrap();
        assert!(cmd_list_rules(&config, &db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rule_rejects_invalid_json_operand() {
        let (config, db, _tmp) = setup().await;
        let mut bad = options("broken");
        bad.value = "not json".to_string();
        assert!(cmd_add_rule(&config, &db, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_add_rule_rejects_unknown_operator() {
        let (config, db, _tmp) = setup().await;
        let mut bad = options("broken");
        bad.operator = "approximately".to_string();
        assert!(cmd_add_rule(&config, &db, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_add_rule_rejects_in_range_inverted_bounds() {
        let (config, db, _tmp) = setup().await;
        let mut bad = options("broken");
        bad.operator = "in_range".to_string();
        bad.value = "[0.9, 0.1]".to_string();
        assert!(cmd_add_rule(&config, &db, bad).await.is_err());
    }
}
