//! assayer CLI entry point

use assayer::{
    commands::{
        cmd_add_rule, cmd_boundary_stats, cmd_classification_stats, cmd_eval_response,
        cmd_eval_retrieval, cmd_init, cmd_list_rules, cmd_remove_rule, cmd_score,
        cmd_set_rule_active, cmd_status, cmd_validate, cmd_validation_stats,
        print_boundary_stats, print_classification_stats, print_response_metric,
        print_retrieval_metric, print_rules, print_score_stats, print_status,
        print_validate_report, print_validation_stats, AddRuleOptions, ScoreOptions,
    },
    config::Config,
    error::Result,
    meta::MetaDb,
    progress::LogWriterFactory,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "assayer")]
#[command(version, about = "Content quality and retrieval validation engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize assayer configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Score a chunk dump through the full ingestion-time pipeline
    Score {
        /// Path to a JSON chunk dump file
        path: PathBuf,

        /// Override the document id recorded on the chunks
        #[arg(long)]
        document: Option<String>,
    },

    /// Run the active rule set against a scored document
    Validate {
        /// Document id to validate
        document_id: String,
    },

    /// Evaluate query-time quality
    Eval {
        #[command(subcommand)]
        target: EvalTarget,
    },

    /// Manage validation rules
    Rules {
        #[command(subcommand)]
        action: RuleAction,
    },

    /// Show aggregate statistics
    Stats {
        #[command(subcommand)]
        kind: StatsKind,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum EvalTarget {
    /// Score an executed retrieval against ground truth
    Retrieval {
        /// The query that was executed
        query: String,

        /// Retrieved chunk ids, in rank order
        #[arg(long, required = true)]
        retrieved: Vec<String>,

        /// Known-relevant chunk ids
        #[arg(long, required = true)]
        relevant: Vec<String>,

        /// Wall-clock latency of the retrieval call in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,
    },

    /// Score a generated response against its source chunks
    Response {
        /// The originating query
        query: String,

        /// The generated response text
        response: String,

        /// Source chunk ids used as generation context
        #[arg(long)]
        source: Vec<String>,
    },
}

#[derive(Subcommand)]
enum RuleAction {
    /// Add a validation rule
    Add {
        /// Rule name (unique per workspace)
        name: String,

        /// Rule type (content_quality, boundary_quality, semantic_coherence,
        /// completeness, metadata_presence, specification_count, image_count,
        /// custom)
        #[arg(long, default_value = "custom")]
        rule_type: String,

        /// Field the rule targets
        #[arg(long)]
        field: String,

        /// Comparison operator (equals, not_equals, greater_than, less_than,
        /// contains, not_contains, matches_regex, in_range)
        #[arg(long)]
        operator: String,

        /// JSON operand: scalar, or [min, max] for in_range
        #[arg(long)]
        value: String,

        /// Priority 1-100 (higher runs earlier)
        #[arg(long, default_value = "50")]
        priority: u8,

        /// Severity (info, warning, error, critical)
        #[arg(long, default_value = "warning")]
        severity: String,
    },

    /// List rules
    List,

    /// Remove a rule
    Remove {
        /// Rule id
        rule_id: String,
    },

    /// Enable a rule
    Enable {
        /// Rule id
        rule_id: String,
    },

    /// Disable a rule
    Disable {
        /// Rule id
        rule_id: String,
    },
}

#[derive(Subcommand)]
enum StatsKind {
    /// Content type counts and average confidence
    Classification,

    /// Boundary type counts and average scores
    Boundary,

    /// Validation status counts and rule effectiveness
    Validation,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "assayer", &mut std::io::stdout());
        return Ok(());
    }

    // Load configuration
    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Score { path, document } => {
            let options = ScoreOptions {
                document_id: document,
            };
            let stats = cmd_score(&config, &db, &path, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_score_stats(&stats);
            }
        }

        Commands::Validate { document_id } => {
            let report = cmd_validate(&config, &db, &document_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_validate_report(&report);
            }
        }

        Commands::Eval { target } => match target {
            EvalTarget::Retrieval {
                query,
                retrieved,
                relevant,
                latency_ms,
            } => {
                let metric =
                    cmd_eval_retrieval(&config, &db, &query, retrieved, relevant, latency_ms)
                        .await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&metric)?);
                } else {
                    print_retrieval_metric(&metric);
                }
            }

            EvalTarget::Response {
                query,
                response,
                source,
            } => {
                match cmd_eval_response(&config, &db, &query, &response, &source).await? {
                    Some(metric) => {
                        if cli.json {
                            println!("{}", serde_json::to_string_pretty(&metric)?);
                        } else {
                            print_response_metric(&metric);
                        }
                    }
                    None => {
                        eprintln!("Response could not be evaluated; see logs.");
                    }
                }
            }
        },

        Commands::Rules { action } => match action {
            RuleAction::Add {
                name,
                rule_type,
                field,
                operator,
                value,
                priority,
                severity,
            } => {
                let rule = cmd_add_rule(
                    &config,
                    &db,
                    AddRuleOptions {
                        name,
                        rule_type,
                        field,
                        operator,
                        value,
                        priority,
                        severity,
                    },
                )
                .await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&rule)?);
                } else {
                    println!("✓ Rule '{}' created (id: {})", rule.name, rule.id);
                }
            }

            RuleAction::List => {
                let rules = cmd_list_rules(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&rules)?);
                } else {
                    print_rules(&rules);
                }
            }

            RuleAction::Remove { rule_id } => {
                cmd_remove_rule(&db, &rule_id).await?;
                println!("✓ Rule {} removed", rule_id);
            }

            RuleAction::Enable { rule_id } => {
                cmd_set_rule_active(&db, &rule_id, true).await?;
                println!("✓ Rule {} enabled", rule_id);
            }

            RuleAction::Disable { rule_id } => {
                cmd_set_rule_active(&db, &rule_id, false).await?;
                println!("✓ Rule {} disabled", rule_id);
            }
        },

        Commands::Stats { kind } => match kind {
            StatsKind::Classification => {
                let stats = cmd_classification_stats(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_classification_stats(&stats);
                }
            }

            StatsKind::Boundary => {
                let stats = cmd_boundary_stats(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_boundary_stats(&stats);
                }
            }

            StatsKind::Validation => {
                let stats = cmd_validation_stats(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_validation_stats(&stats);
                }
            }
        },

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn handle_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    // If the user points at a config file, use its parent as base dir
    let base_dir = config_path.and_then(|path| {
        if path.extension().map_or(false, |e| e == "toml") {
            path.parent().map(PathBuf::from)
        } else {
            Some(path)
        }
    });

    let config = cmd_init(base_dir, force).await?;

    println!("✓ assayer initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to tune thresholds and providers");
    println!("  2. Score a chunk dump: assayer score chunks.json");
    println!("  3. Inspect results: assayer stats classification");

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'assayer init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
