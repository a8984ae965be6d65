use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use discipline_escalation::config::AppConfig;
use discipline_escalation::roles::join_roles;
use discipline_escalation::{
    audit_rules, db, find_students_needing_coaching, report, telemetry, PembinaanRecommender,
    PointBounds, PointCalculator, RuleCatalog, ViolationLedger,
};

#[derive(Parser)]
#[command(name = "discipline-escalation")]
#[command(about = "Violation points and coaching escalation for school discipline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample rules, tiers and violations
    Seed,
    /// Import violation records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the point breakdown for one student
    Points {
        #[arg(long)]
        student_number: String,
    },
    /// List students whose points warrant coaching
    Coaching {
        #[arg(long)]
        min_points: Option<i64>,
        #[arg(long)]
        max_points: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown coaching report
    Report {
        #[arg(long, default_value = "coaching-report.md")]
        out: PathBuf,
    },
    /// Check frequency rules for overlapping or malformed ranges
    AuditRules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} violations from {}.", csv.display());
        }
        Commands::Points { student_number } => {
            let student = db::find_student(&pool, &student_number)
                .await?
                .with_context(|| format!("no student with number {student_number}"))?;
            let catalog = RuleCatalog::new(
                db::fetch_violation_types(&pool).await?,
                db::fetch_frequency_rules(&pool).await?,
            );
            let ledger = ViolationLedger::new(db::fetch_violations(&pool, Some(student.id)).await?);
            let recommender = PembinaanRecommender::new(db::fetch_pembinaan_tiers(&pool).await?);

            let calculator = PointCalculator::new(&catalog, &ledger);
            let total_points = calculator.total_points(student.id);

            println!(
                "{} ({}, {}): {} points",
                student.full_name, student.student_number, student.class_name, total_points
            );
            for entry in calculator.breakdown(student.id) {
                println!(
                    "- {}: {} occurrence(s), {} points",
                    entry.violation_name, entry.count, entry.points
                );
                for sanction in catalog.sanctions_at(entry.violation_type_id, entry.count) {
                    let letter = sanction
                        .letter_tier
                        .map(|tier| tier.to_string())
                        .unwrap_or_else(|| "no letter".to_string());
                    println!(
                        "  latest occurrence triggers rule {} ({}, {})",
                        sanction.rule_id,
                        join_roles(&sanction.roles),
                        letter
                    );
                }
            }

            match recommender.recommend(total_points) {
                Some(recommendation) => println!(
                    "Recommendation [{}]: {} ({})",
                    recommendation.range_label,
                    recommendation.description,
                    join_roles(&recommendation.roles)
                ),
                None => println!("No coaching tier matches this total."),
            }
        }
        Commands::Coaching {
            min_points,
            max_points,
            limit,
            json,
        } => {
            let inputs = db::load_inputs(&pool).await?;
            let results = find_students_needing_coaching(
                &inputs.students,
                &inputs.catalog,
                &inputs.ledger,
                &inputs.recommender,
                PointBounds {
                    min_points,
                    max_points,
                },
            );

            if json {
                let shown: Vec<_> = results.iter().take(limit).collect();
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }

            if results.is_empty() {
                println!("No students need coaching for these bounds.");
                return Ok(());
            }

            println!("Students needing coaching:");
            for row in results.iter().take(limit) {
                println!(
                    "- {} ({}, {}) {} points [{}]: {}",
                    row.student.full_name,
                    row.student.student_number,
                    row.student.class_name,
                    row.total_points,
                    row.recommendation.range_label,
                    join_roles(&row.recommendation.roles)
                );
            }
        }
        Commands::Report { out } => {
            let inputs = db::load_inputs(&pool).await?;
            let coaching = find_students_needing_coaching(
                &inputs.students,
                &inputs.catalog,
                &inputs.ledger,
                &inputs.recommender,
                PointBounds::default(),
            );
            let report = report::build_report(
                Utc::now().date_naive(),
                &inputs.catalog,
                &inputs.ledger,
                &coaching,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::AuditRules => {
            let catalog = RuleCatalog::new(
                db::fetch_violation_types(&pool).await?,
                db::fetch_frequency_rules(&pool).await?,
            );
            let warnings = audit_rules(&catalog);

            if warnings.is_empty() {
                println!("No rule warnings.");
            } else {
                for warning in &warnings {
                    tracing::warn!(?warning, "frequency rule warning");
                    println!("- {}", warning.summary());
                }
            }
        }
    }

    Ok(())
}
