//! `pizzeria_admin`: schema migrations and admin accounts.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pizzeria::config::{get_config, load_env_file};
use pizzeria::database::Database;
use pizzeria::errors::PizzeriaResult;
use pizzeria::migrations::{MigrationFailure, MigrationManager};
use pizzeria::server::auth::Role;
use pizzeria::server::logging::init_tracing;
use pizzeria::server::{create_user, NewUser};

#[derive(Parser)]
#[command(name = "pizzeria_admin")]
#[command(about = "Pizzeria admin tool - migrations and admin accounts")]
#[command(version)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Load environment variables from this file instead of .env"
    )]
    env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory of migration files")]
    migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Apply all pending migrations")]
    Migrate,

    #[command(about = "Revert the most recent migrations")]
    Rollback {
        #[arg(default_value_t = 1, help = "Number of migrations to revert (0 = all)")]
        steps: usize,

        #[arg(long, short = 'y', help = "Skip the confirmation prompt")]
        yes: bool,
    },

    #[command(about = "Show applied and pending migrations")]
    Status,

    #[command(about = "Create a user with the admin role")]
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the command ran but reported failures.
async fn run(cli: Cli) -> PizzeriaResult<bool> {
    load_env_file(cli.env_file.as_deref())?;

    let config = get_config()?;
    init_tracing(&config.logging.level);

    let db = Database::connect(&config.database).await?;
    let migrations_dir = cli
        .migrations_dir
        .unwrap_or_else(|| config.migrations_dir());
    let manager = MigrationManager::new(db.clone(), migrations_dir);

    match cli.command {
        Commands::Migrate => {
            let report = manager.run_migrations().await?;

            print_section(
                "Executed migrations",
                &report.executed,
                "No migrations were executed.",
                "✓",
            );
            print_section(
                "Skipped migrations (already applied)",
                &report.skipped,
                "No migrations were skipped.",
                "-",
            );
            print_errors(&report.errors);
            print_history(&manager).await?;

            Ok(report.is_success())
        }
        Commands::Rollback { steps, yes } => {
            let scope = if steps > 0 {
                steps.to_string()
            } else {
                "ALL".to_string()
            };
            println!("{scope} migration(s) will be reverted.");

            if !yes && !confirm("Are you sure? (y/n): ")? {
                println!("Operation cancelled.");
                return Ok(true);
            }

            let report = manager.rollback_migrations(steps).await?;

            print_section(
                "Reverted migrations",
                &report.reverted,
                "No migrations were reverted.",
                "✓",
            );
            print_errors(&report.errors);
            print_history(&manager).await?;

            Ok(report.is_success())
        }
        Commands::Status => {
            print_history(&manager).await?;
            let mut pending = Vec::new();
            for name in manager.pending().await? {
                match manager.describe(&name).await? {
                    Some(description) => pending.push(format!("{name}: {description}")),
                    None => pending.push(name),
                }
            }
            print_section("Pending migrations", &pending, "No pending migrations.", "-");
            println!();
            Ok(true)
        }
        Commands::CreateAdmin {
            username,
            email,
            password,
        } => {
            let user = NewUser {
                username,
                email,
                password,
            };
            create_admin(&db, user, config.auth.password_cost).await
        }
    }
}

async fn create_admin(db: &Arc<Database>, user: NewUser, cost: u32) -> PizzeriaResult<bool> {
    if let Err(e) = user.validate() {
        eprintln!("Invalid {}: {}", e.field, e.message);
        return Ok(false);
    }

    let id = create_user(db, &user, Role::Admin, cost).await?;
    println!("Admin user '{}' created with id {}", user.username.trim(), id);
    Ok(true)
}

fn confirm(prompt: &str) -> PizzeriaResult<bool> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

fn print_section(title: &str, items: &[String], empty: &str, marker: &str) {
    println!("\n=== {title} ===");
    if items.is_empty() {
        println!("{empty}");
    }
    for item in items {
        println!("{marker} {item}");
    }
}

fn print_errors(errors: &[MigrationFailure]) {
    println!("\n=== Errors ===");
    if errors.is_empty() {
        println!("No errors.");
    }
    for failure in errors {
        println!("✗ {}: {}", failure.migration, failure.error);
    }
}

async fn print_history(manager: &MigrationManager) -> PizzeriaResult<()> {
    let history = manager.history().await?;

    println!("\n=== Migration history ===");
    if history.is_empty() {
        println!("No migrations have been applied.");
    }
    for record in &history {
        println!("- {} ({})", record.migration, record.executed_at);
    }
    Ok(())
}
