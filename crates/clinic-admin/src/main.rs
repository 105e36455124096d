//! Administrative command line for the clinic database.
//!
//! Configuration comes from `CLINIC_*` environment variables (a `.env`
//! file is honored); `--db` and `--actor` override them per invocation.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_core::admin::{entity_counts, find_entity};
use clinic_core::export::{AgendaExport, StockReport};
use clinic_core::{ClinicConfig, Database, Inventory, Role, StaffDirectory, UserProfile};

#[derive(Parser, Debug)]
#[command(name = "clinic-admin")]
#[command(version)]
#[command(about = "Maintenance tasks for the clinic database")]
struct CliArgs {
    /// SQLite database file (defaults to CLINIC_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Username the command acts as (defaults to CLINIC_DEFAULT_ACTOR)
    #[arg(long, global = true, value_name = "USERNAME")]
    actor: Option<String>,

    #[command(subcommand)]
    command: AdminCommand,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create the schema and the first admin profile
    Init {
        #[arg(value_name = "USERNAME")]
        admin: String,
    },
    /// Add a staff profile
    AddUser {
        #[arg(value_name = "USERNAME")]
        username: String,
        /// receptionist, doctor or admin
        #[arg(value_name = "ROLE")]
        role: String,
    },
    /// List staff profiles
    Users,
    /// Assign MED-NNNN codes to medicines that have none
    BackfillCodes,
    /// Print the stock report
    StockReport {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the agenda for a day
    Agenda {
        /// YYYY-MM-DD, today when omitted
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List lots expiring within the warning horizon
    Expiring {
        /// Overrides CLINIC_EXPIRY_WARNING_DAYS
        #[arg(long, value_name = "DAYS")]
        days: Option<u32>,
    },
    /// Recompute the movement ledger's hash chains
    VerifyLedger,
    /// Row counts per administered entity
    Entities {
        /// Show the columns of a single entity
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_core=info,clinic_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(CliArgs::parse()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let config = ClinicConfig::from_env()?;
    let db_path = args.db.unwrap_or_else(|| config.db_path.clone());
    let actor_name = args.actor.unwrap_or_else(|| config.default_actor.clone());

    let db = Database::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");

    match args.command {
        AdminCommand::Init { admin } => {
            let user = StaffDirectory::new(&db).bootstrap_admin(&admin)?;
            println!("Initialized {} with admin {}", db_path.display(), user.username);
        }
        AdminCommand::AddUser { username, role } => {
            let actor = resolve(&db, &actor_name)?;
            let role = Role::parse(&role).with_context(|| format!("unknown role {}", role))?;
            let user = StaffDirectory::new(&db).create(&actor, &username, role)?;
            println!("Created {} ({})", user.username, user.role.as_str());
        }
        AdminCommand::Users => {
            for user in StaffDirectory::new(&db).list()? {
                println!("{:<20} {}", user.username, user.role.as_str());
            }
        }
        AdminCommand::BackfillCodes => {
            let actor = resolve(&db, &actor_name)?;
            let updated = Inventory::new(&db).backfill_missing_codes(&actor)?;
            for medicine in &updated {
                println!("{} {}", medicine.code.as_deref().unwrap_or("-"), medicine.name);
            }
            println!("{} medicine(s) coded", updated.len());
        }
        AdminCommand::StockReport { format, out } => {
            let report = StockReport::build(&db, Local::now().date_naive())?;
            let body = match format {
                Format::Json => report.to_json()?,
                Format::Csv => report.to_csv(),
            };
            emit(&body, out)?;
        }
        AdminCommand::Agenda { date, format, out } => {
            let date = match date {
                Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", raw))?,
                None => Local::now().date_naive(),
            };
            let agenda = AgendaExport::build(&db, date)?;
            let body = match format {
                Format::Json => agenda.to_json()?,
                Format::Csv => agenda.to_csv(),
            };
            emit(&body, out)?;
        }
        AdminCommand::Expiring { days } => {
            let days = days.unwrap_or(config.expiry_warning_days);
            let lots = Inventory::new(&db).lots_expiring_within(days)?;
            if lots.is_empty() {
                println!("No lots expire within {} days", days);
            }
            for view in lots {
                println!(
                    "{} {:<24} qty {:>5}  {}  {}",
                    view.lot.expiration_date,
                    view.medicine_name,
                    view.lot.quantity,
                    view.lot.lot_number.as_deref().unwrap_or("-"),
                    view.status.as_str()
                );
            }
        }
        AdminCommand::VerifyLedger => {
            let report = Inventory::new(&db).verify_ledger()?;
            println!(
                "Checked {} chain(s), {} movement(s)",
                report.chains_checked, report.rows_checked
            );
            if !report.is_intact() {
                for b in &report.breaks {
                    println!("BROKEN medicine {} at seq {}: {}", b.medicine_id, b.seq, b.reason);
                }
                return Ok(ExitCode::from(2));
            }
            println!("Ledger intact");
        }
        AdminCommand::Entities { name } => match name {
            Some(name) => {
                let Some(entity) = find_entity(&name) else {
                    bail!("unknown entity {}", name);
                };
                println!("table:     {}", entity.table);
                println!("list:      {}", entity.list_display.join(", "));
                println!("search:    {}", entity.search_fields.join(", "));
                println!("read-only: {}", entity.readonly_fields.join(", "));
            }
            None => {
                for (entity, count) in entity_counts(&db)? {
                    println!("{:<20} {:>6}", entity.name, count);
                }
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn resolve(db: &Database, username: &str) -> Result<UserProfile> {
    StaffDirectory::new(db)
        .resolve(username)
        .with_context(|| format!("acting user {:?} (set --actor or CLINIC_DEFAULT_ACTOR)", username))
}

fn emit(body: &str, out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = body.len(), "export written");
        }
        None => println!("{}", body),
    }
    Ok(())
}
