//! Permstore CLI - inspect and prepare a permission database

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use permstore::config::{self, PermstoreConfig};
use permstore::output::{emit_success, is_quiet, OutputMode};
use permstore::platform::Detached;
use permstore::ui::{self, GroupRow, Icons};
use permstore::{Directory, GroupRegistry, Location, PermissionStore, User};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "permstore")]
#[command(version)]
#[command(about = "Inspect and prepare a permission group database")]
#[command(long_about = r#"
Permstore keeps users, permission groups and promotion tracks in SQLite.

Example usage:
  permstore init --database perms.db --prefix mp_
  permstore groups
  permstore user --name Steve
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the tables
    Init {
        /// Table name prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Show row counts per table
    Stats,

    /// Load and list every group
    Groups,

    /// Load and list every track
    Tracks,

    /// Look up one user
    User {
        /// User UUID
        #[arg(short, long, conflicts_with = "name")]
        uuid: Option<Uuid>,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Report inheritance cycles
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if is_quiet() {
        EnvFilter::new("warn")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { prefix, force } => {
            let database = cli.database.unwrap_or_else(config::default_database_path);
            let settings = PermstoreConfig {
                database: Some(database.display().to_string()),
                table_prefix: prefix,
            };
            config::write_config(&config_path, &settings, force)?;

            let mut store = open_store(&settings)?;
            let tables = store.database().tables().clone();
            store.close()?;

            if mode.is_human() {
                ui::success(&format!("Wrote {}", config_path.display()));
                ui::info("Database", &database.display().to_string());
                ui::info("Tables", &tables.all().join(", "));
            } else {
                emit_success(mode, "init", serde_json::json!({
                    "config": config_path.display().to_string(),
                    "database": database.display().to_string(),
                    "tables": tables.all(),
                }))?;
            }
        }

        Commands::Stats => {
            let mut store = open_store(&resolve_config(&config_path, cli.database)?)?;
            let stats = store.stats()?;
            store.close()?;

            if mode.is_human() {
                ui::section(&format!("{} Permstore Statistics", Icons::STATS));
                println!(
                    "{}",
                    ui::stats_table(&[
                        ("Users", stats.users.to_string().as_str()),
                        ("Groups", stats.groups.to_string().as_str()),
                        ("Tracks", stats.tracks.to_string().as_str()),
                    ])
                );
            } else {
                emit_success(mode, "stats", serde_json::to_value(&stats)?)?;
            }
        }

        Commands::Groups => {
            let mut store = open_store(&resolve_config(&config_path, cli.database)?)?;
            let mut directory = Directory::new();
            let report = store.load_groups(&mut directory.groups)?;
            store.close()?;

            let groups = &directory.groups;
            if mode.is_human() {
                if groups.is_empty() {
                    println!("∅ No groups stored.");
                } else {
                    let rows: Vec<GroupRow> = groups
                        .iter()
                        .map(|g| GroupRow {
                            name: g.name().to_string(),
                            priority: g.priority,
                            inherits: names(groups, &g.inheritance).join(", "),
                            privileges: g.privileges.len(),
                            worlds: g.worlds.join(", "),
                        })
                        .collect();
                    println!("{}", ui::render(&rows));
                }
                if !report.undecodable.is_empty() {
                    ui::warn(&format!("Unreadable documents: {}", report.undecodable.join(", ")));
                }
            } else {
                let data: Vec<_> = groups
                    .iter()
                    .map(|g| serde_json::json!({
                        "name": g.name(),
                        "priority": g.priority,
                        "inherit": names(groups, &g.inheritance),
                        "privileges": g.privileges,
                        "worlds": g.worlds,
                        "servers": g.servers,
                        "prefix": g.prefix,
                        "suffix": g.suffix,
                    }))
                    .collect();
                emit_success(mode, "groups", serde_json::json!({
                    "groups": data,
                    "report": report,
                }))?;
            }
        }

        Commands::Tracks => {
            let mut store = open_store(&resolve_config(&config_path, cli.database)?)?;
            let mut directory = Directory::new();
            store.load_all(&mut directory)?;
            store.close()?;

            if mode.is_human() {
                if directory.tracks.is_empty() {
                    println!("∅ No tracks stored.");
                }
                for track in directory.tracks.iter() {
                    let marker = if track.default_track { " (default)" } else { "" };
                    println!(
                        "{} {}{}",
                        Icons::LADDER,
                        track.name().style(ui::theme().name.clone()),
                        ui::dim(marker)
                    );
                    println!("   {}", names(&directory.groups, &track.groups).join(" → "));
                }
            } else {
                let data: Vec<_> = directory
                    .tracks
                    .iter()
                    .map(|t| serde_json::json!({
                        "name": t.name(),
                        "isdefault": t.default_track,
                        "groups": names(&directory.groups, &t.groups),
                    }))
                    .collect();
                emit_success(mode, "tracks", serde_json::json!(data))?;
            }
        }

        Commands::User { uuid, name } => {
            let mut store = open_store(&resolve_config(&config_path, cli.database)?)?;
            let mut directory = Directory::new();
            store.load_groups(&mut directory.groups)?;

            let user = match (uuid, name.as_deref()) {
                (Some(uuid), _) => store.load_user(uuid, &directory.groups)?,
                (None, Some(name)) => store.load_user_by_name(name, &directory.groups)?,
                (None, None) => anyhow::bail!("pass --uuid or --name"),
            };
            store.close()?;

            let Some(user) = user else {
                if mode.is_human() {
                    ui::error("User not found.");
                } else {
                    emit_success(mode, "user", serde_json::Value::Null)?;
                }
                return Ok(());
            };

            if mode.is_human() {
                print_user(&user, &directory.groups);
            } else {
                emit_success(mode, "user", serde_json::json!({
                    "uuid": user.uuid,
                    "name": user.name,
                    "prefix": user.prefix,
                    "suffix": user.suffix,
                    "super": user.super_user,
                    "privileges": user.privileges,
                    "groups": names(&directory.groups, user.groups()),
                }))?;
            }
        }

        Commands::Check => {
            let mut store = open_store(&resolve_config(&config_path, cli.database)?)?;
            let mut directory = Directory::new();
            store.load_groups(&mut directory.groups)?;
            store.close()?;

            let groups = &directory.groups;
            let mut cycles = Vec::new();
            for group in groups.iter() {
                for (from, to) in groups.inheritance_walk(group.id()).cycles {
                    let edge = (
                        groups.name_of(from).unwrap_or("?").to_string(),
                        groups.name_of(to).unwrap_or("?").to_string(),
                    );
                    if !cycles.contains(&edge) {
                        cycles.push(edge);
                    }
                }
            }

            if mode.is_human() {
                if cycles.is_empty() {
                    ui::success(&format!("{} groups, no inheritance cycles", groups.len()));
                } else {
                    for (from, to) in &cycles {
                        ui::warn(&format!("Inheritance cycle closes at {} {} {}", from, Icons::LINK, to));
                    }
                }
            } else {
                let data: Vec<_> = cycles
                    .iter()
                    .map(|(from, to)| serde_json::json!({ "from": from, "to": to }))
                    .collect();
                emit_success(mode, "check", serde_json::json!({ "cycles": data }))?;
            }
        }
    }

    Ok(())
}

fn resolve_config(path: &Path, database: Option<PathBuf>) -> anyhow::Result<PermstoreConfig> {
    let mut settings = config::load_config(Some(path))?.unwrap_or_default();
    if let Some(database) = database {
        settings.database = Some(database.display().to_string());
    }
    Ok(settings)
}

fn open_store(settings: &PermstoreConfig) -> anyhow::Result<PermissionStore> {
    let store_config = settings.store_config();
    if let Location::File(path) = &store_config.location {
        config::ensure_db_dir(path)?;
    }
    Ok(PermissionStore::open(store_config, Box::new(Detached))?)
}

fn names(groups: &GroupRegistry, ids: &[permstore::GroupId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| groups.name_of(*id))
        .map(str::to_string)
        .collect()
}

fn print_user(user: &User, groups: &GroupRegistry) {
    ui::section(&format!("{} {}", Icons::PERSON, user.name));
    ui::summary_row("UUID", &user.uuid.to_string());
    ui::summary_row("Super user", if user.super_user { "yes" } else { "no" });
    if let Some(prefix) = &user.prefix {
        ui::summary_row("Prefix", prefix);
    }
    if let Some(suffix) = &user.suffix {
        ui::summary_row("Suffix", suffix);
    }
    ui::summary_row("Groups", &names(groups, user.groups()).join(", "));
    for privilege in &user.privileges {
        println!("  {} {}", Icons::KEY, privilege);
    }
}
