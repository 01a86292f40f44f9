// Parish Office - admin CLI
//
// Maintenance tasks run against the same database the server uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parish_office::entities::{member, ministry, user};
use parish_office::{auth, finance, import, open_database, AppConfig};

#[derive(Debug, Parser)]
#[command(name = "parish", version = parish_office::VERSION, about = "Parish office administration")]
struct Cli {
    /// Overrides `database_path` from the configuration
    #[arg(long, env = "PARISH_DATABASE_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or upgrade the schema and seed defaults
    Setup,
    /// Create an admin account (no-op if the email exists)
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Import members from a CSV export
    ImportMembers { csv: PathBuf },
    /// Delete every member record
    ClearMembers,
    /// Link a login to a member record
    LinkUser { user_id: i64, member_id: i64 },
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log_level);

    let db_path = cli.database.unwrap_or_else(|| config.database_path.clone());
    let mut conn = open_database(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;

    match cli.command {
        Command::Setup => {
            finance::load_config(&conn).context("initialising finance config")?;
            let seeded = ministry::seed_defaults(&conn).context("seeding ministries")?;
            info!(seeded, "default ministries");

            let bootstrap = &config.bootstrap;
            if bootstrap.is_configured() {
                auth::ensure_admin(
                    &conn,
                    &bootstrap.admin_name,
                    &bootstrap.admin_email,
                    &bootstrap.admin_password,
                )
                .context("creating bootstrap admin")?;
            } else if user::count_admins(&conn)? == 0 {
                warn!("no admin account yet; run `parish create-admin`");
            }
            println!("Banco de dados pronto: {}", db_path.display());
        }
        Command::CreateAdmin { name, email, password } => {
            match auth::ensure_admin(&conn, &name, &email, &password).context("creating admin")? {
                Some(id) => println!("Administrador criado (id {id})."),
                None => println!("Já existe um usuário com o email {email}."),
            }
        }
        Command::ImportMembers { csv } => {
            let report = import::import_members_file(&mut conn, &csv)
                .with_context(|| format!("importing {}", csv.display()))?;
            println!("{} membros importados com sucesso!", report.imported);
            for error in &report.errors {
                println!("  linha {}: {}", error.line, error.message);
            }
        }
        Command::ClearMembers => {
            let removed = member::delete_all(&conn).context("clearing members")?;
            println!("{removed} membros removidos.");
        }
        Command::LinkUser { user_id, member_id } => {
            user::link_member(&conn, user_id, Some(member_id)).context("linking user")?;
            println!("Usuário {user_id} vinculado ao membro {member_id}.");
        }
    }

    Ok(())
}
