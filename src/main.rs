use std::error::Error;

use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use excel_insight::config::Config;
use excel_insight::logging::init_logging;
use excel_insight::routes::normalize_email;
use excel_insight::services::accounts::{self, AdminOutcome};
use excel_insight::{build_router, build_state};

#[derive(Parser)]
#[command(name = "excel-insight", version, about = "Excel analytics API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Create an admin account, or promote an existing one
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = accounts::SEEDED_ADMIN_NAME)]
        name: String,
    },
}

type BoxError = Box<dyn Error + Send + Sync>;

async fn connect(config: &Config) -> Result<DatabaseConnection, BoxError> {
    let mut opts = ConnectOptions::new(config.database_url.clone());
    opts.sqlx_logging(false);
    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn serve(config: Config) -> Result<(), BoxError> {
    let db = connect(&config).await?;
    tracing::info!("Database connected and migrations applied");

    if let Some(seed) = &config.admin_seed {
        let email = normalize_email(&seed.email);
        match accounts::seed_admin(&db, &email, &seed.password).await {
            Ok(AdminOutcome::Created) => tracing::info!("Seeded admin account {}", email),
            Ok(_) => tracing::info!("Admin account {} already present", email),
            Err(e) => tracing::error!("Failed to seed admin account {}: {:?}", email, e),
        }
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = build_state(db, config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn create_admin(config: Config, email: String, name: String) -> Result<(), BoxError> {
    let email = normalize_email(&email);
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
    if password.is_empty() {
        return Err("password must not be empty".into());
    }
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        return Err("passwords do not match".into());
    }

    let db = connect(&config).await?;
    let outcome = accounts::create_or_promote_admin(&db, &email, name.trim(), &password)
        .await
        .map_err(|e| format!("could not create admin: {:?}", e))?;

    match outcome {
        AdminOutcome::Created => println!("Admin '{}' created", email),
        _ => println!("Existing account '{}' promoted to admin", email),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateAdmin { email, name } => create_admin(config, email, name).await,
    }
}
