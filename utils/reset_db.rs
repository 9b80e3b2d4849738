use sea_orm::{ConnectionTrait, Database, Statement};
use std::env;

const TABLES: [&str; 3] = ["uploads", "users", "seaql_migrations"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    excel_insight::logging::init_logging();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let db = Database::connect(database_url).await?;
    let backend = db.get_database_backend();

    for table in TABLES {
        let sql = match backend {
            sea_orm::DbBackend::Postgres => format!("DROP TABLE IF EXISTS \"{}\" CASCADE;", table),
            _ => format!("DROP TABLE IF EXISTS \"{}\";", table),
        };
        db.execute(Statement::from_string(backend, sql)).await?;
        tracing::info!("Dropped table {}", table);
    }

    tracing::info!("Database reset successfully; migrations will run on next start");
    Ok(())
}
