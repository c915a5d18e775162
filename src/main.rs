use std::sync::Arc;

use movie_api::configuration::{get_configuration, DatabaseSettings};
use movie_api::startup::Application;
use movie_api::store::{InMemoryUserStore, PgUserStore, UserStore};
use movie_api::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 구조화된 로깅 초기화
    init_telemetry();

    tracing::info!("Starting application");

    // 설정 로드
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // 사용자 저장소 선택: database 설정이 있으면 Postgres, 없으면 메모리
    let store: Arc<dyn UserStore> = match &configuration.database {
        Some(database) => Arc::new(connect_store(database).await?),
        None => {
            tracing::warn!("No database configured; users are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };

    // 서버 실행 (revocation sweeper 는 서버 수명에 묶여 있음)
    let application = Application::build(configuration, store).await?;
    tracing::info!(port = application.port(), "Server started successfully");

    application.run_until_stopped().await
}

async fn connect_store(config: &DatabaseSettings) -> std::io::Result<PgUserStore> {
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    // 마이그레이션 적용
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to migrate the database: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
    })?;

    tracing::info!("Database connection pool created successfully");
    Ok(PgUserStore::new(pool))
}
