use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessiongate::{auth::password, config::Config, db, routes, state::AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessiongate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load configuration");

    let pool = db::init_db(&config.database_path).expect("Failed to initialize database");

    {
        let conn = db::try_lock(&pool).expect("Database lock failed during startup");
        if db::users::get_user_count(&conn).expect("Failed to count users") == 0 {
            let hash = password::hash_password(&config.auth.seed_password)
                .expect("Failed to hash seed password");
            db::seed_user(&conn, &config.auth.seed_username, &hash)
                .expect("Failed to seed bootstrap user");
        }

        if let Ok(count) = db::sessions::cleanup_expired_sessions(&conn) {
            tracing::debug!("Removed {} expired sessions on startup", count);
        }
    }

    let bind_addr = config.server_bind_addr();
    let port = config.server_port;
    let app = routes::router(AppState::new(config, pool));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

    tracing::info!("Server running on http://localhost:{}", port);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
