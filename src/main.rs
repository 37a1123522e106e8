use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use formdesk::openapi::ApiDoc;
use formdesk::rate_limit::{InMemoryRateLimiter, SubmissionLimiter};
use formdesk::repo::Repo;
use formdesk::storage::build_upload_store;
use formdesk::{config, AppConfig, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping formdesk server");
    info!("Frontend URL: {}", settings.frontend_url);
    info!("Missing attendance status policy: {:?}", settings.missing_status);

    let repo = match build_repo(&settings).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("repository initialisation failed: {e:#}");
            std::process::exit(1);
        }
    };
    let uploads = match build_upload_store(&settings.upload_dir).await {
        Ok(store) => store,
        Err(e) => {
            error!("upload store initialisation failed: {e:#}");
            std::process::exit(1);
        }
    };

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let bind = (settings.bind_addr.clone(), settings.port);
    let state = AppState {
        repo,
        uploads,
        limiter: SubmissionLimiter::new(InMemoryRateLimiter::new(true), settings.rate_limit.clone()),
        config: Arc::new(settings),
    };

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.frontend_url)
            // during local dev allow React/Vite default ports
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(bind.clone())?;

    info!("Listening on http://{}:{}", bind.0, bind.1);

    server.run().await
}

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use formdesk::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new().max_connections(5).connect(db_url).await?;
    let repo = PgRepo::new(pool);
    repo.migrate().await?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(not(feature = "postgres-store"))]
async fn build_repo(settings: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use formdesk::repo::inmem::InMemRepo;

    let snapshot = settings.data_dir.join("state.json");
    info!("Using in-memory repository backend (snapshot: {})", snapshot.display());
    Ok(Arc::new(InMemRepo::with_snapshot(snapshot)))
}
