use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use flagpost::flags::FlagService;
use flagpost::storage::FlagStore;
use flagpost::web::metrics::RequestMetrics;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_lib_mods();
    init_our_mods();

    let config = flagpost::app_config::get_config();

    let store = Arc::new(FlagStore::connect(&config.mongo).await);
    log::info!("Serving feature flags from {}", store.backend_name());

    let service = Data::new(FlagService::new(
        store,
        config.flags.default_environment.clone(),
    ));
    let metrics = RequestMetrics::new()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let metrics_data = Data::new(metrics.clone());
    let static_dir = config.server.static_dir.clone();

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        let mut app = App::new()
            .app_data(service.clone())
            .app_data(metrics_data.clone())
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff")),
            )
            .wrap(
                ErrorHandlers::new().handler(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    flagpost::web::error::render_500,
                ),
            )
            .wrap(Logger::new("%a \"%r\" %s %Dms"))
            .wrap(metrics.clone())
            .configure(flagpost::web::configure);

        // Dashboard frontend, after the API so it never shadows a route.
        if !static_dir.is_empty() {
            app = app.service(actix_files::Files::new("/", &static_dir).index_file("index.html"));
        }

        app
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A .env file is optional; the container sets real variables.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
pub fn init_our_mods() {
    flagpost::app_config::init();
}
