use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use std::sync::Arc;

use explore_lanka_api::config::AppConfig;
use explore_lanka_api::routes;
use explore_lanka_api::services::gazetteer::Gazetteer;
use explore_lanka_api::services::planner::PlanningService;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    let host = std::env::var("HOST").unwrap_or_else(|_| HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| PORT.to_string())
        .parse()
        .unwrap_or(PORT);

    let config = AppConfig::from_env();

    // A missing gazetteer is fatal: nothing can be placed on the map
    // without it.
    let gazetteer = match Gazetteer::load(&config.locations_file) {
        Ok(gazetteer) => Arc::new(gazetteer),
        Err(err) => {
            log::error!("Could not load {}: {}", config.locations_file, err);
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                err.to_string(),
            ));
        }
    };

    let planner = match PlanningService::from_config(config.clone(), gazetteer.clone()) {
        Ok(planner) => Arc::new(planner),
        Err(err) => {
            log::error!("Could not initialize planning pipeline: {}", err);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                err.to_string(),
            ));
        }
    };

    log::info!("Starting planner API on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(gazetteer.clone()))
            .app_data(web::Data::new(planner.clone()))
            .route("/health", web::get().to(routes::health::health_check))
            .service(web::scope("/api").route("/plan", web::post().to(routes::plan::create_plan)))
    })
    .bind((host, port))?
    .run()
    .await
}
