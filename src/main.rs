mod auth;
mod clock;
mod config;
mod errors;
mod links;
mod models;
mod templates;
mod routes;
mod store;

use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use std::sync::Arc;

use crate::auth::AdminCredentials;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::links::Links;
use crate::store::JsonFileStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_args_env()?;

    let store = JsonFileStore::open(&cfg.store_path)?;
    log::info!(
        "Record store at {}, uploads in {}",
        store.path().display(),
        cfg.uploads_dir
    );
    let creds = Data::new(AdminCredentials::from_config(&cfg)?);
    let links = Data::new(Links::new(
        Arc::new(store),
        Arc::new(SystemClock),
        cfg.uploads_path(),
        cfg.name_bytes,
    ));

    log::info!("Starting server at {}", cfg.listen);
    let listen_addr = cfg.listen.clone();
    let cfg = Data::new(cfg);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(cfg.clone())
            .app_data(links.clone())
            .app_data(creds.clone())
            .configure(routes::configure)
    })
    .bind(listen_addr)?
    .run()
    .await?;
    Ok(())
}
