use std::sync::Arc;

use actix_web::web::{self, Data, JsonConfig, PathConfig, QueryConfig, ServiceConfig};
use actix_web::{App, HttpServer, ResponseError};
use mongodb::Client;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub mod auth;
pub mod campaign;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod payment;
pub mod remote;
pub mod typedid;
pub mod wizard;

use auth::AuthState;
use config::{Config, StorageKind};
use database::{Database, MemoryDatabase, MongoDatabase};
use error::Error;
use remote::{HttpRemote, RemoteApi};
use wizard::WizardRegistry;

/// Everything the endpoints share across requests.
#[derive(Clone)]
pub struct AppState {
    pub db: Data<dyn Database>,
    pub remote: Data<dyn RemoteApi>,
    pub auth: Data<AuthState>,
    pub wizards: Data<WizardRegistry>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, remote: Arc<dyn RemoteApi>) -> AppState {
        AppState {
            db: Data::from(db),
            remote: Data::from(remote),
            auth: Data::new(AuthState::new()),
            wizards: Data::new(WizardRegistry::new()),
        }
    }

    pub async fn from_config(config: &Config) -> Result<AppState, Error> {
        let db: Arc<dyn Database> = match config.storage {
            StorageKind::Mongo => {
                info!("connecting to db: {}", config.mongo_uri);
                let db = Client::with_uri_str(&config.mongo_uri)
                    .await?
                    .database(&config.database);
                Arc::new(MongoDatabase::initialize(db).await?)
            }
            StorageKind::Memory => {
                info!("using in-memory storage");
                Arc::new(MemoryDatabase::new())
            }
        };

        info!(api_url = %config.api_url, backend_url = %config.backend_url, "using remote api");
        let remote = Arc::new(HttpRemote::new(&config.api_url, &config.backend_url));

        Ok(AppState::new(db, remote))
    }

    /// Registers shared data, extractor error formats and every endpoint.
    pub fn configure(&self, cfg: &mut ServiceConfig) {
        cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
            // format json errors with custom format
            Error::InvalidJson(err).into()
        }))
        .app_data(PathConfig::default().error_handler(|err, _req| {
            // format path errors with custom format
            Error::InvalidPath(err).into()
        }))
        .app_data(QueryConfig::default().error_handler(|err, _req| {
            // format query errors with custom format
            Error::InvalidQuery(err).into()
        }))
        .app_data(self.db.clone())
        .app_data(self.remote.clone())
        .app_data(self.auth.clone())
        .app_data(self.wizards.clone())
        .service(auth::login)
        .service(auth::register)
        .service(auth::logout)
        .service(auth::forgot_password)
        .service(auth::reset_password)
        .service(auth::get_current_user)
        .service(auth::update_current_user)
        .service(auth::update_password)
        .service(campaign::create_campaign)
        .service(campaign::get_campaigns)
        .service(campaign::get_campaign_by_id)
        .service(campaign::delete_campaign)
        .service(dashboard::get_campaign_performance)
        .service(dashboard::get_summary)
        .service(wizard::start_wizard)
        .service(wizard::get_wizard)
        .service(wizard::set_wizard_url)
        .service(wizard::set_wizard_details)
        .service(wizard::wizard_back)
        .service(wizard::submit_wizard)
        .service(payment::get_payment_methods)
        .service(payment::add_payment_method)
        .service(payment::remove_payment_method)
        .service(payment::process_payment)
        .default_service(web::to(|| async { Error::PathNotFound.error_response() }));
    }
}

pub async fn run(config: Config) -> Result<(), Error> {
    info!(storage = %config.storage, log_level = %config.log_level, "configuration loaded");
    let state = AppState::from_config(&config).await?;

    info!("listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(|cfg| state.configure(cfg))
    })
    .bind(&config.bind)?
    .run()
    .await?;

    Ok(())
}
