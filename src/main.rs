use std::sync::Arc;
use std::time::Duration;
use actix_web::{App, HttpServer};
use actix_web::middleware::Logger;
use actix_web::web::Data;
use log::{Level, log};
use crate::api::{WebhookState, map};
use crate::config::{ApplicationConfig, Secrets, WebhookConfig};
use crate::repository::sheet_repository::SheetRepository;
use crate::router::{CommandRouter, IdentityMap};
use crate::sheets::{GoogleSheetsClient, ValuesApi};
use crate::sheets::credentials::{ServiceAccount, TokenProvider};
use crate::telegram::{BotClient, poller};

mod api;
mod config;
mod repository;
mod router;
mod sheets;
mod telegram;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cfg_path = match std::env::var("APP_CONFIG_PATH") {
        Ok(v) => v,
        Err(_) => panic!("Environment variable APP_CONFIG_PATH not set")
    };
    let config = match ApplicationConfig::load(&cfg_path).await {
        Ok(cfg) => cfg,
        Err(e) => panic!("{}", e)
    };
    std::env::set_var("RUST_LOG", &config.log_level);
    std::env::set_var("RUST_BACKTRACE", "1");
    env_logger::init();

    let secrets = match Secrets::from_env().await {
        Ok(v) => v,
        Err(e) => panic!("{}", e)
    };
    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build() {
        Ok(v) => v,
        Err(e) => panic!("Failed to build http client with exception: {}", e)
    };
    let tokens = match ServiceAccount::try_from_str(&secrets.credentials)
        .and_then(|account| TokenProvider::new(account, http.clone())) {
        Ok(v) => v,
        Err(e) => panic!("Failed to load store credentials: {}", e)
    };
    let sheets = match ValuesApi::new(http.clone(), secrets.spreadsheet_id.clone()) {
        Ok(api) => GoogleSheetsClient::new(api, tokens),
        Err(e) => panic!("Failed to create sheets client: {}", e)
    };
    let repository = Arc::new(SheetRepository::new(Arc::new(sheets), config.lock_stripes));
    let identities = IdentityMap::new(config.partitions);
    let router = match CommandRouter::new(identities, repository) {
        Ok(v) => Arc::new(v),
        Err(e) => panic!("Failed to compile command patterns: {}", e)
    };
    let bot = Arc::new(BotClient::new(http, &secrets.bot_token));
    log!(Level::Info, "Serving {} accounts from spreadsheet {}", router.accounts(), secrets.spreadsheet_id);

    match config.webhook {
        Some(webhook) => serve_webhook(webhook, bot, router).await,
        None => {
            log!(Level::Info, "Bot is running, polling for updates");
            poller::run(bot, router, config.poll_timeout_secs).await;
            Ok(())
        }
    }
}

async fn serve_webhook(webhook: WebhookConfig, bot: Arc<BotClient>, router: Arc<CommandRouter>) -> std::io::Result<()> {
    if let Err(e) = bot.set_webhook(&webhook.public_url, webhook.secret_token.as_deref()).await {
        panic!("Failed to register webhook with exception: {}", e);
    }
    let state = Data::new(WebhookState {
        bot,
        router,
        secret_token: webhook.secret_token.clone(),
    });
    let path = webhook.path.clone();
    log!(Level::Info, "Online at {}:{}{}", webhook.host, webhook.port, path);

    HttpServer::new(move || {
        let logger = Logger::default();
        App::new()
            .wrap(logger)
            .app_data(state.clone())
            .service(map(&path))
    })
        .bind((webhook.host.as_str(), webhook.port))?
        .run()
        .await
}
