use std::sync::Arc;
use actix_web::web::{Data, Json};
use actix_web::{HttpRequest, HttpResponse, Scope, get, web};
use log::{Level, log};
use serde::Serialize;
use crate::router::CommandRouter;
use crate::telegram::poller::dispatch;
use crate::telegram::{BotClient, Update};

pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub struct WebhookState {
    pub bot: Arc<BotClient>,
    pub router: Arc<CommandRouter>,
    pub secret_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReturn {
    status: &'static str,
    accounts: usize,
}

impl WebhookState {
    fn authorized(&self, request: &HttpRequest) -> bool {
        match &self.secret_token {
            None => true,
            Some(expected) => request
                .headers()
                .get(SECRET_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected),
        }
    }
}

/// Acknowledges immediately and answers the update on a separate task, so a
/// slow store never makes Telegram redeliver.
pub async fn receive(request: HttpRequest, update: Json<Update>, state: Data<WebhookState>) -> HttpResponse {
    if !state.authorized(&request) {
        log!(Level::Warn, "Rejected webhook call without a valid secret token");
        return HttpResponse::Unauthorized().body("");
    }
    let cloned_bot = state.bot.clone();
    let cloned_router = state.router.clone();
    tokio::spawn(dispatch(cloned_bot, cloned_router, update.into_inner()));
    HttpResponse::Ok().body("")
}

#[get("/health")]
pub async fn health(state: Data<WebhookState>) -> Json<HealthReturn> {
    Json(HealthReturn {
        status: "ok",
        accounts: state.router.accounts(),
    })
}

pub fn map(path: &str) -> Scope {
    web::scope("")
        .service(health)
        .route(path, web::post().to(receive))
}
