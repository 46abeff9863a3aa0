use std::sync::Arc;
use std::time::Duration;
use log::{Level, log};
use crate::router::CommandRouter;
use crate::telegram::{BotClient, Update};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Answers one update. Each reply is sent in order, a failed send is logged and
/// the rest are still attempted.
pub async fn dispatch(bot: Arc<BotClient>, router: Arc<CommandRouter>, update: Update) {
    let Some(message) = update.message.as_ref().and_then(|m| m.to_inbound()) else {
        log!(Level::Debug, "Skipping update {} without a sender", update.update_id);
        return;
    };
    for reply in router.handle(&message).await {
        if let Err(e) = bot.send_message(message.chat_id, &reply).await {
            log!(Level::Error, "Failed to reply in chat {}: {}", message.chat_id, e);
        }
    }
}

/// Long-polls for updates forever, handling each one on its own task.
pub async fn run(bot: Arc<BotClient>, router: Arc<CommandRouter>, timeout: u32) {
    if let Err(e) = bot.delete_webhook().await {
        log!(Level::Warn, "Could not clear webhook before polling: {e}");
    }
    let mut offset = 0i64;
    loop {
        match bot.get_updates(offset, timeout).await {
            Ok(updates) => {
                for update in updates {
                    offset = next_offset(offset, &update);
                    let cloned_bot = bot.clone();
                    let cloned_router = router.clone();
                    tokio::spawn(async move { dispatch(cloned_bot, cloned_router, update).await });
                }
            }
            Err(e) => {
                log!(Level::Error, "Polling failed, retrying in {}s: {}", RETRY_DELAY.as_secs(), e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Telegram confirms every update below the offset sent with the next poll.
fn next_offset(current: i64, update: &Update) -> i64 {
    current.max(update.update_id + 1)
}
