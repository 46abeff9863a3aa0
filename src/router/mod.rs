use std::collections::HashMap;
use std::sync::Arc;
use log::{Level, log};
use crate::repository::row::format_rows;
use crate::repository::sheet_repository::{SheetRepository, UpdateOutcome};
use crate::router::command::{Command, CommandError, CommandParser, parse_update_command};

pub mod command;

const FETCH_FAILED: &str = "Failed to fetch data.";
const UPDATE_FAILED: &str = "Failed to update data.";

/// A chat message reduced to what the router needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: Option<String>,
}

impl InboundMessage {
    fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or("No Username")
    }
}

/// Caller is not mapped to any sheet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unauthorized;

/// Which sheet each account may read and update.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    partitions: HashMap<i64, String>,
}

impl IdentityMap {
    pub fn new(partitions: HashMap<i64, String>) -> Self {
        IdentityMap { partitions }
    }

    pub fn resolve_partition(&self, identity: i64) -> Result<&str, Unauthorized> {
        self.partitions.get(&identity).map(String::as_str).ok_or(Unauthorized)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }
}

pub struct CommandRouter {
    identities: IdentityMap,
    repository: Arc<SheetRepository>,
    commands: CommandParser,
}

impl CommandRouter {
    pub fn new(identities: IdentityMap, repository: Arc<SheetRepository>) -> Result<Self, regex::Error> {
        Ok(CommandRouter {
            identities,
            repository,
            commands: CommandParser::new()?,
        })
    }

    /// Number of accounts mapped to a sheet.
    pub fn accounts(&self) -> usize {
        self.identities.len()
    }

    /// Produces the replies for one message, in sending order. Never fails,
    /// every error becomes reply text.
    pub async fn handle(&self, message: &InboundMessage) -> Vec<String> {
        let command = message
            .text
            .as_deref()
            .map_or(Command::Other, |text| self.commands.parse(text));
        match command {
            Command::Start => self.start(message).await,
            Command::Update(payload) => self.update(message, &payload).await,
            Command::Other => vec![echo(message)],
        }
    }

    async fn start(&self, message: &InboundMessage) -> Vec<String> {
        let Ok(partition) = self.identities.resolve_partition(message.user_id) else {
            log!(Level::Warn, "Rejected /start from unmapped account {}", message.user_id);
            return vec![format!("@{}, you are not allowed to view this data.", message.handle())];
        };
        vec![self.render_partition(partition).await]
    }

    async fn update(&self, message: &InboundMessage, payload: &str) -> Vec<String> {
        let handle = message.handle();
        let Ok(partition) = self.identities.resolve_partition(message.user_id) else {
            log!(Level::Warn, "Rejected /update from unmapped account {}", message.user_id);
            return vec![format!("@{handle}, you are not allowed to use this command.")];
        };
        let command = match parse_update_command(payload) {
            Ok(command) => command,
            Err(CommandError::MissingValue | CommandError::EmptyKey) => {
                return vec![format!("@{handle}, please use the format: /update id, value")];
            }
            Err(CommandError::NotAnInteger(_)) => {
                return vec![format!("@{handle}, value must be a number.")];
            }
        };
        let status = match self
            .repository
            .update_count(partition, &command.key, command.new_value)
            .await
        {
            Ok(UpdateOutcome::Updated { .. }) => "Updated successfully!",
            Ok(UpdateOutcome::NotFound) => "ID not found.",
            Err(e) => {
                log!(Level::Error, "Failed to update {partition}: {e}");
                UPDATE_FAILED
            }
        };
        vec![format!("@{handle}: {status}"), self.render_partition(partition).await]
    }

    async fn render_partition(&self, partition: &str) -> String {
        match self.repository.fetch_rows(partition).await {
            Ok(rows) => format_rows(&rows),
            Err(e) => {
                log!(Level::Error, "Failed to fetch {partition}: {e}");
                FETCH_FAILED.to_string()
            }
        }
    }
}

fn echo(message: &InboundMessage) -> String {
    format!(
        "User: {} (@{})\nTelegram ID: {}\nChat ID: {}",
        message.first_name.as_deref().unwrap_or("No name"),
        message.username.as_deref().unwrap_or("No username"),
        message.user_id,
        message.chat_id,
    )
}
