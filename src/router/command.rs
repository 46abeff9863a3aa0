use derive_more::Display;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// Raw text after `/update`, possibly empty.
    Update(String),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCommand {
    pub key: String,
    pub new_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CommandError {
    #[display(fmt = "expected `id, value`")]
    MissingValue,
    #[display(fmt = "id is empty")]
    EmptyKey,
    #[display(fmt = "`{}` is not an integer", _0)]
    NotAnInteger(String),
}

/// Recognizes the bot commands, with or without a `@BotName` suffix.
pub struct CommandParser {
    start: Regex,
    update: Regex,
}

impl CommandParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(CommandParser {
            start: Regex::new(r"^/start(?:@\w+)?(?:\s|$)")?,
            update: Regex::new(r"(?s)^/update(?:@\w+)?(?:\s+(.*))?$")?,
        })
    }

    pub fn parse(&self, text: &str) -> Command {
        let text = text.trim();
        if self.start.is_match(text) {
            return Command::Start;
        }
        match self.update.captures(text) {
            Some(caps) => Command::Update(caps.get(1).map_or("", |m| m.as_str()).to_string()),
            None => Command::Other,
        }
    }
}

/// Splits `key, value` on commas. Tokens past the second are ignored.
pub fn parse_update_command(payload: &str) -> Result<UpdateCommand, CommandError> {
    let tokens: Vec<&str> = payload.split(',').map(str::trim).collect();
    if tokens.len() < 2 {
        return Err(CommandError::MissingValue);
    }
    if tokens[0].is_empty() {
        return Err(CommandError::EmptyKey);
    }
    let new_value = tokens[1]
        .parse::<i64>()
        .map_err(|_| CommandError::NotAnInteger(tokens[1].to_string()))?;
    Ok(UpdateCommand {
        key: tokens[0].to_string(),
        new_value,
    })
}
