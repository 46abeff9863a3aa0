use derive_more::Display;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::{Request, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use crate::sheets::credentials::TokenProvider;

pub mod a1;
pub mod credentials;
#[cfg(test)]
pub(crate) mod fake;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "invalid credentials: {}", _0)]
    Credentials(String),
    #[display(fmt = "authentication failed: {}", _0)]
    Auth(String),
    #[display(fmt = "request failed: {}", _0)]
    Transport(reqwest::Error),
    #[display(fmt = "store answered {}: {}", status, body)]
    Status { status: u16, body: String },
    #[display(fmt = "malformed store response: {}", _0)]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e)
    }
}

/// A remote store addressed by A1 ranges. Every cell comes back as text.
pub trait TabularStore: Send + Sync {
    fn get_values<'a>(&'a self, range: &'a str) -> BoxFuture<'a, Result<Vec<Vec<String>>, StoreError>>;

    fn set_value<'a>(&'a self, range: &'a str, value: i64) -> BoxFuture<'a, Result<(), StoreError>>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Builds the `spreadsheets.values` requests for one spreadsheet.
pub struct ValuesApi {
    http: reqwest::Client,
    spreadsheet_id: String,
    base: Url,
}

impl ValuesApi {
    pub fn new(http: reqwest::Client, spreadsheet_id: String) -> Result<Self, StoreError> {
        let base = Url::parse(SHEETS_API).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(ValuesApi {
            http,
            spreadsheet_id,
            base,
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    pub fn get_request(&self, range: &str, token: &str) -> Result<Request, StoreError> {
        Ok(self.http.get(self.values_url(range)?).bearer_auth(token).build()?)
    }

    /// Raw input, so the value is stored as typed and never parsed by Sheets.
    pub fn update_request(&self, range: &str, value: i64, token: &str) -> Result<Request, StoreError> {
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        Ok(self
            .http
            .put(self.values_url(range)?)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&body)
            .build()?)
    }
}

/// Google Sheets v4 `spreadsheets.values` client.
pub struct GoogleSheetsClient {
    api: ValuesApi,
    tokens: TokenProvider,
}

impl GoogleSheetsClient {
    pub fn new(api: ValuesApi, tokens: TokenProvider) -> Self {
        GoogleSheetsClient { api, tokens }
    }

    async fn read(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let token = self.tokens.access_token().await?;
        let request = self.api.get_request(range, &token)?;
        let response = self.api.http.execute(request).await?;
        let body: ValueRange = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write(&self, range: &str, value: i64) -> Result<(), StoreError> {
        let token = self.tokens.access_token().await?;
        let request = self.api.update_request(range, value, &token)?;
        let response = self.api.http.execute(request).await?;
        check_status(response).await?;
        Ok(())
    }
}

impl TabularStore for GoogleSheetsClient {
    fn get_values<'a>(&'a self, range: &'a str) -> BoxFuture<'a, Result<Vec<Vec<String>>, StoreError>> {
        self.read(range).boxed()
    }

    fn set_value<'a>(&'a self, range: &'a str, value: i64) -> BoxFuture<'a, Result<(), StoreError>> {
        self.write(range, value).boxed()
    }
}
