//! Retailer API client
//!
//! Talks to the mobile app API: login, transaction history, transaction
//! details and catalog lookups. Every request carries the app's fixed
//! headers; calls after login add the bearer token and loyalty profile
//! headers. There is a single per-request timeout and no retry.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::enrich::CatalogLookup;
use crate::error::{Error, Result};
use crate::models::{CatalogProduct, CatalogSearchResponse};
use crate::normalize::de;
use crate::text::collapse_whitespace;

const LOGIN_PATH: &str = "/api/v2/identity/onboarding/login";
const TRANSACTIONS_PATH: &str = "/api/v2/user/transactionsHistory";
const TRANSACTION_DETAILS_PATH: &str = "/api/v2/user/transactionsHistory/details";

/// Store id sent when a request is not tied to a store
const ANY_STORE: &str = "-1";

/// Headers the mobile app sends on every request
const BASE_HEADERS: [(&str, &str); 6] = [
    ("Content-Type", "application/json; charset=UTF-8"),
    ("Accept-Language", "en-US"),
    ("User-Agent", "okhttp/4.12.0"),
    ("X-App-Version", "v-3.12.4 buildType-release flavor-prod"),
    ("X-Device-Version", "Android-30"),
    ("X-Screen-Density", "1.3312501"),
];

/// Loyalty profile returned by login
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, deserialize_with = "de::text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub ompd_card: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub loyalty_id: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub household_id: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        parts.join(" ")
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<LoginToken>,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct LoginToken {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    profile: Profile,
}

/// Most recent transaction, summary plus line items
#[derive(Debug, Clone)]
pub struct LatestTransaction {
    pub summary: Value,
    pub details: Value,
}

/// HTTP client for the retailer API
pub struct RetailerClient {
    http_client: Client,
    base_url: String,
    phone_number: Option<String>,
    password: Option<String>,
    catalog_search_path: String,
    catalog_product_path: String,
    session: Option<Session>,
}

impl RetailerClient {
    /// Create a client from configuration (base URL, timeout, credentials)
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            phone_number: config.phone_number.clone(),
            password: config.password.clone(),
            catalog_search_path: config.catalog_search_path.clone(),
            catalog_product_path: config.catalog_product_path.clone(),
            session: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Profile of the logged-in user
    pub fn profile(&self) -> Option<&Profile> {
        self.session.as_ref().map(|s| &s.profile)
    }

    /// Log in with the configured phone number and password
    pub async fn login(&mut self) -> Result<&Profile> {
        let (phone_number, password) = match (self.phone_number.as_deref(), self.password.as_deref())
        {
            (Some(phone), Some(password)) if !phone.is_empty() && !password.is_empty() => {
                (phone.to_string(), password.to_string())
            }
            _ => {
                return Err(Error::Authentication(
                    "Please set PHONE_NUMBER and PASSWORD".to_string(),
                ))
            }
        };

        info!("Logging in...");
        let body = json!({ "phoneNumber": phone_number, "password": password });
        let request = self.request(Method::POST, LOGIN_PATH).json(&body);
        let response = send(request, "POST", LOGIN_PATH).await?;
        let result: LoginResponse = response.json().await?;

        let access_token = result
            .token
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication("login response has no access token".to_string()))?;
        let profile = result.profile.unwrap_or_default();

        info!(user = %profile.display_name(), "Login successful");
        let session = self.session.insert(Session {
            access_token,
            profile,
        });
        Ok(&session.profile)
    }

    /// One page of transaction summaries (pages start at 1)
    pub async fn transactions(&self, page: u32, size: u32) -> Result<Vec<Value>> {
        let session = self.session()?;
        info!(page, size, "Fetching transactions");

        let request = self
            .authenticated(self.request(Method::GET, TRANSACTIONS_PATH), session, None)
            .query(&[("pageNumber", page), ("pageSize", size)]);
        let response = send(request, "GET", TRANSACTIONS_PATH).await?;

        let result: Value = response.json().await?;
        let transactions = match clean_response_data(result) {
            Value::Array(items) => items,
            other => {
                return Err(Error::Api(format!(
                    "expected a transaction list, got {}",
                    json_kind(&other)
                )))
            }
        };

        info!(count = transactions.len(), "Retrieved transactions");
        Ok(transactions)
    }

    /// Line items for one transaction
    pub async fn transaction_details(
        &self,
        transaction_id: &str,
        store_id: Option<&str>,
    ) -> Result<Value> {
        let session = self.session()?;
        info!(transaction_id, "Fetching transaction details");

        let request = self
            .authenticated(
                self.request(Method::GET, TRANSACTION_DETAILS_PATH),
                session,
                store_id,
            )
            .query(&[("id", transaction_id)]);
        let response = send(request, "GET", TRANSACTION_DETAILS_PATH).await?;

        // Decode as UTF-8 regardless of the declared charset
        let bytes = response.bytes().await?;
        let details: Value = serde_json::from_slice(&bytes)?;
        Ok(clean_response_data(details))
    }

    /// Fetch the newest transaction with its details, logging in if needed
    pub async fn latest_transaction_with_details(&mut self) -> Result<Option<LatestTransaction>> {
        if !self.is_authenticated() {
            self.login().await?;
        }

        let Some(summary) = self.transactions(1, 1).await?.into_iter().next() else {
            return Ok(None);
        };

        let transaction_id = summary
            .get("transactionId")
            .and_then(crate::normalize::value_to_id)
            .ok_or_else(|| Error::Api("latest transaction has no transactionId".to_string()))?;
        let store_id = summary.get("storeId").and_then(crate::normalize::value_to_id);

        let details = self
            .transaction_details(&transaction_id, store_id.as_deref())
            .await?;

        Ok(Some(LatestTransaction { summary, details }))
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotAuthenticated)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "API request");
        BASE_HEADERS
            .iter()
            .fold(self.http_client.request(method, url), |req, (name, value)| {
                req.header(*name, *value)
            })
    }

    fn authenticated(
        &self,
        request: RequestBuilder,
        session: &Session,
        store_id: Option<&str>,
    ) -> RequestBuilder {
        let profile = &session.profile;
        request
            .bearer_auth(&session.access_token)
            .header("Pdapp-Storeid", store_id.unwrap_or(ANY_STORE))
            .header("Pdapp-Cardnumber", profile.ompd_card.as_deref().unwrap_or(""))
            .header("Pdapp-Lcid", profile.loyalty_id.as_deref().unwrap_or(""))
            .header("Pdapp-Hid", profile.household_id.as_deref().unwrap_or(""))
            .header("Pdapp-Clubs", "")
    }

    /// Catalog requests carry auth headers when a session exists
    fn catalog_request(&self, path: &str, store_id: Option<&str>) -> RequestBuilder {
        let request = self.request(Method::GET, path);
        match &self.session {
            Some(session) => self.authenticated(request, session, store_id),
            None => request.header("Pdapp-Storeid", store_id.unwrap_or(ANY_STORE)),
        }
    }
}

#[async_trait]
impl CatalogLookup for RetailerClient {
    async fn fetch_product_by_code(
        &self,
        code: &str,
        store_id: Option<&str>,
    ) -> Result<Option<CatalogProduct>> {
        let path = format!("{}/{}", self.catalog_product_path.trim_end_matches('/'), code);
        let mut request = self.catalog_request(&path, store_id);
        if let Some(store_id) = store_id {
            request = request.query(&[("storeId", store_id)]);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(code, "Catalog code not found");
            return Ok(None);
        }
        let response = check_status(response, "GET", &path).await?;

        let body: Value = response.json().await?;
        match clean_response_data(body) {
            Value::Null => Ok(None),
            value => Ok(Some(CatalogProduct::deserialize(value)?)),
        }
    }

    async fn search_products(
        &self,
        query: &str,
        store_id: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<Vec<CatalogProduct>> {
        let path = self.catalog_search_path.as_str();
        let mut request = self.catalog_request(path, store_id).query(&[
            ("q", query.to_string()),
            ("pageNumber", page.to_string()),
            ("pageSize", size.to_string()),
        ]);
        if let Some(store_id) = store_id {
            request = request.query(&[("storeId", store_id)]);
        }

        let response = send(request, "GET", path).await?;
        let body: Value = response.json().await?;
        let result = CatalogSearchResponse::deserialize(clean_response_data(body))?;
        debug!(query, count = result.documents.len(), "Catalog search");
        Ok(result.documents)
    }
}

async fn send(request: RequestBuilder, method: &str, path: &str) -> Result<Response> {
    let response = request.send().await?;
    check_status(response, method, path).await
}

/// Map non-2xx responses to `Error::Api` with the status and body
async fn check_status(response: Response, method: &str, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api(format!(
        "{} {} failed: {} - {}",
        method, path, status, body
    )))
}

/// Tidy string values throughout a response
///
/// Line breaks are removed outright. URLs lose all whitespace; other text
/// has whitespace runs collapsed to one space and is trimmed.
pub fn clean_response_data(data: Value) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, clean_response_data(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_response_data).collect()),
        Value::String(s) => {
            let joined: String = s.chars().filter(|c| *c != '\n' && *c != '\r').collect();
            let trimmed = joined.trim();
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                Value::String(trimmed.chars().filter(|c| !c.is_whitespace()).collect())
            } else {
                Value::String(collapse_whitespace(trimmed))
            }
        }
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        Config {
            // Unroutable; tests below must fail before any request is sent
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_clean_response_data() {
        let raw = json!({
            "name": "  Iogurte\n  Grego   Natural ",
            "image": "https://cdn.example.com/img/ 123\r\n.jpg",
            "products": [{"brand": {"name": "Pingo\r\nDoce"}}],
            "total": 12.5,
            "flag": null
        });

        let cleaned = clean_response_data(raw);
        assert_eq!(cleaned["name"], "Iogurte Grego Natural");
        assert_eq!(cleaned["image"], "https://cdn.example.com/img/123.jpg");
        assert_eq!(cleaned["products"][0]["brand"]["name"], "PingoDoce");
        assert_eq!(cleaned["total"], 12.5);
        assert!(cleaned["flag"].is_null());
    }

    #[test]
    fn test_profile_display_name() {
        let profile: Profile =
            serde_json::from_value(json!({"firstName": "Ana", "loyaltyId": 1234})).unwrap();
        assert_eq!(profile.display_name(), "Ana");
        assert_eq!(profile.loyalty_id.as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn test_calls_before_login_fail() {
        let client = RetailerClient::new(&offline_config()).unwrap();
        assert!(!client.is_authenticated());

        let err = client.transactions(1, 20).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));

        let err = client.transaction_details("T1", None).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let mut client = RetailerClient::new(&offline_config()).unwrap();
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!client.is_authenticated());
    }
}
