//! Chat-account registration pass-through
//!
//! Herald itself has no account database; these commands call the chat
//! server's admin REST API on behalf of the operator. API trouble is a
//! user-visible reply, not an operational failure.

use crate::dispatcher::{Command, CommandContext};
use async_trait::async_trait;
use herald_core::error::{Error, Result};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub struct RegistrationClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RegistrationClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn call(&self, method: reqwest::Method, path: &str, payload: Option<Value>) -> Result<u16> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", &self.api_key);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Domain(format!("registration API unreachable: {e}")))?;
        Ok(response.status().as_u16())
    }

    pub async fn register(&self, user: &str, password: &str) -> Result<u16> {
        self.call(
            reqwest::Method::POST,
            "users",
            Some(json!({"username": user, "password": password})),
        )
        .await
    }

    pub async fn delete(&self, user: &str) -> Result<u16> {
        self.call(reqwest::Method::DELETE, &format!("users/{user}"), None)
            .await
    }

    pub async fn update(&self, user: &str, payload: Value) -> Result<u16> {
        self.call(reqwest::Method::PUT, &format!("users/{user}"), Some(payload))
            .await
    }
}

impl std::fmt::Debug for RegistrationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// `register_user <user> <password>`
pub struct RegisterUser {
    client: Arc<RegistrationClient>,
}

impl RegisterUser {
    pub fn new(client: Arc<RegistrationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Command for RegisterUser {
    fn name(&self) -> &str {
        "register_user"
    }

    fn usage(&self) -> &str {
        "register_user <user> <password>"
    }

    fn description(&self) -> &str {
        "Create an account on the chat server"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [user, password] = args else {
            return Err(Error::Usage("wrong number of arguments".to_string()));
        };
        let status = self.client.register(user, password).await?;
        Ok(format!("Registration for {user} returned {status}"))
    }
}

/// `delete_user <user>`
pub struct DeleteUser {
    client: Arc<RegistrationClient>,
}

impl DeleteUser {
    pub fn new(client: Arc<RegistrationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Command for DeleteUser {
    fn name(&self) -> &str {
        "delete_user"
    }

    fn usage(&self) -> &str {
        "delete_user <user>"
    }

    fn description(&self) -> &str {
        "Remove an account from the chat server"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [user] = args else {
            return Err(Error::Usage("wrong number of arguments".to_string()));
        };
        let status = self.client.delete(user).await?;
        Ok(format!("Deletion of {user} returned {status}"))
    }
}

/// `update_user <user> <json>` - the payload is everything after the user
pub struct UpdateUser {
    client: Arc<RegistrationClient>,
}

impl UpdateUser {
    pub fn new(client: Arc<RegistrationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Command for UpdateUser {
    fn name(&self) -> &str {
        "update_user"
    }

    fn usage(&self) -> &str {
        "update_user <user> {\"name\": \"New Name\"}"
    }

    fn description(&self) -> &str {
        "Update an account's properties via a JSON document"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [user, rest @ ..] = args else {
            return Err(Error::Usage("wrong number of arguments".to_string()));
        };
        if rest.is_empty() {
            return Err(Error::Usage("missing JSON payload".to_string()));
        }

        let payload: Value = serde_json::from_str(&rest.join(" "))
            .map_err(|e| Error::Usage(format!("payload is not valid JSON: {e}")))?;
        let status = self.client.update(user, payload).await?;
        Ok(format!("Update of {user} returned {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> CommandContext {
        use herald_store::SqliteStore;
        CommandContext {
            store: Arc::new(SqliteStore::open_in_memory().unwrap()),
            caller: "admin".to_string(),
            admin: true,
        }
    }

    #[tokio::test]
    async fn test_update_user_rejects_bad_json() {
        let client = Arc::new(RegistrationClient::new("http://localhost:9090", "key"));
        let cmd = UpdateUser::new(client);

        let err = cmd
            .run(
                &ctx(),
                &["bob".to_string(), "{not".to_string(), "json}".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_domain_error() {
        // Nothing listens on this port
        let client = Arc::new(RegistrationClient::new("http://127.0.0.1:1", "key"));
        let cmd = DeleteUser::new(client);

        let err = cmd.run(&ctx(), &["bob".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Domain(_)));
    }
}
