//! Convenience wrappers for common API operations.
//!
//! Each method is a single [`ApiClient::call`] and returns the raw JSON
//! object.

use serde_json::{Value, json};

use super::ApiClient;
use crate::{
    endpoint,
    error::Result,
    transport::{JsonMap, Transport},
};

impl<T: Transport> ApiClient<T> {
    /// Fetches an account.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn get_account(&self, account_id: &str) -> Result<JsonMap> {
        self.call(&endpoint::ACCOUNT_GET, &[("account_id", account_id)], None).await
    }

    /// Deletes an account.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn delete_account(&self, account_id: &str) -> Result<JsonMap> {
        self.call(&endpoint::ACCOUNT_DELETE, &[("account_id", account_id)], None).await
    }

    /// Fetches a session.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn get_session(&self, session_id: &str) -> Result<JsonMap> {
        self.call(&endpoint::SESSION_GET, &[("session_id", session_id)], None).await
    }

    /// Binds a session to an account and returns the risk evaluation.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn authenticate_session(&self, session_id: &str, account: &JsonMap) -> Result<JsonMap> {
        let body = object(json!({ "session_id": session_id, "account": account }));
        self.call(&endpoint::SESSION_AUTHENTICATE, &[], Some(&body)).await
    }

    /// Checks a phone number.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn verify_phone(&self, phone_number: &str) -> Result<JsonMap> {
        let body = object(json!({ "phone_number": phone_number }));
        self.call(&endpoint::PHONE_VERIFY, &[], Some(&body)).await
    }

    /// Fetches the accounts on a list.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn get_list(&self, list_name: &str) -> Result<JsonMap> {
        self.call(&endpoint::LIST_GET, &[("list_name", list_name)], None).await
    }

    /// Creates a list.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn create_list(&self, list_name: &str, description: &str) -> Result<JsonMap> {
        let body = object(json!({ "list_description": description }));
        self.call(&endpoint::LIST_CREATE, &[("list_name", list_name)], Some(&body)).await
    }

    /// Adds an account to a list.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn add_account_to_list(&self, list_name: &str, account_id: &str) -> Result<JsonMap> {
        let params = [("list_name", list_name), ("account_id", account_id)];
        self.call(&endpoint::LIST_ADD_ACCOUNT, &params, None).await
    }

    /// Removes an account from a list.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn remove_account_from_list(
        &self,
        list_name: &str,
        account_id: &str,
    ) -> Result<JsonMap> {
        let params = [("list_name", list_name), ("account_id", account_id)];
        self.call(&endpoint::LIST_REMOVE_ACCOUNT, &params, None).await
    }

    /// Deletes a list.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn delete_list(&self, list_name: &str) -> Result<JsonMap> {
        self.call(&endpoint::LIST_DELETE, &[("list_name", list_name)], None).await
    }

    /// Lists every list of the project.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn get_all_lists(&self) -> Result<JsonMap> {
        self.call(&endpoint::LIST_ALL, &[], None).await
    }

    /// Starts a liveness session, optionally linked to an earlier session.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`].
    pub async fn liveness_session(&self, referring_session_id: Option<&str>) -> Result<JsonMap> {
        match referring_session_id {
            Some(id) => {
                self.call(&endpoint::LIVENESS_SESSION, &[("referring_session_id", id)], None).await
            }
            None => self.call(&endpoint::LIVENESS_SESSION, &[], None).await,
        }
    }
}

fn object(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
