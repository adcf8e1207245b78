//! Contact directory client.
//!
//! Thin reqwest wrapper over the hosted contact directory — the system of
//! record for waitlist contacts and the transactional email sender. This
//! client only issues the four calls the signup flow needs; it applies no
//! retries and no timeouts beyond reqwest's defaults.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::referral::Badge;

/// Errors from the contact directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The request never completed (connect, DNS, TLS, body read).
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The directory answered with a non-success status.
    #[error("directory rejected request: {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Result of a contact create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The directory already has this email. Signup is idempotent from the
    /// caller's perspective, so this is a success, not an error.
    AlreadyExists,
}

/// Fields for a new waitlist contact.
#[derive(Debug)]
pub struct NewContact<'a> {
    pub email: &'a str,
    pub referral_code: &'a str,
    pub referral_link: &'a str,
    pub referred_by: Option<&'a str>,
}

/// A contact as returned by the directory's find endpoint.
///
/// Only the fields the referral flow reads are modeled; custom fields may
/// be missing or null on contacts created before the field existed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub referral_count: Option<u32>,
    #[serde(default)]
    pub badge: Option<String>,
}

impl Contact {
    /// The contact's referral count, zero when never set.
    pub fn current_count(&self) -> u32 {
        self.referral_count.unwrap_or(0)
    }

    /// The contact's badge, if any.
    pub fn current_badge(&self) -> Option<Badge> {
        self.badge.as_deref().and_then(Badge::parse)
    }
}

/// Client for the contact directory API.
#[derive(Clone)]
pub struct DirectoryClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Create a waitlist contact with the derived referral fields and
    /// zeroed counters. A conflict status means the email is already on the
    /// list and is reported as `AlreadyExists`.
    pub async fn create_contact(
        &self,
        contact: &NewContact<'_>,
    ) -> Result<CreateOutcome, DirectoryError> {
        let response = self
            .client
            .post(format!("{}/contacts/create", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "email": contact.email,
                "source": "waitlist",
                "subscribed": true,
                "referralCode": contact.referral_code,
                "referralLink": contact.referral_link,
                "referredBy": contact.referred_by.unwrap_or(""),
                "referralCount": 0,
                "badge": "",
            }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(CreateOutcome::Created),
            StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(DirectoryError::Rejected { status, body })
            }
        }
    }

    /// Look up a contact by its stored referral code. `None` when the code
    /// matches nothing.
    pub async fn find_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<Contact>, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/contacts/find", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("referralCode", code)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Rejected { status, body });
        }

        let mut contacts: Vec<Contact> = response.json().await?;
        if contacts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(contacts.remove(0)))
        }
    }

    /// Write back a referrer's new count and badge.
    pub async fn update_contact(
        &self,
        email: &str,
        referral_count: u32,
        badge: Option<Badge>,
    ) -> Result<(), DirectoryError> {
        let response = self
            .client
            .put(format!("{}/contacts/update", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "email": email,
                "referralCount": referral_count,
                "badge": badge.map(|b| b.as_str()).unwrap_or(""),
            }))
            .send()
            .await?;

        Self::expect_success(response).await
    }

    /// Send a templated transactional email.
    pub async fn send_transactional(
        &self,
        template_id: &str,
        email: &str,
        data_variables: serde_json::Value,
    ) -> Result<(), DirectoryError> {
        let response = self
            .client
            .post(format!("{}/transactional", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "transactionalId": template_id,
                "email": email,
                "dataVariables": data_variables,
            }))
            .send()
            .await?;

        Self::expect_success(response).await
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), DirectoryError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DirectoryError::Rejected { status, body })
        }
    }
}
