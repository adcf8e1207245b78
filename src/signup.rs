//! Signup orchestration.
//!
//! One request runs the whole flow start to finish with sequential awaited
//! calls: validate, upsert the contact, send the confirmation email, then
//! credit the referrer when a referral code was supplied. Only the upsert
//! can fail the request — everything after it is best-effort, logged and
//! swallowed, and never changes the caller-visible result.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::WaitlistConfig;
use crate::directory::{CreateOutcome, DirectoryClient, DirectoryError, NewContact};
use crate::referral::{self, ReferralProgress};

/// Signup request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Signup email. Validated here, not by the extractor, so a missing
    /// field gets the same 400 as a malformed one.
    #[serde(default)]
    pub email: Option<String>,
    /// Referral code of the contact who shared their link.
    #[serde(default)]
    pub referred_by: Option<String>,
}

/// Signup response body. Returned whenever the contact upsert succeeded,
/// regardless of what happened to the downstream side effects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub success: bool,
    pub referral_code: String,
    pub referral_link: String,
    pub already_signed_up: bool,
}

/// Failures that abort a signup request.
#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    /// Missing or malformed email. Nothing was sent upstream.
    #[error("valid email required")]
    InvalidEmail,

    /// No directory API key configured. Nothing was sent upstream.
    #[error("waitlist service not configured")]
    NotConfigured,

    /// The initial contact create was rejected or unreachable.
    #[error("contact create failed: {0}")]
    Upstream(DirectoryError),
}

/// Orchestrates the signup flow against the contact directory.
#[derive(Clone)]
pub struct SignupService {
    config: WaitlistConfig,
    /// Present only when an API key is configured.
    directory: Option<DirectoryClient>,
}

impl SignupService {
    pub fn new(config: WaitlistConfig) -> Self {
        let directory = config
            .api_key
            .clone()
            .map(|key| DirectoryClient::new(key, config.directory_url.clone()));

        Self { config, directory }
    }

    /// Run the full signup flow for one request.
    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, SignupError> {
        let email = request.email.as_deref().unwrap_or("").trim();
        if !email.contains('@') {
            return Err(SignupError::InvalidEmail);
        }

        let directory = self.directory.as_ref().ok_or(SignupError::NotConfigured)?;

        let code = referral::referral_code(email);
        let link = self.config.referral_link(&code);
        let referred_by = request
            .referred_by
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        // Upsert the contact — the only step allowed to fail the request.
        let outcome = directory
            .create_contact(&NewContact {
                email,
                referral_code: &code,
                referral_link: &link,
                referred_by,
            })
            .await
            .map_err(SignupError::Upstream)?;

        let already_signed_up = outcome == CreateOutcome::AlreadyExists;
        tracing::info!(
            email,
            code = code.as_str(),
            already_signed_up,
            "Contact upserted"
        );

        // Everything below is best-effort. The signup already succeeded.
        if let Err(e) = self.send_confirmation(directory, email, &link).await {
            tracing::warn!(email, error = %e, "Confirmation email failed");
        }

        if let Some(referrer_code) = referred_by {
            self.credit_referrer(directory, referrer_code).await;
        }

        Ok(SignupResponse {
            success: true,
            referral_code: code,
            referral_link: link,
            already_signed_up,
        })
    }

    /// Send the signup confirmation email.
    async fn send_confirmation(
        &self,
        directory: &DirectoryClient,
        email: &str,
        link: &str,
    ) -> Result<(), DirectoryError> {
        let Some(ref template_id) = self.config.confirmation_template_id else {
            tracing::warn!("No confirmation template configured, skipping email");
            return Ok(());
        };

        directory
            .send_transactional(
                template_id,
                email,
                json!({
                    "referralLink": link,
                    "unsubscribeUrl": "",
                }),
            )
            .await
    }

    /// Resolve the referrer by their stored code and credit one referral.
    ///
    /// Read-then-write with no conditional update: two signups racing on
    /// the same referrer can both read the same count and lose an
    /// increment. Known limitation — the directory offers no atomic
    /// increment. Every failure in here is logged and swallowed.
    async fn credit_referrer(&self, directory: &DirectoryClient, code: &str) {
        let referrer = match directory.find_by_referral_code(code).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::warn!(code, "Referral code did not match any contact");
                return;
            }
            Err(e) => {
                tracing::warn!(code, error = %e, "Referrer lookup failed");
                return;
            }
        };

        let progress =
            referral::referral_progress(referrer.current_count(), referrer.current_badge());

        if let Err(e) = directory
            .update_contact(&referrer.email, progress.new_count, progress.new_badge)
            .await
        {
            tracing::warn!(email = referrer.email.as_str(), error = %e, "Referrer update failed");
            // Don't announce a milestone that wasn't recorded.
            return;
        }

        tracing::info!(
            email = referrer.email.as_str(),
            count = progress.new_count,
            unlocked = progress.unlocked,
            "Credited referral"
        );

        if progress.unlocked {
            self.send_badge_email(directory, &referrer.email, &progress)
                .await;
        }
    }

    /// Send the badge milestone email, when a template is configured.
    async fn send_badge_email(
        &self,
        directory: &DirectoryClient,
        email: &str,
        progress: &ReferralProgress,
    ) {
        let Some(ref template_id) = self.config.badge_template_id else {
            return;
        };
        let Some(badge) = progress.new_badge else {
            return;
        };

        let result = directory
            .send_transactional(
                template_id,
                email,
                json!({
                    "badge": badge.as_str(),
                    "referralCount": progress.new_count,
                    "unsubscribeUrl": "",
                }),
            )
            .await;

        match result {
            Ok(()) => {
                tracing::info!(email, badge = badge.as_str(), "Badge email sent");
            }
            Err(e) => {
                tracing::warn!(email, badge = badge.as_str(), error = %e, "Badge email failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured_service() -> SignupService {
        SignupService::new(WaitlistConfig::default())
    }

    #[tokio::test]
    async fn test_missing_email_is_rejected() {
        let service = unconfigured_service();
        let result = service
            .signup(SignupRequest {
                email: None,
                referred_by: None,
            })
            .await;
        assert!(matches!(result, Err(SignupError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_email_without_at_is_rejected() {
        let service = unconfigured_service();
        let result = service
            .signup(SignupRequest {
                email: Some("not-an-email".to_string()),
                referred_by: None,
            })
            .await;
        assert!(matches!(result, Err(SignupError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_validation_runs_before_configuration_check() {
        // An invalid email must 400 even when the service could not make
        // outbound calls anyway.
        let service = unconfigured_service();
        let invalid = service
            .signup(SignupRequest {
                email: Some("   ".to_string()),
                referred_by: Some("ABC1234".to_string()),
            })
            .await;
        assert!(matches!(invalid, Err(SignupError::InvalidEmail)));

        // A valid email against an unconfigured service is refused before
        // any outbound call.
        let valid = service
            .signup(SignupRequest {
                email: Some("alice@example.com".to_string()),
                referred_by: None,
            })
            .await;
        assert!(matches!(valid, Err(SignupError::NotConfigured)));
    }

    #[test]
    fn test_request_accepts_camel_case_referral_field() {
        let request: SignupRequest = serde_json::from_str(
            r#"{ "email": "alice@example.com", "referredBy": "ABC1234" }"#,
        )
        .unwrap();
        assert_eq!(request.email.as_deref(), Some("alice@example.com"));
        assert_eq!(request.referred_by.as_deref(), Some("ABC1234"));
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = SignupResponse {
            success: true,
            referral_code: "ABC1234".to_string(),
            referral_link: "https://example.com?ref=ABC1234".to_string(),
            already_signed_up: false,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["referralCode"], "ABC1234");
        assert_eq!(value["referralLink"], "https://example.com?ref=ABC1234");
        assert_eq!(value["alreadySignedUp"], false);
    }
}
