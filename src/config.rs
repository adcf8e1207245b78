//! Service configuration.
//!
//! Assembled once in `main` from CLI flags / environment variables and
//! injected into the router as an explicit struct. Handlers never read
//! process state directly.

/// Configuration for the waitlist service.
#[derive(Debug, Clone)]
pub struct WaitlistConfig {
    /// Contact directory API key. Signups are refused when absent.
    pub api_key: Option<String>,
    /// Transactional template id for the signup confirmation email.
    pub confirmation_template_id: Option<String>,
    /// Transactional template id for the badge milestone email. When unset,
    /// milestones are still recorded but no email goes out.
    pub badge_template_id: Option<String>,
    /// Contact directory API base URL.
    pub directory_url: String,
    /// Public site URL that referral links point at.
    pub site_url: String,
}

impl WaitlistConfig {
    /// Check if the directory client can be used (API key present).
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the shareable referral link for a code.
    pub fn referral_link(&self, code: &str) -> String {
        format!("{}?ref={}", self.site_url, code)
    }
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            confirmation_template_id: None,
            badge_template_id: None,
            directory_url: "https://app.loops.so/api/v1".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}
