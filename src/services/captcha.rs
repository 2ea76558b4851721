//! reCAPTCHA verification
//!
//! Public form submissions carry a client-side token that is checked against
//! the verification endpoint. Without a configured secret verification is
//! disabled and every token passes.

use crate::config::RecaptchaConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaOutcome {
    Passed,
    Rejected,
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Check a token. `Err` means the provider could not be reached.
    async fn verify(&self, token: Option<&str>, remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome>;

    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    min_score: f64,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(config: &RecaptchaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            secret: config.secret.clone(),
            min_score: config.min_score,
            verify_url: config.verify_url.clone(),
        })
    }

    fn judge(&self, response: &SiteVerifyResponse) -> CaptchaOutcome {
        if !response.success {
            return CaptchaOutcome::Rejected;
        }
        match response.score {
            Some(score) if score < self.min_score => CaptchaOutcome::Rejected,
            _ => CaptchaOutcome::Passed,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: Option<&str>, remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome> {
        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => return Ok(CaptchaOutcome::Rejected),
        };

        let mut form = vec![("secret", self.secret.clone()), ("response", token.to_string())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| anyhow!("reCAPTCHA request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("reCAPTCHA endpoint returned {}", response.status()));
        }
        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid reCAPTCHA response: {}", e))?;

        let outcome = self.judge(&body);
        if outcome == CaptchaOutcome::Rejected {
            tracing::info!(score = ?body.score, errors = ?body.error_codes, "captcha rejected");
        }
        Ok(outcome)
    }
}

/// Accepts everything; used when no secret is configured
pub struct DisabledCaptcha;

#[async_trait]
impl CaptchaVerifier for DisabledCaptcha {
    async fn verify(&self, _token: Option<&str>, _remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome> {
        Ok(CaptchaOutcome::Passed)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Fixed answer, for tests
pub struct StaticCaptcha(pub CaptchaOutcome);

#[async_trait]
impl CaptchaVerifier for StaticCaptcha {
    async fn verify(&self, _token: Option<&str>, _remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome> {
        Ok(self.0)
    }
}

pub fn create_verifier(config: &RecaptchaConfig) -> Result<Arc<dyn CaptchaVerifier>> {
    if config.is_enabled() {
        Ok(Arc::new(RecaptchaVerifier::new(config)?))
    } else {
        Ok(Arc::new(DisabledCaptcha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(min_score: f64) -> RecaptchaVerifier {
        RecaptchaVerifier::new(&RecaptchaConfig {
            secret: "s".into(),
            min_score,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_judge() {
        let v = verifier(0.5);
        let parse = |s: &str| serde_json::from_str::<SiteVerifyResponse>(s).unwrap();

        assert_eq!(v.judge(&parse(r#"{"success": true}"#)), CaptchaOutcome::Passed);
        assert_eq!(v.judge(&parse(r#"{"success": true, "score": 0.9}"#)), CaptchaOutcome::Passed);
        assert_eq!(v.judge(&parse(r#"{"success": true, "score": 0.1}"#)), CaptchaOutcome::Rejected);
        assert_eq!(
            v.judge(&parse(r#"{"success": false, "error-codes": ["invalid-input-response"]}"#)),
            CaptchaOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_missing_token_rejected_without_request() {
        let v = verifier(0.5);
        assert_eq!(v.verify(None, None).await.unwrap(), CaptchaOutcome::Rejected);
        assert_eq!(v.verify(Some("  "), None).await.unwrap(), CaptchaOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_disabled_passes() {
        let v = create_verifier(&RecaptchaConfig::default()).unwrap();
        assert!(!v.is_enabled());
        assert_eq!(v.verify(None, None).await.unwrap(), CaptchaOutcome::Passed);
    }
}
