//! Installation access tokens for GitHub Apps.

use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use anyhow::Result;
use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use crate::ops::github_curl::GithubCurlClient;

/// GitHub rejects app JWTs valid for more than ten minutes.
const JWT_LIFETIME_SECS: u64 = 600;
/// Backdate `iat` to tolerate clock drift against GitHub.
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AppClaims {
    pub iat: u64,
    pub exp: u64,
    /// App (integration) ID
    pub iss: String,
}

impl AppClaims {
    pub fn new(integration_id: u64, now: u64) -> Self {
        Self {
            iat: now.saturating_sub(CLOCK_SKEW_SECS),
            exp: now + JWT_LIFETIME_SECS,
            iss: integration_id.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct InstallationToken {
    token: String,
}

/// Sign an RS256 JWT identifying the app.
pub fn generate_jwt(integration_id: u64, private_key_pem: &[u8]) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("Failed to get current time")?
        .as_secs();
    let key = EncodingKey::from_rsa_pem(private_key_pem).context("Failed to parse private key")?;
    jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &AppClaims::new(integration_id, now),
        &key,
    )
    .context("Failed to encode JWT")
}

/// Exchange an app JWT for an installation token and print it without a
/// trailing newline, so it can be captured with `$(...)`.
#[instrument(skip_all, fields(integration_id = integration_id, installation_id = installation_id))]
pub async fn cmd_app_token(
    api_base_url: &str,
    integration_id: u64,
    installation_id: u64,
    pem_path: &Path,
    stdout: &mut impl std::io::Write,
) -> Result<()> {
    let pem = tokio::fs::read(pem_path)
        .await
        .with_context(|| format!("Failed to read private key {}", pem_path.display()))?;
    let jwt = generate_jwt(integration_id, &pem)?;

    let client = GithubCurlClient::new(jwt, api_base_url.to_string());
    let url = client.url(&format!("/app/installations/{}/access_tokens", installation_id));
    let response = client
        .post(&url, "{}")
        .await
        .context("Failed to get installation token")?;
    let token: InstallationToken =
        serde_json::from_str(&response).context("Failed to parse installation token")?;

    write!(stdout, "{}", token.token)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_window() {
        let claims = AppClaims::new(1234, 1_700_000_000);
        assert_eq!(
            claims,
            AppClaims {
                iat: 1_699_999_940,
                exp: 1_700_000_600,
                iss: "1234".to_string(),
            }
        );
    }

    #[test]
    fn test_claims_serialize_iss_as_string() {
        let json = serde_json::to_string(&AppClaims::new(7, 100)).unwrap();
        assert_eq!(json, r#"{"iat":40,"exp":700,"iss":"7"}"#);
    }

    #[test]
    fn test_generate_jwt_rejects_invalid_key() {
        let err = generate_jwt(1, b"not a pem").unwrap_err();
        assert!(err.to_string().contains("private key"));
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_app_token(
            "https://api.github.test",
            1,
            2,
            &dir.path().join("missing.pem"),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("missing.pem"));
    }
}
