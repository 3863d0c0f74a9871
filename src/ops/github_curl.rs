use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// HTTP client using curl for making GitHub API requests
pub struct GithubCurlClient {
    token: String,
    api_base_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubError {
    message: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to execute curl command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("curl command failed: {0}")]
    Curl(String),

    #[error("GitHub API error ({status}): {message}{}", render_details(.details))]
    Status {
        status: u16,
        message: String,
        details: Vec<String>,
    },

    #[error("failed to decode GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
}

fn render_details(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join("; "))
    }
}

impl ApiError {
    /// Whether GitHub's message or any of its error details contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::Status {
                message, details, ..
            } => message.contains(needle) || details.iter().any(|d| d.contains(needle)),
            _ => false,
        }
    }
}

impl GithubCurlClient {
    pub fn new(token: String, api_base_url: String) -> Self {
        Self {
            token,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for an API path such as `/repos/o/r/pulls`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<String, ApiError> {
        self.run(&curl_args(url, None)).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, json_data: &str) -> Result<String, ApiError> {
        self.run(&curl_args(url, Some(json_data))).await
    }

    /// Runs curl with the token fed through `--config -` on stdin, so it never
    /// shows up in the process list.
    async fn run(&self, args: &[&str]) -> Result<String, ApiError> {
        let mut child = Command::new("curl")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(auth_config(&self.token).as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(ApiError::Curl(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        parse_response(&output.stdout)
    }
}

fn curl_args<'a>(url: &'a str, json_data: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec![
        "-s",
        "-w",
        "\n%{http_code}",
        "--config",
        "-",
        "-H",
        "Accept: application/vnd.github+json",
        "-H",
        "User-Agent: ghkit",
    ];
    if let Some(data) = json_data {
        args.extend(["-X", "POST", "-H", "Content-Type: application/json", "-d", data]);
    }
    args.push(url);
    args
}

/// A curl config file line carrying the bearer token.
fn auth_config(token: &str) -> String {
    let escaped = token.replace('\\', "\\\\").replace('"', "\\\"");
    format!("header = \"Authorization: Bearer {}\"\n", escaped)
}

/// Parse curl response with status code appended
fn parse_response(stdout: &[u8]) -> Result<String, ApiError> {
    let output_str = String::from_utf8_lossy(stdout);
    let (response, status_code) = match output_str.rsplit_once('\n') {
        Some((body, code)) => (body.to_string(), code.trim().parse::<u16>().unwrap_or(0)),
        None => (String::new(), output_str.trim().parse::<u16>().unwrap_or(0)),
    };

    if status_code == 0 {
        return Err(ApiError::Curl(format!(
            "no HTTP status in response: {}",
            output_str
        )));
    }

    if status_code >= 400 {
        // Try to parse error message from response
        if let Ok(error) = serde_json::from_str::<GitHubError>(&response) {
            return Err(ApiError::Status {
                status: status_code,
                message: error.message,
                details: error.errors.iter().map(describe_error_detail).collect(),
            });
        }
        return Err(ApiError::Status {
            status: status_code,
            message: response,
            details: vec![],
        });
    }

    Ok(response)
}

/// GitHub reports validation problems either as plain strings or as objects
/// with a `message`, or `field` and `code`.
fn describe_error_detail(detail: &serde_json::Value) -> String {
    if let Some(text) = detail.as_str() {
        return text.to_string();
    }
    if let Some(message) = detail.get("message").and_then(|m| m.as_str()) {
        return message.to_string();
    }
    let field = detail.get("field").and_then(|f| f.as_str()).unwrap_or("");
    let code = detail.get("code").and_then(|c| c.as_str()).unwrap_or("");
    format!("{} {}", field, code).trim().to_string()
}
