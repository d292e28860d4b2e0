//! GitHub issue puller.
//!
//! Pages through `GET /repos/{owner}/{name}/issues` until an empty page, a
//! rate-limit response or any other failure, then writes everything collected
//! to a pretty-printed JSON file. Issues are stored verbatim so later stages
//! can pick whichever fields they need.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::GithubConfig;

const USER_AGENT: &str = concat!("panda-rag/", env!("CARGO_PKG_VERSION"));

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// An empty page came back.
    Exhausted,
    /// HTTP 403; `remaining` is the `X-RateLimit-Remaining` header, if sent.
    RateLimited { remaining: Option<String> },
    /// Any other non-200 status.
    Failed { status: u16 },
}

#[derive(Debug)]
pub struct PullOutcome {
    pub issues: Vec<Value>,
    pub stop: StopReason,
}

/// Fetch every page of issues for the configured repository.
///
/// Non-200 responses end the pull with whatever was collected so far; only
/// transport errors are returned as `Err`.
pub async fn pull_issues(config: &GithubConfig) -> Result<PullOutcome> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()?;

    let base = config.api_url.trim_end_matches('/');
    let mut issues = Vec::new();
    let mut page = 1u32;

    let stop = loop {
        let url = format!(
            "{}/repos/{}/issues?state={}&page={}&per_page={}",
            base, config.repo, config.state, page, config.per_page
        );
        println!("Fetching page {}...", page);

        let mut request = client.get(&url);
        if let Some(token) = &config.token {
            request = request
                .header("Authorization", format!("token {}", token))
                .header("Accept", "application/vnd.github.v3+json");
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?;
        let status = response.status();

        match status.as_u16() {
            200 => {
                let data: Vec<Value> = response
                    .json()
                    .await
                    .with_context(|| format!("Invalid JSON on page {}", page))?;
                if data.is_empty() {
                    break StopReason::Exhausted;
                }
                tracing::debug!(page, count = data.len(), "issues page fetched");
                issues.extend(data);
                page += 1;
            }
            403 => {
                let remaining = response
                    .headers()
                    .get("X-RateLimit-Remaining")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                println!("Rate limit exceeded. Consider using a GitHub token.");
                println!(
                    "Remaining requests: {}",
                    remaining.as_deref().unwrap_or("Unknown")
                );
                break StopReason::RateLimited { remaining };
            }
            code => {
                println!("Failed to fetch data: {}", code);
                break StopReason::Failed { status: code };
            }
        }
    };

    Ok(PullOutcome { issues, stop })
}

/// Serialize `issues` as a JSON array indented by four spaces.
pub fn to_pretty_json(issues: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    issues.serialize(&mut ser)?;
    Ok(buf)
}

fn write_issues(path: &Path, issues: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_pretty_json(issues)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// CLI entry point for `panda issues pull`.
pub async fn run_pull(config: &GithubConfig, out: &Path) -> Result<()> {
    let outcome = pull_issues(config).await?;
    tracing::info!(stop = ?outcome.stop, count = outcome.issues.len(), "pull finished");

    println!("Total Issue Collected: {}", outcome.issues.len());
    write_issues(out, &outcome.issues)?;
    println!("Completed");
    Ok(())
}
