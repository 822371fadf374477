use anyhow::Context;
use clap::Args;
use serde_json::Value;
use std::time::Duration;

use crate::cli::utils::output_value;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct UsageArgs {
    #[arg(long, env = "CLINIC_API_URL", default_value = "http://localhost:3000", help = "Server base URL")]
    pub server: String,

    #[arg(long, env = "CLINIC_TOKEN", hide_env_values = true, help = "Bearer token")]
    pub token: String,
}

pub async fn handle(args: UsageArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/api/subscriptions/usage", args.server.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(&args.token)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    let status = response.status();
    let body: Value = response.json().await.context("server returned a non-JSON body")?;
    if !status.is_success() {
        let code = body["code"].as_str().unwrap_or("UNKNOWN");
        let message = body["message"].as_str().unwrap_or("request failed");
        anyhow::bail!("{} ({}): {}", status, code, message);
    }

    output_value(output_format, &body["data"], render_report)
}

fn render_report(report: &Value) {
    println!(
        "Package: {}  (ends {})",
        report["package_name"].as_str().unwrap_or("-"),
        report["end_date"].as_str().unwrap_or("-")
    );
    println!("{:<14} {:>10} {:>10} {:>10}", "RESOURCE", "USED", "LIMIT", "REMAINING");

    let empty = Vec::new();
    for entry in report["resources"].as_array().unwrap_or(&empty) {
        println!(
            "{:<14} {:>10} {:>10} {:>10}",
            entry["resource_type"].as_str().unwrap_or("-"),
            entry["current_usage"].to_string(),
            format_limit(&entry["limit"]),
            format_remaining(&entry["remaining"]),
        );
    }
}

fn format_limit(limit: &Value) -> String {
    match limit.as_i64() {
        Some(n) if n >= 0 => n.to_string(),
        _ => "unlimited".to_string(),
    }
}

fn format_remaining(remaining: &Value) -> String {
    remaining.as_i64().map_or_else(|| "-".to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn negative_limit_renders_unlimited() {
        assert_eq!(format_limit(&json!(-1)), "unlimited");
        assert_eq!(format_limit(&json!(5)), "5");
        assert_eq!(format_remaining(&Value::Null), "-");
    }
}
