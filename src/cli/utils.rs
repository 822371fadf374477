use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a success message, merging `data` into the JSON envelope.
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message,
            });
            if let (Some(Value::Object(extra)), Value::Object(target)) = (data, &mut response) {
                target.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print a value as pretty JSON or through the given text renderer.
pub fn output_value<F>(output_format: OutputFormat, value: &Value, render_text: F) -> anyhow::Result<()>
where
    F: FnOnce(&Value),
{
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => render_text(value),
    }
    Ok(())
}

/// Database URL from the flag or the environment.
pub fn require_database_url(flag: Option<String>) -> anyhow::Result<String> {
    flag.or_else(|| crate::config::config().database.url.clone())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set; pass --database-url"))
}
