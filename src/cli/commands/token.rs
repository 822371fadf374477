use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{Role, TokenKeys};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "User id (sub claim)")]
    pub user: Uuid,

    #[arg(long, help = "Role, e.g. Doctor or SuperAdmin")]
    pub role: String,

    #[arg(long, help = "Clinic id to claim explicitly")]
    pub clinic: Option<Uuid>,

    #[arg(long, env = "SECURITY_JWT_SECRET", hide_env_values = true, help = "Signing secret")]
    pub secret: Option<String>,

    #[arg(long, help = "Lifetime in hours")]
    pub expiry_hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &crate::config::config().security;
    let secret = args.secret.unwrap_or_else(|| security.jwt_secret.clone());
    let expiry_hours = args.expiry_hours.unwrap_or(security.jwt_expiry_hours);
    let role: Role = args.role.parse()?;

    let keys = TokenKeys::new(&secret, expiry_hours)?;
    let token = keys.issue(args.user, role, args.clinic)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_success(
            output_format,
            "Token issued",
            Some(json!({
                "token": token,
                "user_id": args.user,
                "role": role,
                "clinic_id": args.clinic,
                "expires_in_hours": expiry_hours,
            })),
        )?,
    }
    Ok(())
}
