use clap::Args;
use serde_json::json;
use ticketdesk_client_core::LoginCredentials;

use crate::context::{AppContext, friendly, read_password};

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,
    /// Read the password from the first line of stdin instead of TICKETDESK_PASSWORD
    #[arg(long)]
    pub password_stdin: bool,
}

pub async fn login(context: &AppContext, args: LoginArgs) -> anyhow::Result<()> {
    let password = read_password(args.password_stdin)?;
    let user = context
        .session()
        .login(&LoginCredentials::new(args.email, password))
        .await
        .map_err(friendly)?;
    context.emit(&user, |user| {
        println!("Signed in as {} ({}).", user.name, user.role);
    })
}

pub async fn logout(context: &AppContext) -> anyhow::Result<()> {
    context.session().logout().await.map_err(friendly)?;
    context.emit(&json!({ "signed_out": true }), |_| println!("Signed out."))
}

pub fn whoami(context: &AppContext) -> anyhow::Result<()> {
    let user = context.require_user()?;
    let saved = context.session().current_session().map_err(friendly)?;
    let can_refresh = saved.refresh_token.is_some();
    let report = json!({ "user": &user, "can_refresh": can_refresh });
    context.emit(&report, |_| {
        println!("{} (id {}, role {})", user.name, user.id, user.role);
        println!("API: {}", context.config.api_base_url);
        if !can_refresh {
            println!("No refresh token saved; sign in again when the access token expires.");
        }
    })
}
