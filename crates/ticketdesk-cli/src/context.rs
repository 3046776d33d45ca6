use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use ticketdesk_api_client::{ReqwestTransport, ReqwestTransportConfig, TicketDeskClient};
use ticketdesk_client_core::auth::SIGN_IN_ROUTE;
use ticketdesk_client_core::{ClientError, FileStorage, Navigator, SessionManager, SessionUser};

use crate::config::CliConfig;

const ENV_PASSWORD: &str = "TICKETDESK_PASSWORD";

pub type CliSession = SessionManager<ReqwestTransport, FileStorage>;
pub type CliClient = TicketDeskClient<ReqwestTransport, FileStorage>;

/// Tells the operator to sign in again when the session is torn down.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: &str) {
        if route == SIGN_IN_ROUTE {
            eprintln!("Your session has expired. Run `ticketdesk login` to sign in again.");
        }
    }
}

pub struct AppContext {
    pub config: CliConfig,
    pub client: CliClient,
    pub json: bool,
}

impl AppContext {
    pub fn open(config: CliConfig, json: bool) -> anyhow::Result<Self> {
        let mut transport_config = ReqwestTransportConfig::new(config.api_base_url.clone());
        transport_config.timeout_ms = config.timeout_ms;
        let transport = ReqwestTransport::new(transport_config).context("build http transport")?;
        let storage = FileStorage::new(&config.session_file);
        let session =
            SessionManager::new(transport, storage).with_navigator(Arc::new(TerminalNavigator));
        session
            .initialize()
            .map_err(friendly)
            .context("restore saved session")?;
        tracing::debug!(
            base_url = %config.api_base_url,
            session_file = %config.session_file.display(),
            "cli context ready"
        );
        Ok(Self {
            client: TicketDeskClient::new(Arc::new(session)),
            config,
            json,
        })
    }

    pub fn session(&self) -> &CliSession {
        self.client.session()
    }

    pub fn require_user(&self) -> anyhow::Result<SessionUser> {
        match self.session().current_user() {
            Some(user) => Ok(user),
            None => bail!("not signed in; run `ticketdesk login` first"),
        }
    }

    pub fn emit<T: Serialize + ?Sized>(
        &self,
        value: &T,
        render: impl FnOnce(&T),
    ) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            render(value);
        }
        Ok(())
    }
}

/// Attaches the user-facing message to a client failure.
pub fn friendly(error: ClientError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

/// Secret from stdin (`from_stdin`) or `TICKETDESK_PASSWORD`.
pub fn read_password(from_stdin: bool) -> anyhow::Result<String> {
    if from_stdin {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read password from stdin")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => bail!("no password given; pass --password-stdin or set {ENV_PASSWORD}"),
    }
}

pub fn display_or_dash(value: Option<&str>) -> &str {
    value.filter(|value| !value.trim().is_empty()).unwrap_or("-")
}

pub fn format_timestamp(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(
        || "-".to_string(),
        |value| value.format("%Y-%m-%d %H:%M").to_string(),
    )
}
