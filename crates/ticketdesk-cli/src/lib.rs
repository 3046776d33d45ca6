#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod admin_cli;
pub mod config;
mod context;
mod session_cli;
mod tickets_cli;

pub use config::{CliConfig, ConfigError};

#[derive(Parser)]
#[command(name = "ticketdesk")]
#[command(about = "TicketDesk command-line client")]
pub struct TicketDeskCli {
    /// Settings file (defaults to <config dir>/ticketdesk/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Sign in and save the session
    Login(session_cli::LoginArgs),
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Tickets (list, show, create, status changes)
    #[command(subcommand)]
    Tickets(tickets_cli::TicketCommand),
    /// Ticket comments
    #[command(subcommand)]
    Comments(tickets_cli::CommentCommand),
    /// Ticket attachments
    #[command(subcommand)]
    Attachments(tickets_cli::AttachmentCommand),
    /// User accounts (admin)
    #[command(subcommand)]
    Users(admin_cli::UserCommand),
    /// Categories, subcategories, priorities and statuses
    #[command(subcommand)]
    Config(admin_cli::ConfigCommand),
    /// Activity log
    #[command(subcommand)]
    Activity(admin_cli::ActivityCommand),
}

/// Installs the stderr log subscriber: `RUST_LOG` when set, else `log_filter`.
pub fn init_tracing(log_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run(cli: TicketDeskCli, config: CliConfig) -> anyhow::Result<()> {
    let context = context::AppContext::open(config, cli.json)?;
    match cli.command {
        Commands::Login(args) => session_cli::login(&context, args).await,
        Commands::Logout => session_cli::logout(&context).await,
        Commands::Whoami => session_cli::whoami(&context),
        Commands::Tickets(command) => tickets_cli::run_tickets(&context, command).await,
        Commands::Comments(command) => tickets_cli::run_comments(&context, command).await,
        Commands::Attachments(command) => tickets_cli::run_attachments(&context, command).await,
        Commands::Users(command) => admin_cli::run_users(&context, command).await,
        Commands::Config(command) => admin_cli::run_config(&context, command).await,
        Commands::Activity(command) => admin_cli::run_activity(&context, command).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;
    use ticketdesk_client_core::TicketStatus;
    use ticketdesk_client_core::listing::TicketSortKey;
    use ticketdesk_client_core::model::ConfigKind;

    use super::{Commands, TicketDeskCli};
    use crate::admin_cli::{ConfigCommand, UserCommand};
    use crate::tickets_cli::TicketCommand;

    #[test]
    fn cli_requires_subcommand() {
        let err = match TicketDeskCli::try_parse_from(["ticketdesk"]) {
            Ok(_) => panic!("expected missing subcommand parse error"),
            Err(err) => err,
        };
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        let err = match TicketDeskCli::try_parse_from(["ticketdesk", "unknown-subcommand"]) {
            Ok(_) => panic!("expected invalid subcommand parse error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn transition_accepts_display_style_status() {
        let cli = TicketDeskCli::try_parse_from([
            "ticketdesk",
            "tickets",
            "transition",
            "42",
            "to-be-approved",
        ])
        .expect("parse");
        match cli.command {
            Commands::Tickets(TicketCommand::Transition { id, status }) => {
                assert_eq!(id, "42");
                assert_eq!(status, TicketStatus::ToBeApproved);
            }
            _ => panic!("expected tickets transition"),
        }
    }

    #[test]
    fn transition_rejects_unknown_status() {
        let err = match TicketDeskCli::try_parse_from([
            "ticketdesk",
            "tickets",
            "transition",
            "42",
            "archived",
        ]) {
            Ok(_) => panic!("expected invalid status"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn list_defaults_and_global_flags() {
        let cli = TicketDeskCli::try_parse_from(["ticketdesk", "tickets", "list", "--json"])
            .expect("parse");
        assert!(cli.json);
        match cli.command {
            Commands::Tickets(TicketCommand::List(args)) => {
                assert_eq!(args.sort, TicketSortKey::CreatedAt);
                assert!(!args.asc);
                assert_eq!(args.page, 1);
            }
            _ => panic!("expected tickets list"),
        }
    }

    #[test]
    fn admin_commands_parse_typed_values() {
        let cli = TicketDeskCli::try_parse_from([
            "ticketdesk",
            "config",
            "create",
            "--kind",
            "subcategories",
            "--name",
            "Laptops",
            "--parent",
            "3",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommand::Create {
                kind: ConfigKind::Subcategory,
                ..
            })
        ));

        let cli = TicketDeskCli::try_parse_from([
            "ticketdesk",
            "users",
            "create",
            "--name",
            "Sam",
            "--email",
            "sam@example.com",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Users(UserCommand::Create {
                role: ticketdesk_client_core::UserRole::User,
                password_stdin: false,
                ..
            })
        ));
    }
}
