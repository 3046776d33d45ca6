use clap::Subcommand;
use serde_json::json;
use ticketdesk_api_client::{NewConfigEntry, NewUser};
use ticketdesk_client_core::UserRole;
use ticketdesk_client_core::model::ConfigKind;

use crate::context::{AppContext, display_or_dash, format_timestamp, friendly, read_password};

#[derive(Subcommand)]
pub enum UserCommand {
    /// List user accounts
    List,
    /// Create a user account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// admin, support or user
        #[arg(long, value_parser = parse_role, default_value = "user")]
        role: UserRole,
        /// Read the initial password from stdin instead of TICKETDESK_PASSWORD
        #[arg(long)]
        password_stdin: bool,
    },
    /// Delete a user account
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// List categories, subcategories, priorities and statuses
    List {
        #[arg(long, value_parser = parse_kind)]
        kind: Option<ConfigKind>,
    },
    /// Add a taxonomy entry
    Create {
        #[arg(long, value_parser = parse_kind)]
        kind: ConfigKind,
        #[arg(long)]
        name: String,
        /// Parent category id (required for subcategories)
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a taxonomy entry
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ActivityCommand {
    /// Show the activity log, optionally for one ticket
    List {
        #[arg(long)]
        ticket: Option<String>,
    },
}

fn parse_role(raw: &str) -> Result<UserRole, String> {
    UserRole::parse(raw).ok_or_else(|| format!("unknown role '{raw}' (expected admin, support or user)"))
}

fn parse_kind(raw: &str) -> Result<ConfigKind, String> {
    ConfigKind::parse(raw).ok_or_else(|| {
        let known = ConfigKind::ALL.map(ConfigKind::as_str).join(", ");
        format!("unknown config kind '{raw}' (expected one of: {known})")
    })
}

fn require_admin(context: &AppContext) -> anyhow::Result<()> {
    let user = context.require_user()?;
    if !user.role.is_admin() {
        anyhow::bail!("this command needs an admin account (signed in as {})", user.role);
    }
    Ok(())
}

pub async fn run_users(context: &AppContext, command: UserCommand) -> anyhow::Result<()> {
    require_admin(context)?;
    let client = &context.client;
    match command {
        UserCommand::List => {
            let users = client.list_users().await.map_err(friendly)?;
            context.emit(&users, |users| {
                for user in users {
                    let state = match user.active {
                        Some(false) => "inactive",
                        _ => "active",
                    };
                    println!(
                        "{:<8} {:<8} {:<9} {:<24} {}",
                        user.id,
                        user.role.as_str(),
                        state,
                        user.name,
                        user.email
                    );
                }
            })
        }
        UserCommand::Create {
            name,
            email,
            role,
            password_stdin,
        } => {
            let password = read_password(password_stdin)?;
            let user = NewUser {
                name,
                email,
                password,
                role,
            };
            let created = client.create_user(&user).await.map_err(friendly)?;
            context.emit(&created, |user| {
                println!("Created {} {} ({}).", user.role, user.name, user.id);
            })
        }
        UserCommand::Delete { id } => {
            client.delete_user(&id).await.map_err(friendly)?;
            context.emit(&json!({ "deleted": id }), |_| println!("Deleted user {id}."))
        }
    }
}

pub async fn run_config(context: &AppContext, command: ConfigCommand) -> anyhow::Result<()> {
    let client = &context.client;
    match command {
        ConfigCommand::List { kind } => {
            let entries = client.list_config_entries(kind).await.map_err(friendly)?;
            context.emit(&entries, |entries| {
                for entry in entries {
                    println!(
                        "{:<8} {:<12} {:<24} parent {}",
                        entry.id,
                        entry.kind.as_str(),
                        entry.name,
                        display_or_dash(entry.parent_id.as_deref())
                    );
                }
            })
        }
        ConfigCommand::Create {
            kind,
            name,
            parent,
            description,
        } => {
            require_admin(context)?;
            let entry = NewConfigEntry {
                kind,
                name,
                parent_id: parent,
                description,
            };
            let created = client.create_config_entry(&entry).await.map_err(friendly)?;
            context.emit(&created, |entry| {
                println!("Created {} '{}' ({}).", entry.kind.as_str(), entry.name, entry.id);
            })
        }
        ConfigCommand::Delete { id } => {
            require_admin(context)?;
            client.delete_config_entry(&id).await.map_err(friendly)?;
            context.emit(&json!({ "deleted": id }), |_| {
                println!("Deleted config entry {id}.");
            })
        }
    }
}

pub async fn run_activity(context: &AppContext, command: ActivityCommand) -> anyhow::Result<()> {
    match command {
        ActivityCommand::List { ticket } => {
            let entries = context
                .client
                .list_activity(ticket.as_deref())
                .await
                .map_err(friendly)?;
            context.emit(&entries, |entries| {
                if entries.is_empty() {
                    println!("No activity recorded.");
                }
                for entry in entries {
                    println!(
                        "[{}] ticket {} user {}: {}{}",
                        format_timestamp(entry.created_at),
                        display_or_dash(entry.ticket_id.as_deref()),
                        display_or_dash(entry.user_id.as_deref()),
                        entry.action,
                        entry
                            .details
                            .as_deref()
                            .map(|details| format!(" ({details})"))
                            .unwrap_or_default()
                    );
                }
            })
        }
    }
}
