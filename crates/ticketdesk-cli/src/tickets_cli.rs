use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::json;
use ticketdesk_api_client::{AttachmentUpload, NewComment, NewTicket};
use ticketdesk_client_core::TicketStatus;
use ticketdesk_client_core::listing::{DEFAULT_PAGE_SIZE, TicketQuery, TicketSortKey};
use ticketdesk_client_core::model::Ticket;
use ticketdesk_client_core::workflow::compute_transitions;

use crate::context::{AppContext, display_or_dash, format_timestamp, friendly};

#[derive(Subcommand)]
pub enum TicketCommand {
    /// List tickets with local search, filters and paging
    List(ListTicketsArgs),
    /// Show one ticket
    Show { id: String },
    /// Open a new ticket
    Create(CreateTicketArgs),
    /// Show the status changes available to you
    Transitions { id: String },
    /// Move a ticket to a new status
    Transition {
        id: String,
        #[arg(value_parser = parse_status)]
        status: TicketStatus,
    },
    /// Delete a ticket
    Delete { id: String },
}

#[derive(Args)]
pub struct ListTicketsArgs {
    /// Case-insensitive text matched against title, description and id
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TicketStatus>,
    #[arg(long)]
    pub priority: Option<String>,
    /// created, updated, title or status
    #[arg(long, value_parser = parse_sort_key, default_value = "created")]
    pub sort: TicketSortKey,
    /// Sort ascending instead of newest/highest first
    #[arg(long)]
    pub asc: bool,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Args)]
pub struct CreateTicketArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub subcategory: Option<String>,
    #[arg(long)]
    pub priority: String,
    /// User id of the assignee
    #[arg(long)]
    pub assign_to: Option<String>,
    /// User id of the approver
    #[arg(long)]
    pub approver: Option<String>,
}

#[derive(Subcommand)]
pub enum CommentCommand {
    /// List comments on a ticket
    List { ticket: String },
    /// Add a comment to a ticket
    Add { ticket: String, body: String },
}

#[derive(Subcommand)]
pub enum AttachmentCommand {
    /// List files attached to a ticket
    List { ticket: String },
    /// Attach a local file to a ticket
    Upload {
        ticket: String,
        path: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download an attachment
    Download {
        ticket: String,
        attachment: String,
        /// Target file or directory; defaults to the server-provided name in the current directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Remove an attachment
    Delete { ticket: String, attachment: String },
}

pub(crate) fn parse_status(raw: &str) -> Result<TicketStatus, String> {
    TicketStatus::parse(raw).ok_or_else(|| {
        let known = TicketStatus::ALL.map(TicketStatus::as_str).join(", ");
        format!("unknown status '{raw}' (expected one of: {known})")
    })
}

fn parse_sort_key(raw: &str) -> Result<TicketSortKey, String> {
    TicketSortKey::parse(raw)
        .ok_or_else(|| format!("unknown sort key '{raw}' (expected created, updated, title or status)"))
}

pub async fn run_tickets(context: &AppContext, command: TicketCommand) -> anyhow::Result<()> {
    let client = &context.client;
    match command {
        TicketCommand::List(args) => {
            let tickets = client.list_tickets().await.map_err(friendly)?;
            let query = TicketQuery {
                search: args.search,
                status: args.status,
                priority: args.priority,
                sort_key: args.sort,
                descending: !args.asc,
                page: args.page,
                page_size: args.page_size,
            };
            let page = query.apply(&tickets);
            context.emit(&page.items, |items| {
                if items.is_empty() {
                    println!("No tickets found.");
                    return;
                }
                for ticket in items {
                    println!(
                        "{:<8} {:<15} {:<8} {}",
                        ticket.id,
                        ticket.status.display_name(),
                        display_or_dash(ticket.priority.as_deref()),
                        ticket.title
                    );
                }
                println!(
                    "Page {} of {} ({} tickets)",
                    page.page, page.total_pages, page.total_items
                );
            })
        }
        TicketCommand::Show { id } => {
            let ticket = client.get_ticket(&id).await.map_err(friendly)?;
            context.emit(&ticket, print_ticket)
        }
        TicketCommand::Create(args) => {
            let ticket = NewTicket {
                title: args.title,
                description: args.description,
                category: args.category,
                subcategory: args.subcategory,
                priority: args.priority,
                assigned_to: args.assign_to,
                approver: args.approver,
            };
            let created = client.create_ticket(&ticket).await.map_err(friendly)?;
            context.emit(&created, |ticket| {
                println!("Created ticket {}: {}", ticket.id, ticket.title);
            })
        }
        TicketCommand::Transitions { id } => {
            let viewer = context.require_user()?;
            let ticket = client.get_ticket(&id).await.map_err(friendly)?;
            let options = compute_transitions(ticket.status, ticket.viewer_relationships(&viewer.id));
            context.emit(&options, |options| {
                for option in options {
                    let marker = if option.selectable { "*" } else { " " };
                    println!("{marker} {:<15} {}", option.value.as_str(), option.label);
                }
                if options.iter().all(|option| !option.selectable) {
                    println!("No status changes are available to you.");
                }
            })
        }
        TicketCommand::Transition { id, status } => {
            let ticket = client.get_ticket(&id).await.map_err(friendly)?;
            let updated = client
                .transition_ticket(&ticket, status)
                .await
                .map_err(friendly)?;
            context.emit(&updated, |ticket| {
                println!(
                    "Ticket {} is now {}.",
                    ticket.id,
                    ticket.status.display_name()
                );
            })
        }
        TicketCommand::Delete { id } => {
            client.delete_ticket(&id).await.map_err(friendly)?;
            context.emit(&json!({ "deleted": id }), |_| {
                println!("Deleted ticket {id}.");
            })
        }
    }
}

pub async fn run_comments(context: &AppContext, command: CommentCommand) -> anyhow::Result<()> {
    let client = &context.client;
    match command {
        CommentCommand::List { ticket } => {
            let comments = client.list_comments(&ticket).await.map_err(friendly)?;
            context.emit(&comments, |comments| {
                if comments.is_empty() {
                    println!("No comments yet.");
                }
                for comment in comments {
                    println!(
                        "[{}] {}: {}",
                        format_timestamp(comment.created_at),
                        display_or_dash(comment.author.as_deref()),
                        comment.body
                    );
                }
            })
        }
        CommentCommand::Add { ticket, body } => {
            let comment = client
                .add_comment(&ticket, &NewComment::new(body))
                .await
                .map_err(friendly)?;
            context.emit(&comment, |comment| {
                println!("Added comment {}.", comment.id);
            })
        }
    }
}

pub async fn run_attachments(
    context: &AppContext,
    command: AttachmentCommand,
) -> anyhow::Result<()> {
    let client = &context.client;
    match command {
        AttachmentCommand::List { ticket } => {
            let attachments = client.list_attachments(&ticket).await.map_err(friendly)?;
            context.emit(&attachments, |attachments| {
                if attachments.is_empty() {
                    println!("No attachments.");
                }
                for attachment in attachments {
                    let size = attachment
                        .size
                        .map_or_else(|| "-".to_string(), |size| format!("{size} B"));
                    println!("{:<8} {:<10} {}", attachment.id, size, attachment.file_name);
                }
            })
        }
        AttachmentCommand::Upload {
            ticket,
            path,
            content_type,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let attachment = client
                .upload_attachment(
                    &ticket,
                    AttachmentUpload {
                        file_name,
                        content_type,
                        bytes,
                    },
                )
                .await
                .map_err(friendly)?;
            context.emit(&attachment, |attachment| {
                println!("Uploaded {} as attachment {}.", attachment.file_name, attachment.id);
            })
        }
        AttachmentCommand::Download {
            ticket,
            attachment,
            output,
        } => {
            let file = client
                .download_attachment(&ticket, &attachment)
                .await
                .map_err(friendly)?;
            let target = match output {
                Some(path) if path.is_dir() => path.join(&file.file_name),
                Some(path) => path,
                None => PathBuf::from(&file.file_name),
            };
            std::fs::write(&target, &file.bytes)
                .with_context(|| format!("write {}", target.display()))?;
            let summary = json!({
                "path": target.display().to_string(),
                "bytes": file.bytes.len(),
                "content_type": file.content_type,
            });
            context.emit(&summary, |_| {
                println!("Saved {} bytes to {}.", file.bytes.len(), target.display());
            })
        }
        AttachmentCommand::Delete { ticket, attachment } => {
            client
                .delete_attachment(&ticket, &attachment)
                .await
                .map_err(friendly)?;
            context.emit(&json!({ "deleted": attachment }), |_| {
                println!("Deleted attachment {attachment}.");
            })
        }
    }
}

fn print_ticket(ticket: &Ticket) {
    println!("#{} {}", ticket.id, ticket.title);
    println!("Status:      {}", ticket.status.display_name());
    println!("Priority:    {}", display_or_dash(ticket.priority.as_deref()));
    println!("Category:    {}", display_or_dash(ticket.category.as_deref()));
    println!("Subcategory: {}", display_or_dash(ticket.subcategory.as_deref()));
    println!("Created by:  {}", display_or_dash(ticket.created_by.as_deref()));
    println!("Assigned to: {}", display_or_dash(ticket.assigned_to.as_deref()));
    println!("Approver:    {}", display_or_dash(ticket.approver.as_deref()));
    println!("Created:     {}", format_timestamp(ticket.created_at));
    println!("Updated:     {}", format_timestamp(ticket.updated_at));
    if !ticket.description.trim().is_empty() {
        println!();
        println!("{}", ticket.description);
    }
}
