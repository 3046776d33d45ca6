use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use ticketdesk_client_core::model::{
    ActivityLogEntry, Attachment, Comment, ConfigEntry, ConfigKind, DownloadedFile, Ticket, User,
};
use ticketdesk_client_core::transport::MultipartFile;
use ticketdesk_client_core::validation::ValidationErrors;
use ticketdesk_client_core::workflow::can_request_transition;
use ticketdesk_client_core::{
    ApiRequest, ClientError, HttpTransport, SessionManager, SessionStorage, TicketStatus,
};
use tracing::info;

use crate::download::downloaded_file;
use crate::types::{
    AttachmentUpload, NewActivity, NewComment, NewConfigEntry, NewTicket, NewUser, StatusChange,
    TicketUpdate, UserUpdate,
};

pub const ATTACHMENT_FIELD: &str = "file";

/// Typed access to the TicketDesk resources. Every call goes through the
/// shared session, so it carries the current credentials and gets the single
/// refresh-and-retry on an expired access token.
pub struct TicketDeskClient<T, S> {
    session: Arc<SessionManager<T, S>>,
}

impl<T, S> Clone for TicketDeskClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<T, S> TicketDeskClient<T, S>
where
    T: HttpTransport,
    S: SessionStorage,
{
    pub fn new(session: Arc<SessionManager<T, S>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager<T, S>> {
        &self.session
    }

    #[must_use]
    pub fn users_path() -> &'static str {
        "/user"
    }

    #[must_use]
    pub fn user_path(user_id: &str) -> String {
        format!("/user/{}", user_id.trim())
    }

    #[must_use]
    pub fn tickets_path() -> &'static str {
        "/ticket"
    }

    #[must_use]
    pub fn ticket_path(ticket_id: &str) -> String {
        format!("/ticket/{}", ticket_id.trim())
    }

    #[must_use]
    pub fn ticket_comments_path(ticket_id: &str) -> String {
        format!("/ticket/{}/comments", ticket_id.trim())
    }

    #[must_use]
    pub fn ticket_attachments_path(ticket_id: &str) -> String {
        format!("/ticket/{}/attachments", ticket_id.trim())
    }

    #[must_use]
    pub fn ticket_attachment_path(ticket_id: &str, attachment_id: &str) -> String {
        format!(
            "/ticket/{}/attachments/{}",
            ticket_id.trim(),
            attachment_id.trim()
        )
    }

    #[must_use]
    pub fn ticket_attachment_download_path(ticket_id: &str, attachment_id: &str) -> String {
        format!(
            "/ticket/{}/attachments/{}/download",
            ticket_id.trim(),
            attachment_id.trim()
        )
    }

    #[must_use]
    pub fn config_entries_path() -> &'static str {
        "/configmaster"
    }

    #[must_use]
    pub fn config_entry_path(entry_id: &str) -> String {
        format!("/configmaster/{}", entry_id.trim())
    }

    #[must_use]
    pub fn activity_log_path() -> &'static str {
        "/activity-log"
    }

    #[must_use]
    pub fn activity_entry_path(entry_id: &str) -> String {
        format!("/activity-log/{}", entry_id.trim())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        self.get_json(Self::users_path()).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ClientError> {
        self.get_json(&Self::user_path(user_id)).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ClientError> {
        let user = user.normalized()?;
        let created: User = self
            .send_json(ApiRequest::post(Self::users_path()), &user)
            .await?;
        info!(user_id = %created.id, role = %created.role, "user created");
        Ok(created)
    }

    pub async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<User, ClientError> {
        let update = update.normalized()?;
        self.send_json(ApiRequest::put(Self::user_path(user_id)), &update)
            .await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(Self::user_path(user_id)))
            .await
    }

    pub async fn list_tickets(&self) -> Result<Vec<Ticket>, ClientError> {
        self.get_json(Self::tickets_path()).await
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, ClientError> {
        self.get_json(&Self::ticket_path(ticket_id)).await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, ClientError> {
        ticket.validate()?;
        let created: Ticket = self
            .send_json(ApiRequest::post(Self::tickets_path()), ticket)
            .await?;
        info!(ticket_id = %created.id, "ticket created");
        Ok(created)
    }

    pub async fn update_ticket(
        &self,
        ticket_id: &str,
        update: &TicketUpdate,
    ) -> Result<Ticket, ClientError> {
        update.validate()?;
        self.send_json(ApiRequest::put(Self::ticket_path(ticket_id)), update)
            .await
    }

    pub async fn delete_ticket(&self, ticket_id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(Self::ticket_path(ticket_id)))
            .await
    }

    /// Moves `ticket` to `target` if the signed-in viewer may do so.
    /// A disallowed move fails locally and nothing is sent.
    pub async fn transition_ticket(
        &self,
        ticket: &Ticket,
        target: TicketStatus,
    ) -> Result<Ticket, ClientError> {
        let Some(viewer) = self.session.current_user() else {
            return Err(ValidationErrors::single(
                "status",
                "sign in to change the ticket status",
            )
            .into());
        };
        let relationships = ticket.viewer_relationships(&viewer.id);
        if !can_request_transition(ticket.status, target, relationships) {
            return Err(ValidationErrors::single(
                "status",
                format!(
                    "cannot move ticket from {} to {}",
                    ticket.status.display_name(),
                    target.display_name()
                ),
            )
            .into());
        }

        let updated: Ticket = self
            .send_json(
                ApiRequest::put(Self::ticket_path(&ticket.id)),
                &StatusChange { status: target },
            )
            .await?;
        info!(
            ticket_id = %ticket.id,
            from = ticket.status.as_str(),
            to = target.as_str(),
            "ticket status changed"
        );
        Ok(updated)
    }

    pub async fn list_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, ClientError> {
        self.get_json(&Self::ticket_comments_path(ticket_id)).await
    }

    pub async fn add_comment(
        &self,
        ticket_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, ClientError> {
        comment.validate()?;
        self.send_json(
            ApiRequest::post(Self::ticket_comments_path(ticket_id)),
            comment,
        )
        .await
    }

    pub async fn list_attachments(&self, ticket_id: &str) -> Result<Vec<Attachment>, ClientError> {
        self.get_json(&Self::ticket_attachments_path(ticket_id))
            .await
    }

    pub async fn upload_attachment(
        &self,
        ticket_id: &str,
        upload: AttachmentUpload,
    ) -> Result<Attachment, ClientError> {
        upload.validate()?;
        let request = ApiRequest::post(Self::ticket_attachments_path(ticket_id)).with_multipart(
            vec![MultipartFile {
                field: ATTACHMENT_FIELD.to_string(),
                file_name: upload.file_name,
                content_type: upload.content_type,
                bytes: upload.bytes,
            }],
        );
        let response = self.session.execute(request).await?.error_for_status()?;
        response.json()
    }

    pub async fn delete_attachment(
        &self,
        ticket_id: &str,
        attachment_id: &str,
    ) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(Self::ticket_attachment_path(
            ticket_id,
            attachment_id,
        )))
        .await
    }

    pub async fn download_attachment(
        &self,
        ticket_id: &str,
        attachment_id: &str,
    ) -> Result<DownloadedFile, ClientError> {
        let request =
            ApiRequest::get(Self::ticket_attachment_download_path(ticket_id, attachment_id));
        let response = self.session.execute(request).await?.error_for_status()?;
        Ok(downloaded_file(
            response,
            &format!("attachment-{}", attachment_id.trim()),
        ))
    }

    /// Taxonomy entries, optionally narrowed to one kind.
    pub async fn list_config_entries(
        &self,
        kind: Option<ConfigKind>,
    ) -> Result<Vec<ConfigEntry>, ClientError> {
        let mut request = ApiRequest::get(Self::config_entries_path());
        if let Some(kind) = kind {
            request = request.with_query("type", kind.as_str());
        }
        self.fetch_json(request).await
    }

    pub async fn create_config_entry(
        &self,
        entry: &NewConfigEntry,
    ) -> Result<ConfigEntry, ClientError> {
        entry.validate()?;
        self.send_json(ApiRequest::post(Self::config_entries_path()), entry)
            .await
    }

    pub async fn update_config_entry(
        &self,
        entry_id: &str,
        entry: &NewConfigEntry,
    ) -> Result<ConfigEntry, ClientError> {
        entry.validate()?;
        self.send_json(ApiRequest::put(Self::config_entry_path(entry_id)), entry)
            .await
    }

    pub async fn delete_config_entry(&self, entry_id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(Self::config_entry_path(entry_id)))
            .await
    }

    pub async fn list_activity(
        &self,
        ticket_id: Option<&str>,
    ) -> Result<Vec<ActivityLogEntry>, ClientError> {
        let mut request = ApiRequest::get(Self::activity_log_path());
        if let Some(ticket_id) = ticket_id.map(str::trim).filter(|id| !id.is_empty()) {
            request = request.with_query("ticketId", ticket_id);
        }
        self.fetch_json(request).await
    }

    pub async fn create_activity(
        &self,
        activity: &NewActivity,
    ) -> Result<ActivityLogEntry, ClientError> {
        activity.validate()?;
        self.send_json(ApiRequest::post(Self::activity_log_path()), activity)
            .await
    }

    pub async fn delete_activity(&self, entry_id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(Self::activity_entry_path(entry_id)))
            .await
    }

    pub async fn get_json<R>(&self, path: &str) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        self.fetch_json(ApiRequest::get(path)).await
    }

    pub async fn send_json<Req, Res>(
        &self,
        request: ApiRequest,
        payload: &Req,
    ) -> Result<Res, ClientError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.fetch_json(request.with_json(payload)?).await
    }

    async fn fetch_json<R>(&self, request: ApiRequest) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let response = self.session.execute(request).await?.error_for_status()?;
        response.json()
    }

    async fn send_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.session.execute(request).await?.error_for_status()?;
        Ok(())
    }
}
