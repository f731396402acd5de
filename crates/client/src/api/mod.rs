// REST API client for the LiveDraft backend.
//
// Request/response shapes are owned by the backend; this module mirrors
// them as local structs. Anything the client can validate (titles, comment
// text, upload types) is rejected before a request goes out. Failures are
// scoped to the single action that triggered them — nothing here is fatal.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use livedraft_common::types::{
    Annotation, AnnotationCoordinates, ChatMessage, ChatParticipant, ChatSummary, Comment,
};

const SUPPORTED_UPLOAD_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "webp", "mp4", "webm", "mov"];

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Rejections that never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("document title must not be empty")]
    EmptyTitle,
    #[error("comment text must not be empty")]
    EmptyComment,
    #[error("annotation text must not be empty")]
    EmptyAnnotation,
    #[error("unsupported file type `{0}` (expected an image or video)")]
    UnsupportedFileType(String),
}

/// Check an upload file name against the supported media types.
pub fn validate_upload_type(file_name: &str) -> Result<(), ValidationError> {
    let extension = file_name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    if file_name.contains('.') && SUPPORTED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType(extension))
    }
}

// ── Request/response shapes ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMeta {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewComment {
    pub media_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAnnotation {
    pub media_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub coordinates: AnnotationCoordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgMember {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrgInvite {
    pub invited_user_id: String,
    pub invited_by: String,
    pub message: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShareRequest {
    pub user_id: String,
    pub permission_level: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesBody {
    messages: Vec<ChatMessage>,
}

// ── Client ─────────────────────────────────────────────────────────

/// HTTP client for the LiveDraft REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self { http: reqwest::Client::new(), base_url: Url::parse(base_url)?, auth_token: None })
    }

    /// Attach a bearer token from the identity provider.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    // ── Documents ───────────────────────────────────────────────────

    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentMeta>, ApiError> {
        self.get(&format!("documents?user_id={user_id}")).await
    }

    pub async fn create_document(
        &self,
        title: &str,
        user_id: &str,
    ) -> Result<DocumentMeta, ApiError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        self.post(
            "documents",
            &serde_json::json!({ "title": title.trim(), "user_id": user_id }),
        )
        .await
    }

    pub async fn get_document_content(
        &self,
        document_id: &str,
    ) -> Result<DocumentContent, ApiError> {
        self.get(&format!("documents/{document_id}/content")).await
    }

    /// Persist the full document text (debounced autosave target).
    pub async fn save_document_content(
        &self,
        document_id: &str,
        content: &str,
        user_id: &str,
    ) -> Result<(), ApiError> {
        self.patch_no_response(
            &format!("documents/{document_id}/content"),
            &serde_json::json!({ "content": content, "user_id": user_id }),
        )
        .await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("documents/{document_id}"))?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        Self::check(response).await.map(|_| ())
    }

    pub async fn share_document(
        &self,
        document_id: &str,
        share: &ShareRequest,
    ) -> Result<(), ApiError> {
        self.post_no_response(&format!("documents/{document_id}/share"), share).await
    }

    // ── Comments and annotations ────────────────────────────────────

    pub async fn list_comments(&self, media_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.get(&format!("comments?media_id={media_id}")).await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<Comment, ApiError> {
        if comment.text.trim().is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        self.post("comments", comment).await
    }

    pub async fn list_annotations(&self, media_id: &str) -> Result<Vec<Annotation>, ApiError> {
        self.get(&format!("annotations?media_id={media_id}")).await
    }

    pub async fn create_annotation(
        &self,
        annotation: &NewAnnotation,
    ) -> Result<Annotation, ApiError> {
        if annotation.text.trim().is_empty() {
            return Err(ValidationError::EmptyAnnotation.into());
        }
        self.post("annotations", annotation).await
    }

    // ── Users and organizations ─────────────────────────────────────

    pub async fn lookup_user(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        self.get(&format!("users/{user_id}")).await
    }

    pub async fn create_user(&self, profile: &UserProfile) -> Result<UserProfile, ApiError> {
        self.post("users", profile).await
    }

    pub async fn list_org_members(&self, org_id: &str) -> Result<Vec<OrgMember>, ApiError> {
        self.get(&format!("organizations/{org_id}/members")).await
    }

    pub async fn send_org_invite(&self, invite: &OrgInvite) -> Result<(), ApiError> {
        self.post_no_response("org-invites/send", invite).await
    }

    // ── Private chat ────────────────────────────────────────────────

    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, ApiError> {
        self.get(&format!("private-chat/chats/{user_id}")).await
    }

    /// Users available to start a chat with, excluding the caller.
    pub async fn list_chat_users(&self, user_id: &str) -> Result<Vec<ChatParticipant>, ApiError> {
        self.get(&format!("private-chat/users/{user_id}")).await
    }

    pub async fn chat_history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let body: MessagesBody = self.get(&format!("private-chat/messages/{chat_id}")).await?;
        Ok(body.messages)
    }

    // ── Plumbing ────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let response = self.authorized(self.http.get(self.url(path)?)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let response = self.authorized(self.http.post(self.url(path)?)).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_no_response<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let response = self.authorized(self.http.post(self.url(path)?)).json(body).send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn patch_no_response<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let response = self.authorized(self.http.patch(self.url(path)?)).json(body).send().await?;
        Self::check(response).await.map(|_| ())
    }

    /// Turn non-2xx responses into `ApiError::Status`, preferring the
    /// server's own `{"error": ...}` message.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        Err(ApiError::Status { status, message })
    }
}
