//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/upload-document`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadDocumentRequest {
    /// Full document text.
    pub text: String,
    /// Name the document is stored and queried under.
    pub name: String,
}

/// Reply to an upload; `success` is false when ingestion failed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadDocumentResponse {
    /// Whether every chunk of the document was stored.
    pub success: bool,
}

/// Body of `POST /api/chat`, sent as `{"documentName", "question"}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The uploaded document to answer from.
    pub document_name: String,
    /// The question to answer.
    pub question: String,
}

/// Error body of a failed chat request. `kind` is only set for backend failures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// A client-safe description of the failure.
    pub error: String,
    /// The failure kind, such as `embedding` or `completion`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
