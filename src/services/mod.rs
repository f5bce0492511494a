//! Service implementations for the Moonshot API.
//!
//! `FilesService` covers upload and extraction polling, `ChatService` the
//! completion call. Both are stateless apart from their shared handles.

mod chat;
mod files;

pub use chat::ChatService;
pub use files::{extract_text, ContentExtractor, FilesService};

use crate::errors::{classify_status, ClientResult};
use crate::transport::HttpResponse;

/// Turns a non-2xx response into a classified error.
pub(crate) fn ensure_success(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(classify_status(response.status, &response.body))
    }
}
