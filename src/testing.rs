//! Scripted backend for unit tests.

use crate::error::{ArchitectError, Result};
use crate::image::{to_data_url, UploadedImage};
use crate::provider::{ContentRequest, ContentResponse, GenerativeProvider, Part};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 1];

/// Returns scripted responses in order and records every call.
#[derive(Default)]
pub(crate) struct MockProvider {
    responses: Mutex<VecDeque<Result<ContentResponse>>>,
    calls: Mutex<Vec<(String, ContentRequest)>>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, response: Result<ContentResponse>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn push_text(&self, text: &str) -> &Self {
        self.push(Ok(ContentResponse::from_parts(vec![Part::text(text)])))
    }

    pub(crate) fn push_image(&self, mime: &str, data: &str) -> &Self {
        self.push(Ok(ContentResponse::from_parts(vec![
            Part::text("Here you go"),
            Part::inline(mime, data),
        ])))
    }

    pub(crate) fn calls(&self) -> Vec<(String, ContentRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate_content(
        &self,
        model: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), request.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ArchitectError::UnexpectedResponse("no scripted response".into())))
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn sample_image(id: &str) -> UploadedImage {
    UploadedImage {
        id: id.to_string(),
        data_url: to_data_url("image/png", &PNG_BYTES),
        mime_type: "image/png".to_string(),
    }
}
