use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartRejection},
};

use super::errors;

/// Text and file fields of a multipart form, by field name.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub config: Option<String>,
    pub file: Option<Bytes>,
}

impl UploadForm {
    pub fn require_file(&mut self) -> Result<Bytes, axum::response::Response> {
        self.file
            .take()
            .ok_or_else(|| errors::bad_request("missing form field 'file'"))
    }

    pub fn require_config(&mut self) -> Result<String, axum::response::Response> {
        self.config
            .take()
            .ok_or_else(|| errors::bad_request("missing form field 'config'"))
    }
}

/// Reads the `config` and `file` fields; unknown fields are skipped.
pub async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, axum::response::Response> {
    let mut multipart = multipart.map_err(|e| errors::bad_request(e.body_text()))?;
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(errors::error_response(e.status(), e.body_text())),
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("config") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| errors::error_response(e.status(), e.body_text()))?;
                form.config = Some(text);
            }
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| errors::error_response(e.status(), e.body_text()))?;
                form.file = Some(bytes);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring form field");
            }
        }
    }

    Ok(form)
}
