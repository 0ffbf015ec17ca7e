//! Blocking HTTP transport backed by `ureq`.
//!
//! # Design
//! The vendor reports failures inside a 200 response body, and the token
//! refresh page is served as HTML, so status codes are never treated as
//! errors here: every response comes back as data for the classifier.
//! Arguments go out form-encoded, or as a `ureq` multipart form when the call
//! carries files.

use std::time::Duration;

use ureq::unversioned::multipart::{Form, Part};

use crate::encode::EncodedRequest;
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

/// Largest response body read into memory.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Transport whose requests give up after `timeout` in total.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

/// Multipart form over the encoded fields and files. The part content type
/// is parsed as a MIME type, so malformed ones are rejected.
fn multipart_form(body: &EncodedRequest) -> Result<Form<'_>, ureq::Error> {
    let mut form = Form::new();
    for (name, value) in &body.fields {
        form = form.text(name, value);
    }
    for (name, file) in &body.files {
        let part = Part::bytes(&file.data)
            .file_name(&file.filename)
            .mime_str(&file.content_type)?;
        form = form.part(name, part);
    }
    Ok(form)
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = if request.body.has_files() {
            builder.send(multipart_form(&request.body)?)?
        } else {
            builder
                .content_type("application/x-www-form-urlencoded")
                .send(request.body.form_body().as_bytes())?
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()?;

        Ok(HttpResponse { status, headers, body })
    }
}
