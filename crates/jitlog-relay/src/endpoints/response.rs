//! Minimal HTTP response used as the relay's output sink.

use std::io::{self, Write};

use crate::errors::RelayError;

/// Content type of every endpoint response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Status, content type and body of an endpoint response.
///
/// The body accumulates through [`Write`], so a response can be handed
/// directly to the relay as its sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl HttpResponse {
    /// An empty `200 OK` JSON response.
    #[must_use]
    pub const fn json() -> Self {
        Self {
            status: 200,
            content_type: JSON_CONTENT_TYPE,
            body: Vec::new(),
        }
    }

    /// The JSON `{code, message}` document for `error`.
    #[must_use]
    pub fn from_error(error: &RelayError) -> Self {
        let body = error.to_body();
        Self {
            status: body.code,
            content_type: JSON_CONTENT_TYPE,
            body: body.to_json(),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Content type header value.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Body bytes written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Write for HttpResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
