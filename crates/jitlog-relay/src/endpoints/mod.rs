//! Framework-agnostic read endpoints for uploaded JIT logs.
//!
//! Each endpoint loads the record for a profile checksum, validates its
//! parameters, and only then relays the matching cache command into a JSON
//! response. Failures are translated into `{"code", "message"}` documents
//! carrying the error's status code.

mod query;
mod records;
mod response;

use std::sync::Arc;

use tracing::{error, warn};

use crate::command::Command;
use crate::errors::RelayError;
use crate::relay::Relay;

#[cfg(test)]
pub(crate) use records::MockRecordStore;
pub use query::{Query, require_uid};
pub use records::{JitlogRecord, RecordStore, StoreError, load_record};
pub use response::{HttpResponse, JSON_CONTENT_TYPE};

const ENDPOINT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::endpoints");

/// The `meta`, `trace` and `stitch` read endpoints.
#[derive(Clone)]
pub struct Endpoints {
    store: Arc<dyn RecordStore>,
    relay: Relay,
}

impl Endpoints {
    /// Wires the endpoints to a record store and a relay.
    pub fn new(store: Arc<dyn RecordStore>, relay: Relay) -> Self {
        Self { store, relay }
    }

    /// Log metadata for `profile`.
    #[must_use]
    pub fn meta(&self, profile: &str) -> HttpResponse {
        self.respond(|| {
            let record = load_record(self.store.as_ref(), profile)?;
            Ok(Command::Meta {
                filename: record.file_path,
                profile: profile.to_owned(),
            })
        })
    }

    /// The trace named by the `id` query parameter.
    #[must_use]
    pub fn trace(&self, profile: &str, query: &Query) -> HttpResponse {
        self.respond(|| {
            let record = load_record(self.store.as_ref(), profile)?;
            let uid = require_uid(query)?;
            Ok(Command::Trace {
                filename: record.file_path,
                profile: profile.to_owned(),
                uid,
            })
        })
    }

    /// The stitches of the trace named by the `id` query parameter.
    #[must_use]
    pub fn stitch(&self, profile: &str, query: &Query) -> HttpResponse {
        self.respond(|| {
            let record = load_record(self.store.as_ref(), profile)?;
            let uid = require_uid(query)?;
            Ok(Command::Stitch {
                filename: record.file_path,
                profile: profile.to_owned(),
                uid,
            })
        })
    }

    fn respond<F>(&self, prepare: F) -> HttpResponse
    where
        F: FnOnce() -> Result<Command, RelayError>,
    {
        let mut response = HttpResponse::json();
        let result =
            prepare().and_then(|command| self.relay.relay_command(&mut response, &command));
        match result {
            Ok(_) => response,
            Err(error) if error.is_transport() => {
                error!(
                    target: ENDPOINT_TARGET,
                    error = %error,
                    "cache transport failed"
                );
                HttpResponse::from_error(&error)
            }
            Err(error) => {
                warn!(
                    target: ENDPOINT_TARGET,
                    status = error.status_code(),
                    error = %error,
                    "read endpoint failed"
                );
                HttpResponse::from_error(&error)
            }
        }
    }
}

impl std::fmt::Debug for Endpoints {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Endpoints")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}
