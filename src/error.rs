// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for result retrieval.
//!
//! Every failure is reported at the call that triggered it. Lower layers
//! never retry on their own (the HTTP transport's retry of transient status
//! codes being the one exception), so each variant carries enough context
//! for the caller to decide.

use std::sync::Arc;
use std::time::Duration;

/// Boxed, thread-safe error used for causes coming from collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote call did not complete before its deadline. Retriable.
    #[error("Timed out after {timeout:?} waiting for {operation}")]
    Timeout { operation: String, timeout: Duration },

    /// The remote service completed the call but reported a failure.
    #[error("Query failed: {source}")]
    QueryFailed {
        #[source]
        source: BoxError,
        /// The failure that wrapped `source` when it was observed.
        suppressed: Option<BoxError>,
    },

    /// The object-store producer signalled an error. Terminal for the stream.
    #[error("Stream error: {0}")]
    Stream(Arc<BoxError>),

    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("{0}")]
    OutOfPosition(String),

    #[error("{0}")]
    InvalidColumn(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    NotSupported(String),

    #[error("Cannot convert \"{value}\" to {target}")]
    Conversion { value: String, target: &'static str },

    #[error("Interrupted while {0}")]
    Interrupted(String),

    /// Non-success HTTP status that was not retried (or ran out of retries).
    #[error("HTTP {status} - {body}")]
    Http { status: u16, body: String },

    /// Transport or protocol failure inside a client.
    #[error("Service error: {0}")]
    Service(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }

    pub(crate) fn query_failed(
        source: impl Into<BoxError>,
        suppressed: Option<impl Into<BoxError>>,
    ) -> Self {
        Error::QueryFailed {
            source: source.into(),
            suppressed: suppressed.map(Into::into),
        }
    }

    pub(crate) fn conversion(value: impl Into<String>, target: &'static str) -> Self {
        Error::Conversion {
            value: value.into(),
            target,
        }
    }

    /// The secondary failure recorded alongside a query failure, if any.
    pub fn suppressed(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::QueryFailed { suppressed, .. } => suppressed.as_deref(),
            _ => None,
        }
    }
}

/// Interrupts deliberately map to `ErrorKind::Other`: `std::io` helpers such
/// as `read_to_end` retry `ErrorKind::Interrupted` forever. Downcast the inner
/// error and check `is_interrupted()` instead.
impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Timeout { .. } => std::io::Error::new(std::io::ErrorKind::TimedOut, err),
            other => std::io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_timeout_is_distinct_from_query_failure() {
        let timeout = Error::Timeout {
            operation: "page of query Q1".to_string(),
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_timeout());

        let failed = Error::query_failed(Error::Service("boom".into()), None::<BoxError>);
        assert!(!failed.is_timeout());
    }

    #[test]
    fn test_query_failed_keeps_cause_and_suppressed() {
        let err = Error::query_failed(
            Error::Service("access denied".into()),
            Some(Error::Service("page request failed".into())),
        );

        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Service error: access denied".to_string())
        );
        assert_eq!(
            err.suppressed().map(|s| s.to_string()),
            Some("Service error: page request failed".to_string())
        );
    }

    #[test]
    fn test_io_error_kind_mapping() {
        let io: std::io::Error = Error::Interrupted("reading".into()).into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
        let inner = io.get_ref().and_then(|e| e.downcast_ref::<Error>()).unwrap();
        assert!(inner.is_interrupted());

        let io: std::io::Error = Error::Closed("stream").into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
    }
}
