use thiserror::Error;

/// Failure of a single call to a remote service.
///
/// Transport failures (no HTTP response at all) are kept apart from status
/// failures so callers can branch on backend semantics, e.g. a `404` on a
/// reading query means "no data" rather than "request malformed".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("HTTP error status: {status}")]
    Status {
        status: u16,
        /// Reason extracted from the response body, when there was one.
        reason: Option<String>,
    },

    /// The response body did not have the expected shape.
    #[error("unrecognised response format: {0}")]
    Format(String),
}

impl RemoteError {
    /// HTTP status for `Status` failures, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend-provided reason, when the failure carried one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            RemoteError::Status { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Failure of a collection → detail aggregation.
///
/// Both variants are batch-level: the aggregation yields no records at all
/// when either occurs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// The collection fetch failed or returned an unrecognised shape.
    #[error("failed to fetch {collection}: {source}")]
    Collection {
        collection: &'static str,
        source: RemoteError,
    },

    /// One member's detail fetch failed.
    #[error("failed to fetch {collection} detail for {id}: {source}")]
    Detail {
        collection: &'static str,
        id: String,
        source: RemoteError,
    },
}

impl AggregateError {
    pub fn remote(&self) -> &RemoteError {
        match self {
            AggregateError::Collection { source, .. } | AggregateError::Detail { source, .. } => {
                source
            }
        }
    }

    /// Status of a failed collection fetch. Detail failures never report one:
    /// their status says nothing about the collection as a whole.
    pub fn collection_status(&self) -> Option<u16> {
        match self {
            AggregateError::Collection { source, .. } => source.status(),
            AggregateError::Detail { .. } => None,
        }
    }
}

/// Rejection of a user action on an actuator control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("unknown actuator {0}")]
    UnknownActuator(String),

    /// The actuator's position has not been fetched yet.
    #[error("actuator {0} has no confirmed position yet")]
    Unsynced(String),

    /// A command for the actuator is in flight.
    #[error("actuator {0} is busy")]
    Busy(String),

    #[error("Device is inactive")]
    DeviceInactive,

    #[error("position {0} is outside 0..=100")]
    OutOfRange(i32),

    /// The command task ended without settling the control.
    #[error("command for actuator {0} was interrupted")]
    Interrupted(String),
}

/// Failure of a reading query. Display strings are the messages shown to
/// the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Both start and end dates are required.")]
    MissingBounds,

    #[error("Please enter a valid date range.")]
    InvalidRange,

    /// The backend refused the range and said why.
    #[error("{0}")]
    RangeRejected(String),

    #[error("An error occurred while fetching readings.")]
    Retrieval(#[source] AggregateError),
}

/// Failure of a form submission or of loading a form's choices, other than
/// field validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("failed to load {what}: {source}")]
    Choices {
        what: &'static str,
        source: RemoteError,
    },

    #[error("submission failed: {0}")]
    Submit(#[source] RemoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accessors() {
        let err = RemoteError::Status {
            status: 422,
            reason: Some("invalid name".to_owned()),
        };
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.reason(), Some("invalid name"));
        assert_eq!(err.to_string(), "HTTP error status: 422");

        let err = RemoteError::Transport("connection refused".to_owned());
        assert_eq!(err.status(), None);
        assert_eq!(err.reason(), None);
    }

    #[test]
    fn detail_failures_have_no_collection_status() {
        let detail = AggregateError::Detail {
            collection: "rooms",
            id: "r1".to_owned(),
            source: RemoteError::Status { status: 404, reason: None },
        };
        assert_eq!(detail.collection_status(), None);
        assert_eq!(detail.remote().status(), Some(404));

        let collection = AggregateError::Collection {
            collection: "readings",
            source: RemoteError::Status { status: 404, reason: None },
        };
        assert_eq!(collection.collection_status(), Some(404));
    }
}
