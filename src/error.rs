//! Custom error types for the pipeline.
//!
//! This module defines the primary error type, `PipelineError`, for the whole
//! crate. Using the `thiserror` crate, it gives callers a single enum to match
//! on, with decode failures kept distinct from "empty result": a batch that
//! decodes to nothing is `Ok(vec![])`, while a malformed packet aborts the
//! batch with one of the variants below.

use thiserror::Error;

/// Convenience alias for results using the pipeline error type.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised while decoding or running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A packet does not carry a field the topic requires.
    #[error("packet is missing required field '{0}'")]
    MissingField(String),

    /// A packet field is present but cannot be read as the expected type.
    #[error("packet field '{field}' is malformed: {reason}")]
    MalformedField {
        /// Name of the offending field.
        field: String,
        /// Why the field could not be decoded.
        reason: String,
    },

    /// A packet is not a JSON object.
    #[error("packet is not a JSON object")]
    PacketNotObject,

    /// The requested topic identifier is not one of the known topics.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The requested output format selector is not recognised.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
}
