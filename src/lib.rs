//! # Telemetry Pipeline Core Library
//!
//! This crate reconstructs physically scaled, correctly timed sample streams
//! from batched, fixed-point-encoded telemetry packets and renders them into
//! one of several external representations. The whole core is the
//! decode → correct → merge → format chain; storage queries and request
//! routing live with external collaborators that hand this crate a list of
//! raw packet mappings and receive rendered records back.
//!
//! ## Crate Structure
//!
//! - **`packet`**: typed field access over raw packet JSON mappings.
//! - **`record`**: the canonical decoded form, `CanonicalRecord`, built from
//!   `TimePoint` sample pairs.
//! - **`decode`**: per-topic decoders (accelerometer, gyroscope, analog
//!   input, spectral snapshots, aggregated summaries) with topic-specific
//!   physical scaling and timestamp reconstruction.
//! - **`correct`**: the timestamp-anomaly corrector: late-packet glitch
//!   repair and optional auto-rate recalibration, both in place.
//! - **`merge`**: UTC hour-bucket folding, including spectral per-axis
//!   recombination.
//! - **`render`**: the multi-shape output renderer (`map`, `tuple_array`,
//!   `dict_array`, and the axis-combined shapes).
//! - **`pipeline`**: one-call orchestration of the full chain.
//! - **`error`**: the `PipelineError` enum shared by every stage.
//!
//! Every stage is a pure function over data owned by the call; the only
//! documented side effect is the corrector's in-place timestamp adjustment.

pub mod correct;
pub mod decode;
pub mod error;
pub mod merge;
pub mod packet;
pub mod pipeline;
pub mod record;
pub mod render;

pub use decode::Topic;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{run, PipelineOptions};
pub use record::{CanonicalRecord, TimePoint};
pub use render::OutputFormat;
