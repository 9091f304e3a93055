//! Pipeline assembly and dispatch.
//!
//! This module provides:
//! - [`Pipeline`]: an immutable list of policy factories plus shared options
//! - [`new_pipeline`]: the canonical deserialization, signer, retry, logging
//!   and transport order
//! - [`PipelineBuilder`] for custom chains

mod builder;
mod defaults;
mod dispatch;

pub use builder::PipelineBuilder;
pub use defaults::{new_pipeline, NewPipelineOptions};
pub use dispatch::{Pipeline, PipelineOptions};
