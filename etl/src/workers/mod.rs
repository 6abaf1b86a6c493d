//! Background workers driving the pipeline.

pub mod apply;
pub mod base;
