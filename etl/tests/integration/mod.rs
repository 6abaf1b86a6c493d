#![cfg(feature = "test-utils")]

mod checkpoint_test;
mod pipeline_test;
