#![deny(unused)]
//! Shared domain types, error taxonomy and configuration for the judging core.
//!
//! This crate has no knowledge of Docker, AMQP or MySQL — it is the
//! vocabulary every other judging-core crate talks in.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use types::{Problem, ResultMessage, SubmissionTask, TestCase, Verdict};
