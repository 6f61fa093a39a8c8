//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

use crate::domain::lifecycle::RunPhase;

// ── Staging errors ────────────────────────────────────────────────────────────

/// Errors raised while copying a template into its working directory.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Template source '{path}' is not readable: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("Cannot create working directory under '{path}': {reason}")]
    WorkdirCreate { path: String, reason: String },

    #[error("Cannot copy '{from}' to '{to}': {reason}")]
    Copy {
        from: String,
        to: String,
        reason: String,
    },
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Errors raised by the provisioning tool. Diagnostics are carried verbatim.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("terraform {step} failed (exit code {code}):\n{diagnostics}")]
    CommandFailed {
        step: String,
        code: i32,
        diagnostics: String,
    },

    #[error("terraform {step} failed after {attempts} attempts; last error ({reason}):\n{diagnostics}")]
    RetriesExhausted {
        step: String,
        attempts: u32,
        reason: String,
        diagnostics: String,
    },

    #[error("Second apply is not a no-op; terraform plan reports pending changes:\n{plan}")]
    NotIdempotent { plan: String },

    #[error("Cannot parse terraform outputs: {0}")]
    OutputParse(String),
}

/// Declared output missing from a provisioned environment.
#[derive(Debug, Error)]
#[error("Output '{key}' is not declared by the template (available: {available})")]
pub struct OutputNotFound {
    pub key: String,
    pub available: String,
}

// ── Live query errors ─────────────────────────────────────────────────────────

/// Errors raised while reading a resource from the management API.
#[derive(Debug, Error)]
pub enum LiveQueryError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Not authorized to read {resource} (HTTP {status}). Check ARM_* credentials.")]
    Authorization { resource: String, status: u16 },

    #[error("Management API returned HTTP {status} for {resource}:\n{body}")]
    Api {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("Cannot obtain an access token: {0}")]
    Credentials(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to harness configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No subscription configured. Set ARM_SUBSCRIPTION_ID or resource.subscription.")]
    MissingSubscription,

    #[error("resource.{0} must not be empty")]
    EmptyCoordinate(&'static str),

    #[error("Invalid config:\n{0}")]
    Invalid(String),
}

// ── Lifecycle errors ──────────────────────────────────────────────────────────

/// Illegal run-phase transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot move from {from} to {to}")]
pub struct LifecycleError {
    pub from: RunPhase,
    pub to: RunPhase,
}

// ── Interruption ──────────────────────────────────────────────────────────────

/// Why a run stopped before its verification finished.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("verification timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("verification cancelled")]
    Cancelled,
}
