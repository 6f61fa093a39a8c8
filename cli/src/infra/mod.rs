//! Infrastructure layer: adapters behind the application ports.
//!
//! This module contains all I/O-performing code: process execution, template
//! staging, the terraform CLI, and the Azure Resource Manager client.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod arm;
pub mod command_runner;
pub mod config;
pub mod credentials;
pub mod stager;
pub mod terraform;
