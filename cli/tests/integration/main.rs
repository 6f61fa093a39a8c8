//! Integration tests for the tfprobe CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! The live Azure test is `#[ignore]`d; run it with `--ignored` and
//! credentials in the environment.
