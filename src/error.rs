//! Error types for the nlsq library
//!
//! This module provides the main error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations.
//!
//! # Error Hierarchy
//!
//! The library uses a hierarchical error system where:
//! - **`NlsqError`** is the top-level error exposed to users via public APIs
//! - **Module errors** (`CoreError`, `OptimizerError`, `LinAlgError`) are wrapped inside NlsqError
//! - **Error sources** are preserved, allowing full error chain inspection

use crate::{core::CoreError, linalg::LinAlgError, optimizer::OptimizerError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the nlsq library
pub type NlsqResult<T> = Result<T, NlsqError>;

/// Main error type for the nlsq library
///
/// This is the top-level error type exposed by public APIs. It wraps
/// module-specific errors while preserving the full error chain for
/// debugging.
#[derive(Debug, Error)]
pub enum NlsqError {
    /// Core module errors (problem construction, weighting)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Step-level optimization errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),
}

impl NlsqError {
    /// Get the full error chain as a string for logging and debugging.
    ///
    /// This method traverses the error source chain and returns a formatted
    /// string showing the hierarchy of errors from the top-level NlsqError
    /// down to the root cause.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain for logging
    ///
    /// Similar to `chain()` but formats as a single line with arrow
    /// separators.
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
