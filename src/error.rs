// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crate-level error type.

use thiserror::Error as ThisError;

use crate::frame::ExceptionResponse;

/// A specialized [`Result`] type for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of this crate, as opposed to the wire-level
/// [`ExceptionResponse`] a client receives.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A Modbus exception was produced while serving a request.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),

    /// General transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The listener failed to bind.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    /// A seed-API call was given an address outside `0..=65535`.
    #[error("invalid address: {0}")]
    InvalidAddress(u32),

    /// A seed-API call was given a value that doesn't fit the target kind
    /// (e.g. a non-bool value for a coil).
    #[error("invalid value type for this object kind")]
    InvalidValueType,

    /// An encoding tag outside `{h, H, e, f, i, I, d}`.
    #[error("invalid encoding: {0:?}")]
    InvalidEncoding(String),

    /// The external-KV address-map document failed to load or parse.
    #[error("invalid configuration: {0}")]
    Config(String),
}
