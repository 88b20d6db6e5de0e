// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Exception, FunctionCode, Request, Response};

pub(crate) type TransactionId = u16;
pub(crate) type UnitId = u8;

/// The 7-byte MBAP header shared by every TCP ADU.
///
/// `protocol_id` is always `0` on the wire and is not kept as a field; the
/// codec rejects anything else before an ADU is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) transaction_id: TransactionId,
    pub(crate) unit_id: UnitId,
}

/// A decoded incoming request, still carrying its MBAP header so the
/// response can echo `transaction_id` and `unit_id` unchanged.
///
/// `outcome` is `Err` when the function code isn't one of the four read
/// codes this server understands; `function` is kept alongside so the
/// transaction handler can build an [`ExceptionResponse`] that echoes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) function: FunctionCode,
    pub(crate) outcome: Result<Request, Exception>,
}

/// Either a normal read response or an exception, paired with the header to
/// send back and the function code to echo (set, `| 0x80`, on exception).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) function: FunctionCode,
    pub(crate) result: Result<Response, Exception>,
}
