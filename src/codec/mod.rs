// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PDU-level encode/decode, shared by every transport-specific codec.

pub mod tcp;

use std::io::{Error, ErrorKind, Result};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::encoding::pack_bits;
use crate::frame::{Address, Exception, FunctionCode, ObjectKind, Quantity, Request, Response};

/// Parse a request PDU (function code + body).
///
/// Returns the function code alongside the parsed outcome: `Ok(Request)` for
/// one of the four recognized read codes, `Err(Exception::IllegalFunction)`
/// for anything else. A frame too short to hold a full request body is a
/// transport-level error, not a protocol exception - the connection is
/// dropped rather than answered.
pub(crate) fn decode_request_pdu(bytes: Bytes) -> Result<(FunctionCode, Result<Request, Exception>)> {
    if bytes.is_empty() {
        return Err(Error::new(ErrorKind::InvalidData, "empty PDU"));
    }
    let function = bytes[0];
    let Some(kind) = ObjectKind::from_function_code(function) else {
        return Ok((function, Err(Exception::IllegalFunction)));
    };
    let mut body = bytes.slice(1..);
    if body.len() < 4 {
        return Err(Error::new(ErrorKind::InvalidData, "truncated request PDU"));
    }
    let address: Address = body.get_u16();
    let quantity: Quantity = body.get_u16();
    Ok((function, Ok(Request { kind, address, quantity })))
}

/// Serialize a response or exception into its PDU bytes, prefixed with
/// `function` - the read function code the request carried, echoed back on
/// success, or turned into `function | 0x80` on exception.
pub(crate) fn encode_response_pdu(function: FunctionCode, result: &Result<Response, Exception>) -> Bytes {
    match result {
        Ok(Response::Bits(bits)) => {
            let packed = pack_bits(bits);
            let mut data = BytesMut::with_capacity(2 + packed.len());
            data.put_u8(function);
            data.put_u8(packed.len() as u8);
            data.put_slice(&packed);
            data.freeze()
        }
        Ok(Response::Words(words)) => {
            let mut data = BytesMut::with_capacity(2 + words.len() * 2);
            data.put_u8(function);
            data.put_u8((words.len() * 2) as u8);
            for word in words {
                data.put_slice(word);
            }
            data.freeze()
        }
        Err(exception) => {
            debug_assert!(function < 0x80);
            let mut data = BytesMut::with_capacity(2);
            data.put_u8(function + 0x80);
            data.put_u8(exception.code());
            data.freeze()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ObjectKind;

    #[test]
    fn decodes_read_coils_request() {
        let bytes = Bytes::from_static(&[0x01, 0x00, 0x0A, 0x00, 0x02]);
        let (function, outcome) = decode_request_pdu(bytes).unwrap();
        assert_eq!(function, 0x01);
        assert_eq!(
            outcome.unwrap(),
            Request {
                kind: ObjectKind::Coils,
                address: 10,
                quantity: 2
            }
        );
    }

    #[test]
    fn rejects_write_function_codes_as_illegal_function() {
        let bytes = Bytes::from_static(&[0x05, 0x00, 0x00, 0xFF, 0x00]);
        let (function, outcome) = decode_request_pdu(bytes).unwrap();
        assert_eq!(function, 0x05);
        assert_eq!(outcome.unwrap_err(), Exception::IllegalFunction);
    }

    #[test]
    fn truncated_pdu_is_transport_error() {
        let bytes = Bytes::from_static(&[0x03, 0x00]);
        assert!(decode_request_pdu(bytes).is_err());
    }

    #[test]
    fn encodes_exception_response() {
        let result: Result<Response, Exception> = Err(Exception::IllegalDataAddress);
        let bytes = encode_response_pdu(0x03, &result);
        assert_eq!(&bytes[..], &[0x83, 0x02]);
    }

    #[test]
    fn encodes_bits_response() {
        let result = Ok(Response::Bits(vec![true, false, true]));
        let bytes = encode_response_pdu(0x01, &result);
        assert_eq!(&bytes[..], &[0x01, 0x01, 0b101]);
    }

    #[test]
    fn encodes_words_response() {
        let result = Ok(Response::Words(vec![[0x00, 0x0D], [0x00, 0x0E]]));
        let bytes = encode_response_pdu(0x04, &result);
        assert_eq!(&bytes[..], &[0x04, 0x04, 0x00, 0x0D, 0x00, 0x0E]);
    }
}
