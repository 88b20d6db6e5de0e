// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::tcp::{Header, RequestAdu, ResponseAdu};

use super::{decode_request_pdu, encode_response_pdu};

const HEADER_LEN: usize = 7;
const PROTOCOL_ID: u16 = 0x0000;

/// Splits the TCP stream into `(Header, pdu bytes)` pairs, without
/// interpreting the PDU itself.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct AduDecoder;

impl Decoder for AduDecoder {
    type Item = (Header, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = usize::from((&buf[4..6]).get_u16());
        let pdu_len = if len > 0 {
            len - 1 // length field counts the unit id byte too
        } else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid data length: {len}"),
            ));
        };
        if buf.len() < HEADER_LEN + pdu_len {
            return Ok(None);
        }

        let header_data = buf.split_to(HEADER_LEN);

        let protocol_id = (&header_data[2..4]).get_u16();
        if protocol_id != PROTOCOL_ID {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid protocol identifier: expected 0, got {protocol_id}"),
            ));
        }

        let transaction_id = (&header_data[0..2]).get_u16();
        let unit_id = header_data[6];

        let header = Header {
            transaction_id,
            unit_id,
        };

        let pdu_data = buf.split_to(pdu_len).freeze();

        Ok(Some((header, pdu_data)))
    }
}

/// Server-side TCP codec: decodes requests, encodes responses/exceptions.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ServerCodec {
    decoder: AduDecoder,
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        let Some((hdr, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let (function, outcome) = decode_request_pdu(pdu_data)?;
        Ok(Some(RequestAdu {
            hdr,
            function,
            outcome,
        }))
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu {
            hdr,
            function,
            result,
        } = adu;
        let pdu_data = encode_response_pdu(function, &result);
        write_adu(hdr, &pdu_data, buf);
        Ok(())
    }
}

fn write_adu(hdr: Header, pdu_data: &[u8], buf: &mut BytesMut) {
    buf.reserve(pdu_data.len() + HEADER_LEN);
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16((pdu_data.len() + 1) as u16);
    buf.put_u8(hdr.unit_id);
    buf.put_slice(pdu_data);
}
