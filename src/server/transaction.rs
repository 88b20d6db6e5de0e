//! Transaction handling: turns a validated [`Request`] into a [`Response`]
//! or [`Exception`] by consulting a [`Datastore`], independent of any
//! particular transport.
//!
//! Grounded in the Python source's `handle_requests` dispatch: validate the
//! quantity range for the object kind, read from the datastore, and map the
//! two datastore error kinds onto the two remaining exception codes.

use log::{debug, warn};

use crate::datastore::{Datastore, DatastoreError};
use crate::frame::{Exception, Request, Response};

/// Serve one already-parsed, function-code-valid request.
pub(crate) async fn handle(request: Request, datastore: &dyn Datastore) -> Result<Response, Exception> {
    if !request.kind.quantity_in_range(request.quantity) {
        return Err(Exception::IllegalDataValue);
    }

    match datastore
        .read(request.kind, request.address, request.quantity)
        .await
    {
        Ok(response) => {
            debug!(
                "{}:{}+{} -> {} values",
                request.kind,
                request.address,
                request.quantity,
                response_len(&response)
            );
            Ok(response)
        }
        Err(DatastoreError::NotFound) => {
            warn!(
                "{}:{}+{} -> address not found",
                request.kind, request.address, request.quantity
            );
            Err(Exception::IllegalDataAddress)
        }
        Err(DatastoreError::BackendFailure(reason)) => {
            log::error!(
                "{}:{}+{} -> backend failure: {reason}",
                request.kind,
                request.address,
                request.quantity
            );
            Err(Exception::SlaveDeviceFailure)
        }
    }
}

fn response_len(response: &Response) -> usize {
    match response {
        Response::Bits(bits) => bits.len(),
        Response::Words(words) => words.len(),
    }
}
