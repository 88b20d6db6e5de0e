// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Black-box protocol conformance tests: bind a real server, drive it with a
//! bare `TcpStream`, and compare raw frame bytes against the end-to-end
//! scenarios this server's wire protocol is specified against. There is no
//! Modbus client in this crate to round-trip through, so requests are
//! assembled by hand, the same way the Python source's test suite drives a
//! real client against a real socket.

use std::sync::Arc;

use modbus_server::datastore::memory::InMemoryDatastore;
use modbus_server::{Datastore, ObjectKind, Seed, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_server(datastore: Arc<dyn Datastore>) -> (Server, TcpStream) {
    let server = Server::bind("127.0.0.1:0".parse().unwrap(), datastore)
        .await
        .unwrap();
    let client = TcpStream::connect(server.local_addr()).await.unwrap();
    (server, client)
}

async fn roundtrip(client: &mut TcpStream, request: &[u8], expected_len: usize) -> Vec<u8> {
    client.write_all(request).await.unwrap();
    let mut response = vec![0u8; expected_len];
    client.read_exact(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn scenario_read_two_coils() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let seed = Seed::new(datastore.as_ref());
    seed.set_coil(0, true).await.unwrap();
    seed.set_coil(1, false).await.unwrap();

    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02],
        10,
    )
    .await;
    assert_eq!(
        response,
        [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01, 0x01, 0x01]
    );
    server.stop().await;
}

#[tokio::test]
async fn scenario_read_one_input_register() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    Seed::new(datastore.as_ref())
        .set_input_register(1, 19.0, "h")
        .await
        .unwrap();

    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x00, 0x04, 0x00, 0x01, 0x00, 0x01],
        11,
    )
    .await;
    assert_eq!(
        response,
        [0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x04, 0x02, 0x00, 0x13]
    );
    server.stop().await;
}

#[tokio::test]
async fn scenario_read_two_hundred_coils() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    Seed::new(datastore.as_ref())
        .set_coils(10000, &[true; 200])
        .await
        .unwrap();

    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x27, 0x10, 0x00, 0xC8],
        9 + 25,
    )
    .await;
    assert_eq!(u16::from_be_bytes([response[4], response[5]]), 28);
    assert_eq!(response[8], 25);
    assert!(response[9..9 + 24].iter().all(|&b| b == 0xFF));
    assert_eq!(response[9 + 24], 0xFF);
    server.stop().await;
}

#[tokio::test]
async fn scenario_zero_quantity_is_illegal_data_value() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x04, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
        9,
    )
    .await;
    assert_eq!(
        response,
        [0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x00, 0x81, 0x03]
    );
    server.stop().await;
}

#[tokio::test]
async fn scenario_unsupported_function_code_is_illegal_function() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01],
        9,
    )
    .await;
    assert_eq!(
        response,
        [0x00, 0x05, 0x00, 0x00, 0x00, 0x03, 0x00, 0x85, 0x01]
    );
    server.stop().await;
}

#[tokio::test]
async fn scenario_unmapped_address_is_illegal_data_address() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let (mut server, mut client) = start_server(datastore).await;
    let response = roundtrip(
        &mut client,
        &[0x00, 0x06, 0x00, 0x00, 0x00, 0x06, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01],
        9,
    )
    .await;
    assert_eq!(
        response,
        [0x00, 0x06, 0x00, 0x00, 0x00, 0x03, 0x00, 0x83, 0x02]
    );
    server.stop().await;
}

#[tokio::test]
async fn distinct_connections_do_not_interleave_responses() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    Seed::new(datastore.as_ref())
        .set_holding_register(0, 7.0, "H")
        .await
        .unwrap();

    let mut server = Server::bind("127.0.0.1:0".parse().unwrap(), datastore)
        .await
        .unwrap();
    let addr = server.local_addr();

    let request = [0x00, 0x09, 0x00, 0x00, 0x00, 0x06, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01];
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    for client in &mut clients {
        let response = roundtrip(client, &request, 11).await;
        assert_eq!(
            response,
            [0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x00, 0x03, 0x02, 0x00, 0x07]
        );
    }
    server.stop().await;
}

#[tokio::test]
async fn two_requests_on_one_connection_are_served_in_order() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let seed = Seed::new(datastore.as_ref());
    seed.set_coil(0, true).await.unwrap();
    seed.set_holding_register(0, 5.0, "H").await.unwrap();

    let (mut server, mut client) = start_server(datastore).await;

    let first = roundtrip(
        &mut client,
        &[0x00, 0x0A, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01],
        10,
    )
    .await;
    assert_eq!(first[0..2], [0x00, 0x0A]);
    assert_eq!(first[9], 0x01);

    let second = roundtrip(
        &mut client,
        &[0x00, 0x0B, 0x00, 0x00, 0x00, 0x06, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01],
        11,
    )
    .await;
    assert_eq!(second[0..2], [0x00, 0x0B]);
    assert_eq!(&second[9..11], &[0x00, 0x05]);

    server.stop().await;
}

#[tokio::test]
async fn seeding_a_kind_never_written_still_reports_not_found() {
    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    Seed::new(datastore.as_ref())
        .set_coil(0, true)
        .await
        .unwrap();
    assert!(datastore
        .read(ObjectKind::DiscreteInputs, 0, 1)
        .await
        .is_err());
}
