// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Demonstration that the TCP server properly disconnects clients when
//! `Server::stop` is called, even with several connections in flight.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use modbus_server::datastore::memory::InMemoryDatastore;
use modbus_server::{Datastore, Seed, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_ONE_INPUT_REGISTER_AT_ZERO: [u8; 12] =
    [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01];

async fn read_one(client: &mut TcpStream) -> std::io::Result<[u8; 11]> {
    client.write_all(&READ_ONE_INPUT_REGISTER_AT_ZERO).await?;
    let mut response = [0u8; 11];
    client.read_exact(&mut response).await?;
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    Seed::new(datastore.as_ref())
        .set_input_register(0, 42.0, "H")
        .await?;

    let socket_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut server = Server::bind(socket_addr, datastore).await?;
    let server_addr = server.local_addr();
    println!("Starting server on {server_addr}");

    let client_tasks = (0..3)
        .map(|i| {
            tokio::spawn(async move {
                println!("Client {i} connecting...");
                let mut client = TcpStream::connect(server_addr).await.unwrap();
                for j in 0..5 {
                    match timeout(Duration::from_millis(500), read_one(&mut client)).await {
                        Ok(Ok(response)) => {
                            println!("Client {i} request {j}: got {response:02x?}");
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                        Ok(Err(e)) => {
                            println!("Client {i} request {j}: connection error: {e}");
                            break;
                        }
                        Err(_) => {
                            println!("Client {i} request {j}: timed out (connection likely closed)");
                            break;
                        }
                    }
                }
                println!("Client {i} finished");
            })
        })
        .collect::<Vec<_>>();

    println!("Creating test client for post-shutdown testing...");
    let mut test_client = TcpStream::connect(server_addr).await?;
    println!(
        "Test client initial request: {:02x?}",
        read_one(&mut test_client).await?
    );

    tokio::time::sleep(Duration::from_millis(800)).await;

    println!("Stopping server...");
    server.stop().await;

    println!("Waiting for clients to finish...");
    for (i, task) in client_tasks.into_iter().enumerate() {
        match timeout(Duration::from_secs(1), task).await {
            Ok(_) => println!("Client {i} finished"),
            Err(_) => println!("Client {i} timed out (expected after shutdown)"),
        }
    }

    println!("Testing existing client after shutdown...");
    match timeout(Duration::from_millis(500), read_one(&mut test_client)).await {
        Ok(Ok(response)) => {
            return Err(format!("unexpected success after shutdown: {response:02x?}").into());
        }
        Ok(Err(e)) => println!("connection failed as expected: {e}"),
        Err(_) => println!("request timed out as expected"),
    }

    println!("New connection after shutdown...");
    assert!(TcpStream::connect(server_addr).await.is_err());
    println!("Demo completed: the server rejects new connections and drops old ones after stop().");

    Ok(())
}
