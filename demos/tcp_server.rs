// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal server demo: seed a few values into the in-memory datastore,
//! serve them, and read one back with a bare `TcpStream` (this crate ships
//! no client - any Modbus master can play that role).

use std::sync::Arc;
use std::time::Duration;

use modbus_server::datastore::memory::InMemoryDatastore;
use modbus_server::{Datastore, Seed, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
    let values = [0.0, 0.0, 0x77 as f64, 0.0, 0.0, 0.0, 0.0];
    Seed::new(datastore.as_ref())
        .set_input_registers(0, &values, "H")
        .await?;

    let socket_addr = "127.0.0.1:5502".parse()?;
    println!("Starting up server...");
    let mut server = Server::bind(socket_addr, Arc::clone(&datastore)).await?;
    let addr = server.local_addr();
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("Connecting client...");
    let mut client = TcpStream::connect(addr).await?;
    println!("Reading input registers...");
    // transaction 1, unit 0, read input registers (fc 4) at address 0, count 7
    client
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x04, 0x00, 0x00, 0x00, 0x07])
        .await?;
    let mut response = vec![0u8; 9 + values.len() * 2];
    client.read_exact(&mut response).await?;
    println!("The result is {response:02x?}");

    server.stop().await;
    Ok(())
}
