//! TCP accept loop.
//!
//! Grounded on `bin/irc_server.rs`'s accept loop, adapted to construct a
//! [`client`] endpoint per connection against a shared hub sender instead of
//! handling the request inline. Multiple listeners may be spawned against
//! the same `HubSender`, all feeding the same hub task.

use log::{error, info};
use tokio::net::TcpListener;

use crate::client;
use crate::hub::HubSender;

/// Binds `addr` and accepts connections until the process exits. Transient
/// accept errors are logged and never stop the loop.
pub async fn run(addr: &str, hub: HubSender, max_line_length: usize) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let hub = hub.clone();
                tokio::spawn(async move { client::run(socket, peer, hub, max_line_length).await });
            }
            Err(err) => error!("accept error on {addr}: {err}"),
        }
    }
}
