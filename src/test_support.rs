//! Helpers shared by the in-crate tests.

use axum::Router;
use std::net::SocketAddr;

/// Serve `router` on an ephemeral loopback port and return its address.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A loopback address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    listener.local_addr().expect("local addr")
}
