#![allow(dead_code)]

use hookrelay::ipc::{decode_frame, Response};
use integration_test_utils::LineClient;
use std::path::Path;

pub(crate) const REGISTER_LINE: &[u8] = b"{\"type\":\"register\"}\n";

/// Connects, registers and returns the client with its assigned path and url.
pub(crate) async fn register_client(socket_path: &Path) -> (LineClient, String, Option<String>) {
    let mut client = LineClient::connect(socket_path).await;
    client.send_raw(REGISTER_LINE).await;

    let line = client.read_line().await.expect("registered frame");
    match decode_frame::<Response>(line.as_bytes()).expect("registered frame parses") {
        Response::Registered { path, url } => (client, path, url),
        other => panic!("expected registered frame, got {other:?}"),
    }
}

pub(crate) async fn expect_webhook(client: &mut LineClient) -> String {
    let line = client.read_line().await.expect("webhook frame");
    match decode_frame::<Response>(line.as_bytes()).expect("webhook frame parses") {
        Response::Webhook { data } => data,
        other => panic!("expected webhook frame, got {other:?}"),
    }
}
