//! Subscription IPC layer.
//!
//! A local process connects to the Unix socket, sends one `register` request and
//! receives a fresh unguessable path. Every delivery routed to that path is streamed
//! back as a `webhook` frame until either side hangs up, at which point the route is
//! unregistered.
//!
//! Frames are single-line JSON objects tagged by `type`; see [`Request`] and
//! [`Response`].

pub(crate) mod client;
pub(crate) mod connection;
pub(crate) mod path_token;
pub(crate) mod protocol;
pub(crate) mod server;

pub use client::{ClientError, Registration, SubscriptionClient};
pub use path_token::{generate_subscription_path, is_subscription_path};
pub use protocol::{
    decode_frame, decode_request, encode_frame, ProtocolError, Request, Response,
    MAX_REQUEST_LINE_BYTES,
};
pub use server::{BindError, IpcServer, ServeError, DEFAULT_SOCKET_PATH};
