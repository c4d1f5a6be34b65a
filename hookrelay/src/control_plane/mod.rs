//! Control-plane layer.
//!
//! Owns the path-to-sink table and the commands that mutate it. Nothing outside the
//! router loop touches the table; every caller goes through [`RouterCommand`] on the
//! router's command queue, so registration and lookup are serialized without a lock.
//!
//! ```
//! use hookrelay::{sink_channel, ingestion_channel, Delivery, Router};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (ingress, ingress_rx) = ingestion_channel();
//! let (router, handle) = Router::new(ingress_rx);
//! let router_task = tokio::spawn(router.run());
//!
//! let (sink, mut deliveries) = sink_channel();
//! handle.register("/hooks", sink).await.unwrap();
//! assert_eq!(handle.routes().await.unwrap(), vec!["/hooks".to_string()]);
//!
//! ingress.send(Delivery::new("/hooks", "hello")).await.unwrap();
//! assert_eq!(&deliveries.recv().await.unwrap().payload[..], b"hello");
//!
//! // Unregistering closes the sink.
//! handle.unregister("/hooks").await.unwrap();
//! assert!(deliveries.recv().await.is_none());
//!
//! drop(ingress);
//! router_task.await.unwrap();
//! # });
//! ```
//!
//! [`RouterCommand`]: router_command::RouterCommand

pub(crate) mod route_table;
pub(crate) mod router_command;
