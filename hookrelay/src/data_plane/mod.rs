//! Data-plane layer.
//!
//! Sinks that consume routed deliveries outside the router loop: the fan-out worker
//! behind static routes and the disk log writer.
//!
//! ```
//! use hookrelay::{sink_channel, Delivery, FanOut};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (left, mut left_rx) = sink_channel();
//! let (right, mut right_rx) = sink_channel();
//! let (input, _task) = FanOut::new(vec![left, right]).spawn();
//!
//! input.send(Arc::new(Delivery::new("/secret", "x"))).await.unwrap();
//! assert_eq!(&left_rx.recv().await.unwrap().payload[..], b"x");
//! assert_eq!(&right_rx.recv().await.unwrap().payload[..], b"x");
//! # });
//! ```

pub(crate) mod fan_out;
pub(crate) mod log_writer;
