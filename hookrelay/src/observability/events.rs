//! Canonical structured event names used across `hookrelay`.

// Router loop and table events.
pub const ROUTER_START: &str = "router_start";
pub const ROUTER_STOP: &str = "router_stop";
pub const ROUTER_COMMANDS_CLOSED: &str = "router_commands_closed";
pub const ROUTE_REGISTER: &str = "route_register";
pub const ROUTE_REPLACE: &str = "route_replace";
pub const ROUTE_UNREGISTER: &str = "route_unregister";
pub const ROUTE_UNREGISTER_MISSING: &str = "route_unregister_missing";
pub const ROUTE_DISPATCH: &str = "route_dispatch";
pub const ROUTE_MISS: &str = "route_miss";
pub const ROUTE_BACKPRESSURE: &str = "route_backpressure";
pub const ROUTE_SINK_CLOSED: &str = "route_sink_closed";

// Fan-out events.
pub const FANOUT_START: &str = "fanout_start";
pub const FANOUT_SINK_CLOSED: &str = "fanout_sink_closed";
pub const FANOUT_STOP: &str = "fanout_stop";

// Static route loader events.
pub const STATIC_ROUTE_INSTALL: &str = "static_route_install";
pub const STATIC_ROUTE_SKIP_MALFORMED: &str = "static_route_skip_malformed";
pub const STATIC_ROUTE_SKIP_EMPTY: &str = "static_route_skip_empty";

// IPC server and connection events.
pub const IPC_BIND: &str = "ipc_bind";
pub const IPC_REMOVE_STALE_SOCKET: &str = "ipc_remove_stale_socket";
pub const IPC_ACCEPT: &str = "ipc_accept";
pub const IPC_ACCEPT_FAILED: &str = "ipc_accept_failed";
pub const IPC_CLOSE: &str = "ipc_close";
pub const IPC_REQUEST_REJECTED: &str = "ipc_request_rejected";
pub const IPC_SUBSCRIPTION_OPEN: &str = "ipc_subscription_open";
pub const IPC_SUBSCRIPTION_CLOSED: &str = "ipc_subscription_closed";
pub const IPC_WRITE_FAILED: &str = "ipc_write_failed";

// Disk log writer events.
pub const LOG_WRITER_OPEN: &str = "log_writer_open";
pub const LOG_WRITER_ROTATE: &str = "log_writer_rotate";
pub const LOG_WRITER_WRITE_FAILED: &str = "log_writer_write_failed";
pub const LOG_WRITER_STOP: &str = "log_writer_stop";
