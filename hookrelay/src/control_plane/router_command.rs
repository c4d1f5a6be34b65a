//! Commands accepted by the router loop.

use crate::delivery::Sink;
use tokio::sync::oneshot;

/// Buffered depth of the router's command queue.
pub(crate) const COMMAND_QUEUE_CAPACITY: usize = 100;

/// One table mutation or query, applied in order by the router loop.
pub(crate) enum RouterCommand {
    Register { path: String, sink: Sink },
    Unregister { path: String },
    ListRoutes { reply: oneshot::Sender<Vec<String>> },
}

impl RouterCommand {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RouterCommand::Register { .. } => "register",
            RouterCommand::Unregister { .. } => "unregister",
            RouterCommand::ListRoutes { .. } => "list_routes",
        }
    }
}
