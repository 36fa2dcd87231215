//! Control messages accepted by the worker.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Inbound control message, tagged by `type`.
///
/// ```
/// use dealer_portal::worker::ControlMessage;
///
/// let msg: ControlMessage = serde_json::from_str(r#"{"type":"GET_VERSION"}"#).unwrap();
/// assert_eq!(msg, ControlMessage::GetVersion);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Become active now instead of waiting for open clients to close.
    SkipWaiting,
    /// Reply with the current store version over the reply port.
    GetVersion,
}

/// Reply to [`ControlMessage::GetVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    /// Name of the worker's cache store.
    pub version: String,
}

/// One-shot channel a message sender listens on for the reply.
pub type ReplyPort = oneshot::Sender<VersionReply>;

/// Creates a reply port and the receiver for its answer.
#[must_use]
pub fn reply_port() -> (ReplyPort, oneshot::Receiver<VersionReply>) {
    oneshot::channel()
}
