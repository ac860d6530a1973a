//! The units of work flowing through the system: the [`Request`] a client
//! emits and the sized [`WorkItem`] a server processes.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::topology::{ClientId, ServerId};
use crate::units::{Bytes, Millis};

const REQUEST_ID_LEN: usize = 10;

/// An opaque request identifier. Fresh ids collide with negligible
/// probability.
#[derive(
    Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RequestId(String);

impl RequestId {
    /// Draws a fresh id.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..REQUEST_ID_LEN)
            .map(|_| rng.sample(Alphanumeric) as char)
            .collect();
        Self(id)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client request awaiting routing.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub path: String,
    pub created_at: Millis,
    pub source: ClientId,
}

/// A routed, sized unit of work.
///
/// Lives in a server's backlog, then as its in-flight item, and is
/// destroyed on completion or timeout, whichever the server observes first.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkItem {
    pub id: RequestId,
    pub size: Bytes,
    pub done: Bytes,
    pub created_at: Millis,
    pub timeout_at: Millis,
    pub source: ClientId,
    pub target: ServerId,
}

impl WorkItem {
    /// Builds the item a routed request turns into.
    pub fn from_request(request: &Request, size: Bytes, timeout: Millis, target: ServerId) -> Self {
        Self {
            id: request.id.clone(),
            size,
            done: Bytes::ZERO,
            created_at: request.created_at,
            timeout_at: request.created_at + timeout,
            source: request.source,
            target,
        }
    }

    /// Whether every byte has been processed.
    pub fn is_done(&self) -> bool {
        self.done >= self.size
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: Millis) -> bool {
        self.timeout_at <= now
    }

    /// Bytes still to process.
    pub fn remaining(&self) -> Bytes {
        self.size.saturating_sub(self.done)
    }
}
