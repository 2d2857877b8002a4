//! # Transport
//!
//! The collaborator that actually delivers an action to the backend.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Sync pass ──► deliver(transport, kind, payload, timeout)               │
//! │                     │                                                   │
//! │                     ├── Ok(())                 → Delivered              │
//! │                     ├── Err(Rejected/Unreach.) → Failed                 │
//! │                     └── no answer in time      → Failed (Timeout)       │
//! │                                                                         │
//! │  The call may suspend; it is the only await point inside a pass that   │
//! │  is not a queue mutation. No ordering assumptions beyond the one       │
//! │  call at a time the engine makes.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The embedding app implements [`Transport`] over HTTP, WebSocket or gRPC.
//! This crate ships no network code.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Delivers one action's effect to the remote system.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Applies the action remotely. `kind` and `payload` are passed through
    /// exactly as they were enqueued.
    async fn apply(&self, kind: &str, payload: &serde_json::Value) -> Result<(), TransportError>;
}

/// Calls the transport, turning an expired deadline into
/// [`TransportError::Timeout`].
pub async fn deliver(
    transport: &dyn Transport,
    kind: &str,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(timeout, transport.apply(kind, payload)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn apply(
            &self,
            kind: &str,
            _payload: &serde_json::Value,
        ) -> Result<(), TransportError> {
            if kind == "reject.me" {
                Err(TransportError::Rejected("HTTP 422".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Hang;

    #[async_trait]
    impl Transport for Hang {
        async fn apply(
            &self,
            _kind: &str,
            _payload: &serde_json::Value,
        ) -> Result<(), TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_deliver_passes_result_through() {
        let timeout = Duration::from_secs(1);
        assert!(deliver(&Echo, "product.update", &json!({}), timeout).await.is_ok());
        assert_eq!(
            deliver(&Echo, "reject.me", &json!({}), timeout).await,
            Err(TransportError::Rejected("HTTP 422".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_times_out() {
        let timeout = Duration::from_secs(30);
        let result = deliver(&Hang, "product.update", &json!({}), timeout).await;
        assert_eq!(result, Err(TransportError::Timeout(timeout)));
    }
}
