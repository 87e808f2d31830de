//! Access negotiation seam.
//!
//! Getting a dialable, token-bearing client URL is an upstream capability
//! (service SDK, relay endpoint, or a baked-in connection string); the
//! session only cares that it ends up with a URL.

use async_trait::async_trait;

use lumicast_core::Result;

/// Result of a negotiation: a URL ready to open, access token embedded.
#[derive(Debug, Clone)]
pub struct NegotiatedAccess {
    pub url: String,
}

/// Upstream access-URL provisioning capability.
#[async_trait]
pub trait Negotiate: Send + Sync {
    /// Produce a client access URL for `user_id` scoped to `group`.
    async fn negotiate(&self, user_id: &str, group: &str) -> Result<NegotiatedAccess>;
}

/// Role strings a token must carry for a session on `group` to work.
pub fn group_roles(group: &str) -> [String; 2] {
    [
        format!("webpubsub.joinLeaveGroup.{group}"),
        format!("webpubsub.sendToGroup.{group}"),
    ]
}

/// Negotiator that hands back a preconfigured URL unchanged. Used when the
/// endpoint already embeds credentials (dev setups, tests, local brokers).
#[derive(Debug, Clone)]
pub struct StaticNegotiate {
    url: String,
}

impl StaticNegotiate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Negotiate for StaticNegotiate {
    async fn negotiate(&self, _user_id: &str, _group: &str) -> Result<NegotiatedAccess> {
        Ok(NegotiatedAccess {
            url: self.url.clone(),
        })
    }
}
