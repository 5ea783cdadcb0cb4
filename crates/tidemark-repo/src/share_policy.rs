//! Share-policy callables.

use futures::future::BoxFuture;
use std::sync::Arc;
use tidemark_types::{DocumentId, PeerId};

/// Decides whether a document (or, with `None`, any document) may be offered
/// to a peer.
///
/// The policy is consulted before announcing documents to a newly connected
/// peer, before announcing a new document to connected peers, and before
/// beginning sync with peers that contacted us about a document first.
/// Policies may suspend (consult a directory, a capability store); each
/// document's sync state transitions stay serialized regardless.
pub type SharePolicy =
    Arc<dyn Fn(PeerId, Option<DocumentId>) -> BoxFuture<'static, bool> + Send + Sync>;

/// The default policy: offer every document to every peer.
///
/// Servers that only serve documents on request typically replace this with
/// a policy returning `false`, relying on inbound requests instead.
pub fn share_generously() -> SharePolicy {
    Arc::new(|_, _| Box::pin(async { true }))
}

/// Lift a synchronous predicate into a [`SharePolicy`].
pub fn share_policy_fn<F>(f: F) -> SharePolicy
where
    F: Fn(&PeerId, Option<&DocumentId>) -> bool + Send + Sync + 'static,
{
    Arc::new(move |peer, document| {
        let allow = f(&peer, document.as_ref());
        Box::pin(async move { allow })
    })
}
