use crate::error::Result;
use crate::extract::ItemId;
use async_trait::async_trait;

/// A source of candidate item URLs for a query.
///
/// Each call to `pass` is one discovery pass: the implementation renders the
/// remote page with `pass_no` scroll passes applied and returns every
/// candidate href currently visible. Passes are cumulative on the remote side
/// (pass 3 sees everything pass 2 saw plus whatever lazy loading added), so
/// callers dedup across passes. The halting policy - how many passes, when to
/// give up on a stagnant page - belongs to the frontier controller, not here.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Candidate URLs visible for `query` after `pass_no` scroll passes.
    async fn pass(&self, query: &str, pass_no: usize) -> Result<Vec<String>>;

    /// Candidate URLs related to one already-discovered item. Sources without
    /// a related tier return nothing.
    async fn related_pass(&self, _id: &ItemId, _pass_no: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
