use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::MatchRule;
use crate::platform::Update;

/// A responder that services one update.
///
/// Implementations are expected to check `cancel` around their own I/O.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()>;
}

pub type BoxedHandler = Box<dyn Handler>;

/// A handler unit that can be registered with [`Discovery`](super::Discovery).
///
/// `rules` declares which updates route to the unit; `build` creates a fresh
/// instance from the shared services for every dispatch.
pub trait HandlerUnit<S>: Handler + Sized + 'static {
    fn rules() -> Vec<MatchRule>;

    fn build(services: &S) -> Result<Self>;
}
