use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// A strategy that turns an input into a structured answer, or fails.
#[async_trait]
pub trait Resolver: Send + Sync {
    type Input: Sync;
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn resolve(&self, input: &Self::Input) -> anyhow::Result<Self::Output>;
}

/// Tries an optional primary resolver under a timeout and falls back to a
/// deterministic rule function on any error or timeout. Never fails and
/// never retries.
pub struct ResolverChain<I, O> {
    primary: Option<Arc<dyn Resolver<Input = I, Output = O>>>,
    fallback: fn(&I) -> O,
    timeout: Duration,
}

impl<I: Sync, O: Send> ResolverChain<I, O> {
    pub fn new(
        primary: Option<Arc<dyn Resolver<Input = I, Output = O>>>,
        fallback: fn(&I) -> O,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    pub fn rules_only(fallback: fn(&I) -> O) -> Self {
        Self::new(None, fallback, Duration::ZERO)
    }

    pub async fn resolve(&self, input: &I) -> O {
        if let Some(primary) = &self.primary {
            match tokio::time::timeout(self.timeout, primary.resolve(input)).await {
                Ok(Ok(output)) => return output,
                Ok(Err(e)) => {
                    tracing::warn!(resolver = primary.name(), error = %e, "resolver failed, using rules");
                }
                Err(_) => {
                    tracing::warn!(
                        resolver = primary.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "resolver timed out, using rules"
                    );
                }
            }
        }
        (self.fallback)(input)
    }
}
