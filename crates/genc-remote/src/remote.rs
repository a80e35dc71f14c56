//! The encrypted remote behind the protocol loop

use anyhow::{Context, Result};
use async_trait::async_trait;
use genc_core::{PushOutcome, RefPair, RefUpdate};
use genc_crypto::Keys;
use genc_sync::engine::{fetch, push, SyncContext};
use genc_sync::refs;
use tracing::{debug, warn};

use crate::protocol::RemoteHandler;

pub struct EncryptedRemote<'a> {
    pub ctx: SyncContext<'a>,
    pub keys: Keys,
}

#[async_trait]
impl RemoteHandler for EncryptedRemote<'_> {
    async fn list(&mut self, for_push: bool) -> Result<Vec<RefPair>> {
        // Push pulls on its own; a plain list should see the latest refs
        if !for_push {
            if let Err(e) = self.ctx.transport.pull(&self.ctx.staging_dir).await {
                if self.ctx.options.throw_on_error {
                    return Err(e).context("pulling encrypted repo");
                }
                warn!(error = %e, "pull before list failed, listing cached refs");
            }
        }
        let pairs = refs::list_all(&self.ctx.op, &self.keys)
            .await
            .context("listing encrypted refs")?;
        debug!(count = pairs.len(), for_push, "listed refs");
        Ok(pairs)
    }

    async fn fetch(&mut self) -> Result<()> {
        fetch(&self.ctx, &self.keys)
            .await
            .context("fetching encrypted remote")?;
        Ok(())
    }

    async fn push(&mut self, updates: Vec<RefUpdate>) -> Result<Vec<PushOutcome>> {
        let refs: Vec<&str> = updates.iter().map(|u| u.dst.as_str()).collect();
        match push(&self.ctx, &self.keys, &updates).await {
            Ok(outcomes) => Ok(outcomes),
            Err(e) => {
                debug!(?refs, error = %e, "push failed");
                Err(e).context("pushing to encrypted remote")
            }
        }
    }
}
