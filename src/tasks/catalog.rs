use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, TrendingSource};
use crate::config::CatalogConfig;
use crate::events::CatalogCommand;

/// Serves catalog commands. Fetches run concurrently; whichever finishes
/// last wins. Exits on cancellation, or once the command channel closes and
/// outstanding fetches have landed.
pub async fn run<S: TrendingSource>(
    mut commands: Receiver<CatalogCommand>,
    store: Arc<CatalogStore>,
    source: Arc<S>,
    cfg: CatalogConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut fetches: JoinSet<()> = JoinSet::new();
    if cfg.offline {
        info!("catalog offline; explore field uses placeholder entities");
    }

    let mut commands_open = true;

    loop {
        if !commands_open && fetches.is_empty() {
            debug!("catalog command channel closed; catalog idle");
            break;
        }
        select! {
            _ = cancel.cancelled() => break,

            cmd = commands.recv(), if commands_open => {
                let Some(cmd) = cmd else {
                    commands_open = false;
                    continue;
                };
                debug!(?cmd, "catalog_command");
                if let CatalogCommand::SetMediaKind(kind) = cmd
                    && !store.set_media_kind(kind)
                {
                    continue;
                }
                if cfg.offline {
                    continue;
                }
                let store = store.clone();
                let source = source.clone();
                let (pages, per_page) = (cfg.pages, cfg.per_page);
                fetches.spawn(async move {
                    store.fetch_trending(source.as_ref(), pages, per_page).await;
                });
            }

            Some(join_res) = fetches.join_next() => {
                if let Err(err) = join_res {
                    warn!(error = %err, "catalog fetch task failed");
                }
            }
        }
    }
    Ok(())
}
