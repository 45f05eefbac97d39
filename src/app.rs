use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::{
    capture::{CaptureLoop, CaptureSummary},
    config::{DispatchConfig, GroupTarget},
    dispatch::{load_url_list, DispatchLoop, DispatchReport},
    domain::{EventFilter, GroupQuery},
    infrastructure::shutdown::Shutdown,
    platform::ChatPlatform,
    resolver::resolve_group,
};

/// Capture workflow: resolve the group, subscribe, persist media until
/// shutdown or until the platform closes the stream.
/// Returns `None` when the group could not be resolved.
pub async fn run_capture(
    platform: Arc<dyn ChatPlatform>,
    group: &GroupTarget,
    sender_username: &str,
    downloads_dir: PathBuf,
    shutdown: Shutdown,
) -> Result<Option<CaptureSummary>> {
    let query = GroupQuery::by_name(group.name.clone());
    let resolved = match resolve_group(platform.as_ref(), &query).await {
        Ok(resolved) => resolved,
        Err(err) => {
            disconnect_after_failure(platform.as_ref()).await;
            return Err(err).context("failed to list conversations");
        }
    };
    let Some(group) = resolved else {
        platform
            .disconnect()
            .await
            .context("failed to disconnect client")?;
        return Ok(None);
    };

    let filter = EventFilter {
        chat_id: group.id,
        sender_username: sender_username.to_string(),
    };
    let events = match platform.subscribe(filter, shutdown.subscribe()).await {
        Ok(events) => events,
        Err(err) => {
            disconnect_after_failure(platform.as_ref()).await;
            return Err(err).context("failed to subscribe to group messages");
        }
    };
    tracing::info!(
        target: "capture",
        group = %group.name,
        sender = sender_username,
        "listening for new messages; press Ctrl+C to stop"
    );

    let summary = CaptureLoop::new(platform.clone(), downloads_dir)
        .run(events, shutdown.subscribe())
        .await;

    shutdown.trigger();
    platform
        .disconnect()
        .await
        .context("message subscription stopped with an error")?;
    Ok(Some(summary))
}

/// Dispatch workflow: resolve the group, post every URL from the list file,
/// disconnect. Returns `None` when the group could not be resolved.
pub async fn run_dispatch(
    platform: Arc<dyn ChatPlatform>,
    group: &GroupTarget,
    dispatch: &DispatchConfig,
    shutdown: Shutdown,
) -> Result<Option<DispatchReport>> {
    let query = GroupQuery::by_name_or_id(group.name.clone(), group.id);
    let resolved = match resolve_group(platform.as_ref(), &query).await {
        Ok(resolved) => resolved,
        Err(err) => {
            disconnect_after_failure(platform.as_ref()).await;
            return Err(err).context("failed to list conversations");
        }
    };
    let Some(group) = resolved else {
        platform
            .disconnect()
            .await
            .context("failed to disconnect client")?;
        return Ok(None);
    };

    let urls = match load_url_list(&dispatch.urls_file).await {
        Ok(urls) => urls,
        Err(err) => {
            disconnect_after_failure(platform.as_ref()).await;
            return Err(err.into());
        }
    };

    let outcome = DispatchLoop::new(platform.clone(), dispatch.send_delay, dispatch.on_failure)
        .run(&group, &urls, shutdown.subscribe())
        .await;

    tracing::info!(target: "dispatch", "all urls processed; disconnecting client");
    let disconnected = platform.disconnect().await;
    let report = outcome?;
    disconnected.context("failed to disconnect client")?;
    Ok(Some(report))
}

/// Teardown on an error path; the original failure is what gets reported.
async fn disconnect_after_failure(platform: &dyn ChatPlatform) {
    if let Err(err) = platform.disconnect().await {
        tracing::warn!(target: "lifecycle", error = %err, "disconnect failed during teardown");
    }
}
