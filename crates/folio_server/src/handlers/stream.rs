//! GET /api/admin/reset/stream/:job_id
//!
//! Server-sent `status` events for one reset. The first event carries the
//! current state; later events fire only when the status changes. The stream
//! ends after a terminal state. Polls the audit store so any instance can
//! serve it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Path,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use folio_core::error::FolioError;
use folio_core::jobs::ResetCoordinator;
use folio_core::types::AuditRecord;
use futures::stream::{self, Stream};

use crate::error::AppError;

/// Poll interval for the status stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub poll: Duration,
}

pub async fn stream_reset(
    Extension(resets): Extension<Arc<ResetCoordinator>>,
    Extension(settings): Extension<StreamSettings>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let current = resets
        .find(&job_id)
        .await?
        .ok_or_else(|| FolioError::NotFound(format!("reset job {job_id}")))?;
    let events = status_events(resets, current, settings.poll);
    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

enum Cursor {
    Emit(AuditRecord),
    Watch(AuditRecord),
    Done,
}

fn status_event(record: &AuditRecord) -> Event {
    Event::default()
        .event("status")
        .data(serde_json::to_string(record).unwrap_or_default())
}

pub fn status_events(
    resets: Arc<ResetCoordinator>,
    initial: AuditRecord,
    poll: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Cursor::Emit(initial), move |cursor| {
        let resets = Arc::clone(&resets);
        async move {
            let mut last = match cursor {
                Cursor::Done => return None,
                Cursor::Emit(record) => return Some((Ok(status_event(&record)), emitted(record))),
                Cursor::Watch(record) => record,
            };
            loop {
                tokio::time::sleep(poll).await;
                match resets.find(&last.job_id).await {
                    Ok(Some(current)) if current.status != last.status => {
                        return Some((Ok(status_event(&current)), emitted(current)));
                    }
                    Ok(Some(current)) => last = current,
                    Ok(None) => {
                        tracing::warn!(job_id = %last.job_id, "reset vanished while streaming");
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %last.job_id, "status poll failed: {e}");
                    }
                }
            }
        }
    })
}

fn emitted(record: AuditRecord) -> Cursor {
    if record.status.is_terminal() {
        Cursor::Done
    } else {
        Cursor::Watch(record)
    }
}
