//! `GET /bandwidth`, `GET /bandwidth/stream` — latest monitor samples and an
//! SSE stream emitting a sample every 5 s (spec §4.9).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Query};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use tn_types::CounterSample;

use crate::error::AppError;
use crate::state::AgentState;

#[derive(Debug, Deserialize)]
pub struct IfaceQuery {
    pub iface: String,
}

pub async fn latest(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<IfaceQuery>,
) -> Result<Json<CounterSample>, AppError> {
    let sample = state.monitor.latest(&q.iface).await.map_err(tn_types::error::TnError::from)?;
    Ok(Json(sample))
}

pub async fn stream_samples(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<IfaceQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let iface = q.iface;
    let ticker = tokio_stream_interval(Duration::from_secs(5));
    let s = stream::unfold((state, iface, ticker), |(state, iface, mut ticker)| async move {
        ticker.tick().await;
        let event = match state.monitor.latest(&iface).await {
            Ok(sample) => Event::default().json_data(sample).unwrap_or_else(|_| Event::default()),
            Err(e) => Event::default().event("error").data(e.to_string()),
        };
        Some((Ok(event), (state, iface, ticker)))
    });
    Sse::new(s)
}

fn tokio_stream_interval(period: Duration) -> tokio::time::Interval {
    tokio::time::interval(period)
}
