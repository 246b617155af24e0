use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::{cors::CorsLayer, services::ServeFile};
use tracing::{debug, info, warn};

use randomsound_proto::filter::Selection;
use randomsound_proto::protocol::{RandomResponse, TrackRecord};

use crate::index::LibraryIndex;
use crate::plays::{LivePlays, PLAY_ID_LEN};

/// Longest selection segment that is even looked at.
const MAX_SELECTION_LEN: usize = 16;

#[derive(Clone)]
struct HttpState {
    index: Arc<LibraryIndex>,
    plays: Arc<LivePlays>,
}

pub fn router(index: Arc<LibraryIndex>, plays: Arc<LivePlays>) -> Router {
    Router::new()
        .route("/random", get(random_all))
        .route("/random/:selection", get(random_selection))
        .route("/stream/:id", get(stream))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { index, plays })
}

pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> anyhow::Result<()> {
    info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_selection(segment: &str) -> Selection {
    if segment.len() > MAX_SELECTION_LEN {
        warn!("random: oversized selection ({} bytes), using all", segment.len());
        return Selection::All;
    }
    Selection::parse(segment).unwrap_or_else(|| {
        warn!("random: unknown selection {:?}, using all", segment);
        Selection::All
    })
}

async fn random_all(State(state): State<HttpState>) -> Json<RandomResponse> {
    Json(pick(&state, Selection::All))
}

async fn random_selection(
    State(state): State<HttpState>,
    Path(selection): Path<String>,
) -> Json<RandomResponse> {
    Json(pick(&state, parse_selection(&selection)))
}

fn pick(state: &HttpState, selection: Selection) -> RandomResponse {
    let picked = state
        .index
        .pick_random(selection, &mut rand::thread_rng())
        .cloned();
    let Some(file) = picked else {
        debug!("random: {} pool is empty", selection.as_str());
        return RandomResponse::ok(Vec::new());
    };

    let id = state.plays.issue(file.path.clone());
    info!("random: {} → {} ({})", selection.as_str(), file.file_name, id);
    RandomResponse::ok(vec![TrackRecord {
        path: id,
        ext: file.ext,
        file: file.file_name,
        title: file.title,
        artist: file.artist,
        album: file.album,
    }])
}

/// `stream/<id>[anything]`: the first 36 characters are the play id.
async fn stream(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
    req: Request,
) -> Response {
    let id: String = raw.chars().take(PLAY_ID_LEN).collect();
    let Some(path) = state.plays.resolve(&id) else {
        debug!("stream: unknown play id {:?}", id);
        return StatusCode::NOT_FOUND.into_response();
    };

    match ServeFile::new(&path).oneshot(req).await {
        Ok(res) => res.map(Body::new).into_response(),
        Err(e) => {
            warn!("stream: {}: {}", path.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
