use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{AppErr, AppResult},
    state::SharedHub,
    utils::room,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomInfo {
    room: String,
    user_count: usize,
    user_names: Vec<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/:room", get(room_info))
}

/* ---------------- live room overview ---------------- */

async fn list_rooms(Extension(hub): Extension<SharedHub>) -> Json<Vec<RoomInfo>> {
    let hub = hub.lock().await;
    let infos: Vec<RoomInfo> = hub
        .rooms()
        .names()
        .map(|name| {
            let (user_count, user_names) = hub.snapshot(name);
            RoomInfo {
                room: name.to_owned(),
                user_count,
                user_names,
            }
        })
        .collect();
    Json(infos)
}

async fn room_info(
    Extension(hub): Extension<SharedHub>,
    Path(raw): Path<String>,
) -> AppResult<Json<RoomInfo>> {
    let name = room::normalize(&raw);
    let hub = hub.lock().await;
    let (user_count, user_names) = hub.snapshot(&name);
    // empty rooms are pruned, so zero members means the room does not exist
    if user_count == 0 {
        return Err(AppErr::NotFound(format!("no such room: {name}")));
    }
    Ok(Json(RoomInfo {
        room: name,
        user_count,
        user_names,
    }))
}
