//! Request handlers for the `/users` API.
//!
//! Every mutating path looks the record up first and checks the presented
//! `access_token` against the stored one before writing. The lookup and the
//! write are separate store calls; if the store's row count disagrees with
//! what the lookup implied, the handler answers 500 instead of guessing.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::ids::{check_record_id, IdSet};
use crate::models::{DeleteManyResponse, PublicUser, UserPatch, UserRecord};
use crate::storage::{UpsertOutcome, UserCollection};

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `PUT /users/`: create the record, or replace it when the caller holds its token.
pub async fn create_or_update_user(
    State(state): State<AppState>,
    payload: Result<Json<UserRecord>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let Json(record) = payload?;
    if let Err(reason) = check_record_id(&record.id) {
        return Err(AppError::user("invalid_id".to_string(), format!("{}: {:?}", reason, record.id)));
    }

    if let Some(existing) = state.users.find_by_id(&record.id).await? {
        if !existing.authorizes(record.access_token.as_deref()) {
            warn!(target: "goalmusic::server", "rejected update of user '{}': token mismatch", record.id);
            return Err(AppError::token_mismatch(&record.id));
        }
    }

    let view = PublicUser::from(&record);
    let status = match state.users.upsert(record).await? {
        UpsertOutcome::Inserted => StatusCode::CREATED,
        UpsertOutcome::Matched => StatusCode::OK,
    };
    info!(target: "goalmusic::server", "put user '{}' -> {}", view.id, status.as_u16());
    Ok((status, Json(view)))
}

/// `PATCH /users/{user_id}`: set `goal_music_uri`, and `access_token` when present.
/// A body `id` is ignored; a body without `goal_music_uri` is a 400 `invalid_payload`.
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> AppResult<Json<PublicUser>> {
    let Json(patch) = payload?;
    let presented = patch.presented_token().map(str::to_string);
    let mask = patch.into_mask();

    let Some(mut current) = state.users.find_by_id(&user_id).await? else {
        return Err(AppError::user_not_found(&user_id));
    };
    if !current.authorizes(presented.as_deref()) {
        warn!(target: "goalmusic::server", "rejected patch of user '{}': token mismatch", user_id);
        return Err(AppError::token_mismatch(&user_id));
    }

    let modified = state.users.update_fields(&user_id, &mask).await?;
    if modified != 1 {
        return Err(AppError::internal(
            "update_race".to_string(),
            format!("user '{}' changed during update (modified {})", user_id, modified),
        ));
    }
    mask.apply(&mut current);
    info!(target: "goalmusic::server", "patched user '{}' fields={:?}", user_id, mask.field_names());
    Ok(Json(PublicUser::from(current)))
}

/// `GET /users/{user_id}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<PublicUser>> {
    match state.users.find_by_id(&user_id).await? {
        Some(r) => Ok(Json(PublicUser::from(r))),
        None => Err(AppError::user_not_found(&user_id)),
    }
}

/// `GET /users/?user_ids=..`: public views of the ids that exist. Empty is fine.
pub async fn get_users(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<Vec<PublicUser>>> {
    let ids = IdSet::from_query_pairs(&pairs);
    let found = state.users.find_by_ids(&ids).await?;
    Ok(Json(found.into_iter().map(PublicUser::from).collect()))
}

/// `DELETE /users/{user_id}?access_token=..`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<TokenQuery>,
) -> AppResult<Json<DeleteManyResponse>> {
    let Some(current) = state.users.find_by_id(&user_id).await? else {
        return Err(AppError::user_not_found(&user_id));
    };
    if !current.authorizes(q.access_token.as_deref()) {
        warn!(target: "goalmusic::server", "rejected delete of user '{}': token mismatch", user_id);
        return Err(AppError::token_mismatch(&user_id));
    }

    let deleted = state.users.delete_one(&user_id).await?;
    if deleted != 1 {
        return Err(AppError::internal(
            "delete_race".to_string(),
            format!("user '{}' changed during delete (deleted {})", user_id, deleted),
        ));
    }
    info!(target: "goalmusic::server", "deleted user '{}'", user_id);
    Ok(Json(DeleteManyResponse { deleted_count: deleted }))
}

// TODO: require per-record tokens here once clients send them; single delete already does.
/// `DELETE /users/?user_ids=..`: bulk delete without a token check.
pub async fn delete_users(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<(StatusCode, Json<DeleteManyResponse>)> {
    let ids = IdSet::from_query_pairs(&pairs);
    let deleted = state.users.delete_many(&ids).await?;
    info!(target: "goalmusic::server", "bulk delete requested={} deleted={}", ids.len(), deleted);
    let status = if deleted == 0 { StatusCode::NOT_FOUND } else { StatusCode::OK };
    Ok((status, Json(DeleteManyResponse { deleted_count: deleted })))
}
