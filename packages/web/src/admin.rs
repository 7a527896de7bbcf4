//! Admin routes: settings, member import/export, member profiles and notices.
//!
//! Every route runs in the admin context and requires an account holding the
//! administrator role.

use api::forms::FormDescriptor;
use api::handlers::IMPORT_FORM_KEY;
use api::lifecycle::{save_options, settings_tabs, SettingsTab};
use api::{FormInput, FormKind, Outcome, PortalError, RequestScope};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use store::{AccountId, MemberAccount, MemberStore, PortalOptions, StoredNotice};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Key the settings form's token is scoped to.
const SETTINGS_FORM_KEY: &str = "asamp_settings";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/settings", get(settings).post(update_settings))
        .route("/admin/members/export", get(export))
        .route("/admin/members/import", post(import))
        .route("/admin/members/{id}", get(member).post(update_member))
        .route("/admin/members/{id}/geocode/reset", post(reset_geocode))
        .route("/admin/notices", get(notices))
        .route("/admin/notices/{id}/dismiss", post(dismiss_notice))
}

#[derive(Serialize)]
struct SettingsPage {
    tabs: Vec<SettingsTab>,
    options: PortalOptions,
    token: String,
    import_token: String,
}

async fn settings(State(state): State<AppState>, session: Session) -> AppResult<Json<SettingsPage>> {
    let visitor = state.visitor(&session, true).await?;
    let tokens = state.portal.tokens();
    let now = Utc::now();
    Ok(Json(SettingsPage {
        tabs: settings_tabs(),
        options: state.portal.repo().options().await?,
        token: tokens.issue(SETTINGS_FORM_KEY, &visitor.seed, now),
        import_token: tokens.issue(IMPORT_FORM_KEY, &visitor.seed, now),
    }))
}

#[derive(Deserialize)]
struct SettingsUpdate {
    token: String,
    options: PortalOptions,
}

async fn update_settings(
    State(state): State<AppState>,
    session: Session,
    Json(update): Json<SettingsUpdate>,
) -> AppResult<StatusCode> {
    let visitor = state.visitor(&session, true).await?;
    if !state
        .portal
        .tokens()
        .verify(&update.token, SETTINGS_FORM_KEY, &visitor.seed, Utc::now())
    {
        return Err(PortalError::Security.into());
    }
    save_options(state.portal.repo(), &update.options).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let visitor = state.visitor(&session, true).await?;
    let csv = state.portal.export(&visitor.scope).await?;
    let filename = format!("members-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Multipart upload with a `token` field and a `file` field.
async fn import(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let visitor = state.visitor(&session, true).await?;
    let mut token = String::new();
    let mut file = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "token" => {
                token = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
            }
            "file" => {
                file = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec()
            }
            _ => {}
        }
    }

    let outcome = state
        .portal
        .handle_import(
            &visitor.scope,
            &token,
            &visitor.seed,
            Utc::now(),
            file.as_slice(),
            "/admin/settings",
        )
        .await;
    match outcome {
        Outcome::Redirect { to, .. } => Ok(Redirect::to(&to).into_response()),
        Outcome::Rerender {
            errors, message, ..
        } => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": message, "errors": errors })),
        )
            .into_response()),
        Outcome::Ignored => Err(AppError::BadRequest("not an admin request".into())),
    }
}

async fn target(state: &AppState, id: AccountId) -> AppResult<MemberAccount> {
    state
        .portal
        .repo()
        .store()
        .account(id)
        .await?
        .ok_or(AppError::NotFound)
}

/// The profile form as an admin sees it for another account.
async fn member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<AccountId>,
) -> AppResult<Json<FormDescriptor>> {
    let visitor = state.visitor(&session, true).await?;
    let scope = RequestScope::new(Some(target(&state, id).await?), true);
    let options = state.portal.repo().options().await?;
    Ok(Json(state.portal.form(
        FormKind::Profile,
        &scope,
        &options,
        &visitor.seed,
        Utc::now(),
    )))
}

async fn update_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<AccountId>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Json<MemberAccount>> {
    let visitor = state.visitor(&session, true).await?;
    target(&state, id).await?;
    let input = FormInput::new(pairs);
    let mut account = state
        .portal
        .save_admin_profile(&visitor.scope, id, &input, &visitor.seed, Utc::now())
        .await?;
    tracing::info!(account = id, "profile saved from the admin screen");
    account.password_hash.clear();
    Ok(Json(account))
}

async fn reset_geocode(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<AccountId>,
) -> AppResult<StatusCode> {
    state.visitor(&session, true).await?;
    let geocoder = state.portal.geocoder().ok_or(AppError::NotFound)?;
    geocoder.reset_failures(state.portal.repo(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pending notices; one-shot notices are consumed by this call.
async fn notices(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Vec<StoredNotice>>> {
    state.visitor(&session, true).await?;
    Ok(Json(state.portal.repo().consume_notices().await?))
}

async fn dismiss_notice(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<u64>,
) -> AppResult<StatusCode> {
    state.visitor(&session, true).await?;
    state.portal.repo().dismiss_notice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
