//! Public routes: shortcode views and front-end form submissions.

use std::collections::BTreeMap;

use api::{
    FormFailure, FormInput, FormKind, Outcome, PageContext, PageView, SessionChange, Shortcode,
    StatusFlags, Submission,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde_json::json;
use store::MemberStore;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

type Pairs = Vec<(String, String)>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/view/{tag}", get(view))
        .route("/render", post(render))
        .route("/forms/{kind}", post(submit))
}

fn flags(query: &Pairs) -> StatusFlags {
    StatusFlags::from_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// One shortcode, attributes and status flags taken from the query string.
async fn view(
    State(state): State<AppState>,
    session: Session,
    Path(tag): Path<String>,
    Query(query): Query<Pairs>,
) -> AppResult<Json<PageView>> {
    let attrs: BTreeMap<String, String> = query
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect();
    let shortcode = Shortcode::from_parts(&tag, &attrs).ok_or(AppError::NotFound)?;
    let visitor = state.visitor(&session, false).await?;
    let flags = flags(&query);
    let ctx = PageContext {
        scope: &visitor.scope,
        flags: &flags,
        seed: &visitor.seed,
        now: Utc::now(),
        failure: None,
    };
    Ok(Json(state.portal.render(&shortcode, &ctx).await?))
}

/// Every shortcode embedded in the posted page content.
async fn render(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<Pairs>,
    content: String,
) -> AppResult<Json<Vec<PageView>>> {
    let visitor = state.visitor(&session, false).await?;
    let flags = flags(&query);
    let ctx = PageContext {
        scope: &visitor.scope,
        flags: &flags,
        seed: &visitor.seed,
        now: Utc::now(),
        failure: None,
    };
    Ok(Json(state.portal.render_content(&content, &ctx).await?))
}

fn form_kind(name: &str) -> Option<FormKind> {
    match name {
        "profile" => Some(FormKind::Profile),
        "login" => Some(FormKind::Login),
        "logout" => Some(FormKind::Logout),
        "payment" => Some(FormKind::Payment),
        _ => None,
    }
}

/// The shortcode that shows `kind` again after a failed submission.
fn shortcode_for(kind: FormKind) -> Shortcode {
    match kind {
        FormKind::Profile => Shortcode::MemberProfile,
        FormKind::Login | FormKind::Logout => Shortcode::LoginBox {
            collapsed: false,
            link: None,
        },
        FormKind::Payment => Shortcode::PaymentForm,
    }
}

async fn submit(
    State(state): State<AppState>,
    session: Session,
    Path(kind): Path<String>,
    Form(pairs): Form<Pairs>,
) -> AppResult<Response> {
    let kind = form_kind(&kind).ok_or(AppError::NotFound)?;
    let visitor = state.visitor(&session, false).await?;
    let input = FormInput::new(pairs);
    let now = Utc::now();
    let submission = Submission {
        scope: &visitor.scope,
        input: &input,
        seed: &visitor.seed,
        now,
        is_post: true,
    };
    let portal = &state.portal;
    let outcome = match kind {
        FormKind::Profile => portal.handle_profile(submission).await,
        FormKind::Login => portal.handle_login(submission).await,
        FormKind::Logout => portal.handle_logout(submission).await,
        FormKind::Payment => portal.handle_payment(submission).await,
    };

    match outcome {
        Outcome::Ignored => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "outcome": "ignored" })),
        )
            .into_response()),
        Outcome::Rerender {
            errors,
            message,
            notices,
        } => {
            let failure = FormFailure { errors, message };
            let flags = StatusFlags::default();
            let ctx = PageContext {
                scope: &visitor.scope,
                flags: &flags,
                seed: &visitor.seed,
                now,
                failure: Some((kind, &failure)),
            };
            let view = portal.render(&shortcode_for(kind), &ctx).await?;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "view": view, "notices": notices })),
            )
                .into_response())
        }
        Outcome::Redirect {
            to,
            session: change,
            notices,
            ..
        } => {
            match change {
                Some(SessionChange::SignIn(id)) => {
                    session.cycle_id().await?;
                    session.insert(api::auth::SESSION_USER_ID_KEY, id).await?;
                }
                Some(SessionChange::SignOut) => session.flush().await?,
                None => {}
            }
            for notice in notices {
                tracing::warn!(message = %notice.message, "queued for the admin screen");
                portal.repo().store().push_notice(notice).await?;
            }
            Ok(Redirect::to(&to).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_kinds_and_rerender_targets() {
        assert_eq!(form_kind("payment"), Some(FormKind::Payment));
        assert_eq!(form_kind("admin"), None);
        assert_eq!(shortcode_for(FormKind::Profile).tag(), "asamp_member_profile");
        assert_eq!(shortcode_for(FormKind::Logout).tag(), "asamp_member_login_box");
    }

    #[test]
    fn test_flags_from_query() {
        let query: Pairs = vec![
            ("member_updated".into(), "true".into()),
            ("email_sent".into(), "1".into()),
        ];
        let flags = flags(&query);
        assert!(flags.contains(api::StatusFlag::MemberUpdated));
        assert!(!flags.contains(api::StatusFlag::EmailSent));
    }
}
