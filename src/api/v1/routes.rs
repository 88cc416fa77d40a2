/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health は public、/me は auth middleware の内側
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::middleware::auth::access;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let protected: Router<AppState> =
        access::apply(Router::new().route("/me", get(me)), state.pipeline.clone());

    Router::new().route("/health", get(health)).merge(protected)
}
