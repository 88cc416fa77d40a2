/*
 * Responsibility
 * - GET /me: 解決済み Identity をそのまま返す
 * - `cached` で cache hit かどうかが見える (動作確認用)
 */
use axum::Json;

use crate::api::v1::extractors::IdentityCtx;
use crate::services::auth::Identity;

pub async fn me(IdentityCtx(identity): IdentityCtx) -> Json<Identity> {
    tracing::debug!(uid = ?identity.uid(), cached = identity.is_from_cache(), "me");
    Json(identity)
}
