//! Auth middleware: credential -> Identity -> scope check -> request extensions.
//!
//! The pipeline decides; this layer only moves the result in or out of the request:
//! - success: `Identity` is inserted into extensions, then the next handler runs once
//! - failure: `AuthError` becomes the response, the next handler never runs

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AuthError;
use crate::services::auth::AuthPipeline;

/// Mount `pipeline` in front of every route of `router`.
///
/// Example:
/// ```ignore
/// let me = Router::new().route("/me", get(me));
/// let me = middleware::auth::access::apply(me, pipeline.clone());
/// app = app.merge(me);
/// ```
pub fn apply<S>(router: Router<S>, pipeline: Arc<AuthPipeline>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // The pipeline is carried as the middleware's own state, independent of the router's.
    router.layer(middleware::from_fn_with_state(pipeline, access_middleware))
}

pub async fn access_middleware(
    State(pipeline): State<Arc<AuthPipeline>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = pipeline.run(req.headers()).await?;

    // middleware -> extractor (IdentityCtx / Extension<Identity>)
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
