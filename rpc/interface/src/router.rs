//! Wires the `/json_rpc` endpoint onto an [`axum::Router`] over a cloned
//! [`ChainService`] handle (§6). Mirrors the one-route-per-endpoint shape
//! of the teacher's `RouterBuilder`, just without the enable/disable
//! builder machinery — this daemon always serves the same small surface.

use axum::{extract::State, routing::post, Json, Router};
use cn_blockchain::ChainService;
use cn_json_rpc::{Id, Request, Response};

use crate::{handler, method::Method};

async fn json_rpc(
    State(mut chain): State<ChainService>,
    Json(request): Json<Request<Method>>,
) -> Json<Response<serde_json::Value>> {
    let id = request.id.unwrap_or(Id::Null);
    match handler::dispatch(&mut chain, request.body).await {
        Ok(value) => Json(Response::ok(id, value)),
        Err(error) => Json(Response::err(id, error)),
    }
}

pub fn router(chain: ChainService) -> Router {
    Router::new()
        .route("/json_rpc", post(json_rpc))
        .with_state(chain)
}
