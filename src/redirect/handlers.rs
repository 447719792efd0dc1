use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::recorder::RequesterInfo;
use crate::error::ServiceError;

use super::gate::RedirectGate;

pub struct RedirectState {
    pub gate: RedirectGate,
}

/// `GET /{code}` — 302 to the stored target.
pub async fn redirect(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let requester = requester_from_parts(addr, &headers);
    let target = state.gate.resolve(&code, requester).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, target)]))
}

fn requester_from_parts(addr: SocketAddr, headers: &HeaderMap) -> RequesterInfo {
    RequesterInfo {
        remote_addr: addr.ip().to_string(),
        forwarded_for: header_value(headers, "x-forwarded-for"),
        user_agent: header_value(headers, "user-agent"),
        referrer: header_value(headers, "referer"),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
