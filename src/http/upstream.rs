//! Forwarding to the single configured upstream.
//!
//! This is the inner handler the server puts behind the gate. Connection
//! failures become `502 Bad Gateway`, which the gate treats as transient.

use axum::{
    body::Body,
    extract::State,
    http::{uri::{Authority, InvalidUri, PathAndQuery, Scheme}, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;

use crate::config::UpstreamConfig;

/// Shared state for the forwarding handler.
#[derive(Clone)]
pub struct UpstreamState {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl UpstreamState {
    pub fn new(config: &UpstreamConfig) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(&config.address)?;
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Ok(Self { client, authority })
    }
}

fn upstream_uri(original: &Uri, authority: &Authority) -> Uri {
    let mut parts = original.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(authority.clone());
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(parts).unwrap_or_else(|_| original.clone())
}

/// Forward the request upstream and stream the reply back.
pub async fn forward_handler(
    State(state): State<UpstreamState>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (mut parts, body) = request.into_parts();
    parts.uri = upstream_uri(&parts.uri, &state.authority);

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request upstream"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, upstream = %state.authority, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
