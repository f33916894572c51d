//! AppSync realtime dialect of the subscription socket.
//!
//! The socket lives on the `appsync-realtime-api` host. The connection is
//! authorized through base64 `header`/`payload` query parameters, every
//! `start` frame repeats the authorization, and the server sends `ka` frames
//! at least once per `connectionTimeoutMs`.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use shared::{
    error::RemoteError,
    protocol::{
        AppSyncAuthorization, AppSyncClientMessage, AppSyncExtensions, AppSyncServerMessage,
        AppSyncStartPayload, Operation, APPSYNC_WS_PROTOCOL,
    },
};
use tokio::time::{sleep, Instant};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue},
        Message,
    },
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::ClientError,
    subscription::{Subscription, SubscriptionEvent},
    transport::{send_frame, take_root_field},
};

/// Used when `connection_ack` carries no timeout.
pub(crate) const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(300);

/// Base64 of `{}`.
const EMPTY_PAYLOAD: &str = "e30=";

const HTTP_HOST_MARKER: &str = ".appsync-api.";
const REALTIME_HOST_MARKER: &str = ".appsync-realtime-api.";

pub(crate) fn is_appsync_host(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        host.contains(HTTP_HOST_MARKER) || host.contains(REALTIME_HOST_MARKER)
    })
}

/// `<id>.appsync-api.<region>.amazonaws.com` → `wss://<id>.appsync-realtime-api.<region>.amazonaws.com`.
pub(crate) fn realtime_host_for(graphql_endpoint: &Url) -> Option<Url> {
    let host = graphql_endpoint.host_str()?;
    if !host.contains(HTTP_HOST_MARKER) {
        return None;
    }
    let realtime_host = host.replacen(HTTP_HOST_MARKER, REALTIME_HOST_MARKER, 1);
    Url::parse(&format!("wss://{realtime_host}{}", graphql_endpoint.path())).ok()
}

/// Host value the API expects inside the authorization header.
fn api_host(graphql_endpoint: &Url) -> Result<String, ClientError> {
    let host = graphql_endpoint
        .host_str()
        .ok_or_else(|| ClientError::Endpoint(format!("{graphql_endpoint} has no host")))?;
    Ok(match graphql_endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

pub(crate) fn connection_url(
    realtime_endpoint: &Url,
    authorization: &AppSyncAuthorization,
) -> Result<Url, ClientError> {
    let header = STANDARD.encode(serde_json::to_vec(authorization)?);
    let mut url = realtime_endpoint.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("header", &header)
        .append_pair("payload", EMPTY_PAYLOAD);
    Ok(url)
}

fn unexpected(frame: &AppSyncServerMessage, stage: &str) -> ClientError {
    ClientError::SubscriptionClosed(format!("unexpected frame before {stage}: {frame:?}"))
}

pub(crate) async fn subscribe(
    realtime_endpoint: &Url,
    graphql_endpoint: &Url,
    token: String,
    operation: &Operation,
    variables: Value,
) -> Result<Subscription, ClientError> {
    let authorization = AppSyncAuthorization {
        host: api_host(graphql_endpoint)?,
        authorization: token,
    };
    let url = connection_url(realtime_endpoint, &authorization)?;
    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(APPSYNC_WS_PROTOCOL),
    );
    let (ws_stream, _) = connect_async(request).await?;
    let (mut writer, mut reader) = ws_stream.split();

    send_frame(&mut writer, &AppSyncClientMessage::ConnectionInit).await?;
    let keep_alive = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<AppSyncServerMessage>(&text)? {
                AppSyncServerMessage::ConnectionAck { payload } => {
                    break payload
                        .connection_timeout_ms
                        .map(Duration::from_millis)
                        .unwrap_or(DEFAULT_KEEP_ALIVE)
                }
                AppSyncServerMessage::Ka => {}
                AppSyncServerMessage::ConnectionError { payload } => {
                    return Err(RemoteError::new(payload.errors).into())
                }
                other => return Err(unexpected(&other, "connection_ack")),
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::SubscriptionClosed(
                    "socket closed before connection_ack".to_string(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    };

    let id = Uuid::new_v4().to_string();
    let data = serde_json::to_string(&json!({
        "query": operation.document,
        "operationName": operation.name,
        "variables": variables,
    }))?;
    send_frame(
        &mut writer,
        &AppSyncClientMessage::Start {
            id: id.clone(),
            payload: AppSyncStartPayload {
                data,
                extensions: AppSyncExtensions { authorization },
            },
        },
    )
    .await?;

    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<AppSyncServerMessage>(&text)? {
                AppSyncServerMessage::StartAck { id: frame_id } if frame_id == id => break,
                AppSyncServerMessage::Ka => {}
                AppSyncServerMessage::Error { payload, .. }
                | AppSyncServerMessage::ConnectionError { payload } => {
                    return Err(RemoteError::new(payload.errors).into())
                }
                other => return Err(unexpected(&other, "start_ack")),
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::SubscriptionClosed(
                    "socket closed before start_ack".to_string(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
    info!(
        operation = operation.name,
        subscription_id = %id,
        keep_alive_ms = keep_alive.as_millis() as u64,
        "appsync subscription opened"
    );

    let (feed, subscription) = Subscription::channel(operation);
    let (events, mut cancelled) = feed.into_parts();
    let operation = *operation;
    tokio::spawn(async move {
        let mut idle = std::pin::pin!(sleep(keep_alive));
        loop {
            tokio::select! {
                _ = &mut cancelled => {
                    let _ = send_frame(&mut writer, &AppSyncClientMessage::Stop { id: id.clone() }).await;
                    let _ = writer.close().await;
                    debug!(operation = operation.name, subscription_id = %id, "subscription stopped by client");
                    break;
                }
                _ = &mut idle => {
                    warn!(operation = operation.name, "no keep-alive within {keep_alive:?}");
                    let _ = events
                        .send(SubscriptionEvent::Error(ClientError::SubscriptionClosed(
                            "keep-alive timed out".to_string(),
                        )))
                        .await;
                    break;
                }
                frame = reader.next() => {
                    idle.as_mut().reset(Instant::now() + keep_alive);
                    let event = match frame {
                        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AppSyncServerMessage>(&text) {
                            Ok(AppSyncServerMessage::Data { id: frame_id, payload }) if frame_id == id => {
                                if payload.errors.is_empty() {
                                    match take_root_field(&operation, payload.data) {
                                        Ok(value) => SubscriptionEvent::Data(value),
                                        Err(err) => SubscriptionEvent::Error(err),
                                    }
                                } else {
                                    SubscriptionEvent::Error(RemoteError::new(payload.errors).into())
                                }
                            }
                            Ok(AppSyncServerMessage::Error { id: frame_id, payload })
                                if frame_id.as_deref().map_or(true, |frame_id| frame_id == id) =>
                            {
                                let _ = events
                                    .send(SubscriptionEvent::Error(RemoteError::new(payload.errors).into()))
                                    .await;
                                break;
                            }
                            Ok(AppSyncServerMessage::ConnectionError { payload }) => {
                                let _ = events
                                    .send(SubscriptionEvent::Error(RemoteError::new(payload.errors).into()))
                                    .await;
                                break;
                            }
                            Ok(AppSyncServerMessage::Complete { id: frame_id }) if frame_id == id => {
                                debug!(operation = operation.name, subscription_id = %id, "subscription completed by server");
                                break;
                            }
                            Ok(_) => continue,
                            Err(err) => SubscriptionEvent::Error(err.into()),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = events
                                .send(SubscriptionEvent::Error(ClientError::SubscriptionClosed(
                                    "socket closed by server".to_string(),
                                )))
                                .await;
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            let _ = events.send(SubscriptionEvent::Error(err.into())).await;
                            break;
                        }
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(subscription)
}
