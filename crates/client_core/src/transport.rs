//! GraphQL facade: queries and mutations over HTTP, subscriptions over a
//! WebSocket speaking either AppSync's realtime protocol or
//! `graphql-transport-ws`. Every call carries the signed-in session's access
//! token; nothing is retried, batched or cached.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    error::{GraphqlError, RemoteError},
    protocol::{
        GraphqlRequest, GraphqlResponse, Operation, SubscribePayload, WsClientMessage,
        WsServerMessage, GRAPHQL_WS_PROTOCOL,
    },
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue},
        Message,
    },
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    appsync,
    error::ClientError,
    identity::IdentityProvider,
    subscription::{Subscription, SubscriptionEvent},
};

#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Runs one query or mutation and returns the value under the
    /// operation's root field.
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, ClientError>;

    /// Opens a subscription; each data event carries the value under the
    /// operation's root field.
    async fn subscribe(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<Subscription, ClientError>;
}

/// Wire dialect of the subscription socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RealtimeProtocol {
    /// AWS AppSync realtime endpoint (`graphql-ws` sub-protocol).
    #[serde(alias = "appsync")]
    AppSync,
    GraphqlTransportWs,
}

impl RealtimeProtocol {
    /// AppSync hosts are recognised by name; anything else is treated as a
    /// `graphql-transport-ws` gateway.
    pub fn detect(graphql_endpoint: &Url, realtime_endpoint: Option<&Url>) -> Self {
        if appsync::is_appsync_host(graphql_endpoint)
            || realtime_endpoint.is_some_and(appsync::is_appsync_host)
        {
            RealtimeProtocol::AppSync
        } else {
            RealtimeProtocol::GraphqlTransportWs
        }
    }
}

pub struct HttpGraphqlTransport {
    http: Client,
    graphql_endpoint: Url,
    realtime_endpoint: Url,
    realtime_protocol: RealtimeProtocol,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpGraphqlTransport {
    pub fn new(
        graphql_endpoint: Url,
        realtime_endpoint: Option<Url>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ClientError> {
        let realtime_protocol = RealtimeProtocol::detect(&graphql_endpoint, realtime_endpoint.as_ref());
        let realtime_endpoint = match realtime_endpoint {
            Some(url) => url,
            None => realtime_url_for(&graphql_endpoint)?,
        };
        Ok(Self {
            http: Client::new(),
            graphql_endpoint,
            realtime_endpoint,
            realtime_protocol,
            identity,
        })
    }

    /// Overrides the dialect picked from the endpoint host names.
    pub fn with_realtime_protocol(mut self, protocol: RealtimeProtocol) -> Self {
        self.realtime_protocol = protocol;
        self
    }

    pub fn realtime_protocol(&self) -> RealtimeProtocol {
        self.realtime_protocol
    }

    pub fn graphql_endpoint(&self) -> &Url {
        &self.graphql_endpoint
    }

    pub fn realtime_endpoint(&self) -> &Url {
        &self.realtime_endpoint
    }
}

/// Derives the WebSocket endpoint from the HTTP one: the AppSync realtime
/// host for AppSync APIs, otherwise the same URL with `https` → `wss`.
pub fn realtime_url_for(graphql_endpoint: &Url) -> Result<Url, ClientError> {
    if let Some(url) = appsync::realtime_host_for(graphql_endpoint) {
        return Ok(url);
    }
    let scheme = match graphql_endpoint.scheme() {
        "https" => "wss",
        "http" => "ws",
        "wss" | "ws" => return Ok(graphql_endpoint.clone()),
        other => {
            return Err(ClientError::Endpoint(format!(
                "graphql endpoint must use http:// or https://, got {other}://"
            )))
        }
    };
    let mut url = graphql_endpoint.clone();
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Endpoint(format!("cannot derive {scheme} url from {graphql_endpoint}")))?;
    Ok(url)
}

pub(crate) fn take_root_field(
    operation: &Operation,
    data: Option<Value>,
) -> Result<Value, ClientError> {
    let mut data = data.ok_or(ClientError::MissingField("data"))?;
    match data.get_mut(operation.root_field).map(Value::take) {
        Some(Value::Null) | None => Err(ClientError::MissingField(operation.root_field)),
        Some(value) => Ok(value),
    }
}

fn unauthorized_from_status(status: StatusCode) -> RemoteError {
    RemoteError::new(vec![GraphqlError::new(format!(
        "request rejected with HTTP {}",
        status.as_u16()
    ))
    .with_type("Unauthorized")])
}

#[async_trait]
impl GraphqlTransport for HttpGraphqlTransport {
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, ClientError> {
        let token = self.identity.access_token().await?;
        let res = self
            .http
            .post(self.graphql_endpoint.clone())
            .header(AUTHORIZATION, token)
            .json(&GraphqlRequest {
                query: operation.document,
                operation_name: operation.name,
                variables,
            })
            .send()
            .await?;
        let status = res.status();
        let body = res.bytes().await?;

        match serde_json::from_slice::<GraphqlResponse>(&body) {
            Ok(response) if !response.errors.is_empty() => {
                debug!(
                    operation = operation.name,
                    status = status.as_u16(),
                    errors = response.errors.len(),
                    "graphql call returned errors"
                );
                Err(RemoteError::new(response.errors).into())
            }
            Ok(response) if status.is_success() => take_root_field(operation, response.data),
            _ if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(unauthorized_from_status(status).into())
            }
            Ok(_) => Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(err) if status.is_success() => Err(err.into()),
            Err(_) => Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    async fn subscribe(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<Subscription, ClientError> {
        let token = self.identity.access_token().await?;
        match self.realtime_protocol {
            RealtimeProtocol::AppSync => {
                appsync::subscribe(
                    &self.realtime_endpoint,
                    &self.graphql_endpoint,
                    token,
                    operation,
                    variables,
                )
                .await
            }
            RealtimeProtocol::GraphqlTransportWs => {
                self.subscribe_transport_ws(token, operation, variables).await
            }
        }
    }
}

impl HttpGraphqlTransport {
    async fn subscribe_transport_ws(
        &self,
        token: String,
        operation: &Operation,
        variables: Value,
    ) -> Result<Subscription, ClientError> {
        let mut request = self.realtime_endpoint.as_str().into_client_request()?;
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
        );
        let (ws_stream, _) = connect_async(request).await?;
        let (mut writer, mut reader) = ws_stream.split();

        send_frame(
            &mut writer,
            &WsClientMessage::ConnectionInit {
                payload: json!({ "Authorization": token }),
            },
        )
        .await?;

        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsServerMessage>(&text)? {
                    WsServerMessage::ConnectionAck => break,
                    WsServerMessage::Ping => send_frame(&mut writer, &WsClientMessage::Pong).await?,
                    other => {
                        return Err(ClientError::SubscriptionClosed(format!(
                            "unexpected frame before connection_ack: {other:?}"
                        )))
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ClientError::SubscriptionClosed(
                        "socket closed before connection_ack".to_string(),
                    ))
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }

        let id = Uuid::new_v4().to_string();
        send_frame(
            &mut writer,
            &WsClientMessage::Subscribe {
                id: id.clone(),
                payload: SubscribePayload {
                    query: operation.document.to_string(),
                    operation_name: operation.name.to_string(),
                    variables,
                },
            },
        )
        .await?;
        info!(operation = operation.name, subscription_id = %id, "subscription opened");

        let (feed, subscription) = Subscription::channel(operation);
        let (events, mut cancelled) = feed.into_parts();
        let operation = *operation;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancelled => {
                        let _ = send_frame(&mut writer, &WsClientMessage::Complete { id: id.clone() }).await;
                        let _ = writer.close().await;
                        debug!(operation = operation.name, subscription_id = %id, "subscription completed by client");
                        break;
                    }
                    frame = reader.next() => {
                        let event = match frame {
                            Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsServerMessage>(&text) {
                                Ok(WsServerMessage::Next { id: frame_id, payload }) if frame_id == id => {
                                    if payload.errors.is_empty() {
                                        match take_root_field(&operation, payload.data) {
                                            Ok(value) => SubscriptionEvent::Data(value),
                                            Err(err) => SubscriptionEvent::Error(err),
                                        }
                                    } else {
                                        SubscriptionEvent::Error(RemoteError::new(payload.errors).into())
                                    }
                                }
                                Ok(WsServerMessage::Error { id: frame_id, payload }) if frame_id == id => {
                                    let _ = events
                                        .send(SubscriptionEvent::Error(RemoteError::new(payload).into()))
                                        .await;
                                    break;
                                }
                                Ok(WsServerMessage::Complete { id: frame_id }) if frame_id == id => {
                                    debug!(operation = operation.name, subscription_id = %id, "subscription completed by server");
                                    break;
                                }
                                Ok(WsServerMessage::Ping) => {
                                    if let Err(err) = send_frame(&mut writer, &WsClientMessage::Pong).await {
                                        warn!(operation = operation.name, "failed to answer ping: {err}");
                                    }
                                    continue;
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
}

pub(crate) async fn send_frame<S, F>(writer: &mut S, frame: &F) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    F: Serialize,
{
    let text = serde_json::to_string(frame)?;
    writer.send(Message::Text(text)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
