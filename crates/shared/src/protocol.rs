use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Priority, Todo, TodoId},
    error::GraphqlError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// A named GraphQL document plus the field its payload is keyed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub kind: OperationKind,
    pub root_field: &'static str,
    pub document: &'static str,
}

macro_rules! todo_fields {
    () => {
        "id title description priority completed dueDate createdAt updatedAt _deleted"
    };
}

pub const LIST_TODOS: Operation = Operation {
    name: "ListTodos",
    kind: OperationKind::Query,
    root_field: "listTodos",
    document: concat!(
        "query ListTodos($filter: ModelTodoFilterInput, $limit: Int, $nextToken: String) {",
        " listTodos(filter: $filter, limit: $limit, nextToken: $nextToken) {",
        " items { ",
        todo_fields!(),
        " } nextToken } }"
    ),
};

pub const CREATE_TODO: Operation = Operation {
    name: "CreateTodo",
    kind: OperationKind::Mutation,
    root_field: "createTodo",
    document: concat!(
        "mutation CreateTodo($input: CreateTodoInput!) { createTodo(input: $input) { ",
        todo_fields!(),
        " } }"
    ),
};

pub const UPDATE_TODO: Operation = Operation {
    name: "UpdateTodo",
    kind: OperationKind::Mutation,
    root_field: "updateTodo",
    document: concat!(
        "mutation UpdateTodo($input: UpdateTodoInput!) { updateTodo(input: $input) { ",
        todo_fields!(),
        " } }"
    ),
};

pub const DELETE_TODO: Operation = Operation {
    name: "DeleteTodo",
    kind: OperationKind::Mutation,
    root_field: "deleteTodo",
    document: concat!(
        "mutation DeleteTodo($input: DeleteTodoInput!) { deleteTodo(input: $input) { ",
        todo_fields!(),
        " } }"
    ),
};

pub const ON_CREATE_TODO: Operation = Operation {
    name: "OnCreateTodo",
    kind: OperationKind::Subscription,
    root_field: "onCreateTodo",
    document: concat!(
        "subscription OnCreateTodo { onCreateTodo { ",
        todo_fields!(),
        " } }"
    ),
};

pub const ON_UPDATE_TODO: Operation = Operation {
    name: "OnUpdateTodo",
    kind: OperationKind::Subscription,
    root_field: "onUpdateTodo",
    document: concat!(
        "subscription OnUpdateTodo { onUpdateTodo { ",
        todo_fields!(),
        " } }"
    ),
};

pub const ON_DELETE_TODO: Operation = Operation {
    name: "OnDeleteTodo",
    kind: OperationKind::Subscription,
    root_field: "onDeleteTodo",
    document: concat!(
        "subscription OnDeleteTodo { onDeleteTodo { ",
        todo_fields!(),
        " } }"
    ),
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoInput {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub completed: bool,
}

/// Every field except `id` is optional so toggle can send `{id, completed}` only.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoInput {
    pub id: TodoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// `Some(None)` clears the due date, `None` leaves it untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteTodoInput {
    pub id: TodoId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub operation_name: &'a str,
    pub variables: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoConnection {
    #[serde(default)]
    pub items: Vec<Todo>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Payload of `onDeleteTodo`; only the identifier is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedTodo {
    pub id: TodoId,
}

/// Client frames of the `graphql-transport-ws` sub-protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    ConnectionInit {
        payload: serde_json::Value,
    },
    Subscribe {
        id: String,
        payload: SubscribePayload,
    },
    Complete {
        id: String,
    },
    Pong,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    pub query: String,
    pub operation_name: String,
    pub variables: serde_json::Value,
}

/// Server frames of the `graphql-transport-ws` sub-protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    ConnectionAck,
    Ping,
    Pong,
    Next {
        id: String,
        payload: GraphqlResponse,
    },
    Error {
        id: String,
        payload: Vec<GraphqlError>,
    },
    Complete {
        id: String,
    },
}

pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-transport-ws";

/// Sub-protocol spoken by the AppSync realtime endpoint.
pub const APPSYNC_WS_PROTOCOL: &str = "graphql-ws";

/// Client frames of the AppSync realtime protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppSyncClientMessage {
    ConnectionInit,
    Start {
        id: String,
        payload: AppSyncStartPayload,
    },
    Stop {
        id: String,
    },
}

/// `data` is the GraphQL request serialized to a string; `extensions`
/// repeats the connection's authorization header.
#[derive(Debug, Clone, Serialize)]
pub struct AppSyncStartPayload {
    pub data: String,
    pub extensions: AppSyncExtensions,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppSyncExtensions {
    pub authorization: AppSyncAuthorization,
}

/// Cognito user-pool authorization header: the API host plus the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSyncAuthorization {
    pub host: String,
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

/// Server frames of the AppSync realtime protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppSyncServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: AppSyncAckPayload,
    },
    ConnectionError {
        #[serde(default)]
        payload: AppSyncErrorPayload,
    },
    Ka,
    StartAck {
        id: String,
    },
    Data {
        id: String,
        payload: GraphqlResponse,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: AppSyncErrorPayload,
    },
    Complete {
        id: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSyncAckPayload {
    #[serde(default)]
    pub connection_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSyncErrorPayload {
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

/// Serializes an instant the way the API expects `AWSDateTime` values.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn toggle_input_serializes_only_id_and_completed() {
        let input = UpdateTodoInput {
            id: TodoId::new("t-1"),
            completed: Some(true),
            ..UpdateTodoInput::default()
        };
        let value = serde_json::to_value(&input).expect("serialize");
        assert_eq!(value, serde_json::json!({ "id": "t-1", "completed": true }));
    }

    #[test]
    fn update_input_can_clear_due_date() {
        let input = UpdateTodoInput {
            id: TodoId::new("t-1"),
            due_date: Some(None),
            ..UpdateTodoInput::default()
        };
        let value = serde_json::to_value(&input).expect("serialize");
        assert_eq!(value, serde_json::json!({ "id": "t-1", "dueDate": null }));
    }

    #[test]
    fn todo_deserializes_with_defaults_and_soft_delete_marker() {
        let todo: Todo = serde_json::from_value(serde_json::json!({
            "id": "t-9",
            "title": "Buy milk",
            "createdAt": "2025-07-01T09:00:00.000Z",
            "_deleted": true
        }))
        .expect("todo");
        assert_eq!(todo.priority, Priority::Medium);
        assert!(!todo.completed);
        assert!(todo.is_soft_deleted());
        assert_eq!(todo.due_date, None);
    }

    #[test]
    fn server_frames_parse_by_type_tag() {
        let frame: WsServerMessage = serde_json::from_str(
            r#"{"type":"next","id":"abc","payload":{"data":{"onDeleteTodo":{"id":"t-1"}}}}"#,
        )
        .expect("frame");
        match frame {
            WsServerMessage::Next { id, payload } => {
                assert_eq!(id, "abc");
                assert!(payload.errors.is_empty());
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn appsync_frames_use_the_realtime_type_tags() {
        let start = AppSyncClientMessage::Start {
            id: "sub-1".to_string(),
            payload: AppSyncStartPayload {
                data: "{}".to_string(),
                extensions: AppSyncExtensions {
                    authorization: AppSyncAuthorization {
                        host: "abc.appsync-api.eu-west-1.amazonaws.com".to_string(),
                        authorization: "jwt".to_string(),
                    },
                },
            },
        };
        let value = serde_json::to_value(&start).expect("serialize");
        assert_eq!(value["type"], "start");
        assert_eq!(value["payload"]["extensions"]["authorization"]["Authorization"], "jwt");

        let ack: AppSyncServerMessage = serde_json::from_str(
            r#"{"type":"connection_ack","payload":{"connectionTimeoutMs":300000}}"#,
        )
        .expect("ack");
        assert!(matches!(
            ack,
            AppSyncServerMessage::ConnectionAck {
                payload: AppSyncAckPayload {
                    connection_timeout_ms: Some(300_000)
                }
            }
        ));

        let error: AppSyncServerMessage = serde_json::from_str(
            r#"{"type":"error","id":"sub-1","payload":{"errors":[{"errorType":"UnauthorizedException","message":"Permission denied"}]}}"#,
        )
        .expect("error");
        match error {
            AppSyncServerMessage::Error { id, payload } => {
                assert_eq!(id.as_deref(), Some("sub-1"));
                assert_eq!(payload.errors[0].message, "Permission denied");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn formats_instants_with_millis_and_zulu() {
        let instant = Utc.with_ymd_and_hms(2025, 7, 3, 1, 54, 0).unwrap();
        assert_eq!(format_instant(instant), "2025-07-03T01:54:00.000Z");
    }
}
