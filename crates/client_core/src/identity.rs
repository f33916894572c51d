//! Session accessor for the hosted user directory.
//!
//! Credential storage and refresh belong to the directory service; this
//! module only keeps the tokens of the current sign-in in memory.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::domain::{Principal, SignInDetails};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
const PASSWORD_AUTH_FLOW: &str = "USER_PASSWORD_AUTH";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{kind}: {message}")]
    Rejected { kind: String, message: String },
    #[error("identity service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity service returned an unexpected response: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub confirmed: bool,
    pub user_id: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_principal(&self) -> Result<Principal, IdentityError>;
    async fn access_token(&self) -> Result<String, IdentityError>;
    async fn sign_in(&self, username: &str, password: &str) -> Result<Principal, IdentityError>;
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, IdentityError>;
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdentityError>;
    /// Always forgets the local session, even when the remote call fails.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

struct IdentitySession {
    principal: Principal,
    access_token: String,
}

pub struct HostedIdentityClient {
    http: Client,
    endpoint: Url,
    client_id: String,
    session: RwLock<Option<IdentitySession>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: PasswordAuthParameters<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct PasswordAuthParameters<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserAttribute {
    name: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<UserAttribute>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpBody<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: Vec<UserAttribute>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    #[serde(default)]
    user_sub: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpBody<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
struct ServiceFault {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

impl HostedIdentityClient {
    pub fn new(endpoint: Url, client_id: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            client_id: client_id.into(),
            session: RwLock::new(None),
        }
    }

    /// Default regional endpoint of the user-pool API.
    pub fn regional_endpoint(region: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://cognito-idp.{region}.amazonaws.com/"))
    }

    async fn call<B, R>(&self, action: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let res = self
            .http
            .post(self.endpoint.clone())
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(CONTENT_TYPE, AMZ_JSON)
            .json(body)
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|err| IdentityError::Unexpected(format!("{action}: {err}")));
        }

        match serde_json::from_slice::<ServiceFault>(&bytes) {
            Ok(fault) => Err(IdentityError::Rejected {
                kind: fault_kind(&fault.kind).to_string(),
                message: fault.message,
            }),
            Err(_) => Err(IdentityError::Unexpected(format!(
                "{action}: HTTP {}",
                status.as_u16()
            ))),
        }
    }
}

fn fault_kind(raw: &str) -> &str {
    raw.rsplit('#').next().unwrap_or(raw)
}

#[async_trait]
impl IdentityProvider for HostedIdentityClient {
    async fn current_principal(&self) -> Result<Principal, IdentityError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.principal.clone())
            .ok_or(IdentityError::NotAuthenticated)
    }

    async fn access_token(&self) -> Result<String, IdentityError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .ok_or(IdentityError::NotAuthenticated)
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<Principal, IdentityError> {
        let auth: InitiateAuthResponse = self
            .call(
                "InitiateAuth",
                &InitiateAuthRequest {
                    auth_flow: PASSWORD_AUTH_FLOW,
                    client_id: &self.client_id,
                    auth_parameters: PasswordAuthParameters { username, password },
                },
            )
            .await?;
        let result = match (auth.authentication_result, auth.challenge_name) {
            (Some(result), _) => result,
            (None, Some(challenge)) => {
                return Err(IdentityError::Rejected {
                    kind: "ChallengeRequired".to_string(),
                    message: format!("additional sign-in step required: {challenge}"),
                })
            }
            (None, None) => {
                return Err(IdentityError::Unexpected(
                    "InitiateAuth: missing authentication result".to_string(),
                ))
            }
        };

        let user: GetUserResponse = self
            .call(
                "GetUser",
                &AccessTokenRequest {
                    access_token: &result.access_token,
                },
            )
            .await?;
        let user_id = user
            .user_attributes
            .iter()
            .find(|attr| attr.name == "sub")
            .map(|attr| attr.value.clone())
            .unwrap_or_else(|| user.username.clone());
        let principal = Principal {
            username: user.username,
            user_id,
            sign_in_details: Some(SignInDetails {
                login_id: Some(username.to_string()),
                auth_flow_type: Some(PASSWORD_AUTH_FLOW.to_string()),
            }),
        };

        *self.session.write().await = Some(IdentitySession {
            principal: principal.clone(),
            access_token: result.access_token,
        });
        info!(username = %principal.username, "signed in");
        Ok(principal)
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        let response: SignUpResponse = self
            .call(
                "SignUp",
                &SignUpBody {
                    client_id: &self.client_id,
                    username: &request.username,
                    password: &request.password,
                    user_attributes: vec![UserAttribute {
                        name: "email".to_string(),
                        value: request.email.clone(),
                    }],
                },
            )
            .await?;
        info!(
            username = %request.username,
            confirmed = response.user_confirmed,
            "signed up"
        );
        Ok(SignUpOutcome {
            confirmed: response.user_confirmed,
            user_id: response.user_sub,
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        let _: Empty = self
            .call(
                "ConfirmSignUp",
                &ConfirmSignUpBody {
                    client_id: &self.client_id,
                    username,
                    confirmation_code: code,
                },
            )
            .await?;
        info!(username, "sign-up confirmed");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let result: Result<Empty, IdentityError> = self
            .call(
                "GlobalSignOut",
                &AccessTokenRequest {
                    access_token: &session.access_token,
                },
            )
            .await;
        match result {
            Ok(_) => {
                info!(username = %session.principal.username, "signed out");
                Ok(())
            }
            Err(err) => {
                warn!(username = %session.principal.username, "remote sign-out failed: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
