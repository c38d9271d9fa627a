//! Cloud account client
//!
//! The vendor app authenticates against an AWS Cognito user pool and then
//! calls a "manage thing" endpoint that lists the account's devices.

use async_trait::async_trait;
use daikinbr_config::Settings;
use daikinbr_core::Thing;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CloudError, CloudResult};
use crate::things::parse_things;

/// Cognito region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Source of the account's things
#[async_trait]
pub trait CloudAccount: Send + Sync {
    /// Fetch every thing registered in the account
    async fn fetch_things(&self) -> CloudResult<Vec<Thing>>;
}

/// Connection settings for the vendor cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub email: String,
    pub password: String,
    pub region: String,
    /// Cognito app client id of the vendor app
    pub client_id: String,
    pub manage_thing_url: String,
    /// Overrides the regional Cognito endpoint
    pub cognito_url: Option<String>,
}

/// Environment variables a cloud refresh cannot do without
pub const REQUIRED_SETTINGS: [&str; 4] = [
    "DAIKINBR_CONFIG_ACCOUNT_EMAIL",
    "DAIKINBR_CONFIG_ACCOUNT_PASSWORD",
    "DAIKINBR_CLOUD_CLIENT_ID",
    "DAIKINBR_CLOUD_MANAGE_THING_URL",
];

impl CloudSettings {
    /// Build cloud settings from the bridge settings
    ///
    /// Email, password, client id and manage-thing URL are required.
    pub fn from_settings(settings: &Settings) -> CloudResult<Self> {
        let required = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or(CloudError::MissingSetting(name))
        };

        Ok(Self {
            email: required(&settings.account_email, REQUIRED_SETTINGS[0])?,
            password: required(&settings.account_password, REQUIRED_SETTINGS[1])?,
            region: settings
                .cloud_region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            client_id: required(&settings.cloud_client_id, REQUIRED_SETTINGS[2])?,
            manage_thing_url: required(&settings.cloud_manage_thing_url, REQUIRED_SETTINGS[3])?,
            cognito_url: None,
        })
    }

    /// Cognito identity provider endpoint
    pub fn cognito_endpoint(&self) -> String {
        self.cognito_url
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

/// Tokens of an authenticated account
#[derive(Clone)]
pub struct AccountSession {
    pub username: String,
    pub access_token: String,
    pub id_token: String,
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct AuthParameters<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
}

#[derive(Serialize)]
struct ManageThingRequest<'a> {
    username: &'a str,
    access_token: &'a str,
}

/// Client of the Daikin Smart AC (Brazil) cloud, operated by IoTalabs
pub struct IotalabsAccount {
    http: Client,
    settings: CloudSettings,
}

impl IotalabsAccount {
    /// Create a client for the given account
    pub fn new(settings: CloudSettings) -> CloudResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, settings })
    }

    /// Sign in with the account's email and password
    pub async fn authenticate(&self) -> CloudResult<AccountSession> {
        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.settings.client_id,
            auth_parameters: AuthParameters {
                username: &self.settings.email,
                password: &self.settings.password,
            },
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| CloudError::MalformedResponse(e.to_string()))?;

        let response = self
            .http
            .post(self.settings.cognito_endpoint())
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(CloudError::AuthenticationFailed {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(CloudError::InvalidResponse {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let parsed: InitiateAuthResponse = decode(&bytes)?;
        let result = parsed.authentication_result.ok_or_else(|| {
            CloudError::MalformedResponse("authentication challenge is not supported".to_string())
        })?;

        debug!("Authenticated cloud account");
        Ok(AccountSession {
            username: self.settings.email.clone(),
            access_token: result.access_token,
            id_token: result.id_token,
        })
    }

    /// Call the manage-thing endpoint and return its raw JSON
    pub async fn manage_thing(&self, session: &AccountSession) -> CloudResult<Value> {
        let response = self
            .http
            .post(&self.settings.manage_thing_url)
            .header(header::AUTHORIZATION, &session.id_token)
            .json(&ManageThingRequest {
                username: &session.username,
                access_token: &session.access_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CloudError::InvalidResponse {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        decode(&bytes)
    }
}

#[async_trait]
impl CloudAccount for IotalabsAccount {
    async fn fetch_things(&self) -> CloudResult<Vec<Thing>> {
        info!("Getting things from the cloud account");
        let session = self.authenticate().await?;
        let raw = self.manage_thing(&session).await?;
        let things = parse_things(&raw);
        debug!(count = things.len(), "Fetched things");
        Ok(things)
    }
}

/// Decode JSON without echoing the payload into the error
fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CloudResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        CloudError::MalformedResponse(format!(
            "invalid JSON at line {} column {}",
            e.line(),
            e.column()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings(base: &str) -> CloudSettings {
        CloudSettings {
            email: "me@example.com".to_string(),
            password: "hunter2".to_string(),
            region: DEFAULT_REGION.to_string(),
            client_id: "client-id".to_string(),
            manage_thing_url: format!("{}/things", base),
            cognito_url: Some(format!("{}/cognito", base)),
        }
    }

    async fn cognito(headers: HeaderMap, body: String) -> (AxumStatus, String) {
        let request: Value = serde_json::from_str(&body).unwrap();
        let target = headers
            .get("X-Amz-Target")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if target != INITIATE_AUTH_TARGET
            || request["AuthFlow"] != "USER_PASSWORD_AUTH"
            || request["ClientId"] != "client-id"
            || request["AuthParameters"]["USERNAME"] != "me@example.com"
        {
            return (AxumStatus::BAD_REQUEST, "{}".to_string());
        }
        if request["AuthParameters"]["PASSWORD"] != "hunter2" {
            return (
                AxumStatus::BAD_REQUEST,
                json!({"__type": "NotAuthorizedException"}).to_string(),
            );
        }
        (
            AxumStatus::OK,
            json!({"AuthenticationResult": {"AccessToken": "access", "IdToken": "id"}})
                .to_string(),
        )
    }

    async fn things(headers: HeaderMap, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        let authorized = headers
            .get(header::AUTHORIZATION.as_str())
            .and_then(|v| v.to_str().ok())
            == Some("id");
        if !authorized || body["access_token"] != "access" {
            return (AxumStatus::FORBIDDEN, Json(json!({"email": "me@example.com"})));
        }
        (
            AxumStatus::OK,
            Json(json!({
                "json_response": {"things": [{
                    "thing_id": "th-1",
                    "thing_metadata": {
                        "thing_name": "Bedroom",
                        "thing_apn": "DAIKIN797BA0",
                        "thing_secret_key": "c2VjcmV0\n",
                        "thing_feature_data": "HEAT_PUMP"
                    }
                }]}
            })),
        )
    }

    fn app() -> Router {
        Router::new()
            .route("/cognito", post(cognito))
            .route("/things", post(things))
    }

    #[tokio::test]
    async fn test_fetch_things() {
        let base = serve(app()).await;
        let account = IotalabsAccount::new(settings(&base)).unwrap();

        let things = account.fetch_things().await.unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].id, "th-1");
        assert_eq!(things[0].secret_key, "c2VjcmV0");
        assert!(things[0].heat);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let base = serve(app()).await;
        let mut settings = settings(&base);
        settings.password = "wrong".to_string();
        let account = IotalabsAccount::new(settings).unwrap();

        let result = account.fetch_things().await;
        assert!(matches!(
            result,
            Err(CloudError::AuthenticationFailed { status: 400 })
        ));
    }

    #[tokio::test]
    async fn test_rejected_manage_thing_hides_body() {
        let base = serve(app()).await;
        let account = IotalabsAccount::new(settings(&base)).unwrap();
        let session = AccountSession {
            username: "me@example.com".to_string(),
            access_token: "stale".to_string(),
            id_token: "id".to_string(),
        };

        let err = account.manage_thing(&session).await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidResponse { status: 403 }));
        assert!(!err.to_string().contains("example.com"));
    }

    #[test]
    fn test_settings_require_credentials() {
        let settings = Settings {
            account_email: Some("me@example.com".to_string()),
            cloud_client_id: Some("client".to_string()),
            cloud_manage_thing_url: Some("https://example.invalid/things".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CloudSettings::from_settings(&settings),
            Err(CloudError::MissingSetting("DAIKINBR_CONFIG_ACCOUNT_PASSWORD"))
        ));

        let settings = Settings {
            account_password: Some("pw".to_string()),
            ..settings
        };
        let cloud = CloudSettings::from_settings(&settings).unwrap();
        assert_eq!(cloud.region, DEFAULT_REGION);
        assert_eq!(
            cloud.cognito_endpoint(),
            "https://cognito-idp.us-east-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let session = AccountSession {
            username: "me".to_string(),
            access_token: "secret-access".to_string(),
            id_token: "secret-id".to_string(),
        };
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret"));
    }
}
