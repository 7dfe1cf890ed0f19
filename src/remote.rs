use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::auth::{AuthResponse, User, UserPatch};
use crate::campaign::{CampaignId, CampaignRequest};
use crate::error::Error;
use crate::payment::PaymentMethod;

/// Data that either came from the backend or was substituted because the
/// backend could not be reached.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "source", content = "data", rename_all = "kebab-case")]
pub enum Sourced<T> {
    Remote(T),
    Mock(T),
}

impl<T> Sourced<T> {
    pub fn is_mock(&self) -> bool {
        matches!(self, Sourced::Mock(_))
    }

    pub fn as_inner(&self) -> &T {
        match self {
            Sourced::Remote(value) => value,
            Sourced::Mock(value) => value,
        }
    }

    pub fn as_inner_mut(&mut self) -> &mut T {
        match self {
            Sourced::Remote(value) => value,
            Sourced::Mock(value) => value,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Sourced<U> {
        match self {
            Sourced::Remote(value) => Sourced::Remote(f(value)),
            Sourced::Mock(value) => Sourced::Mock(f(value)),
        }
    }
}

/// Keeps a remote result, or produces the mock when the backend is
/// unavailable. Rejections from a reachable backend are passed through.
pub fn or_mock<T, F>(
    result: Result<T, Error>,
    operation: &str,
    mock: F,
) -> Result<Sourced<T>, Error>
where
    F: FnOnce() -> Result<T, Error>,
{
    match result {
        Ok(value) => Ok(Sourced::Remote(value)),
        Err(err) if err.is_backend_unavailable() => {
            warn!(error = %err, "{} failed, using mock data instead", operation);
            mock().map(Sourced::Mock)
        }
        Err(err) => Err(err),
    }
}

/// The response of the ad-generation backend's `executeQueries` call: one
/// entry per agent state it went through.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ApiResponse {
    pub responses: Vec<QueryResponse>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QueryResponse {
    pub state: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_criteria: Option<Map<String, Value>>,
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error>;

    async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse, Error>;

    async fn forgot_password(&self, email: &str) -> Result<(), Error>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error>;

    async fn current_user(&self, token: &str) -> Result<User, Error>;

    async fn update_profile(&self, token: &str, patch: &UserPatch) -> Result<User, Error>;

    async fn update_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error>;

    async fn execute_queries(&self, request: &CampaignRequest) -> Result<ApiResponse, Error>;

    async fn fetch_campaign_detail(&self, campaign_id: &CampaignId) -> Result<Value, Error>;

    async fn fetch_payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>, Error>;

    async fn add_payment_method(&self, token: &str, payment_method_id: &str)
        -> Result<(), Error>;

    async fn remove_payment_method(
        &self,
        token: &str,
        payment_method_id: &str,
    ) -> Result<(), Error>;

    async fn process_payment(
        &self,
        token: &str,
        campaign_id: &CampaignId,
        amount: f64,
    ) -> Result<(), Error>;
}

/// Talks to the auth/user/payment API at `api_url` and to the ad-generation
/// backend at `backend_url`.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: Client,
    api_url: String,
    backend_url: String,
}

impl HttpRemote {
    pub fn new(api_url: &str, backend_url: &str) -> HttpRemote {
        HttpRemote {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_owned(),
            backend_url: backend_url.trim_end_matches('/').to_owned(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn backend(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

async fn send(request: RequestBuilder) -> Result<(), Error> {
    request.send().await?.error_for_status()?;
    Ok(())
}

#[async_trait]
impl RemoteApi for HttpRemote {
    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let body = json!({ "email": email, "password": password });
        send_json(self.client.post(self.api("/auth/login")).json(&body)).await
    }

    #[tracing::instrument(skip(self, password))]
    async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse, Error> {
        let body = json!({ "email": email, "password": password, "fullName": full_name });
        send_json(self.client.post(self.api("/auth/register")).json(&body)).await
    }

    #[tracing::instrument(skip(self))]
    async fn forgot_password(&self, email: &str) -> Result<(), Error> {
        let body = json!({ "email": email });
        send(self.client.post(self.api("/auth/forgot-password")).json(&body)).await
    }

    #[tracing::instrument(skip(self, token, new_password))]
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
        let body = json!({ "token": token, "newPassword": new_password });
        send(self.client.post(self.api("/auth/reset-password")).json(&body)).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn current_user(&self, token: &str) -> Result<User, Error> {
        send_json(self.client.get(self.api("/auth/me")).bearer_auth(token)).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn update_profile(&self, token: &str, patch: &UserPatch) -> Result<User, Error> {
        let request = self
            .client
            .patch(self.api("/api/users/profile"))
            .bearer_auth(token)
            .json(patch);
        send_json(request).await
    }

    #[tracing::instrument(skip(self, token, current_password, new_password))]
    async fn update_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let body = json!({ "currentPassword": current_password, "newPassword": new_password });
        let request = self
            .client
            .post(self.api("/api/users/password"))
            .bearer_auth(token)
            .json(&body);
        send(request).await
    }

    #[tracing::instrument(skip(self))]
    async fn execute_queries(&self, request: &CampaignRequest) -> Result<ApiResponse, Error> {
        let request = self
            .client
            .post(self.backend("/api/executeQueries"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request);
        send_json(request).await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_detail(&self, campaign_id: &CampaignId) -> Result<Value, Error> {
        let url = self.backend(&format!("/api/campaigns/{}", campaign_id));
        send_json(self.client.get(url)).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn fetch_payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>, Error> {
        send_json(
            self.client
                .get(self.api("/api/payments/methods"))
                .bearer_auth(token),
        )
        .await
    }

    #[tracing::instrument(skip(self, token))]
    async fn add_payment_method(
        &self,
        token: &str,
        payment_method_id: &str,
    ) -> Result<(), Error> {
        let body = json!({ "paymentMethodId": payment_method_id });
        let request = self
            .client
            .post(self.api("/api/payments/methods"))
            .bearer_auth(token)
            .json(&body);
        send(request).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn remove_payment_method(
        &self,
        token: &str,
        payment_method_id: &str,
    ) -> Result<(), Error> {
        let url = self.api(&format!("/api/payments/methods/{}", payment_method_id));
        send(self.client.delete(url).bearer_auth(token)).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn process_payment(
        &self,
        token: &str,
        campaign_id: &CampaignId,
        amount: f64,
    ) -> Result<(), Error> {
        let body = json!({ "campaignId": campaign_id, "amount": amount });
        let request = self
            .client
            .post(self.api("/api/payments/process"))
            .bearer_auth(token)
            .json(&body);
        send(request).await
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    type Handler<A, T> = Box<dyn Fn(A) -> Result<T, Error> + Send + Sync>;

    fn unreachable<T>() -> Result<T, Error> {
        Err(Error::RemoteCallFailed {
            message: "connection refused".into(),
        })
    }

    /// Every call fails as if the backend were down unless a handler is set.
    pub struct MockRemote {
        pub on_login: Handler<(String, String), AuthResponse>,
        pub on_register: Handler<(String, String, String), AuthResponse>,
        pub on_forgot_password: Handler<String, ()>,
        pub on_reset_password: Handler<(String, String), ()>,
        pub on_current_user: Handler<String, User>,
        pub on_update_profile: Handler<UserPatch, User>,
        pub on_update_password: Handler<(String, String), ()>,
        pub on_execute_queries: Handler<CampaignRequest, ApiResponse>,
        pub on_fetch_campaign_detail: Handler<CampaignId, Value>,
        pub on_fetch_payment_methods: Handler<String, Vec<PaymentMethod>>,
        pub on_payment_mutation: Handler<String, ()>,
    }

    impl MockRemote {
        pub fn new() -> MockRemote {
            MockRemote {
                on_login: Box::new(|_| unreachable()),
                on_register: Box::new(|_| unreachable()),
                on_forgot_password: Box::new(|_| unreachable()),
                on_reset_password: Box::new(|_| unreachable()),
                on_current_user: Box::new(|_| unreachable()),
                on_update_profile: Box::new(|_| unreachable()),
                on_update_password: Box::new(|_| unreachable()),
                on_execute_queries: Box::new(|_| unreachable()),
                on_fetch_campaign_detail: Box::new(|_| unreachable()),
                on_fetch_payment_methods: Box::new(|_| unreachable()),
                on_payment_mutation: Box::new(|_| unreachable()),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for MockRemote {
        async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
            (self.on_login)((email.into(), password.into()))
        }

        async fn register(
            &self,
            email: &str,
            password: &str,
            full_name: &str,
        ) -> Result<AuthResponse, Error> {
            (self.on_register)((email.into(), password.into(), full_name.into()))
        }

        async fn forgot_password(&self, email: &str) -> Result<(), Error> {
            (self.on_forgot_password)(email.into())
        }

        async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
            (self.on_reset_password)((token.into(), new_password.into()))
        }

        async fn current_user(&self, token: &str) -> Result<User, Error> {
            (self.on_current_user)(token.into())
        }

        async fn update_profile(&self, _token: &str, patch: &UserPatch) -> Result<User, Error> {
            (self.on_update_profile)(patch.clone())
        }

        async fn update_password(
            &self,
            _token: &str,
            current_password: &str,
            new_password: &str,
        ) -> Result<(), Error> {
            (self.on_update_password)((current_password.into(), new_password.into()))
        }

        async fn execute_queries(&self, request: &CampaignRequest) -> Result<ApiResponse, Error> {
            (self.on_execute_queries)(request.clone())
        }

        async fn fetch_campaign_detail(&self, campaign_id: &CampaignId) -> Result<Value, Error> {
            (self.on_fetch_campaign_detail)(campaign_id.clone())
        }

        async fn fetch_payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>, Error> {
            (self.on_fetch_payment_methods)(token.into())
        }

        async fn add_payment_method(
            &self,
            _token: &str,
            payment_method_id: &str,
        ) -> Result<(), Error> {
            (self.on_payment_mutation)(payment_method_id.into())
        }

        async fn remove_payment_method(
            &self,
            _token: &str,
            payment_method_id: &str,
        ) -> Result<(), Error> {
            (self.on_payment_mutation)(payment_method_id.into())
        }

        async fn process_payment(
            &self,
            _token: &str,
            campaign_id: &CampaignId,
            _amount: f64,
        ) -> Result<(), Error> {
            (self.on_payment_mutation)(campaign_id.to_string())
        }
    }

    #[test]
    fn or_mock_only_substitutes_when_backend_is_unavailable() {
        let fallback = or_mock(unreachable::<u32>(), "test", || Ok(7)).unwrap();
        assert_eq!(fallback, Sourced::Mock(7));

        let remote = or_mock(Ok(3), "test", || Ok(7)).unwrap();
        assert_eq!(remote, Sourced::Remote(3));

        let rejected = or_mock::<u32, _>(Err(Error::RemoteRejected { status: 401 }), "test", || {
            Ok(7)
        });
        assert_eq!(rejected.unwrap_err(), Error::RemoteRejected { status: 401 });
    }

    /// Serves a single `200 OK` carrying `body` and returns the base url.
    async fn answer_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n", body.len());
            socket.write_all(head.as_bytes()).await.unwrap();
            socket
                .write_all(b"content-type: application/json\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
        });

        url
    }

    #[tokio::test]
    async fn unexpected_response_shape_does_not_fall_back_to_mock() {
        let url = answer_once(r#"{"unexpected":1}"#).await;
        let remote = HttpRemote::new(&url, &url);

        let result = remote.login("demo@example.com", "password123").await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::InvalidRemoteResponse { .. }));
        assert!(!err.is_backend_unavailable());
        let outcome = or_mock(Err::<u32, _>(err), "login", || Ok(7));
        assert!(outcome.is_err());
    }

    #[test]
    fn sourced_serializes_with_source_tag() {
        let value = serde_json::to_value(Sourced::Mock(1)).unwrap();
        assert_eq!(value, json!({ "source": "mock", "data": 1 }));
    }
}
