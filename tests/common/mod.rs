//! Shared setup for integration tests: an in-process server backed by an
//! in-memory board store and a scripted People service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server as TonicServer;

use sidekiq_auth::{
    boards::{Board, BoardArena, BoardId, BoardRepository, ProfileId},
    create_router,
    error::UpstreamError,
    grpc::{
        auth::{auth_service_client::AuthServiceClient, auth_service_server::AuthServiceServer},
        people::{AccountDetails, AuthenticatedAccount, Credentials, PeopleService},
        AuthServiceImpl,
    },
    AppState, Config,
};

pub const PASSWORD: &str = "correct horse battery staple";

pub fn board_id(n: u8) -> BoardId {
    BoardId::from_bytes([n; 12])
}

pub fn account(id: i32) -> AccountDetails {
    AccountDetails {
        id,
        account_type: 1,
        user_name: format!("user{id}"),
        first_name: "Test".to_string(),
        last_name: format!("User{id}"),
        email: format!("user{id}@example.com"),
        recovery_email: String::new(),
    }
}

/// People service stand-in. Profiles map to the account that owns them.
#[derive(Default)]
pub struct FakePeople {
    pub accounts: HashMap<i32, AccountDetails>,
    pub profiles: HashMap<i32, i32>,
    pub account_delay: Option<Duration>,
    pub profile_delay: Option<Duration>,
    pub account_calls: AtomicU32,
    pub profile_calls: AtomicU32,
}

impl FakePeople {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, id: i32, profiles: &[i32]) -> Self {
        self.accounts.insert(id, account(id));
        for profile in profiles {
            self.profiles.insert(*profile, id);
        }
        self
    }

    pub fn with_account_delay(mut self, delay: Duration) -> Self {
        self.account_delay = Some(delay);
        self
    }

    pub fn with_profile_delay(mut self, delay: Duration) -> Self {
        self.profile_delay = Some(delay);
        self
    }
}

#[async_trait]
impl PeopleService for FakePeople {
    async fn get_account_details(&self, account_id: i32) -> Result<AccountDetails, UpstreamError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.account_delay {
            tokio::time::sleep(delay).await;
        }
        self.accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| UpstreamError::AccountFetchFailed("account not found".to_string()))
    }

    async fn validate_profile(
        &self,
        profile_id: i32,
        account_id: i32,
    ) -> Result<(), UpstreamError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.profile_delay {
            tokio::time::sleep(delay).await;
        }
        match self.profiles.get(&profile_id) {
            Some(owner) if *owner == account_id => Ok(()),
            _ => Err(UpstreamError::ProfileInvalid),
        }
    }

    async fn auth_account(
        &self,
        credentials: Credentials,
    ) -> Result<AuthenticatedAccount, UpstreamError> {
        if credentials.password != PASSWORD {
            return Err(UpstreamError::AuthenticationFailed(
                "invalid credentials".to_string(),
            ));
        }
        self.accounts
            .values()
            .find(|a| a.email == credentials.email || a.user_name == credentials.user_name)
            .map(|a| AuthenticatedAccount {
                id: a.id,
                email: a.email.clone(),
            })
            .ok_or_else(|| UpstreamError::AuthenticationFailed("unknown account".to_string()))
    }
}

pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub state: AppState,
    pub people: Arc<FakePeople>,
    pub config: Config,
}

impl TestApp {
    pub async fn spawn(people: FakePeople, boards: Vec<Board>) -> Self {
        Self::spawn_with(Config::default_for_testing(), people, boards).await
    }

    /// Serves the HTTP router on an ephemeral port.
    pub async fn spawn_with(config: Config, people: FakePeople, boards: Vec<Board>) -> Self {
        let people = Arc::new(people);
        let boards: Arc<dyn BoardRepository> = Arc::new(BoardArena::with_boards(boards));
        let state = AppState::new(&config, people.clone(), boards, None);
        let app = create_router(state.clone(), &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .expect("Test server failed");
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            state,
            people,
            config,
        }
    }

    /// Serves the gRPC AuthService next to the HTTP router and connects a client.
    pub async fn grpc_client(&self) -> AuthServiceClient<tonic::transport::Channel> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind gRPC test server");
        let addr = listener.local_addr().expect("Failed to read local address");
        let service = AuthServiceImpl::new(self.state.validator.clone());

        tokio::spawn(async move {
            TonicServer::builder()
                .add_service(AuthServiceServer::new(service))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .expect("gRPC test server failed");
        });

        AuthServiceClient::connect(format!("http://{addr}"))
            .await
            .expect("Failed to connect gRPC client")
    }

    pub fn token_for(&self, account_id: i32) -> String {
        self.state
            .tokens
            .create_token(i64::from(account_id), 1)
            .expect("Failed to sign token")
            .value
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.jwt.cookie_name
    }

    pub async fn get_as(&self, path: &str, token: &str, profile: i32) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("Profile", profile.to_string())
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post_as(
        &self,
        path: &str,
        token: &str,
        profile: i32,
        body: Value,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("Profile", profile.to_string())
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    pub async fn put_as(
        &self,
        path: &str,
        token: &str,
        profile: i32,
        body: Value,
    ) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("Profile", profile.to_string())
            .json(&body)
            .send()
            .await
            .expect("Failed to send PUT request")
    }

    pub async fn delete_as(&self, path: &str, token: &str, profile: i32) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("Profile", profile.to_string())
            .send()
            .await
            .expect("Failed to send DELETE request")
    }

    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post_public(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    pub async fn cached_permissions(&self, profile: i64) -> Option<String> {
        self.state
            .permissions
            .get(&sidekiq_auth::cache::PermissionCache::key_for(ProfileId(profile)))
            .await
            .expect("Failed to read permission cache")
    }
}
