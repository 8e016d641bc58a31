//! Client side of the People service.

use async_trait::async_trait;
use serde::Serialize;
use tonic::codegen::http::uri::InvalidUri;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::error::UpstreamError;
use proto::account_service_client::AccountServiceClient;
use proto::{AccountDetailRequest, CredentialsRequest, ValidateProfileRequest};

/// Generated People service types.
pub mod proto {
    tonic::include_proto!("sidekiq.people.v1");
}

/// Reply status the People service uses for success.
pub const STATUS_OK: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub id: i32,
    pub account_type: i32,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub recovery_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub id: i32,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub user_name: String,
    pub password: String,
}

/// Account lookups the auth service needs from the People service.
#[async_trait]
pub trait PeopleService: Send + Sync {
    async fn get_account_details(&self, account_id: i32) -> Result<AccountDetails, UpstreamError>;

    /// Succeeds only when `profile_id` belongs to `account_id`.
    async fn validate_profile(&self, profile_id: i32, account_id: i32)
        -> Result<(), UpstreamError>;

    async fn auth_account(
        &self,
        credentials: Credentials,
    ) -> Result<AuthenticatedAccount, UpstreamError>;
}

#[derive(Clone)]
pub struct GrpcPeopleClient {
    client: AccountServiceClient<Channel>,
}

impl GrpcPeopleClient {
    /// The channel connects on first use.
    pub fn connect_lazy(url: &str) -> Result<Self, InvalidUri> {
        let channel = Endpoint::from(tonic::codegen::http::Uri::try_from(url.to_string())?).connect_lazy();
        Ok(Self {
            client: AccountServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl PeopleService for GrpcPeopleClient {
    #[instrument(skip(self))]
    async fn get_account_details(&self, account_id: i32) -> Result<AccountDetails, UpstreamError> {
        let reply = self
            .client
            .clone()
            .get_account_details(Request::new(AccountDetailRequest { account_id }))
            .await
            .map_err(|s| UpstreamError::AccountFetchFailed(s.message().to_string()))?
            .into_inner();

        let account = reply
            .data
            .ok_or_else(|| UpstreamError::AccountFetchFailed(reply.message.clone()))?;
        debug!(account_id, "Fetched account details");

        Ok(AccountDetails {
            id: account.id,
            account_type: account.account_type,
            user_name: account.user_name,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            recovery_email: account.recovery_email,
        })
    }

    #[instrument(skip(self))]
    async fn validate_profile(
        &self,
        profile_id: i32,
        account_id: i32,
    ) -> Result<(), UpstreamError> {
        let reply = self
            .client
            .clone()
            .validate_profile(Request::new(ValidateProfileRequest {
                profile_id,
                account_id,
            }))
            .await
            .map_err(|s| UpstreamError::ProfileValidationFailed(s.message().to_string()))?
            .into_inner();

        if reply.status != STATUS_OK {
            debug!(status = reply.status, message = %reply.message, "Profile rejected");
            return Err(UpstreamError::ProfileInvalid);
        }
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn auth_account(
        &self,
        credentials: Credentials,
    ) -> Result<AuthenticatedAccount, UpstreamError> {
        let reply = self
            .client
            .clone()
            .auth_account(Request::new(CredentialsRequest {
                email: credentials.email,
                user_name: credentials.user_name,
                password: credentials.password,
            }))
            .await
            .map_err(|s| UpstreamError::AuthenticationFailed(s.message().to_string()))?
            .into_inner();

        Ok(AuthenticatedAccount {
            id: reply.id,
            email: reply.email,
        })
    }
}
