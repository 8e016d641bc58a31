//! gRPC AuthService implementation.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use super::auth::auth_service_server::AuthService;
use super::auth::{
    Account, CreateJwtTokenReply, CreateJwtTokenRequest, ValidateUserReply, ValidateUserRequest,
};
use super::people::STATUS_OK;
use crate::auth::UserValidator;
use crate::grpc::people::AccountDetails;

const VERIFIED_MESSAGE: &str = "User verified.";

pub struct AuthServiceImpl {
    validator: Arc<UserValidator>,
}

impl AuthServiceImpl {
    pub fn new(validator: Arc<UserValidator>) -> Self {
        Self { validator }
    }
}

impl From<AccountDetails> for Account {
    fn from(a: AccountDetails) -> Self {
        Self {
            id: a.id,
            account_type: a.account_type,
            user_name: a.user_name,
            first_name: a.first_name,
            last_name: a.last_name,
            email: a.email,
            recovery_email: a.recovery_email,
        }
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    #[instrument(skip(self, request), fields(token_len = request.get_ref().token.len()))]
    async fn validate_user(
        &self,
        request: Request<ValidateUserRequest>,
    ) -> Result<Response<ValidateUserReply>, Status> {
        let req = request.into_inner();

        let account = self
            .validator
            .validate(&req.token, req.profile_id, req.is_profile_validate)
            .await?;

        Ok(Response::new(ValidateUserReply {
            data: Some(account.into()),
            status: STATUS_OK,
            message: VERIFIED_MESSAGE.to_string(),
        }))
    }

    #[instrument(skip(self, request), fields(account_id = request.get_ref().account_id))]
    async fn create_jwt_token(
        &self,
        request: Request<CreateJwtTokenRequest>,
    ) -> Result<Response<CreateJwtTokenReply>, Status> {
        let issued = self
            .validator
            .create_jwt_token(request.into_inner().account_id)?;
        debug!(expires_at = %issued.expires_at, "Token issued");

        Ok(Response::new(CreateJwtTokenReply {
            token: issued.value,
            status: STATUS_OK,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::error::UpstreamError;
    use crate::grpc::people::{AuthenticatedAccount, Credentials, PeopleService};
    use async_trait::async_trait;

    const KEY: &str = "grpc-unit-test-key";

    struct StaticPeople;

    #[async_trait]
    impl PeopleService for StaticPeople {
        async fn get_account_details(&self, id: i32) -> Result<AccountDetails, UpstreamError> {
            Ok(AccountDetails {
                id,
                account_type: 2,
                user_name: "grace".into(),
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@example.com".into(),
                recovery_email: "g@example.org".into(),
            })
        }

        async fn validate_profile(&self, profile_id: i32, _: i32) -> Result<(), UpstreamError> {
            if profile_id == 3 {
                Ok(())
            } else {
                Err(UpstreamError::ProfileInvalid)
            }
        }

        async fn auth_account(&self, _: Credentials) -> Result<AuthenticatedAccount, UpstreamError> {
            Err(UpstreamError::AuthenticationFailed("unsupported".into()))
        }
    }

    fn service() -> AuthServiceImpl {
        let tokens = Arc::new(TokenService::new(KEY, 24));
        AuthServiceImpl::new(Arc::new(UserValidator::new(tokens, Arc::new(StaticPeople))))
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let svc = service();
        let reply = svc
            .create_jwt_token(Request::new(CreateJwtTokenRequest { account_id: 12 }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.status, 1);

        let reply = svc
            .validate_user(Request::new(ValidateUserRequest {
                token: reply.token,
                profile_id: 3,
                is_profile_validate: true,
            }))
            .await
            .unwrap()
            .into_inner();
        let account = reply.data.unwrap();
        assert_eq!(account.id, 12);
        assert_eq!(account.recovery_email, "g@example.org");
        assert_eq!(reply.status, 1);
        assert_eq!(reply.message, "User verified.");
    }

    #[tokio::test]
    async fn test_errors_map_to_status_codes() {
        let svc = service();

        let status = svc
            .validate_user(Request::new(ValidateUserRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "token is not present");

        let status = svc
            .validate_user(Request::new(ValidateUserRequest {
                token: "bad.jwt".into(),
                profile_id: 1,
                is_profile_validate: false,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let token = TokenService::new(KEY, 24).create_token(12, 1).unwrap().value;
        let status = svc
            .validate_user(Request::new(ValidateUserRequest {
                token,
                profile_id: 4,
                is_profile_validate: true,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }
}
