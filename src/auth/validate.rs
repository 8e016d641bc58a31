//! Session validation against the People service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::jwt::{IssuedToken, TokenService};
use crate::error::{AuthError, AuthResult, TokenError, UpstreamCall, UpstreamError, ValidationError};
use crate::grpc::people::{AccountDetails, AuthenticatedAccount, Credentials, PeopleService};
use crate::telemetry::metrics::{record_validate_outcome, ValidateOutcome};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UserValidator {
    tokens: Arc<TokenService>,
    people: Arc<dyn PeopleService>,
    call_timeout: Duration,
}

fn outcome_of(result: &AuthResult<AccountDetails>) -> ValidateOutcome {
    match result {
        Ok(_) => ValidateOutcome::Success,
        Err(AuthError::Validation(ValidationError::MissingToken)) => ValidateOutcome::MissingToken,
        Err(AuthError::Validation(ValidationError::MissingProfile)) => {
            ValidateOutcome::MissingProfile
        }
        Err(AuthError::Validation(ValidationError::InvalidUserId)) => ValidateOutcome::InvalidUser,
        Err(AuthError::Token(TokenError::Expired)) => ValidateOutcome::ExpiredToken,
        Err(AuthError::Token(_)) => ValidateOutcome::InvalidToken,
        Err(AuthError::Upstream(UpstreamError::Timeout { .. })) => ValidateOutcome::Timeout,
        Err(AuthError::Upstream(e)) if e.call() == UpstreamCall::AccountDetails => {
            ValidateOutcome::AccountFetchFailed
        }
        Err(_) => ValidateOutcome::ProfileInvalid,
    }
}

impl UserValidator {
    pub fn new(tokens: Arc<TokenService>, people: Arc<dyn PeopleService>) -> Self {
        Self {
            tokens,
            people,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    async fn bounded<T>(
        &self,
        call: UpstreamCall,
        fut: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| {
                warn!(%call, after = ?self.call_timeout, "People call timed out");
                UpstreamError::Timeout {
                    call,
                    after: self.call_timeout,
                }
            })?
    }

    /// Verifies `token` and loads the account it names. With
    /// `is_profile_validate`, also checks that `profile_id` belongs to that
    /// account.
    ///
    /// Both People calls run concurrently inside the caller's task, each under
    /// its own timeout. The first failure cancels the other call, and an
    /// account failure wins when both fail together. Nothing is retried.
    #[instrument(skip(self, token))]
    pub async fn validate(
        &self,
        token: &str,
        profile_id: i32,
        is_profile_validate: bool,
    ) -> AuthResult<AccountDetails> {
        let result = self.run(token, profile_id, is_profile_validate).await;
        let outcome = outcome_of(&result);
        record_validate_outcome(outcome);
        match &result {
            Ok(account) => debug!(account_id = account.id, "User validated"),
            Err(e) => debug!(error = %e, outcome = outcome.as_str(), "User validation failed"),
        }
        result
    }

    async fn run(
        &self,
        token: &str,
        profile_id: i32,
        is_profile_validate: bool,
    ) -> AuthResult<AccountDetails> {
        if token.is_empty() {
            return Err(ValidationError::MissingToken.into());
        }

        let claims = self.tokens.verify_token(token)?;
        let account_id = i32::try_from(claims.user_id)
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ValidationError::InvalidUserId)?;

        if is_profile_validate && profile_id <= 0 {
            return Err(ValidationError::MissingProfile.into());
        }

        let account = self.bounded(
            UpstreamCall::AccountDetails,
            self.people.get_account_details(account_id),
        );
        let profile = async {
            if is_profile_validate {
                self.bounded(
                    UpstreamCall::ProfileValidation,
                    self.people.validate_profile(profile_id, account_id),
                )
                .await
            } else {
                Ok(())
            }
        };

        let (account, ()) = tokio::try_join!(account, profile)?;
        Ok(account)
    }

    /// Issues a token for an account with the configured lifetime.
    pub fn create_jwt_token(&self, account_id: i32) -> AuthResult<IssuedToken> {
        let issued = self
            .tokens
            .create_token(i64::from(account_id), self.tokens.ttl_hours())?;
        Ok(issued)
    }

    /// Checks credentials with the People service and issues a session token.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(
        &self,
        credentials: Credentials,
    ) -> AuthResult<(AuthenticatedAccount, IssuedToken)> {
        let user_name = credentials.user_name.clone();
        let account = self
            .bounded(
                UpstreamCall::Authentication,
                self.people.auth_account(credentials),
            )
            .await?;

        let issued = self.tokens.create_token_for(
            i64::from(account.id),
            &user_name,
            self.tokens.ttl_hours(),
        )?;
        info!(account_id = account.id, "Login succeeded");
        Ok((account, issued))
    }
}
