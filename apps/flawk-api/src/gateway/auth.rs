//! Per-packet authentication for socket connections.

use std::sync::Arc;

use crate::auth::tokens::{self, TokenError};
use crate::db::store::UserStore;
use crate::error::GatewayError;
use crate::models::user::UserRecord;

use super::registry::{AttachOutcome, ConnectionRegistry, Identity};

/// Outcome of a successful packet check.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    /// True only for the packet that attached the identity.
    pub first_identification: bool,
}

/// Validates the token carried by every inbound packet and pins the
/// resulting identity to the connection the first time it succeeds.
pub struct Authenticator {
    secret: String,
    store: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(secret: impl Into<String>, store: Arc<dyn UserStore>) -> Self {
        Self {
            secret: secret.into(),
            store,
        }
    }

    /// Resolve a token to the user it belongs to.
    ///
    /// Fails when the signature or expiry is bad, the subject no longer
    /// exists, or the token has been removed from the user's active list.
    pub async fn resolve(&self, token: &str) -> Result<UserRecord, GatewayError> {
        let claims = tokens::verify_token(&self.secret, token).map_err(|e: TokenError| {
            tracing::debug!(reason = %e, "token rejected");
            GatewayError::InvalidToken
        })?;

        let record = self
            .store
            .find_user(&claims.sub)
            .await?
            .ok_or(GatewayError::UserNotFound)?;

        if !record.has_active_token(token) {
            return Err(GatewayError::TokenRevoked);
        }

        Ok(record)
    }

    /// Gate one inbound packet on `connection_id`.
    ///
    /// The token is fully re-checked on every packet, so a token revoked
    /// mid-session closes the connection on its next packet. The identity is
    /// attached only once; a later packet carrying another user's token is
    /// rejected rather than re-assigning the connection.
    pub async fn authenticate(
        &self,
        registry: &ConnectionRegistry,
        connection_id: &str,
        token: Option<&str>,
    ) -> Result<Authenticated, GatewayError> {
        let token = token.ok_or(GatewayError::UnauthenticatedPacket)?;
        let record = self.resolve(token).await?;

        if let Some(identity) = registry.identity(connection_id) {
            return pinned(identity, &record);
        }

        let identity = Identity::from(&record);
        match registry.attach_identity(connection_id, identity.clone()) {
            AttachOutcome::Attached => Ok(Authenticated {
                identity,
                first_identification: true,
            }),
            AttachOutcome::AlreadyAttached => {
                let existing = registry
                    .identity(connection_id)
                    .ok_or(GatewayError::ConnectionClosed)?;
                pinned(existing, &record)
            }
            AttachOutcome::Closed => Err(GatewayError::ConnectionClosed),
        }
    }
}

fn pinned(identity: Identity, record: &UserRecord) -> Result<Authenticated, GatewayError> {
    if identity.id != record.user.id {
        tracing::debug!(
            pinned = %identity.id,
            presented = %record.user.id,
            "token subject does not match connection identity"
        );
        return Err(GatewayError::InvalidToken);
    }
    Ok(Authenticated {
        identity,
        first_identification: false,
    })
}
