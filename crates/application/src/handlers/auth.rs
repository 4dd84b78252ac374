use async_trait::async_trait;
use cache::Cache;
use chrono::{DateTime, Utc};

use crate::AppResult;
use crate::commands::{LogoutCommand, RevokedToken};
use crate::mediator::CommandHandler;

/// Revoked token ids, each kept until the token would have expired anyway.
#[derive(Clone)]
pub struct TokenBlacklist {
    revoked: Cache<DateTime<Utc>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self {
            revoked: Cache::named("token_blacklist"),
        }
    }

    fn key(token_id: &str) -> String {
        format!("blacklist:{token_id}")
    }

    /// Returns false when the token has already expired and needs no entry.
    pub async fn revoke(&self, token: &RevokedToken) -> bool {
        let now = Utc::now();
        let Ok(remaining) = (token.expires_at - now).to_std() else {
            return false;
        };
        if remaining.is_zero() {
            return false;
        }
        self.revoked
            .set(Self::key(&token.token_id), now, Some(remaining))
            .await;
        true
    }

    pub async fn is_revoked(&self, token_id: &str) -> bool {
        self.revoked.exists(&Self::key(token_id)).await
    }
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LogoutHandler {
    blacklist: TokenBlacklist,
}

impl LogoutHandler {
    pub fn new(blacklist: TokenBlacklist) -> Self {
        Self { blacklist }
    }
}

#[async_trait]
impl CommandHandler<LogoutCommand> for LogoutHandler {
    /// Returns how many tokens were blacklisted.
    #[tracing::instrument(skip_all, fields(user_id = %command.user_id))]
    async fn handle(&self, command: LogoutCommand) -> AppResult<usize> {
        let mut revoked = 0;
        for token in command.tokens() {
            if self.blacklist.revoke(token).await {
                revoked += 1;
            }
        }
        tracing::info!(revoked, "user logged out");
        Ok(revoked)
    }
}
