//! Dispatch of moderation actions to their side effects.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::actions::Action;
use crate::errors::ActionError;
use crate::farcaster::{Cast, FarcasterUser};
use crate::providers::ModerationBackend;
use crate::storage::{CooldownStorage, ModeratedChannel};

/// The subject an action applies to.
pub struct DispatchContext<'a> {
    pub channel: &'a ModeratedChannel,
    pub user: &'a FarcasterUser,
    pub cast: Option<&'a Cast>,
}

/// Dispatch-time options.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// When false (simulation), no backend call is made and no state is
    /// written; the dispatcher becomes a no-op.
    pub execute_on_protocol: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            execute_on_protocol: true,
        }
    }
}

/// Maps action variants to backend and storage effects.
///
/// Each handler is idempotent where the backing systems allow it: likes
/// and invites are safe to repeat, and cooldown writes upsert on the
/// `(user, channel)` key so a repeat simply refreshes the expiry. Errors
/// are returned to the caller, which owns the abort-remaining-actions
/// policy.
pub struct ActionDispatcher {
    backend: Arc<dyn ModerationBackend>,
    cooldowns: Arc<dyn CooldownStorage>,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn ModerationBackend>, cooldowns: Arc<dyn CooldownStorage>) -> Self {
        Self { backend, cooldowns }
    }

    fn require_cast<'a>(
        action: &Action,
        ctx: &'a DispatchContext<'_>,
    ) -> Result<&'a Cast, ActionError> {
        ctx.cast.ok_or_else(|| ActionError::CastRequired {
            action: action.name().to_string(),
        })
    }

    fn backend_err(action: &Action, e: anyhow::Error) -> ActionError {
        ActionError::BackendFailed {
            action: action.name().to_string(),
            details: e.to_string(),
        }
    }

    #[instrument(skip(self, ctx), fields(
        action = action.name(),
        channel.id = %ctx.channel.id,
        user.fid = ctx.user.fid
    ))]
    pub async fn dispatch(
        &self,
        action: &Action,
        ctx: &DispatchContext<'_>,
        options: &DispatchOptions,
    ) -> Result<(), ActionError> {
        if !options.execute_on_protocol {
            debug!("Simulation mode, skipping action execution");
            return Ok(());
        }

        match action {
            Action::Like => {
                let cast = Self::require_cast(action, ctx)?;
                self.backend
                    .like_cast(&cast.hash)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
            Action::HideQuietly => {
                let cast = Self::require_cast(action, ctx)?;
                self.backend
                    .hide_cast(&cast.hash)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
            Action::Invite => {
                self.backend
                    .invite_user(&ctx.channel.id, ctx.user.fid)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
            Action::Ban => {
                self.cooldowns
                    .upsert_cooldown(ctx.user.fid, &ctx.channel.id, None)
                    .await
                    .map_err(|e| ActionError::ExecutionFailed {
                        action: action.name().to_string(),
                        details: e.to_string(),
                    })?;
            }
            Action::Cooldown { duration } => {
                let expires_at = Utc::now() + Duration::hours(*duration as i64);
                self.cooldowns
                    .upsert_cooldown(ctx.user.fid, &ctx.channel.id, Some(expires_at))
                    .await
                    .map_err(|e| ActionError::ExecutionFailed {
                        action: action.name().to_string(),
                        details: e.to_string(),
                    })?;
            }
            Action::GrantRole { role } => {
                self.backend
                    .grant_role(&ctx.channel.id, ctx.user.fid, role)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
            Action::Downvote => {
                let cast = Self::require_cast(action, ctx)?;
                self.backend
                    .record_downvote(&ctx.channel.id, ctx.user.fid, &cast.hash)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
            Action::WarnAndHide { message } => {
                let cast = Self::require_cast(action, ctx)?;
                let message = message
                    .as_deref()
                    .unwrap_or("Your cast violated the channel rules");
                self.backend
                    .warn_user(&ctx.channel.id, ctx.user.fid, message)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
                self.backend
                    .hide_cast(&cast.hash)
                    .await
                    .map_err(|e| Self::backend_err(action, e))?;
            }
        }

        debug!("Action executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryCooldownStorage;
    use crate::test_helpers::{RecordingBackend, test_cast, test_channel, test_user};

    fn dispatcher() -> (
        ActionDispatcher,
        Arc<RecordingBackend>,
        Arc<InMemoryCooldownStorage>,
    ) {
        let backend = Arc::new(RecordingBackend::new());
        let cooldowns = Arc::new(InMemoryCooldownStorage::new());
        let dispatcher = ActionDispatcher::new(backend.clone(), cooldowns.clone());
        (dispatcher, backend, cooldowns)
    }

    #[tokio::test]
    async fn like_hits_the_backend() {
        let (dispatcher, backend, _) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: Some(&cast),
        };

        dispatcher
            .dispatch(&Action::Like, &ctx, &DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec!["like_cast:0xcast"]);
    }

    #[tokio::test]
    async fn cast_actions_require_a_cast() {
        let (dispatcher, backend, _) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: None,
        };

        let err = dispatcher
            .dispatch(&Action::HideQuietly, &ctx, &DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::CastRequired { .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn ban_writes_indefinite_cooldown() {
        let (dispatcher, _, cooldowns) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: None,
        };

        dispatcher
            .dispatch(&Action::Ban, &ctx, &DispatchOptions::default())
            .await
            .unwrap();

        let cooldown = cooldowns.find_cooldown(10, "base").await.unwrap().unwrap();
        assert!(cooldown.is_indefinite());
        assert!(cooldown.is_in_effect(Utc::now()));
    }

    #[tokio::test]
    async fn cooldown_writes_timed_window_and_repeats_refresh() {
        let (dispatcher, _, cooldowns) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: None,
        };

        dispatcher
            .dispatch(&Action::Cooldown { duration: 2 }, &ctx, &DispatchOptions::default())
            .await
            .unwrap();
        let first = cooldowns
            .find_cooldown(10, "base")
            .await
            .unwrap()
            .unwrap()
            .expires_at
            .unwrap();

        dispatcher
            .dispatch(&Action::Cooldown { duration: 8 }, &ctx, &DispatchOptions::default())
            .await
            .unwrap();
        let second = cooldowns
            .find_cooldown(10, "base")
            .await
            .unwrap()
            .unwrap()
            .expires_at
            .unwrap();

        assert!(second > first);
    }

    #[tokio::test]
    async fn warn_and_hide_warns_then_hides() {
        let (dispatcher, backend, _) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: Some(&cast),
        };

        dispatcher
            .dispatch(
                &Action::WarnAndHide {
                    message: Some("no spam".to_string()),
                },
                &ctx,
                &DispatchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec!["warn_user:base:10:no spam", "hide_cast:0xcast"]
        );
    }

    #[tokio::test]
    async fn simulation_skips_backend_and_storage() {
        let (dispatcher, backend, cooldowns) = dispatcher();
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: Some(&cast),
        };
        let simulation = DispatchOptions {
            execute_on_protocol: false,
        };

        dispatcher
            .dispatch(&Action::Like, &ctx, &simulation)
            .await
            .unwrap();
        dispatcher
            .dispatch(&Action::Ban, &ctx, &simulation)
            .await
            .unwrap();

        assert!(backend.calls().is_empty());
        assert!(cooldowns.find_cooldown(10, "base").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let (dispatcher, backend, _) = dispatcher();
        backend.fail_on("invite_user");
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let ctx = DispatchContext {
            channel: &channel,
            user: &user,
            cast: None,
        };

        let err = dispatcher
            .dispatch(&Action::Invite, &ctx, &DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::BackendFailed { .. }));
    }
}
