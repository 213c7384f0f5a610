//! Moderation actions and the dispatcher that executes them.
//!
//! Actions are declarative instructions attached to a rule set. They carry
//! no runtime state; the [`dispatcher::ActionDispatcher`] maps each variant
//! to the side effect it stands for. The JSON shape (tag field `type`,
//! camelCase discriminants) is a compatibility contract with stored channel
//! configuration and must not change.

use serde::{Deserialize, Serialize};

pub mod dispatcher;

pub use dispatcher::{ActionDispatcher, DispatchContext, DispatchOptions};

/// A single moderation action, discriminated by `type` on the wire.
///
/// ```json
/// {"type": "cooldown", "duration": 24}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Curate the cast into the channel feed.
    Like,
    /// Remove the cast from the feed without notifying the author.
    HideQuietly,
    /// Invite the user to become a channel member.
    Invite,
    /// Indefinitely suspend the user's content from curation.
    Ban,
    /// Suspend the user's content for `duration` hours.
    Cooldown { duration: u64 },
    /// Grant the user a named channel role.
    GrantRole { role: String },
    /// Record a downvote against the cast.
    Downvote,
    /// Hide the cast and send the author a warning message.
    WarnAndHide {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Action {
    /// The wire discriminant, used as the `action` column of moderation
    /// log entries.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::HideQuietly => "hideQuietly",
            Action::Invite => "invite",
            Action::Ban => "ban",
            Action::Cooldown { .. } => "cooldown",
            Action::GrantRole { .. } => "grantRole",
            Action::Downvote => "downvote",
            Action::WarnAndHide { .. } => "warnAndHide",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_wire_shape_is_stable() {
        let action: Action = serde_json::from_value(json!({"type": "hideQuietly"})).unwrap();
        assert_eq!(action, Action::HideQuietly);

        let action: Action =
            serde_json::from_value(json!({"type": "cooldown", "duration": 24})).unwrap();
        assert_eq!(action, Action::Cooldown { duration: 24 });

        let action: Action =
            serde_json::from_value(json!({"type": "grantRole", "role": "member"})).unwrap();
        assert_eq!(
            action,
            Action::GrantRole {
                role: "member".to_string()
            }
        );

        let serialized = serde_json::to_value(&Action::Like).unwrap();
        assert_eq!(serialized, json!({"type": "like"}));

        let serialized = serde_json::to_value(&Action::Cooldown { duration: 6 }).unwrap();
        assert_eq!(serialized, json!({"type": "cooldown", "duration": 6}));
    }

    #[test]
    fn action_names_match_discriminants() {
        assert_eq!(Action::HideQuietly.name(), "hideQuietly");
        assert_eq!(Action::Cooldown { duration: 1 }.name(), "cooldown");
        assert_eq!(
            Action::WarnAndHide { message: None }.name(),
            "warnAndHide"
        );
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let result = serde_json::from_value::<Action>(json!({"type": "obliterate"}));
        assert!(result.is_err());
    }
}
