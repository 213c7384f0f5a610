//! Farcaster protocol types consumed by the moderation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Farcaster user as surfaced by the social graph provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarcasterUser {
    pub fid: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    /// Profile bio text, empty when the user has none.
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub power_badge: bool,
    /// Verified wallet addresses, lowercase hex.
    #[serde(default)]
    pub verifications: Vec<String>,
    #[serde(default)]
    pub custody_address: String,
}

impl FarcasterUser {
    /// All addresses that on-chain checks should inspect: every verified
    /// address plus the custody address, deduplicated.
    pub fn wallet_addresses(&self) -> Vec<String> {
        let mut addresses = self.verifications.clone();
        if !self.custody_address.is_empty() && !addresses.contains(&self.custody_address) {
            addresses.push(self.custody_address.clone());
        }
        addresses
    }
}

/// Embedded content attached to a cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embed {
    pub url: String,
}

impl Embed {
    pub fn is_image(&self) -> bool {
        let lower = self.url.to_lowercase();
        [".png", ".jpg", ".jpeg", ".gif", ".webp"]
            .iter()
            .any(|ext| lower.ends_with(ext))
            || lower.contains("imagedelivery.net")
    }

    pub fn is_video(&self) -> bool {
        let lower = self.url.to_lowercase();
        [".mp4", ".mov", ".m3u8", ".webm"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// A user-authored post in the Farcaster protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cast {
    pub hash: String,
    pub author: FarcasterUser,
    #[serde(default)]
    pub text: String,
    /// Present when the cast is a reply.
    #[serde(default)]
    pub parent_hash: Option<String>,
    /// Fids mentioned in the cast text.
    #[serde(default)]
    pub mentions: Vec<i64>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    pub timestamp: DateTime<Utc>,
}

impl Cast {
    /// Whether this cast is a top-level (root) cast rather than a reply.
    pub fn is_root(&self) -> bool {
        self.parent_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_addresses_include_custody_once() {
        let user = FarcasterUser {
            fid: 1,
            username: "alice".to_string(),
            display_name: String::new(),
            bio: String::new(),
            follower_count: 0,
            power_badge: false,
            verifications: vec!["0xabc".to_string(), "0xdef".to_string()],
            custody_address: "0xabc".to_string(),
        };
        assert_eq!(user.wallet_addresses(), vec!["0xabc", "0xdef"]);
    }

    #[test]
    fn embed_classification() {
        assert!(
            Embed {
                url: "https://example.com/pic.PNG".to_string()
            }
            .is_image()
        );
        assert!(
            Embed {
                url: "https://example.com/clip.mp4".to_string()
            }
            .is_video()
        );
        assert!(
            !Embed {
                url: "https://example.com/page".to_string()
            }
            .is_image()
        );
    }

    #[test]
    fn root_vs_reply() {
        let mut cast = Cast {
            hash: "0x1".to_string(),
            author: FarcasterUser {
                fid: 1,
                username: "alice".to_string(),
                display_name: String::new(),
                bio: String::new(),
                follower_count: 0,
                power_badge: false,
                verifications: vec![],
                custody_address: String::new(),
            },
            text: String::new(),
            parent_hash: None,
            mentions: vec![],
            embeds: vec![],
            timestamp: Utc::now(),
        };
        assert!(cast.is_root());
        cast.parent_hash = Some("0x0".to_string());
        assert!(!cast.is_root());
    }
}
