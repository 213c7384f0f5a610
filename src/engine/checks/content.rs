//! Content pattern checks over the cast under evaluation.
//!
//! All checks in this module are cast-category: on the member-request path
//! there is no cast and they resolve to "not triggered".

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::engine::check::{Check, CheckContext, CheckOutcome, parse_args};
use crate::engine::rule::CheckKind;

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("static link pattern compiles"));

const NO_CAST: &str = "No cast to inspect";

/// `containsText { searchText, caseSensitive }`
pub struct ContainsTextCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainsTextArgs {
    search_text: String,
    #[serde(default)]
    case_sensitive: bool,
}

#[async_trait]
impl Check for ContainsTextCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: ContainsTextArgs = parse_args(CheckKind::ContainsText, ctx.args)?;

        let found = if args.case_sensitive {
            cast.text.contains(&args.search_text)
        } else {
            cast.text
                .to_lowercase()
                .contains(&args.search_text.to_lowercase())
        };

        if found {
            Ok(CheckOutcome::triggered(format!(
                "Cast contains the text \"{}\"",
                args.search_text
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Cast does not contain the text \"{}\"",
                args.search_text
            )))
        }
    }
}

/// `textMatchesPattern { pattern, caseInsensitive }`
pub struct TextMatchesPatternCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatternArgs {
    pattern: String,
    #[serde(default)]
    case_insensitive: bool,
}

#[async_trait]
impl Check for TextMatchesPatternCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: PatternArgs = parse_args(CheckKind::TextMatchesPattern, ctx.args)?;

        let regex = RegexBuilder::new(&args.pattern)
            .case_insensitive(args.case_insensitive)
            .build()
            .map_err(|e| crate::errors::RuleError::InvalidArgs {
                check: CheckKind::TextMatchesPattern.as_str().to_string(),
                details: e.to_string(),
            })?;

        if regex.is_match(&cast.text) {
            Ok(CheckOutcome::triggered(format!(
                "Cast matches the pattern \"{}\"",
                args.pattern
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Cast does not match the pattern \"{}\"",
                args.pattern
            )))
        }
    }
}

/// `containsTooManyMentions { maxMentions }`
pub struct ContainsTooManyMentionsCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MentionsArgs {
    max_mentions: usize,
}

#[async_trait]
impl Check for ContainsTooManyMentionsCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: MentionsArgs = parse_args(CheckKind::ContainsTooManyMentions, ctx.args)?;

        let count = cast.mentions.len();
        if count > args.max_mentions {
            Ok(CheckOutcome::triggered(format!(
                "Cast mentions {} users, more than the allowed {}",
                count, args.max_mentions
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Cast mentions {} users, within the allowed {}",
                count, args.max_mentions
            )))
        }
    }
}

/// `containsLinks { maxLinks }`
pub struct ContainsLinksCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksArgs {
    #[serde(default)]
    max_links: usize,
}

#[async_trait]
impl Check for ContainsLinksCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: LinksArgs = parse_args(CheckKind::ContainsLinks, ctx.args)?;

        let count = LINK_PATTERN.find_iter(&cast.text).count();
        if count > args.max_links {
            Ok(CheckOutcome::triggered(format!(
                "Cast contains {} links, more than the allowed {}",
                count, args.max_links
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Cast contains {} links, within the allowed {}",
                count, args.max_links
            )))
        }
    }
}

/// `containsEmbeds { images, videos, frames, links }`
///
/// Triggers when the cast carries an embed of any selected kind. With no
/// kinds selected, any embed at all triggers.
pub struct ContainsEmbedsCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedsArgs {
    #[serde(default)]
    images: bool,
    #[serde(default)]
    videos: bool,
    #[serde(default)]
    frames: bool,
    #[serde(default)]
    links: bool,
}

#[async_trait]
impl Check for ContainsEmbedsCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: EmbedsArgs = parse_args(CheckKind::ContainsEmbeds, ctx.args)?;

        let any_kind = !(args.images || args.videos || args.frames || args.links);
        let mut matched = Vec::new();
        for embed in &cast.embeds {
            if embed.is_image() {
                if any_kind || args.images {
                    matched.push("image");
                }
            } else if embed.is_video() {
                if any_kind || args.videos {
                    matched.push("video");
                }
            } else if any_kind || args.frames || args.links {
                matched.push("link");
            }
        }

        if matched.is_empty() {
            Ok(CheckOutcome::not_triggered(
                "Cast does not contain matching embeds",
            ))
        } else {
            matched.dedup();
            Ok(CheckOutcome::triggered(format!(
                "Cast contains embedded content: {}",
                matched.join(", ")
            )))
        }
    }
}

/// `castLength { min, max }`
pub struct CastLengthCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CastLengthArgs {
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
}

#[async_trait]
impl Check for CastLengthCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let Some(cast) = ctx.cast else {
            return Ok(CheckOutcome::not_triggered(NO_CAST));
        };
        let args: CastLengthArgs = parse_args(CheckKind::CastLength, ctx.args)?;

        let length = cast.text.chars().count();
        if let Some(min) = args.min {
            if length < min {
                return Ok(CheckOutcome::not_triggered(format!(
                    "Cast is {} characters, shorter than the minimum of {}",
                    length, min
                )));
            }
        }
        if let Some(max) = args.max {
            if length > max {
                return Ok(CheckOutcome::not_triggered(format!(
                    "Cast is {} characters, longer than the maximum of {}",
                    length, max
                )));
            }
        }
        Ok(CheckOutcome::triggered(format!(
            "Cast length of {} characters is within bounds",
            length
        )))
    }
}
