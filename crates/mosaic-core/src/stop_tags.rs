//! Stop tags: labels too generic to say anything about similarity.
//!
//! A static list of meta tags is always excluded. Datasets can opt in to
//! extra named groups and add their own tags on top.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tags::normalize_tag;

/// Tags excluded for every dataset.
pub const DEFAULT_STOP_TAGS: &[&str] = &[
    "highres",
    "absurdres",
    "lowres",
    "commentary_request",
    "commentary",
    "english_commentary",
    "translated",
    "translation_request",
    "bad_id",
    "bad_pixiv_id",
    "bad_twitter_id",
    "artist_name",
    "signature",
    "watermark",
    "web_address",
    "dated",
    "twitter_username",
];

/// Optional stop-tag groups a dataset may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopTagGroup {
    /// Head counts such as `1girl` or `solo`.
    CharacterCount,
    /// Plain backgrounds.
    Background,
    /// Framing and palette labels.
    Composition,
}

impl StopTagGroup {
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            StopTagGroup::CharacterCount => &[
                "1girl",
                "2girls",
                "3girls",
                "multiple_girls",
                "1boy",
                "2boys",
                "multiple_boys",
                "solo",
                "solo_focus",
                "no_humans",
            ],
            StopTagGroup::Background => &[
                "simple_background",
                "white_background",
                "black_background",
                "grey_background",
                "transparent_background",
                "gradient_background",
            ],
            StopTagGroup::Composition => &[
                "looking_at_viewer",
                "upper_body",
                "full_body",
                "cowboy_shot",
                "portrait",
                "monochrome",
                "greyscale",
                "comic",
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopTagGroup::CharacterCount => "character_count",
            StopTagGroup::Background => "background",
            StopTagGroup::Composition => "composition",
        }
    }
}

impl fmt::Display for StopTagGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StopTagGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "character_count" => Ok(StopTagGroup::CharacterCount),
            "background" => Ok(StopTagGroup::Background),
            "composition" => Ok(StopTagGroup::Composition),
            other => Err(Error::Config(format!("unknown stop tag group: {other}"))),
        }
    }
}

/// Dataset-level stop-tag opt-ins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTagSettings {
    #[serde(default)]
    pub groups: Vec<StopTagGroup>,
    #[serde(default)]
    pub extra: Vec<String>,
}

impl StopTagSettings {
    pub fn with_group(mut self, group: StopTagGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_extra(mut self, tag: impl Into<String>) -> Self {
        self.extra.push(tag.into());
        self
    }
}

/// The resolved stop-tag set for one dataset.
#[derive(Debug, Clone)]
pub struct StopTags {
    tags: HashSet<String>,
}

impl StopTags {
    /// Defaults plus the dataset's enabled groups and extra tags.
    pub fn from_settings(settings: &StopTagSettings) -> Self {
        let tags = DEFAULT_STOP_TAGS
            .iter()
            .copied()
            .chain(settings.groups.iter().flat_map(|g| g.tags().iter().copied()))
            .map(normalize_tag)
            .chain(settings.extra.iter().map(|t| normalize_tag(t)))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tags }
    }

    /// Case-insensitive membership check.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(&normalize_tag(tag))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for StopTags {
    fn default() -> Self {
        Self::from_settings(&StopTagSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_always_present() {
        let stop = StopTags::default();
        assert!(stop.contains("highres"));
        assert!(stop.contains("HighRes"));
        assert!(!stop.contains("1girl"));
        assert_eq!(stop.len(), DEFAULT_STOP_TAGS.len());
    }

    #[test]
    fn test_groups_are_opt_in() {
        let settings = StopTagSettings::default().with_group(StopTagGroup::CharacterCount);
        let stop = StopTags::from_settings(&settings);
        assert!(stop.contains("1girl"));
        assert!(stop.contains("solo"));
        assert!(!stop.contains("simple_background"));
    }

    #[test]
    fn test_extra_tags_normalized() {
        let settings = StopTagSettings::default().with_extra("  Sketch ");
        let stop = StopTags::from_settings(&settings);
        assert!(stop.contains("sketch"));
    }

    #[test]
    fn test_group_round_trip_names() {
        for group in [
            StopTagGroup::CharacterCount,
            StopTagGroup::Background,
            StopTagGroup::Composition,
        ] {
            assert_eq!(group.as_str().parse::<StopTagGroup>().unwrap(), group);
        }
        assert!("misc".parse::<StopTagGroup>().is_err());
    }
}
