//! Named payload formats and Accept-header negotiation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A media type (`top/sub+suffix`) with the priority it has within its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    top_level: String,
    sub_type: String,
    suffix: Option<String>,
    priority: i32,
}

impl MediaType {
    /// Parse `top/sub[+suffix]`, ignoring any `;` parameters.
    pub fn new(media_type: &str, priority: i32) -> Result<Self> {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        let (top_level, rest) = essence
            .split_once('/')
            .ok_or_else(|| Error::Domain(format!("invalid media type: {media_type:?}")))?;
        if top_level.is_empty() || rest.is_empty() {
            return Err(Error::Domain(format!("invalid media type: {media_type:?}")));
        }

        let (sub_type, suffix) = match rest.split_once('+') {
            Some((sub, suffix)) if !sub.is_empty() && !suffix.is_empty() => {
                (sub, Some(suffix.to_ascii_lowercase()))
            }
            _ => (rest, None),
        };

        Ok(Self {
            top_level: top_level.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            suffix,
            priority,
        })
    }

    pub fn top_level(&self) -> &str {
        &self.top_level
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Subtype including its structured-syntax suffix.
    fn full_sub_type(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}+{}", self.sub_type, suffix),
            None => self.sub_type.clone(),
        }
    }

    fn matches_range(&self, range: &AcceptRange) -> bool {
        (range.top_level == "*" || range.top_level == self.top_level)
            && (range.sub_type == "*" || range.sub_type == self.full_sub_type())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.top_level, self.full_sub_type())
    }
}

/// A named format served under one or more media types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    name: String,
    media_types: Vec<MediaType>,
    priority: i32,
}

impl Format {
    pub fn new(
        name: impl Into<String>,
        media_types: impl IntoIterator<Item = MediaType>,
        priority: i32,
    ) -> Result<Self> {
        let name = name.into();
        let mut unique: Vec<MediaType> = Vec::new();
        for media_type in media_types {
            if !unique.iter().any(|m| m.to_string() == media_type.to_string()) {
                unique.push(media_type);
            }
        }
        if name.is_empty() || unique.is_empty() {
            return Err(Error::Domain(
                "a format needs a name and at least one media type".to_string(),
            ));
        }
        Ok(Self {
            name,
            media_types: unique,
            priority,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The highest-priority media type; the first declared wins ties.
    pub fn preferred_media_type(&self) -> &MediaType {
        let mut preferred = &self.media_types[0];
        for media_type in &self.media_types[1..] {
            if media_type.priority > preferred.priority {
                preferred = media_type;
            }
        }
        preferred
    }
}

/// Registry of the formats a client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formats {
    formats: BTreeMap<String, Format>,
}

impl Formats {
    pub fn new(formats: impl IntoIterator<Item = Format>) -> Result<Self> {
        let formats: BTreeMap<String, Format> = formats
            .into_iter()
            .map(|format| (format.name().to_string(), format))
            .collect();
        if formats.is_empty() {
            return Err(Error::Domain("at least one format is required".to_string()));
        }
        Ok(Self { formats })
    }

    /// JSON only, served as `application/json`.
    pub fn json() -> Self {
        let format = Format {
            name: "json".to_string(),
            media_types: vec![MediaType {
                top_level: "application".to_string(),
                sub_type: "json".to_string(),
                suffix: None,
                priority: 0,
            }],
            priority: 1,
        };
        Self {
            formats: BTreeMap::from([(format.name.clone(), format)]),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Format> {
        self.formats.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.values()
    }

    /// Every media type of every format.
    pub fn media_types(&self) -> impl Iterator<Item = &MediaType> {
        self.formats.values().flat_map(|f| f.media_types.iter())
    }

    /// Formats ordered by descending priority.
    fn by_priority(&self) -> Vec<&Format> {
        let mut formats: Vec<&Format> = self.formats.values().collect();
        formats.sort_by(|a, b| b.priority.cmp(&a.priority));
        formats
    }

    /// Accept header listing each format's preferred media type, highest
    /// format priority first.
    pub fn accept_header(&self) -> String {
        self.by_priority()
            .into_iter()
            .map(|format| format.preferred_media_type().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The format owning exactly the given media type.
    pub fn from_media_type(&self, wished: &str) -> Result<&Format> {
        let wished = wished.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        self.formats
            .values()
            .find(|format| format.media_types.iter().any(|m| m.to_string() == wished))
            .ok_or_else(|| Error::InvalidArgument(format!("no format for media type {wished:?}")))
    }

    /// Negotiate the best format for an Accept header value.
    ///
    /// Ranges are tried by descending quality; `*/*` picks the
    /// highest-priority format, any other range the format owning the
    /// highest-priority matching media type. A media type whose most
    /// specific matching range has `q=0` is never chosen.
    pub fn matching(&self, accept: &str) -> Result<&Format> {
        let all: Vec<AcceptRange> = accept.split(',').filter_map(|part| part.parse().ok()).collect();
        let excluded = |media_type: &MediaType| {
            all.iter()
                .filter(|range| media_type.matches_range(range))
                .max_by_key(|range| range.specificity())
                .is_some_and(|range| range.quality <= 0.0)
        };

        let mut ranges: Vec<&AcceptRange> = all.iter().filter(|range| range.quality > 0.0).collect();
        ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));

        for range in ranges {
            if range.top_level == "*" && range.sub_type == "*" {
                let acceptable = self
                    .by_priority()
                    .into_iter()
                    .find(|format| format.media_types.iter().any(|m| !excluded(m)));
                if let Some(format) = acceptable {
                    return Ok(format);
                }
                continue;
            }

            let best = self
                .formats
                .values()
                .flat_map(|format| format.media_types.iter().map(move |m| (format, m)))
                .filter(|(_, media_type)| media_type.matches_range(range) && !excluded(media_type))
                .max_by_key(|(format, media_type)| (media_type.priority, format.priority));
            if let Some((format, _)) = best {
                return Ok(format);
            }
        }

        Err(Error::InvalidArgument(format!(
            "no acceptable format for {accept:?}"
        )))
    }
}

impl Default for Formats {
    fn default() -> Self {
        Self::json()
    }
}

/// One entry of an Accept header.
#[derive(Debug, Clone, PartialEq)]
struct AcceptRange {
    top_level: String,
    sub_type: String,
    quality: f32,
}

impl AcceptRange {
    /// `*/*` < `type/*` < `type/subtype`.
    fn specificity(&self) -> u8 {
        u8::from(self.top_level != "*") + u8::from(self.sub_type != "*")
    }
}

impl FromStr for AcceptRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(';');
        let range = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let (top_level, sub_type) = match range.as_str() {
            "*" => ("*".to_string(), "*".to_string()),
            other => {
                let (top, sub) = other
                    .split_once('/')
                    .ok_or_else(|| Error::InvalidArgument(format!("invalid media range: {s:?}")))?;
                (top.to_string(), sub.to_string())
            }
        };
        if top_level.is_empty() || sub_type.is_empty() || (top_level == "*" && sub_type != "*") {
            return Err(Error::InvalidArgument(format!("invalid media range: {s:?}")));
        }

        let mut quality = 1.0;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    quality = value
                        .trim()
                        .parse::<f32>()
                        .map_err(|_| Error::InvalidArgument(format!("invalid quality in {s:?}")))?
                        .clamp(0.0, 1.0);
                }
            }
        }

        Ok(Self {
            top_level,
            sub_type,
            quality,
        })
    }
}
