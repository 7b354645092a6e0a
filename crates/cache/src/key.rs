//! Structured cache keys and their canonical string form.
//!
//! The canonical form is `v1|<platform>|<entity_type>|<entity_id>|<start>|<end>`.
//! Field order is fixed by [`CacheKey::canonical`], never by struct layout,
//! so two structurally equal keys always index the same entry.

use adops_core::{DateRange, EntityType, MetricsError, MetricsResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const KEY_VERSION: &str = "v1";
const DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    platform: String,
    entity_type: EntityType,
    entity_id: String,
    date_range: DateRange,
}

impl CacheKey {
    /// Platform names are trimmed and lower-cased so `"Meta"` and `"meta"`
    /// share an entry.
    pub fn new(
        platform: impl AsRef<str>,
        entity_type: EntityType,
        entity_id: impl AsRef<str>,
        date_range: DateRange,
    ) -> MetricsResult<Self> {
        let platform = normalize_platform(platform.as_ref());
        let entity_id = entity_id.as_ref().trim().to_string();
        validate_field("platform", &platform)?;
        validate_field("entity_id", &entity_id)?;
        Ok(Self {
            platform,
            entity_type,
            entity_id,
            date_range,
        })
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn canonical(&self) -> String {
        format!(
            "{KEY_VERSION}{d}{}{d}{}{d}{}{d}{}{d}{}",
            self.platform,
            self.entity_type.as_str(),
            self.entity_id,
            self.date_range.start_date().format("%Y-%m-%d"),
            self.date_range.end_date().format("%Y-%m-%d"),
            d = DELIMITER,
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for CacheKey {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(DELIMITER).collect();
        match parts.as_slice() {
            [version, platform, entity_type, entity_id, start, end] if *version == KEY_VERSION => {
                let range = DateRange::parse(start, end)?;
                CacheKey::new(platform, entity_type.parse()?, entity_id, range)
            }
            _ => Err(MetricsError::InvalidKey(format!("malformed cache key '{s}'"))),
        }
    }
}

/// Partial key used for invalidation. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    platform: Option<String>,
    entity_type: Option<EntityType>,
    entity_id: Option<String>,
    date_range: Option<DateRange>,
}

impl KeyFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn platform(mut self, platform: impl AsRef<str>) -> Self {
        self.platform = Some(normalize_platform(platform.as_ref()));
        self
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn entity_id(mut self, entity_id: impl AsRef<str>) -> Self {
        self.entity_id = Some(entity_id.as_ref().trim().to_string());
        self
    }

    pub fn date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = Some(date_range);
        self
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        self.platform.as_deref().map_or(true, |p| p == key.platform)
            && self.entity_type.map_or(true, |t| t == key.entity_type)
            && self.entity_id.as_deref().map_or(true, |id| id == key.entity_id)
            && self.date_range.map_or(true, |r| r == key.date_range)
    }
}

fn normalize_platform(platform: &str) -> String {
    platform.trim().to_ascii_lowercase()
}

fn validate_field(name: &str, value: &str) -> MetricsResult<()> {
    if value.is_empty() {
        return Err(MetricsError::InvalidKey(format!("{name} must not be empty")));
    }
    if value.contains(DELIMITER) {
        return Err(MetricsError::InvalidKey(format!(
            "{name} '{value}' contains reserved delimiter '{DELIMITER}'"
        )));
    }
    Ok(())
}
