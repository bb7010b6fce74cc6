// Legacy flat project model: hotspots on a background plus step-keyed timeline events.
// Parsing is lenient per item so one bad hotspot cannot sink a whole project.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::PercentPoint;

/// Legacy project as persisted by the original authoring UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawLegacyProject")]
pub struct LegacyProject {
    pub background_image: Option<String>,
    /// `"image"` or `"video"`.
    pub background_type: Option<String>,
    pub hotspots: Vec<LegacyHotspot>,
    pub timeline_events: Vec<LegacyTimelineEvent>,
    /// List entries that were not objects. Reported by migration, never written back.
    #[serde(skip)]
    pub rejected: Vec<RejectedItem>,
}

/// Which list a rejected entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyList {
    Hotspots,
    TimelineEvents,
}

/// A `hotspots`/`timelineEvents` entry that could not be read at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedItem {
    pub list: LegacyList,
    pub index: usize,
    pub reason: String,
}

/// Wire shape: lists are read entry by entry so a bad entry only loses itself.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLegacyProject {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    background_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    background_type: Option<String>,
    #[serde(default)]
    hotspots: Option<Vec<Value>>,
    #[serde(default)]
    timeline_events: Option<Vec<Value>>,
}

impl From<RawLegacyProject> for LegacyProject {
    fn from(raw: RawLegacyProject) -> Self {
        let mut rejected = Vec::new();
        let hotspots = read_items(raw.hotspots, LegacyList::Hotspots, &mut rejected);
        let timeline_events = read_items(raw.timeline_events, LegacyList::TimelineEvents, &mut rejected);
        LegacyProject {
            background_image: raw.background_image,
            background_type: raw.background_type,
            hotspots,
            timeline_events,
            rejected,
        }
    }
}

fn read_items<T: DeserializeOwned>(
    items: Option<Vec<Value>>,
    list: LegacyList,
    rejected: &mut Vec<RejectedItem>,
) -> Vec<T> {
    let mut parsed = Vec::new();
    for (index, item) in items.unwrap_or_default().into_iter().enumerate() {
        if !item.is_object() {
            rejected.push(RejectedItem {
                list,
                index,
                reason: format!("expected an object, found {}", item),
            });
            continue;
        }
        match serde_json::from_value(item) {
            Ok(value) => parsed.push(value),
            Err(e) => rejected.push(RejectedItem {
                list,
                index,
                reason: e.to_string(),
            }),
        }
    }
    parsed
}

impl LegacyProject {
    /// New project without the hotspot and without every event that targets it.
    pub fn without_hotspot(&self, hotspot_id: &str) -> LegacyProject {
        LegacyProject {
            background_image: self.background_image.clone(),
            background_type: self.background_type.clone(),
            hotspots: self
                .hotspots
                .iter()
                .filter(|h| h.id != hotspot_id)
                .cloned()
                .collect(),
            timeline_events: self
                .timeline_events
                .iter()
                .filter(|e| e.target_id.as_deref() != Some(hotspot_id))
                .cloned()
                .collect(),
            rejected: self.rejected.clone(),
        }
    }
}

/// Positioned marker. `x`/`y` are percent of the background (0-100).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyHotspot {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub color: Option<String>,
    /// `"small"`, `"medium"` or `"large"`.
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub pulse_animation: bool,
}

impl LegacyHotspot {
    /// Percent position, when both coordinates are present and within 0-100.
    pub fn position(&self) -> Option<PercentPoint> {
        let point = PercentPoint::new(self.x?, self.y?);
        point.is_in_range().then_some(point)
    }

    /// Marker scale for the `size` preset.
    pub fn size_factor(&self) -> f64 {
        match self.size.as_deref() {
            Some("small") => 0.75,
            Some("large") => 1.25,
            _ => 1.0,
        }
    }
}

/// Timeline event fired at `step`. Type-specific fields are optional and only the
/// ones meaningful for `event_type` are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTimelineEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub step: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub event_type: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub target_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,

    // Text / message
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub text_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub text_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub text_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub text_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub text_height: Option<f64>,

    // Spotlight / highlight
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub spotlight_shape: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub highlight_shape: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spotlight_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spotlight_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spotlight_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spotlight_height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub highlight_radius: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dim_percentage: Option<f64>,

    // Pan / zoom
    #[serde(default, deserialize_with = "lenient_f64")]
    pub zoom_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub zoom_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub target_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub target_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub smooth: Option<bool>,

    // Quiz
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub quiz_question: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub quiz_options: Vec<String>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub quiz_correct_answer: Option<usize>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub quiz_explanation: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub quiz_shuffle_options: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub quiz_blocks_advance: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub quiz_allow_skip: Option<bool>,

    // Media
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub youtube_video_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub audio_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop", deserialize_with = "lenient_opt_bool")]
    pub loop_playback: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
}

/// Number or numeric string; anything else reads as missing.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value).filter(|n| n.is_finite()))
}

/// Whole, non-negative numbers only.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64)
        .map(|n| n as u64))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u32(deserializer)?.map(|n| n as usize))
}

/// Strings and numbers; anything else reads as missing.
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(string_from_value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Option lists. A non-list reads as empty; a non-text entry keeps its slot as `""`
/// so answer indexes still line up.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| string_from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

/// Booleans and `"true"`/`"false"`.
fn lenient_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_bool(deserializer)?.unwrap_or_default())
}

fn string_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
