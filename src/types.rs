// Strong typing over strings. Newtypes for timestamps, points in percent vs pixel
// space, and validated rectangles. Configuration structs parsed from host JSON.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, GeometryError};

/// Timestamp in milliseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Timestamp `ms` milliseconds later, saturating at the maximum.
    pub fn plus_millis(&self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }
}

/// Natural pixel size of a background image or video, or of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Dimensions { width, height }
    }

    /// Both sides finite and strictly positive.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Dimensions::new(self.width * factor, self.height * factor)
    }
}

/// Point in percent of the canvas (0-100 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PercentPoint {
    pub x: f64,
    pub y: f64,
}

impl PercentPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PercentPoint { x, y }
    }

    pub fn is_in_range(&self) -> bool {
        (0.0..=100.0).contains(&self.x) && (0.0..=100.0).contains(&self.y)
    }
}

/// Point in absolute canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PixelPoint { x, y }
    }
}

/// Axis-aligned rectangle with a non-negative origin and a positive size.
/// Validated on construction and on deserialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRect")]
pub struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl TryFrom<RawRect> for Rect {
    type Error = GeometryError;

    fn try_from(raw: RawRect) -> Result<Self, Self::Error> {
        Rect::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(GeometryError::NonPositiveSize { width, height });
        }
        if x < 0.0 || y < 0.0 {
            return Err(GeometryError::NegativeOrigin { x, y });
        }
        Ok(Rect {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Layout breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Breakpoint {
    Desktop,
    Tablet,
    Mobile,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 3] = [Breakpoint::Desktop, Breakpoint::Tablet, Breakpoint::Mobile];
}

/// Per-breakpoint scale factors relative to desktop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakpointScale {
    #[serde(default = "default_tablet_scale")]
    pub tablet: f64,
    #[serde(default = "default_mobile_scale")]
    pub mobile: f64,
}

fn default_tablet_scale() -> f64 {
    0.8
}

fn default_mobile_scale() -> f64 {
    0.6
}

impl Default for BreakpointScale {
    fn default() -> Self {
        BreakpointScale {
            tablet: default_tablet_scale(),
            mobile: default_mobile_scale(),
        }
    }
}

impl BreakpointScale {
    pub fn factor(&self, breakpoint: Breakpoint) -> f64 {
        match breakpoint {
            Breakpoint::Desktop => 1.0,
            Breakpoint::Tablet => self.tablet,
            Breakpoint::Mobile => self.mobile,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        for factor in [self.tablet, self.mobile] {
            if !(factor.is_finite() && factor > 0.0 && factor <= 1.0) {
                return Err(GeometryError::InvalidScale(factor));
            }
        }
        Ok(())
    }
}

/// One rectangle per breakpoint. Always written as a whole; see `GeometryResolver`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponsivePosition {
    desktop: Rect,
    tablet: Rect,
    mobile: Rect,
}

impl ResponsivePosition {
    pub(crate) fn from_parts(desktop: Rect, tablet: Rect, mobile: Rect) -> Self {
        ResponsivePosition {
            desktop,
            tablet,
            mobile,
        }
    }

    pub fn at(&self, breakpoint: Breakpoint) -> &Rect {
        match breakpoint {
            Breakpoint::Desktop => &self.desktop,
            Breakpoint::Tablet => &self.tablet,
            Breakpoint::Mobile => &self.mobile,
        }
    }

    pub fn desktop(&self) -> &Rect {
        &self.desktop
    }

    pub fn tablet(&self) -> &Rect {
        &self.tablet
    }

    pub fn mobile(&self) -> &Rect {
        &self.mobile
    }

    /// Every breakpoint rectangle lies inside the canvas scaled for that breakpoint.
    pub fn fits_within(&self, canvas: Dimensions, scale: &BreakpointScale) -> bool {
        Breakpoint::ALL.iter().all(|bp| {
            let container = canvas.scaled(scale.factor(*bp));
            crate::geometry::validate_bounds(self.at(*bp), container.width, container.height)
        })
    }
}

/// Options for a migration run, parsed from host JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOptions {
    #[serde(default = "default_true")]
    pub preserve_hotspot_ids: bool,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f64,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f64,
    #[serde(default = "default_slide_title")]
    pub default_slide_title: String,
    /// Side length of a migrated hotspot marker, in canvas units.
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
    #[serde(default)]
    pub scale: BreakpointScale,
    /// Stamp for deck metadata. Absent keeps the run deterministic (epoch zero).
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

fn default_true() -> bool {
    true
}

fn default_canvas_width() -> f64 {
    1200.0
}

fn default_canvas_height() -> f64 {
    800.0
}

fn default_slide_title() -> String {
    "Slide 1".to_string()
}

fn default_marker_size() -> f64 {
    40.0
}

impl Default for MigrationOptions {
    fn default() -> Self {
        MigrationOptions {
            preserve_hotspot_ids: true,
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            default_slide_title: default_slide_title(),
            marker_size: default_marker_size(),
            scale: BreakpointScale::default(),
            created_at: None,
        }
    }
}

impl MigrationOptions {
    pub fn canvas(&self) -> Dimensions {
        Dimensions::new(self.canvas_width, self.canvas_height)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let canvas = self.canvas();
        if !canvas.is_usable() {
            return Err(EngineError::InvalidConfig(format!(
                "canvas must have a positive size, got {}x{}",
                canvas.width, canvas.height
            )));
        }
        if !(self.marker_size.is_finite() && self.marker_size > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "marker size must be positive, got {}",
                self.marker_size
            )));
        }
        self.scale.validate()?;
        Ok(())
    }
}

/// How a playback session traverses the steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackMode {
    /// Free navigation, no gating, no timers.
    Exploring,
    /// Guided; advances only on explicit `advance()`.
    SelfPaced,
    /// Guided; advances automatically after each step's duration.
    Timed,
}

impl PlaybackMode {
    pub fn is_guided(&self) -> bool {
        !matches!(self, PlaybackMode::Exploring)
    }
}

/// Playback behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Auto-advance interval when no event on the step overrides it.
    #[serde(default = "default_step_duration")]
    pub default_step_duration_ms: u64,
    /// Quizzes flagged `blocksAdvance` gate guided playback. Wins over `allow_seeking`.
    #[serde(default = "default_true")]
    pub enforce_quiz_completion: bool,
    /// Permit forward `jump_to` in guided mode.
    #[serde(default)]
    pub allow_seeking: bool,
}

fn default_step_duration() -> u64 {
    3000
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            default_step_duration_ms: default_step_duration(),
            enforce_quiz_completion: true,
            allow_seeking: false,
        }
    }
}

/// Engine-wide settings, as accepted by the WASM constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub migration: MigrationOptions,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.migration.validate()?;
        if self.playback.default_step_duration_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "default step duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_conversions() {
        let ts = Timestamp::from_millis(1_500);
        assert_eq!(ts.as_millis(), 1_500);
        assert_eq!(Timestamp::from_millis(u64::MAX).plus_millis(5).as_millis(), u64::MAX);
    }

    #[test]
    fn rect_rejects_non_positive_size() {
        assert_eq!(
            Rect::new(0.0, 0.0, 0.0, 10.0),
            Err(GeometryError::NonPositiveSize {
                width: 0.0,
                height: 10.0
            })
        );
        assert!(Rect::new(-1.0, 0.0, 5.0, 5.0).is_err());
        assert!(Rect::new(0.0, 0.0, f64::NAN, 5.0).is_err());
    }

    #[test]
    fn rect_deserialisation_is_validated() {
        let ok: Result<Rect, _> = serde_json::from_str(r#"{"x":1,"y":2,"width":3,"height":4}"#);
        assert!(ok.is_ok());
        let bad: Result<Rect, _> = serde_json::from_str(r#"{"x":1,"y":2,"width":-3,"height":4}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn migration_options_defaults_from_empty_json() {
        let options: MigrationOptions = serde_json::from_str("{}").unwrap();
        assert!(options.preserve_hotspot_ids);
        assert_eq!(options.canvas(), Dimensions::new(1200.0, 800.0));
        assert_eq!(options.marker_size, 40.0);
        assert_eq!(options.scale, BreakpointScale::default());
        assert!(options.created_at.is_none());
    }

    #[test]
    fn playback_config_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"allowSeeking":true}"#).unwrap();
        assert_eq!(config.default_step_duration_ms, 3000);
        assert!(config.enforce_quiz_completion);
        assert!(config.allow_seeking);
    }

    #[test]
    fn engine_config_defaults_and_validation() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"migration":{"canvasWidth":640}}"#).unwrap();
        assert_eq!(config.migration.canvas_width, 640.0);
        assert_eq!(config.migration.canvas_height, 800.0);
        assert_eq!(config.playback.default_step_duration_ms, 3000);
        assert!(config.validate().is_ok());

        let bad: EngineConfig =
            serde_json::from_str(r#"{"migration":{"markerSize":0}}"#).unwrap();
        assert!(matches!(bad.validate(), Err(EngineError::InvalidConfig(_))));
        let no_timer: EngineConfig =
            serde_json::from_str(r#"{"playback":{"defaultStepDurationMs":0}}"#).unwrap();
        assert!(no_timer.validate().is_err());
    }

    #[test]
    fn scale_validation() {
        assert!(BreakpointScale::default().validate().is_ok());
        let bad = BreakpointScale {
            tablet: 1.5,
            mobile: 0.6,
        };
        assert_eq!(bad.validate(), Err(GeometryError::InvalidScale(1.5)));
    }
}
