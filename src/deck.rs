// Slide deck model: slides -> positioned elements -> interactions -> effects.
// Effect parameters are a closed tagged union keyed by effect type.

use serde::{Deserialize, Serialize};

use crate::types::{PercentPoint, ResponsivePosition, Timestamp};

/// Current deck format. A project carrying `slides` with this version is already migrated.
pub const DECK_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideDeck {
    pub id: String,
    pub title: String,
    pub slides: Vec<InteractiveSlide>,
    pub metadata: DeckMetadata,
}

impl SlideDeck {
    pub fn element_count(&self) -> usize {
        self.slides.iter().map(|s| s.elements.len()).sum()
    }

    pub fn interaction_count(&self) -> usize {
        self.elements().map(|e| e.interactions.len()).sum()
    }

    pub fn elements(&self) -> impl Iterator<Item = &SlideElement> {
        self.slides.iter().flat_map(|s| s.elements.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckMetadata {
    pub version: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub migrated_from_legacy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveSlide {
    pub id: String,
    pub title: String,
    pub elements: Vec<SlideElement>,
    #[serde(default)]
    pub background_media: Option<BackgroundMedia>,
    pub layout: SlideLayout,
}

/// Canvas size of a slide, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideLayout {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundMedia {
    pub url: String,
    /// Copied verbatim from the legacy `backgroundType` (`"image"` or `"video"`).
    pub media_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Hotspot,
    Text,
    Media,
    Shape,
    /// Hidden element owning step-triggered interactions that target no hotspot.
    StepController,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub position: ResponsivePosition,
    #[serde(default)]
    pub style: ElementStyle,
    #[serde(default)]
    pub content: ElementContent,
    #[serde(default)]
    pub interactions: Vec<ElementInteraction>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub pulse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// What fires an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Trigger {
    Click,
    Hover,
    /// Fired by the timeline scheduler when playback reaches `step`, not by pointer input.
    /// `sequence` orders interactions sharing a step (legacy event index).
    OnStep {
        step: u32,
        #[serde(default)]
        sequence: usize,
    },
}

impl Trigger {
    pub fn step(&self) -> Option<u32> {
        match self {
            Trigger::OnStep { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInteraction {
    pub id: String,
    pub trigger: Trigger,
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub id: String,
    /// How long the effect stays up, when it overrides the step default.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub parameters: EffectParameters,
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        self.parameters.kind()
    }

    /// Unanswered, this effect holds guided playback on its step.
    pub fn blocks_advance(&self) -> bool {
        matches!(
            self.parameters,
            EffectParameters::Quiz(QuizParameters {
                blocks_advance: true,
                ..
            })
        )
    }

    pub fn as_quiz(&self) -> Option<&QuizParameters> {
        match &self.parameters {
            EffectParameters::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }
}

/// Effect kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Spotlight,
    Text,
    Tooltip,
    Video,
    Audio,
    Quiz,
    PanZoom,
}

impl EffectKind {
    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Spotlight => "Spotlight",
            EffectKind::Text => "Text",
            EffectKind::Tooltip => "Tooltip",
            EffectKind::Video => "Video",
            EffectKind::Audio => "Audio",
            EffectKind::Quiz => "Quiz",
            EffectKind::PanZoom => "Pan & Zoom",
        }
    }

    /// Parameter set a freshly created effect of this kind starts with.
    pub fn default_parameters(&self) -> EffectParameters {
        match self {
            EffectKind::Spotlight => EffectParameters::Spotlight(SpotlightParameters::default()),
            EffectKind::Text => EffectParameters::Text(TextParameters::default()),
            EffectKind::Tooltip => EffectParameters::Tooltip(TooltipParameters::default()),
            EffectKind::Video => EffectParameters::Video(VideoParameters::default()),
            EffectKind::Audio => EffectParameters::Audio(AudioParameters::default()),
            EffectKind::Quiz => EffectParameters::Quiz(QuizParameters::default()),
            EffectKind::PanZoom => EffectParameters::PanZoom(PanZoomParameters::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectParameters {
    Spotlight(SpotlightParameters),
    Text(TextParameters),
    Tooltip(TooltipParameters),
    Video(VideoParameters),
    Audio(AudioParameters),
    Quiz(QuizParameters),
    PanZoom(PanZoomParameters),
}

impl EffectParameters {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParameters::Spotlight(_) => EffectKind::Spotlight,
            EffectParameters::Text(_) => EffectKind::Text,
            EffectParameters::Tooltip(_) => EffectKind::Tooltip,
            EffectParameters::Video(_) => EffectKind::Video,
            EffectParameters::Audio(_) => EffectKind::Audio,
            EffectParameters::Quiz(_) => EffectKind::Quiz,
            EffectParameters::PanZoom(_) => EffectKind::PanZoom,
        }
    }

    /// Fill a missing focus point from the target hotspot's position.
    pub fn anchor_to(&mut self, point: PercentPoint) {
        match self {
            EffectParameters::Spotlight(spotlight) if spotlight.center.is_none() => {
                spotlight.center = Some(point);
            }
            EffectParameters::PanZoom(pan_zoom) if pan_zoom.target.is_none() => {
                pan_zoom.target = Some(point);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpotlightShape {
    #[default]
    Circle,
    Rectangle,
    Oval,
}

impl SpotlightShape {
    pub fn from_legacy(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "rectangle" | "square" => SpotlightShape::Rectangle,
            "oval" | "ellipse" => SpotlightShape::Oval,
            _ => SpotlightShape::Circle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotlightParameters {
    pub shape: SpotlightShape,
    /// Centre in percent of the canvas. `None` until anchored.
    pub center: Option<PercentPoint>,
    pub width: f64,
    pub height: f64,
    /// How dark the area outside the spotlight gets (0-100).
    pub dim_percentage: f64,
    pub pulse: bool,
}

impl Default for SpotlightParameters {
    fn default() -> Self {
        SpotlightParameters {
            shape: SpotlightShape::Circle,
            center: None,
            width: 120.0,
            height: 120.0,
            dim_percentage: 70.0,
            pulse: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextParameters {
    pub content: String,
    /// Explicit placement in percent of the canvas; next to the element when `None`.
    pub placement: Option<PercentPoint>,
    pub width: f64,
    pub height: f64,
}

impl Default for TextParameters {
    fn default() -> Self {
        TextParameters {
            content: String::new(),
            placement: None,
            width: 300.0,
            height: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipParameters {
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "camelCase")]
pub enum VideoSource {
    Url { url: String },
    Youtube {
        #[serde(rename = "videoId")]
        video_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    pub source: Option<VideoSource>,
    pub autoplay: bool,
    pub loop_playback: bool,
}

impl Default for VideoParameters {
    fn default() -> Self {
        VideoParameters {
            source: None,
            autoplay: true,
            loop_playback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParameters {
    pub url: String,
    pub autoplay: bool,
    /// 0.0 - 1.0
    pub volume: f64,
}

impl Default for AudioParameters {
    fn default() -> Self {
        AudioParameters {
            url: String::new(),
            autoplay: true,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizParameters {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`. Any answer satisfies a quiz without one.
    pub correct_answer: Option<usize>,
    pub explanation: Option<String>,
    pub shuffle_options: bool,
    pub blocks_advance: bool,
    pub allow_skip: bool,
}

impl Default for QuizParameters {
    fn default() -> Self {
        QuizParameters {
            question: String::new(),
            options: Vec::new(),
            correct_answer: None,
            explanation: None,
            shuffle_options: false,
            blocks_advance: true,
            allow_skip: false,
        }
    }
}

impl QuizParameters {
    pub fn accepts(&self, answer: usize) -> bool {
        answer < self.options.len() && self.correct_answer.map_or(true, |correct| correct == answer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanZoomParameters {
    pub zoom: f64,
    /// Focus point in percent of the canvas. `None` until anchored.
    pub target: Option<PercentPoint>,
    pub smooth: bool,
}

impl Default for PanZoomParameters {
    fn default() -> Self {
        PanZoomParameters {
            zoom: 2.0,
            target: None,
            smooth: true,
        }
    }
}
