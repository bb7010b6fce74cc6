// Event catalog: legacy event kind -> label, effect kind, natural trigger, migrate fn.
// Entries are independent; registering a kind never touches migration or playback.

use std::collections::BTreeMap;

use crate::deck::*;
use crate::legacy::LegacyTimelineEvent;
use crate::types::PercentPoint;

/// Turns a legacy event into effect parameters, or `None` when it has no counterpart.
pub type MigrateFn = fn(&LegacyTimelineEvent) -> Option<EffectParameters>;

/// How a migrated interaction is fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaturalTrigger {
    /// Fired by the scheduler at the event's step.
    Step,
    Click,
    Hover,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub label: &'static str,
    /// Effect kind produced, `None` for kinds registered as unmappable.
    pub effect_kind: Option<EffectKind>,
    pub trigger: NaturalTrigger,
    pub migrate: MigrateFn,
}

/// Outcome of looking an event up in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogMatch {
    Mapped(Effect),
    /// Known kind, but this event has no effect counterpart.
    Unmappable,
    /// Kind not registered.
    Unknown,
}

/// Registry of legacy event kinds.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl EventCatalog {
    /// Catalog with no kinds registered.
    pub fn empty() -> Self {
        EventCatalog {
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, entry: CatalogEntry) -> &mut Self {
        self.entries.insert(kind.into(), entry);
        self
    }

    pub fn entry(&self, kind: &str) -> Option<&CatalogEntry> {
        self.entries.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Migrate one event. The effect id is derived from the event id; migration may
    /// replace it.
    pub fn migrate(&self, event: &LegacyTimelineEvent) -> CatalogMatch {
        let Some(entry) = self.entries.get(&event.event_type) else {
            return CatalogMatch::Unknown;
        };
        match (entry.migrate)(event) {
            Some(parameters) => CatalogMatch::Mapped(Effect {
                id: format!("{}-effect", event.id),
                duration_ms: event.duration,
                parameters,
            }),
            None => CatalogMatch::Unmappable,
        }
    }

    /// Trigger for an event of `kind` at `step`; `sequence` is its index in the legacy list.
    pub fn trigger_for(&self, kind: &str, step: u32, sequence: usize) -> Trigger {
        match self.entries.get(kind).map(|e| e.trigger) {
            Some(NaturalTrigger::Click) => Trigger::Click,
            Some(NaturalTrigger::Hover) => Trigger::Hover,
            Some(NaturalTrigger::Step) | None => Trigger::OnStep { step, sequence },
        }
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        let mut catalog = EventCatalog::empty();
        let step = |label, kind, migrate: MigrateFn| CatalogEntry {
            label,
            effect_kind: kind,
            trigger: NaturalTrigger::Step,
            migrate,
        };
        catalog
            .register("SHOW_TEXT", step("Show text", Some(EffectKind::Text), migrate_text))
            .register("SHOW_MESSAGE", step("Show message", Some(EffectKind::Text), migrate_text))
            .register("SPOTLIGHT", step("Spotlight", Some(EffectKind::Spotlight), migrate_spotlight))
            .register("HIGHLIGHT_HOTSPOT", step("Highlight hotspot", Some(EffectKind::Spotlight), migrate_spotlight))
            .register("PULSE_HOTSPOT", step("Pulse hotspot", Some(EffectKind::Spotlight), migrate_pulse))
            .register("PULSE_HIGHLIGHT", step("Pulse highlight", Some(EffectKind::Spotlight), migrate_pulse))
            .register("SHOW_HOTSPOT", step("Show hotspot", Some(EffectKind::Tooltip), migrate_tooltip))
            .register("HIDE_HOTSPOT", step("Hide hotspot", None, |_| None))
            .register("PAN_ZOOM", step("Pan & zoom", Some(EffectKind::PanZoom), migrate_pan_zoom))
            .register("PAN_ZOOM_TO_HOTSPOT", step("Pan & zoom to hotspot", Some(EffectKind::PanZoom), migrate_pan_zoom))
            .register("QUIZ", step("Quiz", Some(EffectKind::Quiz), migrate_quiz))
            .register("PLAY_VIDEO", step("Play video", Some(EffectKind::Video), migrate_video))
            .register("SHOW_VIDEO", step("Show video", Some(EffectKind::Video), migrate_video))
            .register("SHOW_YOUTUBE", step("Show YouTube video", Some(EffectKind::Video), migrate_video))
            .register("PLAY_AUDIO", step("Play audio", Some(EffectKind::Audio), migrate_audio))
            .register("SHOW_AUDIO_MODAL", step("Audio player", Some(EffectKind::Audio), migrate_audio));
        catalog
    }
}

fn point(x: Option<f64>, y: Option<f64>) -> Option<PercentPoint> {
    Some(PercentPoint::new(x?, y?))
}

fn migrate_text(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let defaults = TextParameters::default();
    let content = event
        .text_content
        .clone()
        .or_else(|| event.message.clone())
        .unwrap_or_default();
    Some(EffectParameters::Text(TextParameters {
        content,
        placement: point(event.text_x, event.text_y),
        width: event.text_width.unwrap_or(defaults.width),
        height: event.text_height.unwrap_or(defaults.height),
    }))
}

fn migrate_spotlight(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let defaults = SpotlightParameters::default();
    let shape = event
        .spotlight_shape
        .as_deref()
        .or(event.highlight_shape.as_deref())
        .map(SpotlightShape::from_legacy)
        .unwrap_or_default();
    let diameter = event.highlight_radius.map(|r| r * 2.0);
    Some(EffectParameters::Spotlight(SpotlightParameters {
        shape,
        center: point(event.spotlight_x, event.spotlight_y),
        width: event.spotlight_width.or(diameter).unwrap_or(defaults.width),
        height: event.spotlight_height.or(diameter).unwrap_or(defaults.height),
        dim_percentage: event
            .dim_percentage
            .map(|d| d.clamp(0.0, 100.0))
            .unwrap_or(defaults.dim_percentage),
        pulse: false,
    }))
}

fn migrate_pulse(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    match migrate_spotlight(event)? {
        EffectParameters::Spotlight(spotlight) => Some(EffectParameters::Spotlight(SpotlightParameters {
            pulse: true,
            ..spotlight
        })),
        other => Some(other),
    }
}

fn migrate_tooltip(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    Some(EffectParameters::Tooltip(TooltipParameters {
        title: (!event.name.is_empty()).then(|| event.name.clone()),
        text: event.message.clone().unwrap_or_default(),
    }))
}

fn migrate_pan_zoom(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let defaults = PanZoomParameters::default();
    Some(EffectParameters::PanZoom(PanZoomParameters {
        zoom: event
            .zoom_level
            .or(event.zoom_factor)
            .filter(|z| *z > 0.0)
            .unwrap_or(defaults.zoom),
        target: point(event.target_x, event.target_y),
        smooth: event.smooth.unwrap_or(defaults.smooth),
    }))
}

fn migrate_quiz(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let question = event.quiz_question.clone().filter(|q| !q.trim().is_empty())?;
    if event.quiz_options.is_empty() {
        return None;
    }
    let defaults = QuizParameters::default();
    let correct_answer = event
        .quiz_correct_answer
        .filter(|i| *i < event.quiz_options.len());
    Some(EffectParameters::Quiz(QuizParameters {
        question,
        options: event.quiz_options.clone(),
        correct_answer,
        explanation: event.quiz_explanation.clone(),
        shuffle_options: event.quiz_shuffle_options.unwrap_or(defaults.shuffle_options),
        blocks_advance: event.quiz_blocks_advance.unwrap_or(defaults.blocks_advance),
        allow_skip: event.quiz_allow_skip.unwrap_or(defaults.allow_skip),
    }))
}

fn migrate_video(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let defaults = VideoParameters::default();
    let source = match (&event.youtube_video_id, &event.video_url) {
        (Some(video_id), _) if !video_id.is_empty() => Some(VideoSource::Youtube {
            video_id: video_id.clone(),
        }),
        (_, Some(url)) if !url.is_empty() => Some(VideoSource::Url { url: url.clone() }),
        _ => None,
    }?;
    Some(EffectParameters::Video(VideoParameters {
        source: Some(source),
        autoplay: event.autoplay.unwrap_or(defaults.autoplay),
        loop_playback: event.loop_playback.unwrap_or(defaults.loop_playback),
    }))
}

fn migrate_audio(event: &LegacyTimelineEvent) -> Option<EffectParameters> {
    let defaults = AudioParameters::default();
    let url = event.audio_url.clone().filter(|u| !u.is_empty())?;
    Some(EffectParameters::Audio(AudioParameters {
        url,
        autoplay: event.autoplay.unwrap_or(defaults.autoplay),
        volume: event
            .volume
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.volume),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: &str) -> LegacyTimelineEvent {
        LegacyTimelineEvent {
            id: "e1".into(),
            step: Some(1),
            event_type: kind.into(),
            ..Default::default()
        }
    }

    #[test]
    fn show_text_maps_to_text() {
        let mut e = event("SHOW_TEXT");
        e.text_content = Some("Open the valve".into());
        e.duration = Some(4000);
        let CatalogMatch::Mapped(effect) = EventCatalog::default().migrate(&e) else {
            panic!("expected a mapped effect");
        };
        assert_eq!(effect.kind(), EffectKind::Text);
        assert_eq!(effect.id, "e1-effect");
        assert_eq!(effect.duration_ms, Some(4000));
        assert!(matches!(
            effect.parameters,
            EffectParameters::Text(TextParameters { ref content, .. }) if content == "Open the valve"
        ));
    }

    #[test]
    fn unknown_kind_is_reported_not_thrown() {
        assert_eq!(EventCatalog::default().migrate(&event("TELEPORT")), CatalogMatch::Unknown);
    }

    #[test]
    fn hide_hotspot_is_unmappable() {
        let catalog = EventCatalog::default();
        assert_eq!(catalog.migrate(&event("HIDE_HOTSPOT")), CatalogMatch::Unmappable);
        assert!(catalog.entry("HIDE_HOTSPOT").unwrap().effect_kind.is_none());
    }

    #[test]
    fn quiz_without_options_is_unmappable() {
        let mut e = event("QUIZ");
        e.quiz_question = Some("Which valve?".into());
        assert_eq!(EventCatalog::default().migrate(&e), CatalogMatch::Unmappable);

        e.quiz_options = vec!["Left".into(), "Right".into()];
        e.quiz_correct_answer = Some(5);
        let CatalogMatch::Mapped(effect) = EventCatalog::default().migrate(&e) else {
            panic!("expected a mapped quiz");
        };
        let quiz = effect.as_quiz().unwrap();
        assert_eq!(quiz.correct_answer, None);
        assert!(quiz.blocks_advance);
        assert!(effect.blocks_advance());
    }

    #[test]
    fn youtube_wins_over_url() {
        let mut e = event("SHOW_YOUTUBE");
        e.youtube_video_id = Some("abc123".into());
        e.video_url = Some("https://cdn/clip.mp4".into());
        let CatalogMatch::Mapped(effect) = EventCatalog::default().migrate(&e) else {
            panic!("expected a mapped video");
        };
        assert!(matches!(
            effect.parameters,
            EffectParameters::Video(VideoParameters {
                source: Some(VideoSource::Youtube { .. }),
                ..
            })
        ));
    }

    #[test]
    fn highlight_radius_becomes_diameter() {
        let mut e = event("HIGHLIGHT_HOTSPOT");
        e.highlight_radius = Some(30.0);
        e.dim_percentage = Some(150.0);
        let CatalogMatch::Mapped(effect) = EventCatalog::default().migrate(&e) else {
            panic!("expected a mapped spotlight");
        };
        let EffectParameters::Spotlight(spotlight) = effect.parameters else {
            panic!("expected spotlight parameters");
        };
        assert_eq!(spotlight.width, 60.0);
        assert_eq!(spotlight.dim_percentage, 100.0);
        assert!(!spotlight.pulse);
    }

    #[test]
    fn registering_a_kind_extends_the_catalog() {
        let mut catalog = EventCatalog::empty();
        catalog.register(
            "SHOW_TIP",
            CatalogEntry {
                label: "Tip",
                effect_kind: Some(EffectKind::Tooltip),
                trigger: NaturalTrigger::Hover,
                migrate: migrate_tooltip,
            },
        );
        assert!(matches!(catalog.migrate(&event("SHOW_TIP")), CatalogMatch::Mapped(_)));
        assert_eq!(catalog.trigger_for("SHOW_TIP", 3, 0), Trigger::Hover);
        assert_eq!(catalog.trigger_for("QUIZ", 3, 7), Trigger::OnStep { step: 3, sequence: 7 });
        assert_eq!(catalog.kinds().collect::<Vec<_>>(), vec!["SHOW_TIP"]);
    }
}
