// Legacy project -> slide deck migration.
// Pure and deterministic: same input and options give the same deck. Per-item problems
// become warnings; only a structurally invalid project is an error.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::catalog::{CatalogMatch, EventCatalog};
use crate::deck::*;
use crate::error::EngineError;
use crate::geometry::GeometryResolver;
use crate::ids::IdGenerator;
use crate::legacy::{LegacyHotspot, LegacyList, LegacyProject, LegacyTimelineEvent, RejectedItem};
use crate::types::*;

/// A persisted project in either shape.
#[derive(Debug, Clone)]
pub enum ProjectSource {
    Legacy(LegacyProject),
    Deck(SlideDeck),
}

impl ProjectSource {
    /// Classify a project object. Anything carrying `slides` must be a current-version
    /// deck; everything else is read as a legacy project.
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let Value::Object(map) = &value else {
            return Err(EngineError::InvalidProject(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        };

        if map.contains_key("slides") {
            let version = map
                .get("metadata")
                .and_then(|m| m.get("version"))
                .and_then(Value::as_u64);
            if version != Some(u64::from(DECK_VERSION)) {
                return Err(EngineError::InvalidProject(format!(
                    "unsupported slide deck version {:?}, expected {}",
                    version, DECK_VERSION
                )));
            }
            return serde_json::from_value(value)
                .map(ProjectSource::Deck)
                .map_err(|e| EngineError::InvalidProject(format!("malformed slide deck: {}", e)));
        }

        serde_json::from_value(value)
            .map(ProjectSource::Legacy)
            .map_err(|e| EngineError::InvalidProject(format!("malformed legacy project: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidProject(format!("not valid JSON: {}", e)))?;
        Self::from_value(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Why an item was skipped or adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    MalformedHotspot,
    MissingId,
    DuplicateId,
    DanglingTarget,
    UnknownEventType,
    UnmappableEvent,
    MalformedEvent,
    MarkerOutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationWarning {
    pub item_id: String,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Snapshot of one migration run. Not persisted with the deck.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    slide_deck: SlideDeck,
    warnings: Vec<MigrationWarning>,
    unmapped_event_count: usize,
    skipped_hotspot_count: usize,
    element_count: usize,
    already_migrated: bool,
}

impl MigrationResult {
    fn already_migrated(deck: SlideDeck) -> Self {
        MigrationResult {
            element_count: deck.element_count(),
            slide_deck: deck,
            warnings: Vec::new(),
            unmapped_event_count: 0,
            skipped_hotspot_count: 0,
            already_migrated: true,
        }
    }

    pub fn slide_deck(&self) -> &SlideDeck {
        &self.slide_deck
    }

    pub fn into_slide_deck(self) -> SlideDeck {
        self.slide_deck
    }

    pub fn warnings(&self) -> &[MigrationWarning] {
        &self.warnings
    }

    pub fn unmapped_event_count(&self) -> usize {
        self.unmapped_event_count
    }

    pub fn skipped_hotspot_count(&self) -> usize {
        self.skipped_hotspot_count
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn was_already_migrated(&self) -> bool {
        self.already_migrated
    }

    /// Non-blocking, user-facing summary. `None` when there is nothing to report.
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.unmapped_event_count > 0 {
            parts.push(format!(
                "{} {} could not be converted and {} skipped",
                self.unmapped_event_count,
                plural(self.unmapped_event_count, "event", "events"),
                plural(self.unmapped_event_count, "was", "were"),
            ));
        }
        if self.skipped_hotspot_count > 0 {
            parts.push(format!(
                "{} {} could not be placed and {} skipped",
                self.skipped_hotspot_count,
                plural(self.skipped_hotspot_count, "hotspot", "hotspots"),
                plural(self.skipped_hotspot_count, "was", "were"),
            ));
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Converts legacy projects into slide decks.
#[derive(Debug, Clone, Default)]
pub struct MigrationEngine {
    catalog: EventCatalog,
}

impl MigrationEngine {
    pub fn new(catalog: EventCatalog) -> Self {
        MigrationEngine { catalog }
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    /// Migrate a project of either shape. A current deck comes back unchanged.
    pub fn migrate(
        &self,
        source: ProjectSource,
        project_name: &str,
        options: &MigrationOptions,
    ) -> Result<MigrationResult, EngineError> {
        match source {
            ProjectSource::Deck(deck) => {
                debug!("Project '{}' is already a slide deck, skipping migration", project_name);
                Ok(MigrationResult::already_migrated(deck))
            }
            ProjectSource::Legacy(project) => self.migrate_legacy(&project, project_name, options),
        }
    }

    /// Parse and migrate a raw project object.
    pub fn migrate_value(
        &self,
        project: Value,
        project_name: &str,
        options: &MigrationOptions,
    ) -> Result<MigrationResult, EngineError> {
        self.migrate(ProjectSource::from_value(project)?, project_name, options)
    }

    pub fn migrate_legacy(
        &self,
        project: &LegacyProject,
        project_name: &str,
        options: &MigrationOptions,
    ) -> Result<MigrationResult, EngineError> {
        options.validate()?;

        let mut run = MigrationRun::new(&self.catalog, project, options)?;
        for item in &project.rejected {
            run.add_rejected(item);
        }
        for hotspot in &project.hotspots {
            run.add_hotspot(hotspot)?;
        }
        for (sequence, event) in project.timeline_events.iter().enumerate() {
            run.add_event(event, sequence)?;
        }
        let result = run.finish(project, project_name);

        info!(
            "Migrated '{}': {} elements, {} interactions, {} unmapped events, {} warnings",
            project_name,
            result.element_count,
            result.slide_deck.interaction_count(),
            result.unmapped_event_count,
            result.warnings.len()
        );
        Ok(result)
    }
}

/// Where a hotspot ended up.
struct Placement {
    element_index: usize,
    point: PercentPoint,
}

/// State of a single migration. Dropped when the result is built.
struct MigrationRun<'a> {
    catalog: &'a EventCatalog,
    options: &'a MigrationOptions,
    resolver: GeometryResolver,
    ids: IdGenerator,
    element_ids: HashSet<String>,
    interaction_ids: HashSet<String>,
    placements: HashMap<String, Placement>,
    controller_index: Option<usize>,
    elements: Vec<SlideElement>,
    warnings: Vec<MigrationWarning>,
    unmapped_event_count: usize,
    skipped_hotspot_count: usize,
}

impl<'a> MigrationRun<'a> {
    fn new(
        catalog: &'a EventCatalog,
        project: &LegacyProject,
        options: &'a MigrationOptions,
    ) -> Result<Self, EngineError> {
        let input_ids = project
            .hotspots
            .iter()
            .map(|h| h.id.clone())
            .chain(project.timeline_events.iter().map(|e| e.id.clone()))
            .filter(|id| !id.is_empty());

        Ok(MigrationRun {
            catalog,
            options,
            resolver: GeometryResolver::new(options.scale)?,
            ids: IdGenerator::reserving(input_ids),
            element_ids: HashSet::new(),
            interaction_ids: HashSet::new(),
            placements: HashMap::new(),
            controller_index: None,
            elements: Vec::new(),
            warnings: Vec::new(),
            unmapped_event_count: 0,
            skipped_hotspot_count: 0,
        })
    }

    fn warn(&mut self, item_id: &str, kind: WarningKind, message: String) {
        warn!("{}", message);
        self.warnings.push(MigrationWarning {
            item_id: item_id.to_string(),
            kind,
            message,
        });
    }

    /// Keep `original` when ids are preserved and it is unused, otherwise mint one.
    fn assign_id(&mut self, original: &str, kind: &str, is_interaction: bool) -> String {
        if !self.options.preserve_hotspot_ids {
            return self.ids.fresh(kind);
        }
        if original.is_empty() {
            let id = self.ids.fresh(kind);
            self.warn(
                &id,
                WarningKind::MissingId,
                format!("A {} had no id and was assigned '{}'", kind, id),
            );
            return id;
        }
        let used = if is_interaction {
            &mut self.interaction_ids
        } else {
            &mut self.element_ids
        };
        if used.insert(original.to_string()) {
            return original.to_string();
        }
        let id = self.ids.fresh(kind);
        self.warn(
            original,
            WarningKind::DuplicateId,
            format!("Duplicate {} id '{}' was renamed to '{}'", kind, original, id),
        );
        id
    }

    /// Entries that were not objects still count against their list.
    fn add_rejected(&mut self, item: &RejectedItem) {
        match item.list {
            LegacyList::Hotspots => {
                self.skipped_hotspot_count += 1;
                self.warn(
                    &format!("hotspots[{}]", item.index),
                    WarningKind::MalformedHotspot,
                    format!("Hotspot entry {} is unreadable ({}) and was skipped", item.index, item.reason),
                );
            }
            LegacyList::TimelineEvents => {
                self.unmapped_event_count += 1;
                self.warn(
                    &format!("timelineEvents[{}]", item.index),
                    WarningKind::MalformedEvent,
                    format!("Event entry {} is unreadable ({}) and was skipped", item.index, item.reason),
                );
            }
        }
    }

    fn add_hotspot(&mut self, hotspot: &LegacyHotspot) -> Result<(), EngineError> {
        let Some(point) = hotspot.position() else {
            self.skipped_hotspot_count += 1;
            self.warn(
                &hotspot.id,
                WarningKind::MalformedHotspot,
                format!(
                    "Hotspot '{}' has missing or out-of-range coordinates and was skipped",
                    hotspot.id
                ),
            );
            return Ok(());
        };

        let canvas = self.options.canvas();
        let marker_size = self.options.marker_size * hotspot.size_factor();
        let rect = self
            .resolver
            .marker_rect(point, Some(canvas), marker_size)?
            .ok_or_else(|| EngineError::InvalidConfig("canvas size is unusable".to_string()))?;
        let position = self.resolver.to_responsive(&rect)?;

        let id = self.assign_id(&hotspot.id, "element", false);
        if !position.fits_within(canvas, self.resolver.scale()) {
            self.warn(
                &id,
                WarningKind::MarkerOutOfBounds,
                format!("Hotspot '{}' marker does not fit inside the canvas", hotspot.id),
            );
        }

        if !hotspot.id.is_empty() && !self.placements.contains_key(&hotspot.id) {
            self.placements.insert(
                hotspot.id.clone(),
                Placement {
                    element_index: self.elements.len(),
                    point,
                },
            );
        }

        self.elements.push(SlideElement {
            id,
            kind: ElementKind::Hotspot,
            position,
            style: ElementStyle {
                color: hotspot.color.clone(),
                pulse: hotspot.pulse_animation,
            },
            content: ElementContent {
                title: hotspot.title.clone(),
                description: hotspot.description.clone(),
            },
            interactions: Vec::new(),
            visible: true,
        });
        Ok(())
    }

    /// Index of the hidden element that owns untargeted step interactions.
    fn controller(&mut self) -> Result<usize, EngineError> {
        if let Some(index) = self.controller_index {
            return Ok(index);
        }
        let canvas = self.options.canvas();
        let rect = Rect::new(0.0, 0.0, canvas.width, canvas.height)?;
        let id = self.ids.fresh("step-controller");
        self.elements.push(SlideElement {
            id,
            kind: ElementKind::StepController,
            position: self.resolver.to_responsive(&rect)?,
            style: ElementStyle::default(),
            content: ElementContent::default(),
            interactions: Vec::new(),
            visible: false,
        });
        let index = self.elements.len() - 1;
        self.controller_index = Some(index);
        Ok(index)
    }

    fn skip_event(&mut self, event: &LegacyTimelineEvent, kind: WarningKind, message: String) {
        self.unmapped_event_count += 1;
        self.warn(&event.id, kind, message);
    }

    fn add_event(&mut self, event: &LegacyTimelineEvent, sequence: usize) -> Result<(), EngineError> {
        let Some(step) = event.step.filter(|s| *s >= 1) else {
            self.skip_event(
                event,
                WarningKind::MalformedEvent,
                format!("Event '{}' has no valid step and was skipped", event.id),
            );
            return Ok(());
        };

        let (owner, anchor) = match event.target_id.as_deref().filter(|t| !t.is_empty()) {
            Some(target) => match self.placements.get(target) {
                Some(placement) => (placement.element_index, Some(placement.point)),
                None => {
                    self.skip_event(
                        event,
                        WarningKind::DanglingTarget,
                        format!(
                            "Event '{}' targets unknown hotspot '{}' and was skipped",
                            event.id, target
                        ),
                    );
                    return Ok(());
                }
            },
            None => (self.controller()?, None),
        };

        let mut effect = match self.catalog.migrate(event) {
            CatalogMatch::Mapped(effect) => effect,
            CatalogMatch::Unmappable => {
                self.skip_event(
                    event,
                    WarningKind::UnmappableEvent,
                    format!(
                        "Event '{}' of type {} has no slide equivalent and was skipped",
                        event.id, event.event_type
                    ),
                );
                return Ok(());
            }
            CatalogMatch::Unknown => {
                self.skip_event(
                    event,
                    WarningKind::UnknownEventType,
                    format!(
                        "Event '{}' has unknown type '{}' and was skipped",
                        event.id, event.event_type
                    ),
                );
                return Ok(());
            }
        };

        if let Some(point) = anchor {
            effect.parameters.anchor_to(point);
        }
        if !self.options.preserve_hotspot_ids || event.id.is_empty() || !self.ids.claim(&effect.id) {
            effect.id = self.ids.fresh("effect");
        }

        let interaction = ElementInteraction {
            id: self.assign_id(&event.id, "interaction", true),
            trigger: self.catalog.trigger_for(&event.event_type, step, sequence),
            effect,
        };
        self.elements[owner].interactions.push(interaction);
        Ok(())
    }

    fn finish(mut self, project: &LegacyProject, project_name: &str) -> MigrationResult {
        let stamp = self.options.created_at.unwrap_or_default();
        let background_media = project
            .background_image
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| BackgroundMedia {
                url: url.clone(),
                media_type: project
                    .background_type
                    .clone()
                    .unwrap_or_else(|| "image".to_string()),
            });

        let slide = InteractiveSlide {
            id: self.ids.fresh("slide"),
            title: self.options.default_slide_title.clone(),
            elements: std::mem::take(&mut self.elements),
            background_media,
            layout: SlideLayout {
                width: self.options.canvas_width,
                height: self.options.canvas_height,
            },
        };
        let deck = SlideDeck {
            id: self.ids.fresh("deck"),
            title: if project_name.trim().is_empty() {
                "Untitled project".to_string()
            } else {
                project_name.to_string()
            },
            slides: vec![slide],
            metadata: DeckMetadata {
                version: DECK_VERSION,
                created_at: stamp,
                updated_at: stamp,
                migrated_from_legacy: true,
            },
        };

        MigrationResult {
            element_count: deck.element_count(),
            slide_deck: deck,
            warnings: self.warnings,
            unmapped_event_count: self.unmapped_event_count,
            skipped_hotspot_count: self.skipped_hotspot_count,
            already_migrated: false,
        }
    }
}
