// module_engine: interactive module Rust/WASM engine
// Legacy hotspot projects in, responsive slide decks out, plus step-based playback.
// JS owns rendering and persistence; everything here is pure apart from the clock.

mod catalog;
mod deck;
mod error;
mod geometry;
mod ids;
mod legacy;
mod migration;
mod scheduler;
mod types;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use catalog::{CatalogEntry, CatalogMatch, EventCatalog, MigrateFn, NaturalTrigger};
pub use deck::*;
pub use error::{EngineError, GeometryError};
pub use geometry::{percent_to_pixel, pixel_to_percent, validate_bounds, GeometryResolver};
pub use ids::IdGenerator;
pub use legacy::{LegacyHotspot, LegacyList, LegacyProject, LegacyTimelineEvent, RejectedItem};
pub use migration::{
    MigrationEngine, MigrationResult, MigrationWarning, ProjectSource, WarningKind,
};
pub use scheduler::{
    Clock, ManualClock, NavOutcome, PlaybackState, QuizOutcome, RejectReason, StateChange,
    StepEvent, Timeline, TimelineScheduler, WasmScheduler,
};
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Migration result as handed to the host, with the user-facing summary attached.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationReport<'a> {
    #[serde(flatten)]
    result: &'a MigrationResult,
    summary: Option<String>,
}

fn migrate_to_json(
    engine: &MigrationEngine,
    project_json: &str,
    project_name: &str,
    options: &MigrationOptions,
) -> Result<String, EngineError> {
    let source = ProjectSource::from_json(project_json)?;
    let result = engine.migrate(source, project_name, options)?;
    let report = MigrationReport {
        summary: result.summary(),
        result: &result,
    };
    Ok(serde_json::to_string(&report)?)
}

/// Host clock stamp for runs that did not pin one.
fn stamped(options: &MigrationOptions) -> MigrationOptions {
    let mut options = options.clone();
    if options.created_at.is_none() {
        options.created_at = Some(Timestamp::from_millis(js_sys::Date::now().max(0.0) as u64));
    }
    options
}

fn to_js_error(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Main engine interface exposed to JavaScript.
/// Projects and results cross the boundary as JSON strings.
#[wasm_bindgen]
pub struct Engine {
    migration: MigrationEngine,
    config: EngineConfig,
}

impl Engine {
    fn from_config(config: EngineConfig) -> Result<Engine, EngineError> {
        config.validate()?;
        Ok(Engine {
            migration: MigrationEngine::default(),
            config,
        })
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        let config: EngineConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        Engine::from_config(config).map_err(to_js_error)
    }

    /// Migrate a project of either shape and return the report JSON:
    /// `{ slideDeck, warnings, unmappedEventCount, skippedHotspotCount, elementCount,
    /// alreadyMigrated, summary }`.
    pub fn migrate_project(&self, project_json: &str, project_name: &str) -> Result<String, JsValue> {
        let options = stamped(&self.config.migration);
        migrate_to_json(&self.migration, project_json, project_name, &options).map_err(to_js_error)
    }

    /// Playback session over a project of either shape, using this engine's playback config.
    pub fn create_scheduler(&self, project_json: &str) -> Result<WasmScheduler, JsValue> {
        WasmScheduler::from_parts(
            project_json,
            &self.migration,
            &self.config.migration,
            self.config.playback.clone(),
        )
    }

    /// Legacy event types the catalog knows, as a JSON array.
    pub fn catalog_kinds(&self) -> Result<String, JsValue> {
        let kinds: Vec<&str> = self.migration.catalog().kinds().collect();
        serde_json::to_string(&kinds)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// One-shot migration without an engine instance. `options_json` may be `"{}"`.
#[wasm_bindgen]
pub fn migrate_project(project_json: &str, project_name: &str, options_json: &str) -> Result<String, JsValue> {
    let options: MigrationOptions = serde_json::from_str(options_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid migration options: {}", e)))?;
    let options = stamped(&options);
    migrate_to_json(&MigrationEngine::default(), project_json, project_name, &options)
        .map_err(to_js_error)
}
