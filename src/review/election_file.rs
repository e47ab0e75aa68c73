use crate::review::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fs;
use std::sync::Arc;

use write_in_adjudication::{AdjudicationEngine, EngineConfig, StoreSnapshot, Viewport, WriteInStore};

/// Overrides of the engine defaults. Every field is optional.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionSettings {
    #[serde(rename = "imageScale", skip_serializing_if = "Option::is_none")]
    pub image_scale: Option<f64>,
    #[serde(rename = "viewportWidth", skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<f64>,
    #[serde(rename = "viewportHeight", skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<f64>,
    #[serde(
        rename = "pruneUnreferencedCandidates",
        skip_serializing_if = "Option::is_none"
    )]
    pub prune_unreferenced_candidates: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ElectionSettings>,
    #[serde(flatten)]
    pub snapshot: StoreSnapshot,
}

fn positive(name: &str, x: Option<f64>, default: f64) -> ReviewResult<f64> {
    match x {
        None => Ok(default),
        Some(v) if v > 0.0 && v.is_finite() => Ok(v),
        Some(v) => whatever!("Setting {} must be a positive number, got {}", name, v),
    }
}

pub fn validate_settings(settings: &Option<ElectionSettings>) -> ReviewResult<EngineConfig> {
    let default = EngineConfig::DEFAULT;
    let s = match settings {
        Some(s) => s,
        None => return Ok(default),
    };
    Ok(EngineConfig {
        image_scale: positive("imageScale", s.image_scale, default.image_scale)?,
        viewport: Viewport {
            width: positive("viewportWidth", s.viewport_width, default.viewport.width)?,
            height: positive("viewportHeight", s.viewport_height, default.viewport.height)?,
        },
        prune_unreferenced_candidates: s
            .prune_unreferenced_candidates
            .unwrap_or(default.prune_unreferenced_candidates),
    })
}

pub fn read_election_file(path: &str) -> ReviewResult<ElectionFile> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_election_file: {} bytes from {}", contents.len(), path);
    let election: ElectionFile =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(election)
}

impl ElectionFile {
    /// Loads the election into a store and an engine configured by the settings.
    pub fn into_engine(self) -> ReviewResult<(AdjudicationEngine, Option<ElectionSettings>)> {
        let config = validate_settings(&self.settings)?;
        info!("engine config: {:?}", config);
        let store = WriteInStore::from_snapshot(self.snapshot).context(AdjudicationSnafu {})?;
        Ok((AdjudicationEngine::new(Arc::new(store), config), self.settings))
    }

    pub fn from_engine(engine: &AdjudicationEngine, settings: Option<ElectionSettings>) -> ElectionFile {
        ElectionFile {
            settings,
            snapshot: engine.store().snapshot(),
        }
    }
}

/// Writes the election to a file, or to the standard output for 'stdout'.
pub fn write_election_file(election: &ElectionFile, out: &str) -> ReviewResult<()> {
    let pretty_js = serde_json::to_string_pretty(election).context(SerializingJsonSnafu {})?;
    if out == "stdout" {
        println!("{}", pretty_js);
    } else {
        fs::write(out, pretty_js).context(WritingJsonSnafu { path: out })?;
        info!("write_election_file: wrote {}", out);
    }
    Ok(())
}
