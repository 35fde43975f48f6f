use serde::Serialize;
use tracing::debug;

use crate::constants::DEFAULT_MAP_ZOOM;
use crate::gazetteer::Coordinate;
use crate::resolver::ResolutionResult;

/// What the map pane should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MapView {
    /// Static placeholder with setup instructions for the maps API key.
    Unconfigured { city: String },
    Loading { city: String },
    ErrorDisplay { city: String, message: String },
    /// Live map. A new `render_version` means the surface must be rebuilt,
    /// not just re-centered.
    MapReady {
        city: String,
        coordinate: Coordinate,
        label: String,
        zoom: u8,
        render_version: u64,
    },
}

/// Projects resolver state onto the map pane and owns the render version.
#[derive(Debug, Default)]
pub struct MapRenderController {
    render_version: u64,
    rendered: Option<Coordinate>,
}

impl MapRenderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_version(&self) -> u64 {
        self.render_version
    }

    pub fn project(&mut self, result: &ResolutionResult, has_credential: bool) -> MapView {
        let city = result.query().unwrap_or_default().to_string();
        match result {
            ResolutionResult::Found { coordinate, .. } => {
                if self.rendered != Some(*coordinate) {
                    self.render_version += 1;
                    self.rendered = Some(*coordinate);
                    debug!(%city, render_version = self.render_version, "Map surface rebuilt");
                }
                MapView::MapReady {
                    city,
                    coordinate: *coordinate,
                    label: coordinate.to_string(),
                    zoom: DEFAULT_MAP_ZOOM,
                    render_version: self.render_version,
                }
            }
            ResolutionResult::Pending { .. } => MapView::Loading { city },
            ResolutionResult::Error { message, .. } => MapView::ErrorDisplay {
                city,
                message: message.clone(),
            },
            ResolutionResult::NotFound { .. } if has_credential => {
                let message = format!("Could not find location for \"{}\"", city);
                MapView::ErrorDisplay { city, message }
            }
            ResolutionResult::NotFound { .. } | ResolutionResult::Idle => {
                MapView::Unconfigured { city }
            }
        }
    }
}
