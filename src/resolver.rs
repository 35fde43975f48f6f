use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::gazetteer::{Coordinate, Gazetteer};
use crate::geocode::{Candidate, GeocodeError, Geocoder};
use crate::normalize;

/// Shown to the user for every transport failure. The cause only goes to the log.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Failed to fetch location data";

/// Sequence number tagging one resolution request.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gazetteer,
    Geocoder,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Gazetteer => write!(f, "gazetteer"),
            Source::Geocoder => write!(f, "geocoder"),
        }
    }
}

/// Outcome of resolving the most recent city query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionResult {
    Idle,
    Pending {
        query: String,
    },
    Found {
        query: String,
        coordinate: Coordinate,
        source: Source,
    },
    NotFound {
        query: String,
    },
    Error {
        query: String,
        message: String,
    },
}

impl ResolutionResult {
    pub fn query(&self) -> Option<&str> {
        match self {
            ResolutionResult::Idle => None,
            ResolutionResult::Pending { query }
            | ResolutionResult::Found { query, .. }
            | ResolutionResult::NotFound { query }
            | ResolutionResult::Error { query, .. } => Some(query),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResolutionResult::Pending { .. })
    }
}

/// A geocoder call the caller must drive to completion and hand back through
/// [`Resolver::complete`]. Holds no borrow of the resolver, so it can be
/// awaited on another task.
pub struct Lookup {
    ticket: Ticket,
    query: String,
    geocoder: Arc<dyn Geocoder>,
}

impl Lookup {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub async fn run(self) -> LookupOutcome {
        let result = self.geocoder.geocode(self.query.clone()).await;
        LookupOutcome {
            ticket: self.ticket,
            query: self.query,
            result,
        }
    }
}

#[derive(Debug)]
pub struct LookupOutcome {
    pub ticket: Ticket,
    pub query: String,
    pub result: Result<Vec<Candidate>, GeocodeError>,
}

/// What [`Resolver::request`] left to do.
pub enum Step {
    /// The gazetteer (or the missing credential) settled the query.
    Settled,
    /// The query is `Pending` until this lookup completes.
    Lookup(Lookup),
}

impl Step {
    pub fn into_lookup(self) -> Option<Lookup> {
        match self {
            Step::Settled => None,
            Step::Lookup(lookup) => Some(lookup),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    /// A newer query was issued after this lookup started; the result was dropped.
    Stale,
}

/// Tiered city lookup: gazetteer first, the external geocoder last.
///
/// Always reflects the most recently requested query. Outcomes of older
/// lookups are discarded by ticket, whatever order they arrive in.
pub struct Resolver {
    gazetteer: Arc<Gazetteer>,
    geocoder: Option<Arc<dyn Geocoder>>,
    latest: Ticket,
    current: ResolutionResult,
}

impl Resolver {
    pub fn new(gazetteer: Arc<Gazetteer>, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self {
            gazetteer,
            geocoder,
            latest: 0,
            current: ResolutionResult::Idle,
        }
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    pub fn current(&self) -> &ResolutionResult {
        &self.current
    }

    pub fn latest_ticket(&self) -> Ticket {
        self.latest
    }

    /// Gazetteer tiers only. Never touches the network.
    pub fn resolve_local(&self, raw: &str) -> Option<Coordinate> {
        let [trimmed, city_only, trimmed_lower, city_lower] = normalize::derive_keys(raw);
        self.gazetteer
            .lookup(&trimmed)
            .or_else(|| self.gazetteer.lookup(&city_only))
            .or_else(|| self.gazetteer.lookup_fuzzy(&trimmed_lower))
            .or_else(|| self.gazetteer.lookup_fuzzy(&city_lower))
    }

    /// Starts resolving `raw`, superseding whatever came before.
    pub fn request(&mut self, raw: &str) -> Step {
        self.latest += 1;
        let query = raw.trim().to_string();

        if let Some(coordinate) = self.resolve_local(&query) {
            debug!(%query, ?coordinate, "Resolved from gazetteer");
            self.current = ResolutionResult::Found {
                query,
                coordinate,
                source: Source::Gazetteer,
            };
            return Step::Settled;
        }

        let geocoder = match &self.geocoder {
            Some(geocoder) if !query.is_empty() => geocoder.clone(),
            _ => {
                debug!(%query, "Not in gazetteer, no geocoder call made");
                self.current = ResolutionResult::NotFound { query };
                return Step::Settled;
            }
        };

        info!(%query, ticket = self.latest, "Not in gazetteer, asking geocoder");
        self.current = ResolutionResult::Pending {
            query: query.clone(),
        };
        Step::Lookup(Lookup {
            ticket: self.latest,
            query,
            geocoder,
        })
    }

    /// Applies a finished lookup if it still belongs to the latest query.
    pub fn complete(&mut self, outcome: LookupOutcome) -> Applied {
        if outcome.ticket != self.latest {
            debug!(
                query = %outcome.query,
                ticket = outcome.ticket,
                latest = self.latest,
                "Discarding stale geocoding result"
            );
            return Applied::Stale;
        }

        let query = outcome.query;
        self.current = match outcome.result {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(first) => {
                    info!(%query, coordinate = ?first.coordinate, "Resolved via geocoder");
                    ResolutionResult::Found {
                        query,
                        coordinate: first.coordinate,
                        source: Source::Geocoder,
                    }
                }
                None => {
                    info!(%query, "Geocoder found no location");
                    ResolutionResult::NotFound { query }
                }
            },
            Err(e) => {
                warn!(%query, error = ?e, "Geocoding failed");
                ResolutionResult::Error {
                    query,
                    message: TRANSPORT_ERROR_MESSAGE.to_string(),
                }
            }
        };
        Applied::Current
    }

    /// Request and, if needed, await the lookup inline.
    pub async fn resolve(&mut self, raw: &str) -> &ResolutionResult {
        if let Step::Lookup(lookup) = self.request(raw) {
            let outcome = lookup.run().await;
            self.complete(outcome);
        }
        &self.current
    }
}
