use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    /// `43.6532°N, 79.3832°W`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude < 0.0 { 'S' } else { 'N' };
        let ew = if self.longitude < 0.0 { 'W' } else { 'E' };
        write!(
            f,
            "{:.4}°{}, {:.4}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("duplicate gazetteer key {0:?}")]
    DuplicateKey(String),
    #[error("failed to read gazetteer file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse gazetteer file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only table of known city names. Built once, then shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    index: HashMap<String, usize>,
}

impl Gazetteer {
    /// Builds a table, rejecting repeated keys. Entry order is kept and
    /// decides which entry wins a fuzzy match.
    pub fn from_entries<I>(entries: I) -> Result<Self, GazetteerError>
    where
        I: IntoIterator<Item = GazetteerEntry>,
    {
        let entries: Vec<GazetteerEntry> = entries.into_iter().collect();
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(GazetteerError::DuplicateKey(entry.name.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// Loads a JSON array of `{"name": .., "lat": .., "lng": ..}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, GazetteerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| GazetteerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<GazetteerEntry> =
            serde_json::from_str(&raw).map_err(|source| GazetteerError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(entries)
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Arc<Gazetteer> {
        BUILTIN_GAZETTEER.clone()
    }

    /// Exact, case-sensitive match on a stored key.
    pub fn lookup(&self, key: &str) -> Option<Coordinate> {
        self.index.get(key).map(|&i| self.entries[i].coordinate)
    }

    /// Case-insensitive match where either side may also match through its
    /// comma-stripped prefix. `key` is expected to be lower-cased already.
    pub fn lookup_fuzzy(&self, key: &str) -> Option<Coordinate> {
        if key.is_empty() {
            return None;
        }
        let reduced_key = normalize::reduce(key);
        self.entries
            .iter()
            .find(|entry| {
                let reduced = normalize::reduce(&entry.name);
                entry.name.to_lowercase() == key
                    || reduced == key
                    || (!reduced_key.is_empty() && reduced == reduced_key)
            })
            .map(|entry| entry.coordinate)
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// North America, Europe, Asia, Oceania, South America, Africa
const BUILTIN_CITIES: &[(&str, f64, f64)] = &[
    ("New York", 40.7128, -74.0060),
    ("New York, USA", 40.7128, -74.0060),
    ("Los Angeles", 34.0522, -118.2437),
    ("Chicago", 41.8781, -87.6298),
    ("San Francisco", 37.7749, -122.4194),
    ("Toronto", 43.6532, -79.3832),
    ("Toronto, Canada", 43.6532, -79.3832),
    ("Vancouver", 49.2827, -123.1207),
    ("Montreal", 45.5017, -73.5673),
    ("Seattle", 47.6062, -122.3321),
    ("Boston", 42.3601, -71.0589),
    ("Miami", 25.7617, -80.1918),
    ("Austin", 30.2672, -97.7431),
    ("London", 51.5074, -0.1278),
    ("London, UK", 51.5074, -0.1278),
    ("Paris", 48.8566, 2.3522),
    ("Paris, France", 48.8566, 2.3522),
    ("Berlin", 52.5200, 13.4050),
    ("Madrid", 40.4168, -3.7038),
    ("Rome", 41.9028, 12.4964),
    ("Amsterdam", 52.3676, 4.9041),
    ("Barcelona", 41.3851, 2.1734),
    ("Vienna", 48.2082, 16.3738),
    ("Munich", 48.1351, 11.5820),
    ("Munich, Germany", 48.1351, 11.5820),
    ("Prague", 50.0755, 14.4378),
    ("Lisbon", 38.7223, -9.1393),
    ("Istanbul", 41.0082, 28.9784),
    ("Istanbul, Turkey", 41.0082, 28.9784),
    ("Tokyo", 35.6762, 139.6503),
    ("Tokyo, Japan", 35.6762, 139.6503),
    ("Singapore", 1.3521, 103.8198),
    ("Hong Kong", 22.3193, 114.1694),
    ("Seoul", 37.5665, 126.9780),
    ("Bangkok", 13.7563, 100.5018),
    ("Dubai", 25.2048, 55.2708),
    ("Dubai, UAE", 25.2048, 55.2708),
    ("Mumbai", 19.0760, 72.8777),
    ("Delhi", 28.7041, 77.1025),
    ("New Delhi", 28.6139, 77.2090),
    ("New Delhi, India", 28.6139, 77.2090),
    ("Lahore", 31.5497, 74.3436),
    ("Lahore, Pakistan", 31.5497, 74.3436),
    ("Kuwait", 29.3759, 47.9774),
    ("Kuwait City", 29.3759, 47.9774),
    ("Kuwait, Kuwait", 29.3759, 47.9774),
    ("Shanghai", 31.2304, 121.4737),
    ("Beijing", 39.9042, 116.4074),
    ("Sydney", -33.8688, 151.2093),
    ("Sydney, Australia", -33.8688, 151.2093),
    ("Melbourne", -37.8136, 144.9631),
    ("Auckland", -36.8485, 174.7633),
    ("São Paulo", -23.5505, -46.6333),
    ("Rio de Janeiro", -22.9068, -43.1729),
    ("Buenos Aires", -34.6037, -58.3816),
    ("Lima", -12.0464, -77.0428),
    ("Cairo", 30.0444, 31.2357),
    ("Cape Town", -33.9249, 18.4241),
    ("Johannesburg", -26.2041, 28.0473),
    ("Lagos", 6.5244, 3.3792),
];

lazy_static::lazy_static! {
    static ref BUILTIN_GAZETTEER: Arc<Gazetteer> = Arc::new(
        Gazetteer::from_entries(BUILTIN_CITIES.iter().map(|&(name, lat, lng)| GazetteerEntry {
            name: name.to_string(),
            coordinate: Coordinate::new(lat, lng),
        }))
        .expect("built-in city table has a repeated key"),
    );
}
