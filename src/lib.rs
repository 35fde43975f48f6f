//! Relocation assistant front end: a chat transcript beside a map of the city
//! being discussed.
//!
//! City strings are resolved by [`resolver::Resolver`], which tries the
//! built-in [`gazetteer::Gazetteer`] before spending a call on the external
//! [`geocode::Geocoder`].

pub mod chat;
pub mod constants;
pub mod gazetteer;
pub mod geocode;
pub mod map_view;
pub mod normalize;
pub mod resolver;
pub mod session;
pub mod web_server;

pub use gazetteer::{Coordinate, Gazetteer};
pub use resolver::{ResolutionResult, Resolver, Source};
