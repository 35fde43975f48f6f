//! One browser connection: transcript, resolver and map pane driven by client
//! events. The socket loop in `web_server` runs geocoder lookups on their own
//! tasks and feeds the outcomes back through [`Session::complete`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chat::{ChatMessage, ChatTranscript, Role};
use crate::map_view::{MapRenderController, MapView};
use crate::resolver::{Applied, Lookup, LookupOutcome, Resolver};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Text typed into the chat input.
    Submit { text: String },
    /// One of the example-query shortcuts was clicked.
    Example { index: usize },
    /// Answer from the assistant service, optionally naming the city it is about.
    Assistant {
        text: String,
        #[serde(default)]
        city: Option<String>,
    },
    /// Point the map at a city directly.
    Locate { city: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Message { message: ChatMessage },
    /// A user query for the assistant service.
    Query { text: String },
    Loading { loading: bool },
    Map { view: MapView },
}

/// Events to send back, plus a geocoder call to start, if any.
#[derive(Default)]
pub struct Reaction {
    pub events: Vec<ServerEvent>,
    pub lookup: Option<Lookup>,
}

pub struct Session {
    resolver: Resolver,
    map: MapRenderController,
    transcript: ChatTranscript,
    awaiting_assistant: bool,
}

impl Session {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            map: MapRenderController::new(),
            transcript: ChatTranscript::new(),
            awaiting_assistant: false,
        }
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn map_view(&mut self) -> MapView {
        let has_credential = self.resolver.has_geocoder();
        self.map.project(self.resolver.current(), has_credential)
    }

    pub fn render_version(&self) -> u64 {
        self.map.render_version()
    }

    pub fn handle(&mut self, event: ClientEvent) -> Reaction {
        match event {
            ClientEvent::Submit { text } => {
                self.transcript.input_buffer = text;
                let submitted = self.transcript.submit(self.awaiting_assistant);
                self.on_submitted(submitted)
            }
            ClientEvent::Example { index } => {
                let submitted = self
                    .transcript
                    .choose_example(index, self.awaiting_assistant);
                self.on_submitted(submitted)
            }
            ClientEvent::Assistant { text, city } => {
                self.awaiting_assistant = false;
                let message = self.transcript.push(Role::Assistant, text).clone();
                let mut reaction = Reaction {
                    events: vec![
                        ServerEvent::Loading { loading: false },
                        ServerEvent::Message { message },
                    ],
                    lookup: None,
                };
                if let Some(city) = city.filter(|c| !c.trim().is_empty()) {
                    let located = self.locate(&city);
                    reaction.events.extend(located.events);
                    reaction.lookup = located.lookup;
                }
                reaction
            }
            ClientEvent::Locate { city } => self.locate(&city),
        }
    }

    /// Applies a finished lookup. `None` when it was superseded.
    pub fn complete(&mut self, outcome: LookupOutcome) -> Option<ServerEvent> {
        match self.resolver.complete(outcome) {
            Applied::Current => Some(ServerEvent::Map {
                view: self.map_view(),
            }),
            Applied::Stale => None,
        }
    }

    fn on_submitted(&mut self, submitted: Option<String>) -> Reaction {
        let Some(text) = submitted else {
            debug!("Ignoring empty or concurrent submit");
            return Reaction::default();
        };
        self.awaiting_assistant = true;
        let message = self.transcript.push(Role::User, text.clone()).clone();
        Reaction {
            events: vec![
                ServerEvent::Message { message },
                ServerEvent::Loading { loading: true },
                ServerEvent::Query { text },
            ],
            lookup: None,
        }
    }

    fn locate(&mut self, city: &str) -> Reaction {
        info!(%city, "Locating city");
        let lookup = self.resolver.request(city).into_lookup();
        Reaction {
            events: vec![ServerEvent::Map {
                view: self.map_view(),
            }],
            lookup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::{Coordinate, Gazetteer};
    use crate::geocode::{Candidate, GeocodeFuture, Geocoder};
    use std::sync::Arc;

    /// Puts every query at (1.0, 2.0).
    struct FixedGeocoder;

    impl Geocoder for FixedGeocoder {
        fn geocode(&self, _query: String) -> GeocodeFuture<'_> {
            Box::pin(async {
                Ok(vec![Candidate {
                    coordinate: Coordinate::new(1.0, 2.0),
                    formatted_address: None,
                }])
            })
        }
    }

    fn offline_session() -> Session {
        Session::new(Resolver::new(Gazetteer::builtin(), None))
    }

    #[test]
    fn test_submit_emits_user_message_and_query() {
        let mut session = offline_session();
        let reaction = session.handle(ClientEvent::Submit {
            text: " Moving to Rome ".to_string(),
        });
        assert_eq!(reaction.events.len(), 3);
        assert!(matches!(
            &reaction.events[0],
            ServerEvent::Message { message } if message.role == Role::User && message.text == "Moving to Rome"
        ));
        assert_eq!(
            reaction.events[2],
            ServerEvent::Query {
                text: "Moving to Rome".to_string()
            }
        );
    }

    #[test]
    fn test_submit_rejected_while_awaiting_assistant() {
        let mut session = offline_session();
        session.handle(ClientEvent::Submit {
            text: "first".to_string(),
        });
        let reaction = session.handle(ClientEvent::Submit {
            text: "second".to_string(),
        });
        assert!(reaction.events.is_empty());
        assert_eq!(session.transcript().messages.len(), 1);
    }

    #[test]
    fn test_blank_submit_is_ignored() {
        let mut session = offline_session();
        let reaction = session.handle(ClientEvent::Submit {
            text: "   ".to_string(),
        });
        assert!(reaction.events.is_empty());
        assert!(session.transcript().messages.is_empty());
    }

    #[test]
    fn test_assistant_city_moves_map() {
        let mut session = offline_session();
        session.handle(ClientEvent::Example { index: 0 });
        let reaction = session.handle(ClientEvent::Assistant {
            text: "Toronto is lovely".to_string(),
            city: Some("Toronto, Canada".to_string()),
        });
        assert!(reaction.lookup.is_none());
        assert!(matches!(
            reaction.events.last(),
            Some(ServerEvent::Map { view: MapView::MapReady { render_version: 1, .. } })
        ));
        assert_eq!(session.transcript().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_lookup_produces_no_event() {
        let geocoder: Arc<dyn Geocoder> = Arc::new(FixedGeocoder);
        let mut session = Session::new(Resolver::new(Gazetteer::builtin(), Some(geocoder)));

        let first = session.handle(ClientEvent::Locate {
            city: "Gotham".to_string(),
        });
        assert!(matches!(
            first.events[0],
            ServerEvent::Map { view: MapView::Loading { .. } }
        ));
        let stale = first.lookup.unwrap();

        session.handle(ClientEvent::Locate {
            city: "Paris".to_string(),
        });

        assert!(session.complete(stale.run().await).is_none());
        assert!(matches!(
            session.map_view(),
            MapView::MapReady { ref city, .. } if city == "Paris"
        ));
    }

    #[test]
    fn test_client_event_parsing() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"assistant","text":"hi"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Assistant {
                text: "hi".to_string(),
                city: None
            }
        );
    }
}
