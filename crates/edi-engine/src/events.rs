//! Event ids and locations attached to every engine log record.
//!
//! Records carry `location` and `event_id` fields so operators can filter a
//! subscriber's output without matching on message text.

/// A logical source of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub id: u32,
    pub location: &'static str,
}

impl Event {
    const fn new(id: u32, location: &'static str) -> Self {
        Self { id, location }
    }
}

pub const FLAT_PARSE_START: Event = Event::new(1000, "FlatFileParser::parse");
pub const FLAT_SEGMENT: Event = Event::new(1001, "FlatFileParser::segment");
pub const FLAT_PARSE_END: Event = Event::new(1002, "FlatFileParser::parse");
pub const FLAT_READ_FAULT: Event = Event::new(1003, "FlatFileParser::read");

pub const XML_PARSE_START: Event = Event::new(2000, "XmlParser::parse");
pub const XML_ELEMENT: Event = Event::new(2001, "XmlParser::start_element");
pub const XML_PARSE_END: Event = Event::new(2002, "XmlParser::parse");
pub const XML_MALFORMED: Event = Event::new(2003, "XmlParser::read_event");
pub const XML_INTERNAL_FAULT: Event = Event::new(2004, "XmlParser::parse");

pub const MATCH_MISSING: Event = Event::new(3000, "Matcher::missing_mandatory");
pub const MATCH_UNRECOGNIZED: Event = Event::new(3001, "Matcher::unrecognized");
pub const MATCH_REJECTED: Event = Event::new(3002, "Matcher::rejected");
pub const FRAGMENT_CREATION: Event = Event::new(3003, "Matcher::build_segment");

pub const PRECONDITION_FAILED: Event = Event::new(4000, "Engine::precondition");
