use crate::err::{Result, TraceError};
use crate::trace_event::{RawEvent, SubRecord};

use log::{debug, trace};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SYNTHETIC_ROOT: &str = "root";

const EVENT_TAG: &[u8] = b"event";
const SUB_RECORD_TAG: &[u8] = b"mof";
const ATTRIBUTE_TAG: &[u8] = b"attribute";

/// Reads a diagnostics trace and walks its `<event>` elements.
///
/// The trace does not need a single root element, concatenated event fragments are
/// wrapped in a synthetic `<root>` before parsing.
pub struct TraceParser {
    content: String,
}

/// An `<event>` that has been opened but not yet closed.
struct OpenEvent {
    depth: usize,
    /// Position reserved in the output, so nested events keep document order.
    slot: usize,
    event: RawEvent,
    /// Depth of the sub-record currently collecting attributes.
    sub_record_depth: Option<usize>,
}

impl TraceParser {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut f = File::open(path).map_err(|e| TraceError::FailedToOpenFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut buffer = Vec::new();
        f.read_to_end(&mut buffer)
            .map_err(|e| TraceError::FailedToRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!("Read {} bytes from {}", buffer.len(), path.display());
        Self::from_buffer(buffer)
    }

    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
        let content = String::from_utf8(buffer).map_err(|e| TraceError::InvalidUtf8 { source: e })?;
        Ok(TraceParser { content })
    }

    pub fn from_text(content: impl Into<String>) -> Self {
        TraceParser {
            content: content.into(),
        }
    }

    /// Parses the whole document, returning every `<event>` (at any depth) in document order.
    ///
    /// Any well-formedness problem fails the whole parse.
    /// Events without a sub-record are still returned, with `record` set to `None`.
    pub fn parse_events(&self) -> Result<Vec<RawEvent>> {
        let document = wrap_in_root(&self.content);
        let mut reader = Reader::from_str(&document);
        reader.config_mut().trim_text(true);

        let mut events: Vec<RawEvent> = Vec::new();
        let mut open_events: Vec<OpenEvent> = Vec::new();
        let mut open_elements: Vec<String> = Vec::new();
        let mut seen_root = false;

        loop {
            let offset = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|e| TraceError::malformed(offset, e))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let depth = open_elements.len();

                    if depth == 0 {
                        if seen_root {
                            return Err(TraceError::malformed(
                                offset,
                                "junk after document element",
                            ));
                        }
                        seen_root = true;
                    }

                    let attributes = read_attributes(e, offset)?;
                    visit_element(e, attributes, depth, &mut events, &mut open_events);

                    if is_empty {
                        close_element(depth, &mut events, &mut open_events);
                    } else {
                        open_elements.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    }
                }
                Event::End(_) => {
                    open_elements.pop();
                    close_element(open_elements.len(), &mut events, &mut open_events);
                }
                Event::Text(ref t) => {
                    t.unescape().map_err(|e| TraceError::malformed(offset, e))?;
                    if open_elements.is_empty() {
                        return Err(TraceError::malformed(
                            offset,
                            "text outside of the document element",
                        ));
                    }
                }
                Event::CData(_) if open_elements.is_empty() => {
                    return Err(TraceError::malformed(
                        offset,
                        "CDATA outside of the document element",
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(name) = open_elements.pop() {
            return Err(TraceError::UnclosedElement { name });
        }

        debug!("Parsed {} events", events.len());
        Ok(events)
    }
}

fn visit_element(
    element: &BytesStart<'_>,
    attributes: Vec<(String, String)>,
    depth: usize,
    events: &mut Vec<RawEvent>,
    open_events: &mut Vec<OpenEvent>,
) {
    let name = element.name();

    match name.as_ref() {
        EVENT_TAG => {
            let mut event = RawEvent::default();
            for (key, value) in attributes {
                match key.as_str() {
                    "timestamp" => event.timestamp = Some(value),
                    "PID" => event.pid = Some(value),
                    _ => {}
                }
            }

            trace!("Opening event at depth {depth}");
            open_events.push(OpenEvent {
                depth,
                slot: events.len(),
                event,
                sub_record_depth: None,
            });
            events.push(RawEvent::default());
        }
        SUB_RECORD_TAG => {
            let Some(open) = open_events.last_mut() else {
                return;
            };

            // Only the first direct child counts.
            if open.depth + 1 != depth || open.event.record.is_some() {
                return;
            }

            let mut record = SubRecord::default();
            for (key, value) in attributes {
                match key.as_str() {
                    "provider" => record.provider = value,
                    "type" => record.op_type = Some(value),
                    _ => {}
                }
            }

            open.event.record = Some(record);
            open.sub_record_depth = Some(depth);
        }
        ATTRIBUTE_TAG => {
            let Some(open) = open_events.last_mut() else {
                return;
            };

            if open.sub_record_depth.map(|d| d + 1) != Some(depth) {
                return;
            }

            let mut name = None;
            let mut value = String::new();
            for (key, v) in attributes {
                match key.as_str() {
                    "name" => name = Some(v),
                    "value" => value = v,
                    _ => {}
                }
            }

            if let (Some(name), Some(record)) = (name, open.event.record.as_mut()) {
                record.attributes.insert(name, value);
            }
        }
        _ => {}
    }
}

fn close_element(depth: usize, events: &mut [RawEvent], open_events: &mut Vec<OpenEvent>) {
    let Some(open) = open_events.last_mut() else {
        return;
    };

    if open.sub_record_depth == Some(depth) {
        open.sub_record_depth = None;
    }

    if open.depth == depth {
        if let Some(closed) = open_events.pop() {
            events[closed.slot] = closed.event;
        }
    }
}

/// Reads every attribute of `element`, failing on anything that isn't well-formed:
/// an invalid element or attribute name, an unquoted or duplicated attribute, or a bad entity.
fn read_attributes(element: &BytesStart<'_>, offset: u64) -> Result<Vec<(String, String)>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    if !is_xml_name(&name) {
        return Err(TraceError::malformed(
            offset,
            format!("`{name}` is not a valid element name"),
        ));
    }

    let mut attributes = Vec::new();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| TraceError::malformed(offset, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if !is_xml_name(&key) {
            return Err(TraceError::malformed(
                offset,
                format!("`{key}` is not a valid attribute name"),
            ));
        }

        let value = attr
            .unescape_value()
            .map_err(|e| TraceError::malformed(offset, e))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(attributes)
}

/// `Name` production of XML 1.0 (fifth edition).
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9'
            | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Wraps concatenated fragments in a synthetic root element.
///
/// A leading BOM and XML declaration are dropped first, since neither may appear inside an element.
fn wrap_in_root(content: &str) -> Cow<'_, str> {
    let mut body = content.trim_start_matches('\u{feff}').trim_start();

    if body.starts_with("<?xml") {
        if let Some(end) = body.find("?>") {
            body = body[end + 2..].trim_start();
        }
    }

    if body.starts_with("<root>") {
        return Cow::Borrowed(body);
    }

    debug!("Trace has no `<{SYNTHETIC_ROOT}>` element, wrapping fragments");
    Cow::Owned(format!("<{SYNTHETIC_ROOT}>{body}</{SYNTHETIC_ROOT}>"))
}
