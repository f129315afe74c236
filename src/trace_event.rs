use hashbrown::HashMap;

/// Name -> value lookup for the `<attribute>` children of a sub-record.
///
/// Inserting a name twice keeps the last value.
/// Lookups are presence based: a present but empty value is still a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAttributes {
    values: HashMap<String, String>,
}

impl EventAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns the value of the first name present, in order.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Like `get`, but treats an empty value as missing.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EventAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = EventAttributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

/// The `<mof>` payload of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubRecord {
    pub provider: String,
    /// The `type` attribute of the sub-record element itself, when present.
    pub op_type: Option<String>,
    pub attributes: EventAttributes,
}

impl SubRecord {
    pub fn new(provider: impl Into<String>) -> Self {
        SubRecord {
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn with_op_type(mut self, op_type: impl Into<String>) -> Self {
        self.op_type = Some(op_type.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value);
        self
    }
}

/// A single `<event>` element, as found in the trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    /// Tick count, not validated.
    pub timestamp: Option<String>,
    /// Fallback process id carried on the event itself.
    pub pid: Option<String>,
    pub record: Option<SubRecord>,
}

impl RawEvent {
    pub fn new(record: SubRecord) -> Self {
        RawEvent {
            record: Some(record),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_pid(mut self, pid: impl Into<String>) -> Self {
        self.pid = Some(pid.into());
        self
    }

    pub fn timestamp_or_zero(&self) -> &str {
        self.timestamp.as_deref().unwrap_or("0")
    }
}
