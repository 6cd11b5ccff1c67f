use serde::{Deserialize, Serialize};

/// Marker attached to a plugin function by the tagging API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Tag {
    /// Triggered by `<prefix><name>`
    Command(String),
    /// Runs every N seconds; fractions allowed
    Interval(f64),
    /// Triggered by a URL matching the pattern
    Url(String),
    /// Triggered by a protocol event (e.g. `TOPIC`)
    Event(String),
}

impl Tag {
    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Command(_) => "command",
            Tag::Interval(_) => "interval",
            Tag::Url(_) => "url",
            Tag::Event(_) => "event",
        }
    }
}

/// A module-level function carrying at least one tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callable {
    pub function: String,
    pub tags: Vec<Tag>,
}

impl Callable {
    pub fn new(function: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            function: function.into(),
            tags,
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Command(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn intervals(&self) -> impl Iterator<Item = f64> + '_ {
        self.tags.iter().filter_map(|t| match t {
            Tag::Interval(secs) => Some(*secs),
            _ => None,
        })
    }

    pub fn url_patterns(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Url(pattern) => Some(pattern.as_str()),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Event(event) => Some(event.as_str()),
            _ => None,
        })
    }
}

/// All tagged functions of one loaded plugin, sorted by function name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Callables {
    items: Vec<Callable>,
}

impl Callables {
    pub fn new(mut items: Vec<Callable>) -> Self {
        items.sort_by(|a, b| a.function.cmp(&b.function));
        Self { items }
    }

    pub fn get(&self, function: &str) -> Option<&Callable> {
        self.items.iter().find(|c| c.function == function)
    }

    pub fn all(&self) -> impl Iterator<Item = &Callable> {
        self.items.iter()
    }

    /// `(command, function)` pairs
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .flat_map(|c| c.commands().map(move |name| (name, c.function.as_str())))
    }

    /// `(seconds, function)` pairs
    pub fn intervals(&self) -> impl Iterator<Item = (f64, &str)> {
        self.items
            .iter()
            .flat_map(|c| c.intervals().map(move |secs| (secs, c.function.as_str())))
    }

    /// `(pattern, function)` pairs
    pub fn url_patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .flat_map(|c| c.url_patterns().map(move |p| (p, c.function.as_str())))
    }

    /// `(event, function)` pairs
    pub fn events(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .flat_map(|c| c.events().map(move |e| (e, c.function.as_str())))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
