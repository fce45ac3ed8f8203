use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSeg {
    Index(usize),
    Key(String),
}

impl PathSeg {
    pub fn key(value: impl Into<String>) -> Self {
        PathSeg::Key(value.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSeg::Key(key) => Some(key),
            PathSeg::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSeg::Index(index) => Some(*index),
            PathSeg::Key(_) => None,
        }
    }
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSeg::Key(key) => write!(f, "{key}"),
            PathSeg::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Dotted key path addressing a location in a JSON tree. Numeric segments
/// index arrays, everything else keys into objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath {
    segs: SmallVec<[PathSeg; 4]>,
}

impl KeyPath {
    pub fn root() -> Self {
        KeyPath::default()
    }

    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return KeyPath::default();
        }
        let segs = raw
            .split('.')
            .map(|part| match part.parse::<usize>() {
                Ok(index) => PathSeg::Index(index),
                Err(_) => PathSeg::Key(part.to_string()),
            })
            .collect();
        KeyPath { segs }
    }

    pub fn from_segs(segs: impl IntoIterator<Item = PathSeg>) -> Self {
        KeyPath { segs: segs.into_iter().collect() }
    }

    pub fn segs(&self) -> &[PathSeg] {
        &self.segs
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.segs.first().and_then(PathSeg::as_key)
    }

    pub fn last(&self) -> Option<&PathSeg> {
        self.segs.last()
    }

    pub fn push(&mut self, seg: PathSeg) {
        self.segs.push(seg);
    }

    pub fn child(&self, seg: PathSeg) -> Self {
        let mut path = self.clone();
        path.push(seg);
        path
    }

    pub fn join(&self, other: &KeyPath) -> Self {
        let mut path = self.clone();
        path.segs.extend(other.segs.iter().cloned());
        path
    }

    /// Splits off the final segment, leaving the parent location.
    pub fn split_last(&self) -> Option<(KeyPath, &PathSeg)> {
        let (last, init) = self.segs.split_last()?;
        Some((KeyPath { segs: init.iter().cloned().collect() }, last))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl Serialize for KeyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.split('.').any(str::is_empty) && !raw.is_empty() {
            return Err(D::Error::custom(format!("empty segment in key path '{raw}'")));
        }
        Ok(KeyPath::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSeg {
    Literal(PathSeg),
    Wildcard,
}

/// Field-path template with `*` wildcard segments, matched or expanded
/// against concrete JSON data. Schema tables are built from these so new
/// reference fields never require new scan code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segs: Vec<PatternSeg>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        let segs = raw
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part == "*" {
                    PatternSeg::Wildcard
                } else {
                    match part.parse::<usize>() {
                        Ok(index) => PatternSeg::Literal(PathSeg::Index(index)),
                        Err(_) => PatternSeg::Literal(PathSeg::Key(part.to_string())),
                    }
                }
            })
            .collect();
        PathPattern { segs }
    }

    pub fn matches(&self, path: &KeyPath) -> bool {
        if self.segs.len() != path.len() {
            return false;
        }
        self.segs.iter().zip(path.segs()).all(|(pattern, seg)| match pattern {
            PatternSeg::Wildcard => true,
            PatternSeg::Literal(literal) => literal == seg,
        })
    }

    /// Enumerates every concrete path present in `value` that this pattern
    /// covers. Wildcards fan out over object keys and array indices.
    pub fn expand(&self, value: &Value) -> Vec<KeyPath> {
        let mut out = Vec::new();
        expand_into(&self.segs, value, KeyPath::root(), &mut out);
        out
    }
}

fn expand_into(segs: &[PatternSeg], value: &Value, prefix: KeyPath, out: &mut Vec<KeyPath>) {
    let Some((head, rest)) = segs.split_first() else {
        out.push(prefix);
        return;
    };
    match head {
        PatternSeg::Literal(PathSeg::Key(key)) => {
            if let Some(child) = value.get(key) {
                expand_into(rest, child, prefix.child(PathSeg::Key(key.clone())), out);
            }
        }
        PatternSeg::Literal(PathSeg::Index(index)) => {
            if let Some(child) = value.get(index) {
                expand_into(rest, child, prefix.child(PathSeg::Index(*index)), out);
            }
        }
        PatternSeg::Wildcard => match value {
            Value::Object(map) => {
                for (key, child) in map {
                    expand_into(rest, child, prefix.child(PathSeg::Key(key.clone())), out);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    expand_into(rest, child, prefix.child(PathSeg::Index(index)), out);
                }
            }
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dotted_paths_with_indices() {
        let path = KeyPath::parse("components.sprite.clips.3.spriteAsset");
        assert_eq!(path.len(), 5);
        assert_eq!(path.segs()[3], PathSeg::Index(3));
        assert_eq!(path.to_string(), "components.sprite.clips.3.spriteAsset");
    }

    #[test]
    fn wildcard_expands_over_objects_and_arrays() {
        let pattern = PathPattern::parse("slots.*.asset");
        let data = json!({
            "slots": {
                "a": { "asset": 1 },
                "b": { "asset": 2 },
                "c": { "volume": 0.5 }
            }
        });
        let mut paths: Vec<String> = pattern.expand(&data).iter().map(|p| p.to_string()).collect();
        paths.sort();
        assert_eq!(paths, vec!["slots.a.asset", "slots.b.asset"]);
    }

    #[test]
    fn pattern_matches_concrete_path() {
        let pattern = PathPattern::parse("frames.*.sprite");
        assert!(pattern.matches(&KeyPath::parse("frames.7.sprite")));
        assert!(!pattern.matches(&KeyPath::parse("frames.7.sprite.extra")));
    }
}
