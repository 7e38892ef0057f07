use serde_json::{Map, Value};

use crate::MappingError;

/// One segment of a parsed JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a dotted/indexed path such as `entry[0].changes[0].value.name`.
///
/// Keys are separated by `.`; zero-based array indices use `[n]` and may be
/// chained (`items[0][1]`). An empty path or empty segment is invalid.
pub fn parse(path: &str) -> Result<Vec<Segment>, MappingError> {
    if path.is_empty() {
        return Err(MappingError::InvalidPath(path.to_string()));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        let key_end = rest.find('[').unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() && key_end == rest.len() {
            return Err(MappingError::InvalidPath(path.to_string()));
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        rest = &rest[key_end..];
        while let Some(open) = rest.find('[') {
            let close = match rest.find(']') {
                Some(c) if c > open => c,
                _ => return Err(MappingError::InvalidPath(path.to_string())),
            };
            let idx: usize = rest[open + 1..close]
                .parse()
                .map_err(|_| MappingError::InvalidPath(path.to_string()))?;
            segments.push(Segment::Index(idx));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            return Err(MappingError::InvalidPath(path.to_string()));
        }
    }

    if segments.is_empty() {
        return Err(MappingError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Resolve a parsed path against a value. Missing keys and out-of-bounds
/// indices yield `None` (absent), never an error.
pub fn resolve<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for seg in segments {
        current = match seg {
            Segment::Key(k) => current.as_object()?.get(k)?,
            Segment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    Some(current)
}

/// Convenience: parse then resolve, treating an unparsable path as absent.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse(path).ok()?;
    resolve(value, segments.as_slice())
}

/// Write `new` into `target` at the dotted `path`, creating intermediate
/// objects as needed. Writing through an existing scalar replaces it with
/// an object. Index segments are not supported on the write side.
pub fn write(target: &mut Value, path: &str, new: Value) -> Result<(), MappingError> {
    let segments = parse(path)?;
    let keys: Vec<&String> = segments
        .iter()
        .map(|s| match s {
            Segment::Key(k) => Ok(k),
            Segment::Index(_) => Err(MappingError::InvalidPath(path.to_string())),
        })
        .collect::<Result<_, _>>()?;

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let (last, init) = keys
        .split_last()
        .ok_or_else(|| MappingError::InvalidPath(path.to_string()))?;

    let mut current = target;
    for key in init {
        let obj = current
            .as_object_mut()
            .ok_or_else(|| MappingError::InvalidPath(path.to_string()))?;
        let entry = obj
            .entry((*key).clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry;
    }

    current
        .as_object_mut()
        .ok_or_else(|| MappingError::InvalidPath(path.to_string()))?
        .insert((*last).clone(), new);
    Ok(())
}
