//! JSON document kind: a hand-rolled dot/bracket-notation path walker over
//! `serde_json::Value`. No JSONPath crate — paths here are a small practical
//! subset (`.field`, `[index]`, `$` root) rather than full JSONPath.

use serde_json::Value;

use crate::error::{KvError, Result};

/// Split a path like `$.a.b[0].c` or `a.b[0]` into segments. A leading `$`
/// or `.` denotes the root and is dropped.
fn segments(path: &str) -> Vec<PathSegment> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    out.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    out.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut idx = String::new();
                for d in chars.by_ref() {
                    if d == ']' {
                        break;
                    }
                    idx.push(d);
                }
                if let Ok(n) = idx.parse::<usize>() {
                    out.push(PathSegment::Index(n));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(PathSegment::Key(current));
    }
    out
}

enum PathSegment {
    Key(String),
    Index(usize),
}

/// Read the value at `path`. Returns `None` if the path does not resolve.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segs = segments(path);
    let mut cur = root;
    for seg in &segs {
        cur = match (seg, cur) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Set the value at `path`, creating intermediate objects as needed for key
/// segments (arrays are never auto-created; indexing into a missing array
/// is an error). The final segment may target a brand-new key.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segs = segments(path);
    if segs.is_empty() {
        *root = value;
        return Ok(());
    }
    set_path_rec(root, &segs, value)
}

fn set_path_rec(cur: &mut Value, segs: &[PathSegment], value: Value) -> Result<()> {
    let (head, rest) = segs.split_first().expect("segs is non-empty");
    match head {
        PathSegment::Key(k) => {
            if !cur.is_object() {
                if matches!(cur, Value::Null) {
                    *cur = Value::Object(serde_json::Map::new());
                } else {
                    return Err(KvError::generic("ERR path component is not an object"));
                }
            }
            let map = cur.as_object_mut().expect("coerced above");
            if rest.is_empty() {
                map.insert(k.clone(), value);
                Ok(())
            } else {
                let child = map.entry(k.clone()).or_insert(Value::Null);
                set_path_rec(child, rest, value)
            }
        }
        PathSegment::Index(i) => {
            let arr = cur
                .as_array_mut()
                .ok_or_else(|| KvError::generic("ERR path component is not an array"))?;
            if rest.is_empty() {
                if *i < arr.len() {
                    arr[*i] = value;
                    Ok(())
                } else if *i == arr.len() {
                    arr.push(value);
                    Ok(())
                } else {
                    Err(KvError::OutOfRange)
                }
            } else {
                let child = arr.get_mut(*i).ok_or(KvError::OutOfRange)?;
                set_path_rec(child, rest, value)
            }
        }
    }
}

/// Delete the value at `path`. Returns `true` if something was removed.
pub fn del_path(root: &mut Value, path: &str) -> bool {
    let segs = segments(path);
    let Some((last, init)) = segs.split_last() else {
        return false;
    };
    let Some(parent) = init.iter().try_fold(root, |cur, seg| match seg {
        PathSegment::Key(k) => cur.get_mut(k),
        PathSegment::Index(i) => cur.get_mut(i),
    }) else {
        return false;
    };
    match (last, parent) {
        (PathSegment::Key(k), Value::Object(map)) => map.remove(k).is_some(),
        (PathSegment::Index(i), Value::Array(arr)) if *i < arr.len() => {
            arr.remove(*i);
            true
        }
        _ => false,
    }
}

/// Redis-style type name for JSON.TYPE.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Append `values` to the array at `path`. Returns the new length.
pub fn arr_append(root: &mut Value, path: &str, values: Vec<Value>) -> Result<usize> {
    let segs = segments(path);
    let target = resolve_mut(root, &segs)?;
    let arr = target
        .as_array_mut()
        .ok_or_else(|| KvError::generic("ERR path does not point to an array"))?;
    arr.extend(values);
    Ok(arr.len())
}

/// Insert `values` at `index` within the array at `path`. Returns the new length.
pub fn arr_insert(root: &mut Value, path: &str, index: usize, values: Vec<Value>) -> Result<usize> {
    let segs = segments(path);
    let target = resolve_mut(root, &segs)?;
    let arr = target
        .as_array_mut()
        .ok_or_else(|| KvError::generic("ERR path does not point to an array"))?;
    if index > arr.len() {
        return Err(KvError::OutOfRange);
    }
    for (offset, v) in values.into_iter().enumerate() {
        arr.insert(index + offset, v);
    }
    Ok(arr.len())
}

/// Trim the array at `path` to `[start, stop]` inclusive. Returns the new length.
pub fn arr_trim(root: &mut Value, path: &str, start: i64, stop: i64) -> Result<usize> {
    let segs = segments(path);
    let target = resolve_mut(root, &segs)?;
    let arr = target
        .as_array_mut()
        .ok_or_else(|| KvError::generic("ERR path does not point to an array"))?;
    let len = arr.len() as i64;
    let start = start.clamp(0, len.max(0));
    let stop = stop.clamp(-1, len - 1);
    if start > stop || len == 0 {
        arr.clear();
        return Ok(0);
    }
    let kept: Vec<Value> = arr[start as usize..=stop as usize].to_vec();
    *arr = kept;
    Ok(arr.len())
}

/// Append a string to the string at `path`. Returns the new length.
pub fn str_append(root: &mut Value, path: &str, suffix: &str) -> Result<usize> {
    let segs = segments(path);
    let target = resolve_mut(root, &segs)?;
    match target {
        Value::String(s) => {
            s.push_str(suffix);
            Ok(s.len())
        }
        _ => Err(KvError::generic("ERR path does not point to a string")),
    }
}

/// Add `delta` to the number at `path`, in place. Returns the new value.
pub fn num_incrby(root: &mut Value, path: &str, delta: f64) -> Result<f64> {
    let segs = segments(path);
    let target = resolve_mut(root, &segs)?;
    let current = target.as_f64().ok_or(KvError::NotFloat)?;
    let updated = current + delta;
    *target = serde_json::Number::from_f64(updated)
        .map(Value::Number)
        .ok_or(KvError::NotFloat)?;
    Ok(updated)
}

fn resolve_mut<'a>(root: &'a mut Value, segs: &[PathSegment]) -> Result<&'a mut Value> {
    let mut cur = root;
    for seg in segs {
        cur = match seg {
            PathSegment::Key(k) => cur.get_mut(k).ok_or(KvError::NoSuchKey)?,
            PathSegment::Index(i) => cur.get_mut(*i).ok_or(KvError::OutOfRange)?,
        };
    }
    Ok(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = json!({});
        set_path(&mut root, "a.b.c", json!(1)).unwrap();
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn get_walks_arrays_and_objects() {
        let root = json!({"a": [1, {"b": 2}]});
        assert_eq!(get_path(&root, "a[1].b"), Some(&json!(2)));
        assert_eq!(get_path(&root, "a[5].b"), None);
    }

    #[test]
    fn del_removes_leaf() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        assert!(del_path(&mut root, "a.b"));
        assert_eq!(root, json!({"a": {"c": 2}}));
        assert!(!del_path(&mut root, "a.missing"));
    }

    #[test]
    fn arr_append_and_trim() {
        let mut root = json!({"a": [1, 2, 3]});
        let len = arr_append(&mut root, "a", vec![json!(4)]).unwrap();
        assert_eq!(len, 4);
        let len = arr_trim(&mut root, "a", 1, 2).unwrap();
        assert_eq!(len, 2);
        assert_eq!(root, json!({"a": [2, 3]}));
    }

    #[test]
    fn num_incrby_updates_in_place() {
        let mut root = json!({"n": 5});
        let v = num_incrby(&mut root, "n", 2.5).unwrap();
        assert_eq!(v, 7.5);
    }
}
