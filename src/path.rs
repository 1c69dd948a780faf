use serde_json::{Map, Value};

/// Dot-delimited access into nested JSON objects. Arrays are not addressed;
/// every segment is an object key.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

pub fn set(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut rest = path;
    loop {
        match rest.split_once('.') {
            Some((head, tail)) => {
                ensure_object(current);
                let Some(map) = current.as_object_mut() else {
                    return;
                };
                let child = map
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                ensure_object(child);
                current = child;
                rest = tail;
            }
            None => {
                ensure_object(current);
                if let Some(map) = current.as_object_mut() {
                    map.insert(rest.to_string(), value);
                }
                return;
            }
        }
    }
}

/// Removes the entry at `path` and prunes any parent objects left empty.
pub fn delete(root: &mut Value, path: &str) {
    let Some(map) = root.as_object_mut() else {
        return;
    };
    match path.split_once('.') {
        Some((head, tail)) => {
            let emptied = match map.get_mut(head) {
                Some(child) => {
                    delete(child, tail);
                    child.as_object().is_some_and(Map::is_empty)
                }
                None => false,
            };
            if emptied {
                map.remove(head);
            }
        }
        None => {
            map.remove(path);
        }
    }
}

fn ensure_object(slot: &mut Value) {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
}
