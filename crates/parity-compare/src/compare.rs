//! Response comparison utilities

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// Top-level fields that differ between the two servers for every request
///
/// The secondary server annotates responses with implementation metadata
/// (`warnings`, `forwarded`) and echoes the request back, none of which
/// the full node does.
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &["warnings", "warning", "forwarded", "request"];

/// Result of comparing two responses
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub endpoint: String,
    pub passed: bool,
    pub differences: Vec<Difference>,
}

/// A specific difference between responses
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub category: DiffCategory,
    pub path: String,
    pub left_value: String,
    pub right_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffCategory {
    /// Transport-level status differs (HTTP status, error code)
    Status,
    /// Shapes differ: object vs array, array lengths, non-object roots
    Structure,
    /// Scalars differ
    Value,
    /// Present on the left, absent on the right
    Missing,
    /// Present on the right, absent on the left
    Extra,
}

impl std::fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiffCategory::Status => "STATUS",
            DiffCategory::Structure => "STRUCTURE",
            DiffCategory::Value => "VALUE",
            DiffCategory::Missing => "MISSING",
            DiffCategory::Extra => "EXTRA",
        };
        f.pad(name)
    }
}

/// Options for comparing responses
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Top-level fields to skip on both sides
    pub ignore_fields: HashSet<String>,
}

impl CompareOptions {
    /// Options pre-loaded with [`DEFAULT_IGNORED_FIELDS`]
    pub fn new() -> Self {
        Self::default().ignore_fields(DEFAULT_IGNORED_FIELDS.iter().copied())
    }

    pub fn ignore_field(mut self, field: &str) -> Self {
        self.ignore_fields.insert(field.to_string());
        self
    }

    pub fn ignore_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    fn is_ignored(&self, key: &str) -> bool {
        self.ignore_fields.contains(key)
    }
}

/// Check whether two response trees are equivalent, skipping ignored top-level fields
///
/// # Panics
///
/// Panics if either argument is not a JSON object. Response trees are always
/// objects, so anything else is a bug in the caller.
pub fn equal(left: &Value, right: &Value, ignore: &HashSet<String>) -> bool {
    let (Some(left), Some(right)) = (left.as_object(), right.as_object()) else {
        panic!("equal() requires two JSON objects, got {left} and {right}");
    };

    let options = CompareOptions {
        ignore_fields: ignore.clone(),
    };
    let mut differences = Vec::new();
    compare_objects(left, right, &options, &mut differences);
    differences.is_empty()
}

/// Compare two response trees and collect every difference
///
/// Unlike [`equal`], a non-object root is not a panic: two equal roots
/// pass, and unequal ones are a single structure difference, since whole
/// responses from a misbehaving server may be anything.
pub fn compare_values(
    endpoint: &str,
    left: &Value,
    right: &Value,
    options: &CompareOptions,
) -> ComparisonResult {
    let mut differences = Vec::new();

    match (left.as_object(), right.as_object()) {
        (Some(left), Some(right)) => compare_objects(left, right, options, &mut differences),
        _ if left == right => {}
        _ => differences.push(Difference {
            category: DiffCategory::Structure,
            path: "(root)".to_string(),
            left_value: type_name(left).to_string(),
            right_value: type_name(right).to_string(),
        }),
    }

    ComparisonResult {
        endpoint: endpoint.to_string(),
        passed: differences.is_empty(),
        differences,
    }
}

/// Two-pass top-level comparison: left drives, then right drives
fn compare_objects(
    left: &Map<String, Value>,
    right: &Map<String, Value>,
    options: &CompareOptions,
    differences: &mut Vec<Difference>,
) {
    for (key, left_value) in left {
        if options.is_ignored(key) {
            continue;
        }

        match right.get(key) {
            Some(right_value) => compare_json(key, left_value, right_value, differences),
            None => {
                debug!(key = %key, side = "right", "Field missing");
                differences.push(Difference {
                    category: DiffCategory::Missing,
                    path: key.clone(),
                    left_value: left_value.to_string(),
                    right_value: "(missing)".to_string(),
                });
            }
        }
    }

    for (key, right_value) in right {
        if options.is_ignored(key) || left.contains_key(key) {
            continue;
        }

        debug!(key = %key, side = "left", "Field missing");
        differences.push(Difference {
            category: DiffCategory::Extra,
            path: key.clone(),
            left_value: "(missing)".to_string(),
            right_value: right_value.to_string(),
        });
    }
}

/// Recursive comparison below the top level; nothing here is ignorable
fn compare_json(path: &str, left: &Value, right: &Value, differences: &mut Vec<Difference>) {
    match (left, right) {
        (Value::Object(left_obj), Value::Object(right_obj)) => {
            for (key, left_value) in left_obj {
                let new_path = format!("{}.{}", path, key);
                match right_obj.get(key) {
                    Some(right_value) => {
                        compare_json(&new_path, left_value, right_value, differences)
                    }
                    None => {
                        debug!(path = %new_path, side = "right", "Field missing");
                        differences.push(Difference {
                            category: DiffCategory::Missing,
                            path: new_path,
                            left_value: left_value.to_string(),
                            right_value: "(missing)".to_string(),
                        });
                    }
                }
            }

            for (key, right_value) in right_obj {
                if left_obj.contains_key(key) {
                    continue;
                }
                let new_path = format!("{}.{}", path, key);
                debug!(path = %new_path, side = "left", "Field missing");
                differences.push(Difference {
                    category: DiffCategory::Extra,
                    path: new_path,
                    left_value: "(missing)".to_string(),
                    right_value: right_value.to_string(),
                });
            }
        }
        (Value::Array(left_arr), Value::Array(right_arr)) => {
            if left_arr.len() != right_arr.len() {
                debug!(
                    path = %path,
                    left = left_arr.len(),
                    right = right_arr.len(),
                    "Length differs"
                );
                differences.push(Difference {
                    category: DiffCategory::Structure,
                    path: format!("{}.length", path),
                    left_value: left_arr.len().to_string(),
                    right_value: right_arr.len().to_string(),
                });
            }

            for (i, (left_elem, right_elem)) in left_arr.iter().zip(right_arr.iter()).enumerate() {
                let new_path = format!("{}[{}]", path, i);
                compare_json(&new_path, left_elem, right_elem, differences);
            }
        }
        _ => {
            if left != right {
                debug!(path = %path, "Value differs");
                let category = if type_name(left) == type_name(right) {
                    DiffCategory::Value
                } else {
                    DiffCategory::Structure
                };
                differences.push(Difference {
                    category,
                    path: path.to_string(),
                    left_value: left.to_string(),
                    right_value: right.to_string(),
                });
            }
        }
    }
}

/// Replace every top-level value with the name of its JSON type
///
/// Events pushed by two servers describe different moments (ledger hashes,
/// close times), so streams are compared by shape rather than by value.
pub fn shape_of(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(key, v)| (key.clone(), Value::String(type_name(v).to_string())))
                .collect(),
        ),
        other => Value::String(type_name(other).to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ComparisonResult {
    /// Paths of every field that differs
    pub fn mismatched_paths(&self) -> Vec<&str> {
        self.differences.iter().map(|d| d.path.as_str()).collect()
    }

    /// Print a summary of the comparison
    pub fn print_summary(&self) {
        if self.passed {
            println!("✅ {} - PASS", self.endpoint);
        } else {
            println!(
                "❌ {} - FAIL ({} differences)",
                self.endpoint,
                self.differences.len()
            );
            for diff in &self.differences {
                println!(
                    "   [{:>9}] {} : left={} right={}",
                    diff.category, diff.path, diff.left_value, diff.right_value
                );
            }
        }
    }
}
