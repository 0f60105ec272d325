use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::Value;

use super::StructuringError;
use crate::models::{Requirement, RequirementType};
use crate::pipeline::import::short_hash;

/// Locate the structured payload inside a free-text reply: the span from
/// the first `{` to the last `}`. Replies without braces are returned
/// trimmed.
pub fn extract_json_span(response: &str) -> &str {
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response.trim(),
    }
}

/// Parse an extraction reply into requirement records. Replies that cannot
/// be decoded, even after repair, yield no records.
pub fn parse_extraction(response: &str) -> Vec<Requirement> {
    match try_parse_extraction(response) {
        Ok(requirements) => requirements,
        Err(e) => {
            tracing::debug!(error = %e, "Extraction reply could not be decoded, treating as empty");
            Vec::new()
        }
    }
}

/// Strict variant of [`parse_extraction`]: one repair attempt, then
/// `MalformedResponse`.
pub fn try_parse_extraction(response: &str) -> Result<Vec<Requirement>, StructuringError> {
    let span = extract_json_span(response);
    let value: Value = match serde_json::from_str(span) {
        Ok(v) => v,
        Err(first) => {
            tracing::debug!(error = %first, "Extraction reply is not valid JSON, attempting repair");
            serde_json::from_str(&repair_json(span))
                .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?
        }
    };
    Ok(requirements_from_value(&value))
}

fn requirement_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("requirements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn requirements_from_value(value: &Value) -> Vec<Requirement> {
    let mut seen = HashSet::new();
    requirement_items(value)
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            let id = scalar_string(item.get("id"))
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| fallback_id(item));
            let text = scalar_string(item.get("text")).unwrap_or_default();
            let req_type = item
                .get("type")
                .and_then(Value::as_str)
                .map(RequirementType::from_label)
                .unwrap_or(RequirementType::Unknown);

            let mut requirement = Requirement::new(disambiguate(&mut seen, id), text, req_type);
            requirement.elements = elements_from_value(item.get("elements"));
            requirement
        })
        .collect()
}

/// Deterministic id for a record the service left unnamed.
fn fallback_id(item: &Value) -> String {
    format!("REQ-{}", short_hash(&item.to_string(), 8))
}

/// Return `id` if unseen, otherwise the first free `id-<n>` (n ≥ 2).
pub(crate) fn disambiguate(seen: &mut HashSet<String>, id: String) -> String {
    if seen.insert(id.clone()) {
        return id;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{id}-{n}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn elements_from_value(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.trim().to_string(), v)
        })
        .collect()
}

struct Evaluation {
    score: f64,
    missing: BTreeSet<String>,
    suggestions: Vec<String>,
}

/// Merge an evaluation reply onto `requirements` by id. Requirements the
/// reply does not mention keep their current values; an undecodable reply
/// leaves everything unchanged.
pub fn parse_evaluation(response: &str, mut requirements: Vec<Requirement>) -> Vec<Requirement> {
    let value: Value = match serde_json::from_str(extract_json_span(response)) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Evaluation reply could not be decoded, keeping defaults");
            return requirements;
        }
    };

    let mut evaluations: HashMap<String, Evaluation> = HashMap::new();
    for item in requirement_items(&value) {
        let Some(id) = scalar_string(item.get("id")) else {
            continue;
        };
        evaluations.entry(id).or_insert_with(|| Evaluation {
            score: score_from_value(item.get("completeness_score")),
            missing: string_list(item.get("missing_elements")).into_iter().collect(),
            suggestions: string_list(item.get("improvement_suggestions")),
        });
    }

    for requirement in &mut requirements {
        if let Some(eval) = evaluations.remove(&requirement.id) {
            requirement.completeness_score = eval.score;
            requirement.missing_elements = eval.missing;
            requirement.improvement_suggestions = eval.suggestions;
        }
    }
    requirements
}

/// Scores outside [0, 100] are clamped; unreadable scores count as 0.
fn score_from_value(value: Option<&Value>) -> f64 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Best-effort repair of near-JSON: single and typographic quotes become
/// double quotes, trailing commas before `}`/`]` are dropped, and raw
/// newlines and tabs inside strings are escaped.
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    // Closing quote of the string being scanned.
    let mut closer: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match closer {
            Some(end) => {
                if c == '\\' && i + 1 < chars.len() {
                    out.push(c);
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if c == end {
                    out.push('"');
                    closer = None;
                } else {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                        c => out.push(c),
                    }
                }
            }
            None => match c {
                '"' | '\'' | '\u{201C}' | '\u{2018}' => {
                    closer = Some(match c {
                        '\u{201C}' => '\u{201D}',
                        '\u{2018}' => '\u{2019}',
                        other => other,
                    });
                    out.push('"');
                }
                ',' => {
                    let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                    if !matches!(next, Some('}') | Some(']')) {
                        out.push(c);
                    }
                }
                c => out.push(c),
            },
        }
        i += 1;
    }
    out
}
