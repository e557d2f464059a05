//! Structural validation of the backend's JSON verdict.
//!
//! The completion text is untrusted input. [`validate`] walks it field by
//! field and either builds a complete [`AnalysisResult`] or reports every
//! violation it found in one [`ValidationError`]; it does not stop at the
//! first problem, so a caller can show the whole list.
//!
//! Checks are presence, type and numeric range only. Out-of-range numbers are
//! rejected, never clamped. Nothing is default-filled: a missing section is a
//! failure even if the other three are perfect.
//!
//! Wire keys follow the rubric prompt; the longer descriptive names are
//! accepted as aliases:
//!
//! | canonical key  | alias                 |
//! |----------------|-----------------------|
//! | `passiveVoice` | `passiveVoicePercent` |
//! | `text`         | `excerpt`             |
//! | `density`      | `densityPercent`      |

use crate::error::ValidationError;
use crate::schema::{
    AnalysisResult, DetectedKeyword, GrammarAndStyle, Keywords, Overview, Relevance, StyleIssue,
    Suggestions,
};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

/// Validate a parsed candidate and convert it into an [`AnalysisResult`].
pub fn validate(candidate: &Value) -> Result<AnalysisResult, ValidationError> {
    let mut v = Validator::default();

    let Some(root) = candidate.as_object() else {
        v.invalid("$");
        return Err(v.errors);
    };

    let overview = v.object(root, "", &["overview"]).and_then(|o| overview(&mut v, o));
    let grammar = v
        .object(root, "", &["grammarAndStyle"])
        .and_then(|o| grammar_and_style(&mut v, o));
    let keywords = v.object(root, "", &["keywords"]).and_then(|o| keywords(&mut v, o));
    let suggestions = v
        .object(root, "", &["suggestions"])
        .and_then(|o| suggestions(&mut v, o));

    match (overview, grammar, keywords, suggestions) {
        (Some(overview), Some(grammar_and_style), Some(keywords), Some(suggestions))
            if v.errors.is_empty() =>
        {
            Ok(AnalysisResult {
                overview,
                grammar_and_style,
                keywords,
                suggestions,
            })
        }
        _ => Err(v.errors),
    }
}

fn overview(v: &mut Validator, o: &Object) -> Option<Overview> {
    let p = "overview";
    let readability_score = v.int_in(o, p, &["readabilityScore"], 1, 10);
    let length = v.string(o, p, &["length"]);
    let tone = v.string(o, p, &["tone"]);
    let structure = v.string(o, p, &["structure"]);
    Some(Overview {
        readability_score: u8::try_from(readability_score?).ok()?,
        length: length?,
        tone: tone?,
        structure: structure?,
    })
}

fn grammar_and_style(v: &mut Validator, o: &Object) -> Option<GrammarAndStyle> {
    let p = "grammarAndStyle";
    let spelling_errors = v.int_in(o, p, &["spellingErrors"], 0, u32::MAX as i64);
    let grammar_issues = v.int_in(o, p, &["grammarIssues"], 0, u32::MAX as i64);
    let passive = v.number_in(o, p, &["passiveVoice", "passiveVoicePercent"], 0.0, Some(100.0));
    let clarity_score = v.int_in(o, p, &["clarityScore"], 1, 10);
    let issues = v.array(o, p, &["issues"]).and_then(|items| {
        let parsed: Vec<Option<StyleIssue>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| style_issue(v, &format!("{p}.issues[{i}]"), item))
            .collect();
        parsed.into_iter().collect::<Option<Vec<_>>>()
    });
    Some(GrammarAndStyle {
        spelling_errors: u32::try_from(spelling_errors?).ok()?,
        grammar_issues: u32::try_from(grammar_issues?).ok()?,
        passive_voice_percent: passive?,
        clarity_score: u8::try_from(clarity_score?).ok()?,
        issues: issues?,
    })
}

fn style_issue(v: &mut Validator, path: &str, item: &Value) -> Option<StyleIssue> {
    let Some(o) = item.as_object() else {
        v.invalid(path);
        return None;
    };
    let kind = v.string(o, path, &["type"]);
    let excerpt = v.string(o, path, &["text", "excerpt"]);
    let suggestion = v.string(o, path, &["suggestion"]);
    Some(StyleIssue {
        kind: kind?,
        excerpt: excerpt?,
        suggestion: suggestion?,
    })
}

fn keywords(v: &mut Validator, o: &Object) -> Option<Keywords> {
    let p = "keywords";
    let detected = v.array(o, p, &["detected"]).and_then(|items| {
        let parsed: Vec<Option<DetectedKeyword>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| detected_keyword(v, &format!("{p}.detected[{i}]"), item))
            .collect();
        parsed.into_iter().collect::<Option<Vec<_>>>()
    });
    let missing = v.string_list(o, p, &["missing"]).map(dedup_in_order);
    let density = v.number_in(o, p, &["density", "densityPercent"], 0.0, None);
    Some(Keywords {
        detected: detected?,
        missing: missing?,
        density_percent: density?,
    })
}

fn detected_keyword(v: &mut Validator, path: &str, item: &Value) -> Option<DetectedKeyword> {
    let Some(o) = item.as_object() else {
        v.invalid(path);
        return None;
    };
    let keyword = v.string(o, path, &["keyword"]);
    let count = v.int_in(o, path, &["count"], 1, u32::MAX as i64);
    let relevance = v.string(o, path, &["relevance"]).and_then(|s| {
        let parsed = Relevance::parse(&s);
        if parsed.is_none() {
            v.invalid(&join(path, "relevance"));
        }
        parsed
    });
    Some(DetectedKeyword {
        keyword: keyword?,
        count: u32::try_from(count?).ok()?,
        relevance: relevance?,
    })
}

fn suggestions(v: &mut Validator, o: &Object) -> Option<Suggestions> {
    let p = "suggestions";
    let critical = v.string_list(o, p, &["critical"]);
    let important = v.string_list(o, p, &["important"]);
    let minor = v.string_list(o, p, &["minor"]);
    Some(Suggestions {
        critical: critical?,
        important: important?,
        minor: minor?,
    })
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Collects violations while the walk continues.
#[derive(Default)]
struct Validator {
    errors: ValidationError,
}

impl Validator {
    fn missing(&mut self, path: String) {
        self.errors.missing_fields.insert(path);
    }

    fn invalid(&mut self, path: &str) {
        self.errors.invalid_fields.insert(path.to_string());
    }

    /// Look up the first present, non-null key. Records the canonical
    /// (first) key as missing when none is found.
    fn field<'v>(
        &mut self,
        o: &'v Object,
        parent: &str,
        keys: &[&str],
    ) -> Option<(&'v Value, String)> {
        let found = keys
            .iter()
            .find_map(|k| o.get(*k).filter(|v| !v.is_null()).map(|v| (v, join(parent, k))));
        if found.is_none() {
            self.missing(join(parent, keys[0]));
        }
        found
    }

    fn object<'v>(&mut self, o: &'v Object, parent: &str, keys: &[&str]) -> Option<&'v Object> {
        let (value, path) = self.field(o, parent, keys)?;
        let obj = value.as_object();
        if obj.is_none() {
            self.invalid(&path);
        }
        obj
    }

    fn array<'v>(&mut self, o: &'v Object, parent: &str, keys: &[&str]) -> Option<&'v Vec<Value>> {
        let (value, path) = self.field(o, parent, keys)?;
        let arr = value.as_array();
        if arr.is_none() {
            self.invalid(&path);
        }
        arr
    }

    fn string(&mut self, o: &Object, parent: &str, keys: &[&str]) -> Option<String> {
        let (value, path) = self.field(o, parent, keys)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.invalid(&path);
                None
            }
        }
    }

    fn string_list(&mut self, o: &Object, parent: &str, keys: &[&str]) -> Option<Vec<String>> {
        let (value, path) = self.field(o, parent, keys)?;
        let Some(items) = value.as_array() else {
            self.invalid(&path);
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    self.invalid(&format!("{path}[{i}]"));
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    /// Integer in `min..=max`. Floats such as `7.0` are not integers.
    fn int_in(
        &mut self,
        o: &Object,
        parent: &str,
        keys: &[&str],
        min: i64,
        max: i64,
    ) -> Option<i64> {
        let (value, path) = self.field(o, parent, keys)?;
        match value.as_i64() {
            Some(n) if (min..=max).contains(&n) => Some(n),
            _ => {
                self.invalid(&path);
                None
            }
        }
    }

    fn number_in(
        &mut self,
        o: &Object,
        parent: &str,
        keys: &[&str],
        min: f64,
        max: Option<f64>,
    ) -> Option<f64> {
        let (value, path) = self.field(o, parent, keys)?;
        match value.as_f64() {
            Some(n) if n.is_finite() && n >= min && max.map_or(true, |m| n <= m) => Some(n),
            _ => {
                self.invalid(&path);
                None
            }
        }
    }
}
