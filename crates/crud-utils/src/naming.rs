//! Conversion between identifier names and storage names.
//!
//! Identifier names are the camel-case names used for record types and
//! fields (`QuestionOption`, `HospitalID`). Storage names are the flat,
//! underscore separated names used by tables and columns
//! (`question_option`, `hospital_id`).
//!
//! Both directions are cached for the lifetime of the process.

use std::{
    collections::HashMap,
    sync::{LazyLock, RwLock},
};

use regex::Regex;

/// Multi-letter acronyms that are kept together as one word.
pub const ACRONYMS: &[&str] = &[
    "API", "CPU", "CSS", "CID", "DNS", "EOF", "EPC", "GUID", "HTML", "HTTP", "HTTPS", "ID", "UID",
    "IP", "JSON", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SSH", "TLS", "TTL", "UI", "UUID",
    "URI", "URL", "UTF8", "VM", "XML", "XSRF", "XSS", "PY",
];

// Runs of capitals and digits; acronyms and word starts are found inside them.
static CAPITALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[A-Z][A-Z0-9]*").expect("unable to compile identifier capitals regex")
});

// Longest first so `HTTPS` is tried before `HTTP` and `UUID` before `UID`.
static ACRONYMS_BY_LENGTH: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut acronyms = ACRONYMS.to_vec();
    acronyms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    acronyms
});

static ACRONYM_WORDS: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    ACRONYMS
        .iter()
        .map(|acronym| (acronym.to_lowercase(), *acronym))
        .collect()
});

static STORAGE_NAMES: LazyLock<RwLock<HashMap<String, String>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static IDENTIFIER_NAMES: LazyLock<RwLock<HashMap<String, String>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn cached(cache: &RwLock<HashMap<String, String>>, key: &str) -> Option<String> {
    cache.read().ok().and_then(|map| map.get(key).cloned())
}

fn remember(forward: &str, reverse: &str) {
    if let Ok(mut map) = STORAGE_NAMES.write() {
        map.insert(forward.to_string(), reverse.to_string());
    }
    // flat names say nothing about the identifier they came from
    if forward == reverse {
        return;
    }
    if let Ok(mut map) = IDENTIFIER_NAMES.write() {
        map.entry(reverse.to_string())
            .or_insert_with(|| forward.to_string());
    }
}

/// Splits a run of capitals into words, writing each as `_word`.
///
/// An acronym only counts when it ends where a new word starts: before
/// another capital, a digit or the end of the name. At the end of a run
/// followed by a lower-case letter the last capital belongs to the next
/// word, so `HTTPServer` splits as `HTTP` and `Server`.
fn split_capitals(run: &str, lower_follows: bool, out: &mut String) {
    let mut pos = 0;
    while let Some(c) = run[pos..].chars().next() {
        let acronym = ACRONYMS_BY_LENGTH.iter().find(|acronym| {
            run[pos..].starts_with(**acronym)
                && (pos + acronym.len() < run.len() || !lower_follows)
        });
        match acronym {
            Some(acronym) => {
                out.push('_');
                out.push_str(&acronym.to_lowercase());
                pos += acronym.len();
            }
            None => {
                if c.is_ascii_uppercase() {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
                pos += c.len_utf8();
            }
        }
    }
}

/// Converts an identifier name into its storage name.
///
/// Words start at every upper-case letter and at every recognised acronym
/// that ends on a word boundary.
/// Names that are already flat are returned unchanged.
///
/// # Examples
///
/// ```
/// use crud_utils::naming::to_storage_name;
///
/// assert_eq!(to_storage_name("QuestionOption"), "question_option");
/// assert_eq!(to_storage_name("HospitalID"), "hospital_id");
/// assert_eq!(to_storage_name("user_id"), "user_id");
/// ```
pub fn to_storage_name(identifier: &str) -> String {
    if identifier.is_empty() {
        return String::new();
    }
    if let Some(name) = cached(&STORAGE_NAMES, identifier) {
        return name;
    }

    let mut replaced = String::with_capacity(identifier.len() + 4);
    let mut last = 0;
    for run in CAPITALS_RE.find_iter(identifier) {
        replaced.push_str(&identifier[last..run.start()]);
        let lower_follows = identifier[run.end()..]
            .chars()
            .next()
            .is_some_and(char::is_lowercase);
        split_capitals(run.as_str(), lower_follows, &mut replaced);
        last = run.end();
    }
    replaced.push_str(&identifier[last..]);

    let name = match replaced.strip_prefix('_') {
        Some(rest) if !identifier.starts_with('_') => rest.to_string(),
        _ => replaced,
    };

    remember(identifier, &name);
    name
}

/// Converts a storage name back into an identifier name.
///
/// Each underscore separated word is capitalised, recognised acronyms are
/// upper-cased as a whole.
///
/// # Examples
///
/// ```
/// use crud_utils::naming::to_identifier_name;
///
/// assert_eq!(to_identifier_name("question_option"), "QuestionOption");
/// assert_eq!(to_identifier_name("hospital_id"), "HospitalID");
/// ```
pub fn to_identifier_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if let Some(identifier) = cached(&IDENTIFIER_NAMES, name) {
        return identifier;
    }

    let identifier = name
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| match ACRONYM_WORDS.get(word) {
            Some(acronym) => acronym.to_string(),
            None => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<String>();

    if let Ok(mut map) = IDENTIFIER_NAMES.write() {
        map.insert(name.to_string(), identifier.clone());
    }
    identifier
}
