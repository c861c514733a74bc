//! Parsing of the free text OPUS keeps in its history blocks.
//!
//! The history is a list of NUL-separated log entries. Entries recording a
//! command line look like
//!
//! ```text
//! COMMAND_LINE MeasureSample ([<path>]"::this::":MeasureSample, {EXP='Sample.XPM', SNM='Batch 7, wet', NSS=32});
//! ```
//!
//! and carry the sample name along with the measurement settings.
use indexmap::IndexMap;
use log::warn;

use super::constants::KEYWORD_CMDLINE;
use crate::params::{SampleData, SampleValue};

/// Split on commas that are not inside single quotes.
///
/// With `keep_quotes` the quote characters stay in the parts, otherwise they
/// are dropped. Empty parts are skipped.
pub fn split_unquoted(s: &str, keep_quotes: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in s.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                if keep_quotes {
                    current.push(c);
                }
            }
            ',' if !quoted => {
                let part = current.trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    parts
}

/// Find `key='value'` in `text` and return `value`
pub fn find_quoted_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{key}='");
    let start = text.find(&needle)? + needle.len();
    let length = text[start..].find('\'')?;
    Some(&text[start..start + length])
}

/// Parse the first `{key='text', key=number}` group in `text`.
///
/// Quoted values are kept as text, unquoted values must parse as numbers
/// and are dropped otherwise.
pub fn parse_braced_metadata(text: &str) -> SampleData {
    let mut result = SampleData::new();
    let Some(open) = text.find('{') else {
        return result;
    };
    let Some(close) = text[open..].find('}').map(|i| i + open) else {
        return result;
    };
    for part in split_unquoted(&text[open + 1..close], true) {
        let pair: Vec<&str> = part.split('=').collect();
        if pair.len() != 2 {
            continue;
        }
        let (key, value) = (pair[0].trim(), pair[1].trim());
        if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
            result.insert(key.to_string(), value[1..value.len() - 1].into());
        } else if let Ok(x) = value.parse::<f64>() {
            result.insert(key.to_string(), x.into());
        }
    }
    result
}

/// A parsed `COMMAND_LINE` history entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandLine {
    pub raw: String,
    pub operation: String,
    pub command_type: String,
    pub values: IndexMap<String, String>,
}

impl CommandLine {
    /// Whether a history entry records a command line
    pub fn is_command_line(entry: &str) -> bool {
        entry.contains(KEYWORD_CMDLINE)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let malformed = || format!("Malformed command line: {raw}");
        let open = raw.find('(').ok_or_else(malformed)?;
        let close = raw.rfind(')').filter(|c| *c > open).ok_or_else(malformed)?;
        let intro = &raw[..open];
        let payload = &raw[open + 1..close];

        let operation = intro
            .find(KEYWORD_CMDLINE)
            .map(|i| intro[i + KEYWORD_CMDLINE.len()..].trim())
            .ok_or_else(malformed)?;

        let type_open = payload.find('[').ok_or_else(malformed)?;
        let type_close = payload.find(']').filter(|c| *c > type_open).ok_or_else(malformed)?;
        let command_type = payload[type_open + 1..type_close].replace("\"::this::\":", "");

        let data_open = payload.find('{').ok_or_else(malformed)?;
        let data_close = payload.rfind('}').filter(|c| *c > data_open).ok_or_else(malformed)?;
        let data = &payload[data_open + 1..data_close];

        let mut values = IndexMap::new();
        for pair in split_unquoted(data, false) {
            match pair.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => warn!("Invalid key-value pair: '{pair}'"),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            operation: operation.to_string(),
            command_type,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// The values as sample data, numbers where they parse as such
    pub fn typed_values(&self) -> impl Iterator<Item = (&str, SampleValue)> {
        self.values.iter().map(|(k, v)| {
            let value = match v.parse::<f64>() {
                Ok(x) => SampleValue::Number(x),
                Err(_) => SampleValue::Text(v.clone()),
            };
            (k.as_str(), value)
        })
    }
}

/// Parse every command line in a history log, skipping and logging the
/// entries that cannot be parsed
pub fn command_lines<'a, I: IntoIterator<Item = &'a str>>(entries: I) -> Vec<CommandLine> {
    entries
        .into_iter()
        .filter(|e| CommandLine::is_command_line(e))
        .filter_map(|e| match CommandLine::parse(e) {
            Ok(cmd) => Some(cmd),
            Err(err) => {
                warn!("{err}");
                None
            }
        })
        .collect()
}
