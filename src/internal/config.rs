//! Repository configuration: `key = value` entries grouped by `[section]`
//! (optionally `[section "name"]`) in the storage dir's `config` file.

use std::fs;
use std::io;

use crate::utils::path;

pub struct Config;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    section: String,
    name: Option<String>,
    key: String,
    value: String,
}

fn parse(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut section = String::new();
    let mut name: Option<String> = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            match header.split_once(' ') {
                Some((sec, sub)) => {
                    section = sec.to_string();
                    name = Some(sub.trim().trim_matches('"').to_string());
                }
                None => {
                    section = header.to_string();
                    name = None;
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.push(Entry {
                section: section.clone(),
                name: name.clone(),
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
    }
    entries
}

impl Config {
    fn load() -> Vec<Entry> {
        match fs::read_to_string(path::config()) {
            Ok(content) => parse(&content),
            Err(_) => Vec::new(),
        }
    }

    /// Get one configuration value, e.g. `Config::get("core", None, "whitespace")`.
    pub fn get(section: &str, name: Option<&str>, key: &str) -> Option<String> {
        Self::load()
            .into_iter()
            .find(|e| {
                e.section == section && e.name.as_deref() == name && e.key == key
            })
            .map(|e| e.value)
    }

    /// Insert or replace one configuration entry and write the file back.
    pub fn set(section: &str, name: Option<&str>, key: &str, value: &str) -> io::Result<()> {
        let mut entries = Self::load();
        entries.retain(|e| {
            !(e.section == section && e.name.as_deref() == name && e.key == key)
        });
        entries.push(Entry {
            section: section.to_string(),
            name: name.map(str::to_string),
            key: key.to_string(),
            value: value.to_string(),
        });

        let mut out = String::new();
        let mut cur: Option<(String, Option<String>)> = None;
        for e in &entries {
            let header = (e.section.clone(), e.name.clone());
            if cur.as_ref() != Some(&header) {
                match &e.name {
                    Some(n) => out.push_str(&format!("[{} \"{}\"]\n", e.section, n)),
                    None => out.push_str(&format!("[{}]\n", e.section)),
                }
                cur = Some(header);
            }
            out.push_str(&format!("\t{} = {}\n", e.key, e.value));
        }
        fs::write(path::config(), out)
    }
}
