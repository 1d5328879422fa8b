// orderlog-watcher - app/config.rs
//
// Hand-rolled parser for the line-oriented `key::value` config format.
// Not a TOML/serde document: the original service configures itself
// from a flat `key::value` text file, and that is the external
// interface this crate honors rather than inventing a new one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::model::{ServiceConfig, SourceKind};
use crate::util::constants::DEFAULT_COMPLETE_STATUSES;
use crate::util::error::ConfigError;

/// Reads and parses a `key::value` config file into a validated
/// `ServiceConfig`.
pub fn load(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: path.to_path_buf() });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    parse(&contents, &base_dir)
}

/// Parses already-read config text. Exposed separately from `load` so
/// tests don't need a filesystem fixture for every case.
pub fn parse(contents: &str, base_dir: &Path) -> Result<ServiceConfig, ConfigError> {
    let raw = parse_raw(contents);
    build(raw, base_dir)
}

fn parse_raw(contents: &str) -> HashMap<String, String> {
    let mut raw = HashMap::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once("::") else {
            continue;
        };
        raw.insert(key.trim().to_string(), value.trim().to_string());
    }
    raw
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let candidate = PathBuf::from(value);
    if candidate.is_absolute() || crate::core::pathutil::is_unc_path(value) {
        candidate
    } else {
        base_dir.join(candidate)
    }
}

fn bool_key(raw: &HashMap<String, String>, key: &str) -> bool {
    raw.get(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn colon_list(raw: &HashMap<String, String>, key: &str) -> Vec<String> {
    raw.get(key)
        .map(|v| v.split(':').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

/// Splits a pipe-joined list of raw entries, each of which may itself
/// contain `:` (e.g. `alarms`' `title:address:substring` entries) - the
/// same dual-delimiter convention `complete`/`delta_datefrom` already use
/// for "one value has an internal `:`, several values are `|`-joined".
fn pipe_list(raw: &HashMap<String, String>, key: &str) -> Vec<String> {
    raw.get(key)
        .map(|v| v.split('|').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

fn pipe_list_i32(raw: &HashMap<String, String>, key: &str) -> Vec<i32> {
    match raw.get(key) {
        None => DEFAULT_COMPLETE_STATUSES.to_vec(),
        Some(v) => v
            .split('|')
            .filter_map(|s| s.trim().parse::<i32>().ok())
            .collect(),
    }
}

fn u64_key(raw: &HashMap<String, String>, key: &str) -> Option<u64> {
    raw.get(key).and_then(|v| v.trim().parse::<u64>().ok())
}

fn build(raw: HashMap<String, String>, base_dir: &Path) -> Result<ServiceConfig, ConfigError> {
    let ctype = raw
        .get("ctype")
        .map(|v| SourceKind::from_ctype(v))
        .unwrap_or(SourceKind::BankPerso);

    let root_value = raw.get("root").ok_or(ConfigError::MissingKey {
        source: ctype.as_ctype().to_string(),
        key: "root",
    })?;
    let root = resolve_path(base_dir, root_value);

    let seen = raw
        .get("seen")
        .map(|v| resolve_path(base_dir, v))
        .unwrap_or_else(|| base_dir.join("seen.txt"));

    let errorlog = raw.get("errorlog").map(|v| resolve_path(base_dir, v));

    let delta = raw
        .get("delta_datefrom")
        .and_then(|v| v.split_once(':'))
        .and_then(|(near, far)| Some((near.trim().parse::<i64>().ok()?, far.trim().parse::<i64>().ok()?)));
    let (delta_near, delta_far) = delta.unwrap_or((
        crate::util::constants::DEFAULT_DELTA_NEAR_DAYS,
        crate::util::constants::DEFAULT_DELTA_FAR_DAYS,
    ));

    Ok(ServiceConfig {
        ctype,
        root,
        ip: raw.get("ip").cloned().unwrap_or_default(),
        alias: raw.get("alias").cloned().unwrap_or_default(),
        client: raw.get("client").cloned().unwrap_or_default(),

        encoding: raw.get("encoding").cloned(),
        filemask: raw.get("filemask").cloned(),
        options: colon_list(&raw, "options"),

        seen,
        errorlog,

        emergency: colon_list(&raw, "emergency"),
        alarms: pipe_list(&raw, "alarms"),
        mailkeys: colon_list(&raw, "mailkeys"),

        suppressed: colon_list(&raw, "suppressed"),

        delta_near,
        delta_far,

        check_datefrom: bool_key(&raw, "check_datefrom"),
        check_filename: bool_key(&raw, "check_filename"),
        case_insensitive: bool_key(&raw, "case_insensitive"),
        forced_refresh: bool_key(&raw, "forced_refresh"),
        stack_events: bool_key(&raw, "stack_events"),
        watch_everything: bool_key(&raw, "watch_everything"),
        decoder_trace: bool_key(&raw, "decoder_trace"),
        debug: bool_key(&raw, "debug"),
        deepdebug: bool_key(&raw, "deepdebug"),
        trace: bool_key(&raw, "trace"),
        existstrace: bool_key(&raw, "existstrace"),
        disableoutput: bool_key(&raw, "disableoutput"),
        observertrace: bool_key(&raw, "observertrace"),

        limit: u64_key(&raw, "limit"),
        timeout: u64_key(&raw, "timeout"),
        sleep: u64_key(&raw, "sleep"),
        restart: u64_key(&raw, "restart"),

        complete: pipe_list_i32(&raw, "complete"),

        emitter: bool_key(&raw, "emitter"),

        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_minimal_config() {
        let contents = "ctype::bankperso\nroot::/var/log/bankperso\n";
        let cfg = parse(contents, &PathBuf::from("/etc/orderlog")).unwrap();
        assert_eq!(cfg.ctype, SourceKind::BankPerso);
        assert_eq!(cfg.root, PathBuf::from("/var/log/bankperso"));
        assert_eq!(cfg.complete, DEFAULT_COMPLETE_STATUSES.to_vec());
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let contents = "# a comment\n\n; another comment\nctype::sdc\nroot::/data\n";
        let cfg = parse(contents, &PathBuf::from("/etc")).unwrap();
        assert_eq!(cfg.ctype, SourceKind::Sdc);
    }

    #[test]
    fn colon_and_pipe_lists_are_split() {
        let contents = "ctype::sdc\nroot::/data\nsuppressed::tmp:bak\ncomplete::1|2|3\n";
        let cfg = parse(contents, &PathBuf::from("/etc")).unwrap();
        assert_eq!(cfg.suppressed, vec!["tmp", "bak"]);
        assert_eq!(cfg.complete, vec![1, 2, 3]);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let contents = "ctype::bankperso\nroot::logs\nseen::state/seen.txt\n";
        let cfg = parse(contents, &PathBuf::from("/etc/orderlog")).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/etc/orderlog/logs"));
        assert_eq!(cfg.seen, PathBuf::from("/etc/orderlog/state/seen.txt"));
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let contents = "ctype::bankperso\n";
        let err = parse(contents, &PathBuf::from("/etc")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "root", .. }));
    }

    #[test]
    fn alarms_is_a_pipe_joined_list_of_colon_structured_entries() {
        let contents = "ctype::bankperso\nroot::/data\n\
            alarms::Ops:ops@customer.example:rejected|Billing:billing@customer.example:overdue\n";
        let cfg = parse(contents, &PathBuf::from("/etc")).unwrap();
        assert_eq!(
            cfg.alarms,
            vec![
                "Ops:ops@customer.example:rejected".to_string(),
                "Billing:billing@customer.example:overdue".to_string(),
            ]
        );
    }

    #[test]
    fn delta_datefrom_overrides_defaults() {
        let contents = "ctype::bankperso\nroot::/data\ndelta_datefrom::-3:-14\n";
        let cfg = parse(contents, &PathBuf::from("/etc")).unwrap();
        assert_eq!(cfg.delta_near, -3);
        assert_eq!(cfg.delta_far, -14);
    }
}
