//! Filename templates
//!
//! A template is plain text with `{marker}` substitutions. Rendering is a
//! pure function of the template and the supplied variables, so the same
//! template and clock reading always produce the same name.
//!
//! | Marker        | Renders as                          |
//! |---------------|-------------------------------------|
//! | `{date}`      | `2024-01-01`                        |
//! | `{time}`      | `235959`                            |
//! | `{datetime}`  | `20240101-235959`                   |
//! | `{timestamp}` | unix seconds                        |
//! | `{now:FMT}`   | `now` formatted with strftime `FMT` |
//! | `{name}`      | the template variable `name`        |
//!
//! `{{` and `}}` render as literal braces.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::error::{SnapshotError, SnapshotResult};

/// Variables available while rendering a template
#[derive(Debug, Clone)]
pub struct TemplateVars {
    /// Clock reading used by the time markers
    pub now: DateTime<Utc>,
    /// User-defined variables
    pub extra: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Variables with only a clock reading
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            extra: BTreeMap::new(),
        }
    }

    /// Add user-defined variables
    pub fn with_extra(mut self, extra: BTreeMap<String, String>) -> Self {
        self.extra = extra;
        self
    }
}

/// Render a template into a snapshot filename
///
/// # Errors
///
/// Returns [`SnapshotError::Template`] for an unterminated or unmatched
/// brace, an unknown variable, an invalid strftime format, or a result
/// that is not a plain file name.
pub fn render(template: &str, vars: &TemplateVars) -> SnapshotResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let offset = template.len() - tail.len();

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if tail.starts_with('}') {
            return Err(SnapshotError::Template(format!(
                "unmatched '}}' at offset {} in {:?}",
                offset, template
            )));
        }

        let end = tail.find('}').ok_or_else(|| {
            SnapshotError::Template(format!(
                "unterminated marker at offset {} in {:?}",
                offset, template
            ))
        })?;
        out.push_str(&resolve(&tail[1..end], vars)?);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);

    check_file_name(&out)?;
    Ok(out)
}

fn resolve(marker: &str, vars: &TemplateVars) -> SnapshotResult<String> {
    let now = vars.now;
    let value = match marker {
        "date" => now.format("%Y-%m-%d").to_string(),
        "time" => now.format("%H%M%S").to_string(),
        "datetime" => now.format("%Y%m%d-%H%M%S").to_string(),
        "timestamp" => now.timestamp().to_string(),
        _ => {
            if let Some(fmt) = marker.strip_prefix("now:") {
                return format_now(now, fmt);
            }
            vars.extra.get(marker).cloned().ok_or_else(|| {
                SnapshotError::Template(format!("unknown template variable {{{}}}", marker))
            })?
        }
    };
    Ok(value)
}

fn format_now(now: DateTime<Utc>, fmt: &str) -> SnapshotResult<String> {
    let items: Vec<Item> = StrftimeItems::new(fmt).collect();
    if fmt.is_empty() || items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SnapshotError::Template(format!(
            "invalid date format {:?}",
            fmt
        )));
    }
    Ok(now.format_with_items(items.into_iter()).to_string())
}

/// Reject names that are empty or would escape the directory they are joined to
pub fn check_file_name(name: &str) -> SnapshotResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(SnapshotError::Template(format!(
            "template rendered to an unusable file name {:?}",
            name
        )));
    }
    if name.contains(&['/', '\\'][..]) {
        return Err(SnapshotError::Template(format!(
            "file name {:?} contains a path separator",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> TemplateVars {
        TemplateVars::new(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    #[test]
    fn test_date_marker() {
        let name = render("backup-{date}.sql", &at(2024, 1, 1, 3, 4, 5)).unwrap();
        assert_eq!(name, "backup-2024-01-01.sql");
    }

    #[test]
    fn test_all_builtin_markers() {
        let vars = at(2024, 2, 29, 23, 59, 58);
        assert_eq!(render("{time}", &vars).unwrap(), "235958");
        assert_eq!(render("{datetime}", &vars).unwrap(), "20240229-235958");
        assert_eq!(render("{timestamp}", &vars).unwrap(), "1709251198");
        assert_eq!(render("{now:%Y_%j}", &vars).unwrap(), "2024_060");
    }

    #[test]
    fn test_plain_template_is_unchanged() {
        let vars = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(render("dump.sql", &vars).unwrap(), "dump.sql");
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let vars = at(2024, 6, 1, 12, 0, 0);
        let a = render("db-{datetime}.sql", &vars).unwrap();
        let b = render("db-{datetime}.sql", &vars).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_times_render_distinct_names() {
        let templates = ["{timestamp}.sql", "s-{datetime}.sql", "{now:%s}"];
        let t1 = at(2024, 1, 1, 0, 0, 0);
        let t2 = at(2024, 1, 1, 0, 0, 1);
        for template in templates {
            assert_ne!(
                render(template, &t1).unwrap(),
                render(template, &t2).unwrap(),
                "{}",
                template
            );
        }
    }

    #[test]
    fn test_extra_variables() {
        let mut extra = BTreeMap::new();
        extra.insert("site".to_string(), "blog".to_string());
        let vars = at(2024, 1, 1, 0, 0, 0).with_extra(extra);

        let name = render("{site}-{date}.sql", &vars).unwrap();
        assert_eq!(name, "blog-2024-01-01.sql");
    }

    #[test]
    fn test_escaped_braces() {
        let vars = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(render("{{x}}-{date}", &vars).unwrap(), "{x}-2024-01-01");
    }

    #[test]
    fn test_malformed_templates_fail() {
        let vars = at(2024, 1, 1, 0, 0, 0);
        for bad in ["{date", "date}", "{nope}", "{}", "{now:}", "{now:%Q}"] {
            let err = render(bad, &vars).unwrap_err();
            assert!(matches!(err, SnapshotError::Template(_)), "{}", bad);
        }
    }

    #[test]
    fn test_path_separators_rejected() {
        let vars = at(2024, 1, 1, 0, 0, 0);
        assert!(render("../etc/{date}", &vars).is_err());
        assert!(render("{now:%Y/%m}", &vars).is_err());
        assert!(render("{{}}", &vars).is_ok());
    }
}
