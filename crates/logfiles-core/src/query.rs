use serde::{Deserialize, Serialize};

use crate::engine::ReadRequest;
use crate::error::{LogFilesError, Result};
use crate::model::ReadOrder;
use crate::reader::KeywordFilter;

/// Sentinel meaning "not given" for `start_pos` and "unbounded" for `n_lines`.
pub const UNSPECIFIED: i64 = -1;

pub const DEFAULT_HOSTS: &str = "localhost";

/// Query parameters as they arrive on the wire, before range checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    /// Byte cursor to resume from; -1 starts at the order's natural end.
    pub start_pos: Option<i64>,
    /// Maximum matching lines per file; -1 reads whole files.
    pub n_lines: Option<i64>,
    /// Substring filter; empty matches everything.
    pub keyword: Option<String>,
    /// 0 ascending, 1 descending.
    pub order_by: Option<i64>,
    /// Carried in the `X-hosts` header, never in the query string.
    #[serde(skip)]
    pub hosts: Option<String>,
}

/// Fallbacks applied to parameters the caller left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub start_pos: i64,
    pub n_lines: i64,
    pub order_by: i64,
    pub hosts: String,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            start_pos: UNSPECIFIED,
            n_lines: UNSPECIFIED,
            order_by: ReadOrder::DESCENDING_CODE,
            hosts: DEFAULT_HOSTS.to_string(),
        }
    }
}

/// Range-checked query. Building one is the only validation step; nothing
/// downstream re-checks values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub start: Option<u64>,
    pub max_lines: Option<usize>,
    pub filter: KeywordFilter,
    pub order: ReadOrder,
    pub hosts: Vec<String>,
}

impl QueryParams {
    pub fn validate(raw: &RawQuery, defaults: &QueryDefaults) -> Result<Self> {
        let start_pos = raw.start_pos.unwrap_or(defaults.start_pos);
        let start = match start_pos {
            UNSPECIFIED => None,
            value => Some(
                u64::try_from(value)
                    .map_err(|_| LogFilesError::invalid("start_pos must be as minimum 0"))?,
            ),
        };

        let n_lines = raw.n_lines.unwrap_or(defaults.n_lines);
        let max_lines = match n_lines {
            UNSPECIFIED => None,
            value if value > 0 => Some(usize::try_from(value).unwrap_or(usize::MAX)),
            _ => return Err(LogFilesError::invalid("n_lines must be as minimum 1")),
        };

        let order = ReadOrder::from_code(raw.order_by.unwrap_or(defaults.order_by)).ok_or_else(
            || LogFilesError::invalid("order_by allowed values are 0 to ASC and 1 to DESC"),
        )?;

        let hosts = resolve_hosts(raw.hosts.as_deref(), &defaults.hosts);

        Ok(Self {
            start,
            max_lines,
            filter: KeywordFilter::new(raw.keyword.clone().unwrap_or_default()),
            order,
            hosts,
        })
    }

    pub fn read_request(&self) -> ReadRequest {
        ReadRequest {
            start: self.start,
            max_lines: self.max_lines,
            order: self.order,
            filter: self.filter.clone(),
        }
    }
}

/// The hosts a query goes to. A list with no usable entry falls back to
/// `defaults`, and an empty default falls back to the local host.
pub fn resolve_hosts(requested: Option<&str>, defaults: &str) -> Vec<String> {
    let hosts = requested.map(parse_hosts).unwrap_or_default();
    if !hosts.is_empty() {
        return hosts;
    }
    let hosts = parse_hosts(defaults);
    if !hosts.is_empty() {
        return hosts;
    }
    vec![DEFAULT_HOSTS.to_string()]
}

/// Splits a comma-separated host list, trimming blanks and dropping empties.
pub fn parse_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(raw: RawQuery) -> Result<QueryParams> {
        QueryParams::validate(&raw, &QueryDefaults::default())
    }

    #[test]
    fn defaults_read_whole_files_descending_on_localhost() {
        let params = validate(RawQuery::default()).expect("valid");
        assert_eq!(params.start, None);
        assert_eq!(params.max_lines, None);
        assert_eq!(params.order, ReadOrder::Descending);
        assert!(params.filter.is_empty());
        assert_eq!(params.hosts, vec!["localhost"]);
    }

    #[test]
    fn out_of_range_values_are_rejected_with_wire_messages() {
        let cases = [
            (
                RawQuery {
                    n_lines: Some(0),
                    ..RawQuery::default()
                },
                "n_lines must be as minimum 1",
            ),
            (
                RawQuery {
                    order_by: Some(2),
                    ..RawQuery::default()
                },
                "order_by allowed values are 0 to ASC and 1 to DESC",
            ),
            (
                RawQuery {
                    start_pos: Some(-5),
                    ..RawQuery::default()
                },
                "start_pos must be as minimum 0",
            ),
        ];
        for (raw, message) in cases {
            let err = validate(raw).expect_err("invalid");
            assert!(matches!(&err, LogFilesError::InvalidParameter(m) if m == message), "{err}");
        }
    }

    #[test]
    fn explicit_values_pass_through() {
        let params = validate(RawQuery {
            start_pos: Some(12),
            n_lines: Some(5),
            keyword: Some("ERROR".to_string()),
            order_by: Some(0),
            hosts: Some("a:8080, localhost ,,b".to_string()),
        })
        .expect("valid");
        assert_eq!(params.start, Some(12));
        assert_eq!(params.max_lines, Some(5));
        assert_eq!(params.filter.as_str(), "ERROR");
        assert_eq!(params.order, ReadOrder::Ascending);
        assert_eq!(params.hosts, vec!["a:8080", "localhost", "b"]);
    }

    #[test]
    fn blank_host_list_falls_back_to_defaults() {
        let defaults = QueryDefaults {
            hosts: "peer-a".to_string(),
            ..QueryDefaults::default()
        };
        for blank in ["", " , ,"] {
            let raw = RawQuery {
                hosts: Some(blank.to_string()),
                ..RawQuery::default()
            };
            let params = QueryParams::validate(&raw, &defaults).expect("valid");
            assert_eq!(params.hosts, vec!["peer-a"], "{blank:?}");
        }
        assert_eq!(resolve_hosts(Some(","), ""), vec!["localhost"]);
    }

    #[test]
    fn configured_defaults_fill_gaps() {
        let defaults = QueryDefaults {
            start_pos: UNSPECIFIED,
            n_lines: 50,
            order_by: 0,
            hosts: "peer-a,peer-b".to_string(),
        };
        let params = QueryParams::validate(&RawQuery::default(), &defaults).expect("valid");
        assert_eq!(params.max_lines, Some(50));
        assert_eq!(params.order, ReadOrder::Ascending);
        assert_eq!(params.hosts, vec!["peer-a", "peer-b"]);
    }
}
