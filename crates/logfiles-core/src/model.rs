use serde::{Deserialize, Serialize};

use crate::error::LogFilesError;

/// Scan direction. On the wire this is `order_by`: 0 ascending, 1 descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOrder {
    Ascending,
    Descending,
}

impl ReadOrder {
    pub const ASCENDING_CODE: i64 = 0;
    pub const DESCENDING_CODE: i64 = 1;

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::ASCENDING_CODE => Some(Self::Ascending),
            Self::DESCENDING_CODE => Some(Self::Descending),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Ascending => Self::ASCENDING_CODE,
            Self::Descending => Self::DESCENDING_CODE,
        }
    }

    /// Where a read starts when the caller gave no cursor.
    pub fn default_start(self, size: u64) -> u64 {
        match self {
            Self::Ascending => 0,
            Self::Descending => size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    InternalServerError,
    GatewayTimeout,
}

impl HostStatus {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::GatewayTimeout => 504,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
            Self::GatewayTimeout => "Gateway Timeout",
        }
    }
}

/// Snapshot of a file taken when the query ran. `size` may be stale if the
/// file is being written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileHandle {
    pub host: String,
    pub path: String,
    pub size: u64,
}

/// Lines in read order plus the cursor to resume from.
///
/// For descending reads the first line is the one closest to the end of the
/// file and `cursor` sits just before the earliest returned line; for
/// ascending reads `cursor` sits just after the last returned line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LineWindow {
    pub cursor: u64,
    pub lines: Vec<String>,
}

impl LineWindow {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileRead {
    #[serde(flatten)]
    pub file: FileHandle,
    pub window: LineWindow,
}

/// One host's answer to a fanned-out query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HostResult {
    pub host: String,
    pub status_code: u16,
    pub status_message: String,
    #[serde(default)]
    pub files: Vec<FileRead>,
}

impl HostResult {
    pub fn success(host: impl Into<String>, files: Vec<FileRead>) -> Self {
        Self {
            host: host.into(),
            status_code: HostStatus::Ok.code(),
            status_message: HostStatus::Ok.reason().to_string(),
            files,
        }
    }

    pub fn failure(host: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status_code,
            status_message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn gateway_timeout(host: impl Into<String>) -> Self {
        let status = HostStatus::GatewayTimeout;
        Self::failure(host, status.code(), status.reason())
    }

    pub fn from_error(host: impl Into<String>, err: &LogFilesError) -> Self {
        match err {
            LogFilesError::HostUnreachable { .. } => Self::gateway_timeout(host),
            other => Self::failure(host, other.status().code(), other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_codes_round_trip_and_reject_unknown() {
        assert_eq!(ReadOrder::from_code(0), Some(ReadOrder::Ascending));
        assert_eq!(ReadOrder::from_code(1), Some(ReadOrder::Descending));
        assert_eq!(ReadOrder::from_code(2), None);
        assert_eq!(ReadOrder::Descending.code(), 1);
    }

    #[test]
    fn host_result_serializes_flat_file_records() {
        let result = HostResult::success(
            "10.0.0.1",
            vec![FileRead {
                file: FileHandle {
                    host: "10.0.0.1".to_string(),
                    path: "/var/log/app.log".to_string(),
                    size: 12,
                },
                window: LineWindow {
                    cursor: 6,
                    lines: vec!["second".to_string()],
                },
            }],
        );
        let value = serde_json::to_value(&result).expect("json");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["status_message"], "OK");
        assert_eq!(value["files"][0]["path"], "/var/log/app.log");
        assert_eq!(value["files"][0]["size"], 12);
        assert_eq!(value["files"][0]["window"]["cursor"], 6);
        assert_eq!(value["files"][0]["window"]["lines"][0], "second");
    }

    #[test]
    fn unreachable_error_becomes_gateway_timeout_record() {
        let err = LogFilesError::unreachable("peer:8080", "connection refused");
        let record = HostResult::from_error("peer:8080", &err);
        assert_eq!(record.status_code, 504);
        assert_eq!(record.status_message, "Gateway Timeout");
        assert!(record.files.is_empty());
        assert!(!record.is_success());
    }
}
