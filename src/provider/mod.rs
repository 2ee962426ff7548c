//! Outbound access to the energy-device provider.
//!
//! `auth` owns the client-credentials token and its cache; `client` is the
//! HTTP implementation of [`ProviderApi`].

pub mod auth;
pub mod client;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::device::{Device, DeviceList, DeviceStatistics, LinkRequest, LinkSession};

/// Per-call inputs shared by every provider operation: the bearer token to
/// attach and the instant by which the call must have completed.
#[derive(Debug, Clone)]
pub struct CallContext {
    bearer: String,
    pub deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(access_token: &str, deadline: Option<Instant>) -> Self {
        Self {
            bearer: format!("Bearer {}", access_token),
            deadline,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> &str {
        &self.bearer
    }

    /// Time left before the deadline, if one is set. Zero once it has passed.
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Pagination cursor for list endpoints. Empty/zero fields are omitted from
/// the query so the provider applies its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    pub after: String,
    pub before: String,
    pub page_size: u32,
}

impl PageParams {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.after.is_empty() {
            params.push(("after", self.after.clone()));
        }
        if !self.before.is_empty() {
            params.push(("before", self.before.clone()));
        }
        if self.page_size > 0 {
            params.push(("pageSize", self.page_size.to_string()));
        }
        params
    }
}

/// Year/month/day selector for production statistics; `day == 0` selects the
/// whole month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticQuery {
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

impl StatisticQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.year <= 0 {
            return Err(format!("invalid year: {}", self.year));
        }
        if !(1..=12).contains(&self.month) {
            return Err(format!("invalid month: {}", self.month));
        }
        if !(0..=31).contains(&self.day) {
            return Err(format!("invalid day: {}", self.day));
        }
        Ok(())
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("year", self.year.to_string()),
            ("month", self.month.to_string()),
        ];
        if self.day > 0 {
            params.push(("day", self.day.to_string()));
        }
        params
    }
}

/// JSON problem object returned by the provider on failure. The legacy shape
/// (`message`/`details`) is accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problem {
    pub kind: String,
    pub title: String,
    pub detail: String,
}

/// Both shapes as sent; `title`/`detail` win when a body carries both.
#[derive(Deserialize)]
struct RawProblem {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    message: Option<String>,
    detail: Option<String>,
    details: Option<String>,
}

impl Problem {
    /// Decode an error body. A body with none of the known fields counts as
    /// unreadable.
    pub fn parse(body: &[u8]) -> Option<Problem> {
        let raw: RawProblem = serde_json::from_slice(body).ok()?;
        let problem = Problem {
            kind: raw.kind.unwrap_or_default(),
            title: raw.title.or(raw.message).unwrap_or_default(),
            detail: raw.detail.or(raw.details).unwrap_or_default(),
        };
        if problem.kind.is_empty() && problem.title.is_empty() && problem.detail.is_empty() {
            return None;
        }
        Some(problem)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{} - {}", .problem.title, .problem.detail)]
    Api { status: StatusCode, problem: Problem },

    #[error("request failed with status {status} and unreadable error body")]
    Unreadable { status: StatusCode },

    #[error("bad response from provider: {0}")]
    BadResponse(String),

    #[error("failed to send request: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,
}

impl ProviderError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Api { status, .. } | ProviderError::Unreadable { status } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ProviderError::Api { status, problem } => {
                *status == StatusCode::NOT_FOUND || problem.kind.contains("not-found")
            }
            ProviderError::Unreadable { status } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::BadResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// The provider capabilities this adapter relies on.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn list_devices(
        &self,
        ctx: &CallContext,
        page: &PageParams,
    ) -> Result<DeviceList, ProviderError>;

    async fn list_owner_devices(
        &self,
        ctx: &CallContext,
        owner_id: &str,
        page: &PageParams,
    ) -> Result<DeviceList, ProviderError>;

    async fn get_device(&self, ctx: &CallContext, id: &str) -> Result<Device, ProviderError>;

    async fn get_device_statistics(
        &self,
        ctx: &CallContext,
        id: &str,
        query: StatisticQuery,
    ) -> Result<DeviceStatistics, ProviderError>;

    async fn link_device(
        &self,
        ctx: &CallContext,
        owner_id: &str,
        request: &LinkRequest,
    ) -> Result<LinkSession, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page_params_produce_no_query() {
        assert!(PageParams::default().to_query().is_empty());
    }

    #[test]
    fn test_page_params_only_set_fields() {
        let page = PageParams {
            after: "cursor-1".into(),
            before: String::new(),
            page_size: 25,
        };
        assert_eq!(
            page.to_query(),
            vec![("after", "cursor-1".to_string()), ("pageSize", "25".to_string())]
        );
    }

    #[test]
    fn test_statistic_query_bounds() {
        let ok = StatisticQuery { year: 2024, month: 2, day: 0 };
        assert!(ok.validate().is_ok());
        assert!(StatisticQuery { year: 2024, month: 12, day: 31 }.validate().is_ok());

        for bad in [
            StatisticQuery { year: 0, month: 1, day: 1 },
            StatisticQuery { year: -1, month: 1, day: 1 },
            StatisticQuery { year: 2024, month: 0, day: 1 },
            StatisticQuery { year: 2024, month: 13, day: 1 },
            StatisticQuery { year: 2024, month: 1, day: -1 },
            StatisticQuery { year: 2024, month: 1, day: 32 },
        ] {
            assert!(bad.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_statistic_query_omits_zero_day() {
        let q = StatisticQuery { year: 2024, month: 6, day: 0 };
        assert_eq!(
            q.to_query(),
            vec![("year", "2024".to_string()), ("month", "6".to_string())]
        );
    }

    #[test]
    fn test_problem_accepts_both_shapes() {
        let current = Problem::parse(
            br#"{"type":"access_denied","title":"Unauthorized","detail":"token expired"}"#,
        )
        .unwrap();
        assert_eq!(current.title, "Unauthorized");
        assert_eq!(current.detail, "token expired");

        let legacy =
            Problem::parse(br#"{"type":"bad_request","message":"Bad input","details":"month"}"#)
                .unwrap();
        assert_eq!(legacy.title, "Bad input");
        assert_eq!(legacy.detail, "month");
    }

    #[test]
    fn test_problem_with_both_shapes_prefers_title() {
        let mixed = Problem::parse(
            br#"{"type":"server_error","title":"Upstream failure","message":"legacy text","detail":"inverter offline","details":"old"}"#,
        )
        .unwrap();
        assert_eq!(mixed.title, "Upstream failure");
        assert_eq!(mixed.detail, "inverter offline");

        let partial = Problem::parse(br#"{"message":"Bad input","detail":"month"}"#).unwrap();
        assert_eq!(partial.title, "Bad input");
        assert_eq!(partial.detail, "month");
    }

    #[test]
    fn test_problem_rejects_unknown_bodies() {
        assert!(Problem::parse(b"<html>502</html>").is_none());
        assert!(Problem::parse(br#"{"foo":"bar"}"#).is_none());
    }

    #[test]
    fn test_call_context_formats_bearer() {
        let ctx = CallContext::new("abc", None);
        assert_eq!(ctx.authorization(), "Bearer abc");
        assert!(ctx.remaining().is_none());
    }
}
