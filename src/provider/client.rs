//! HTTP implementation of [`ProviderApi`].
//!
//! Every call attaches the bearer from its [`CallContext`] and, when the
//! context carries a deadline, uses the remaining time as the reqwest
//! per-request timeout.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{CallContext, PageParams, Problem, ProviderApi, ProviderError, StatisticQuery};
use crate::models::device::{Device, DeviceList, DeviceStatistics, LinkRequest, LinkSession};

pub struct HttpProviderClient {
    http: Client,
    base_url: String,
}

impl HttpProviderClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, ctx: &CallContext, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, ctx.authorization());
        if let Some(remaining) = ctx.remaining() {
            req = req.timeout(remaining);
        }
        req
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        let resp = req.send().await.map_err(|e| {
            tracing::warn!(error = %e, "provider request failed");
            ProviderError::from(e)
        })?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(ProviderError::from)?;

        if !status.is_success() {
            return Err(match Problem::parse(&body) {
                Some(problem) => {
                    tracing::warn!(
                        status_code = status.as_u16(),
                        problem_type = %problem.kind,
                        title = %problem.title,
                        "provider returned an error"
                    );
                    ProviderError::Api { status, problem }
                }
                None => {
                    tracing::warn!(status_code = status.as_u16(), "provider returned an unreadable error");
                    ProviderError::Unreadable { status }
                }
            });
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to decode provider response");
            ProviderError::BadResponse(e.to_string())
        })
    }
}

#[async_trait]
impl ProviderApi for HttpProviderClient {
    async fn list_devices(
        &self,
        ctx: &CallContext,
        page: &PageParams,
    ) -> Result<DeviceList, ProviderError> {
        let req = self
            .request(ctx, Method::GET, "/inverters")
            .query(&page.to_query());
        self.execute(req).await
    }

    async fn list_owner_devices(
        &self,
        ctx: &CallContext,
        owner_id: &str,
        page: &PageParams,
    ) -> Result<DeviceList, ProviderError> {
        let path = format!("/users/{}/inverters", encode_segment(owner_id));
        let req = self
            .request(ctx, Method::GET, &path)
            .query(&page.to_query());
        self.execute(req).await
    }

    async fn get_device(&self, ctx: &CallContext, id: &str) -> Result<Device, ProviderError> {
        let path = format!("/inverters/{}", encode_segment(id));
        self.execute(self.request(ctx, Method::GET, &path)).await
    }

    async fn get_device_statistics(
        &self,
        ctx: &CallContext,
        id: &str,
        query: StatisticQuery,
    ) -> Result<DeviceStatistics, ProviderError> {
        let path = format!("/inverters/{}/statistics", encode_segment(id));
        let req = self
            .request(ctx, Method::GET, &path)
            .query(&query.to_query());
        self.execute(req).await
    }

    async fn link_device(
        &self,
        ctx: &CallContext,
        owner_id: &str,
        request: &LinkRequest,
    ) -> Result<LinkSession, ProviderError> {
        let path = format!("/users/{}/link", encode_segment(owner_id));
        let req = self.request(ctx, Method::POST, &path).json(request);
        self.execute(req).await
    }
}

/// Percent-encode a caller-supplied identifier for use as one path segment.
fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn device_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "userId": "user-1",
            "vendor": "SOLIS",
            "lastSeen": "2024-05-01T10:00:00Z",
            "isReachable": true,
            "productionState": {
                "productionRate": 1.5,
                "isProducing": true,
                "totalLifetimeProduction": 100.0,
                "lastUpdated": "2024-05-01T10:00:00Z"
            },
            "timezone": "Europe/Oslo",
            "capabilities": {
                "productionState": {"isCapable": true, "interventionIds": []},
                "productionStatistics": {"isCapable": true, "interventionIds": []}
            },
            "scopes": ["inverter:read:data"],
            "information": {
                "id": id,
                "sn": "SN-1",
                "brand": "Solis",
                "model": "S5",
                "siteName": "Roof",
                "installationDate": "2022-01-01T00:00:00Z"
            },
            "location": {"id": null, "longitude": 10.0, "latitude": 59.0, "lastUpdated": null}
        })
    }

    fn list_json() -> serde_json::Value {
        serde_json::json!({
            "data": [device_json("inv-1")],
            "pagination": {"after": "next", "before": null}
        })
    }

    fn ctx() -> CallContext {
        CallContext::new("tok-1", None)
    }

    #[tokio::test]
    async fn test_list_without_pagination_sends_no_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let list = client.list_devices(&ctx(), &PageParams::default()).await.unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.pagination.after.as_deref(), Some("next"));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.query(), None);
    }

    #[tokio::test]
    async fn test_list_with_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/user-1/inverters"))
            .and(query_param("pageSize", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let page = PageParams {
            page_size: 25,
            ..Default::default()
        };
        client.list_owner_devices(&ctx(), "user-1", &page).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.query(), Some("pageSize=25"));
    }

    #[tokio::test]
    async fn test_statistics_query_omits_zero_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters/inv-1/statistics"))
            .and(query_param("year", "2024"))
            .and(query_param("month", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timezone": "Europe/Oslo",
                "resolutions": {
                    "DAY": {"unit": "kWh", "data": [{"date": "2024-05-01T00:00:00Z", "value": 12.5}]}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let stats = client
            .get_device_statistics(&ctx(), "inv-1", StatisticQuery { year: 2024, month: 5, day: 0 })
            .await
            .unwrap();
        assert_eq!(stats.resolutions["DAY"].data[0].value, Some(12.5));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.query(), Some("year=2024&month=5"));
    }

    #[tokio::test]
    async fn test_link_posts_json_body() {
        let server = MockServer::start().await;
        let request = LinkRequest {
            scopes: vec!["inverter:read:data".into()],
            language: "en-US".into(),
            redirect_uri: "https://app.example/done".into(),
        };
        Mock::given(method("POST"))
            .and(path("/users/user-1/link"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_json(serde_json::json!({
                "scopes": ["inverter:read:data"],
                "language": "en-US",
                "redirectUri": "https://app.example/done"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "linkUrl": "https://link.example/abc",
                "linkToken": "lt-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let session = client.link_device(&ctx(), "user-1", &request).await.unwrap();
        assert_eq!(session.link_token, "lt-1");
    }

    #[tokio::test]
    async fn test_problem_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters/inv-1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "type": "access_denied",
                "title": "Unauthorized",
                "detail": "token expired"
            })))
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let err = client.get_device(&ctx(), "inv-1").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.to_string(), "Unauthorized - token expired");
    }

    #[tokio::test]
    async fn test_unreadable_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters/inv-1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>502</html>"))
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let err = client.get_device(&ctx(), "inv-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreadable { .. }));
        assert!(err.to_string().contains("502"), "{err}");
    }

    #[tokio::test]
    async fn test_undecodable_success_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters/inv-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 42}"#))
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let err = client.get_device(&ctx(), "inv-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::BadResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_deadline_bounds_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inverters/inv-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_json("inv-1"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = HttpProviderClient::new(&server.uri()).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
        let err = client
            .get_device(&CallContext::new("tok-1", Some(deadline)), "inv-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout), "{err:?}");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("user-1"), "user-1");
        assert_eq!(encode_segment("a/b c"), "a%2Fb%20c");
    }
}
