use crate::error::{EngineError, Result};
use crate::{MetricsQuery, Sample};
use alertengine_common::labels::Labels;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Instant-query response from the Prometheus HTTP API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: Labels,
    value: (f64, String),
}

/// Metrics query bound to one source's Prometheus-compatible HTTP API.
///
/// A vector result yields its first sample's value and series labels; a
/// scalar yields the value with no labels; anything else counts as "no
/// series" for the evaluated expression.
#[derive(Debug)]
pub struct PromApiQuery {
    client: reqwest::Client,
    query_url: String,
    auth_token: String,
}

impl PromApiQuery {
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self> {
        let query_url = format!("{}/api/v1/query", base_url.trim_end_matches('/'));
        reqwest::Url::parse(&query_url).map_err(|e| EngineError::InvalidEndpoint {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            query_url,
            auth_token: auth_token.to_string(),
        })
    }
}

#[async_trait]
impl MetricsQuery for PromApiQuery {
    async fn query(&self, expr: &str) -> anyhow::Result<Option<Sample>> {
        let mut request = self.client.get(&self.query_url).query(&[("query", expr)]);
        if !self.auth_token.is_empty() {
            request = request.bearer_auth(&self.auth_token);
        }

        let resp: ApiResponse = request.send().await?.error_for_status()?.json().await?;

        if resp.status != "success" {
            anyhow::bail!(
                "query returned status '{}': {}",
                resp.status,
                resp.error.unwrap_or_default()
            );
        }

        let Some(data) = resp.data else {
            return Ok(None);
        };

        match data.result_type.as_str() {
            "vector" => {
                let samples: Vec<VectorSample> = serde_json::from_value(data.result)?;
                match samples.into_iter().next() {
                    Some(sample) => Ok(Some(Sample {
                        value: sample.value.1.parse()?,
                        labels: sample.metric,
                    })),
                    None => {
                        tracing::debug!(expr, "Query result vector empty");
                        Ok(None)
                    }
                }
            }
            "scalar" => {
                let (_, value): (f64, String) = serde_json::from_value(data.result)?;
                Ok(Some(Sample {
                    value: value.parse()?,
                    labels: Labels::new(),
                }))
            }
            other => {
                tracing::debug!(expr, result_type = other, "Query result type unsupported");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        let err = PromApiQuery::new("not a url", "", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidEndpoint { .. }));
    }

    #[test]
    fn accepts_trailing_slash() {
        let q = PromApiQuery::new("http://m:9090/", "", Duration::from_secs(1)).unwrap();
        assert_eq!(q.query_url, "http://m:9090/api/v1/query");
    }

    #[test]
    fn parses_vector_response() {
        let raw = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"instance": "a", "job": "node"}, "value": [1700000000.1, "5"]},
                    {"metric": {"instance": "b"}, "value": [1700000000.1, "9"]}
                ]
            }
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.result_type, "vector");
        let samples: Vec<VectorSample> = serde_json::from_value(data.result).unwrap();
        assert_eq!(samples[0].value.1, "5");
        assert_eq!(samples[0].metric.get("instance").unwrap(), "a");
    }

    #[test]
    fn parses_scalar_response() {
        let raw = r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000.1,"42"]}}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let data = resp.data.unwrap();
        let (_, value): (f64, String) = serde_json::from_value(data.result).unwrap();
        assert_eq!(value, "42");
    }
}
