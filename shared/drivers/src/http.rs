//! Request plumbing shared by HTTP-based connectors.

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::DriverError;
use crate::{DriverResult, Record};

/// Sends `request` under `ctx` and decodes the body as JSON.
///
/// Anything but `200 OK` is an [`DriverError::UnexpectedStatus`]; a blank
/// body is an [`DriverError::EmptyResponse`], which callers must keep
/// distinct from a successful response with zero items.
pub async fn fetch_json(
    ctx: &RequestContext,
    source_type: &str,
    request: RequestBuilder,
) -> DriverResult<Value> {
    ctx.run(async {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();

        if status != StatusCode::OK {
            warn!(%url, status = status.as_u16(), "{} request failed", source_type);
            return Err(DriverError::UnexpectedStatus {
                source_type: source_type.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!(%url, bytes = body.len(), "{} response received", source_type);

        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DriverError::EmptyResponse(source_type.to_string()));
        }

        Ok(serde_json::from_slice(&body)?)
    })
    .await
}

/// Extracts the records of `entity` from a decoded list response.
///
/// Accepts a bare array, or an object carrying the array under the entity
/// key (`{"contacts": [...]}`).
pub fn records_from(source_type: &str, entity: &str, value: Value) -> DriverResult<Vec<Record>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove(entity) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => {
                return Err(DriverError::Decode(format!(
                    "{} response has no '{}' list",
                    source_type, entity
                )))
            }
            Some(other) => {
                return Err(DriverError::Decode(format!(
                    "{} '{}' is not a list: {}",
                    source_type, entity, other
                )))
            }
        },
        Value::Null => return Err(DriverError::EmptyResponse(source_type.to_string())),
        other => {
            return Err(DriverError::Decode(format!(
                "unexpected {} response for {}: {}",
                source_type, entity, other
            )))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(DriverError::Decode(format!(
                "{} {} item is not an object: {}",
                source_type, entity, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_records_from_array_and_wrapped_object() {
        let records = records_from("test", "contacts", json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(records.len(), 2);

        let body = json!({"contacts": [{"id": 1}], "meta": {}});
        let records = records_from("test", "contacts", body).unwrap();
        assert_eq!(records.len(), 1);

        let records = records_from("test", "contacts", json!([])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_records_from_rejects_bad_shapes() {
        assert!(matches!(
            records_from("test", "contacts", Value::Null),
            Err(DriverError::EmptyResponse(_))
        ));
        assert!(matches!(
            records_from("test", "contacts", json!([1, 2])),
            Err(DriverError::Decode(_))
        ));
        assert!(matches!(
            records_from("test", "contacts", json!({"calendars": []})),
            Err(DriverError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_json_classifies_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let ctx = RequestContext::default();
        let get = |p: &str| client.get(format!("{}{}", server.uri(), p));

        assert_eq!(fetch_json(&ctx, "test", get("/ok")).await.unwrap(), json!([]));
        assert!(matches!(
            fetch_json(&ctx, "test", get("/empty")).await,
            Err(DriverError::EmptyResponse(_))
        ));
        assert!(matches!(
            fetch_json(&ctx, "test", get("/garbage")).await,
            Err(DriverError::Decode(_))
        ));
        assert_eq!(fetch_json(&ctx, "test", get("/denied")).await.unwrap_err().status(), Some(401));
    }
}
