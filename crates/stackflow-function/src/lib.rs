//! Echo function served behind the built-in stack's REST API
//!
//! `GET /users?next=1&limit=2` answers `{"next":"1","limit":"2"}`. Missing
//! parameters come back as `null`.

use lambda_http::{Body, Error, Request, RequestExt, Response};
use serde_json::{Value, json};
use tracing::info;

/// Body returned for the given paging parameters
pub fn echo_page_params(next: Option<&str>, limit: Option<&str>) -> Value {
    json!({
        "next": next,
        "limit": limit,
    })
}

/// Handle an API Gateway proxy request
pub async fn function_handler(event: Request) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters();
    let next = params.first("next");
    let limit = params.first("limit");
    info!(next = ?next, limit = ?limit, "Echoing page parameters");

    let body = serde_json::to_string(&echo_page_params(next, limit))?;
    let response = Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .map_err(Box::new)?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(query: &[(&str, &str)]) -> Request {
        let params: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lambda_http::http::Request::builder()
            .uri("/users")
            .body(Body::Empty)
            .unwrap()
            .with_query_string_parameters(params)
    }

    fn body_json(response: &Response<Body>) -> Value {
        match response.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_echo_page_params() {
        assert_eq!(
            echo_page_params(Some("1"), Some("2")),
            json!({"next": "1", "limit": "2"})
        );
        assert_eq!(
            echo_page_params(None, None),
            json!({"next": null, "limit": null})
        );
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let body = echo_page_params(Some("abc"), Some("-0010"));
        assert_eq!(body["next"], "abc");
        assert_eq!(body["limit"], "-0010");
    }

    #[tokio::test]
    async fn test_handler_echoes_query() {
        let response = function_handler(request(&[("next", "1"), ("limit", "2")]))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
        assert_eq!(body_json(&response), json!({"next": "1", "limit": "2"}));
    }

    #[tokio::test]
    async fn test_handler_without_query() {
        let response = function_handler(request(&[])).await.unwrap();
        assert_eq!(body_json(&response), json!({"next": null, "limit": null}));
    }

    #[tokio::test]
    async fn test_handler_ignores_other_params() {
        let response = function_handler(request(&[("limit", "5"), ("page", "3")]))
            .await
            .unwrap();
        assert_eq!(body_json(&response), json!({"next": null, "limit": "5"}));
    }
}
