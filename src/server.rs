//! Request routing for the web API.
//!
//! The listener in `bin/server.rs` reads raw HTTP/1.1 requests off the socket
//! and hands them to [`handle_request`]; everything here is plain string and
//! JSON handling so routes can be exercised without a socket.

use crate::context::ServiceContext;
use crate::error::BudgetError;
use crate::forecast::generate_forecast;
use crate::municipality::{fetch_municipality_data, MunicipalityQuery};
use crate::pipeline::run_user_query;
use crate::treasury::fetch_item_catalog;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    pub fn parse(raw: &str) -> Option<Self> {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let mut lines = head.lines();

        let mut parts = lines.next()?.split_whitespace();
        let method = parts.next()?.to_uppercase();
        let target = parts.next()?;

        let (path, query_string) = target.split_once('?').unwrap_or((target, ""));
        // Normalize path (remove trailing slash except for root)
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        let query = url::form_urlencoded::parse(query_string.as_bytes())
            .into_owned()
            .collect();

        let headers = lines
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        Some(Self {
            method,
            path,
            query,
            headers,
            body: body.to_string(),
        })
    }

    fn json_body(&self) -> Option<Value> {
        serde_json::from_str(self.body.trim()).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self::json(status, &json!({ "error": message.to_string() }))
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: String::new(),
        }
    }

    /// Serialize as an HTTP/1.1 response with permissive CORS headers
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: application/json\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            status_text(self.status),
            self.body.len(),
            self.body
        )
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        _ => "Internal Server Error",
    }
}

pub fn extract_content_length(request: &str) -> Option<usize> {
    request
        .lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
}

/// Whether `buffer` holds the full header block and as many body bytes as
/// `Content-Length` announces. Works on raw bytes so invalid UTF-8 does not
/// hide the end of the headers.
pub fn request_complete(buffer: &[u8]) -> bool {
    let Some(headers_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buffer[..headers_end + 4]);
    let body_len = extract_content_length(&head).unwrap_or(0);
    buffer.len() >= headers_end + 4 + body_len
}

/// Parse and route one raw request
pub async fn handle_request(ctx: &ServiceContext, raw: &str) -> HttpResponse {
    match HttpRequest::parse(raw) {
        Some(request) => route(ctx, &request).await,
        None => HttpResponse::error(400, "Bad Request"),
    }
}

pub async fn route(ctx: &ServiceContext, request: &HttpRequest) -> HttpResponse {
    debug!("Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => HttpResponse::no_content(),
        ("GET", "/api/health") => HttpResponse::json(200, &json!({"status": "ok", "service": "muni-budget"})),
        ("POST", "/api/query") => query_route(ctx, request).await,
        ("GET", "/api/municipality-data") => municipality_route(ctx, request).await,
        ("POST", "/api/forecast") => forecast_route(ctx, request).await,
        ("GET", "/api/municipalities") => {
            HttpResponse::json(200, &json!({ "municipalities": ctx.tables.municipalities }))
        }
        ("GET", "/api/amount-types") => {
            HttpResponse::json(200, &json!({ "amount_types": ctx.tables.amount_types }))
        }
        ("GET", "/api/available-items") => match fetch_item_catalog(ctx.cube.as_ref(), ctx.base_url()).await {
            Ok(items) => HttpResponse::json(200, &json!({ "items": items })),
            Err(e) => {
                error!("Item catalog fetch failed: {}", e);
                HttpResponse::error(500, e)
            }
        },
        _ => HttpResponse::error(404, format!("No route for {} {}", request.method, request.path)),
    }
}

async fn query_route(ctx: &ServiceContext, request: &HttpRequest) -> HttpResponse {
    let user_request = request
        .json_body()
        .and_then(|body| body.get("user_request").and_then(Value::as_str).map(str::to_string))
        .filter(|s| !s.trim().is_empty());

    let Some(user_request) = user_request else {
        return HttpResponse::error(400, "user_request missing");
    };

    match run_user_query(ctx, &user_request).await {
        Ok(data) => HttpResponse::json(200, &data),
        Err(e) => {
            error!("Query failed: {}", e);
            HttpResponse::error(500, e)
        }
    }
}

async fn municipality_route(ctx: &ServiceContext, request: &HttpRequest) -> HttpResponse {
    let query = match MunicipalityQuery::from_params(&request.query) {
        Ok(q) => q,
        Err(e) => return HttpResponse::error(e.http_status(), e),
    };

    match fetch_municipality_data(ctx, &query).await {
        Ok(data) => HttpResponse::json(200, &data),
        Err(e @ BudgetError::Upstream { .. }) => {
            warn!("Municipality data request rejected upstream: {}", e);
            HttpResponse::error(400, e)
        }
        Err(e) => {
            error!("Municipality data request failed: {}", e);
            HttpResponse::error(500, e)
        }
    }
}

async fn forecast_route(ctx: &ServiceContext, request: &HttpRequest) -> HttpResponse {
    let Some(body) = request.json_body() else {
        return HttpResponse::error(400, "JSON body required");
    };
    let Some(records) = body.get("nl_data").and_then(Value::as_array) else {
        return HttpResponse::error(400, "nl_data missing");
    };
    let budget_total = match parse_budget_total(body.get("budget_total")) {
        Ok(total) => total,
        Err(message) => return HttpResponse::error(400, message),
    };

    match generate_forecast(ctx, records, budget_total).await {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(value) => HttpResponse::json(200, &value),
            Err(e) => HttpResponse::error(500, e),
        },
        Err(e) => {
            error!("Forecast failed: {}", e);
            HttpResponse::error(500, e)
        }
    }
}

/// Optional `budget_total`: a JSON number or a numeric string such as `"1e10"`
/// or `"2,000,000"`
fn parse_budget_total(value: Option<&Value>) -> std::result::Result<Option<f64>, String> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace([',', '_'], "").parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(total) if total.is_finite() && total > 0.0 => Ok(Some(total)),
        _ => Err(format!("budget_total must be a positive number, got {}", value.unwrap_or(&Value::Null))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line_query_and_body() {
        let raw = "POST /api/query/?debug=1&q=water%20spend HTTP/1.1\r\nHost: localhost\r\nContent-Length: 13\r\n\r\n{\"a\": \"b c\"}";
        let req = HttpRequest::parse(raw).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/api/query");
        assert_eq!(req.query["q"], "water spend");
        assert_eq!(req.headers["content-length"], "13");
        assert_eq!(req.body, "{\"a\": \"b c\"}");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(HttpRequest::parse("").is_none());
        assert!(HttpRequest::parse("GET").is_none());
    }

    #[test]
    fn test_content_length() {
        assert_eq!(extract_content_length("POST / HTTP/1.1\r\ncontent-length: 42\r\n\r\n"), Some(42));
        assert_eq!(extract_content_length("GET / HTTP/1.1\r\n\r\n"), None);
    }

    #[test]
    fn test_request_complete_on_raw_bytes() {
        assert!(!request_complete(b"GET / HTTP/1.1\r\nHost: x\r\n"));
        assert!(request_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
        assert!(!request_complete(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nab"));
        assert!(request_complete(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd"));

        // Invalid UTF-8 in a header still lets the end of the request be found
        let mut raw = b"POST / HTTP/1.1\r\nX-Name: \xff\xfe\r\nContent-Length: 2\r\n\r\n".to_vec();
        assert!(!request_complete(&raw));
        raw.extend_from_slice(b"\xc3\x28");
        assert!(request_complete(&raw));
    }

    #[test]
    fn test_budget_total_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_budget_total(None), Ok(None));
        assert_eq!(parse_budget_total(Some(&json!(null))), Ok(None));
        assert_eq!(parse_budget_total(Some(&json!(5000))), Ok(Some(5000.0)));
        assert_eq!(parse_budget_total(Some(&json!("1e10"))), Ok(Some(1e10)));
        assert_eq!(parse_budget_total(Some(&json!(" 2,000,000 "))), Ok(Some(2_000_000.0)));
        assert!(parse_budget_total(Some(&json!("lots"))).is_err());
        assert!(parse_budget_total(Some(&json!(-5))).is_err());
        assert!(parse_budget_total(Some(&json!([1]))).is_err());
    }

    #[test]
    fn test_response_serialization() {
        let response = HttpResponse::error(400, "user_request missing");
        let http = response.to_http_string();
        assert!(http.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(http.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(http.ends_with("\r\n\r\n{\"error\":\"user_request missing\"}"));
    }
}
