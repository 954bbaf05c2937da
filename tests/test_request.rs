use cors_relay::http::request::{Method, Request, RequestBuilder};

fn get(path: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .path(path)
        .build()
        .unwrap()
}

#[test]
fn test_query_param_is_percent_decoded() {
    let req = get("/?url=https%3A%2F%2Fexample.com%2Fapi%2Fping%3Fa%3D1%26b%3D2");

    assert_eq!(
        req.query_param("url").as_deref(),
        Some("https://example.com/api/ping?a=1&b=2")
    );
}

#[test]
fn test_query_param_unencoded_target() {
    let req = get("/?url=https://api.binance.com/api/v3/ticker/24hr");

    assert_eq!(
        req.query_param("url").as_deref(),
        Some("https://api.binance.com/api/v3/ticker/24hr")
    );
}

#[test]
fn test_query_values_keep_order() {
    let req = get("/?url=first&other=x&url=second");

    assert_eq!(req.query_values("url"), vec!["first", "second"]);
    assert_eq!(req.query_param("url").as_deref(), Some("first"));
}

#[test]
fn test_query_param_missing() {
    assert_eq!(get("/").query_param("url"), None);
    assert_eq!(get("/?target=x").query_param("url"), None);
    assert!(get("/").query_values("url").is_empty());
}

#[test]
fn test_query_param_empty_value_counts_as_missing() {
    assert_eq!(get("/?url=").query_param("url"), None);
}

#[test]
fn test_route_strips_query() {
    assert_eq!(get("/proxy?url=x").route(), "/proxy");
    assert_eq!(get("/").route(), "/");
}

#[test]
fn test_header_lookup_ignores_case() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("content-length", "42")
        .build()
        .unwrap();

    assert_eq!(req.header("Content-Length"), Some("42"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_keep_alive_defaults() {
    assert!(get("/").keep_alive());

    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .version("HTTP/1.0")
        .build()
        .unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_keep_alive_connection_header() {
    let close = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!close.keep_alive());

    let keep = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .version("HTTP/1.0")
        .header("Connection", "Keep-Alive")
        .build()
        .unwrap();
    assert!(keep.keep_alive());
}

#[test]
fn test_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}
