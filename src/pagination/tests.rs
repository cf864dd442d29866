//! Tests for pagination module

use super::*;
use crate::auth::SessionManager;
use crate::config::{AuthMode, Credentials, SessionConfig};
use crate::error::{Error, ErrorKind};
use crate::http::{
    ExecutorConfig, RecordedResponse, RecordedTransport, Reply, RequestExecutor, RequestOptions,
};
use crate::types::{BackoffType, Method};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;
use tokio_util::sync::CancellationToken;

const LIST_PATH: &str = "/api/v1/buildings";

fn executor(transport: &Arc<RecordedTransport>) -> RequestExecutor {
    transport.on(
        Method::POST,
        "/api/v1/oauth/token",
        RecordedResponse::json(200, &json!({"access_token": "tok", "expires_in": 1200})),
    );
    let creds = Credentials::new("https://jamf.test", AuthMode::token_exchange("id", "s")).unwrap();
    let session = Arc::new(SessionManager::new(
        creds.clone(),
        SessionConfig::default(),
        transport.clone(),
    ));
    let config = ExecutorConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .adaptive_throttling(false)
        .build();
    RequestExecutor::new(
        creds.instance_url().clone(),
        transport.clone(),
        Some(session),
        config,
    )
}

/// Serve `total` numbered items, honoring the page parameters by name
fn serve_items(
    transport: &RecordedTransport,
    total: usize,
    params: PageParams,
    report_total: bool,
) {
    transport.on_fn(Method::GET, LIST_PATH, move |req| {
        let page: usize = req
            .query_value(&params.page_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let size: usize = req
            .query_value(&params.size_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let start = (page * size).min(total);
        let end = (start + size).min(total);
        let results: Vec<_> = (start..end)
            .map(|i| json!({"id": i.to_string(), "name": format!("b{i}")}))
            .collect();
        let body = if report_total {
            json!({"totalCount": total, "results": results})
        } else {
            json!({"results": results})
        };
        Reply::Respond(RecordedResponse::json(200, &body))
    });
}

#[derive(Debug, Deserialize)]
struct Item {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    results: Vec<Item>,
}

async fn walk(
    exec: &RequestExecutor,
    options: &PaginationOptions,
) -> crate::error::Result<(Vec<String>, PageSummary)> {
    let mut ids = Vec::new();
    let (_, summary) = fetch_all(
        exec,
        "api/v1/buildings",
        &[],
        &PageParams::versioned(),
        options,
        &RequestOptions::default(),
        |body| {
            let page: Envelope = serde_json::from_slice(body)?;
            ids.extend(page.results.into_iter().map(|i| i.id));
            Ok(())
        },
    )
    .await?;
    Ok((ids, summary))
}

// ============================================================================
// PageParams Tests
// ============================================================================

#[test]
fn test_page_params_presets() {
    assert_eq!(PageParams::versioned().size_param, "page-size");
    assert_eq!(PageParams::camel_case().size_param, "pageSize");
    assert_eq!(PageParams::versioned().page_param, "page");
}

#[test]
fn test_page_params_validation() {
    assert!(PageParams::new("page", "").validate().is_err());
    assert!(PageParams::new("page", "page").validate().is_err());
    assert!(PageParams::new("p", "s").validate().is_ok());
}

#[test]
fn test_pagination_options_default() {
    let options = PaginationOptions::default();
    assert_eq!(options.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(options.start_page, 0);
    assert_eq!(options.max_pages, DEFAULT_MAX_PAGES);
    assert_eq!(options.results_field, "results");
    assert_eq!(options.total_field, "totalCount");
    assert!(PaginationOptions::new().page_size(0).validate().is_err());
    assert!(PaginationOptions::new().max_pages(0).validate().is_err());
}

#[test]
fn test_pagination_options_reject_page_index_overflow() {
    let err = PaginationOptions::new()
        .start_page(u32::MAX)
        .max_pages(2)
        .validate()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(PaginationOptions::new()
        .start_page(u32::MAX)
        .max_pages(1)
        .validate()
        .is_ok());
    assert!(PaginationOptions::new()
        .start_page(u32::MAX - 4)
        .max_pages(5)
        .validate()
        .is_ok());
}

// ============================================================================
// PageCursor Tests
// ============================================================================

#[test]
fn test_cursor_stops_at_last_page_index() {
    let mut cursor = PageCursor::new(
        &PaginationOptions::new()
            .page_size(10)
            .start_page(u32::MAX)
            .max_pages(3),
    );
    let next = cursor.advance(PageInfo {
        items: 10,
        total: None,
    });
    assert_eq!(next, NextPage::CapReached);
    assert_eq!(cursor.page, u32::MAX);
}

#[test]
fn test_cursor_short_page_checked_first() {
    let mut cursor = PageCursor::new(&PaginationOptions::new().page_size(10).max_pages(1));
    let next = cursor.advance(PageInfo {
        items: 3,
        total: Some(100),
    });
    assert_eq!(next, NextPage::Done(StopReason::ShortPage));
    assert_eq!(cursor.summary().items, 3);
}

#[test]
fn test_cursor_total_reached_before_cap() {
    let mut cursor = PageCursor::new(&PaginationOptions::new().page_size(10).max_pages(1));
    let next = cursor.advance(PageInfo {
        items: 10,
        total: Some(10),
    });
    assert_eq!(next, NextPage::Done(StopReason::TotalReached));
}

#[test]
fn test_cursor_cap() {
    let mut cursor = PageCursor::new(&PaginationOptions::new().page_size(10).max_pages(2));
    let full = PageInfo {
        items: 10,
        total: None,
    };
    assert_eq!(cursor.advance(full), NextPage::Continue);
    assert_eq!(cursor.page, 1);
    assert_eq!(cursor.advance(full), NextPage::CapReached);
    assert_eq!(
        cursor.summary(),
        PageSummary {
            pages: 2,
            items: 20,
            total: None
        }
    );
}

#[test]
fn test_page_info_from_body() {
    let options = PaginationOptions::default();
    let info = PageInfo::from_body(br#"{"totalCount": 5, "results": [1, 2]}"#, &options).unwrap();
    assert_eq!(
        info,
        PageInfo {
            items: 2,
            total: Some(5)
        }
    );

    let info = PageInfo::from_body(br#"{"totalCount": 0}"#, &options).unwrap();
    assert_eq!(info.items, 0);

    let err = PageInfo::from_body(br#"{"results": "nope"}"#, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

// ============================================================================
// FetchAll Tests
// ============================================================================

#[test_case(0, 1 ; "empty collection")]
#[test_case(1, 1 ; "single item")]
#[test_case(9, 1 ; "one short of a page")]
#[test_case(10, 1 ; "exactly one page")]
#[test_case(11, 2 ; "one past a page")]
#[test_case(100, 10 ; "ten full pages")]
#[tokio::test]
async fn test_fetch_all_with_total(total: usize, expected_requests: usize) {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, total, PageParams::versioned(), true);
    let exec = executor(&transport);

    let (ids, summary) = walk(&exec, &PaginationOptions::new().page_size(10))
        .await
        .unwrap();

    let expected: Vec<String> = (0..total).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);
    assert_eq!(summary.items, total as u64);
    assert_eq!(transport.count(Method::GET, LIST_PATH), expected_requests);
}

#[test_case(0, 1 ; "empty collection")]
#[test_case(10, 2 ; "exactly one page")]
#[test_case(100, 11 ; "ten full pages")]
#[tokio::test]
async fn test_fetch_all_without_total(total: usize, expected_requests: usize) {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, total, PageParams::versioned(), false);
    let exec = executor(&transport);

    let (ids, summary) = walk(&exec, &PaginationOptions::new().page_size(10))
        .await
        .unwrap();

    assert_eq!(ids.len(), total);
    assert_eq!(summary.total, None);
    assert_eq!(transport.count(Method::GET, LIST_PATH), expected_requests);
}

#[tokio::test]
async fn test_fetch_all_sends_pages_in_order() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 25, PageParams::versioned(), true);
    let exec = executor(&transport);

    walk(&exec, &PaginationOptions::new().page_size(10))
        .await
        .unwrap();

    let pages: Vec<_> = transport
        .requests()
        .iter()
        .filter(|r| r.path == LIST_PATH)
        .map(|r| r.query_value("page").unwrap_or_default().to_string())
        .collect();
    assert_eq!(pages, ["0", "1", "2"]);
}

#[tokio::test]
async fn test_fetch_all_camel_case_params_and_caller_query() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 3, PageParams::camel_case(), true);
    let exec = executor(&transport);

    let query = vec![
        ("sort".to_string(), "name:asc".to_string()),
        ("pageSize".to_string(), "999".to_string()),
        ("filter".to_string(), "name==\"HQ\"".to_string()),
    ];
    let mut merged = 0;
    fetch_all(
        &exec,
        "api/v1/buildings",
        &query,
        &PageParams::camel_case(),
        &PaginationOptions::new().page_size(50),
        &RequestOptions::default(),
        |_| {
            merged += 1;
            Ok(())
        },
    )
    .await
    .unwrap();
    assert_eq!(merged, 1);

    let sent = transport.requests().pop().unwrap();
    let keys: Vec<_> = sent.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    assert_eq!(
        keys,
        [
            "sort=name:asc",
            "filter=name==\"HQ\"",
            "page=0",
            "pageSize=50"
        ]
    );
}

#[tokio::test]
async fn test_fetch_all_start_page() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 30, PageParams::versioned(), false);
    let exec = executor(&transport);

    let (ids, _) = walk(&exec, &PaginationOptions::new().page_size(10).start_page(2))
        .await
        .unwrap();
    assert_eq!(ids.first().map(String::as_str), Some("20"));
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_fetch_all_cap_returns_inconsistency() {
    let transport = Arc::new(RecordedTransport::new());
    // Always a full page and a total that is never reached
    transport.on(
        Method::GET,
        LIST_PATH,
        RecordedResponse::json(
            200,
            &json!({"totalCount": 1000, "results": [{"id": "x"}, {"id": "y"}]}),
        ),
    );
    let exec = executor(&transport);

    let mut merged = Vec::new();
    let err = fetch_all(
        &exec,
        "api/v1/buildings",
        &[],
        &PageParams::versioned(),
        &PaginationOptions::new().page_size(2).max_pages(5),
        &RequestOptions::default(),
        |body| {
            merged.push(body.len());
            Ok(())
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PaginationInconsistency);
    match &err {
        Error::PaginationInconsistency {
            pages_fetched,
            items_merged,
            reported_total,
            response,
        } => {
            assert_eq!(*pages_fetched, 5);
            assert_eq!(*items_merged, 10);
            assert_eq!(*reported_total, Some(1000));
            assert!(response.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(merged.len(), 5);
    assert_eq!(transport.count(Method::GET, LIST_PATH), 5);
}

#[tokio::test]
async fn test_fetch_all_merge_failure_aborts() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 30, PageParams::versioned(), true);
    let exec = executor(&transport);

    let mut calls = 0;
    let err = fetch_all(
        &exec,
        "api/v1/buildings",
        &[],
        &PageParams::versioned(),
        &PaginationOptions::new().page_size(10),
        &RequestOptions::default(),
        |_| {
            calls += 1;
            Err(Error::decode("accumulator rejected page"))
        },
    )
    .await
    .unwrap_err();

    assert_eq!(calls, 1);
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(err.raw_body().is_some());
    assert_eq!(transport.count(Method::GET, LIST_PATH), 1);
}

#[tokio::test]
async fn test_fetch_all_page_error_propagates() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(
        Method::GET,
        LIST_PATH,
        RecordedResponse::json(
            403,
            &json!({"httpStatus": 403, "errors": [{"code": "FORBIDDEN", "description": "no access"}]}),
        ),
    );
    let exec = executor(&transport);

    let err = walk(&exec, &PaginationOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientError);
    assert_eq!(err.vendor_code(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn test_fetch_all_cancelled() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 30, PageParams::versioned(), true);
    let exec = executor(&transport);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = fetch_all(
        &exec,
        "api/v1/buildings",
        &[],
        &PageParams::versioned(),
        &PaginationOptions::default(),
        &RequestOptions::new().cancel(cancel),
        |_| Ok(()),
    )
    .await
    .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.count(Method::GET, LIST_PATH), 0);
}

#[tokio::test]
async fn test_collect_all_decodes_items() {
    let transport = Arc::new(RecordedTransport::new());
    serve_items(&transport, 12, PageParams::versioned(), true);
    let exec = executor(&transport);

    let items: Vec<Item> = collect_all(
        &exec,
        "api/v1/buildings",
        &[],
        &PageParams::versioned(),
        &PaginationOptions::new().page_size(5),
        &RequestOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(items.len(), 12);
    assert_eq!(items[11].id, "11");
}
