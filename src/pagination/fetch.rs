//! Paginated walk over a list endpoint

use super::types::{NextPage, PageCursor, PageInfo, PageParams, PageSummary, PaginationOptions};
use crate::error::{Error, Result};
use crate::http::{Request, RequestExecutor, RequestOptions, Response};
use crate::types::QueryParams;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Walk a paginated list endpoint, handing every page body to `merge`.
///
/// Pages are fetched in increasing order starting at
/// [`PaginationOptions::start_page`]; no page is fetched twice. Caller query
/// parameters named like the page parameters are replaced. Retry of
/// individual pages is left to the executor.
///
/// On success returns the last page's response and a summary. When the
/// safety cap is reached without an end-of-data signal the walk fails with
/// [`Error::PaginationInconsistency`]; everything merged until then stays in
/// the caller's accumulator.
pub async fn fetch_all<F>(
    executor: &RequestExecutor,
    path: &str,
    query: &[(String, String)],
    params: &PageParams,
    options: &PaginationOptions,
    request_options: &RequestOptions,
    mut merge: F,
) -> Result<(Response, PageSummary)>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    params.validate()?;
    options.validate()?;

    let base_query: QueryParams = query
        .iter()
        .filter(|(k, _)| *k != params.page_param && *k != params.size_param)
        .cloned()
        .collect();

    let mut cursor = PageCursor::new(options);

    loop {
        let request = Request::get(path)
            .queries(base_query.iter().cloned())
            .query(params.page_param.as_str(), cursor.page.to_string())
            .query(params.size_param.as_str(), cursor.page_size.to_string())
            .with_options(request_options.clone());

        let response = executor.execute(request).await?;

        let page = match PageInfo::from_body(&response.body, options) {
            Ok(page) => page,
            Err(e) => return Err(e.with_response(response)),
        };
        if let Err(e) = merge(&response.body) {
            return Err(e.with_response(response));
        }

        debug!(
            endpoint = path,
            page = cursor.page,
            items = page.items,
            total = ?page.total,
            "Merged page"
        );

        match cursor.advance(page) {
            NextPage::Continue => {}
            NextPage::Done(reason) => {
                let summary = cursor.summary();
                info!(
                    endpoint = path,
                    pages = summary.pages,
                    items = summary.items,
                    ?reason,
                    "Pagination complete"
                );
                return Ok((response, summary));
            }
            NextPage::CapReached => {
                let summary = cursor.summary();
                warn!(
                    endpoint = path,
                    pages = summary.pages,
                    items = summary.items,
                    total = ?summary.total,
                    "Pagination safety cap reached"
                );
                return Err(Error::PaginationInconsistency {
                    pages_fetched: summary.pages,
                    items_merged: summary.items,
                    reported_total: summary.total,
                    response: Some(Box::new(response)),
                });
            }
        }
    }
}

/// Walk a paginated endpoint and decode every item of the results field
pub async fn collect_all<T: DeserializeOwned>(
    executor: &RequestExecutor,
    path: &str,
    query: &[(String, String)],
    params: &PageParams,
    options: &PaginationOptions,
    request_options: &RequestOptions,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let field = options.results_field.clone();
    fetch_all(
        executor,
        path,
        query,
        params,
        options,
        request_options,
        |body| {
            let mut page: Value = serde_json::from_slice(body)?;
            if let Some(Value::Array(results)) = page.get_mut(&field).map(Value::take) {
                for item in results {
                    items.push(serde_json::from_value(item)?);
                }
            }
            Ok(())
        },
    )
    .await?;
    Ok(items)
}
