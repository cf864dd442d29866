//! Progress-reporting body stream

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Called after each chunk with `(bytes_sent, total_bytes)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

pin_project! {
    /// Wraps the file content stream of an upload.
    ///
    /// Checks the cancellation token before every chunk and reports the
    /// running byte count after it. After cancellation or an error the stream
    /// ends and no further progress is reported.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        sent: u64,
        total: u64,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
        finished: bool,
    }
}

impl<S> ProgressStream<S> {
    /// Wrap `inner`, which must yield exactly `total` bytes
    pub fn new(
        inner: S,
        total: u64,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            sent: 0,
            total,
            progress,
            cancel,
            finished: false,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }
        if this.cancel.is_cancelled() {
            *this.finished = true;
            debug!(sent = *this.sent, total = *this.total, "Upload cancelled");
            return Poll::Ready(Some(Err(Error::Cancelled)));
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.sent += chunk.len() as u64;
                if *this.sent > *this.total {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(Error::invalid_request(format!(
                        "upload source is larger than the declared {} bytes",
                        this.total
                    )))));
                }
                if let Some(progress) = this.progress.as_ref() {
                    progress(*this.sent, *this.total);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                *this.finished = true;
                if *this.sent == *this.total {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(Error::invalid_request(format!(
                        "upload source ended after {} of {} bytes",
                        this.sent, this.total
                    )))))
                }
            }
        }
    }
}
