use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use crate::core::{ProgressCallback, UploadProgress};

pin_project! {
    /// Reports the running byte count as the wrapped body stream is consumed.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        callback: ProgressCallback,
        bytes_sent: u64,
        bytes_total: Option<u64>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, callback: ProgressCallback, bytes_total: Option<u64>) -> Self {
        Self {
            inner,
            callback,
            bytes_sent: 0,
            bytes_total,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.bytes_sent += chunk.len() as u64;
                    (this.callback)(UploadProgress::new(*this.bytes_sent, *this.bytes_total));
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
