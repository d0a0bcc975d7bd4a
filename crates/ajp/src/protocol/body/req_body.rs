use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::buf::Reader;
use bytes::{Buf, Bytes};
use http_body::{Body, Frame, SizeHint};

/// The body of a request, fully received before dispatch.
///
/// The body is pulled from the web server chunk by chunk while the request is
/// allocated, so by the time a dispatcher sees it every byte is in memory.
/// It implements `http_body::Body` yielding a single data frame.
#[derive(Debug, Default, Clone)]
pub struct ReqBody {
    data: Bytes,
}

impl ReqBody {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn empty() -> Self {
        Default::default()
    }

    /// Remaining unread bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A cheap handle to the remaining bytes, the body itself is not consumed
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Takes the remaining bytes, leaving the body empty
    pub fn take(&mut self) -> Bytes {
        std::mem::take(&mut self.data)
    }

    /// A blocking `std::io::Read` view over the remaining bytes
    pub fn reader(&self) -> Reader<Bytes> {
        self.data.clone().reader()
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.data.is_empty() {
            return Poll::Ready(None);
        }
        Poll::Ready(Some(Ok(Frame::data(this.take()))))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data.len() as u64)
    }
}
