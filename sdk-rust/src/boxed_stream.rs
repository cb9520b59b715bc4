use futures::{
    stream::{self, BoxStream},
    Stream,
};
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

/// A pinned, boxed, `Send` stream. Used for model output and for the byte
/// streams built on top of it.
pub struct BoxedStream<'a, T>(BoxStream<'a, T>);

impl<'a, T> BoxedStream<'a, T> {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'a,
    {
        Self(Box::pin(stream))
    }

    /// A stream that yields a single item and ends.
    pub fn once(item: T) -> Self
    where
        T: Send + 'a,
    {
        Self::from_stream(stream::once(async move { item }))
    }
}

impl<T> Stream for BoxedStream<'_, T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

impl<T> fmt::Debug for BoxedStream<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedStream").finish_non_exhaustive()
    }
}
