//! Switch-to-latest stream combinator.
//!
//! [`switch_latest`] maps every key of an outer stream to an inner stream and
//! yields items from the most recent inner stream only. The outer stream is
//! drained before the inner one is polled and only the newest drained key is
//! mapped. The previous inner stream is dropped before the next one is
//! created, so at most one inner stream exists at a time and items of two
//! keys are never interleaved.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    #[must_use = "streams do nothing unless polled"]
    pub struct SwitchLatest<O, I, F> {
        #[pin]
        outer: O,
        outer_done: bool,
        #[pin]
        inner: Option<I>,
        make: F,
    }
}

pub fn switch_latest<O, I, F>(outer: O, make: F) -> SwitchLatest<O, I, F>
where
    O: Stream,
    I: Stream,
    F: FnMut(O::Item) -> I,
{
    SwitchLatest {
        outer,
        outer_done: false,
        inner: None,
        make,
    }
}

impl<O, I, F> Stream for SwitchLatest<O, I, F>
where
    O: Stream,
    I: Stream,
    F: FnMut(O::Item) -> I,
{
    type Item = I::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let mut latest = None;
        while !*this.outer_done {
            match this.outer.as_mut().poll_next(cx) {
                Poll::Ready(Some(key)) => latest = Some(key),
                Poll::Ready(None) => *this.outer_done = true,
                Poll::Pending => break,
            }
        }
        if let Some(key) = latest {
            this.inner.set(None);
            this.inner.set(Some((this.make)(key)));
        }

        let Some(inner) = this.inner.as_mut().as_pin_mut() else {
            return if *this.outer_done {
                Poll::Ready(None)
            } else {
                Poll::Pending
            };
        };

        match inner.poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            Poll::Ready(None) => {
                this.inner.set(None);
                if *this.outer_done {
                    Poll::Ready(None)
                } else {
                    Poll::Pending
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
