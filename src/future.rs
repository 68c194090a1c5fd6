use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

pub(crate) trait WithTimeout: Future + Sized {
    fn with_timeout(self, duration: Duration) -> tokio::time::Timeout<Self> {
        tokio::time::timeout(duration, self)
    }
}

impl<F> WithTimeout for F where F: Future {}

/// Records how long a fallible step took, labelled with how it ended
pub(crate) trait WithMetrics<T, E>: Future<Output = Result<T, E>> + Sized {
    fn with_metrics(self, name: &'static str) -> MetricsFuture<Self> {
        MetricsFuture {
            future: self,
            timing: Timing {
                name,
                start: Instant::now(),
                outcome: Outcome::Canceled,
            },
        }
    }
}

impl<F, T, E> WithMetrics<T, E> for F where F: Future<Output = Result<T, E>> {}

pin_project_lite::pin_project! {
    pub(crate) struct MetricsFuture<F> {
        #[pin]
        future: F,

        timing: Timing,
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Canceled,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceled => "canceled",
        }
    }
}

struct Timing {
    name: &'static str,
    start: Instant,
    outcome: Outcome,
}

impl<F, T, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let out = std::task::ready!(this.future.poll(cx));

        this.timing.outcome = if out.is_ok() {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        Poll::Ready(out)
    }
}

// dropped before completion counts as canceled
impl Drop for Timing {
    fn drop(&mut self) {
        metrics::histogram!(self.name, "outcome" => self.outcome.as_str())
            .record(self.start.elapsed().as_secs_f64());
    }
}
