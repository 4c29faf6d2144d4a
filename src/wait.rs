//! Busy waits with an injectable completion check
//!
//! The radio reports progress through status bits, so waiting for it means
//! polling. A [`Completion`] is one such check, returning
//! `nb::Error::WouldBlock` until it is done. [`block_until`] polls it under a
//! [`WaitPolicy`].

use core::fmt;

use crate::maybe_async_attr;

/// A condition that can be polled until it completes
#[maybe_async_attr(AFIT)]
#[allow(async_fn_in_trait)]
pub trait Completion {
    /// Value produced once complete
    type Output;
    /// Error that aborts the wait
    type Error;

    /// Checks the condition once
    async fn poll(&mut self) -> nb::Result<Self::Output, Self::Error>;
}

/// A [`Completion`] backed by a closure
///
/// Created with [`poll_fn`].
pub struct PollFn<F>(F);

/// Wraps a closure as a [`Completion`]
///
/// ``` rust,ignore
/// let mut countdown = 3;
/// let mut ready = poll_fn(|| {
///     countdown -= 1;
///     if countdown == 0 { Ok(()) } else { Err(nb::Error::<()>::WouldBlock) }
/// });
/// block_until(&mut ready, WaitPolicy::Polls(10)).await?;
/// ```
pub fn poll_fn<T, E, F>(f: F) -> PollFn<F>
where
    F: FnMut() -> nb::Result<T, E>,
{
    PollFn(f)
}

#[maybe_async_attr(AFIT)]
impl<T, E, F> Completion for PollFn<F>
where
    F: FnMut() -> nb::Result<T, E>,
{
    type Output = T;
    type Error = E;

    async fn poll(&mut self) -> nb::Result<T, E> {
        (self.0)()
    }
}

/// How long a wait may go on
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaitPolicy {
    /// Poll until the condition completes, however long that takes
    Forever,
    /// Give up after this many polls
    Polls(u32),
}

/// Why a wait ended without the condition completing
pub enum WaitError<E> {
    /// The poll budget ran out
    TimedOut,
    /// The condition reported an error
    Other(E),
}

impl<E> fmt::Debug for WaitError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WaitError::TimedOut => write!(f, "TimedOut"),
            WaitError::Other(error) => write!(f, "Other({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for WaitError<E>
where
    E: defmt::Format,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            WaitError::TimedOut => defmt::write!(f, "TimedOut"),
            WaitError::Other(error) => defmt::write!(f, "Other({:?})", error),
        }
    }
}

/// Polls `completion` until it completes or `policy` gives up
///
/// Returns the number of polls it took along with the output.
#[maybe_async_attr]
pub async fn block_until<C>(
    completion: &mut C,
    policy: WaitPolicy,
) -> Result<(C::Output, u32), WaitError<C::Error>>
where
    C: Completion,
{
    let mut polls: u32 = 0;

    loop {
        polls = polls.saturating_add(1);

        match completion.poll().await {
            Ok(output) => return Ok((output, polls)),
            Err(nb::Error::Other(e)) => return Err(WaitError::Other(e)),
            Err(nb::Error::WouldBlock) => {}
        }

        if let WaitPolicy::Polls(budget) = policy {
            if polls >= budget {
                return Err(WaitError::TimedOut);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn completes_after_a_few_polls() {
        let mut remaining = 3;
        let mut ready = poll_fn(|| {
            remaining -= 1;
            if remaining == 0 {
                Ok("done")
            } else {
                Err(nb::Error::<()>::WouldBlock)
            }
        });

        let (output, polls) = block_until(&mut ready, WaitPolicy::Forever).await.unwrap();

        assert_eq!(output, "done");
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn budget_runs_out() {
        let mut calls = 0;
        let mut never = poll_fn(|| {
            calls += 1;
            Err::<(), _>(nb::Error::<()>::WouldBlock)
        });

        let result = block_until(&mut never, WaitPolicy::Polls(5)).await;

        assert!(matches!(result, Err(WaitError::TimedOut)));
        drop(never);
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn errors_end_the_wait() {
        let mut failing = poll_fn(|| Err::<(), _>(nb::Error::Other("bus fault")));

        let result = block_until(&mut failing, WaitPolicy::Forever).await;

        assert!(matches!(result, Err(WaitError::Other("bus fault"))));
    }
}
