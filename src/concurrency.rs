//! Two-sided fork/join helper (spec §5, §9 REDESIGN FLAGS).
//!
//! The source spawns a raw OS thread per side and joins them; this crate
//! expresses the same "two independent, connection-owning tasks" shape with
//! `tokio::try_join!`, which also gives cancel-on-first-error for free —
//! satisfying §7's "errors during pre-count or level-0 build of one side
//! must cancel the other side" without extra bookkeeping.

use std::future::Future;

use crate::error::CompareError;

/// Run two fallible, independent futures to completion. If `parallel` is
/// `false`, `left` is awaited fully before `right` starts — the two sides
/// never interleave, matching spec §5's sequential default. If `true`, both
/// run concurrently via `tokio::try_join!`, which cancels the other future
/// as soon as either side returns an error.
pub async fn join_two<L, R, TL, TR>(
    parallel: bool,
    left: L,
    right: R,
) -> Result<(TL, TR), CompareError>
where
    L: Future<Output = Result<TL, CompareError>>,
    R: Future<Output = Result<TR, CompareError>>,
{
    if parallel {
        tokio::try_join!(left, right)
    } else {
        let l = left.await?;
        let r = right.await?;
        Ok((l, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_two_sequential_runs_both() {
        let (a, b) = join_two(
            false,
            async { Ok::<_, CompareError>(1) },
            async { Ok::<_, CompareError>(2) },
        )
        .await
        .unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn test_join_two_parallel_runs_both() {
        let (a, b) = join_two(
            true,
            async { Ok::<_, CompareError>(1) },
            async { Ok::<_, CompareError>(2) },
        )
        .await
        .unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn test_join_two_propagates_error() {
        let result = join_two(
            false,
            async { Err::<i32, _>(CompareError::Internal("boom".into())) },
            async { Ok::<_, CompareError>(2) },
        )
        .await;
        assert!(result.is_err());
    }
}
