use backoff::{retry, ExponentialBackoff};
use std::{fmt::Debug, time::Duration};
use tracing::{debug, info};

/// Executes the provided action `f`, retrying with exponential backoff if the
/// error returned by `f` is deemed retryable by `is_retryable`. On success,
/// returns the value returned by `f`. On failure, returns the error returned
/// by the last attempt to call `f`. Used by the storage backends to ride out
/// transient listing/fetch failures before they reach the Ingestion Pipeline.
pub(crate) fn retry_request<F, T, E, R>(f: F, is_retryable: R) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: FnMut(&E) -> bool,
    E: Debug,
{
    retry_request_with_params(
        Duration::from_secs(1),
        Duration::from_secs(30),
        Duration::from_secs(600),
        f,
        is_retryable,
    )
}

/// Private version of retry_request that exposes parameters for backoff.
/// Should only be used for testing. Otherwise behaves identically to
/// `retry_request`.
fn retry_request_with_params<F, T, E, R>(
    backoff_initial_interval: Duration,
    backoff_max_interval: Duration,
    backoff_max_elapsed: Duration,
    mut f: F,
    mut is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: FnMut(&E) -> bool,
    E: Debug,
{
    let backoff = ExponentialBackoff {
        initial_interval: backoff_initial_interval,
        max_interval: backoff_max_interval,
        multiplier: 2.0,
        max_elapsed_time: Some(backoff_max_elapsed),
        ..Default::default()
    };

    retry(backoff, || {
        f().map_err(|error| {
            if is_retryable(&error) {
                info!(error = ?error, "encountered retryable error");
                backoff::Error::Transient(error)
            } else {
                debug!("encountered non-retryable error");
                backoff::Error::Permanent(error)
            }
        })
    })
    .map_err(|e| match e {
        backoff::Error::Permanent(inner) => inner,
        backoff::Error::Transient(inner) => inner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success() {
        let mut counter = 0;
        let f = || -> Result<(), bool> {
            counter += 1;
            Ok(())
        };

        retry_request_with_params(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(10),
            f,
            |_| false,
        )
        .unwrap();
        assert_eq!(counter, 1);
    }

    #[test]
    fn retryable_failure() {
        let mut counter = 0;
        let f = || -> Result<(), bool> {
            counter += 1;
            if counter == 1 {
                Err(false)
            } else {
                Ok(())
            }
        };

        retry_request_with_params(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(30),
            f,
            |_| true,
        )
        .unwrap();
        assert!(counter > 1);
    }

    #[test]
    fn retryable_failure_exhaust_max_elapsed() {
        let mut counter = 0;
        let f = || -> std::result::Result<(), bool> {
            counter += 1;
            Err(false)
        };

        retry_request_with_params(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(30),
            f,
            |_| true,
        )
        .unwrap_err();
        assert!(counter >= 2);
    }

    #[test]
    fn unretryable_failure() {
        let mut counter = 0;
        let f = || -> std::result::Result<(), bool> {
            counter += 1;
            Err(false)
        };

        retry_request_with_params(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(30),
            f,
            |_| false,
        )
        .unwrap_err();
        assert_eq!(counter, 1);
    }
}
