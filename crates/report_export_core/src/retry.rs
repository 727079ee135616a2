use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Delay inserted between two failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Fixed(Duration),
    /// `step * attempt` after the given attempt.
    Linear(Duration),
}

impl Backoff {
    pub fn delay_after(self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Linear(step) => step.saturating_mul(attempt),
        }
    }

    /// Parses `none`, `fixed:<ms>` or `linear:<ms>`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }

        let Some((kind, millis)) = trimmed.split_once(':') else {
            return Err("expected none, fixed:<ms> or linear:<ms>".to_string());
        };
        let millis = millis
            .trim()
            .parse::<u64>()
            .map_err(|error| format!("invalid delay in milliseconds: {error}"))?;
        let delay = Duration::from_millis(millis);

        match kind.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed(delay)),
            "linear" => Ok(Self::Linear(delay)),
            other => Err(format!("unknown backoff kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Calls `operation` with the 1-based attempt number until it succeeds or the
/// policy's ceiling is reached. `sleep` is called between failed attempts only.
pub fn retry<T, E>(
    policy: RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
    mut operation: impl FnMut(u32) -> Result<T, E>,
) -> Result<Attempted<T>, Attempted<E>> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) if attempt >= max_attempts => {
                return Err(Attempted {
                    value: error,
                    attempts: attempt,
                })
            }
            Err(_) => {
                let delay = policy.backoff.delay_after(attempt);
                if !delay.is_zero() {
                    sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_sleep(_: Duration) {
        panic!("no delay expected");
    }

    #[test]
    fn stops_at_first_success() {
        let mut calls = Vec::new();
        let result = retry(RetryPolicy::default(), &mut no_sleep, |attempt| {
            calls.push(attempt);
            if attempt < 3 {
                Err("flaky")
            } else {
                Ok("done")
            }
        })
        .expect("third attempt should succeed");

        assert_eq!(result.value, "done");
        assert_eq!(result.attempts, 3);
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[test]
    fn returns_last_error_when_exhausted() {
        let mut calls = 0;
        let error = retry(RetryPolicy::default(), &mut no_sleep, |attempt| {
            calls += 1;
            Err::<(), _>(format!("failure {attempt}"))
        })
        .expect_err("every attempt fails");

        assert_eq!(calls, 4);
        assert_eq!(error.attempts, 4);
        assert_eq!(error.value, "failure 4");
    }

    #[test]
    fn zero_ceiling_still_attempts_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Backoff::None,
        };
        let error = retry(policy, &mut no_sleep, |_| Err::<(), _>("nope"))
            .expect_err("single attempt fails");
        assert_eq!(error.attempts, 1);
    }

    #[test]
    fn sleeps_between_failed_attempts_only() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Linear(Duration::from_millis(10)),
        };
        let mut delays = Vec::new();
        let _ = retry(policy, &mut |delay| delays.push(delay), |_| {
            Err::<(), _>("nope")
        });

        assert_eq!(
            delays,
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn parses_backoff_settings() {
        assert_eq!(Backoff::parse("none"), Ok(Backoff::None));
        assert_eq!(Backoff::parse(""), Ok(Backoff::None));
        assert_eq!(
            Backoff::parse("fixed:250"),
            Ok(Backoff::Fixed(Duration::from_millis(250)))
        );
        assert_eq!(
            Backoff::parse("LINEAR: 100"),
            Ok(Backoff::Linear(Duration::from_millis(100)))
        );
        assert!(Backoff::parse("exponential:5").is_err());
        assert!(Backoff::parse("fixed:soon").is_err());
    }
}
