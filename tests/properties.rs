//! Property-based tests for the result algebra, backoff and jitter.

use proptest::prelude::*;
use railyard::result::{all, ResultExt};
use railyard::retry::scale_delay;
use railyard::{Railway, RetryPolicy};
use std::cell::Cell;
use std::time::Duration;

// Float scaling may land a nanosecond off.
const ROUNDING: Duration = Duration::from_nanos(1);

proptest! {
    #[test]
    fn ok_get_or_returns_value(value in any::<i64>(), default in any::<i64>()) {
        prop_assert_eq!(Ok::<_, String>(value).get_or(default), value);
    }

    #[test]
    fn err_get_or_returns_default(error in ".*", default in any::<i64>()) {
        prop_assert_eq!(Err::<i64, _>(error).get_or(default), default);
    }

    #[test]
    fn map_on_err_never_invokes(error in any::<u8>()) {
        let called = Cell::new(false);
        let r = Railway::<i32, u8>::fail(error)
            .map(|x| {
                called.set(true);
                x + 1
            })
            .run();
        prop_assert_eq!(r, Err(error));
        prop_assert!(!called.get());
    }

    #[test]
    fn map_identity_preserves_result(r in prop::result::maybe_ok(any::<i32>(), any::<u16>())) {
        prop_assert_eq!(r.map(|x| x), r);
    }

    #[test]
    fn map_composes(x in -1000i32..1000) {
        let f = |v: i32| v * 3;
        let g = |v: i32| v - 7;
        let chained = Railway::<_, ()>::of(x).map(f).map(g).run();
        let fused = Railway::<_, ()>::of(x).map(|v| g(f(v))).run();
        prop_assert_eq!(chained, fused);
    }

    #[test]
    fn validate_agrees_with_predicate(x in any::<i32>()) {
        let r = Railway::of(x).validate(|v| *v % 2 == 0, "odd").run();
        if x % 2 == 0 {
            prop_assert_eq!(r, Ok(x));
        } else {
            prop_assert_eq!(r, Err("odd"));
        }
    }

    #[test]
    fn all_reports_first_error(values in prop::collection::vec(prop::result::maybe_ok(any::<u8>(), any::<u8>()), 0..20)) {
        let expected = values.iter().find_map(|r| r.as_ref().err().copied());
        match all(values.clone()) {
            Ok(collected) => {
                prop_assert!(expected.is_none());
                prop_assert_eq!(collected.len(), values.len());
            }
            Err(e) => prop_assert_eq!(Some(e), expected),
        }
    }

    #[test]
    fn jitter_stays_within_half_to_full(millis in 0u64..120_000, factor in any::<f64>()) {
        let delay = Duration::from_millis(millis);
        let scaled = scale_delay(delay, factor);
        prop_assert!(scaled <= delay + ROUNDING);
        prop_assert!(scaled + ROUNDING >= delay / 2);
    }

    #[test]
    fn jittered_delay_bounded_by_nominal(base in 1u64..5_000, attempt in 1u32..12) {
        let policy = RetryPolicy::exponential(Duration::from_millis(base))
            .with_max_delay(Duration::from_secs(600))
            .with_jitter(true);
        let nominal = policy.delay_for_attempt(attempt);
        let actual = policy.jittered_delay(attempt);
        prop_assert!(actual <= nominal + ROUNDING);
        prop_assert!(actual + ROUNDING >= nominal / 2);
    }

    #[test]
    fn delays_never_exceed_cap(base in 1u64..10_000, cap in 1u64..60_000, attempt in 1u32..64) {
        let policy = RetryPolicy::exponential(Duration::from_millis(base))
            .with_max_delay(Duration::from_millis(cap));
        prop_assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(cap));
    }

    #[test]
    fn delays_are_monotonic(base in 1u64..1_000, attempt in 1u32..30) {
        let policy = RetryPolicy::exponential(Duration::from_millis(base));
        prop_assert!(policy.delay_for_attempt(attempt) <= policy.delay_for_attempt(attempt + 1));
    }
}
