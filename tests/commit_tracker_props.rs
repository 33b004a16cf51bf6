use proptest::prelude::*;
use yggdrasil::cursor::CommitTracker;
use yggdrasil::feed::SeqToken;

fn token(i: usize) -> SeqToken {
    SeqToken::new(format!("{i:06}"))
}

// A completion order (a permutation of admitted indices) plus which of them fail.
fn completions_strategy(max: usize) -> impl Strategy<Value = (usize, Vec<usize>, Vec<bool>)> {
    (1..=max).prop_flat_map(|n| {
        (
            Just(n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            proptest::collection::vec(proptest::bool::weighted(0.2), n),
        )
    })
}

proptest! {
    #[test]
    fn watermark_never_passes_unfinished_or_failed_events(
        (n, order, fails) in completions_strategy(40),
        finished_count in 0usize..=40,
    ) {
        let mut tracker = CommitTracker::new(SeqToken::start());
        for i in 0..n {
            prop_assert!(tracker.admit(&token(i)).should_dispatch());
        }

        let finished: Vec<usize> = order.iter().copied().take(finished_count.min(n)).collect();
        for &i in &finished {
            tracker.finish(&token(i), !fails[i]);
        }

        // The expected watermark is the end of the longest prefix of
        // acknowledged events.
        let mut expected = SeqToken::start();
        for i in 0..n {
            if finished.contains(&i) && !fails[i] {
                expected = token(i);
            } else {
                break;
            }
        }
        prop_assert_eq!(tracker.watermark(), &expected);

        for i in 0..n {
            let acked = finished.contains(&i) && !fails[i];
            if !acked {
                prop_assert!(tracker.watermark() < &token(i));
            }
        }
    }

    #[test]
    fn retried_failures_eventually_release_the_watermark(
        (n, order, fails) in completions_strategy(30),
    ) {
        let mut tracker = CommitTracker::new(SeqToken::start());
        for i in 0..n {
            tracker.admit(&token(i));
        }
        for &i in &order {
            tracker.finish(&token(i), !fails[i]);
        }

        // Redeliver everything above the watermark; only failures are dispatched again.
        for i in 0..n {
            let seq = token(i);
            if tracker.admit(&seq).should_dispatch() {
                prop_assert!(fails[i]);
                tracker.finish(&seq, true);
            }
        }

        prop_assert_eq!(tracker.watermark(), &token(n - 1));
        prop_assert_eq!(tracker.in_flight(), 0);
    }
}
