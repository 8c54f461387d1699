#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{
        await_promise, create_promise, create_promise_with, reject, resolve, try_create_promise,
        Deferred, Error, ErrorHandle, Mode, Promise, Spawner,
    };
    use std::{
        panic::panic_any,
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc::channel,
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_resolve_then_await() {
        assert_eq!(await_promise(resolve(7)).unwrap(), 7);
        assert_eq!(resolve(String::from("🍓")).await_promise().unwrap(), "🍓");
        assert!(resolve(()).await_promise().is_ok());
    }

    #[test]
    fn test_reject_reraises_payload() {
        let err = reject::<i32, _>(String::from("💥")).await_promise().unwrap_err();
        assert_eq!(err.downcast::<String>().unwrap(), "💥");
    }

    #[test]
    fn test_then_composes() {
        let f = |x: i32| x * 3;
        let g = |x: i32| x - 4;
        let promise = resolve(5).then(f).then(g);
        assert_eq!(promise.await_promise().unwrap(), g(f(5)));
    }

    #[test]
    fn test_error_recovered_by_later_handler() {
        let promise = resolve(4)
            .then(|x: i32| -> i32 {
                if x > 0 {
                    panic_any(1i32);
                }
                x * 2
            })
            .then(|x| x * 2)
            .then_or(|x| x + 100, |err| *err.downcast_ref::<i32>().unwrap() + 10);
        assert_eq!(promise.await_promise().unwrap(), 11);
    }

    #[test]
    fn test_unhandled_error_reaches_await() {
        let promise = resolve(4)
            .then(|_: i32| -> i32 { panic_any(1i32) })
            .then(|x| x * 2);
        let err = promise.await_promise().unwrap_err();
        assert_eq!(err.downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn test_success_handler_failure_skips_error_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let promise = resolve(1).then_or(
            |_: i32| -> i32 { panic!("from success handler") },
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                0
            },
        );
        let err = promise.await_promise().unwrap_err();
        assert_eq!(err.message(), Some("from success handler"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_handler_failure_propagates() {
        let promise = reject::<i32, _>(1u8).then_or(|x| x, |_| -> i32 { panic!("again") });
        let err = promise.await_promise().unwrap_err();
        assert_eq!(err.message(), Some("again"));
    }

    #[test]
    fn test_except_terminates_chain() {
        let (tx, rx) = channel();
        let done = reject::<i32, _>("reject!!")
            .then(|x| x + 1)
            .except(move |err| tx.send(err.to_string()).unwrap());
        assert!(done.await_promise().is_ok());
        assert_eq!(rx.recv().unwrap(), "reject!!");

        let untouched = resolve(1).except(|_| panic!("not called"));
        assert!(untouched.await_promise().is_ok());
    }

    #[test]
    fn test_except_handler_failure_rejects() {
        let done = reject::<(), _>(2u8).except(|_| panic_any(3u8));
        let err = done.await_promise().unwrap_err();
        assert_eq!(err.downcast_ref::<u8>(), Some(&3));
    }

    #[test]
    fn test_recover_keeps_value_type() {
        let ok = resolve(9).recover(|_| 0);
        assert_eq!(ok.await_promise().unwrap(), 9);
        let recovered = reject::<i32, _>(()).recover(|err| if err.is::<()>() { -1 } else { 0 });
        assert_eq!(recovered.await_promise().unwrap(), -1);
    }

    #[test]
    fn test_try_variants_reject_without_panicking() {
        let parsed = resolve("12").try_then(|s: &str| s.parse::<i32>());
        assert_eq!(parsed.await_promise().unwrap(), 12);

        let bad = resolve("x").try_then(|s: &str| s.parse::<i32>());
        let err = bad.await_promise().unwrap_err();
        assert!(err.is::<std::num::ParseIntError>());

        let created = try_create_promise(|| Err::<u8, _>("no"));
        assert_eq!(created.await_promise().unwrap_err().message(), Some("no"));
    }

    #[test]
    fn test_create_promise_forms() {
        assert_eq!(create_promise(|| 2 + 2).await_promise().unwrap(), 4);

        let handed_off = create_promise_with(|deferred| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                deferred.resolve(5u64);
            });
        });
        assert_eq!(handed_off.await_promise().unwrap(), 5);

        let raised = create_promise(|| -> u8 { panic!("raised") });
        assert_eq!(raised.await_promise().unwrap_err().message(), Some("raised"));
    }

    #[test]
    fn test_body_without_settling_rejects() {
        let promise = Promise::<i32>::new(|_deferred| {});
        let err = promise.await_promise().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ProducerDropped)));
    }

    #[test]
    fn test_no_value_promises_compose() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (first, second) = (counter.clone(), counter.clone());
        let promise = create_promise(move || {
            first.fetch_add(1, Ordering::SeqCst);
        })
        .then_do(move || {
            second.fetch_add(1, Ordering::SeqCst);
        });
        assert!(promise.await_promise().is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_inline_mode_settles_before_returning() {
        let promise = Promise::new_inline(|deferred| deferred.resolve(1));
        assert!(promise.is_settled());
        let current = thread::current().id();
        let child = promise.then(move |x| {
            assert_eq!(thread::current().id(), current);
            x + 1
        });
        assert!(child.is_settled());
        assert_eq!(child.await_promise().unwrap(), 2);
    }

    #[test]
    fn test_continuations_inherit_spawner() {
        let spawner = Spawner::new().mode(Mode::Threaded).name("chained");
        let promise = spawner
            .create(|deferred| deferred.resolve(()))
            .then(|()| thread::current().name().map(str::to_owned));
        let name = promise.await_promise().unwrap().unwrap();
        assert!(name.starts_with("chained-"), "{name}");
    }

    #[test]
    fn test_creation_does_not_wait_for_body() {
        let started = Instant::now();
        let promise = create_promise(|| {
            thread::sleep(Duration::from_millis(300));
            1
        });
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!promise.is_settled());
        assert_eq!(promise.await_promise().unwrap(), 1);
    }

    #[test]
    fn test_promise_is_a_future() {
        let promise = create_promise(|| {
            thread::sleep(Duration::from_millis(20));
            3
        })
        .then(|x| x * 2);
        assert_eq!(block_on(promise).unwrap(), 6);

        let failed: Result<(), ErrorHandle> = block_on(reject::<(), _>(0u8));
        assert!(failed.unwrap_err().is::<u8>());
    }

    #[test]
    fn test_await_reclaims_whole_chain() {
        let root = resolve(1);
        let mut trackers = vec![root.tracker()];
        let middle = root.then(|x| x + 1);
        trackers.push(middle.tracker());
        let tail = middle.then(|x| x * 10);
        trackers.push(tail.tracker());

        assert_eq!(tail.await_promise().unwrap(), 20);
        for tracker in &trackers {
            assert_eq!(tracker.chain_len(), 0);
            assert!(wait_until(|| tracker.is_reclaimed()));
            assert!(wait_until(|| tracker.is_chain_reclaimed()));
        }
    }

    #[test]
    fn test_continuation_starts_when_predecessor_settles() {
        let (tx, rx) = channel();
        let (seen_tx, seen_rx) = channel();
        let parent = create_promise_with(move |deferred| {
            deferred.resolve(1);
            // Only the continuation can send this while the body is still running.
            seen_tx.send(rx.recv_timeout(Duration::from_secs(5))).unwrap();
        });
        let child = parent.then(move |x| tx.send(x + 1).unwrap());
        assert!(child.await_promise().is_ok());
        let seen = seen_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(seen, Ok(2));
    }

    #[test]
    fn test_await_returns_before_body_finishes() {
        let (tx, rx) = channel::<()>();
        let started = Instant::now();
        let promise = create_promise_with(move |deferred| {
            deferred.resolve(3);
            let _ = rx.recv_timeout(Duration::from_secs(5));
        });
        let tracker = promise.tracker();
        assert_eq!(promise.await_promise().unwrap(), 3);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(tracker.chain_len(), 0);
        drop(tx);
        assert!(wait_until(|| tracker.is_chain_reclaimed()));
    }

    #[test]
    fn test_handle_dropped_by_other_panicking_body_rejects() {
        let (handoff, received) = channel();
        let first = create_promise_with(move |deferred: Deferred<u8>| {
            handoff.send(deferred).unwrap();
        });
        let second = create_promise_with(move |_deferred: Deferred<u8>| {
            let _held = received.recv().unwrap();
            panic!("boom");
        });
        assert_eq!(second.await_promise().unwrap_err().message(), Some("boom"));

        let (done, outcome) = channel();
        thread::spawn(move || done.send(first.await_promise()).unwrap());
        let err = outcome
            .recv_timeout(Duration::from_secs(5))
            .expect("handed-off promise was never settled")
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ProducerDropped)));
    }

    #[test]
    fn test_detached_chain_frees_itself() {
        let (tx, rx) = channel();
        let root = create_promise(|| {
            thread::sleep(Duration::from_millis(20));
            5
        });
        let tracker = root.tracker();
        let tail = root.then(move |x| tx.send(x).unwrap());
        let tail_tracker = tail.tracker();
        drop(tail);

        assert_eq!(rx.recv().unwrap(), 5);
        assert!(wait_until(|| tail_tracker.is_chain_reclaimed()));
        assert!(tracker.is_reclaimed());
    }

    #[test]
    fn test_polled_promise_refuses_continuations() {
        let mut promise = resolve(1);
        assert_eq!(block_on(&mut promise).unwrap(), 1);
        let err = promise.then(|x| x + 1).await_promise().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Released)));
    }

    #[test]
    fn test_resume_reraises_in_caller() {
        let err = reject::<(), _>(17u16).await_promise().unwrap_err();
        let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| err.resume()))
            .unwrap_err();
        assert_eq!(payload.downcast_ref::<u16>(), Some(&17));
    }
}
