// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words SIGUSR

//! Cross-component scenarios: the driver together with timers, descriptors, signal and
//! event handlers, and consoles.

use crate::{CapturedOutput, Clock as _, EventLoop, EventLoopConfig, ManualClock,
            NotifierBackendPreference, OneEventOutcome, PromptState, RunUntilOutcome,
            SocketPair, Ui, WaitForEventOutcome};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::{cell::{Cell, RefCell},
          os::fd::RawFd,
          rc::Rc,
          thread,
          time::Duration};
use test_case::test_case;

type Log<T> = Rc<RefCell<Vec<T>>>;

fn record_fd(event_loop: &mut EventLoop, log: &Log<RawFd>, fd: RawFd) {
    let log = Rc::clone(log);
    event_loop.add_file_handler(fd, move |_, event| {
        log.borrow_mut().push(event.fd);
        Ok(())
    });
}

fn config(preference: NotifierBackendPreference) -> EventLoopConfig {
    EventLoopConfig::default().with_notifier_backend(preference)
}

#[test]
fn test_nothing_registered_means_no_sources() {
    let mut event_loop = EventLoop::new();
    assert_eq!(event_loop.do_one_event().unwrap(), OneEventOutcome::NoSources);
    // Returns right away.
    event_loop.start_event_loop();
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let clock = ManualClock::new();
    let mut event_loop = EventLoop::with_clock(clock.clone());
    let fired: Log<&str> = Rc::default();
    for (name, delay_ms) in [("T1", 50), ("T2", 10), ("T3", 30)] {
        let fired = Rc::clone(&fired);
        event_loop.create_timer(Duration::from_millis(delay_ms), move |_| {
            fired.borrow_mut().push(name);
            Ok(())
        });
    }

    for _ in 0..60 {
        while event_loop.poll_timers().unwrap() {}
        clock.advance(Duration::from_millis(1));
    }
    assert_eq!(*fired.borrow(), vec!["T2", "T3", "T1"]);
}

#[test]
fn test_timer_never_fires_early() {
    let clock = ManualClock::new();
    let mut event_loop = EventLoop::with_clock(clock.clone());
    let fired = Rc::new(Cell::new(false));
    let fired_clone = Rc::clone(&fired);
    event_loop.create_timer(Duration::from_millis(10), move |_| {
        fired_clone.set(true);
        Ok(())
    });

    clock.advance(Duration::from_millis(9));
    assert!(!event_loop.poll_timers().unwrap());
    clock.advance(Duration::from_millis(1));
    assert!(event_loop.poll_timers().unwrap());
    assert!(fired.get());
}

#[test]
fn test_timer_callback_can_schedule_and_cancel() {
    let clock = ManualClock::new();
    let mut event_loop = EventLoop::with_clock(clock.clone());
    let fired: Log<&str> = Rc::default();

    let victim = {
        let fired = Rc::clone(&fired);
        event_loop.create_timer(Duration::from_millis(5), move |_| {
            fired.borrow_mut().push("victim");
            Ok(())
        })
    };
    {
        let fired = Rc::clone(&fired);
        event_loop.create_timer(Duration::ZERO, move |event_loop| {
            fired.borrow_mut().push("first");
            assert!(event_loop.delete_timer(victim));
            assert!(!event_loop.delete_timer(victim));
            let fired = Rc::clone(&fired);
            event_loop.create_timer(Duration::ZERO, move |_| {
                fired.borrow_mut().push("scheduled by first");
                Ok(())
            });
            Ok(())
        });
    }

    clock.advance(Duration::from_millis(10));
    while event_loop.poll_timers().unwrap() {}
    assert_eq!(*fired.borrow(), vec!["first", "scheduled by first"]);
    assert!(event_loop.timers().is_empty());
}

#[test_case(NotifierBackendPreference::Auto; "mio")]
#[test_case(NotifierBackendPreference::Poll; "poll")]
fn test_two_always_ready_fds_strictly_alternate(preference: NotifierBackendPreference) {
    let first = SocketPair::always_ready().unwrap();
    let second = SocketPair::always_ready().unwrap();
    let mut event_loop = EventLoop::with_config(config(preference));
    let serviced: Log<RawFd> = Rc::default();
    record_fd(&mut event_loop, &serviced, first.reader_fd());
    record_fd(&mut event_loop, &serviced, second.reader_fd());

    for _ in 0..4 {
        assert_eq!(
            event_loop.wait_for_event(false).unwrap(),
            WaitForEventOutcome::Handled
        );
    }
    let (a, b) = (first.reader_fd(), second.reader_fd());
    assert_eq!(*serviced.borrow(), vec![a, b, a, b]);
}

#[test]
fn test_n_ready_fds_each_serviced_once_in_n_cycles() {
    let pairs = (0..5)
        .map(|_| SocketPair::always_ready().unwrap())
        .collect::<Vec<_>>();
    let mut event_loop = EventLoop::new();
    let serviced: Log<RawFd> = Rc::default();
    for pair in &pairs {
        record_fd(&mut event_loop, &serviced, pair.reader_fd());
    }

    for _ in 0..pairs.len() {
        event_loop.wait_for_event(false).unwrap();
    }
    let mut serviced = serviced.borrow().clone();
    serviced.sort_unstable();
    let mut expected = pairs.iter().map(SocketPair::reader_fd).collect::<Vec<_>>();
    expected.sort_unstable();
    assert_eq!(serviced, expected);
}

#[test]
fn test_busy_fd_does_not_starve_a_quiet_one() {
    let busy = SocketPair::always_ready().unwrap();
    let mut quiet = SocketPair::new().unwrap();
    let mut event_loop = EventLoop::new();
    let serviced: Log<RawFd> = Rc::default();
    record_fd(&mut event_loop, &serviced, busy.reader_fd());
    record_fd(&mut event_loop, &serviced, quiet.reader_fd());

    event_loop.wait_for_event(false).unwrap();
    quiet.send("!").unwrap();
    event_loop.wait_for_event(false).unwrap();
    assert_eq!(*serviced.borrow(), vec![busy.reader_fd(), quiet.reader_fd()]);
}

#[test]
fn test_deleting_fd_from_its_own_callback_keeps_cursor_live() {
    let pairs = (0..3)
        .map(|_| SocketPair::always_ready().unwrap())
        .collect::<Vec<_>>();
    let mut event_loop = EventLoop::new();
    let serviced: Log<RawFd> = Rc::default();
    for pair in &pairs {
        let serviced = Rc::clone(&serviced);
        event_loop.add_file_handler(pair.reader_fd(), move |event_loop, event| {
            serviced.borrow_mut().push(event.fd);
            assert!(event_loop.delete_file_handler(event.fd));
            assert!(!event_loop.delete_file_handler(event.fd));
            Ok(())
        });
    }

    for _ in 0..3 {
        assert_eq!(
            event_loop.wait_for_event(false).unwrap(),
            WaitForEventOutcome::Handled
        );
        let cursor = event_loop.notifier().registry().next_to_service();
        assert!(cursor.is_none_or(|fd| event_loop.notifier().contains(fd)));
    }
    assert_eq!(event_loop.notifier().registry().next_to_service(), None);
    assert_eq!(serviced.borrow().len(), 3);
    assert_eq!(event_loop.do_one_event().unwrap(), OneEventOutcome::NoSources);
}

#[test]
fn test_deleting_the_next_fd_from_another_callback() {
    let first = SocketPair::always_ready().unwrap();
    let second = SocketPair::always_ready().unwrap();
    let third = SocketPair::always_ready().unwrap();
    let mut event_loop = EventLoop::new();
    let serviced: Log<RawFd> = Rc::default();

    let second_fd = second.reader_fd();
    {
        let serviced = Rc::clone(&serviced);
        event_loop.add_file_handler(first.reader_fd(), move |event_loop, event| {
            serviced.borrow_mut().push(event.fd);
            event_loop.delete_file_handler(second_fd);
            Ok(())
        });
    }
    record_fd(&mut event_loop, &serviced, second_fd);
    record_fd(&mut event_loop, &serviced, third.reader_fd());

    event_loop.wait_for_event(false).unwrap();
    event_loop.wait_for_event(false).unwrap();
    assert_eq!(*serviced.borrow(), vec![first.reader_fd(), third.reader_fd()]);
}

#[test]
fn test_signal_handler_runs_before_ready_fd() {
    let pair = SocketPair::always_ready().unwrap();
    let mut event_loop = EventLoop::new();
    let order: Log<&str> = Rc::default();
    {
        let order = Rc::clone(&order);
        event_loop.add_file_handler(pair.reader_fd(), move |_, _| {
            order.borrow_mut().push("fd");
            Ok(())
        });
    }
    let signal = {
        let order = Rc::clone(&order);
        event_loop
            .create_async_signal_handler(move |_| {
                order.borrow_mut().push("signal");
                Ok(())
            })
            .unwrap()
    };

    event_loop.mark_async_signal_handler(signal);
    event_loop.do_one_event().unwrap();
    event_loop.do_one_event().unwrap();
    assert_eq!(*order.borrow(), vec!["signal", "fd"]);
}

#[test]
fn test_mark_from_another_thread_wakes_blocking_wait() {
    let mut event_loop = EventLoop::new();
    let runs = Rc::new(Cell::new(0));
    let id = {
        let runs = Rc::clone(&runs);
        event_loop
            .create_async_signal_handler(move |_| {
                runs.set(runs.get() + 1);
                Ok(())
            })
            .unwrap()
    };
    let marker = event_loop.async_signal_marker(id).unwrap();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        marker.mark();
    });
    // Blocks in the notifier until the wake pipe becomes readable.
    let outcome = event_loop.run_until(|_| runs.get() > 0).unwrap();
    handle.join().unwrap();

    assert_eq!(outcome, RunUntilOutcome::Satisfied);
    assert_eq!(runs.get(), 1);
    assert!(!event_loop.invoke_async_signal_handlers().unwrap());
}

#[test]
fn test_deleted_signal_handler_never_runs() {
    let mut event_loop = EventLoop::new();
    let ran = Rc::new(Cell::new(false));
    let id = {
        let ran = Rc::clone(&ran);
        event_loop
            .create_async_signal_handler(move |_| {
                ran.set(true);
                Ok(())
            })
            .unwrap()
    };
    event_loop.mark_async_signal_handler(id);
    assert!(event_loop.delete_async_signal_handler(id));
    assert!(!event_loop.delete_async_signal_handler(id));

    assert_eq!(event_loop.do_one_event().unwrap(), OneEventOutcome::NoSources);
    assert!(!ran.get());
}

#[test]
#[serial]
fn test_os_signal_runs_handler_from_the_loop() {
    let mut event_loop = EventLoop::new();
    let runs = Rc::new(Cell::new(0));
    let id = {
        let runs = Rc::clone(&runs);
        event_loop
            .install_os_signal_handler(signal_hook::consts::SIGUSR1, move |_| {
                runs.set(runs.get() + 1);
                Ok(())
            })
            .unwrap()
    };

    signal_hook::low_level::raise(signal_hook::consts::SIGUSR1).unwrap();
    assert!(event_loop.invoke_async_signal_handlers().unwrap());
    assert_eq!(runs.get(), 1);
    assert!(!event_loop.invoke_async_signal_handlers().unwrap());

    assert!(event_loop.delete_async_signal_handler(id));
    assert_eq!(event_loop.do_one_event().unwrap(), OneEventOutcome::NoSources);
}

#[test]
fn test_unhandleable_signal_is_an_error() {
    let mut event_loop = EventLoop::new();
    let result = event_loop.install_os_signal_handler(signal_hook::consts::SIGKILL, |_| Ok(()));
    assert!(result.is_err());
    assert_eq!(event_loop.notifier().source_count(), 0);
}

#[test]
fn test_rotation_gives_each_source_a_turn() {
    let clock = ManualClock::new();
    let pair = SocketPair::always_ready().unwrap();
    let mut event_loop = EventLoop::with_clock(clock.clone());
    let order: Log<&str> = Rc::default();

    {
        let order = Rc::clone(&order);
        event_loop.add_file_handler(pair.reader_fd(), move |_, _| {
            order.borrow_mut().push("fd");
            Ok(())
        });
    }
    {
        let order = Rc::clone(&order);
        event_loop.create_timer(Duration::ZERO, move |_| {
            order.borrow_mut().push("timer");
            Ok(())
        });
    }
    let event = {
        let order = Rc::clone(&order);
        event_loop.create_async_event_handler(move |_| {
            order.borrow_mut().push("event");
            Ok(())
        })
    };
    let again = {
        let order = Rc::clone(&order);
        event_loop.create_async_event_handler(move |_| {
            order.borrow_mut().push("event again");
            Ok(())
        })
    };
    event_loop.mark_async_event_handler(event);
    event_loop.mark_async_event_handler(again);

    for _ in 0..5 {
        event_loop.do_one_event().unwrap();
    }
    assert_eq!(*order.borrow(), vec!["timer", "fd", "event", "fd", "event again"]);
}

#[test]
fn test_blocking_wait_sleeps_until_timer_with_no_fds() {
    let mut event_loop = EventLoop::new();
    let fired = Rc::new(Cell::new(false));
    let fired_clone = Rc::clone(&fired);
    event_loop.create_timer(Duration::from_millis(5), move |_| {
        fired_clone.set(true);
        Ok(())
    });
    event_loop.start_event_loop();
    assert!(fired.get());
}

#[test]
fn test_manual_clock_moves_forward_instead_of_sleeping() {
    let clock = ManualClock::new();
    let start = clock.now();
    let mut event_loop = EventLoop::with_clock(clock.clone());
    let fired = Rc::new(Cell::new(false));
    let fired_clone = Rc::clone(&fired);
    event_loop.create_timer(Duration::from_secs(3_600), move |_| {
        fired_clone.set(true);
        Ok(())
    });

    let outcome = event_loop.run_until(|_| fired.get()).unwrap();
    assert_eq!(outcome, RunUntilOutcome::Satisfied);
    assert!(clock.now() - start >= Duration::from_secs(3_600));
}

#[test]
fn test_regular_file_works_through_fallback() {
    let file = tempfile::tempfile().unwrap();
    let fd = std::os::fd::AsRawFd::as_raw_fd(&file);
    let mut event_loop = EventLoop::new();
    let serviced: Log<RawFd> = Rc::default();
    {
        let serviced = Rc::clone(&serviced);
        event_loop.add_file_handler(fd, move |event_loop, event| {
            serviced.borrow_mut().push(event.fd);
            event_loop.delete_file_handler(event.fd);
            Ok(())
        });
    }
    event_loop.start_event_loop();
    assert_eq!(*serviced.borrow(), vec![fd]);
}

#[test]
fn test_error_is_reported_and_console_recovers() {
    let pair = SocketPair::new().unwrap();
    let output = CapturedOutput::new();
    let mut event_loop = EventLoop::new();
    let ui = event_loop
        .add_ui(
            Ui::new(
                pair.reader.try_clone().unwrap(),
                output.clone(),
                |_, _, _| Ok(()),
            )
            .with_prompt("(evl) "),
        )
        .unwrap();

    // A foreground operation blocks the console, then fails.
    event_loop.create_timer(Duration::ZERO, move |event_loop| {
        event_loop.disable_console_input(ui)?;
        Err(miette::miette!("cannot access memory at 0x0"))
    });

    let observed = Rc::new(Cell::new(None));
    {
        let observed = Rc::clone(&observed);
        event_loop.create_timer(Duration::from_millis(20), move |event_loop| {
            let console = event_loop.ui(ui).unwrap();
            let input_monitored = event_loop.notifier().contains(console.input_fd());
            observed.set(Some((console.prompt_state(), input_monitored)));
            event_loop.remove_ui(ui);
            Ok(())
        });
    }

    event_loop.start_event_loop();

    assert_eq!(observed.get(), Some((PromptState::Prompted, true)));
    let contents = output.contents();
    assert!(contents.contains("cannot access memory at 0x0"));
    assert!(contents.ends_with("(evl) "));
}
