use rotalog::{
    Boundary, Command, ConcurrencyMode, Error, ErrorAction, ErrorKind, Event, Frequency,
    LogTarget, Postfix, Processor, Severity, TargetBuilder, TargetState, Task,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;

fn builder(dir: &Path, app: &str, mode: ConcurrencyMode) -> TargetBuilder {
    LogTarget::builder()
        .with_log_dir(dir)
        .with_app_name(app)
        .with_mode(mode)
        .with_echo(false)
        .with_trash_dir(dir.join("trash"))
}

fn at(ts: OffsetDateTime, msg: &str) -> Event {
    Event::text(Severity::Info, msg).with_timestamp(ts)
}

#[test]
fn test_queued_events_are_processed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "fifo", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .build()
        .unwrap();

    for i in 0..200 {
        target.log(Severity::Info, format!("event {}", i)).unwrap();
    }
    target.shutdown().unwrap();
    assert_eq!(target.state(), TargetState::ShutDown);

    let content = fs::read_to_string(dir.path().join("fifo.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 200);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.ends_with(&format!("INF event {}", i)), "line {}: {}", i, line);
    }

    let stats = target.stats();
    assert_eq!(stats.submitted, 200);
    assert_eq!(stats.processed, 200);
    assert_eq!(stats.queued, 0);
}

#[test]
fn test_concurrent_submitters_keep_per_thread_order() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(
        builder(dir.path(), "many", ConcurrencyMode::MultiThreadedSeparateThread)
            .with_postfix(Postfix::None)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let target = Arc::clone(&target);
            std::thread::spawn(move || {
                for i in 0..50 {
                    target.log(Severity::Info, format!("t{} {}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    target.shutdown().unwrap();

    let content = fs::read_to_string(dir.path().join("many.log")).unwrap();
    assert_eq!(content.lines().count(), 200);
    for t in 0..4 {
        let seen: Vec<usize> = content
            .lines()
            .filter_map(|l| l.split_once(&format!("INF t{} ", t)))
            .map(|(_, n)| n.parse().unwrap())
            .collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn test_cancel_while_paused_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "cancelled", ConcurrencyMode::SingleThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .build()
        .unwrap();

    target.pause().unwrap();
    assert_eq!(target.state(), TargetState::Paused);
    for i in 0..5 {
        target.log(Severity::Info, format!("never {}", i)).unwrap();
    }
    assert_eq!(target.stats().queued, 5);

    target.cancel().unwrap();
    let stats = target.stats();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.discarded, 5);
    assert_eq!(target.state(), TargetState::ShutDown);
    assert!(!dir.path().join("cancelled.log").exists());
}

#[test]
fn test_resume_signals_once_per_paused_event() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "paused", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .build()
        .unwrap();

    target.pause().unwrap();
    for i in 0..5 {
        target.log(Severity::Info, format!("held {}", i)).unwrap();
    }
    assert_eq!(target.stats().signals, 0);
    assert_eq!(target.stats().processed, 0);

    target.resume().unwrap();
    assert_eq!(target.stats().signals, 5);

    target.shutdown().unwrap();
    assert_eq!(target.stats().processed, 5);
    let content = fs::read_to_string(dir.path().join("paused.log")).unwrap();
    assert_eq!(content.lines().count(), 5);
}

#[test]
fn test_pause_requires_queue() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "inline", ConcurrencyMode::MultiThreaded)
        .build()
        .unwrap();
    assert!(matches!(target.pause(), Err(Error::NotQueued)));
    assert!(matches!(target.resume(), Err(Error::NotQueued)));
    target.shutdown().unwrap();
}

#[test]
fn test_sync_shutdown_rejects_later_events() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "sync", ConcurrencyMode::SingleThreaded)
        .with_postfix(Postfix::None)
        .build()
        .unwrap();

    target.log(Severity::Warning, "before").unwrap();
    // Inline mode writes before returning.
    let content = fs::read_to_string(dir.path().join("sync.log")).unwrap();
    assert!(content.contains("WRN before"));

    target.shutdown().unwrap();
    assert_eq!(target.state(), TargetState::ShutDown);
    assert!(matches!(
        target.log(Severity::Info, "after"),
        Err(Error::ShutDown)
    ));
}

#[test]
fn test_concurrent_shutdown_waits_for_worker() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(
        builder(dir.path(), "slow", ConcurrencyMode::MultiThreadedSeparateThread)
            .with_postfix(Postfix::None)
            .with_processor(Processor::custom(|_, _| {
                thread::sleep(Duration::from_millis(300));
                true
            }))
            .build()
            .unwrap(),
    );
    target.log(Severity::Info, "slow").unwrap();

    let first = {
        let target = Arc::clone(&target);
        thread::spawn(move || target.shutdown())
    };
    thread::sleep(Duration::from_millis(50));
    // Whichever call does not join must still block until the worker is done.
    target.shutdown().unwrap();
    assert_eq!(target.state(), TargetState::ShutDown);
    assert_eq!(target.stats().processed, 1);
    first.join().unwrap().unwrap();
}

#[test]
fn test_day_postfix_writes_stamped_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "svc", ConcurrencyMode::MultiThreaded)
        .with_postfix(Postfix::Day)
        .build()
        .unwrap();

    target
        .submit(at(datetime!(2024-01-01 08:30 UTC), "new year"))
        .unwrap();
    let expected = dir.path().join("svc_2024-01-01.log");
    assert_eq!(target.log_path(), expected.to_str().unwrap());
    assert!(target.search_mask().ends_with("svc_????-??-??.log"));

    target.shutdown().unwrap();
    let content = fs::read_to_string(expected).unwrap();
    assert!(content.starts_with("2024-01-01 08:30:00.000 INF new year"));
}

#[test]
fn test_day_boundary_compresses_older_files() {
    let dir = tempfile::tempdir().unwrap();
    for day in 1..=4 {
        fs::write(dir.path().join(format!("svc_2023-12-0{}.log", day)), b"old\n").unwrap();
    }
    let target = builder(dir.path(), "svc", ConcurrencyMode::SingleThreaded)
        .with_postfix(Postfix::Day)
        .build()
        .unwrap();
    let plain = |day: u32| dir.path().join(format!("svc_2023-12-0{}.log", day));

    // The first event rotates once: today's file and 12-04 are the two kept.
    target
        .submit(at(datetime!(2024-01-01 23:59 UTC), "last of day one"))
        .unwrap();
    assert!(plain(4).exists());
    for day in 1..=3 {
        assert!(!plain(day).exists(), "12-0{} still plain", day);
    }

    // Crossing midnight pushes 12-04 out of the kept window.
    target
        .submit(at(datetime!(2024-01-02 00:01 UTC), "first of day two"))
        .unwrap();
    target.shutdown().unwrap();

    assert!(dir.path().join("svc_2024-01-02.log").exists());
    assert!(dir.path().join("svc_2024-01-01.log").exists());
    for day in 1..=4 {
        let name = format!("svc_2023-12-0{}.log", day);
        assert!(!dir.path().join(&name).exists(), "{} still plain", name);
        assert!(dir.path().join(format!("{}.gz", name)).exists(), "{} not compressed", name);
    }
    assert!(!dir.path().join("trash").exists());

    let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
    assert_eq!(read("svc_2024-01-01.log").matches("Rotation: compressed").count(), 3);
    assert_eq!(read("svc_2024-01-02.log").matches("Rotation: compressed").count(), 1);
}

#[test]
fn test_default_pipeline_rotates_on_first_event() {
    let dir = tempfile::tempdir().unwrap();
    for day in 1..=6 {
        fs::write(dir.path().join(format!("svc_2020-01-0{}.log", day)), b"old\n").unwrap();
    }
    let target = builder(dir.path(), "svc", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::Day)
        .build()
        .unwrap();

    target.log(Severity::Info, "first after restart").unwrap();
    target.shutdown().unwrap();

    // Today's file and the newest old one are kept; the rest are compressed.
    for day in 1..=5 {
        let name = format!("svc_2020-01-0{}.log", day);
        assert!(!dir.path().join(&name).exists(), "{} still plain", name);
        assert!(dir.path().join(format!("{}.gz", name)).exists(), "{} not compressed", name);
    }
    assert!(dir.path().join("svc_2020-01-06.log").exists());
    assert!(fs::read_to_string(target.log_path()).unwrap().contains("first after restart"));
    assert!(!dir.path().join("trash").exists());
}

#[test]
fn test_numbered_postfix_shifts_on_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "num", ConcurrencyMode::SingleThreaded)
        .with_postfix(Postfix::DotNumber(Boundary::Day))
        .with_processor(Processor::new(Task::UpdateFilename))
        .with_processor(Processor::new(Task::Write))
        .build()
        .unwrap();

    target.submit(at(datetime!(2024-03-01 12:00 UTC), "one")).unwrap();
    target.submit(at(datetime!(2024-03-02 12:00 UTC), "two")).unwrap();
    target.submit(at(datetime!(2024-03-03 12:00 UTC), "three")).unwrap();
    target.shutdown().unwrap();

    let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
    assert!(read("num.log").contains("three"));
    assert!(read("num.log.1").contains("two"));
    assert!(read("num.log.2").contains("one"));
}

#[test]
fn test_redirect_and_fork() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(
        builder(dir.path(), "sink", ConcurrencyMode::MultiThreaded)
            .with_postfix(Postfix::None)
            .build()
            .unwrap(),
    );

    let forking = builder(dir.path(), "forking", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .with_processor(Processor::new(Task::Fork(Arc::clone(&sink))))
        .with_processor(Processor::new(Task::Write))
        .build()
        .unwrap();
    let redirecting = builder(dir.path(), "redirecting", ConcurrencyMode::SingleThreaded)
        .with_postfix(Postfix::None)
        .with_processor(Processor::new(Task::Redirect(Arc::clone(&sink))))
        .with_processor(Processor::new(Task::Write))
        .build()
        .unwrap();

    forking.log(Severity::Info, "forked").unwrap();
    redirecting.log(Severity::Error, "redirected").unwrap();
    forking.shutdown().unwrap();
    redirecting.shutdown().unwrap();
    sink.shutdown().unwrap();

    let sink_content = fs::read_to_string(dir.path().join("sink.log")).unwrap();
    assert!(sink_content.contains("INF forked"));
    assert!(sink_content.contains("ERR redirected"));

    let forking_content = fs::read_to_string(dir.path().join("forking.log")).unwrap();
    assert!(forking_content.contains("INF forked"));
    assert!(!dir.path().join("redirecting.log").exists());
}

#[test]
fn test_error_callback_cancel_from_worker() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the log file belongs makes every open fail.
    fs::create_dir_all(dir.path().join("broken.log")).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    let target = builder(dir.path(), "broken", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .with_processor(Processor::new(Task::Write))
        .with_error_callback(move |err, processor, _| {
            seen_cb
                .lock()
                .unwrap()
                .push((err.kind, processor.task().name()));
            ErrorAction::Cancel
        })
        .build()
        .unwrap();

    target.pause().unwrap();
    for i in 0..3 {
        target.log(Severity::Info, format!("doomed {}", i)).unwrap();
    }
    target.resume().unwrap();
    target.shutdown().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(ErrorKind::FileOpen, "write")]);
    let stats = target.stats();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.discarded, 2);
    assert!(matches!(
        target.log(Severity::Info, "late"),
        Err(Error::ShutDown)
    ));
}

#[test]
fn test_commands_apply_in_queue_order() {
    let dir = tempfile::tempdir().unwrap();
    let target = builder(dir.path(), "cmd", ConcurrencyMode::MultiThreadedSeparateThread)
        .with_postfix(Postfix::None)
        .build()
        .unwrap();

    target.log(Severity::Info, "kept").unwrap();
    target.command(Command::NoFileWrite(true)).unwrap();
    target.log(Severity::Info, "dropped").unwrap();
    target.command(Command::NoFileWrite(false)).unwrap();
    target.log(Severity::Info, "kept again").unwrap();
    target.shutdown().unwrap();

    let content = fs::read_to_string(dir.path().join("cmd.log")).unwrap();
    assert!(content.contains("kept"));
    assert!(content.contains("kept again"));
    assert!(!content.contains("dropped"));
}

#[test]
fn test_every_n_events_counter() {
    let dir = tempfile::tempdir().unwrap();
    let hits = Arc::new(Mutex::new(0usize));
    let hits_cb = Arc::clone(&hits);
    let target = builder(dir.path(), "counted", ConcurrencyMode::SingleThreaded)
        .with_postfix(Postfix::None)
        .with_processor(
            Processor::custom(move |_, _| {
                *hits_cb.lock().unwrap() += 1;
                true
            })
            .with_frequency(Frequency::EveryEvents(3)),
        )
        .build()
        .unwrap();

    for i in 0..10 {
        target.log(Severity::Info, i.to_string()).unwrap();
    }
    assert_eq!(*hits.lock().unwrap(), 3);
    assert_eq!(target.with_processors(|ps| ps[0].current()), 1);
    target.shutdown().unwrap();
}

#[test]
fn test_drop_without_shutdown_drains() {
    let dir = tempfile::tempdir().unwrap();
    {
        let target = builder(dir.path(), "dropped", ConcurrencyMode::MultiThreadedSeparateThread)
            .with_postfix(Postfix::None)
            .build()
            .unwrap();
        target.log(Severity::Info, "still written").unwrap();
    }
    let content = fs::read_to_string(dir.path().join("dropped.log")).unwrap();
    assert!(content.contains("still written"));
}
