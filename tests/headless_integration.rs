use std::collections::HashSet;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use taktik::puzzle::{Difficulty, Puzzle};
use taktik::runtime::{Runner, TestEventSource, TrainerEvent};
use taktik::session::{Command, Session, SessionEvent, SessionOptions};
use taktik::timer::SystemClock;

// Headless integration using the internal runtime + session without a TTY.
// Each injected key stands for the next scripted move; ticks drive the
// session's delayed actions for real.
#[test]
fn headless_session_flow_completes() {
    let puzzles = vec![Puzzle {
        id: 1,
        fen: "3r2k1/8/8/8/3p4/8/8/3Q2K1 w - - 0 1".to_string(),
        difficulty: Difficulty::Easy,
        bad_moves: vec![],
    }];
    let (mut session, _) = Session::new(
        SessionOptions::default(),
        puzzles,
        HashSet::new(),
        SystemClock,
    );

    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let runner = Runner::new(es, Duration::from_millis(5));

    // One keypress per target move.
    let mut moves = vec![("d1", "d4"), ("d1", "g4"), ("d1", "b3")].into_iter();
    for _ in 0..3 {
        tx.send(TrainerEvent::Key(KeyEvent::new(
            KeyCode::Enter,
            KeyModifiers::NONE,
        )))
        .unwrap();
    }

    let mut finished = None;
    for _ in 0..2000u32 {
        let cmds = match runner.step() {
            TrainerEvent::Tick => session.handle_event(SessionEvent::Tick),
            TrainerEvent::Redraw => vec![],
            TrainerEvent::Key(_) => match moves.next() {
                Some((from, to)) => session.handle_event(SessionEvent::UserMove {
                    from: from.parse().unwrap(),
                    to: to.parse().unwrap(),
                }),
                None => vec![],
            },
        };
        for cmd in cmds {
            if let Command::Finished(summary) = cmd {
                finished = Some(summary);
            }
        }
        if finished.is_some() {
            break;
        }
    }

    let summary = finished.expect("session should finish after all targets are found");
    assert_eq!(summary.stats.puzzles_solved, 1);
    assert_eq!(summary.stats.moves_found, 3);
    assert_eq!(summary.accuracy, 100.0);
    assert!(session.is_finished());
}

#[test]
fn headless_early_exit_produces_partial_summary() {
    let puzzles = vec![Puzzle {
        id: 1,
        fen: "7k/8/8/5n2/4P3/8/8/K7 w - - 0 1".to_string(),
        difficulty: Difficulty::Easy,
        bad_moves: vec![],
    }];
    let (mut session, _) = Session::new(
        SessionOptions::default(),
        puzzles,
        HashSet::new(),
        SystemClock,
    );

    let cmds = session.finish_now();
    match cmds.last() {
        Some(Command::Finished(summary)) => {
            assert_eq!(summary.stats.puzzles_attempted, 1);
            assert_eq!(summary.stats.puzzles_solved, 0);
            assert_eq!(summary.stats.moves_found, 0);
        }
        other => panic!("expected Finished, got {:?}", other),
    }
}
