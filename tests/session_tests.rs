//! Session integration tests: a game on its own thread, answered through
//! suspensions.

use std::sync::Arc;

use cu_rules::cards::{CardId, CardRegistry};
use cu_rules::core::{EngineError, PlayerId, RulesConfig, ScriptedRandom};
use cu_rules::game::Game;
use cu_rules::io::driver::{Driver, ScriptedDriver};
use cu_rules::io::event::Event;
use cu_rules::io::replay::ReplayLog;
use cu_rules::io::request::Response;
use cu_rules::io::session::{Resume, Session, Suspension};
use cu_rules::rules::GameResult;

fn registry() -> Arc<CardRegistry> {
    let mut registry = CardRegistry::new();
    registry
        .register_text("id: CU00002\ncardType: unit\nlevel: 1\nattack: 100\ndefense: 100")
        .unwrap();
    registry
        .register_text("id: CU00009\ncardType: unit\nlevel: 0\nattack: 0\ndefense: 0")
        .unwrap();
    Arc::new(registry)
}

fn new_game(driver: Box<dyn Driver>) -> Game {
    let mut game = Game::new(
        RulesConfig::default(),
        registry(),
        driver,
        Box::new(ScriptedRandom::new(vec![0; 64])),
    );
    for player in PlayerId::all() {
        game.add_deck(player, &[CardId::new(2); 6], CardId::new(9))
            .unwrap();
    }
    game
}

/// Answer every suspension the way the auto driver and a zero source would.
fn play_out(session: &mut Session) -> (Result<GameResult, EngineError>, ReplayLog, Vec<Event>) {
    let mut auto = ScriptedDriver::auto();
    let mut events = Vec::new();
    loop {
        match session.next().unwrap() {
            Suspension::Requests { requests, state } => {
                let response = auto.respond(&requests, &state).unwrap();
                session.resume(Resume::Response(response)).unwrap();
            }
            Suspension::Random { ranges } => {
                session.resume(Resume::Random(vec![0; ranges.len()])).unwrap();
            }
            Suspension::Events(batch) => events.extend(batch),
            Suspension::Finished { result, log } => return (result, log, events),
        }
    }
}

// =============================================================================
// Playing Through A Session
// =============================================================================

/// Test that a session reaches the same end as the same game run directly.
#[test]
fn test_session_matches_direct_run() {
    let mut direct = new_game(Box::new(ScriptedDriver::auto()));
    let expected = direct.run().unwrap();

    let mut session = Session::start(new_game(Box::new(ScriptedDriver::new([]))), false);
    let (result, _, events) = play_out(&mut session);

    assert_eq!(result.unwrap(), expected);
    assert!(session.is_finished());
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::GameStarted { starting_player } if *starting_player == PlayerId::new(0))));
    assert!(matches!(session.next(), Err(EngineError::Disconnected)));
}

/// Test that forwarded randomness starts with the first player pick.
#[test]
fn test_forwarded_random_is_asked_for() {
    let mut session = Session::start(new_game(Box::new(ScriptedDriver::new([]))), true);
    let first = loop {
        match session.next().unwrap() {
            Suspension::Events(_) => continue,
            other => break other,
        }
    };
    let Suspension::Random { ranges } = first else {
        panic!("expected a random suspension, got {first:?}");
    };
    assert_eq!(ranges, vec![2]);
    session.resume(Resume::Random(vec![1])).unwrap();

    let (result, log, _) = play_out(&mut session);
    // player 1 starts and is the first to run out of cards
    assert_eq!(result.unwrap().winner(), Some(PlayerId::new(0)));

    // the log alone replays the game
    let mut replayed = Game::new(
        RulesConfig::default(),
        registry(),
        Box::new(log.driver()),
        Box::new(log.random()),
    );
    for player in PlayerId::all() {
        replayed
            .add_deck(player, &[CardId::new(2); 6], CardId::new(9))
            .unwrap();
    }
    assert_eq!(replayed.run().unwrap().winner(), Some(PlayerId::new(0)));
}

/// Test that random values out of range end the game with an error.
#[test]
fn test_out_of_range_random_fails() {
    let mut session = Session::start(new_game(Box::new(ScriptedDriver::new([]))), true);
    loop {
        match session.next().unwrap() {
            Suspension::Random { .. } => {
                session.resume(Resume::Random(vec![5])).unwrap();
            }
            Suspension::Finished { result, .. } => {
                assert!(matches!(
                    result,
                    Err(EngineError::RandomOutOfRange { value: 5, range: 2 })
                ));
                break;
            }
            Suspension::Events(_) => {}
            Suspension::Requests { .. } => panic!("no request before the first player is picked"),
        }
    }
}

/// Test that a response sent where random values are due is refused.
#[test]
fn test_wrong_answer_kind_fails() {
    let mut session = Session::start(new_game(Box::new(ScriptedDriver::new([]))), true);
    loop {
        match session.next().unwrap() {
            Suspension::Random { .. } => {
                session.resume(Resume::Response(Response::Pass)).unwrap();
            }
            Suspension::Finished { result, .. } => {
                assert!(result.is_err());
                break;
            }
            _ => {}
        }
    }
}

/// Test that dropping a session parked on a request does not hang.
#[test]
fn test_drop_while_waiting() {
    let mut session = Session::start(new_game(Box::new(ScriptedDriver::new([]))), false);
    loop {
        if let Suspension::Requests { .. } = session.next().unwrap() {
            break;
        }
    }
    drop(session);
}
