//! Whole-game scenarios.
//!
//! Each test sets up a small match, drives it with scripted responses and
//! randomness, and checks what the rules say must happen.

use std::sync::{Arc, Mutex};

use cu_rules::cards::{CardId, CardRegistry};
use cu_rules::core::{
    EngineError, GameState, PlayerId, RandomSource, RulesConfig, ScriptedRandom, SeededRandom,
    VictoryCondition,
};
use cu_rules::game::Game;
use cu_rules::io::driver::{Driver, ScriptedDriver};
use cu_rules::io::event::Event;
use cu_rules::io::request::{Request, RequestKind, Response};
use cu_rules::rules::GameResult;
use cu_rules::stack::BlockKind;

const VANILLA: &str = "id: CU00002
cardType: unit
level: 1
attack: 100
defense: 100";

const BIG_UNIT: &str = "id: CU00003
cardType: unit
level: 3
attack: 300
defense: 300";

const PLAIN_PARTNER: &str = "id: CU00009
cardType: unit
level: 0
attack: 0
defense: 0";

fn p0() -> PlayerId {
    PlayerId::new(0)
}

fn p1() -> PlayerId {
    PlayerId::new(1)
}

fn registry(texts: &[&str]) -> Arc<CardRegistry> {
    let mut registry = CardRegistry::new();
    for text in texts {
        registry.register_text(text).unwrap();
    }
    Arc::new(registry)
}

/// Engine logs go to the test output; `RUST_LOG=cu_rules=debug` shows them.
fn logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A game where player 0 starts, as long as the random values last.
fn game(
    config: RulesConfig,
    registry: Arc<CardRegistry>,
    driver: Box<dyn Driver>,
    decks: [(&[CardId], CardId); 2],
) -> Game {
    logging();
    let mut game = Game::new(
        config,
        registry,
        driver,
        Box::new(ScriptedRandom::new(vec![0; 256])),
    );
    for (player, (deck, partner)) in PlayerId::all().zip(decks) {
        game.add_deck(player, deck, partner).unwrap();
    }
    game
}

/// Passes the requests it sees along to a scripted driver.
struct RecordingDriver {
    inner: ScriptedDriver,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl Driver for RecordingDriver {
    fn respond(&mut self, requests: &[Request], state: &GameState) -> Result<Response, EngineError> {
        self.seen.lock().unwrap().extend(requests.iter().cloned());
        self.inner.respond(requests, state)
    }
}

/// Records the ranges it is asked for.
struct RecordingRandom {
    inner: ScriptedRandom,
    ranges: Arc<Mutex<Vec<Vec<u32>>>>,
}

impl RandomSource for RecordingRandom {
    fn next_ints(&mut self, ranges: &[u32]) -> Result<Vec<u32>, EngineError> {
        self.ranges.lock().unwrap().push(ranges.to_vec());
        self.inner.next_ints(ranges)
    }
}

// =============================================================================
// Running Out Of Cards
// =============================================================================

/// Test that a game where nobody acts ends when the starting player cannot draw.
#[test]
fn test_passive_game_ends_on_empty_deck() {
    let registry = registry(&[VANILLA, PLAIN_PARTNER]);
    let deck = [CardId::new(2); 12];
    let mut game = game(
        RulesConfig::default(),
        registry,
        Box::new(ScriptedDriver::auto()),
        [(&deck, CardId::new(9)), (&deck, CardId::new(9))],
    );

    let result = game.run().unwrap();

    // 7 cards left after the opening hand, one standard draw per turn
    assert_eq!(
        result,
        GameResult::Winner {
            player: p1(),
            conditions: vec![VictoryCondition::DrawFromEmptyDeck],
        }
    );
    assert_eq!(game.state().turn_number, 15);
    assert_eq!(game.history().len(), 15);
    assert!(matches!(game.events().last(), Some(Event::GameEnded { .. })));
}

/// Test that the replay log reproduces a seeded game exactly.
#[test]
fn test_replay_reproduces_seeded_game() {
    let registry = registry(&[VANILLA, PLAIN_PARTNER]);
    let deck = [CardId::new(2); 10];
    let mut recorded = Game::new(
        RulesConfig::default(),
        registry.clone(),
        Box::new(ScriptedDriver::auto()),
        Box::new(SeededRandom::new(42)),
    );
    for player in PlayerId::all() {
        recorded.add_deck(player, &deck, CardId::new(9)).unwrap();
    }
    let result = recorded.run().unwrap();

    let log = recorded.log().clone();
    let bytes = log.to_bytes().unwrap();
    let restored = cu_rules::io::replay::ReplayLog::from_bytes(&bytes).unwrap();
    let mut replayed = Game::new(
        RulesConfig::default(),
        registry,
        Box::new(restored.driver()),
        Box::new(restored.random()),
    );
    for player in PlayerId::all() {
        replayed.add_deck(player, &deck, CardId::new(9)).unwrap();
    }

    assert_eq!(replayed.run().unwrap(), result);
    assert_eq!(replayed.events(), recorded.events());
    assert_eq!(replayed.state().turn_number, recorded.state().turn_number);
}

// =============================================================================
// Scenario A: Life Damage
// =============================================================================

/// Test that damage past zero floors life at 0 and hands the opponent lifeZero.
#[test]
fn test_lethal_damage_floors_life() {
    let partner = "id: CU00001
cardType: unit
level: 0
attack: 0
defense: 0
o: trigger
mandatory: yes
during: yourEndPhase
exec:
opponent.DAMAGE(1200)";
    let registry = registry(&[VANILLA, PLAIN_PARTNER, partner]);
    let deck = [CardId::new(2); 10];
    let mut game = game(
        RulesConfig::default(),
        registry,
        Box::new(ScriptedDriver::auto()),
        [(&deck, CardId::new(1)), (&deck, CardId::new(9))],
    );

    let result = game.run().unwrap();

    assert_eq!(
        result,
        GameResult::Winner {
            player: p0(),
            conditions: vec![VictoryCondition::LifeZero],
        }
    );
    assert_eq!(game.state().players[p1()].life, 0);
    assert_eq!(game.state().players[p0()].life, 1000);
    assert_eq!(game.state().turn_number, 1);
    assert!(game.events().iter().any(|e| matches!(
        e,
        Event::DamageDealt { player, amount: 1200 } if *player == p1()
    )));
}

// =============================================================================
// Scenario B: Unaffordable Summon
// =============================================================================

/// Responses that play turn one up to the start of the first main phase.
fn draw_phase() -> Vec<Response> {
    vec![
        Response::DoStandardDraw,
        Response::Pass,
        Response::Pass,
        Response::Pass,
        Response::Pass,
    ]
}

fn broke_game(responses: Vec<Response>) -> Game {
    let registry = registry(&[BIG_UNIT, PLAIN_PARTNER]);
    let deck = [CardId::new(3); 10];
    game(
        RulesConfig::default().with_mana_gain(0),
        registry,
        Box::new(ScriptedDriver::new(responses)),
        [(&deck, CardId::new(9)), (&deck, CardId::new(9))],
    )
}

/// Test that a summon without the mana for it fails and leaves the hand untouched.
#[test]
fn test_unaffordable_summon_fails() {
    let mut baseline = broke_game(draw_phase());
    assert!(matches!(baseline.run(), Err(EngineError::NoResponse(_))));
    let hand_before = baseline.state().zones(p0()).hand.cards().to_vec();
    assert_eq!(hand_before.len(), 6);

    let mut responses = draw_phase();
    responses.push(Response::DoStandardSummon(2));
    let mut game = broke_game(responses);
    // the driver runs dry once priority comes back
    assert!(matches!(game.run(), Err(EngineError::NoResponse(_))));

    let state = game.state();
    assert_eq!(state.zones(p0()).hand.cards(), hand_before.as_slice());
    assert!(state.zones(p0()).unit.is_empty());
    assert_eq!(state.players[p0()].mana, 0);
    assert!(game.events().iter().any(|e| *e
        == Event::BlockCreationFailed {
            player: p0(),
            kind: BlockKind::StandardSummon,
        }));
    assert!(!game
        .events()
        .iter()
        .any(|e| matches!(e, Event::Summoned { .. } | Event::CardPlaced { .. })));
}

/// Test that the same summon goes through once mana is available.
#[test]
fn test_affordable_summon_succeeds() {
    let registry = registry(&[BIG_UNIT, PLAIN_PARTNER]);
    let deck = [CardId::new(3); 10];
    let mut responses = draw_phase();
    responses.extend([
        Response::DoStandardSummon(2),
        Response::ChooseZoneSlot(0),
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(
        RulesConfig::default(),
        registry,
        Box::new(ScriptedDriver::new(responses)),
        [(&deck, CardId::new(9)), (&deck, CardId::new(9))],
    );
    assert!(matches!(game.run(), Err(EngineError::NoResponse(_))));

    let state = game.state();
    assert_eq!(state.zones(p0()).hand.len(), 5);
    assert_eq!(state.zones(p0()).unit.len(), 1);
    assert_eq!(state.players[p0()].mana, 2);
    assert!(game
        .events()
        .iter()
        .any(|e| matches!(e, Event::Summoned { player, .. } if *player == p0())));
}

// =============================================================================
// Scenario C: Shuffling
// =============================================================================

fn forty_card_registry() -> Arc<CardRegistry> {
    let mut texts: Vec<String> = (1..=40)
        .map(|n| format!("id: CU{n:05}\ncardType: unit\nlevel: 1\nattack: 100\ndefense: 100"))
        .collect();
    texts.push("id: CU00100\ncardType: unit\nlevel: 0\nattack: 0\ndefense: 0".to_string());
    let mut registry = CardRegistry::new();
    for text in &texts {
        registry.register_text(text).unwrap();
    }
    Arc::new(registry)
}

fn forty_card_game(random: Box<dyn RandomSource>) -> Game {
    let deck: Vec<CardId> = (1..=40).map(CardId::new).collect();
    let mut game = Game::new(
        RulesConfig::default(),
        forty_card_registry(),
        Box::new(ScriptedDriver::new([])),
        random,
    );
    for player in PlayerId::all() {
        game.add_deck(player, &deck, CardId::new(100)).unwrap();
    }
    game
}

fn card_order(game: &Game, player: PlayerId) -> Vec<CardId> {
    let state = game.state();
    let zones = state.zones(player);
    zones
        .deck
        .cards()
        .iter()
        .chain(zones.hand.cards())
        .map(|&id| state.card(id).unwrap().card_id())
        .collect()
}

/// Test that shuffling 40 cards asks for the ranges 39 down to 1.
#[test]
fn test_shuffle_requests_fisher_yates_ranges() {
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let random = RecordingRandom {
        inner: ScriptedRandom::new(vec![0; 79]),
        ranges: ranges.clone(),
    };
    let mut game = forty_card_game(Box::new(random));
    assert!(matches!(game.run(), Err(EngineError::NoResponse(_))));

    let expected: Vec<u32> = (1..40).rev().collect();
    let ranges = ranges.lock().unwrap();
    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0], vec![2]);
    assert_eq!(ranges[1], expected);
    assert_eq!(ranges[2], expected);
}

/// Test that the same random values shuffle two identical decks identically.
#[test]
fn test_same_values_same_order() {
    let ranges: Vec<u32> = (1..40).rev().collect();
    let mut seeded = SeededRandom::new(7);
    let mut values = vec![0];
    values.extend(seeded.next_ints(&ranges).unwrap());
    values.extend(seeded.next_ints(&ranges).unwrap());

    let mut first = forty_card_game(Box::new(ScriptedRandom::new(values.clone())));
    let mut second = forty_card_game(Box::new(ScriptedRandom::new(values)));
    assert!(first.run().is_err());
    assert!(second.run().is_err());

    for player in PlayerId::all() {
        assert_eq!(card_order(&first, player), card_order(&second, player));
    }
    // what the deck and opening hand would hold without a shuffle
    let unshuffled: Vec<CardId> = (6..=40).rev().chain(1..=5).map(CardId::new).collect();
    assert_ne!(card_order(&first, p0()), unshuffled);
}

// =============================================================================
// Scenario D: Mandatory Triggers
// =============================================================================

fn trigger_game(partner: &str) -> (Game, Arc<Mutex<Vec<Request>>>) {
    let registry = registry(&[VANILLA, PLAIN_PARTNER, partner]);
    let deck = [CardId::new(2); 6];
    let seen = Arc::new(Mutex::new(Vec::new()));
    let driver = RecordingDriver {
        inner: ScriptedDriver::auto(),
        seen: seen.clone(),
    };
    let game = game(
        RulesConfig::default(),
        registry,
        Box::new(driver),
        [(&deck, CardId::new(1)), (&deck, CardId::new(9))],
    );
    (game, seen)
}

fn trigger_requests(seen: &[Request]) -> Vec<&Request> {
    seen.iter()
        .filter(|r| matches!(r.kind, RequestKind::ActivateTriggerAbility { .. }))
        .collect()
}

/// Test that a lone mandatory trigger is activated without asking.
#[test]
fn test_single_mandatory_trigger_is_automatic() {
    let partner = "id: CU00001
cardType: unit
level: 0
attack: 0
defense: 0
o: trigger
mandatory: yes
during: yourEndPhase
exec:
GAINLIFE(100)";
    let (mut game, seen) = trigger_game(partner);

    let result = game.run().unwrap();

    // player 0 runs out of cards on turn 3, after one end phase
    assert!(result.is_winner(p1()));
    assert_eq!(game.state().players[p0()].life, 1100);
    assert!(trigger_requests(&seen.lock().unwrap()).is_empty());
    let activations = game
        .events()
        .iter()
        .filter(|e| matches!(e, Event::AbilityActivated { .. }))
        .count();
    assert_eq!(activations, 1);
}

/// Test that two mandatory triggers make their controller pick an order.
#[test]
fn test_two_mandatory_triggers_ask() {
    let partner = "id: CU00001
cardType: unit
level: 0
attack: 0
defense: 0
o: trigger
mandatory: yes
during: yourEndPhase
exec:
GAINLIFE(100)
o: trigger
mandatory: yes
during: yourEndPhase
exec:
GAINLIFE(200)";
    let (mut game, seen) = trigger_game(partner);

    game.run().unwrap();

    let seen = seen.lock().unwrap();
    let asked = trigger_requests(&seen);
    assert_eq!(asked.len(), 1);
    match &asked[0].kind {
        RequestKind::ActivateTriggerAbility { eligible } => assert_eq!(eligible.len(), 2),
        other => panic!("unexpected request {other:?}"),
    }
    // the second one is the only one left and goes through on its own
    assert_eq!(game.state().players[p0()].life, 1300);
}
