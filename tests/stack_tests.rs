//! Stack integration tests.
//!
//! These play the first turn of a small game with scripted responses and
//! check how blocks are created, in which order they run, and what the
//! turn history keeps of them.

use std::sync::Arc;

use cu_rules::actions::Action;
use cu_rules::cards::{CardId, CardRegistry};
use cu_rules::core::{PlayerId, RulesConfig, ScriptedRandom};
use cu_rules::game::{Game, PhaseRecord};
use cu_rules::io::driver::ScriptedDriver;
use cu_rules::io::event::Event;
use cu_rules::io::request::Response;
use cu_rules::script::ast::PhaseName;
use cu_rules::stack::BlockKind;

const VANILLA: &str = "id: CU00002
cardType: unit
level: 1
attack: 100
defense: 100";

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

/// Player 0 starts; both decks run out after a few turns.
fn game(texts: &[&str], partners: [u32; 2], responses: Vec<Response>) -> Game {
    let mut registry = CardRegistry::new();
    for text in texts {
        registry.register_text(text).unwrap();
    }
    let mut game = Game::new(
        RulesConfig::default(),
        Arc::new(registry),
        Box::new(ScriptedDriver::then_auto(responses)),
        Box::new(ScriptedRandom::new(vec![0; 256])),
    );
    for (player, partner) in PlayerId::all().zip(partners) {
        game.add_deck(player, &[CardId::new(2); 6], CardId::new(partner))
            .unwrap();
    }
    game
}

/// Turn one up to the start of the first main phase.
fn draw_phase() -> Vec<Response> {
    vec![
        Response::DoStandardDraw,
        Response::Pass,
        Response::Pass,
        Response::Pass,
        Response::Pass,
    ]
}

/// Turn one up to the start of the battle phase.
fn to_battle() -> Vec<Response> {
    let mut responses = draw_phase();
    responses.extend([Response::Pass, Response::Pass, Response::EnterBattlePhase(true)]);
    responses
}

fn first_turn_phase(game: &Game, phase: PhaseName) -> &PhaseRecord {
    game.history()[0]
        .phases
        .iter()
        .find(|p| p.phase == phase)
        .unwrap()
}

fn position(game: &Game, found: impl Fn(&Event) -> bool) -> usize {
    game.events().iter().position(found).unwrap()
}

// =============================================================================
// Priority
// =============================================================================

/// Test that the standard draw is a block of its own in the draw phase.
#[test]
fn test_standard_draw_is_recorded() {
    let mut game = game(&[VANILLA, PLAIN_PARTNER], [9, 9], draw_phase());
    game.run().unwrap();

    let draw = first_turn_phase(&game, PhaseName::Draw);
    // one stack with the draw, then one that closes empty
    assert_eq!(draw.stacks.len(), 2);
    assert_eq!(draw.stacks[0].blocks.len(), 1);
    assert!(draw.stacks[1].blocks.is_empty());

    let block = &draw.stacks[0].blocks[0];
    assert_eq!(block.kind, BlockKind::StandardDraw);
    assert_eq!(block.player, p0());
    assert!(block.costs.is_empty());
    let names: Vec<&str> = block
        .executed
        .iter()
        .flat_map(|t| t.actions.iter().map(Action::name))
        .collect();
    assert_eq!(names, vec!["draw"]);
}

/// Test that blocks run last in, first out once both players pass.
#[test]
fn test_blocks_run_last_in_first_out() {
    let responder = "id: CU00004
cardType: unit
level: 0
attack: 0
defense: 0
o: fast
turnLimit: 1
exec:
GAINLIFE(100)";
    let mut responses = draw_phase();
    responses.extend([
        Response::DoStandardSummon(0),
        Response::ChooseZoneSlot(0),
        Response::ActivateFastAbility(0),
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(&[VANILLA, PLAIN_PARTNER, responder], [9, 4], responses);
    game.run().unwrap();

    let main = first_turn_phase(&game, PhaseName::Main1);
    let kinds: Vec<(BlockKind, PlayerId)> = main.stacks[0]
        .blocks
        .iter()
        .map(|b| (b.kind, b.player))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (BlockKind::StandardSummon, p0()),
            (BlockKind::AbilityActivation, p1()),
        ]
    );

    let gained = position(&game, |e| {
        matches!(e, Event::LifeChanged { player, amount: 100, .. } if *player == p1())
    });
    let summoned = position(&game, |e| matches!(e, Event::Summoned { .. }));
    assert!(gained < summoned);
    assert_eq!(game.state().players[p1()].life, 1100);
}

// =============================================================================
// Retire
// =============================================================================

/// Test that retiring discards the unit up front and pays its level later.
#[test]
fn test_retire_returns_level_as_mana() {
    let mut responses = draw_phase();
    responses.extend([
        Response::DoStandardSummon(0),
        Response::ChooseZoneSlot(0),
        Response::Pass,
        Response::Pass,
        Response::DoRetire(vec![0]),
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(&[VANILLA, PLAIN_PARTNER], [9, 9], responses);
    game.run().unwrap();

    let main = first_turn_phase(&game, PhaseName::Main1);
    let retire = &main.stacks[1].blocks[0];
    assert_eq!(retire.kind, BlockKind::Retire);
    let cost: Vec<&str> = retire
        .costs
        .iter()
        .flat_map(|t| t.actions.iter().map(Action::name))
        .collect();
    assert_eq!(cost, vec!["discard"]);
    let effect: Vec<&str> = retire
        .executed
        .iter()
        .flat_map(|t| t.actions.iter().map(Action::name))
        .collect();
    assert_eq!(effect, vec!["changeMana"]);

    assert!(game
        .events()
        .iter()
        .any(|e| matches!(e, Event::Discarded { retired: true, .. })));
    let zones = game.state().zones(p0());
    assert!(zones.unit.is_empty());
    assert_eq!(zones.discard.len(), 1);
}

// =============================================================================
// Battle
// =============================================================================

/// Test that an unblocked attack on the partner deals the difference as damage.
#[test]
fn test_attack_on_partner_deals_damage() {
    let striker = "id: CU00001
cardType: unit
level: 0
attack: 300
defense: 300";
    let mut responses = to_battle();
    responses.extend([
        Response::DoAttackDeclaration(vec![0]),
        Response::ChooseCards(vec![0]),
        Response::Pass,
        Response::Pass,
        Response::DoFight,
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(&[VANILLA, PLAIN_PARTNER, striker], [1, 9], responses);
    game.run().unwrap();

    let battle = first_turn_phase(&game, PhaseName::Battle);
    assert_eq!(battle.stacks[0].blocks[0].kind, BlockKind::AttackDeclaration);
    assert_eq!(battle.stacks[1].blocks[0].kind, BlockKind::Fight);

    // partners stay on the field; only the damage goes through
    assert_eq!(game.state().players[p1()].life, 700);
    assert_eq!(game.state().zones(p1()).partner.len(), 1);
    let fights: Vec<&Event> = game
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Fight { .. }))
        .collect();
    // the partner is still there to strike back, for nothing
    assert_eq!(fights.len(), 2);
    assert!(matches!(fights[0], Event::Fight { counterattack: false, .. }));
    assert!(matches!(fights[1], Event::Fight { counterattack: true, .. }));
    assert_eq!(game.state().players[p0()].life, 1000);
}

/// Test that a partner beaten by its attacker still counterattacks.
#[test]
fn test_beaten_partner_counterattacks() {
    let striker = "id: CU00001
cardType: unit
level: 0
attack: 300
defense: 100";
    let brute = "id: CU00004
cardType: unit
level: 0
attack: 500
defense: 0";
    let mut responses = to_battle();
    responses.extend([
        Response::DoAttackDeclaration(vec![0]),
        Response::ChooseCards(vec![0]),
        Response::Pass,
        Response::Pass,
        Response::DoFight,
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(&[VANILLA, striker, brute], [1, 4], responses);
    game.run().unwrap();

    assert_eq!(game.state().players[p1()].life, 700);
    assert_eq!(game.state().players[p0()].life, 600);
    assert_eq!(game.state().zones(p0()).partner.len(), 1);
    assert_eq!(game.state().zones(p1()).partner.len(), 1);

    let struck = position(&game, |e| matches!(e, Event::Fight { counterattack: false, .. }));
    let countered = position(&game, |e| matches!(e, Event::Fight { counterattack: true, .. }));
    assert!(struck < countered);
}

/// Test that a target that holds strikes back at its attacker.
#[test]
fn test_surviving_target_counterattacks() {
    let weak = "id: CU00001
cardType: unit
level: 0
attack: 100
defense: 100";
    let wall = "id: CU00004
cardType: unit
level: 0
attack: 200
defense: 300";
    let mut responses = to_battle();
    responses.extend([
        Response::DoAttackDeclaration(vec![0]),
        Response::ChooseCards(vec![0]),
        Response::Pass,
        Response::Pass,
        Response::DoFight,
        Response::Pass,
        Response::Pass,
    ]);
    let mut game = game(&[VANILLA, weak, wall], [1, 4], responses);
    game.run().unwrap();

    assert_eq!(game.state().players[p1()].life, 1000);
    assert_eq!(game.state().players[p0()].life, 900);
    assert!(game
        .events()
        .iter()
        .any(|e| matches!(e, Event::Fight { counterattack: true, .. })));
}
