//! The match itself: setup, the turn loop and the host every lower layer
//! runs against.
//!
//! `Game` owns the state, the driver that answers requests and the random
//! source. Actions, timings and scripts reach the outside world only
//! through it, so it is also where responses and random values are logged
//! and events are handed to the driver.
//!
//! ```
//! use std::sync::Arc;
//! use cu_rules::cards::{CardDefinition, CardId, CardRegistry, CardType};
//! use cu_rules::core::{PlayerId, RulesConfig, ScriptedRandom};
//! use cu_rules::game::Game;
//! use cu_rules::io::driver::ScriptedDriver;
//!
//! let mut registry = CardRegistry::new();
//! registry
//!     .register(CardDefinition::new(CardId::new(1), CardType::Unit).with_level(1))
//!     .unwrap();
//!
//! let mut game = Game::new(
//!     RulesConfig::default(),
//!     Arc::new(registry),
//!     Box::new(ScriptedDriver::auto()),
//!     Box::new(ScriptedRandom::new([])),
//! );
//! game.add_deck(PlayerId::new(0), &[CardId::new(1); 3], CardId::new(1)).unwrap();
//! assert_eq!(game.state().zones(PlayerId::new(0)).deck.len(), 3);
//! ```

mod phase;
mod turn;

use std::convert::Infallible;
use std::sync::Arc;

use im::Vector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::abilities::AbilityId;
use crate::actions::{Action, ActionHost};
use crate::cards::{CardId, CardRegistry, CardType};
use crate::core::{
    Destination, EngineError, EntityId, Flow, GameState, Halt, PlayerId, RandomSource,
    RulesConfig,
};
use crate::core::random::check_ranges;
use crate::io::driver::Driver;
use crate::io::event::Event;
use crate::io::replay::ReplayLog;
use crate::io::request::{Request, Response};
use crate::rules::GameResult;
use crate::script::ast::PhaseName;
use crate::script::eval::ScriptHost;
use crate::stack::BlockKind;
use crate::timing::{run_timing, Timing, TimingHost, TimingMode};
use crate::zones::{ZoneKind, ZonePosition, ZoneRef};

/// What one block did.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockRecord {
    pub kind: BlockKind,
    pub player: PlayerId,
    pub cancelled: bool,
    pub costs: Vec<Timing>,
    pub executed: Vec<Timing>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackRecord {
    pub index: u32,
    /// In creation order.
    pub blocks: Vec<BlockRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: PhaseName,
    /// Timings outside of any block, such as mana supply.
    pub timings: Vec<Timing>,
    pub stacks: Vec<StackRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnRecord {
    pub number: u32,
    pub player: PlayerId,
    pub phases: Vec<PhaseRecord>,
}

/// A match between two players.
pub struct Game {
    pub(crate) state: GameState,
    driver: Box<dyn Driver>,
    random: Box<dyn RandomSource>,
    log: ReplayLog,
    events: Vector<Event>,
    /// Emitted but not yet shown to the driver.
    pending: Vec<Event>,
    history: Vec<TurnRecord>,
    /// How script timings run: as costs while a block is being created.
    pub(crate) mode: TimingMode,
    /// Timings run since the current block or phase step began.
    pub(crate) record: Vec<Timing>,
    /// Mandatory abilities already forced this phase.
    pub(crate) phase_forced: Vec<(EntityId, AbilityId)>,
    pub(crate) standard_draw_done: bool,
    started: bool,
}

impl Game {
    #[must_use]
    pub fn new(
        config: RulesConfig,
        registry: Arc<CardRegistry>,
        driver: Box<dyn Driver>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            state: GameState::new(Arc::new(config), registry),
            driver,
            random,
            log: ReplayLog::new(),
            events: Vector::new(),
            pending: Vec::new(),
            history: Vec::new(),
            mode: TimingMode::Effect,
            record: Vec::new(),
            phase_forced: Vec::new(),
            standard_draw_done: false,
            started: false,
        }
    }

    /// Give `player` their deck, top card first, and their partner.
    ///
    /// Deck cards start hidden from both players. The partner is hidden
    /// from the opponent until it is revealed at game start.
    pub fn add_deck(
        &mut self,
        player: PlayerId,
        deck: &[CardId],
        partner: CardId,
    ) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::Setup("decks are fixed once the game runs".into()));
        }
        if self.state.zones(player).partner.cards().next().is_some() {
            return Err(EngineError::Setup(format!("{player} already has a partner")));
        }
        let registry = self.state.registry.clone();
        let partner = registry.definition(partner)?.clone();
        if !partner.has_card_type(CardType::Unit) {
            return Err(EngineError::Setup(format!(
                "partner {} is not a unit",
                partner.id
            )));
        }
        for &id in deck {
            let definition = registry.definition(id)?.clone();
            self.state.add_card(
                definition,
                player,
                ZoneRef::new(player, ZoneKind::Deck),
                Destination::Pile(ZonePosition::Bottom),
            )?;
        }
        let partner = self.state.add_card(
            partner,
            player,
            ZoneRef::new(player, ZoneKind::Partner),
            Destination::Slot(0),
        )?;
        let card = self.state.card_mut(partner)?;
        card.hidden_from.clear();
        card.hidden_from.push(player.next());
        debug!(player = %player, cards = deck.len(), "deck added");
        Ok(())
    }

    /// Swap in another driver, returning the old one.
    pub fn replace_driver(&mut self, driver: Box<dyn Driver>) -> Box<dyn Driver> {
        std::mem::replace(&mut self.driver, driver)
    }

    /// Swap in another random source, returning the old one.
    pub fn replace_random(&mut self, random: Box<dyn RandomSource>) -> Box<dyn RandomSource> {
        std::mem::replace(&mut self.random, random)
    }

    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> &Vector<Event> {
        &self.events
    }

    #[must_use]
    pub fn log(&self) -> &ReplayLog {
        &self.log
    }

    /// Turns played so far, the current one last.
    #[must_use]
    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    /// Play until a player wins or the game ends in a draw.
    ///
    /// A driver or random source that fails ends the run with its error;
    /// the game cannot be resumed afterwards.
    pub fn run(&mut self) -> Result<GameResult, EngineError> {
        if self.started {
            return Err(EngineError::Setup("the game already ran".into()));
        }
        for player in PlayerId::all() {
            if self.state.zones(player).partner.cards().next().is_none() {
                return Err(EngineError::Setup(format!("{player} has no partner")));
            }
        }
        self.started = true;
        let result = match self.play() {
            Ok(never) => match never {},
            Err(Halt::GameOver(result)) => result,
            Err(Halt::Stopped) => {
                return Err(EngineError::Invariant(
                    "a failed timing escaped its script".into(),
                ))
            }
            Err(Halt::Error(err)) => {
                self.flush();
                return Err(err);
            }
        };
        info!(%result, turn = self.state.turn_number, "game over");
        TimingHost::emit(self, Event::GameEnded {
            result: result.clone(),
        });
        self.flush();
        Ok(result)
    }

    fn play(&mut self) -> Flow<Infallible> {
        let first = if self.random(&[2])?.first() == Some(&1) {
            PlayerId::new(1)
        } else {
            PlayerId::new(0)
        };
        self.state.turn_player = first;
        info!(starting_player = %first, "game started");
        TimingHost::emit(self, Event::GameStarted {
            starting_player: first,
        });

        let players = [first, first.next()];
        self.timing(players.map(Action::shuffle).to_vec(), TimingMode::Effect)?;
        let hand = self.state.config.opening_hand;
        self.timing(
            players.map(|p| Action::draw(p, hand)).to_vec(),
            TimingMode::Effect,
        )?;
        let mut reveals = Vec::new();
        for player in players {
            for id in self.state.zones(player).partner.cards() {
                reveals.push(Action::reveal(player, self.state.card(id)?.current_ref()));
            }
        }
        self.timing(reveals, TimingMode::Effect)?;
        self.record.clear();

        loop {
            turn::run_turn(self)?;
        }
    }

    /// Hand the driver what happened since it last heard.
    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let events = std::mem::take(&mut self.pending);
            self.driver.notify(&events);
        }
    }

    /// Ask for one response to a batch of requests.
    pub(crate) fn ask(&mut self, requests: Vec<Request>) -> Flow<(Request, Response)> {
        self.flush();
        let response = self.driver.respond(&requests, &self.state)?;
        let request = response.validate(&requests, Some(&self.state))?.clone();
        trace!(request = %request, response = response.as_str(), "response");
        self.log.record_response(response.clone());
        Ok((request, response))
    }

    /// Run a timing and keep it in the current record.
    pub(crate) fn timing(
        &mut self,
        actions: Vec<Action>,
        mode: TimingMode,
    ) -> Flow<Option<Vec<Action>>> {
        let Some(timing) = run_timing(self, actions, mode)? else {
            return Ok(None);
        };
        let executed = timing.actions.clone();
        self.record.push(timing);
        Ok(Some(executed))
    }

    /// Undo every timing recorded since `start`, last first.
    pub(crate) fn rollback(&mut self, start: usize) -> Flow<()> {
        let mut undone = self.record.split_off(start);
        for timing in undone.iter_mut().rev() {
            timing.undo(&mut self.state)?;
        }
        crate::timing::resettle(self)
    }

    pub(crate) fn current_turn(&mut self) -> Result<&mut TurnRecord, EngineError> {
        self.history
            .last_mut()
            .ok_or_else(|| EngineError::Invariant("no turn is running".into()))
    }

    pub(crate) fn current_phase(&mut self) -> Result<&mut PhaseRecord, EngineError> {
        self.current_turn()?
            .phases
            .last_mut()
            .ok_or_else(|| EngineError::Invariant("no phase is running".into()))
    }
}

impl ActionHost for Game {
    fn state(&self) -> &GameState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    fn request(&mut self, request: Request) -> Flow<Response> {
        self.ask(vec![request]).map(|(_, response)| response)
    }

    fn random(&mut self, ranges: &[u32]) -> Flow<Vec<u32>> {
        let values = self.random.next_ints(ranges)?;
        check_ranges(ranges, &values)?;
        trace!(?ranges, ?values, "random");
        self.log.record_random(values.clone());
        Ok(values)
    }
}

impl TimingHost for Game {
    fn emit(&mut self, event: Event) {
        trace!(event = event.as_str(), "event");
        self.events.push_back(event.clone());
        self.pending.push(event);
    }
}

impl ScriptHost for Game {
    fn state(&self) -> &GameState {
        &self.state
    }

    fn request(&mut self, request: Request) -> Flow<Response> {
        ActionHost::request(self, request)
    }

    fn execute(&mut self, actions: Vec<Action>) -> Flow<Option<Vec<Action>>> {
        self.timing(actions, self.mode)
    }

    fn run_cost_timing(&mut self, actions: Vec<Action>) -> Flow<Option<Vec<Action>>> {
        self.timing(actions, TimingMode::Cost)
    }

    fn emit(&mut self, event: Event) {
        TimingHost::emit(self, event);
    }

    fn set_hidden(&mut self, card: EntityId, player: PlayerId, hidden: bool) -> Flow<()> {
        let hidden_from = &mut self.state.card_mut(card)?.hidden_from;
        if hidden {
            if !hidden_from.contains(&player) {
                hidden_from.push(player);
            }
        } else {
            hidden_from.retain(|p| *p != player);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardDefinition;
    use crate::core::ScriptedRandom;
    use crate::io::driver::ScriptedDriver;

    fn registry() -> Arc<CardRegistry> {
        let mut registry = CardRegistry::new();
        registry
            .register(CardDefinition::new(CardId::new(1), CardType::Unit).with_level(2))
            .unwrap();
        registry
            .register(CardDefinition::new(CardId::new(2), CardType::StandardSpell))
            .unwrap();
        Arc::new(registry)
    }

    fn game() -> Game {
        Game::new(
            RulesConfig::default(),
            registry(),
            Box::new(ScriptedDriver::auto()),
            Box::new(ScriptedRandom::new([])),
        )
    }

    #[test]
    fn test_deck_setup_hides_cards() {
        let mut game = game();
        let p0 = PlayerId::new(0);
        game.add_deck(p0, &[CardId::new(1), CardId::new(2)], CardId::new(1))
            .unwrap();

        let zones = game.state().zones(p0);
        assert_eq!(zones.deck.len(), 2);
        let top = game.state().card(game.state().deck_top(p0, 1)[0]).unwrap();
        assert_eq!(top.definition.id, CardId::new(1));
        assert_eq!(top.hidden_from.len(), 2);

        let partner = zones.partner.cards().next().unwrap();
        let partner = game.state().card(partner).unwrap();
        assert_eq!(partner.hidden_from.as_slice(), &[PlayerId::new(1)]);
    }

    #[test]
    fn test_partner_must_be_a_unit() {
        let mut game = game();
        let err = game
            .add_deck(PlayerId::new(0), &[], CardId::new(2))
            .unwrap_err();
        assert!(matches!(err, EngineError::Setup(_)));
    }

    #[test]
    fn test_run_needs_both_partners() {
        let mut game = game();
        game.add_deck(PlayerId::new(0), &[], CardId::new(1)).unwrap();
        assert!(matches!(game.run(), Err(EngineError::Setup(_))));
    }

    #[test]
    fn test_unknown_card_is_rejected() {
        let mut game = game();
        let err = game
            .add_deck(PlayerId::new(0), &[CardId::new(77)], CardId::new(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::Definition(_)));
    }
}
