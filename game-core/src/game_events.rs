use game_types::{GameId, PlayerId, Round, RoundScore, Standing};

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    GameStarted {
        game_id: GameId,
        first_round: Round,
    },
    SubmissionRecorded {
        game_id: GameId,
        player_id: PlayerId,
        round_number: i32,
        words: Vec<String>,
    },
    RoundClosed {
        game_id: GameId,
        round_number: i32,
        scores: Vec<RoundScore>,
    },
    RoundOpened {
        game_id: GameId,
        round: Round,
    },
    GameCompleted {
        game_id: GameId,
        standings: Vec<Standing>,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::GameStarted { game_id, .. }
            | GameEvent::SubmissionRecorded { game_id, .. }
            | GameEvent::RoundClosed { game_id, .. }
            | GameEvent::RoundOpened { game_id, .. }
            | GameEvent::GameCompleted { game_id, .. } => *game_id,
        }
    }
}

/// Event handler trait for processing game events
pub trait GameEventHandler: Send {
    fn handle_event(&mut self, event: GameEvent);
}

/// Simple event bus for distributing game events
pub struct GameEventBus {
    handlers: Vec<Box<dyn GameEventHandler>>,
}

impl GameEventBus {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn GameEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn publish(&mut self, event: GameEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(event.clone());
        }
    }
}

impl Default for GameEventBus {
    fn default() -> Self {
        Self::new()
    }
}
