//! Game state controller.
//!
//! Owns the authoritative position of the game being played, the history
//! ledger behind it and the view state (live play, review of an earlier
//! ply, or position editing). Every move, whether proposed by the human or
//! by the engine, goes through [`GameController`], which validates it via
//! the [`ChessRules`] capability, appends it to the ledger and re-evaluates
//! the terminal conditions.

use crate::error::{MoveRejection, PositionError};
use crate::history::HistoryLedger;
use crate::rules::{ChessRules, Position, ShakmatyRules};
use crate::types::*;

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// What the board is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// The current position; moves are accepted.
    Live,
    /// An earlier ledger entry is displayed; the game is untouched.
    Review(usize),
    /// The player is setting up a custom position; no moves, no turn checks.
    Editing,
}

/// How the game is being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// Play against the engine at full strength.
    Casual,
    /// Free play: either side may move, the engine only comments.
    Analysis,
    /// Play against a rated opponent whose strength follows the player's tier.
    Rated,
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "casual" => Ok(GameMode::Casual),
            "analysis" => Ok(GameMode::Analysis),
            "rated" => Ok(GameMode::Rated),
            other => Err(format!("unknown mode '{}' (expected casual, analysis or rated)", other)),
        }
    }
}

/// Navigation target in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    /// Position index (0 is the initial position).
    Ply(usize),
    /// Back to the live position.
    Current,
}

/// Emitted when a custom position was refused and replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionNotice {
    pub rejected_fen: String,
    pub reason: PositionError,
}

/// Everything a front-end needs to know after an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub record: MoveRecord,
    /// The side now to move is in check.
    pub check: bool,
    /// Square of the king in check, for highlighting.
    pub king_in_check: Option<Square>,
    pub checkmate: bool,
    pub terminal: Option<Terminal>,
}

/// Read-only summary of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub view: ViewState,
    pub mode: GameMode,
    pub player_side: PlayerSide,
    pub side_to_move: Side,
    pub in_check: bool,
    pub king_in_check: Option<Square>,
    pub terminal: Option<Terminal>,
    pub move_count: usize,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct GameController {
    rules: Box<dyn ChessRules>,
    ledger: HistoryLedger,
    view: ViewState,
    mode: GameMode,
    player_side: PlayerSide,
    terminal: Option<Terminal>,
    /// Set once a move has been played since the game started.
    moved: bool,
    /// The game was seeded from an edited position.
    custom_start: bool,
}

impl Default for GameController {
    fn default() -> Self {
        Self::new(Box::new(ShakmatyRules), GameMode::Casual, PlayerSide::White)
    }
}

impl GameController {
    pub fn new(rules: Box<dyn ChessRules>, mode: GameMode, player_side: PlayerSide) -> Self {
        Self {
            rules,
            ledger: HistoryLedger::default(),
            view: ViewState::Live,
            mode,
            player_side,
            terminal: None,
            moved: false,
            custom_start: false,
        }
    }

    /// Starts a fresh game from the standard position.
    pub fn new_game(&mut self, mode: GameMode, player_side: PlayerSide) {
        self.mode = mode;
        self.player_side = player_side;
        self.ledger.reset(None);
        self.view = ViewState::Live;
        self.terminal = None;
        self.moved = false;
        self.custom_start = false;
        log::debug!("New {:?} game, human plays {}", mode, player_side);
    }

    // -- accessors ----------------------------------------------------------

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn player_side(&self) -> PlayerSide {
        self.player_side
    }

    pub fn current(&self) -> &Position {
        self.ledger.current()
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    pub fn is_over(&self) -> bool {
        self.terminal.is_some()
    }

    /// The position the board should render: the reviewed ply or the live one.
    pub fn displayed_position(&self) -> &Position {
        match self.view {
            ViewState::Review(i) => self.ledger.position(i).unwrap_or(self.ledger.current()),
            _ => self.ledger.current(),
        }
    }

    pub fn legal_moves(&self) -> Vec<MoveRequest> {
        if self.is_over() {
            return Vec::new();
        }
        self.rules.legal_moves(self.current())
    }

    /// `true` when the engine, not the human, should move next.
    pub fn is_engine_turn(&self) -> bool {
        if self.mode == GameMode::Analysis || self.is_over() || self.view == ViewState::Editing {
            return false;
        }
        match self.player_side.human_side() {
            Some(human) => self.current().side_to_move() != human,
            None => false,
        }
    }

    /// A game is scored once a move has been played and either the game is
    /// rated or the human picked a single side. Games started from an
    /// edited position never are.
    pub fn is_scored(&self) -> bool {
        self.moved
            && !self.custom_start
            && (self.mode == GameMode::Rated || self.player_side != PlayerSide::Both)
    }

    pub fn status(&self) -> GameStatus {
        let current = self.current();
        let side_to_move = current.side_to_move();
        let in_check = self.rules.is_in_check(current);
        GameStatus {
            view: self.view,
            mode: self.mode,
            player_side: self.player_side,
            side_to_move,
            in_check,
            king_in_check: if in_check {
                self.rules.locate_king(current, side_to_move)
            } else {
                None
            },
            terminal: self.terminal,
            move_count: self.ledger.move_count(),
        }
    }

    /// The scored result of a finished game, from the human's side.
    ///
    /// `None` while the game runs or when the game is not scored.
    pub fn outcome(&self, opponent_rating: i32) -> Option<GameOutcome> {
        let terminal = self.terminal?;
        if !self.is_scored() {
            return None;
        }
        let kind = match terminal {
            Terminal::Draw(_) => OutcomeKind::Draw,
            Terminal::Checkmate { winner } => match self.player_side.human_side() {
                None => OutcomeKind::Win,
                Some(human) if human == winner => OutcomeKind::Win,
                Some(_) => OutcomeKind::Loss,
            },
        };
        Some(GameOutcome {
            kind,
            opponent_rating,
        })
    }

    // -- moves --------------------------------------------------------------

    /// Plays a move on behalf of the human.
    pub fn attempt_move(&mut self, request: &MoveRequest) -> Result<MoveReport, MoveRejection> {
        if self.view == ViewState::Editing {
            return Err(MoveRejection::Editing);
        }
        if let ViewState::Review(_) = self.view {
            self.view = ViewState::Live;
        }
        if self.is_over() {
            return Err(MoveRejection::GameOver);
        }
        let side = self.current().side_to_move();
        if self.mode != GameMode::Analysis && !self.player_side.permits(side) {
            return Err(MoveRejection::NotYourTurn);
        }
        self.commit(request)
    }

    /// Plays a move on behalf of the engine opponent.
    pub fn apply_engine_move(&mut self, request: &MoveRequest) -> Result<MoveReport, MoveRejection> {
        if self.view == ViewState::Editing {
            return Err(MoveRejection::Editing);
        }
        if self.is_over() {
            return Err(MoveRejection::GameOver);
        }
        if !self.is_engine_turn() {
            return Err(MoveRejection::NotEngineTurn);
        }
        if let ViewState::Review(_) = self.view {
            self.view = ViewState::Live;
        }
        self.commit(request)
    }

    fn commit(&mut self, request: &MoveRequest) -> Result<MoveReport, MoveRejection> {
        let side = self.current().side_to_move();
        let applied = self
            .rules
            .apply_move(self.current(), request)
            .map_err(MoveRejection::Illegal)?;

        let record = MoveRecord {
            from: request.from,
            to: request.to,
            promotion: request.promotion,
            san: applied.san,
            side,
        };
        self.ledger.append(applied.position, record.clone());
        self.moved = true;
        self.terminal = self.evaluate_terminal();

        let current = self.ledger.current();
        let check = self.rules.is_in_check(current);
        let king_in_check = if check {
            self.rules.locate_king(current, current.side_to_move())
        } else {
            None
        };
        let checkmate = matches!(self.terminal, Some(Terminal::Checkmate { .. }));

        log::debug!("{} played {} ({})", side, record.request(), record.san);
        if let Some(t) = self.terminal {
            log::info!("Game over: {}", t);
        }

        Ok(MoveReport {
            record,
            check,
            king_in_check,
            checkmate,
            terminal: self.terminal,
        })
    }

    /// Terminal conditions of the live position, in priority order.
    fn evaluate_terminal(&self) -> Option<Terminal> {
        let current = self.ledger.current();
        if current.only_kings_remain() {
            return Some(Terminal::Draw(DrawReason::BareKings));
        }
        if self.rules.is_checkmate(current) {
            return Some(Terminal::Checkmate {
                winner: current.side_to_move().opponent(),
            });
        }
        if self.rules.is_draw(current) {
            return Some(Terminal::Draw(DrawReason::Rules));
        }
        if self.ledger.occurrences_of_current() >= 3 {
            return Some(Terminal::Draw(DrawReason::Repetition));
        }
        None
    }

    /// Takes back the last ply.
    ///
    /// In review this only returns to the live position. Rated games allow
    /// no takebacks. Returns `true` when something changed.
    pub fn undo(&mut self) -> bool {
        match self.view {
            ViewState::Editing => false,
            ViewState::Review(_) => {
                self.view = ViewState::Live;
                true
            }
            ViewState::Live => {
                if self.mode == GameMode::Rated {
                    return false;
                }
                if !self.ledger.remove_last() {
                    return false;
                }
                self.terminal = self.evaluate_terminal();
                true
            }
        }
    }

    // -- navigation ---------------------------------------------------------

    /// Moves the view to `target`. Returns `false` for an invalid index or
    /// while editing.
    pub fn navigate(&mut self, target: NavTarget) -> bool {
        if self.view == ViewState::Editing {
            return false;
        }
        match target {
            NavTarget::Current => {
                self.view = ViewState::Live;
                true
            }
            NavTarget::Ply(i) if i < self.ledger.len() => {
                self.view = ViewState::Review(i);
                true
            }
            NavTarget::Ply(_) => false,
        }
    }

    pub fn go_first(&mut self) -> bool {
        self.navigate(NavTarget::Ply(0))
    }

    /// From live, steps onto the last ledger entry; otherwise one ply back.
    pub fn go_previous(&mut self) -> bool {
        let target = match self.view {
            ViewState::Live => self.ledger.len() - 1,
            ViewState::Review(i) => i.saturating_sub(1),
            ViewState::Editing => return false,
        };
        self.navigate(NavTarget::Ply(target))
    }

    /// One ply forward; from the last ledger entry this returns to live.
    pub fn go_next(&mut self) -> bool {
        match self.view {
            ViewState::Review(i) if i + 1 >= self.ledger.len() => {
                self.navigate(NavTarget::Current)
            }
            ViewState::Review(i) => self.navigate(NavTarget::Ply(i + 1)),
            _ => false,
        }
    }

    pub fn go_last(&mut self) -> bool {
        self.navigate(NavTarget::Current)
    }

    // -- position editing ---------------------------------------------------

    /// Opens board setup. A rated game is abandoned: the controller drops
    /// to casual play.
    pub fn enter_editing(&mut self) {
        if self.mode == GameMode::Rated {
            log::info!("Leaving rated play to edit the position");
            self.mode = GameMode::Casual;
        }
        self.view = ViewState::Editing;
    }

    /// Leaves editing without touching the game.
    pub fn cancel_editing(&mut self) {
        if self.view == ViewState::Editing {
            self.view = ViewState::Live;
        }
    }

    /// Restarts the game from a custom position.
    ///
    /// An invalid FEN is replaced by the standard starting position and the
    /// returned notice says why. The new game is casual and unscored.
    pub fn apply_custom_position(&mut self, fen: &str) -> Option<PositionNotice> {
        if self.mode == GameMode::Rated {
            self.mode = GameMode::Casual;
        }
        let (position, notice) = match self.rules.load(fen) {
            Ok(position) => (position, None),
            Err(reason) => {
                log::warn!("Rejected custom position '{}': {}", fen, reason);
                let notice = PositionNotice {
                    rejected_fen: fen.to_string(),
                    reason,
                };
                (Position::starting(), Some(notice))
            }
        };
        self.ledger.reset(Some(position));
        self.view = ViewState::Live;
        self.moved = false;
        self.custom_start = true;
        self.terminal = self.evaluate_terminal();
        notice
    }
}
