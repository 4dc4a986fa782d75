//! Core types shared by the checkrank modules.
//!
//! Squares, sides, move requests and move records, game outcomes and
//! engine evaluations. Board state itself lives in [`crate::rules::Position`]
//! as FEN text; nothing here knows how to play chess.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two sides of a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Returns the opposite side.
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Parses the side-to-move field of a FEN record (`w` or `b`).
    pub fn from_fen_field(field: &str) -> Option<Side> {
        match field {
            "w" => Some(Side::White),
            "b" => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// Which side(s) the human controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSide {
    White,
    Black,
    /// The human moves both sides (self-play, no engine opponent).
    Both,
}

impl PlayerSide {
    /// Returns `true` if the human may move pieces of `side`.
    pub fn permits(self, side: Side) -> bool {
        match self {
            PlayerSide::Both => true,
            PlayerSide::White => side == Side::White,
            PlayerSide::Black => side == Side::Black,
        }
    }

    /// The single side controlled by the human, if there is one.
    pub fn human_side(self) -> Option<Side> {
        match self {
            PlayerSide::White => Some(Side::White),
            PlayerSide::Black => Some(Side::Black),
            PlayerSide::Both => None,
        }
    }
}

impl From<Side> for PlayerSide {
    fn from(side: Side) -> Self {
        match side {
            Side::White => PlayerSide::White,
            Side::Black => PlayerSide::Black,
        }
    }
}

impl FromStr for PlayerSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "white" | "w" => Ok(PlayerSide::White),
            "black" | "b" => Ok(PlayerSide::Black),
            "both" => Ok(PlayerSide::Both),
            other => Err(format!("unknown side '{}' (expected white, black or both)", other)),
        }
    }
}

impl fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSide::White => write!(f, "white"),
            PlayerSide::Black => write!(f, "black"),
            PlayerSide::Both => write!(f, "both"),
        }
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

/// A square on the chessboard using 0-based file and rank indices.
///
/// - `file`: 0 (a) to 7 (h)
/// - `rank`: 0 (rank 1) to 7 (rank 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    /// Creates a square from 0-based file and rank.
    pub fn new(file: u8, rank: u8) -> Self {
        debug_assert!(file < 8 && rank < 8, "Square out of bounds");
        Self { file, rank }
    }

    /// Parses algebraic notation (e.g. "e4"). Returns `None` for invalid input.
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        if file < 8 && rank < 8 {
            Some(Square { file, rank })
        } else {
            None
        }
    }

    /// Converts the square to algebraic notation (e.g. "e4").
    pub fn to_algebraic(self) -> String {
        format!("{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Piece a pawn may promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Promotion {
    /// Parses a promotion letter, case-insensitive (`q`, `r`, `b`, `n`).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Promotion::Queen),
            'r' => Some(Promotion::Rook),
            'b' => Some(Promotion::Bishop),
            'n' => Some(Promotion::Knight),
            _ => None,
        }
    }

    /// Lowercase letter used in square-pair notation.
    pub fn to_char(self) -> char {
        match self {
            Promotion::Queen => 'q',
            Promotion::Rook => 'r',
            Promotion::Bishop => 'b',
            Promotion::Knight => 'n',
        }
    }
}

/// A proposed move in compact square-pair notation (`e2e4`, `e7e8q`).
///
/// This is what players and the analysis service hand to the game
/// controller; whether it is legal is decided by the chess rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Promotion>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }
}

impl FromStr for MoveRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(format!("'{}' is not in square-pair notation", s));
        }
        let from = Square::from_algebraic(&s[0..2])
            .ok_or_else(|| format!("invalid origin square in '{}'", s))?;
        let to = Square::from_algebraic(&s[2..4])
            .ok_or_else(|| format!("invalid destination square in '{}'", s))?;
        let promotion = match s[4..].chars().next() {
            Some(c) => Some(
                Promotion::from_char(c)
                    .ok_or_else(|| format!("invalid promotion piece in '{}'", s))?,
            ),
            None => None,
        };
        Ok(MoveRequest {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.to_char())?;
        }
        Ok(())
    }
}

/// A single executed move, as stored in the history ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Promotion>,
    /// Standard algebraic notation of the move (e.g. "exf5", "Qxf7#").
    pub san: String,
    /// The side that made the move.
    pub side: Side,
}

impl MoveRecord {
    /// The move in square-pair notation.
    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a finished game from the human player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Win,
    Loss,
    Draw,
}

impl OutcomeKind {
    /// Score used by the rating formula: 1 for a win, 0.5 for a draw, 0 for a loss.
    pub fn actual_score(self) -> f64 {
        match self {
            OutcomeKind::Win => 1.0,
            OutcomeKind::Draw => 0.5,
            OutcomeKind::Loss => 0.0,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Win => write!(f, "win"),
            OutcomeKind::Loss => write!(f, "loss"),
            OutcomeKind::Draw => write!(f, "draw"),
        }
    }
}

/// A terminated, scored game: the outcome plus the opponent's rating at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub kind: OutcomeKind,
    pub opponent_rating: i32,
}

/// Why a game ended in a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    /// Only the two kings are left on the board.
    BareKings,
    /// The same position occurred three times in the ledger.
    Repetition,
    /// Stalemate, insufficient material or the fifty-move rule.
    Rules,
}

/// A terminal condition detected after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: Side },
    Draw(DrawReason),
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            Terminal::Draw(DrawReason::BareKings) => write!(f, "draw, only kings remain"),
            Terminal::Draw(DrawReason::Repetition) => write!(f, "draw by repetition"),
            Terminal::Draw(DrawReason::Rules) => write!(f, "draw"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine evaluation
// ---------------------------------------------------------------------------

/// Engine evaluation of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Advantage in pawns, positive for White.
    Score(f64),
    /// Forced mate in N moves; negative when Black mates.
    MateIn(i32),
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Score(v) if *v > 0.0 => write!(f, "+{:.2}", v),
            Evaluation::Score(v) => write!(f, "{:.2}", v),
            Evaluation::MateIn(n) => write!(f, "#{}", n.abs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_request() {
        let m: MoveRequest = "e2e4".parse().unwrap();
        assert_eq!(m.from, Square::new(4, 1));
        assert_eq!(m.to, Square::new(4, 3));
        assert_eq!(m.promotion, None);

        let p: MoveRequest = "a7a8N".parse().unwrap();
        assert_eq!(p.promotion, Some(Promotion::Knight));
        assert_eq!(p.to_string(), "a7a8n");
    }

    #[test]
    fn test_parse_move_request_invalid() {
        assert!("e2".parse::<MoveRequest>().is_err());
        assert!("z9e4".parse::<MoveRequest>().is_err());
        assert!("e7e8k".parse::<MoveRequest>().is_err());
        assert!("e2e4e5".parse::<MoveRequest>().is_err());
    }

    #[test]
    fn test_player_side_permits() {
        assert!(PlayerSide::Both.permits(Side::Black));
        assert!(PlayerSide::White.permits(Side::White));
        assert!(!PlayerSide::White.permits(Side::Black));
        assert_eq!(PlayerSide::Both.human_side(), None);
    }

    #[test]
    fn test_evaluation_display() {
        assert_eq!(Evaluation::Score(0.5).to_string(), "+0.50");
        assert_eq!(Evaluation::Score(-1.25).to_string(), "-1.25");
        assert_eq!(Evaluation::MateIn(-3).to_string(), "#3");
    }
}
