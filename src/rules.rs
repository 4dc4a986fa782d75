//! Chess rules capability.
//!
//! The controller never computes legality itself: it hands positions and
//! move requests to a [`ChessRules`] implementation. The shipped one,
//! [`ShakmatyRules`], delegates to the `shakmaty` crate.
//!
//! Positions travel through the crate as normalized FEN text
//! ([`Position`]), which keeps them cheap to compare, persist and send to
//! the analysis service.

use crate::error::PositionError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::Uci;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position as _};
use std::fmt;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An immutable board state in six-field FEN form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    /// The standard starting position.
    pub fn starting() -> Self {
        Position(STARTING_FEN.to_string())
    }

    pub fn fen(&self) -> &str {
        &self.0
    }

    /// The side to move, read from the second FEN field.
    pub fn side_to_move(&self) -> Side {
        self.0
            .split_whitespace()
            .nth(1)
            .and_then(Side::from_fen_field)
            .unwrap_or(Side::White)
    }

    /// Returns `true` when the board holds exactly the two kings.
    pub fn only_kings_remain(&self) -> bool {
        let placement = self.0.split_whitespace().next().unwrap_or("");
        let mut pieces = placement.chars().filter(|c| c.is_ascii_alphabetic());
        matches!(
            (pieces.next(), pieces.next(), pieces.next()),
            (Some('k'), Some('K'), None) | (Some('K'), Some('k'), None)
        )
    }

    /// Placement, side, castling and en-passant fields. Two positions with
    /// the same key are the same position for repetition purposes.
    pub fn repetition_key(&self) -> String {
        self.0
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::starting()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// FEN structure validation
// ---------------------------------------------------------------------------

/// Checks the textual structure of a FEN record.
///
/// This runs before the rules engine sees the text so that the player gets
/// a precise message for the common editing mistakes (missing king, wrong
/// rank width and so on).
pub fn validate_fen(fen: &str) -> Result<(), PositionError> {
    let invalid = |msg: String| Err(PositionError::InvalidFen(msg));

    let parts: Vec<&str> = fen.split(' ').collect();
    if parts.len() != 6 {
        return invalid("expected 6 space-separated fields".into());
    }

    let placement = parts[0];
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return invalid("expected 8 ranks separated by '/'".into());
    }
    for rank in &ranks {
        let mut files = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => files += c.to_digit(10).unwrap_or(0),
                'p' | 'r' | 'n' | 'b' | 'q' | 'k' | 'P' | 'R' | 'N' | 'B' | 'Q' | 'K' => files += 1,
                other => return invalid(format!("invalid character '{}' in placement", other)),
            }
        }
        if files != 8 {
            return invalid(format!("rank '{}' does not cover 8 files", rank));
        }
    }
    if !placement.contains('K') {
        return invalid("white king is missing".into());
    }
    if !placement.contains('k') {
        return invalid("black king is missing".into());
    }

    if Side::from_fen_field(parts[1]).is_none() {
        return invalid("side to move must be 'w' or 'b'".into());
    }

    let castling = parts[2];
    if castling != "-"
        && (castling.is_empty() || !castling.chars().all(|c| matches!(c, 'K' | 'Q' | 'k' | 'q')))
    {
        return invalid("castling rights must be '-' or a combination of KQkq".into());
    }

    let ep = parts[3].as_bytes();
    let ep_ok = parts[3] == "-"
        || (ep.len() == 2 && (b'a'..=b'h').contains(&ep[0]) && (ep[1] == b'3' || ep[1] == b'6'));
    if !ep_ok {
        return invalid("en passant must be '-' or a square on rank 3 or 6".into());
    }

    for (name, field) in [("halfmove clock", parts[4]), ("fullmove number", parts[5])] {
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
            return invalid(format!("{} must be a non-negative integer", name));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Rules capability
// ---------------------------------------------------------------------------

/// Result of applying a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub position: Position,
    pub san: String,
}

/// Legal-move generation and FEN handling.
pub trait ChessRules: Send + Sync {
    /// Parses and normalizes a FEN record.
    fn load(&self, fen: &str) -> Result<Position, PositionError>;

    /// Applies `mv` to `position`, returning the resulting position and the
    /// move in SAN. Illegal moves yield `Err` with a reason.
    fn apply_move(&self, position: &Position, mv: &MoveRequest) -> Result<AppliedMove, String>;

    fn legal_moves(&self, position: &Position) -> Vec<MoveRequest>;

    fn is_in_check(&self, position: &Position) -> bool;

    fn is_checkmate(&self, position: &Position) -> bool;

    /// Stalemate, insufficient material or the fifty-move rule.
    fn is_draw(&self, position: &Position) -> bool;

    fn locate_king(&self, position: &Position, side: Side) -> Option<Square>;
}

/// [`ChessRules`] backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    fn to_chess(position: &Position) -> Option<Chess> {
        position
            .fen()
            .parse::<Fen>()
            .ok()?
            .into_position::<Chess>(CastlingMode::Standard)
            .ok()
    }

    fn to_position(chess: &Chess) -> Position {
        Position(Fen::from_position(chess.clone(), EnPassantMode::Legal).to_string())
    }
}

impl ChessRules for ShakmatyRules {
    fn load(&self, fen: &str) -> Result<Position, PositionError> {
        let fen = fen.trim();
        validate_fen(fen)?;
        let parsed: Fen = fen
            .parse()
            .map_err(|e| PositionError::InvalidFen(format!("{}", e)))?;
        let chess: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| PositionError::InvalidFen(format!("{}", e)))?;
        Ok(Self::to_position(&chess))
    }

    fn apply_move(&self, position: &Position, mv: &MoveRequest) -> Result<AppliedMove, String> {
        let chess = Self::to_chess(position)
            .ok_or_else(|| format!("corrupt position '{}'", position))?;
        let uci: Uci = mv
            .to_string()
            .parse()
            .map_err(|_| format!("'{}' is not a valid move", mv))?;
        let m = uci
            .to_move(&chess)
            .map_err(|_| format!("{} is not legal here", mv))?;

        let san = San::from_move(&chess, &m).to_string();
        let mut next = chess.clone();
        next.play_unchecked(&m);

        // SAN suffix for check and mate, as the ledger displays it.
        let suffix = if next.is_checkmate() {
            "#"
        } else if next.is_check() {
            "+"
        } else {
            ""
        };

        Ok(AppliedMove {
            position: Self::to_position(&next),
            san: format!("{}{}", san, suffix),
        })
    }

    fn legal_moves(&self, position: &Position) -> Vec<MoveRequest> {
        let Some(chess) = Self::to_chess(position) else {
            return Vec::new();
        };
        chess
            .legal_moves()
            .iter()
            .filter_map(|m| m.to_uci(CastlingMode::Standard).to_string().parse().ok())
            .collect()
    }

    fn is_in_check(&self, position: &Position) -> bool {
        Self::to_chess(position).is_some_and(|c| c.is_check())
    }

    fn is_checkmate(&self, position: &Position) -> bool {
        Self::to_chess(position).is_some_and(|c| c.is_checkmate())
    }

    fn is_draw(&self, position: &Position) -> bool {
        Self::to_chess(position).is_some_and(|c| {
            c.is_stalemate() || c.is_insufficient_material() || c.halfmoves() >= 100
        })
    }

    fn locate_king(&self, position: &Position, side: Side) -> Option<Square> {
        let chess = Self::to_chess(position)?;
        let color = match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        };
        let sq = chess.board().king_of(color)?;
        Square::from_algebraic(&sq.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> MoveRequest {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_fen_accepts_start() {
        assert!(validate_fen(STARTING_FEN).is_ok());
    }

    #[test]
    fn test_validate_fen_rejects_structural_errors() {
        let cases = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1",
            "rnbqkbnr/ppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQ1BNR w kq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KX - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e4 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - a 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX w KQkq - 0 1",
        ];
        for fen in cases {
            assert!(validate_fen(fen).is_err(), "accepted: {}", fen);
        }
    }

    #[test]
    fn test_load_normalizes() {
        let rules = ShakmatyRules;
        let pos = rules.load(STARTING_FEN).unwrap();
        assert_eq!(pos, Position::starting());
        assert!(rules.load("not a fen").is_err());
    }

    #[test]
    fn test_apply_move_and_san() {
        let rules = ShakmatyRules;
        let start = Position::starting();
        let applied = rules.apply_move(&start, &mv("e2e4")).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.position.side_to_move(), Side::Black);
        assert!(rules.apply_move(&start, &mv("e2e5")).is_err());
    }

    #[test]
    fn test_exchange_scenario() {
        let rules = ShakmatyRules;
        let p1 = rules.apply_move(&Position::starting(), &mv("e2e4")).unwrap();
        let p2 = rules.apply_move(&p1.position, &mv("f7f5")).unwrap();
        let p3 = rules.apply_move(&p2.position, &mv("e4f5")).unwrap();
        assert_eq!(p3.san, "exf5");
        assert!(!rules.is_in_check(&p3.position));
    }

    #[test]
    fn test_checkmate_and_king_location() {
        let rules = ShakmatyRules;
        let mut pos = Position::starting();
        for m in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            pos = rules.apply_move(&pos, &mv(m)).unwrap().position;
        }
        assert!(rules.is_checkmate(&pos));
        assert!(rules.is_in_check(&pos));
        assert_eq!(
            rules.locate_king(&pos, Side::White),
            Square::from_algebraic("e1")
        );
        assert!(rules.legal_moves(&pos).is_empty());
    }

    #[test]
    fn test_only_kings_remain() {
        let rules = ShakmatyRules;
        let bare = rules.load("8/8/4k3/8/8/4K3/8/8 b - - 0 1").unwrap();
        assert!(bare.only_kings_remain());
        assert!(rules.is_draw(&bare));
        assert!(!Position::starting().only_kings_remain());
    }

    #[test]
    fn test_legal_moves_from_start() {
        let moves = ShakmatyRules.legal_moves(&Position::starting());
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&mv("g1f3")));
    }

    #[test]
    fn test_promotion_san() {
        let rules = ShakmatyRules;
        let pos = rules.load("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let applied = rules.apply_move(&pos, &mv("a7a8q")).unwrap();
        assert_eq!(applied.san, "a8=Q");
        // Missing promotion piece is not a legal move.
        assert!(rules.apply_move(&pos, &mv("a7a8")).is_err());
    }
}
