//! Position history ledger.
//!
//! Keeps the positions of a game alongside the moves that produced them:
//! `positions[0]` is the initial position and `positions[i + 1]` is the
//! result of playing `moves[i]` on `positions[i]`. Review navigation reads
//! the ledger by index; only the game controller mutates it.

use crate::rules::Position;
use crate::types::MoveRecord;

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    positions: Vec<Position>,
    moves: Vec<MoveRecord>,
}

impl HistoryLedger {
    /// Creates a ledger seeded with `initial`, or the standard start.
    pub fn new(initial: Option<Position>) -> Self {
        Self {
            positions: vec![initial.unwrap_or_default()],
            moves: Vec::new(),
        }
    }

    /// Clears both sequences and reseeds index 0.
    pub fn reset(&mut self, initial: Option<Position>) {
        self.positions.clear();
        self.moves.clear();
        self.positions.push(initial.unwrap_or_default());
    }

    /// Records `position` as the result of `record`.
    pub fn append(&mut self, position: Position, record: MoveRecord) {
        self.positions.push(position);
        self.moves.push(record);
    }

    /// Drops the last move and its resulting position.
    ///
    /// Returns `false` (and changes nothing) when only the initial position
    /// is left.
    pub fn remove_last(&mut self) -> bool {
        if self.positions.len() <= 1 {
            return false;
        }
        self.positions.pop();
        self.moves.pop();
        true
    }

    /// Number of positions, including the initial one.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// A ledger always holds its initial position.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn position(&self, index: usize) -> Option<&Position> {
        self.positions.get(index)
    }

    pub fn current(&self) -> &Position {
        &self.positions[self.positions.len() - 1]
    }

    pub fn initial(&self) -> &Position {
        &self.positions[0]
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// How many times the current position has occurred in this game.
    pub fn occurrences_of_current(&self) -> usize {
        let key = self.current().repetition_key();
        self.positions
            .iter()
            .filter(|p| p.repetition_key() == key)
            .count()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ChessRules, ShakmatyRules};
    use crate::types::{MoveRequest, Side};

    fn play(ledger: &mut HistoryLedger, m: &str) {
        let rules = ShakmatyRules;
        let req: MoveRequest = m.parse().unwrap();
        let side = ledger.current().side_to_move();
        let applied = rules.apply_move(ledger.current(), &req).unwrap();
        ledger.append(
            applied.position,
            MoveRecord {
                from: req.from,
                to: req.to,
                promotion: req.promotion,
                san: applied.san,
                side,
            },
        );
    }

    fn assert_invariant(ledger: &HistoryLedger) {
        assert_eq!(ledger.len(), ledger.move_count() + 1);
        let rules = ShakmatyRules;
        for (i, record) in ledger.moves().iter().enumerate() {
            let replay = rules
                .apply_move(&ledger.positions()[i], &record.request())
                .unwrap();
            assert_eq!(&replay.position, &ledger.positions()[i + 1]);
        }
    }

    #[test]
    fn test_new_ledger_has_initial_position() {
        let ledger = HistoryLedger::default();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.move_count(), 0);
        assert_eq!(ledger.current(), &Position::starting());
        assert_eq!(ledger.initial(), ledger.current());
    }

    #[test]
    fn test_append_keeps_invariant() {
        let mut ledger = HistoryLedger::default();
        for m in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            play(&mut ledger, m);
            assert_invariant(&ledger);
        }
        assert_eq!(ledger.move_count(), 4);
        assert_eq!(ledger.last_move().unwrap().san, "Nc6");
        assert_eq!(ledger.moves()[1].side, Side::Black);
    }

    #[test]
    fn test_remove_last_inverts_append() {
        let mut ledger = HistoryLedger::default();
        play(&mut ledger, "d2d4");
        let before = ledger.positions().to_vec();
        play(&mut ledger, "d7d5");
        assert!(ledger.remove_last());
        assert_eq!(ledger.positions(), before.as_slice());
        assert_invariant(&ledger);

        assert!(ledger.remove_last());
        assert!(!ledger.remove_last());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_reset_with_custom_position() {
        let mut ledger = HistoryLedger::default();
        play(&mut ledger, "e2e4");
        let custom = ShakmatyRules.load("8/8/4k3/8/8/4K3/8/8 w - - 0 1").unwrap();
        ledger.reset(Some(custom.clone()));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.initial(), &custom);
        ledger.reset(None);
        assert_eq!(ledger.current(), &Position::starting());
    }

    #[test]
    fn test_repetition_count() {
        let mut ledger = HistoryLedger::default();
        for m in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            play(&mut ledger, m);
        }
        assert_eq!(ledger.occurrences_of_current(), 3);
    }
}
