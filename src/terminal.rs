//! Terminal interface for checkrank.
//!
//! A thin driver over [`GameController`] and [`AppContext`]:
//!
//! - Colored board display, with the king in check highlighted
//! - Interactive move input (`e2e4`, `e7e8q`)
//! - Review navigation, undo and custom positions
//! - Engine replies and on-demand analysis
//! - Rating updates when a scored game ends
//!
//! Input is read with `tokio::io` so the background leaderboard flush
//! keeps running while the prompt waits.

use colored::Colorize;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::analysis::{self, AnalysisReport};
use crate::context::AppContext;
use crate::game::{GameController, GameMode, ViewState};
use crate::history::HistoryLedger;
use crate::rating::{self, DifficultyTier};
use crate::rules::{Position, ShakmatyRules};
use crate::types::*;

/// Piece letters of a position, indexed `[rank][file]` from a1.
fn board_squares(position: &Position) -> [[Option<char>; 8]; 8] {
    let mut squares = [[None; 8]; 8];
    let placement = position.fen().split_whitespace().next().unwrap_or("");
    for (row, rank_str) in placement.split('/').take(8).enumerate() {
        let rank = 7 - row;
        let mut file = 0usize;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
            } else if file < 8 {
                squares[rank][file] = Some(c);
                file += 1;
            }
        }
    }
    squares
}

/// Renders the board from White's perspective (rank 8 at top).
///
/// White pieces are upper-case and bold white, black pieces lower-case and
/// blue. `highlight` marks the square of a king in check.
pub fn print_board(position: &Position, highlight: Option<Square>) {
    let squares = board_squares(position);
    println!();
    println!("  +---+---+---+---+---+---+---+---+");

    for rank in (0..8u8).rev() {
        print!("{} ", rank + 1);
        for file in 0..8u8 {
            let is_dark_square = (file + rank) % 2 == 0;
            let piece_str = match squares[rank as usize][file as usize] {
                Some(c) => {
                    let symbol = c.to_string();
                    if Some(Square::new(file, rank)) == highlight {
                        symbol.on_red().bold().to_string()
                    } else if c.is_ascii_uppercase() {
                        symbol.white().bold().to_string()
                    } else {
                        symbol.blue().bold().to_string()
                    }
                }
                None if is_dark_square => "·".dimmed().to_string(),
                None => " ".to_string(),
            };
            print!("| {} ", piece_str);
        }
        println!("|");
        println!("  +---+---+---+---+---+---+---+---+");
    }
    println!("    a   b   c   d   e   f   g   h");
    println!();
}

fn side_label(side: Side) -> colored::ColoredString {
    match side {
        Side::White => t!("terminal.white").to_string().white().bold(),
        Side::Black => t!("terminal.black").to_string().blue().bold(),
    }
}

/// Prints the board for the current view plus the status lines.
pub fn print_position(controller: &GameController) {
    let status = controller.status();
    match status.view {
        ViewState::Review(i) => {
            print_board(controller.displayed_position(), None);
            println!(
                "{}",
                t!("terminal.review_status", ply = i, total = status.move_count)
                    .to_string()
                    .yellow()
            );
        }
        ViewState::Editing => {
            print_board(controller.displayed_position(), None);
            println!("{}", t!("terminal.editing_status").to_string().yellow());
        }
        ViewState::Live => {
            print_board(controller.current(), status.king_in_check);
            print!(
                "{}",
                t!(
                    "terminal.move_status",
                    num = status.move_count / 2 + 1,
                    color = side_label(status.side_to_move)
                )
            );
            if status.in_check && status.terminal.is_none() {
                print!("  {}", t!("terminal.check").to_string().red().bold());
            }
            println!();
            if let Some(last) = controller.ledger().last_move() {
                println!("{}", t!("terminal.last_move", san = &last.san));
            }
        }
    }
    println!();
}

/// Prints the rating line: rating, tier and progress to the next tier.
pub fn print_rating(ctx: &AppContext) {
    let profile = ctx.profile();
    let tier = profile.tier();
    println!(
        "{}",
        t!(
            "terminal.rating_line",
            name = profile.display_name().bold(),
            rating = profile.rating(),
            tier = tier.name.cyan()
        )
    );
    match rating::next_tier(tier) {
        Some(next) => println!(
            "{}",
            t!(
                "terminal.progress_line",
                percent = rating::progress_to_next_tier(profile.rating()),
                next = next.name
            )
        ),
        None => println!("{}", t!("terminal.top_tier")),
    }
}

/// Prints the game result when the game ends.
pub fn print_game_result(terminal: Terminal) {
    println!();
    println!("{}", "═══════════════════════════════════".yellow());
    let text = match terminal {
        Terminal::Checkmate { winner } => {
            t!("terminal.checkmate_result", color = side_label(winner)).to_string()
        }
        Terminal::Draw(DrawReason::BareKings) => t!("terminal.draw_bare_kings").to_string(),
        Terminal::Draw(DrawReason::Repetition) => t!("terminal.draw_repetition").to_string(),
        Terminal::Draw(DrawReason::Rules) => t!("terminal.draw_rules").to_string(),
    };
    println!(
        "  {}: {}",
        t!("terminal.game_over_label").to_string().yellow().bold(),
        text.green().bold()
    );
    println!("{}", "═══════════════════════════════════".yellow());
    println!();
}

/// Prints available commands in the terminal.
pub fn print_help() {
    println!("{}", t!("terminal.cmd_header").to_string().yellow().bold());
    println!("  {}          - {}", "e2e4".green(), t!("terminal.cmd_move"));
    println!("  {}         - {}", "moves".green(), t!("terminal.cmd_moves"));
    println!("  {}          - {}", "undo".green(), t!("terminal.cmd_undo"));
    println!("  {} - {}", "first/prev/next".green(), t!("terminal.cmd_review"));
    println!("  {}          - {}", "last".green(), t!("terminal.cmd_last"));
    println!("  {}       - {}", "history".green(), t!("terminal.cmd_history"));
    println!("  {}          - {}", "edit".green(), t!("terminal.cmd_edit"));
    println!("  {}     - {}", "fen <FEN>".green(), t!("terminal.cmd_fen"));
    println!("  {}        - {}", "cancel".green(), t!("terminal.cmd_cancel"));
    println!("  {}          - {}", "hint".green(), t!("terminal.cmd_hint"));
    println!("  {}            - {}", "go".green(), t!("terminal.cmd_go"));
    println!("  {}           - {}", "new".green(), t!("terminal.cmd_new"));
    println!("  {}        - {}", "rating".green(), t!("terminal.cmd_rating"));
    println!("  {}          - {}", "help".green(), t!("terminal.cmd_help"));
    println!("  {}          - {}", "quit".green(), t!("terminal.cmd_quit"));
    println!();
}

/// Prints the move history in numbered pairs.
pub fn print_history(ledger: &HistoryLedger) {
    if ledger.move_count() == 0 {
        println!("{}", t!("terminal.no_moves_yet"));
        return;
    }

    println!("{}", t!("terminal.move_history_label").to_string().yellow().bold());
    let first_side = ledger.initial().side_to_move();
    let mut number = 1;
    let mut line = String::new();
    for (i, record) in ledger.moves().iter().enumerate() {
        if i == 0 && first_side == Side::Black {
            line = format!("  {}. ...", number);
        }
        if record.side == Side::White {
            if !line.is_empty() {
                println!("{}", line);
            }
            line = format!("  {}.", number);
        }
        line.push(' ');
        line.push_str(&record.san);
        if record.side == Side::Black {
            number += 1;
        }
    }
    if !line.is_empty() {
        println!("{}", line);
    }
    println!();
}

fn print_analysis(report: &AnalysisReport) {
    let evaluation = report
        .evaluation
        .map(|e| e.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "{}",
        t!(
            "terminal.analysis_line",
            best = report.best_move.to_string().green().bold(),
            eval = evaluation,
            depth = report.depth
        )
    );
    if let Some(line) = &report.continuation {
        println!("{}", t!("terminal.continuation_line", line = line));
    }
    println!();
}

/// Per-game driver state that does not belong to the controller.
struct Session {
    /// Tier the engine plays at; fixed for the whole game.
    tier: &'static DifficultyTier,
    /// Set once the finished game has been scored.
    recorded: bool,
    /// Position on which the engine last failed; no automatic retry there.
    engine_failed_at: Option<Position>,
}

impl Session {
    fn new(ctx: &AppContext) -> Self {
        Self {
            tier: ctx.profile().tier(),
            recorded: false,
            engine_failed_at: None,
        }
    }
}

/// Lets the engine move if it is its turn. Returns `true` if it moved.
async fn engine_reply(
    ctx: &AppContext,
    controller: &mut GameController,
    session: &mut Session,
) -> bool {
    if !controller.is_engine_turn() || controller.view() != ViewState::Live {
        return false;
    }
    if session.engine_failed_at.as_ref() == Some(controller.current()) {
        return false;
    }

    let depth = rating::search_depth(controller.mode() == GameMode::Rated, session.tier);
    println!("{}", t!("terminal.engine_thinking").to_string().dimmed());
    let report = match ctx.analysis().request_analysis(controller.current(), depth).await {
        Ok(report) => report,
        Err(e) => {
            println!(
                "{}: {}",
                t!("terminal.engine_unavailable").to_string().red().bold(),
                e
            );
            println!("{}", t!("terminal.engine_retry_hint", go = "go".green()));
            session.engine_failed_at = Some(controller.current().clone());
            return false;
        }
    };

    let reply = analysis::plan_reply(controller, &report, session.tier, &mut rand::thread_rng());
    let Some(reply) = reply else {
        return false;
    };
    match controller.apply_engine_move(&reply) {
        Ok(report) => {
            println!(
                "{}",
                t!("terminal.engine_played", san = report.record.san.green().bold())
            );
            true
        }
        Err(e) => {
            log::warn!("Engine move {} rejected: {}", reply, e);
            session.engine_failed_at = Some(controller.current().clone());
            false
        }
    }
}

/// Scores a finished game once, printing the rating change.
async fn record_if_finished(
    ctx: &mut AppContext,
    controller: &GameController,
    session: &mut Session,
) {
    let Some(terminal) = controller.terminal() else {
        return;
    };
    if session.recorded {
        return;
    }
    session.recorded = true;
    print_game_result(terminal);

    let Some(outcome) = controller.outcome(session.tier.rating) else {
        return;
    };
    let change = ctx.record_game(outcome).await;
    let delta = if change.delta >= 0 {
        format!("+{}", change.delta).green().bold()
    } else {
        change.delta.to_string().red().bold()
    };
    println!(
        "{}",
        t!(
            "terminal.rating_change",
            old = change.old_rating,
            new = change.new_rating,
            delta = delta,
            tier = change.tier.name.cyan()
        )
    );
    println!();
}

/// Takes back moves until it is the human's turn again.
fn undo_to_human_turn(controller: &mut GameController) -> bool {
    if controller.view() != ViewState::Live {
        return controller.undo();
    }
    if !controller.undo() {
        return false;
    }
    while controller.is_engine_turn() && controller.undo() {}
    true
}

/// Runs the interactive terminal game against the engine.
///
/// The game continues until the player quits; a finished game can be
/// reviewed or replaced with `new`.
pub async fn run_terminal_game(
    ctx: &mut AppContext,
    mode: GameMode,
    side: PlayerSide,
) -> io::Result<()> {
    println!();
    println!("{}", "╔═══════════════════════════════════════╗".cyan());
    println!("{}", format!("║  {:<37}║", t!("terminal.banner_title")).cyan());
    println!("{}", format!("║  {:<37}║", t!("terminal.banner_subtitle")).cyan());
    println!("{}", "╚═══════════════════════════════════════╝".cyan());
    println!();

    let mut controller = GameController::new(Box::new(ShakmatyRules), mode, side);
    let mut session = Session::new(ctx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_rating(ctx);
    println!("{}", t!("terminal.game_setup", mode = format!("{:?}", mode), side = side));
    print_help();
    print_position(&controller);

    loop {
        if engine_reply(ctx, &mut controller, &mut session).await {
            print_position(&controller);
        }
        record_if_finished(ctx, &controller, &mut session).await;

        let prompt = match controller.view() {
            ViewState::Live => side_label(controller.current().side_to_move()),
            ViewState::Review(_) => t!("terminal.review_prompt").to_string().yellow().bold(),
            ViewState::Editing => t!("terminal.edit_prompt").to_string().yellow().bold(),
        };
        print!("{} > ", prompt);
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (command, argument) = match input.split_once(' ') {
            Some((command, rest)) => (command.to_lowercase(), rest.trim()),
            None => (input.to_lowercase(), ""),
        };

        match command.as_str() {
            "quit" | "exit" | "q" => {
                println!("{}", t!("terminal.goodbye"));
                break;
            }
            "help" | "h" | "?" => print_help(),
            "board" | "b" => print_position(&controller),
            "rating" => print_rating(ctx),
            "history" => print_history(controller.ledger()),
            "moves" | "m" => {
                let moves = controller.legal_moves();
                println!(
                    "{} {}",
                    t!("terminal.legal_moves_header").to_string().yellow().bold(),
                    t!("terminal.moves_count", count = moves.len())
                );
                for (i, mv) in moves.iter().enumerate() {
                    if i > 0 && i % 8 == 0 {
                        println!();
                    }
                    print!("  {}", mv.to_string().green());
                }
                println!();
                println!();
            }
            "undo" | "u" => {
                if undo_to_human_turn(&mut controller) {
                    session.engine_failed_at = None;
                    print_position(&controller);
                } else {
                    println!("{}", t!("terminal.nothing_to_undo"));
                }
            }
            "first" | "prev" | "p" | "next" | "n" | "last" => {
                let moved = match command.as_str() {
                    "first" => controller.go_first(),
                    "prev" | "p" => controller.go_previous(),
                    "next" | "n" => controller.go_next(),
                    _ => controller.go_last(),
                };
                if moved {
                    print_position(&controller);
                } else {
                    println!("{}", t!("terminal.nav_unavailable"));
                }
            }
            "edit" => {
                controller.enter_editing();
                println!("{}", t!("terminal.editing_hint", fen = "fen".green(), cancel = "cancel".green()));
            }
            "cancel" => {
                controller.cancel_editing();
                print_position(&controller);
            }
            "fen" => {
                if argument.is_empty() {
                    println!("{}", controller.displayed_position());
                    continue;
                }
                if let Some(notice) = controller.apply_custom_position(argument) {
                    println!(
                        "{}: {}",
                        t!("terminal.invalid_position").to_string().red().bold(),
                        notice.reason
                    );
                }
                session = Session::new(ctx);
                print_position(&controller);
            }
            "new" => {
                controller.new_game(mode, side);
                session = Session::new(ctx);
                print_position(&controller);
            }
            "go" => {
                session.engine_failed_at = None;
                if !controller.is_engine_turn() {
                    println!("{}", t!("terminal.not_engine_turn"));
                }
            }
            "hint" | "analyse" | "analyze" => {
                let position = controller.displayed_position().clone();
                match ctx.analysis().request_analysis(&position, rating::MAX_DEPTH).await {
                    Ok(report) => print_analysis(&report),
                    Err(e) => println!(
                        "{}: {}",
                        t!("terminal.engine_unavailable").to_string().red().bold(),
                        e
                    ),
                }
            }
            _ => {
                let Some(request) = parse_move_input(input) else {
                    println!(
                        "{}",
                        t!("terminal.unknown_cmd_hint", cmd = input, help = "help".green())
                    );
                    continue;
                };
                match controller.attempt_move(&request) {
                    Ok(_) => print_position(&controller),
                    Err(e) => {
                        println!("{}: {}", t!("terminal.illegal_move").to_string().red().bold(), e);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Parses a move input string like "e2e4" or "e7e8Q".
///
/// Accepts formats:
/// - `e2e4`: normal move
/// - `e7e8Q`: promotion (Q, R, B, N, either case)
/// - `e2 e4`: with space separator
fn parse_move_input(input: &str) -> Option<MoveRequest> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    compact.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_normal() {
        let m = parse_move_input("e2e4").unwrap();
        assert_eq!(m.from.to_algebraic(), "e2");
        assert_eq!(m.to.to_algebraic(), "e4");
        assert_eq!(m.promotion, None);
    }

    #[test]
    fn test_parse_move_promotion() {
        let m = parse_move_input("e7e8Q").unwrap();
        assert_eq!(m.to.to_algebraic(), "e8");
        assert_eq!(m.promotion, Some(Promotion::Queen));
    }

    #[test]
    fn test_parse_move_with_space() {
        let m = parse_move_input("e2 e4").unwrap();
        assert_eq!(m.from.to_algebraic(), "e2");
        assert_eq!(m.to.to_algebraic(), "e4");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_move_input("abc").is_none());
        assert!(parse_move_input("z9z9").is_none());
        assert!(parse_move_input("e2e4x").is_none());
    }

    #[test]
    fn test_board_squares_from_fen() {
        let squares = board_squares(&Position::starting());
        assert_eq!(squares[0][4], Some('K'));
        assert_eq!(squares[7][3], Some('q'));
        assert_eq!(squares[1][0], Some('P'));
        assert_eq!(squares[3][3], None);
    }

    #[test]
    fn test_undo_returns_to_human_turn() {
        let mut controller =
            GameController::new(Box::new(ShakmatyRules), GameMode::Casual, PlayerSide::White);
        controller.attempt_move(&"e2e4".parse().unwrap()).unwrap();
        controller.apply_engine_move(&"e7e5".parse().unwrap()).unwrap();
        controller.attempt_move(&"g1f3".parse().unwrap()).unwrap();
        assert!(controller.is_engine_turn());

        assert!(undo_to_human_turn(&mut controller));
        assert_eq!(controller.ledger().move_count(), 2);
        assert!(!controller.is_engine_turn());

        assert!(undo_to_human_turn(&mut controller));
        assert_eq!(controller.ledger().move_count(), 0);
        assert!(!undo_to_human_turn(&mut controller));
    }

    #[test]
    fn test_rated_undo_is_refused() {
        let mut controller =
            GameController::new(Box::new(ShakmatyRules), GameMode::Rated, PlayerSide::White);
        controller.attempt_move(&"e2e4".parse().unwrap()).unwrap();
        controller.apply_engine_move(&"e7e5".parse().unwrap()).unwrap();
        assert!(!undo_to_human_turn(&mut controller));
        assert_eq!(controller.ledger().move_count(), 2);
    }
}
