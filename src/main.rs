//! # checkrank: Chess Play and Rating
//!
//! checkrank plays chess in the terminal against a web analysis engine,
//! keeps a local player profile with an Elo-style rating, and publishes
//! the player's standing to a shared leaderboard.
//!
//! ## Features
//!
//! - **Game controller**: legal move handling through `shakmaty`, undo,
//!   review navigation over the position history, custom positions, and
//!   terminal detection (checkmate, rule draws, repetition, bare kings).
//!
//! - **Rating ladder**: 25 difficulty tiers; rated games pick the engine's
//!   depth and error rate from the player's rating.
//!
//! - **Leaderboard outbox**: finished games are queued locally and
//!   delivered in order, surviving restarts and network failures.
//!
//! - **Leaderboard server**: a small REST server with Swagger docs at
//!   `/swagger-ui/`, usable as the remote leaderboard.
//!
//! ## Usage
//!
//! ```bash
//! # Play a rated game as White
//! checkrank play
//!
//! # Analyse freely, moving for both sides
//! checkrank play --mode analysis --side both
//!
//! # Run the leaderboard server (default: http://0.0.0.0:8080)
//! checkrank serve --port 8080
//!
//! # Show the leaderboard sorted by wins
//! checkrank leaderboard --sort wins
//! ```

#[macro_use]
extern crate rust_i18n;

i18n!("locales", fallback = "en");

pub mod analysis;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod game;
pub mod history;
pub mod i18n;
pub mod leaderboard;
pub mod profile;
pub mod rating;
pub mod rules;
pub mod storage;
pub mod terminal;
pub mod types;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::Rng;
use std::path::PathBuf;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{ApiDoc, AppState};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::game::GameMode;
use crate::leaderboard::RankBy;
use crate::types::PlayerSide;

/// checkrank: chess against an engine, with a rating and a leaderboard.
#[derive(Parser, Debug)]
#[command(name = "checkrank")]
#[command(about = "Chess play and rating with a shared leaderboard")]
#[command(version)]
struct Cli {
    /// Directory of the local store (overrides CHECKRANK_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Leaderboard endpoint (overrides CHECKRANK_LEADERBOARD_URL).
    #[arg(long, global = true)]
    leaderboard_url: Option<String>,

    /// Analysis endpoint (overrides CHECKRANK_ANALYSIS_URL).
    #[arg(long, global = true)]
    analysis_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the leaderboard server with Swagger UI.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Play a game in the terminal.
    Play {
        /// Game mode: rated, casual or analysis.
        #[arg(short, long, default_value = "rated")]
        mode: String,

        /// Side to play: white, black, both or random.
        #[arg(short, long, default_value = "white")]
        side: String,
    },

    /// Deliver queued leaderboard updates now.
    Sync,

    /// Show the leaderboard.
    Leaderboard {
        /// Sort key: elo, wins or games.
        #[arg(short, long, default_value = "elo")]
        sort: String,

        /// Number of rows to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Inspect or manage the local player profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Show rating, tier and recent games.
    Show,
    /// Change the display name.
    Rename { name: String },
    /// Write the profile to a JSON file.
    Export { path: PathBuf },
    /// Replace the profile with a previously exported file.
    Import { path: PathBuf },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let locale = i18n::detect_system_locale();
    rust_i18n::set_locale(&locale);

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(url) = cli.leaderboard_url {
        config.leaderboard_url = url;
    }
    if let Some(url) = cli.analysis_url {
        config.analysis_url = url;
    }

    match cli.command {
        Commands::Serve { port, host } => run_server(&host, port, config).await,
        Commands::Play { mode, side } => {
            let mode: GameMode = mode.parse().map_err(invalid_input)?;
            let side = if side.eq_ignore_ascii_case("random") {
                if rand::thread_rng().gen_bool(0.5) {
                    PlayerSide::White
                } else {
                    PlayerSide::Black
                }
            } else {
                side.parse().map_err(invalid_input)?
            };

            let mut ctx = AppContext::new(config)?;
            ctx.start_background_flush().await;
            let result = terminal::run_terminal_game(&mut ctx, mode, side).await;
            ctx.shutdown();
            result
        }
        Commands::Sync => {
            let ctx = AppContext::new(config)?;
            let summary = ctx.sync().flush().await;
            println!(
                "{}",
                t!(
                    "cli.sync_summary",
                    delivered = summary.delivered,
                    abandoned = summary.abandoned,
                    pending = summary.pending
                )
            );
            Ok(())
        }
        Commands::Leaderboard { sort, limit } => {
            let key: RankBy = sort.parse().map_err(invalid_input)?;
            let ctx = AppContext::new(config)?;
            show_leaderboard(&ctx, key, limit).await
        }
        Commands::Profile { action } => {
            let mut ctx = AppContext::new(config)?;
            run_profile_command(&mut ctx, action).await
        }
    }
}

fn invalid_input(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, message)
}

async fn show_leaderboard(ctx: &AppContext, key: RankBy, limit: usize) -> std::io::Result<()> {
    let data = ctx.sync().remote().fetch().await.map_err(std::io::Error::other)?;
    if data.players.is_empty() {
        println!("{}", t!("cli.leaderboard_empty"));
        return Ok(());
    }

    println!(
        "{}",
        t!("cli.leaderboard_header", updated = &data.last_updated)
            .to_string()
            .yellow()
            .bold()
    );
    let own_id = ctx.profile().id().to_string();
    for (i, player) in leaderboard::ranked(&data.players, key)
        .iter()
        .take(limit)
        .enumerate()
    {
        let row = format!(
            "{:>3}. {:<32} {:>5}  {:>4}W {:>4}L {:>4}D  {:>5}",
            i + 1,
            player.username,
            player.elo,
            player.wins,
            player.losses,
            player.draws,
            player.games_played
        );
        if player.id == own_id {
            println!("{}", row.green().bold());
        } else {
            println!("{}", row);
        }
    }
    Ok(())
}

async fn run_profile_command(ctx: &mut AppContext, action: ProfileCommand) -> std::io::Result<()> {
    match action {
        ProfileCommand::Show => {
            terminal::print_rating(ctx);
            let profile = ctx.profile();
            let stats = profile.stats();
            println!(
                "{}",
                t!(
                    "cli.profile_stats",
                    games = stats.games_played,
                    wins = stats.wins,
                    losses = stats.losses,
                    draws = stats.draws,
                    rate = stats.win_rate()
                )
            );
            for entry in profile.log().iter().rev().take(10) {
                println!(
                    "  {}  {:<4}  {:+}  ({})",
                    storage::iso8601(entry.date),
                    entry.result,
                    entry.rating_change,
                    entry.opponent_rating
                );
            }
            let pending = ctx.sync().pending();
            if pending > 0 {
                println!("{}", t!("cli.pending_updates", count = pending));
            }
            Ok(())
        }
        ProfileCommand::Rename { name } => {
            ctx.rename_player(&name)
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
            println!("{}", t!("cli.renamed", name = ctx.profile().display_name()));
            Ok(())
        }
        ProfileCommand::Export { path } => {
            ctx.export_profile(&path).map_err(std::io::Error::other)?;
            println!("{}", t!("cli.exported", path = path.display()));
            Ok(())
        }
        ProfileCommand::Import { path } => {
            ctx.import_profile(&path).await.map_err(std::io::Error::other)?;
            println!(
                "{}",
                t!("cli.imported", rating = ctx.profile().rating())
            );
            Ok(())
        }
    }
}

/// Starts the leaderboard server with its API routes and Swagger UI.
async fn run_server(host: &str, port: u16, config: AppConfig) -> std::io::Result<()> {
    let openapi = ApiDoc::openapi();
    let state = web::Data::new(AppState::open(&config.data_dir)?);

    log::info!("Starting checkrank leaderboard server on {}:{}", host, port);
    log::info!("Leaderboard file: {}", config.data_dir.join("leaderboard.json").display());
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);
    log::info!("API base URL: http://{}:{}/api", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host, port))?
    .run()
    .await
}
