//! Reference leaderboard server.
//!
//! Implements the contract the leaderboard synchronizer talks to:
//!
//! | Method | Path               | Description                              |
//! |--------|--------------------|------------------------------------------|
//! | GET    | `/api/leaderboard` | Whole leaderboard                        |
//! | POST   | `/api/leaderboard` | Upsert one player (`{"player": {...}}`)  |
//!
//! The board is kept in memory and written through to
//! `<data_dir>/leaderboard.json` after every accepted update. The API is
//! documented with OpenAPI via `utoipa`; Swagger UI is served at
//! `/swagger-ui/`.

use actix_web::{HttpRequest, HttpResponse, Responder, error, web};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use utoipa::{OpenApi, ToSchema};

use crate::i18n;
use crate::leaderboard::LeaderboardData;
use crate::profile::{DEFAULT_PLAYER_NAME, PlayerRecord};
use crate::storage::{self, LocalStore};

/// Store key of the persisted leaderboard.
const LEADERBOARD_KEY: &str = "leaderboard";

/// Shared server state.
pub struct AppState {
    store: LocalStore,
    board: Mutex<LeaderboardData>,
}

impl AppState {
    /// Opens the board persisted under `data_dir`, or an empty one.
    pub fn open(data_dir: impl AsRef<Path>) -> io::Result<Self> {
        let store = LocalStore::open(data_dir)?;
        let mut board: LeaderboardData = store.load_json_or_default(LEADERBOARD_KEY);
        if board.last_updated.is_empty() {
            board.last_updated = storage::iso8601(storage::unix_timestamp());
        }
        log::info!("Leaderboard loaded with {} player(s)", board.players.len());
        Ok(Self {
            store,
            board: Mutex::new(board),
        })
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Fields a client may send for a player. Missing fields keep their stored
/// value (or a default for a new player).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSubmission {
    pub id: Option<String>,
    pub username: Option<String>,
    pub elo: Option<i32>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
    pub draws: Option<u32>,
    pub games_played: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitPlayerRequest {
    pub player: Option<PlayerSubmission>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitPlayerResponse {
    pub success: bool,
    /// Where the updated leaderboard can be read.
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// OpenAPI definition
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(
        title = "checkrank leaderboard",
        version = "0.1.0",
        description = "Player rankings for checkrank. Clients upsert full player \
            snapshots by id; the server stamps the time of each update.",
        license(name = "MIT")
    ),
    paths(get_leaderboard, submit_player),
    components(schemas(
        LeaderboardData,
        PlayerRecord,
        PlayerSubmission,
        SubmitPlayerRequest,
        SubmitPlayerResponse,
        ErrorResponse,
    )),
    tags((name = "leaderboard", description = "Player rankings"))
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Get the leaderboard.
#[utoipa::path(
    get,
    path = "/api/leaderboard",
    tag = "leaderboard",
    responses(
        (status = 200, description = "Current leaderboard", body = LeaderboardData),
    )
)]
pub async fn get_leaderboard(data: web::Data<AppState>) -> impl Responder {
    let board = data.board.lock().unwrap_or_else(|p| p.into_inner()).clone();
    log::debug!("Serving leaderboard with {} player(s)", board.players.len());
    HttpResponse::Ok().json(board)
}

/// Create or update a player.
///
/// Fields present in the request overwrite the stored ones; `lastPlayed`
/// and the board's `lastUpdated` are set to the current time.
#[utoipa::path(
    post,
    path = "/api/leaderboard",
    tag = "leaderboard",
    request_body = SubmitPlayerRequest,
    responses(
        (status = 200, description = "Player stored", body = SubmitPlayerResponse),
        (status = 400, description = "Missing player or player id", body = ErrorResponse),
        (status = 500, description = "Leaderboard could not be saved", body = ErrorResponse),
    )
)]
pub async fn submit_player(
    req: HttpRequest,
    body: web::Json<SubmitPlayerRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let locale = i18n::extract_locale_from_request(&req);
    let Some(player) = body.into_inner().player.filter(|p| {
        p.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }) else {
        log::warn!("Rejected leaderboard update without player id");
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: t!("api.invalid_player", locale = &locale).to_string(),
        });
    };

    let now = storage::iso8601(storage::unix_timestamp());
    let mut board = data.board.lock().unwrap_or_else(|p| p.into_inner());
    upsert(&mut board, player, &now);
    board.last_updated = now;

    if let Err(e) = data.store.save_json(LEADERBOARD_KEY, &*board) {
        log::error!("Failed to save leaderboard: {}", e);
        return HttpResponse::InternalServerError().json(ErrorResponse {
            error: t!("api.save_failed", locale = &locale).to_string(),
        });
    }

    HttpResponse::Ok().json(SubmitPlayerResponse {
        success: true,
        url: "/api/leaderboard".to_string(),
    })
}

/// Merges `player` into the board by id.
fn upsert(board: &mut LeaderboardData, player: PlayerSubmission, now: &str) {
    let id = player.id.clone().unwrap_or_default();
    let index = match board.players.iter().position(|p| p.id == id) {
        Some(index) => {
            log::info!("Updating leaderboard player {}", id);
            index
        }
        None => {
            log::info!("Adding leaderboard player {}", id);
            board.players.push(PlayerRecord {
                id: id.clone(),
                username: DEFAULT_PLAYER_NAME.to_string(),
                elo: 0,
                wins: 0,
                losses: 0,
                draws: 0,
                games_played: 0,
                last_played: None,
            });
            board.players.len() - 1
        }
    };
    let record = &mut board.players[index];

    if let Some(username) = player.username {
        record.username = username;
    }
    if let Some(elo) = player.elo {
        record.elo = elo;
    }
    if let Some(wins) = player.wins {
        record.wins = wins;
    }
    if let Some(losses) = player.losses {
        record.losses = losses;
    }
    if let Some(draws) = player.draws {
        record.draws = draws;
    }
    if let Some(games_played) = player.games_played {
        record.games_played = games_played;
    }
    record.last_played = Some(now.to_string());
}

/// Configures all API routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse {
            error: err.to_string(),
        });
        error::InternalError::from_response(err, response).into()
    });

    cfg.service(
        web::scope("/api")
            .app_data(json_config)
            .route("/leaderboard", web::get().to(get_leaderboard))
            .route("/leaderboard", web::post().to(submit_player)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use uuid::Uuid;

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("checkrank_test_{}", Uuid::new_v4()))
    }

    #[actix_web::test]
    async fn test_post_then_get() {
        let dir = temp_dir();
        let data = web::Data::new(AppState::open(&dir).unwrap());
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .set_json(serde_json::json!({
                "player": {"id": "p1", "username": "Ada", "elo": 808, "wins": 1,
                           "losses": 0, "draws": 0, "gamesPlayed": 1}
            }))
            .to_request();
        let resp: SubmitPlayerResponse = test::call_and_read_body_json(&app, req).await;
        assert!(resp.success);

        let req = test::TestRequest::get().uri("/api/leaderboard").to_request();
        let board: LeaderboardData = test::call_and_read_body_json(&app, req).await;
        assert_eq!(board.players.len(), 1);
        assert_eq!(board.players[0].username, "Ada");
        assert!(board.players[0].last_played.is_some());
        assert!(!board.last_updated.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[actix_web::test]
    async fn test_upsert_merges_by_id() {
        let dir = temp_dir();
        let data = web::Data::new(AppState::open(&dir).unwrap());
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        for body in [
            serde_json::json!({"player": {"id": "p1", "username": "Ada", "elo": 808}}),
            serde_json::json!({"player": {"id": "p1", "elo": 816, "wins": 2}}),
            serde_json::json!({"player": {"id": "p2", "elo": 792}}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/leaderboard")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let board = data.board.lock().unwrap().clone();
        assert_eq!(board.players.len(), 2);
        let ada = board.players.iter().find(|p| p.id == "p1").unwrap();
        assert_eq!((ada.username.as_str(), ada.elo, ada.wins), ("Ada", 816, 2));
        let other = board.players.iter().find(|p| p.id == "p2").unwrap();
        assert_eq!(other.username, DEFAULT_PLAYER_NAME);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[actix_web::test]
    async fn test_missing_id_is_rejected() {
        let dir = temp_dir();
        let data = web::Data::new(AppState::open(&dir).unwrap());
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        for body in [
            serde_json::json!({"player": {"username": "NoId"}}),
            serde_json::json!({"player": {"id": "  "}}),
            serde_json::json!({}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/leaderboard")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(data.board.lock().unwrap().players.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[actix_web::test]
    async fn test_board_survives_restart() {
        let dir = temp_dir();
        {
            let data = web::Data::new(AppState::open(&dir).unwrap());
            let app =
                test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;
            let req = test::TestRequest::post()
                .uri("/api/leaderboard")
                .set_json(serde_json::json!({"player": {"id": "p1", "elo": 900}}))
                .to_request();
            test::call_service(&app, req).await;
        }

        let reopened = AppState::open(&dir).unwrap();
        let board = reopened.board.lock().unwrap();
        assert_eq!(board.players.len(), 1);
        assert_eq!(board.players[0].elo, 900);
        drop(board);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
