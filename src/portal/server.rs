use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::aggregate::Aggregator;
use crate::bus::EventBus;
use crate::commands::{self, CommandError};
use crate::config::Config;
use crate::entity::Uid;
use crate::enrich::NameResolver;
use crate::model::{Booking, ConsultantProfile, Message};
use crate::notify::{self, Notifier};
use crate::store::Store;
use crate::view::{self, InboxEntry, Tab, TabbedCards};

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub text: String,
}

/// Result of a booking command. `active_tab` tells the client which tab
/// to switch to (accepting moves the operator to Upcoming).
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab: Option<Tab>,
}

fn internal(e: anyhow::Error) -> ApiError {
    error!("portal request failed: {e:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "internal error".to_string(),
        }),
    )
}

fn command_error(e: CommandError) -> ApiError {
    let status = match &e {
        CommandError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CommandError::Conflict => StatusCode::CONFLICT,
        CommandError::NotFound => StatusCode::NOT_FOUND,
        CommandError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

fn require_confirmation(body: &ConfirmBody) -> Result<(), ApiError> {
    if body.confirm {
        return Ok(());
    }
    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "this action is irreversible and requires confirmation".to_string(),
        }),
    ))
}

// -----------------------------------------------------------------------------
// Server state
// -----------------------------------------------------------------------------

pub struct PortalState {
    pub store: Store,
    pub bus: Arc<EventBus>,
    pub config: Config,
    /// Shared across sessions so a booking is announced at most once per
    /// process, no matter how many sessions observe it.
    pub notifier: Option<Arc<Mutex<Notifier>>>,
}

pub struct PortalServer {
    state: Arc<PortalState>,
}

impl PortalServer {
    pub fn new(store: Store, bus: Arc<EventBus>, config: Config) -> Self {
        let notifier = config
            .notify_url
            .clone()
            .map(|url| Arc::new(Mutex::new(Notifier::new(url))));
        Self {
            state: Arc::new(PortalState {
                store,
                bus,
                config,
                notifier,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/sessions/:consultant/events", get(session_events))
            .route("/sessions/:consultant/bookings", get(session_bookings))
            .route("/sessions/:consultant/inbox", get(session_inbox))
            .route("/bookings/:id/accept", post(accept_booking))
            .route("/bookings/:id/decline", post(decline_booking))
            .route("/bookings/:id/complete", post(complete_booking))
            .route("/bookings/:id/cancel", post(cancel_booking))
            .route(
                "/chats/:chat_id/messages",
                get(chat_messages).post(send_chat_message),
            )
            .route("/chats/:chat_id/seen", post(mark_chat_seen))
            .route(
                "/consultants/:id/profile",
                get(get_profile).put(put_profile),
            )
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
    }
}

async fn health() -> &'static str {
    "OK"
}

// -----------------------------------------------------------------------------
// Session surfaces
// -----------------------------------------------------------------------------

/// Connecting opens a dashboard session: an aggregator (and the
/// pending-booking notification watch) is spawned for the consultant and
/// stats are streamed as they change. Disconnecting drops the session
/// guard, which cancels every subscription the session opened.
async fn session_events(
    State(state): State<Arc<PortalState>>,
    Path(consultant): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::BoxError>>> {
    let consultant = Uid::new(consultant);
    info!("dashboard session opened for {consultant}");

    let (handle, mut stats_rx) =
        Aggregator::spawn(state.store.clone(), state.bus.clone(), consultant.clone());
    let notify_sub = state.notifier.as_ref().map(|notifier| {
        notify::spawn_watch(
            notifier.clone(),
            state.store.clone(),
            &state.bus,
            consultant.clone(),
        )
    });

    let stream = async_stream::stream! {
        // Held for the lifetime of the connection; dropped on disconnect.
        let _session = (handle, notify_sub);
        loop {
            let stats = stats_rx.borrow_and_update().clone();
            match serde_json::to_string(&stats) {
                Ok(json) => yield Ok(Event::default().event("stats").data(json)),
                Err(e) => error!("failed to serialize stats: {e}"),
            }
            match serde_json::to_string(&view::dashboard_cards(&stats)) {
                Ok(json) => yield Ok(Event::default().event("cards").data(json)),
                Err(e) => error!("failed to serialize stat cards: {e}"),
            }
            if stats_rx.changed().await.is_err() {
                info!("dashboard session for {consultant} ended");
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn session_bookings(
    State(state): State<Arc<PortalState>>,
    Path(consultant): Path<String>,
) -> Result<Json<TabbedCards>, ApiError> {
    let consultant = Uid::new(consultant);
    let bookings = state
        .store
        .bookings_of(&consultant)
        .await
        .map_err(internal)?;

    let mut resolver = NameResolver::new();
    let bookings = resolver.resolve_booking_names(&state.store, bookings).await;
    Ok(Json(view::present_tabs(&view::partition_bookings(
        &bookings,
    ))))
}

async fn session_inbox(
    State(state): State<Arc<PortalState>>,
    Path(consultant): Path<String>,
) -> Result<Json<Vec<InboxEntry>>, ApiError> {
    let consultant = Uid::new(consultant);
    let chats = state.store.chats_of(&consultant).await.map_err(internal)?;

    let mut last_messages = HashMap::new();
    for chat in &chats {
        if let Some(message) = state
            .store
            .latest_message(&chat.id)
            .await
            .map_err(internal)?
        {
            last_messages.insert(chat.id.clone(), message);
        }
    }

    let mut resolver = NameResolver::new();
    let mut parent_names = HashMap::new();
    for chat in &chats {
        let name = resolver.display_name(&state.store, &chat.parent_id).await;
        parent_names.insert(chat.parent_id.clone(), name);
    }

    Ok(Json(view::inbox(
        &chats,
        &last_messages,
        &parent_names,
        &consultant,
    )))
}

// -----------------------------------------------------------------------------
// Booking commands
// -----------------------------------------------------------------------------

enum BookingAction {
    Accept,
    Decline,
    Complete,
    Cancel,
}

async fn run_booking_action(
    state: &PortalState,
    id: &str,
    action: BookingAction,
) -> Result<CommandResponse, CommandError> {
    let booking = state
        .store
        .get_booking(id)
        .await
        .map_err(CommandError::Store)?
        .ok_or(CommandError::NotFound)?;
    let mut local = state
        .store
        .bookings_of(&booking.consultant_id)
        .await
        .map_err(CommandError::Store)?;

    let active_tab = match action {
        BookingAction::Accept => {
            commands::accept(&state.store, &state.config, &mut local, id).await?;
            Some(Tab::Upcoming)
        }
        BookingAction::Decline => {
            commands::decline(&state.store, &state.config, &mut local, id).await?;
            None
        }
        BookingAction::Complete => {
            commands::mark_done(&state.store, &state.config, &mut local, id).await?;
            None
        }
        BookingAction::Cancel => {
            commands::cancel(&state.store, &state.config, &mut local, id).await?;
            None
        }
    };

    let booking = local
        .into_iter()
        .find(|b| b.id == id)
        .ok_or(CommandError::NotFound)?;
    Ok(CommandResponse {
        booking,
        active_tab,
    })
}

async fn accept_booking(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    run_booking_action(&state, &id, BookingAction::Accept)
        .await
        .map(Json)
        .map_err(command_error)
}

async fn decline_booking(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<CommandResponse>, ApiError> {
    require_confirmation(&body)?;
    run_booking_action(&state, &id, BookingAction::Decline)
        .await
        .map(Json)
        .map_err(command_error)
}

async fn complete_booking(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    run_booking_action(&state, &id, BookingAction::Complete)
        .await
        .map(Json)
        .map_err(command_error)
}

async fn cancel_booking(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<CommandResponse>, ApiError> {
    require_confirmation(&body)?;
    run_booking_action(&state, &id, BookingAction::Cancel)
        .await
        .map(Json)
        .map_err(command_error)
}

// -----------------------------------------------------------------------------
// Chat commands
// -----------------------------------------------------------------------------

async fn chat_messages(
    State(state): State<Arc<PortalState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    state
        .store
        .messages_of(&chat_id)
        .await
        .map(Json)
        .map_err(internal)
}

async fn send_chat_message(
    State(state): State<Arc<PortalState>>,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<Message>, ApiError> {
    commands::send_message(
        &state.store,
        &state.config,
        &chat_id,
        Uid::new(body.sender_id),
        body.sender_name.unwrap_or_else(|| "Doctor".to_string()),
        body.text,
    )
    .await
    .map(Json)
    .map_err(command_error)
}

async fn mark_chat_seen(
    State(state): State<Arc<PortalState>>,
    Path(chat_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    commands::mark_chat_seen(&state.store, &state.config, &chat_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(command_error)
}

// -----------------------------------------------------------------------------
// Profile
// -----------------------------------------------------------------------------

async fn get_profile(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
) -> Result<Json<ConsultantProfile>, ApiError> {
    let profile = state
        .store
        .get_consultant(&Uid::new(id))
        .await
        .map_err(internal)?;
    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "consultant profile not found".to_string(),
            }),
        )),
    }
}

async fn put_profile(
    State(state): State<Arc<PortalState>>,
    Path(id): Path<String>,
    Json(mut profile): Json<ConsultantProfile>,
) -> Result<Json<ConsultantProfile>, ApiError> {
    // The path identifies the profile; the body cannot rename it.
    profile.id = Uid::new(id);
    state
        .store
        .upsert_consultant(&profile)
        .await
        .map_err(internal)?;
    Ok(Json(profile))
}
