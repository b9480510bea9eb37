//! Per-connection handler: decode, authorize, dispatch, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! Requests are served strictly one at a time:
//!   1. Receive a frame (bounded by the idle timeout)
//!   2. Decode JSON → [`Request`]; garbage closes the connection
//!   3. Check the session's login/role against the command
//!   4. Call the account directory, catalog, or room registry
//!   5. Send exactly one response frame
//!
//! When the loop ends, the session's online entry is released and its room
//! is left. That teardown runs once: explicitly on every normal exit, and
//! from a drop guard if the task unwinds.

use std::net::SocketAddr;
use std::sync::Arc;

use arcade_catalog::{CatalogError, Published};
use arcade_protocol::{
    Codec, GameId, PackageUpload, ProtocolError, Request, Response,
    ResponseBody, Role, RoomId,
};
use arcade_room::LeaveOutcome;
use arcade_session::{
    AccountDirectory, Acquire, OnlineKey, Session, SessionError, Teardown,
};
use arcade_transport::{Connection, ConnectionId, TcpConnection};

use crate::server::ServerState;
use crate::ArcadeError;

/// Owns the connection's [`Session`] and releases what it holds on drop.
///
/// `Drop` is synchronous, so the async cleanup is spawned onto the runtime.
/// The normal path calls [`teardown`](Self::teardown) first, which leaves
/// nothing for `Drop` to do.
struct SessionGuard<A: AccountDirectory, C: Codec> {
    session: Session,
    state: Arc<ServerState<A, C>>,
}

impl<A: AccountDirectory, C: Codec> SessionGuard<A, C> {
    async fn teardown(&mut self) {
        let addr = self.session.peer_addr();
        let teardown = self.session.take_teardown();
        release(&self.state, teardown, addr).await;
    }
}

impl<A: AccountDirectory, C: Codec> Drop for SessionGuard<A, C> {
    fn drop(&mut self) {
        let addr = self.session.peer_addr();
        let teardown = self.session.take_teardown();
        if teardown.online.is_none() && teardown.room.is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            release(&state, teardown, addr).await;
        });
    }
}

/// Frees the online entry (only if still ours) and leaves the room.
async fn release<A: AccountDirectory, C: Codec>(
    state: &ServerState<A, C>,
    teardown: Teardown,
    addr: SocketAddr,
) {
    if let Some(key) = teardown.online {
        state.online.release(&key, addr).await;
    }
    if let Some((room_id, account_id)) = teardown.room {
        let outcome = state.rooms.leave_room(room_id, account_id).await;
        tracing::debug!(%room_id, %account_id, ?outcome, "left room on disconnect");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: TcpConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let conn_id = conn.id();
    let peer_addr = conn.peer_addr();
    tracing::info!(%conn_id, %peer_addr, "client connected");

    let mut guard = SessionGuard {
        session: Session::new(peer_addr),
        state: Arc::clone(&state),
    };

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%conn_id, "connection idle, closing");
                    break;
                }
            },
            None => conn.recv().await,
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::info!(%conn_id, error = %e, "receive failed, closing");
                break;
            }
        };

        let request = match decode_request(&state.codec, &data) {
            Ok(request) => request,
            Err(e) if e.is_fatal() => {
                tracing::info!(%conn_id, error = %e, "protocol violation, closing");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "rejected request");
                let response = Response::error(ArcadeError::from(e).client_message());
                if let Err(e) = send_response(&conn, &state.codec, &response).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                    break;
                }
                continue;
            }
        };

        let cmd = request.command();
        let exit = matches!(request, Request::Exit);
        tracing::debug!(%conn_id, cmd, "request");

        let response = match dispatch(&state, &mut guard.session, request).await {
            Ok(response) => response,
            Err(e) => error_response(conn_id, cmd, &e),
        };
        if let Err(e) = send_response(&conn, &state.codec, &response).await {
            tracing::debug!(%conn_id, error = %e, "send failed");
            break;
        }
        if exit {
            tracing::debug!(%conn_id, "client asked to exit");
            break;
        }
    }

    guard.teardown().await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::info!(%conn_id, %peer_addr, "client disconnected");
    Ok(())
}

fn decode_request(codec: &impl Codec, data: &[u8]) -> Result<Request, ProtocolError> {
    let value: serde_json::Value = codec.decode(data)?;
    Request::from_json(value)
}

async fn send_response(
    conn: &TcpConnection,
    codec: &impl Codec,
    response: &Response,
) -> Result<(), ArcadeError> {
    let bytes = codec.encode(response)?;
    conn.send(&bytes).await?;
    Ok(())
}

fn error_response(conn_id: ConnectionId, cmd: &str, err: &ArcadeError) -> Response {
    if err.is_external() {
        let detail = match err {
            ArcadeError::Room(e) => e.detail(),
            other => other.to_string(),
        };
        tracing::warn!(%conn_id, cmd, error = %detail, "request failed");
    } else {
        tracing::debug!(%conn_id, cmd, error = %err, "request refused");
    }
    Response::error(err.client_message())
}

/// Routes one request to its handler.
async fn dispatch<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    request: Request,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    match request {
        Request::Register {
            username,
            password,
            role,
        } => {
            state.accounts.register(&username, &password, role).await?;
            Ok(Response::ok(format!("Register {role} success.")))
        }
        Request::LoginDev { username, password } => {
            login(state, session, &username, &password, Role::Developer).await
        }
        Request::LoginPlayer { username, password } => {
            login(state, session, &username, &password, Role::Player).await
        }
        Request::UploadGame(upload) => upload_game(state, session, upload).await,
        Request::UpdateGame(upload) => update_game(state, session, upload).await,
        Request::ListMyGames => {
            let account = session.require_role(Role::Developer)?;
            let games = state.catalog.list_by_developer(account.id).await;
            Ok(Response::ok("Your games.").with_body(ResponseBody::MyGames { games }))
        }
        Request::UnpublishGame { game_id } => unpublish_game(state, session, game_id).await,
        Request::ListGames => {
            session.require_login()?;
            let games = state.catalog.list_active().await;
            Ok(Response::ok("Available games.").with_body(ResponseBody::Games { games }))
        }
        Request::DownloadGame { game_id } => {
            session.require_login()?;
            let package = state.catalog.download(game_id).await?;
            Ok(Response::ok("Download started.").with_body(ResponseBody::Download {
                file_data: package.file_data,
                game_name: package.game_name,
                file_name: package.file_name,
            }))
        }
        Request::CreateRoom { game_id } => create_room(state, session, game_id).await,
        Request::ListRooms => {
            let rooms = state.rooms.list_rooms().await;
            Ok(Response::ok("Open rooms.").with_body(ResponseBody::Rooms { rooms }))
        }
        Request::JoinRoom { room_id } => join_room(state, session, room_id).await,
        Request::LeaveRoom { room_id } => leave_room(state, session, room_id).await,
        Request::ReviewGame {
            game_id,
            rating,
            comment,
        } => {
            let account = session.require_role(Role::Player)?;
            state
                .catalog
                .add_review(account, game_id, rating, &comment)
                .await?;
            Ok(Response::ok("Review added successfully."))
        }
        Request::GetReviews { game_id } => {
            let summary = state.catalog.reviews(game_id).await;
            Ok(Response::ok("Reviews loaded.").with_body(ResponseBody::Reviews {
                reviews: summary.reviews,
                average_rating: summary.average_rating,
            }))
        }
        Request::Exit => Ok(Response::ok("Goodbye.")),
    }
}

/// Verifies credentials, then claims the account's online slot.
///
/// A rejected login leaves the session exactly as it was. Logging in as a
/// different identity on the same connection releases the old one.
async fn login<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    username: &str,
    password: &str,
    role: Role,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = state.accounts.verify(username, password, role).await?;
    let key = OnlineKey::for_account(&account);
    let addr = session.peer_addr();

    if let Acquire::AlreadyOwnedByOther(_) = state.online.try_acquire(&key, addr).await {
        return Err(SessionError::AlreadyOnline {
            username: account.username,
            role,
        }
        .into());
    }

    let body = ResponseBody::LoggedIn {
        user_id: account.id,
        username: account.username.clone(),
    };
    if let Some(previous) = session.authenticate(account) {
        let previous_key = OnlineKey::for_account(&previous);
        if previous_key != key {
            if let Some(room_id) = session.clear_room() {
                state.rooms.leave_room(room_id, previous.id).await;
            }
            state.online.release(&previous_key, addr).await;
        }
    }
    tracing::info!(%key, %addr, "logged in");
    Ok(Response::ok("Login success.").with_body(body))
}

async fn upload_game<A, C>(
    state: &ServerState<A, C>,
    session: &Session,
    upload: PackageUpload,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = session.require_role(Role::Developer)?;
    let name = upload.game_name.clone();
    let message = match state.catalog.upload(account, upload).await? {
        Published::Created(_) => "Game uploaded successfully.".to_string(),
        Published::Resurrected(_) => {
            format!("Game '{name}' has been re-published (resurrected)!")
        }
    };
    Ok(Response::ok(message))
}

async fn update_game<A, C>(
    state: &ServerState<A, C>,
    session: &Session,
    upload: PackageUpload,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = session.require_role(Role::Developer)?;
    let version = upload.version.clone();
    state.catalog.update(account, upload).await?;
    Ok(Response::ok(format!("Game updated to version {version}.")))
}

/// Withdraws a game unless rooms are still running it.
///
/// The running check and the flag change are separate steps: a room
/// created between them keeps running on its staged copy.
async fn unpublish_game<A, C>(
    state: &ServerState<A, C>,
    session: &Session,
    game_id: GameId,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = session.require_role(Role::Developer)?;
    if !state.catalog.is_owner(game_id, account.id).await {
        return Err(CatalogError::NotOwner(game_id).into());
    }
    if state.rooms.is_game_running(game_id).await {
        return Err(ArcadeError::GameInUse(game_id));
    }
    state.catalog.set_active(game_id, false).await?;
    Ok(Response::ok("Game unpublished successfully."))
}

async fn create_room<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    game_id: GameId,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = session.require_login()?.clone();
    let ticket = state
        .rooms
        .create_room(account.id, &account.username, game_id)
        .await?;

    if let Some(previous) = session.enter_room(ticket.room_id) {
        state.rooms.leave_room(previous, account.id).await;
    }
    Ok(Response::ok("Room created.").with_body(ResponseBody::RoomCreated {
        room_id: ticket.room_id,
        port: ticket.port,
        game_name: ticket.game_name,
        game_version: ticket.version,
    }))
}

async fn join_room<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    room_id: RoomId,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account = session.require_login()?.clone();
    let ticket = state
        .rooms
        .join_room(room_id, account.id, &account.username)
        .await?;

    if let Some(previous) = session.enter_room(room_id) {
        if previous != room_id {
            state.rooms.leave_room(previous, account.id).await;
        }
    }
    Ok(Response::ok("Joined room.").with_body(ResponseBody::RoomJoined {
        port: ticket.port,
        game_name: ticket.game_name,
        game_id: ticket.game_id,
        game_version: ticket.version,
    }))
}

/// Leaves the given room, or the tracked one. Leaving a room that does not
/// exist, or leaving with no room at all, still answers OK.
async fn leave_room<A, C>(
    state: &ServerState<A, C>,
    session: &mut Session,
    room_id: Option<RoomId>,
) -> Result<Response, ArcadeError>
where
    A: AccountDirectory,
    C: Codec,
{
    let account_id = session.require_login()?.id;
    let Some(room_id) = room_id.or(session.room()) else {
        return Ok(Response::ok("Left room."));
    };
    if session.room() == Some(room_id) {
        session.clear_room();
    }

    match state.rooms.leave_room(room_id, account_id).await {
        LeaveOutcome::Left | LeaveOutcome::NotFound => Ok(Response::ok("Left room.")),
        LeaveOutcome::Closed => Ok(Response::ok("Left room. Room closed.")),
    }
}
