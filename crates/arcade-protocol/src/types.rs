//! Core protocol types for Arcade's wire format.
//!
//! Every request is a JSON object with a `cmd` string naming the operation
//! plus operation-specific fields. Every response is a JSON object with a
//! `status` (`"OK"` or `"ERROR"`), a human-readable `message`, and
//! operation-specific result fields flattened next to them.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Clients send ids either as JSON numbers or as numeric strings
/// (`"game_id": "3"`). Both forms are accepted on input.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericId {
    Number(u64),
    Text(String),
}

impl NumericId {
    fn into_u64(self) -> Result<u64, String> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("`{s}` is not a numeric id")),
        }
    }
}

/// A registered account's identifier (unique across both roles).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// A published game artifact's identifier.
///
/// Serialized as a plain number; accepted as a number or numeric string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl<'de> Deserialize<'de> for GameId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        NumericId::deserialize(d)?
            .into_u64()
            .map(Self)
            .map_err(de::Error::custom)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// A room's identifier.
///
/// Ids are handed out sequentially and never reused. On the wire a room id
/// is a string (`"room_id": "7"`); numbers are accepted on input too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        NumericId::deserialize(d)?
            .into_u64()
            .map(Self)
            .map_err(de::Error::custom)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// The two kinds of account. A username is unique per role, so "alice"
/// the developer and "alice" the player are different accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "dev")]
    Developer,
    #[serde(rename = "player")]
    Player,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Developer => write!(f, "dev"),
            Self::Player => write!(f, "player"),
        }
    }
}

/// An authenticated account, as returned by the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Package bytes
// ---------------------------------------------------------------------------

/// Serde adapter for package archives: standard base64 text on the wire.
/// A plain JSON byte array is still accepted on input.
mod package_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Encoded::deserialize(deserializer)? {
            Encoded::Text(text) => STANDARD
                .decode(text.trim())
                .map_err(|e| de::Error::custom(format!("file_data is not valid base64: {e}"))),
            Encoded::Bytes(bytes) => Ok(bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A game package sent by a developer for `upload_game` / `update_game`.
///
/// `file_data` is the raw zip archive, carried as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpload {
    pub game_name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "package_bytes")]
    pub file_data: Vec<u8>,
}

/// A client request. The JSON form is internally tagged by `cmd`:
///
/// ```text
/// { "cmd": "join_room", "room_id": "3" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Register {
        username: String,
        password: String,
        role: Role,
    },
    LoginDev {
        username: String,
        password: String,
    },
    LoginPlayer {
        username: String,
        password: String,
    },
    UploadGame(PackageUpload),
    UpdateGame(PackageUpload),
    ListMyGames,
    UnpublishGame {
        game_id: GameId,
    },
    ListGames,
    DownloadGame {
        game_id: GameId,
    },
    CreateRoom {
        game_id: GameId,
    },
    ListRooms,
    JoinRoom {
        room_id: RoomId,
    },
    /// Leaves `room_id`, or the connection's current room when omitted.
    LeaveRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    ReviewGame {
        game_id: GameId,
        rating: i64,
        #[serde(default)]
        comment: String,
    },
    GetReviews {
        game_id: GameId,
    },
    /// Ends the session after the reply is sent.
    Exit,
}

impl Request {
    /// Every `cmd` tag the server understands.
    pub const COMMANDS: &'static [&'static str] = &[
        "register",
        "login_dev",
        "login_player",
        "upload_game",
        "update_game",
        "list_my_games",
        "unpublish_game",
        "list_games",
        "download_game",
        "create_room",
        "list_rooms",
        "join_room",
        "leave_room",
        "review_game",
        "get_reviews",
        "exit",
    ];

    /// Parses a decoded JSON value into a request.
    ///
    /// The `cmd` tag is checked first so that an unknown operation and a
    /// known operation with bad fields produce different errors.
    ///
    /// # Errors
    /// - [`ProtocolError::NotAnObject`](crate::ProtocolError::NotAnObject)
    /// - [`ProtocolError::MissingCommand`](crate::ProtocolError::MissingCommand)
    /// - [`ProtocolError::UnknownCommand`](crate::ProtocolError::UnknownCommand)
    /// - [`ProtocolError::InvalidFields`](crate::ProtocolError::InvalidFields)
    pub fn from_json(
        value: serde_json::Value,
    ) -> Result<Self, crate::ProtocolError> {
        let object = value
            .as_object()
            .ok_or(crate::ProtocolError::NotAnObject)?;
        let cmd = object
            .get("cmd")
            .and_then(serde_json::Value::as_str)
            .ok_or(crate::ProtocolError::MissingCommand)?
            .to_string();

        if !Self::COMMANDS.contains(&cmd.as_str()) {
            return Err(crate::ProtocolError::UnknownCommand(cmd));
        }

        serde_json::from_value(value).map_err(|e| {
            crate::ProtocolError::InvalidFields {
                cmd,
                reason: e.to_string(),
            }
        })
    }

    /// The `cmd` tag of this request, for logging.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::LoginDev { .. } => "login_dev",
            Self::LoginPlayer { .. } => "login_player",
            Self::UploadGame(_) => "upload_game",
            Self::UpdateGame(_) => "update_game",
            Self::ListMyGames => "list_my_games",
            Self::UnpublishGame { .. } => "unpublish_game",
            Self::ListGames => "list_games",
            Self::DownloadGame { .. } => "download_game",
            Self::CreateRoom { .. } => "create_room",
            Self::ListRooms => "list_rooms",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::ReviewGame { .. } => "review_game",
            Self::GetReviews { .. } => "get_reviews",
            Self::Exit => "exit",
        }
    }
}

// ---------------------------------------------------------------------------
// Response payload entries
// ---------------------------------------------------------------------------

/// One open room, as shown by `list_rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub id: RoomId,
    pub game_name: String,
    pub host: String,
    /// Number of participants currently in the room.
    pub players: usize,
    pub port: u16,
    /// The game version the room's worker was started with.
    pub version: String,
}

/// A published game, as shown to players by `list_games`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub name: String,
    pub version: String,
    pub description: String,
    /// The owning developer's username.
    pub author: String,
}

/// A developer's own game, as shown by `list_my_games` (inactive too).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperGame {
    pub id: GameId,
    pub name: String,
    pub version: String,
    pub description: String,
    pub is_active: bool,
}

/// One player review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub rating: u8,
    pub comment: String,
    /// The reviewing player's username.
    pub player: String,
    /// Seconds since the Unix epoch.
    pub date: u64,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
}

/// Operation-specific result fields. Serialized untagged and flattened into
/// the [`Response`] object, so the client sees e.g.
/// `{"status":"OK","message":"Joined room.","port":9000,...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    LoggedIn {
        user_id: AccountId,
        username: String,
    },
    RoomCreated {
        room_id: RoomId,
        port: u16,
        game_name: String,
        game_version: String,
    },
    Rooms {
        rooms: Vec<RoomListEntry>,
    },
    RoomJoined {
        port: u16,
        game_name: String,
        game_id: GameId,
        game_version: String,
    },
    Games {
        games: Vec<GameSummary>,
    },
    MyGames {
        games: Vec<DeveloperGame>,
    },
    Download {
        #[serde(with = "package_bytes")]
        file_data: Vec<u8>,
        game_name: String,
        file_name: String,
    },
    Reviews {
        reviews: Vec<ReviewEntry>,
        average_rating: f64,
    },
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
    #[serde(flatten)]
    pub body: Option<ResponseBody>,
}

impl Response {
    /// An `OK` response with no extra fields.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            body: None,
        }
    }

    /// An `ERROR` response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            body: None,
        }
    }

    /// Attaches operation-specific result fields.
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns `true` for `OK` responses.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

// =========================================================================
// Tests
// =========================================================================
