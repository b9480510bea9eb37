//! Wire protocol for Arcade.
//!
//! - **Types** ([`Request`], [`Response`], ids, [`Role`]): the JSON
//!   objects carried inside each frame. Requests are tagged by a `cmd`
//!   string; responses always carry `status` and `message`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those objects are
//!   converted to/from frame payloads.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding,
//!   split into fatal violations and answerable mistakes.
//!
//! ```text
//! Transport (frames) → Protocol (Request/Response) → Session handler
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Account, AccountId, DeveloperGame, GameId, GameSummary, PackageUpload,
    Request, Response, ResponseBody, ReviewEntry, Role, RoomId,
    RoomListEntry, Status,
};
