//! 飞行棋共享协议库
//!
//! 包含:
//! - 棋子、玩家、棋盘、房间等核心数据结构
//! - 走法计算和规则验证
//! - 消息信封与各类负载 (NetworkMessage)
//! - 入站消息校验
//! - JSON 流编解码与传输层抽象 (Connector, Connection, Listener traits)
//! - 对局快照与对局记录

mod board;
mod codec;
mod constants;
mod error;
mod message;
mod moves;
mod player;
mod record;
mod room;
mod token;
mod transport;
mod validator;

pub use board::{Board, Cell};
pub use codec::{decode_message, encode_message, MessageReader, MessageWriter, Serializer};
pub use constants::*;
pub use error::{GameError, ProtocolError, Result, ValidationError};
pub use message::{
    ConnectPayload, CreateRoomPayload, DiceRolledPayload, Difficulty, ErrorCode, ErrorPayload,
    GameOverPayload, GameStatePayload, JoinRoomPayload, MessageType, MoveTokenPayload,
    NetworkMessage, PlayerId, PlayerJoinedPayload, PlayerReadyPayload, PlayerRefPayload,
    RollDicePayload, RoomId, RoomListPayload, RoomPayload, TokenCapturedPayload,
    TokenMovedPayload,
};
pub use moves::{MoveRules, TokenMove};
pub use player::Player;
pub use record::{GameRecord, GameSnapshot, PlayerResult, TurnAction, RECORD_VERSION};
pub use room::{RoomModel, RoomStatus};
pub use token::{is_home_stretch_position, is_track_position, Color, Token, TokenRef};
pub use transport::{
    Connection, Connector, Listener, TcpConnection, TcpConnector, TcpListener,
};
pub use validator::{validate_message, validate_room_name, validate_username};
