//! 消息类型定义
//!
//! 线上格式为 JSON 信封 `{type, payload, timestamp, player_id?, room_id?}`，
//! `payload` 的结构由 `type` 决定。

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::player::Player;
use crate::record::GameSnapshot;
use crate::room::RoomModel;

/// 玩家 ID（AI 玩家为负数）
pub type PlayerId = i64;

/// 房间 ID
pub type RoomId = String;

/// AI 难度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// 简单：随机选择
    Easy,
    /// 中等：吃子优先，其次出基地，再次推进最远的棋子
    #[default]
    Medium,
    /// 困难：逐个评分
    Hard,
}

impl Difficulty {
    /// 解析难度字符串，无法识别时退化为中等
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 无效走法
    InvalidMove,
    /// 不是你的回合
    NotYourTurn,
    /// 房间已满
    GameFull,
    /// 房间不存在
    RoomNotFound,
    /// 无权操作
    Unauthorized,
    /// 消息格式错误
    InvalidMessage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMove => "INVALID_MOVE",
            ErrorCode::NotYourTurn => "NOT_YOUR_TURN",
            ErrorCode::GameFull => "GAME_FULL",
            ErrorCode::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消息类型标签
///
/// 未知标签原样保留在 `Unknown` 中，便于向前兼容。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    // === 客户端 -> 服务端 ===
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    RollDice,
    MoveToken,
    PlayerReady,
    Connect,
    ListRooms,
    GetState,

    // === 服务端 -> 客户端 ===
    RoomCreated,
    RoomJoined,
    PlayerJoined,
    PlayerLeft,
    GameStart,
    DiceRolled,
    TokenMoved,
    TokenCaptured,
    TurnChanged,
    GameOver,
    Error,
    GameState,
    RoomList,

    // === 双向 ===
    Ping,
    Pong,

    /// 无法识别的标签
    Unknown(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::CreateRoom => "CREATE_ROOM",
            MessageType::JoinRoom => "JOIN_ROOM",
            MessageType::LeaveRoom => "LEAVE_ROOM",
            MessageType::RollDice => "ROLL_DICE",
            MessageType::MoveToken => "MOVE_TOKEN",
            MessageType::PlayerReady => "PLAYER_READY",
            MessageType::Connect => "CONNECT",
            MessageType::ListRooms => "LIST_ROOMS",
            MessageType::GetState => "GET_STATE",
            MessageType::RoomCreated => "ROOM_CREATED",
            MessageType::RoomJoined => "ROOM_JOINED",
            MessageType::PlayerJoined => "PLAYER_JOINED",
            MessageType::PlayerLeft => "PLAYER_LEFT",
            MessageType::GameStart => "GAME_START",
            MessageType::DiceRolled => "DICE_ROLLED",
            MessageType::TokenMoved => "TOKEN_MOVED",
            MessageType::TokenCaptured => "TOKEN_CAPTURED",
            MessageType::TurnChanged => "TURN_CHANGED",
            MessageType::GameOver => "GAME_OVER",
            MessageType::Error => "ERROR",
            MessageType::GameState => "GAME_STATE",
            MessageType::RoomList => "ROOM_LIST",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Unknown(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "CREATE_ROOM" => MessageType::CreateRoom,
            "JOIN_ROOM" => MessageType::JoinRoom,
            "LEAVE_ROOM" => MessageType::LeaveRoom,
            "ROLL_DICE" => MessageType::RollDice,
            "MOVE_TOKEN" => MessageType::MoveToken,
            "PLAYER_READY" => MessageType::PlayerReady,
            "CONNECT" => MessageType::Connect,
            "LIST_ROOMS" => MessageType::ListRooms,
            "GET_STATE" => MessageType::GetState,
            "ROOM_CREATED" => MessageType::RoomCreated,
            "ROOM_JOINED" => MessageType::RoomJoined,
            "PLAYER_JOINED" => MessageType::PlayerJoined,
            "PLAYER_LEFT" => MessageType::PlayerLeft,
            "GAME_START" => MessageType::GameStart,
            "DICE_ROLLED" => MessageType::DiceRolled,
            "TOKEN_MOVED" => MessageType::TokenMoved,
            "TOKEN_CAPTURED" => MessageType::TokenCaptured,
            "TURN_CHANGED" => MessageType::TurnChanged,
            "GAME_OVER" => MessageType::GameOver,
            "ERROR" => MessageType::Error,
            "GAME_STATE" => MessageType::GameState,
            "ROOM_LIST" => MessageType::RoomList,
            "PING" => MessageType::Ping,
            "PONG" => MessageType::Pong,
            _ => MessageType::Unknown(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 网络消息信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

impl NetworkMessage {
    /// 构造消息，负载无法转换为 JSON 时返回错误
    pub fn new<P: Serialize>(kind: MessageType, payload: &P) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
            player_id: None,
            room_id: None,
        })
    }

    /// 不带负载的消息（PING / PONG 等）
    pub fn empty(kind: MessageType) -> Self {
        Self {
            kind,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
            player_id: None,
            room_id: None,
        }
    }

    /// 错误回复
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let payload = serde_json::json!({
            "code": code,
            "message": message.into(),
        });
        Self {
            kind: MessageType::Error,
            payload,
            timestamp: Utc::now(),
            player_id: None,
            room_id: None,
        }
    }

    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_room(mut self, room_id: impl Into<RoomId>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// 按类型解析负载
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

// === 客户端负载 ===

/// CREATE_ROOM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_players: i64,
    /// online / local / ai
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: PlayerId,
    #[serde(default)]
    pub username: String,
    /// 人机模式下的 AI 难度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_level: Option<String>,
}

/// JOIN_ROOM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: PlayerId,
    #[serde(default)]
    pub username: String,
}

/// ROLL_DICE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollDicePayload {
    pub player_id: PlayerId,
    #[serde(default)]
    pub room_id: RoomId,
}

/// MOVE_TOKEN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTokenPayload {
    pub player_id: PlayerId,
    #[serde(default)]
    pub room_id: RoomId,
    pub token_id: i64,
}

/// PLAYER_READY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReadyPayload {
    #[serde(default = "default_ready")]
    pub ready: bool,
}

fn default_ready() -> bool {
    true
}

/// CONNECT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<PlayerId>,
}

// === 服务端负载 ===

/// ROOM_CREATED / ROOM_JOINED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPayload {
    pub room_id: RoomId,
    pub room: RoomModel,
}

/// PLAYER_JOINED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedPayload {
    pub player: Player,
}

/// PLAYER_LEFT / TURN_CHANGED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRefPayload {
    pub player_id: PlayerId,
}

/// DICE_ROLLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRolledPayload {
    pub player_id: PlayerId,
    pub dice_value: u8,
    pub extra_turn: bool,
}

/// TOKEN_MOVED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMovedPayload {
    pub player_id: PlayerId,
    pub token_id: u8,
    pub from_pos: i32,
    pub to_pos: i32,
    /// 棋子是否已回家
    pub is_complete: bool,
}

/// TOKEN_CAPTURED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCapturedPayload {
    pub captured_by: PlayerId,
    pub captured_from: PlayerId,
    pub token_id: u8,
    pub position: i32,
}

/// GAME_OVER
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub winner: Player,
    pub rankings: Vec<Player>,
    pub duration_seconds: i64,
}

/// ERROR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// GAME_STATE / GAME_START
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatePayload {
    pub game: GameSnapshot,
}

/// ROOM_LIST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListPayload {
    pub rooms: Vec<RoomModel>,
}
