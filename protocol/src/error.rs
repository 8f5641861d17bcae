//! 错误类型定义

use thiserror::Error;

use crate::message::ErrorCode;

/// 对局规则错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// 游戏已经开始
    #[error("Game already started")]
    AlreadyStarted,

    /// 玩家不足
    #[error("Not enough players: {count} (min: {min})")]
    NotEnoughPlayers { count: usize, min: usize },

    /// 游戏不在进行中
    #[error("Game is not in progress")]
    GameNotPlaying,

    /// 不是你的回合
    #[error("Not your turn")]
    NotYourTurn,

    /// 本回合的骰子还没用掉
    #[error("Dice already rolled this turn")]
    AlreadyRolled,

    /// 无效的棋子编号
    #[error("Invalid token id: {0}")]
    InvalidTokenId(i64),

    /// 无效的走法
    #[error("Invalid move for token {token_id}")]
    InvalidMove { token_id: u8 },
}

impl GameError {
    /// 转换为协议错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::NotYourTurn => ErrorCode::NotYourTurn,
            GameError::AlreadyStarted | GameError::NotEnoughPlayers { .. } => {
                ErrorCode::Unauthorized
            }
            GameError::GameNotPlaying
            | GameError::AlreadyRolled
            | GameError::InvalidTokenId(_)
            | GameError::InvalidMove { .. } => ErrorCode::InvalidMove,
        }
    }
}

/// 消息校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 消息为空
    #[error("message is nil")]
    MissingMessage,

    /// 消息类型为空
    #[error("message type is empty")]
    EmptyType,

    /// 负载无法解析
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// 房间名为空
    #[error("room name cannot be empty")]
    EmptyRoomName,

    /// 房间名长度不合法
    #[error("room name must be between {min} and {max} characters, got {len}")]
    RoomNameLength { len: usize, min: usize, max: usize },

    /// 房间 ID 为空
    #[error("room ID cannot be empty")]
    EmptyRoomId,

    /// 人数不合法
    #[error("max players must be between {min} and {max}, got {actual}")]
    MaxPlayers { actual: i64, min: usize, max: usize },

    /// 用户名为空
    #[error("username cannot be empty")]
    EmptyUsername,

    /// 用户名长度不合法
    #[error("username must be between {min} and {max} characters, got {len}")]
    UsernameLength { len: usize, min: usize, max: usize },

    /// 用户名包含非法字符
    #[error("username contains invalid characters")]
    UsernameCharacters,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 消息过大
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 消息校验失败
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 对局规则错误
    #[error("Game error: {0}")]
    Game(#[from] GameError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
