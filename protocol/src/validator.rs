//! 入站消息校验
//!
//! 所有来自客户端的消息在进入房间或引擎之前都要经过这里。

use crate::constants::{
    MAX_PLAYERS, MAX_ROOM_NAME_LEN, MAX_USERNAME_LEN, MIN_PLAYERS, MIN_ROOM_NAME_LEN,
    MIN_USERNAME_LEN,
};
use crate::error::ValidationError;
use crate::message::{
    ConnectPayload, CreateRoomPayload, JoinRoomPayload, MessageType, NetworkMessage,
};

/// 校验消息结构与负载
///
/// 未知类型直接放行，便于向前兼容。
pub fn validate_message(msg: Option<&NetworkMessage>) -> Result<(), ValidationError> {
    let msg = msg.ok_or(ValidationError::MissingMessage)?;

    if msg.kind.as_str().trim().is_empty() {
        return Err(ValidationError::EmptyType);
    }

    match msg.kind {
        MessageType::CreateRoom => validate_create_room(&extract(msg)?),
        MessageType::JoinRoom => validate_join_room(&extract(msg)?),
        MessageType::Connect => validate_connect(&extract(msg)?),
        _ => Ok(()),
    }
}

fn extract<T: serde::de::DeserializeOwned>(msg: &NetworkMessage) -> Result<T, ValidationError> {
    msg.payload_as()
        .map_err(|e| ValidationError::InvalidPayload(e.to_string()))
}

fn validate_create_room(payload: &CreateRoomPayload) -> Result<(), ValidationError> {
    if payload.name.trim().is_empty() {
        return Err(ValidationError::EmptyRoomName);
    }

    let range = MIN_PLAYERS as i64..=MAX_PLAYERS as i64;
    if !range.contains(&payload.max_players) {
        return Err(ValidationError::MaxPlayers {
            actual: payload.max_players,
            min: MIN_PLAYERS,
            max: MAX_PLAYERS,
        });
    }

    if payload.username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername);
    }

    Ok(())
}

fn validate_join_room(payload: &JoinRoomPayload) -> Result<(), ValidationError> {
    if payload.room_id.trim().is_empty() {
        return Err(ValidationError::EmptyRoomId);
    }
    if payload.username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    Ok(())
}

fn validate_connect(payload: &ConnectPayload) -> Result<(), ValidationError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    check_username_len(username)
}

fn check_username_len(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ValidationError::UsernameLength {
            len,
            min: MIN_USERNAME_LEN,
            max: MAX_USERNAME_LEN,
        });
    }
    Ok(())
}

/// 用户名：去除首尾空白后 3-20 个 `[A-Za-z0-9_-]` 字符
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    check_username_len(username)?;

    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::UsernameCharacters);
    }
    Ok(())
}

/// 房间名：去除首尾空白后 3-50 个字符
pub fn validate_room_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyRoomName);
    }

    let len = name.chars().count();
    if !(MIN_ROOM_NAME_LEN..=MAX_ROOM_NAME_LEN).contains(&len) {
        return Err(ValidationError::RoomNameLength {
            len,
            min: MIN_ROOM_NAME_LEN,
            max: MAX_ROOM_NAME_LEN,
        });
    }
    Ok(())
}
