//! 对局快照与对局记录
//!
//! `GameSnapshot` 是引擎对外暴露的完整状态；`GameRecord` 是对局结束后
//! 写入存储的 JSON 记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::message::{PlayerId, RoomId};
use crate::player::Player;
use crate::room::RoomModel;
use crate::token::{Color, TokenRef};

/// 记录格式版本
pub const RECORD_VERSION: &str = "1.0";

/// 一步已结算的走子（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAction {
    pub player_id: PlayerId,
    pub dice_value: u8,
    pub token_id: u8,
    pub from_pos: i32,
    pub to_pos: i32,
    /// 被吃掉的棋子
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<TokenRef>,
    pub timestamp: DateTime<Utc>,
}

/// 对局快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room: RoomModel,
    pub board: Board,
    pub turn_history: Vec<TurnAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Player>,
    #[serde(default)]
    pub rankings: Vec<Player>,
}

/// 单个玩家在一局中的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub username: String,
    pub color: Color,
    pub is_ai: bool,
    /// 名次，从 1 开始
    pub rank: usize,
    pub won: bool,
    /// 吃掉对方的棋子数
    pub captures: u32,
    /// 被吃掉的棋子数
    pub tokens_lost: u32,
    pub tokens_home: usize,
    pub dice_rolls: u32,
    pub sixes_rolled: u32,
}

/// 完整的对局记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub version: String,
    pub room_id: RoomId,
    pub room_name: String,
    pub game_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    pub players: Vec<PlayerResult>,
    pub turn_history: Vec<TurnAction>,
}

impl GameRecord {
    /// 从最终快照与玩家结果创建记录
    pub fn new(snapshot: &GameSnapshot, players: Vec<PlayerResult>, duration_seconds: i64) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            room_id: snapshot.room.id.clone(),
            room_name: snapshot.room.name.clone(),
            game_mode: snapshot.room.game_mode.clone(),
            started_at: snapshot.start_time,
            finished_at: Utc::now(),
            duration_seconds,
            winner: snapshot.winner.as_ref().map(|p| p.id),
            players,
            turn_history: snapshot.turn_history.clone(),
        }
    }

    /// 人类玩家的结果
    pub fn human_players(&self) -> impl Iterator<Item = &PlayerResult> {
        self.players.iter().filter(|p| !p.is_ai)
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(player_id: PlayerId, color: Color, is_ai: bool, rank: usize) -> PlayerResult {
        PlayerResult {
            player_id,
            username: format!("p{}", player_id),
            color,
            is_ai,
            rank,
            won: rank == 1,
            captures: 0,
            tokens_lost: 0,
            tokens_home: 0,
            dice_rolls: 0,
            sixes_rolled: 0,
        }
    }

    #[test]
    fn test_game_record_json() {
        let mut room = RoomModel::new("ROOM_9", "evening", 1, 2, "ai");
        let winner = Player::new(1, "alice", Color::Red);
        room.players.push(winner.clone());
        room.players.push(Player::new_ai(-2, Color::Blue, crate::Difficulty::Easy));

        let snapshot = GameSnapshot {
            room,
            board: Board::new(),
            turn_history: vec![TurnAction {
                player_id: 1,
                dice_value: 6,
                token_id: 0,
                from_pos: -1,
                to_pos: 0,
                captured: None,
                timestamp: Utc::now(),
            }],
            start_time: Some(Utc::now()),
            winner: Some(winner),
            rankings: Vec::new(),
        };

        let record = GameRecord::new(
            &snapshot,
            vec![result(1, Color::Red, false, 1), result(-2, Color::Blue, true, 2)],
            95,
        );
        assert_eq!(record.winner, Some(1));
        assert_eq!(record.human_players().count(), 1);

        let json = record.to_json().unwrap();
        let parsed = GameRecord::from_json(&json).unwrap();
        assert_eq!(parsed.room_id, "ROOM_9");
        assert_eq!(parsed.turn_history.len(), 1);
        assert_eq!(parsed.duration_seconds, 95);
    }
}
