//! 房间模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{PlayerId, RoomId};
use crate::player::Player;
use crate::token::Color;

/// 房间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// 等待玩家加入
    Waiting,
    /// 游戏进行中
    Playing,
    /// 游戏结束
    Finished,
}

/// 房间信息
///
/// `players` 的顺序即座位顺序（也是行棋顺序）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomModel {
    pub id: RoomId,
    pub name: String,
    pub host_id: PlayerId,
    pub players: Vec<Player>,
    pub max_players: usize,
    /// online / local / ai
    pub game_mode: String,
    pub state: RoomStatus,
    pub current_turn: usize,
    pub last_dice: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub is_private: bool,
    /// 房间密码，从不出现在线上
    #[serde(skip)]
    pub password: Option<String>,
}

impl RoomModel {
    pub fn new(
        id: impl Into<RoomId>,
        name: impl Into<String>,
        host_id: PlayerId,
        max_players: usize,
        game_mode: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host_id,
            players: Vec::with_capacity(max_players),
            max_players,
            game_mode: game_mode.into(),
            state: RoomStatus::Waiting,
            current_turn: 0,
            last_dice: 0,
            created_at: Utc::now(),
            started_at: None,
            is_private: false,
            password: None,
        }
    }

    /// 当前回合的玩家
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// 玩家的座位号
    pub fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// 按 红/蓝/绿/黄 顺序取第一个未被占用的颜色
    pub fn next_free_color(&self) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|c| self.players.iter().all(|p| p.color != *c))
    }

    /// 按颜色查找玩家
    pub fn player_by_color(&self, color: Color) -> Option<&Player> {
        self.players.iter().find(|p| p.color == color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_free_color_fills_gaps() {
        let mut room = RoomModel::new("ROOM_1", "test", 1, 4, "online");
        assert_eq!(room.next_free_color(), Some(Color::Red));

        room.players.push(Player::new(1, "alice", Color::Red));
        room.players.push(Player::new(2, "bob", Color::Blue));
        room.players.push(Player::new(3, "carol", Color::Green));
        room.players.remove(1);
        // 蓝色空出后优先补位
        assert_eq!(room.next_free_color(), Some(Color::Blue));

        room.players.push(Player::new(4, "dave", Color::Blue));
        room.players.push(Player::new(5, "erin", Color::Yellow));
        assert_eq!(room.next_free_color(), None);
        assert!(room.is_full());
    }

    #[test]
    fn test_password_never_serialized() {
        let mut room = RoomModel::new("ROOM_2", "secret", 1, 2, "online");
        room.is_private = true;
        room.password = Some("hunter2".to_string());

        let json = serde_json::to_string(&room).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));

        let decoded: RoomModel = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.password, None);
        assert!(decoded.is_private);
    }

    #[test]
    fn test_status_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoomStatus::Playing).unwrap(),
            "\"playing\""
        );
    }
}
