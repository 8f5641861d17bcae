//! 对局内的玩家

use serde::{Deserialize, Serialize};

use crate::constants::TOKENS_PER_PLAYER;
use crate::message::{Difficulty, PlayerId};
use crate::token::{Color, Token};

/// 玩家（属于某个房间）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub color: Color,
    pub tokens: Vec<Token>,
    pub tokens_at_home: usize,
    pub is_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_level: Option<Difficulty>,
    pub is_ready: bool,
    pub is_connected: bool,
    pub consecutive_six: u8,
}

impl Player {
    /// 创建人类玩家，四枚棋子都在基地
    pub fn new(id: PlayerId, username: impl Into<String>, color: Color) -> Self {
        let tokens = (0..TOKENS_PER_PLAYER as u8)
            .map(|i| Token::new(i, color))
            .collect();

        Self {
            id,
            username: username.into(),
            color,
            tokens,
            tokens_at_home: 0,
            is_ai: false,
            ai_level: None,
            is_ready: false,
            is_connected: true,
            consecutive_six: 0,
        }
    }

    /// 创建 AI 玩家（默认已准备）
    pub fn new_ai(id: PlayerId, color: Color, level: Difficulty) -> Self {
        let mut player = Self::new(id, format!("AI ({})", level), color);
        player.is_ai = true;
        player.ai_level = Some(level);
        player.is_ready = true;
        player
    }

    /// 按编号获取棋子
    pub fn token(&self, token_id: u8) -> Option<&Token> {
        self.tokens.get(token_id as usize)
    }

    /// 是否所有棋子都已回家
    pub fn all_home(&self) -> bool {
        self.tokens.iter().all(|t| t.is_home)
    }
}
