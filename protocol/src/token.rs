//! 颜色与棋子定义

use serde::{Deserialize, Serialize};

use crate::constants::{BASE_POSITION, FINAL_POSITION, HOME_STRETCH_START, TRACK_CELLS};

/// 玩家颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    /// 座位分配顺序
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    /// 数组下标
    pub fn index(&self) -> usize {
        match self {
            Color::Red => 0,
            Color::Blue => 1,
            Color::Green => 2,
            Color::Yellow => 3,
        }
    }

    /// 出基地后落在的跑道位置
    pub fn start_position(&self) -> i32 {
        match self {
            Color::Red => 0,
            Color::Blue => 13,
            Color::Green => 26,
            Color::Yellow => 39,
        }
    }

    /// 进入终点通道的跑道位置
    pub fn home_entry(&self) -> i32 {
        match self {
            Color::Red => 50,
            Color::Blue => 11,
            Color::Green => 24,
            Color::Yellow => 37,
        }
    }

    /// 名称（与线上格式一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: u8,
    pub color: Color,
    /// -1 = 基地，0..=51 = 跑道，52..=57 = 终点通道
    pub position: i32,
    pub is_home: bool,
    pub is_safe: bool,
}

impl Token {
    /// 在基地中创建棋子
    pub fn new(id: u8, color: Color) -> Self {
        Self {
            id,
            color,
            position: BASE_POSITION,
            is_home: false,
            // 基地是安全区
            is_safe: true,
        }
    }

    /// 是否在基地
    pub fn in_base(&self) -> bool {
        self.position == BASE_POSITION
    }

    /// 是否在公共跑道上
    pub fn on_track(&self) -> bool {
        is_track_position(self.position)
    }

    /// 是否在终点通道中
    pub fn in_home_stretch(&self) -> bool {
        is_home_stretch_position(self.position)
    }

    /// 送回基地
    pub fn send_to_base(&mut self) {
        self.position = BASE_POSITION;
        self.is_home = false;
        self.is_safe = true;
    }

    /// 棋盘引用
    pub fn token_ref(&self) -> TokenRef {
        TokenRef {
            color: self.color,
            token_id: self.id,
        }
    }
}

/// 棋盘格对棋子的引用（颜色 + 编号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub color: Color,
    pub token_id: u8,
}

/// 位置是否在公共跑道上
pub fn is_track_position(position: i32) -> bool {
    (0..TRACK_CELLS).contains(&position)
}

/// 位置是否在终点通道中
pub fn is_home_stretch_position(position: i32) -> bool {
    (HOME_STRETCH_START..=FINAL_POSITION).contains(&position)
}
