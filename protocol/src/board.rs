//! 棋盘状态
//!
//! 格子只保存棋子引用（颜色 + 编号），棋子本身归玩家所有。

use serde::{Deserialize, Serialize};

use crate::constants::{HOME_CELLS, HOME_STRETCH_START, SAFE_POSITIONS, TRACK_CELLS};
use crate::token::{is_home_stretch_position, is_track_position, Color, TokenRef};

/// 跑道格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub position: i32,
    pub is_safe: bool,
    /// 当前占用者；非安全格最多一个
    pub occupants: Vec<TokenRef>,
}

impl Cell {
    fn new(position: i32) -> Self {
        Self {
            position,
            is_safe: SAFE_POSITIONS.contains(&position),
            occupants: Vec::new(),
        }
    }
}

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 52 格公共跑道
    cells: Vec<Cell>,
    /// 每种颜色 6 格终点通道，按 Color::index 排列，保存棋子编号
    home_stretches: Vec<[Option<u8>; HOME_CELLS as usize]>,
}

impl Board {
    /// 创建空棋盘
    pub fn new() -> Self {
        Self {
            cells: (0..TRACK_CELLS).map(Cell::new).collect(),
            home_stretches: vec![[None; HOME_CELLS as usize]; Color::ALL.len()],
        }
    }

    /// 获取跑道格
    pub fn cell(&self, position: i32) -> Option<&Cell> {
        if is_track_position(position) {
            self.cells.get(position as usize)
        } else {
            None
        }
    }

    /// 所有跑道格
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// 某颜色的终点通道
    pub fn home_stretch(&self, color: Color) -> &[Option<u8>; HOME_CELLS as usize] {
        &self.home_stretches[color.index()]
    }

    /// 位置是否安全（基地和终点通道总是安全）
    pub fn is_safe(&self, position: i32) -> bool {
        match self.cell(position) {
            Some(cell) => cell.is_safe,
            None => true,
        }
    }

    /// 跑道格上的棋子
    pub fn occupants(&self, position: i32) -> &[TokenRef] {
        self.cell(position)
            .map(|c| c.occupants.as_slice())
            .unwrap_or(&[])
    }

    /// 目标位置是否已有同色棋子
    pub fn has_own_token(&self, position: i32, color: Color) -> bool {
        if is_home_stretch_position(position) {
            let idx = (position - HOME_STRETCH_START) as usize;
            self.home_stretches[color.index()][idx].is_some()
        } else {
            self.occupants(position).iter().any(|r| r.color == color)
        }
    }

    /// 可被吃掉的对手棋子（非安全跑道格上的异色棋子）
    pub fn capturable_at(&self, position: i32, color: Color) -> Option<TokenRef> {
        let cell = self.cell(position)?;
        if cell.is_safe {
            return None;
        }
        cell.occupants.iter().copied().find(|r| r.color != color)
    }

    /// 跑道格上是否有对手棋子（不论是否安全）
    pub fn has_opponent(&self, position: i32, color: Color) -> bool {
        self.occupants(position).iter().any(|r| r.color != color)
    }

    /// 放置棋子；基地位置忽略
    pub fn place(&mut self, token: TokenRef, position: i32) {
        if is_track_position(position) {
            self.cells[position as usize].occupants.push(token);
        } else if is_home_stretch_position(position) {
            let idx = (position - HOME_STRETCH_START) as usize;
            self.home_stretches[token.color.index()][idx] = Some(token.token_id);
        }
    }

    /// 移除棋子；不在该位置时无操作
    pub fn remove(&mut self, token: TokenRef, position: i32) {
        if is_track_position(position) {
            self.cells[position as usize].occupants.retain(|r| *r != token);
        } else if is_home_stretch_position(position) {
            let idx = (position - HOME_STRETCH_START) as usize;
            let slot = &mut self.home_stretches[token.color.index()][idx];
            if *slot == Some(token.token_id) {
                *slot = None;
            }
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(color: Color, token_id: u8) -> TokenRef {
        TokenRef { color, token_id }
    }

    #[test]
    fn test_new_board() {
        let board = Board::new();
        assert_eq!(board.cells().len(), 52);
        assert!(board.is_safe(0));
        assert!(board.is_safe(47));
        assert!(!board.is_safe(1));
        // 基地与终点通道都是安全的
        assert!(board.is_safe(-1));
        assert!(board.is_safe(55));
        assert!(board.home_stretch(Color::Red).iter().all(|s| s.is_none()));
    }

    #[test]
    fn test_place_and_remove_on_track() {
        let mut board = Board::new();
        board.place(r(Color::Red, 0), 5);
        assert_eq!(board.occupants(5), &[r(Color::Red, 0)]);
        assert!(board.has_own_token(5, Color::Red));
        assert!(!board.has_own_token(5, Color::Blue));

        board.remove(r(Color::Red, 0), 5);
        assert!(board.occupants(5).is_empty());
    }

    #[test]
    fn test_home_stretch_slots() {
        let mut board = Board::new();
        board.place(r(Color::Blue, 2), 54);
        assert!(board.has_own_token(54, Color::Blue));
        // 终点通道按颜色隔离
        assert!(!board.has_own_token(54, Color::Red));
        board.remove(r(Color::Blue, 2), 54);
        assert!(!board.has_own_token(54, Color::Blue));
    }

    #[test]
    fn test_capturable_only_on_unsafe_cells() {
        let mut board = Board::new();
        board.place(r(Color::Blue, 1), 5);
        board.place(r(Color::Blue, 3), 8);

        assert_eq!(board.capturable_at(5, Color::Red), Some(r(Color::Blue, 1)));
        assert_eq!(board.capturable_at(5, Color::Blue), None);
        // 8 号格是安全格
        assert_eq!(board.capturable_at(8, Color::Red), None);
        assert!(board.has_opponent(8, Color::Red));
        assert_eq!(board.capturable_at(60, Color::Red), None);
    }
}
