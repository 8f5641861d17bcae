//! 走法计算和验证
//!
//! 引擎与 AI 共用同一套规则，保证 AI 选出的棋子一定能被引擎接受。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::constants::{FINAL_POSITION, HOME_STRETCH_START, ROLL_TO_START, TRACK_CELLS};
use crate::player::Player;
use crate::token::{is_track_position, Token, TokenRef};

/// 一步走子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenMove {
    pub token_id: u8,
    pub from: i32,
    pub to: i32,
    /// 会被吃掉的对手棋子
    pub captures: Option<TokenRef>,
}

impl TokenMove {
    /// 是否从基地出发
    pub fn is_base_exit(&self) -> bool {
        self.from < 0
    }

    /// 是否进入（或停留在）终点通道
    pub fn reaches_home_stretch(&self) -> bool {
        self.to >= HOME_STRETCH_START
    }
}

impl std::fmt::Display for TokenMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} -> {}", self.token_id, self.from, self.to)
    }
}

/// 走法规则
pub struct MoveRules;

impl MoveRules {
    /// 计算目标位置（不检查合法性，结果可能超过 57）
    ///
    /// 基地出发落在本色起点；跨过本色入口时溢出部分变为终点通道下标，
    /// 否则在 52 格跑道上取模。
    pub fn destination(token: &Token, dice: u8) -> i32 {
        if token.in_base() {
            return token.color.start_position();
        }

        let pos = token.position;
        let new_pos = pos + dice as i32;
        let entry = token.color.home_entry();

        if pos < entry && new_pos >= entry {
            return HOME_STRETCH_START + (new_pos - entry);
        }

        if new_pos >= TRACK_CELLS && pos < TRACK_CELLS {
            return new_pos % TRACK_CELLS;
        }

        new_pos
    }

    /// 棋子能否以该点数移动
    pub fn can_move(token: &Token, dice: u8, board: &Board) -> bool {
        if token.is_home {
            return false;
        }
        if token.in_base() && dice != ROLL_TO_START {
            return false;
        }

        let dest = Self::destination(token, dice);
        if dest > FINAL_POSITION {
            return false;
        }

        !board.has_own_token(dest, token.color)
    }

    /// 目标位置上会被吃掉的棋子（只在跑道上发生）
    pub fn capture_target(token: &Token, dest: i32, board: &Board) -> Option<TokenRef> {
        if !is_track_position(dest) {
            return None;
        }
        board.capturable_at(dest, token.color)
    }

    /// 生成单个棋子的走法
    pub fn plan(token: &Token, dice: u8, board: &Board) -> Option<TokenMove> {
        if !Self::can_move(token, dice, board) {
            return None;
        }
        let to = Self::destination(token, dice);
        Some(TokenMove {
            token_id: token.id,
            from: token.position,
            to,
            captures: Self::capture_target(token, to, board),
        })
    }

    /// 玩家所有合法走法（按棋子编号顺序）
    pub fn legal_moves(player: &Player, dice: u8, board: &Board) -> Vec<TokenMove> {
        player
            .tokens
            .iter()
            .filter_map(|t| Self::plan(t, dice, board))
            .collect()
    }

    /// 是否存在合法走法
    pub fn has_legal_move(player: &Player, dice: u8, board: &Board) -> bool {
        player.tokens.iter().any(|t| Self::can_move(t, dice, board))
    }
}
