//! 选子策略
//!
//! 三种难度共用一套合法走法，区别只在于如何从中挑选。

use std::time::Duration;

use protocol::{Board, Player, TokenMove, MoveRules, ROLL_TO_START};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::evaluate::Evaluator;

// 重导出 Difficulty 以便外部使用
pub use protocol::Difficulty;

/// AI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: Difficulty,
    /// 每次行动前的"思考"时间
    pub think_delay_ms: u64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                difficulty,
                think_delay_ms: 2000,
            },
            Difficulty::Medium => Self {
                difficulty,
                think_delay_ms: 1500,
            },
            Difficulty::Hard => Self {
                difficulty,
                think_delay_ms: 1000,
            },
        }
    }

    pub fn think_delay(&self) -> Duration {
        Duration::from_millis(self.think_delay_ms)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::from_difficulty(Difficulty::Medium)
    }
}

/// AI 玩家
pub struct AiPlayer {
    config: AiConfig,
    rng: ChaCha8Rng,
}

impl AiPlayer {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// 从难度创建
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        Self::new(AiConfig::from_difficulty(difficulty))
    }

    /// 固定种子（测试用，结果可复现）
    pub fn with_seed(difficulty: Difficulty, seed: u64) -> Self {
        Self {
            config: AiConfig::from_difficulty(difficulty),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    pub fn think_delay(&self) -> Duration {
        self.config.think_delay()
    }

    /// 选择要移动的棋子，没有合法走法时返回 None
    pub fn select_token(&mut self, player: &Player, dice: u8, board: &Board) -> Option<u8> {
        let moves = MoveRules::legal_moves(player, dice, board);
        if moves.is_empty() {
            return None;
        }

        let chosen = match self.config.difficulty {
            Difficulty::Easy => self.select_easy(&moves),
            Difficulty::Medium => Self::select_medium(&moves, dice),
            Difficulty::Hard => Self::select_hard(&moves, player, board),
        };

        debug!(
            player = player.id,
            difficulty = %self.config.difficulty,
            dice,
            candidates = moves.len(),
            "AI selected {}",
            chosen
        );
        Some(chosen.token_id)
    }

    /// 简单：随机
    fn select_easy(&mut self, moves: &[TokenMove]) -> TokenMove {
        moves[self.rng.gen_range(0..moves.len())]
    }

    /// 中等：吃子 > 出基地 > 最靠前的棋子
    fn select_medium(moves: &[TokenMove], dice: u8) -> TokenMove {
        if let Some(mv) = moves.iter().find(|m| m.captures.is_some()) {
            return *mv;
        }

        if dice == ROLL_TO_START {
            if let Some(mv) = moves.iter().find(|m| m.is_base_exit()) {
                return *mv;
            }
        }

        // 位置相同时保留先出现的
        let mut best = moves[0];
        for mv in &moves[1..] {
            if mv.from > best.from {
                best = *mv;
            }
        }
        best
    }

    /// 困难：逐个评分，取第一个最高分
    fn select_hard(moves: &[TokenMove], player: &Player, board: &Board) -> TokenMove {
        let mut best = moves[0];
        let mut best_score = Evaluator::score(&best, player, board);
        for mv in &moves[1..] {
            let score = Evaluator::score(mv, player, board);
            if score > best_score {
                best = *mv;
                best_score = score;
            }
        }
        best
    }
}
