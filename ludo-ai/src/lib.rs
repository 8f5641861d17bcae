//! 飞行棋 AI
//!
//! 包含:
//! - 三种难度的选子策略（随机 / 规则优先 / 评分）
//! - 困难难度的走法评估函数

mod evaluate;
mod strategy;

pub use evaluate::Evaluator;
pub use strategy::{AiConfig, AiPlayer, Difficulty};
