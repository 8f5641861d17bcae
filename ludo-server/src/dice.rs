//! 骰子
//!
//! 每名玩家的第 1 次掷骰以及第 5、10、15…… 次固定为 6，其余均匀分布。

use std::collections::HashMap;

use protocol::{PlayerId, DICE_MAX, DICE_MIN, RIGGED_ROLL_INTERVAL, ROLL_TO_START};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 掷骰器
#[derive(Debug)]
pub struct DiceRoller {
    rng: ChaCha8Rng,
    /// 玩家 ID -> 已掷次数
    roll_counts: HashMap<PlayerId, u32>,
}

impl DiceRoller {
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            roll_counts: HashMap::new(),
        }
    }

    /// 固定种子（测试用）
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            roll_counts: HashMap::new(),
        }
    }

    /// 为玩家掷一次骰子
    pub fn roll(&mut self, player_id: PlayerId) -> u8 {
        let count = self.roll_counts.entry(player_id).or_insert(0);
        *count += 1;

        if is_rigged_roll(*count) {
            ROLL_TO_START
        } else {
            self.rng.gen_range(DICE_MIN..=DICE_MAX)
        }
    }

    /// 玩家已掷次数
    pub fn roll_count(&self, player_id: PlayerId) -> u32 {
        self.roll_counts.get(&player_id).copied().unwrap_or(0)
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::new()
    }
}

/// 第 n 次（从 1 开始）掷骰是否固定为 6
pub fn is_rigged_roll(roll_number: u32) -> bool {
    roll_number == 1 || roll_number % RIGGED_ROLL_INTERVAL == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rigged_schedule() {
        let mut dice = DiceRoller::with_seed(99);
        for n in 1..=40u32 {
            let value = dice.roll(1);
            assert!((DICE_MIN..=DICE_MAX).contains(&value));
            if n == 1 || n % 5 == 0 {
                assert_eq!(value, 6, "roll #{} must be 6", n);
            }
        }
        assert_eq!(dice.roll_count(1), 40);
    }

    #[test]
    fn test_counts_are_per_player() {
        let mut dice = DiceRoller::with_seed(3);
        assert_eq!(dice.roll(1), 6);
        // 第二名玩家的第一次也固定为 6
        assert_eq!(dice.roll(2), 6);
        dice.roll(1);
        assert_eq!(dice.roll_count(1), 2);
        assert_eq!(dice.roll_count(2), 1);
        assert_eq!(dice.roll_count(3), 0);
    }

    #[test]
    fn test_is_rigged_roll() {
        assert!(is_rigged_roll(1));
        assert!(!is_rigged_roll(2));
        assert!(!is_rigged_roll(4));
        assert!(is_rigged_roll(5));
        assert!(is_rigged_roll(10));
        assert!(!is_rigged_roll(11));
    }

    #[test]
    fn test_seeded_rolls_repeat() {
        let mut a = DiceRoller::with_seed(11);
        let mut b = DiceRoller::with_seed(11);
        for _ in 0..20 {
            assert_eq!(a.roll(5), b.roll(5));
        }
    }
}
