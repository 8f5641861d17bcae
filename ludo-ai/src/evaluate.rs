//! 走法评估函数（困难难度使用）

use protocol::{is_track_position, Board, Color, Player, TokenMove, TRACK_CELLS};

/// 吃子
const CAPTURE_BONUS: i32 = 1000;
/// 出基地
const BASE_EXIT_BONUS: i32 = 500;
/// 进入终点通道
const HOME_STRETCH_BONUS: i32 = 800;
/// 落在安全格
const SAFE_BONUS: i32 = 300;
/// 每前进一格
const PROGRESS_WEIGHT: i32 = 10;
/// 附近没有己方棋子
const ISOLATION_PENALTY: i32 = 200;
/// 身后 6 格内有对手
const DANGER_PENALTY: i32 = 400;
/// 挡住即将到家的对手
const BLOCK_BONUS: i32 = 600;

/// 感知半径（一次掷骰的最大步数）
const REACH: i32 = 6;

/// 对手位置超过该值视为临近终点
const NEAR_HOME_POSITION: i32 = 45;

/// 评估器
pub struct Evaluator;

impl Evaluator {
    /// 给一步走子打分，分数越高越好
    pub fn score(mv: &TokenMove, player: &Player, board: &Board) -> i32 {
        let mut score = 0;

        if mv.captures.is_some() {
            score += CAPTURE_BONUS;
        }
        if mv.is_base_exit() {
            score += BASE_EXIT_BONUS;
        }
        if mv.reaches_home_stretch() {
            score += HOME_STRETCH_BONUS;
        }
        if board.is_safe(mv.to) {
            score += SAFE_BONUS;
        }

        score += mv.to * PROGRESS_WEIGHT;

        if Self::is_isolated(mv, player) {
            score -= ISOLATION_PENALTY;
        }
        if Self::is_dangerous(mv.to, player.color, board) {
            score -= DANGER_PENALTY;
        }
        if Self::blocks_opponent(mv.to, player.color, board) {
            score += BLOCK_BONUS;
        }

        score
    }

    /// 环形跑道上两点间的最短距离
    pub fn ring_distance(a: i32, b: i32) -> i32 {
        let d = (a - b).rem_euclid(TRACK_CELLS);
        d.min(TRACK_CELLS - d)
    }

    /// 落点在跑道上，且 6 格内没有其他己方跑道棋子
    fn is_isolated(mv: &TokenMove, player: &Player) -> bool {
        if !is_track_position(mv.to) {
            return false;
        }
        !player
            .tokens
            .iter()
            .filter(|t| t.id != mv.token_id && t.on_track())
            .any(|t| Self::ring_distance(t.position, mv.to) <= REACH)
    }

    /// 非安全跑道落点身后 6 格内有对手棋子
    fn is_dangerous(pos: i32, color: Color, board: &Board) -> bool {
        if board.is_safe(pos) {
            return false;
        }
        (1..=REACH).any(|i| board.has_opponent((pos - i).rem_euclid(TRACK_CELLS), color))
    }

    /// 落点前方 6 格内有临近终点的对手棋子
    fn blocks_opponent(pos: i32, color: Color, board: &Board) -> bool {
        if !is_track_position(pos) {
            return false;
        }
        (1..=REACH).any(|i| {
            let ahead = (pos + i) % TRACK_CELLS;
            ahead > NEAR_HOME_POSITION && board.has_opponent(ahead, color)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{MoveRules, TokenRef};

    fn place(board: &mut Board, player: &mut Player, token_id: u8, position: i32) {
        let token = &mut player.tokens[token_id as usize];
        token.position = position;
        token.is_safe = board.is_safe(position);
        board.place(token.token_ref(), position);
    }

    #[test]
    fn test_ring_distance_wraps() {
        assert_eq!(Evaluator::ring_distance(50, 2), 4);
        assert_eq!(Evaluator::ring_distance(2, 50), 4);
        assert_eq!(Evaluator::ring_distance(10, 10), 0);
        assert_eq!(Evaluator::ring_distance(0, 26), 26);
    }

    #[test]
    fn test_base_exit_score() {
        let board = Board::new();
        let player = Player::new(1, "alice", Color::Red);
        let mv = MoveRules::plan(&player.tokens[0], 6, &board).unwrap();

        // 出基地 + 安全格 + 进度 0，没有其他跑道棋子所以是孤立的
        assert_eq!(Evaluator::score(&mv, &player, &board), 500 + 300 - 200);
    }

    #[test]
    fn test_capture_outweighs_progress() {
        let mut board = Board::new();
        let mut player = Player::new(1, "alice", Color::Red);
        place(&mut board, &mut player, 0, 3);
        place(&mut board, &mut player, 1, 20);
        board.place(TokenRef { color: Color::Blue, token_id: 0 }, 5);

        let capture = MoveRules::plan(&player.tokens[0], 2, &board).unwrap();
        let advance = MoveRules::plan(&player.tokens[1], 2, &board).unwrap();
        assert!(
            Evaluator::score(&capture, &player, &board)
                > Evaluator::score(&advance, &player, &board)
        );
    }

    #[test]
    fn test_danger_penalty() {
        let mut board = Board::new();
        let mut player = Player::new(1, "alice", Color::Red);
        place(&mut board, &mut player, 0, 14);
        place(&mut board, &mut player, 1, 16);
        board.place(TokenRef { color: Color::Green, token_id: 0 }, 15);

        // 14 -> 17，身后 15 有绿棋
        let mv = MoveRules::plan(&player.tokens[0], 3, &board).unwrap();
        let expected = 17 * 10 - 400;
        assert_eq!(Evaluator::score(&mv, &player, &board), expected);
    }

    #[test]
    fn test_home_stretch_is_safe_and_not_isolated() {
        let board = Board::new();
        let mut player = Player::new(1, "alice", Color::Red);
        player.tokens[0].position = 48;

        let mv = MoveRules::plan(&player.tokens[0], 4, &board).unwrap();
        assert_eq!(mv.to, 54);
        assert_eq!(Evaluator::score(&mv, &player, &board), 800 + 300 + 540);
    }

    #[test]
    fn test_block_bonus() {
        let mut board = Board::new();
        let mut player = Player::new(1, "alice", Color::Blue);
        place(&mut board, &mut player, 0, 40);
        place(&mut board, &mut player, 1, 44);
        board.place(TokenRef { color: Color::Yellow, token_id: 2 }, 48);

        // 40 -> 43，前方 48 有临近终点的黄棋
        let mv = MoveRules::plan(&player.tokens[0], 3, &board).unwrap();
        assert_eq!(Evaluator::score(&mv, &player, &board), 430 + 600);
    }
}
