//! 对局引擎
//!
//! 一局飞行棋的全部可变状态都在一把读写锁后面：棋盘、房间模型、回合
//! 历史、掷骰器和 AI。回合计时器与 AI 行动都是独立的 tokio 任务，只持有
//! 引擎的弱引用，醒来后重新加锁并核对回合归属。
//!
//! 事件回调在持锁期间同步触发，实现方不能再回调引擎。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ludo_ai::AiPlayer;
use protocol::{
    Board, GameError, GameSnapshot, MoveRules, Player, PlayerId, PlayerResult, RoomModel,
    RoomStatus, TurnAction, FINAL_POSITION, MAX_CONSECUTIVE_SIX, MIN_PLAYERS,
    ROLL_FOR_EXTRA_TURN, TOKENS_PER_PLAYER, TURN_TIMEOUT,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dice::DiceRoller;

/// 对局事件回调
///
/// 所有方法默认什么都不做。
pub trait GameEvents: Send + Sync {
    fn on_dice_rolled(&self, _player_id: PlayerId, _value: u8, _extra_turn: bool) {}

    fn on_token_moved(
        &self,
        _player_id: PlayerId,
        _token_id: u8,
        _from: i32,
        _to: i32,
        _is_complete: bool,
    ) {
    }

    fn on_token_captured(
        &self,
        _captured_by: PlayerId,
        _captured_from: PlayerId,
        _token_id: u8,
        _position: i32,
    ) {
    }

    fn on_turn_changed(&self, _player_id: PlayerId) {}

    fn on_game_over(&self, _summary: &GameOverSummary) {}
}

/// 不关心事件时使用
pub struct NoopEvents;

impl GameEvents for NoopEvents {}

/// 对局结束时的汇总
#[derive(Debug, Clone)]
pub struct GameOverSummary {
    pub winner: Player,
    /// 胜者在前，其余按座位顺序
    pub rankings: Vec<Player>,
    pub duration_seconds: i64,
    pub results: Vec<PlayerResult>,
    /// 结束时的完整快照
    pub snapshot: GameSnapshot,
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 人类玩家的回合超时
    pub turn_timeout: Duration,
    /// 覆盖 AI 难度自带的思考时间
    pub ai_think_delay: Option<Duration>,
    /// 固定随机种子（骰子、先手、AI）
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_timeout: TURN_TIMEOUT,
            ai_think_delay: None,
            seed: None,
        }
    }
}

/// 单个玩家的统计计数
#[derive(Debug, Default, Clone, Copy)]
struct PlayerCounters {
    captures: u32,
    tokens_lost: u32,
    dice_rolls: u32,
    sixes_rolled: u32,
}

struct EngineState {
    room: RoomModel,
    board: Board,
    turn_history: Vec<TurnAction>,
    start_time: Option<DateTime<Utc>>,
    winner: Option<Player>,
    rankings: Vec<Player>,
    dice: DiceRoller,
    /// 先手选择
    rng: ChaCha8Rng,
    /// 本回合已掷出、尚未使用的点数
    turn_dice: Option<u8>,
    counters: HashMap<PlayerId, PlayerCounters>,
    ais: HashMap<PlayerId, AiPlayer>,
    turn_timer: Option<JoinHandle<()>>,
}

impl EngineState {
    fn current_player_id(&self) -> Option<PlayerId> {
        self.room.current_player().map(|p| p.id)
    }

    fn is_playing(&self) -> bool {
        self.room.state == RoomStatus::Playing
    }

    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            room: self.room.clone(),
            board: self.board.clone(),
            turn_history: self.turn_history.clone(),
            start_time: self.start_time,
            winner: self.winner.clone(),
            rankings: self.rankings.clone(),
        }
    }

    fn counters_mut(&mut self, player_id: PlayerId) -> &mut PlayerCounters {
        self.counters.entry(player_id).or_default()
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.turn_timer.take() {
            handle.abort();
        }
    }
}

struct EngineShared {
    state: RwLock<EngineState>,
    events: Arc<dyn GameEvents>,
    config: EngineConfig,
}

/// 对局引擎句柄，克隆开销很小
#[derive(Clone)]
pub struct GameEngine {
    shared: Arc<EngineShared>,
}

impl GameEngine {
    /// 用房间当前的玩家名单创建引擎（尚未开始）
    pub fn new(room: RoomModel, events: Arc<dyn GameEvents>, config: EngineConfig) -> Self {
        let (dice, rng) = match config.seed {
            Some(seed) => (
                DiceRoller::with_seed(seed),
                ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (DiceRoller::new(), ChaCha8Rng::from_entropy()),
        };

        let ais = room
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_ai)
            .map(|(seat, p)| {
                let level = p.ai_level.unwrap_or_default();
                let ai = match config.seed {
                    Some(seed) => AiPlayer::with_seed(level, seed.wrapping_add(seat as u64 + 2)),
                    None => AiPlayer::from_difficulty(level),
                };
                (p.id, ai)
            })
            .collect();

        let state = EngineState {
            room,
            board: Board::new(),
            turn_history: Vec::new(),
            start_time: None,
            winner: None,
            rankings: Vec::new(),
            dice,
            rng,
            turn_dice: None,
            counters: HashMap::new(),
            ais,
            turn_timer: None,
        };

        Self {
            shared: Arc::new(EngineShared {
                state: RwLock::new(state),
                events,
                config,
            }),
        }
    }

    /// 开局：随机选择先手
    pub fn start(&self) -> Result<(), GameError> {
        self.shared.start()
    }

    /// 当前玩家掷骰，返回 (点数, 是否获得额外回合)
    pub fn roll_dice(&self, player_id: PlayerId) -> Result<(u8, bool), GameError> {
        let mut st = self.shared.write();
        self.shared.roll_locked(&mut st, player_id)
    }

    /// 用本回合掷出的点数移动一枚棋子
    pub fn move_token(&self, player_id: PlayerId, token_id: i64) -> Result<(), GameError> {
        let mut st = self.shared.write();
        self.shared.move_locked(&mut st, player_id, token_id)
    }

    /// 完整快照
    pub fn get_state(&self) -> GameSnapshot {
        self.shared.read().snapshot()
    }

    pub fn status(&self) -> RoomStatus {
        self.shared.read().room.state
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.shared.read().current_player_id()
    }

    /// 本回合尚未使用的点数
    pub fn pending_dice(&self) -> Option<u8> {
        self.shared.read().turn_dice
    }

    /// 标记玩家断线/重连；轮到断线玩家时立即跳过
    pub fn set_player_connected(&self, player_id: PlayerId, connected: bool) {
        self.shared.set_player_connected(player_id, connected);
    }

    /// 结束后的汇总（未结束时为 None）
    pub fn summary(&self) -> Option<GameOverSummary> {
        let st = self.shared.read();
        st.winner.as_ref().map(|winner| self.shared.summarize(&st, winner.clone()))
    }
}

impl EngineShared {
    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>) -> Result<(), GameError> {
        let mut st = self.write();
        if st.room.state != RoomStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        let count = st.room.players.len();
        if count < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                count,
                min: MIN_PLAYERS,
            });
        }

        let first = st.rng.gen_range(0..count);
        let now = Utc::now();
        st.room.current_turn = first;
        st.room.state = RoomStatus::Playing;
        st.room.started_at = Some(now);
        st.start_time = Some(now);

        info!(
            room_id = %st.room.id,
            players = count,
            first_seat = first,
            "game started"
        );

        if let Some(player_id) = st.current_player_id() {
            self.events.on_turn_changed(player_id);
        }
        self.begin_turn(&mut st);
        Ok(())
    }

    fn roll_locked(
        self: &Arc<Self>,
        st: &mut EngineState,
        player_id: PlayerId,
    ) -> Result<(u8, bool), GameError> {
        if !st.is_playing() {
            return Err(GameError::GameNotPlaying);
        }
        if st.current_player_id() != Some(player_id) {
            return Err(GameError::NotYourTurn);
        }
        if st.turn_dice.is_some() {
            return Err(GameError::AlreadyRolled);
        }

        let value = st.dice.roll(player_id);
        st.room.last_dice = value;
        {
            let counters = st.counters_mut(player_id);
            counters.dice_rolls += 1;
            if value == ROLL_FOR_EXTRA_TURN {
                counters.sixes_rolled += 1;
            }
        }

        let seat = st.room.current_turn;
        if value == ROLL_FOR_EXTRA_TURN {
            let player = &mut st.room.players[seat];
            player.consecutive_six += 1;
            if player.consecutive_six >= MAX_CONSECUTIVE_SIX {
                // 连续三个 6，失去回合
                debug!(player_id, "third consecutive six, turn forfeited");
                self.advance_turn(st);
                self.events.on_dice_rolled(player_id, value, false);
                return Ok((value, false));
            }
        } else {
            st.room.players[seat].consecutive_six = 0;
        }

        let has_move = MoveRules::has_legal_move(&st.room.players[seat], value, &st.board);
        if !has_move {
            // 无子可走：回合直接结束，6 也不例外
            debug!(player_id, value, "no legal move, turn passes");
            self.advance_turn(st);
            self.events.on_dice_rolled(player_id, value, false);
            return Ok((value, false));
        }

        let extra_turn = value == ROLL_FOR_EXTRA_TURN;
        st.turn_dice = Some(value);
        self.events.on_dice_rolled(player_id, value, extra_turn);
        Ok((value, extra_turn))
    }

    fn move_locked(
        self: &Arc<Self>,
        st: &mut EngineState,
        player_id: PlayerId,
        token_id: i64,
    ) -> Result<(), GameError> {
        if !st.is_playing() {
            return Err(GameError::GameNotPlaying);
        }
        if st.current_player_id() != Some(player_id) {
            return Err(GameError::NotYourTurn);
        }
        if !(0..TOKENS_PER_PLAYER as i64).contains(&token_id) {
            return Err(GameError::InvalidTokenId(token_id));
        }
        let token_id = token_id as u8;
        let dice = st.turn_dice.ok_or(GameError::InvalidMove { token_id })?;

        let seat = st.room.current_turn;
        let token = st.room.players[seat].tokens[token_id as usize];
        let mv = MoveRules::plan(&token, dice, &st.board).ok_or(GameError::InvalidMove { token_id })?;

        st.board.remove(token.token_ref(), mv.from);

        // 先结算吃子，再落子
        let mut captured_from = None;
        if let Some(victim) = mv.captures {
            st.board.remove(victim, mv.to);
            if let Some(owner) = st.room.players.iter_mut().find(|p| p.color == victim.color) {
                owner.tokens[victim.token_id as usize].send_to_base();
                captured_from = Some(owner.id);
            }
            st.counters_mut(player_id).captures += 1;
            if let Some(owner_id) = captured_from {
                st.counters_mut(owner_id).tokens_lost += 1;
            }
        }

        let is_complete = mv.to == FINAL_POSITION;
        {
            let player = &mut st.room.players[seat];
            let moved = &mut player.tokens[token_id as usize];
            moved.position = mv.to;
            if is_complete {
                moved.is_home = true;
                moved.is_safe = true;
            } else {
                st.board.place(moved.token_ref(), mv.to);
                moved.is_safe = st.board.is_safe(mv.to);
            }
            player.tokens_at_home = player.tokens.iter().filter(|t| t.is_home).count();
        }

        st.turn_history.push(TurnAction {
            player_id,
            dice_value: dice,
            token_id,
            from_pos: mv.from,
            to_pos: mv.to,
            captured: mv.captures,
            timestamp: Utc::now(),
        });
        st.turn_dice = None;

        if let (Some(victim), Some(owner_id)) = (mv.captures, captured_from) {
            info!(
                room_id = %st.room.id,
                captured_by = player_id,
                captured_from = owner_id,
                position = mv.to,
                "token captured"
            );
            self.events
                .on_token_captured(player_id, owner_id, victim.token_id, mv.to);
        }
        self.events
            .on_token_moved(player_id, token_id, mv.from, mv.to, is_complete);

        if st.room.players[seat].all_home() {
            self.finish(st, seat);
        } else if dice != ROLL_FOR_EXTRA_TURN {
            self.advance_turn(st);
        }
        Ok(())
    }

    /// 轮到下一个座位
    fn advance_turn(self: &Arc<Self>, st: &mut EngineState) {
        let count = st.room.players.len();
        if count == 0 {
            return;
        }
        let outgoing = st.room.current_turn;
        if let Some(player) = st.room.players.get_mut(outgoing) {
            player.consecutive_six = 0;
        }
        st.turn_dice = None;
        st.room.current_turn = (outgoing + 1) % count;

        if let Some(player_id) = st.current_player_id() {
            self.events.on_turn_changed(player_id);
        }
        self.begin_turn(st);
    }

    /// 为新的当前玩家安排 AI 行动或回合计时
    fn begin_turn(self: &Arc<Self>, st: &mut EngineState) {
        let Some(current) = st.room.current_player() else {
            return;
        };
        let player_id = current.id;

        if current.is_ai {
            st.cancel_timer();
            self.schedule_ai(st, player_id);
        } else if current.is_connected {
            self.arm_turn_timer(st, player_id, self.config.turn_timeout);
        } else if st.room.players.iter().any(|p| p.is_ai || p.is_connected) {
            // 断线玩家的回合立即跳过
            self.arm_turn_timer(st, player_id, Duration::ZERO);
        } else {
            st.cancel_timer();
        }
    }

    fn arm_turn_timer(self: &Arc<Self>, st: &mut EngineState, player_id: PlayerId, delay: Duration) {
        st.cancel_timer();
        let Ok(handle) = Handle::try_current() else {
            debug!(player_id, "no runtime, turn timer not armed");
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let seat = st.room.current_turn;
        st.turn_timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_turn_timeout(seat, player_id);
            }
        }));
    }

    fn on_turn_timeout(self: &Arc<Self>, seat: usize, player_id: PlayerId) {
        let mut st = self.write();
        if !st.is_playing()
            || st.room.current_turn != seat
            || st.current_player_id() != Some(player_id)
        {
            return;
        }
        // 当前任务自己的句柄，不能 abort
        st.turn_timer = None;
        info!(room_id = %st.room.id, player_id, "turn timed out");
        self.advance_turn(&mut st);
    }

    fn schedule_ai(self: &Arc<Self>, st: &EngineState, player_id: PlayerId) {
        let Ok(handle) = Handle::try_current() else {
            debug!(player_id, "no runtime, AI turn not scheduled");
            return;
        };

        let delay = self.config.ai_think_delay.unwrap_or_else(|| {
            st.ais
                .get(&player_id)
                .map(|ai| ai.think_delay())
                .unwrap_or_default()
        });
        let weak: Weak<Self> = Arc::downgrade(self);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.run_ai_turn(player_id);
            }
        });
    }

    /// AI 的一次行动：掷骰、选子、走子
    fn run_ai_turn(self: &Arc<Self>, player_id: PlayerId) {
        let mut st = self.write();
        if !st.is_playing() || st.current_player_id() != Some(player_id) {
            return;
        }

        let (value, _) = match self.roll_locked(&mut st, player_id) {
            Ok(rolled) => rolled,
            Err(e) => {
                warn!(player_id, "AI roll failed: {}", e);
                return;
            }
        };
        if !st.is_playing() || st.current_player_id() != Some(player_id) {
            // 回合已在掷骰时结束
            return;
        }

        let seat = st.room.current_turn;
        let choice = {
            let EngineState {
                room, board, ais, ..
            } = &mut *st;
            match ais.get_mut(&player_id) {
                Some(ai) => ai.select_token(&room.players[seat], value, board),
                None => MoveRules::legal_moves(&room.players[seat], value, board)
                    .first()
                    .map(|m| m.token_id),
            }
        };

        match choice {
            Some(token_id) => {
                if let Err(e) = self.move_locked(&mut st, player_id, i64::from(token_id)) {
                    warn!(player_id, token_id, "AI move rejected: {}", e);
                    if st.current_player_id() == Some(player_id) {
                        self.advance_turn(&mut st);
                    }
                    return;
                }
            }
            None => {
                // 骰子未用掉就无法再掷，回合交出
                self.advance_turn(&mut st);
                return;
            }
        }

        // 额外回合
        if st.is_playing() && st.current_player_id() == Some(player_id) {
            self.schedule_ai(&st, player_id);
        }
    }

    fn set_player_connected(self: &Arc<Self>, player_id: PlayerId, connected: bool) {
        let mut st = self.write();
        let Some(player) = st.room.player_mut(player_id) else {
            return;
        };
        player.is_connected = connected;

        if st.is_playing() && st.current_player_id() == Some(player_id) {
            self.begin_turn(&mut st);
        }
    }

    fn finish(self: &Arc<Self>, st: &mut EngineState, seat: usize) {
        st.cancel_timer();
        st.turn_dice = None;

        let winner = st.room.players[seat].clone();
        let mut rankings = Vec::with_capacity(st.room.players.len());
        rankings.push(winner.clone());
        rankings.extend(
            st.room
                .players
                .iter()
                .filter(|p| p.id != winner.id)
                .cloned(),
        );

        st.room.state = RoomStatus::Finished;
        st.winner = Some(winner.clone());
        st.rankings = rankings;

        let summary = self.summarize(st, winner);
        info!(
            room_id = %st.room.id,
            winner = summary.winner.id,
            duration_seconds = summary.duration_seconds,
            "game over"
        );
        self.events.on_game_over(&summary);
    }

    fn summarize(&self, st: &EngineState, winner: Player) -> GameOverSummary {
        let duration_seconds = st
            .start_time
            .map(|start| (Utc::now() - start).num_seconds())
            .unwrap_or(0);

        let results = st
            .rankings
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let counters = st.counters.get(&p.id).copied().unwrap_or_default();
                PlayerResult {
                    player_id: p.id,
                    username: p.username.clone(),
                    color: p.color,
                    is_ai: p.is_ai,
                    rank: idx + 1,
                    won: p.id == winner.id,
                    captures: counters.captures,
                    tokens_lost: counters.tokens_lost,
                    tokens_home: p.tokens_at_home,
                    dice_rolls: counters.dice_rolls,
                    sixes_rolled: counters.sixes_rolled,
                }
            })
            .collect();

        GameOverSummary {
            winner,
            rankings: st.rankings.clone(),
            duration_seconds,
            results,
            snapshot: st.snapshot(),
        }
    }
}
