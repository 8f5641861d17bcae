//! 房间系统
//!
//! 每个房间一个后台循环：消费房间队列里的消息交给广播器，对局结束时
//! 把汇总交给存储；定期检查房间是否已空，空了就退出。
//! `RoomManager` 持有全部房间。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use protocol::{
    Board, DiceRolledPayload, Difficulty, ErrorCode, GameError, GameOverPayload, GameSnapshot,
    GameStatePayload, MessageType, NetworkMessage, Player, PlayerId, PlayerRefPayload, RoomId,
    RoomModel, RoomStatus, TokenCapturedPayload, TokenMovedPayload, MAX_PLAYERS, MIN_PLAYERS,
    ROOM_IDLE_CHECK, ROOM_QUEUE_CAPACITY,
};
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::game::{EngineConfig, GameEngine, GameEvents, GameOverSummary};
use crate::player::{Broadcaster, PlayerConnection};
use crate::storage::GameRecorder;

/// 房间错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(RoomId),

    #[error("room is full")]
    RoomFull,

    #[error("player {0} is already in the room")]
    AlreadyInRoom(PlayerId),

    #[error("player {0} is not in the room")]
    PlayerNotInRoom(PlayerId),

    #[error("game already started")]
    AlreadyStarted,

    #[error("room is not accepting players")]
    NotWaiting,

    #[error("wrong room password")]
    WrongPassword,

    #[error("max players must be between {min} and {max}, got {actual}")]
    InvalidMaxPlayers { actual: usize, min: usize, max: usize },

    #[error("room queue is full")]
    QueueFull,

    #[error("room is closed")]
    Closed,

    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// 转换为协议错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::NotFound(_) => ErrorCode::RoomNotFound,
            RoomError::RoomFull | RoomError::NotWaiting => ErrorCode::GameFull,
            RoomError::AlreadyInRoom(_)
            | RoomError::PlayerNotInRoom(_)
            | RoomError::AlreadyStarted
            | RoomError::WrongPassword => ErrorCode::Unauthorized,
            RoomError::InvalidMaxPlayers { .. } | RoomError::QueueFull | RoomError::Closed => {
                ErrorCode::InvalidMessage
            }
            RoomError::Game(e) => e.code(),
        }
    }
}

/// 房间配置
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub engine: EngineConfig,
    pub idle_check: Duration,
    pub queue_capacity: usize,
    pub min_players: usize,
    pub max_players: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            idle_check: ROOM_IDLE_CHECK,
            queue_capacity: ROOM_QUEUE_CAPACITY,
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
        }
    }
}

/// 创建房间的参数
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub name: String,
    pub max_players: usize,
    pub game_mode: String,
    pub is_private: bool,
    pub password: Option<String>,
}

/// 房间队列中的消息
#[derive(Debug)]
pub enum RoomMessage {
    /// 发给房间内所有连接
    Broadcast(NetworkMessage),
    /// 对局结束
    GameOver(Box<GameOverSummary>),
}

/// 把引擎事件转成房间消息
struct RoomEventSink {
    room_id: RoomId,
    tx: mpsc::Sender<RoomMessage>,
}

impl RoomEventSink {
    fn emit<P: Serialize>(&self, kind: MessageType, payload: &P) {
        match NetworkMessage::new(kind, payload) {
            Ok(msg) => self.push(RoomMessage::Broadcast(msg.with_room(self.room_id.clone()))),
            Err(e) => warn!(room_id = %self.room_id, "failed to encode event: {}", e),
        }
    }

    fn push(&self, msg: RoomMessage) {
        if let Err(e) = self.tx.try_send(msg) {
            warn!(room_id = %self.room_id, "room queue rejected event: {}", e);
        }
    }
}

impl GameEvents for RoomEventSink {
    fn on_dice_rolled(&self, player_id: PlayerId, value: u8, extra_turn: bool) {
        self.emit(
            MessageType::DiceRolled,
            &DiceRolledPayload {
                player_id,
                dice_value: value,
                extra_turn,
            },
        );
    }

    fn on_token_moved(&self, player_id: PlayerId, token_id: u8, from: i32, to: i32, done: bool) {
        self.emit(
            MessageType::TokenMoved,
            &TokenMovedPayload {
                player_id,
                token_id,
                from_pos: from,
                to_pos: to,
                is_complete: done,
            },
        );
    }

    fn on_token_captured(&self, by: PlayerId, from: PlayerId, token_id: u8, position: i32) {
        self.emit(
            MessageType::TokenCaptured,
            &TokenCapturedPayload {
                captured_by: by,
                captured_from: from,
                token_id,
                position,
            },
        );
    }

    fn on_turn_changed(&self, player_id: PlayerId) {
        self.emit(MessageType::TurnChanged, &PlayerRefPayload { player_id });
    }

    fn on_game_over(&self, summary: &GameOverSummary) {
        self.push(RoomMessage::GameOver(Box::new(summary.clone())));
    }
}

struct RoomInner {
    model: RoomModel,
    /// 人类玩家的连接记录
    connections: HashMap<PlayerId, PlayerConnection>,
    engine: Option<GameEngine>,
}

/// 房间
pub struct Room {
    id: RoomId,
    inner: RwLock<RoomInner>,
    tx: mpsc::Sender<RoomMessage>,
    rx: Mutex<Option<mpsc::Receiver<RoomMessage>>>,
    close_tx: watch::Sender<bool>,
    broadcaster: Arc<dyn Broadcaster>,
    recorder: Option<Arc<dyn GameRecorder>>,
    config: RoomConfig,
}

impl Room {
    pub fn new(
        model: RoomModel,
        broadcaster: Arc<dyn Broadcaster>,
        recorder: Option<Arc<dyn GameRecorder>>,
        config: RoomConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (close_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: model.id.clone(),
            inner: RwLock::new(RoomInner {
                model,
                connections: HashMap::new(),
                engine: None,
            }),
            tx,
            rx: Mutex::new(Some(rx)),
            close_tx,
            broadcaster,
            recorder,
            config,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, RoomInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoomInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 在当前 tokio 运行时上启动房间循环；只能启动一次
    pub fn spawn(self: &Arc<Self>) {
        let Ok(handle) = Handle::try_current() else {
            debug!(room_id = %self.id, "no runtime, room loop not started");
            return;
        };
        let Some(rx) = self.rx.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };
        handle.spawn(self.clone().run(rx, self.close_tx.subscribe()));
    }

    async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RoomMessage>,
        mut close_rx: watch::Receiver<bool>,
    ) {
        let period = self.config.idle_check;
        let mut idle_check = interval_at(Instant::now() + period, period);
        info!(room_id = %self.id, "room loop started");

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
                _ = idle_check.tick() => {
                    if self.is_empty() {
                        info!(room_id = %self.id, "room is empty, stopping");
                        break;
                    }
                }
                _ = close_rx.changed() => break,
            }
        }

        info!(room_id = %self.id, "room loop stopped");
    }

    async fn dispatch(&self, msg: RoomMessage) {
        match msg {
            RoomMessage::Broadcast(msg) => {
                self.broadcaster.broadcast(&self.recipients(), &msg);
            }
            RoomMessage::GameOver(summary) => {
                let payload = GameOverPayload {
                    winner: summary.winner.clone(),
                    rankings: summary.rankings.clone(),
                    duration_seconds: summary.duration_seconds,
                };
                match NetworkMessage::new(MessageType::GameOver, &payload) {
                    Ok(msg) => self
                        .broadcaster
                        .broadcast(&self.recipients(), &msg.with_room(self.id.clone())),
                    Err(e) => warn!(room_id = %self.id, "failed to encode game over: {}", e),
                }

                let Some(recorder) = self.recorder.clone() else {
                    return;
                };
                let room_id = self.id.clone();
                let saved = tokio::task::spawn_blocking(move || recorder.record_game(&summary)).await;
                match saved {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%room_id, "failed to record game: {:#}", e),
                    Err(e) => warn!(%room_id, "record task failed: {}", e),
                }
            }
        }
    }

    /// 投递到房间队列，不阻塞
    pub fn post(&self, msg: RoomMessage) -> Result<(), RoomError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RoomError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => RoomError::Closed,
        })
    }

    /// 广播给房间内所有连接
    pub fn broadcast(&self, msg: NetworkMessage) -> Result<(), RoomError> {
        self.post(RoomMessage::Broadcast(msg.with_room(self.id.clone())))
    }

    /// 通知房间循环退出
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    fn recipients(&self) -> Vec<PlayerId> {
        self.read().connections.keys().copied().collect()
    }

    /// 加入一名人类玩家，按 红/蓝/绿/黄 分配第一个空闲颜色
    pub fn add_player(&self, player_id: PlayerId, username: &str) -> Result<Player, RoomError> {
        let mut inner = self.write();
        if inner.model.state != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if inner.model.is_full() {
            return Err(RoomError::RoomFull);
        }
        if inner.model.seat_of(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom(player_id));
        }
        let color = inner.model.next_free_color().ok_or(RoomError::RoomFull)?;

        let player = Player::new(player_id, username, color);
        inner.model.players.push(player.clone());
        inner
            .connections
            .insert(player_id, PlayerConnection::new(player_id, username));

        info!(room_id = %self.id, player_id, %color, "player joined");
        Ok(player)
    }

    /// 加入一名 AI，ID 为 -(颜色序号 + 1)
    pub fn add_ai_player(&self, level: Difficulty) -> Result<Player, RoomError> {
        let mut inner = self.write();
        if inner.model.state != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if inner.model.is_full() {
            return Err(RoomError::RoomFull);
        }
        let color = inner.model.next_free_color().ok_or(RoomError::RoomFull)?;

        let player = Player::new_ai(-(color.index() as PlayerId + 1), color, level);
        inner.model.players.push(player.clone());
        debug!(room_id = %self.id, %color, %level, "AI player added");
        Ok(player)
    }

    /// 移除玩家
    ///
    /// 等待中直接让出座位；对局开始后保留座位并标记断线。
    pub fn remove_player(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let mut inner = self.write();
        let Some(seat) = inner.model.seat_of(player_id) else {
            return Err(RoomError::PlayerNotInRoom(player_id));
        };
        inner.connections.remove(&player_id);

        if inner.model.state == RoomStatus::Waiting {
            inner.model.players.remove(seat);
        } else {
            inner.model.players[seat].is_connected = false;
            if let Some(engine) = &inner.engine {
                engine.set_player_connected(player_id, false);
            }
        }

        if inner.model.host_id == player_id {
            let RoomInner {
                model, connections, ..
            } = &mut *inner;
            let next_host = model
                .players
                .iter()
                .find(|p| connections.contains_key(&p.id))
                .or_else(|| model.players.first())
                .map(|p| p.id);
            if let Some(host_id) = next_host {
                model.host_id = host_id;
            }
        }

        info!(room_id = %self.id, player_id, "player left");
        Ok(())
    }

    pub fn set_player_ready(&self, player_id: PlayerId, ready: bool) -> Result<(), RoomError> {
        let mut inner = self.write();
        let conn = inner
            .connections
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotInRoom(player_id))?;
        conn.is_ready = ready;
        if let Some(player) = inner.model.player_mut(player_id) {
            player.is_ready = ready;
        }
        Ok(())
    }

    /// 人数足够且每个连接都已准备
    pub fn can_start(&self) -> bool {
        let inner = self.read();
        inner.model.players.len() >= self.config.min_players
            && inner.connections.values().all(|c| c.is_ready)
    }

    /// 开局
    pub fn start(&self) -> Result<(), RoomError> {
        let mut inner = self.write();
        if inner.model.state != RoomStatus::Waiting || inner.engine.is_some() {
            return Err(RoomError::AlreadyStarted);
        }

        let sink = Arc::new(RoomEventSink {
            room_id: self.id.clone(),
            tx: self.tx.clone(),
        });
        let engine = GameEngine::new(inner.model.clone(), sink, self.config.engine.clone());
        engine.start()?;

        inner.model.state = RoomStatus::Playing;
        inner.model.started_at = Some(Utc::now());

        let mut game = engine.get_state();
        game.room.host_id = inner.model.host_id;
        inner.engine = Some(engine);

        // 先手的 TURN_CHANGED 已在队列中，GAME_START 带完整快照
        match NetworkMessage::new(MessageType::GameStart, &GameStatePayload { game }) {
            Ok(msg) => {
                if let Err(e) = self.broadcast(msg) {
                    warn!(room_id = %self.id, "failed to announce game start: {}", e);
                }
            }
            Err(e) => warn!(room_id = %self.id, "failed to encode game start: {}", e),
        }
        info!(room_id = %self.id, "room started");
        Ok(())
    }

    pub fn engine(&self) -> Option<GameEngine> {
        self.read().engine.clone()
    }

    fn require_engine(&self) -> Result<GameEngine, RoomError> {
        self.engine().ok_or(RoomError::Game(GameError::GameNotPlaying))
    }

    pub fn roll_dice(&self, player_id: PlayerId) -> Result<(u8, bool), RoomError> {
        Ok(self.require_engine()?.roll_dice(player_id)?)
    }

    pub fn move_token(&self, player_id: PlayerId, token_id: i64) -> Result<(), RoomError> {
        Ok(self.require_engine()?.move_token(player_id, token_id)?)
    }

    /// 房间信息；开局后取引擎中的实时状态
    pub fn info(&self) -> RoomModel {
        let inner = self.read();
        match &inner.engine {
            Some(engine) => {
                let mut model = engine.get_state().room;
                model.host_id = inner.model.host_id;
                model
            }
            None => inner.model.clone(),
        }
    }

    /// 对局快照；未开局时棋盘为空
    pub fn game_state(&self) -> GameSnapshot {
        if let Some(engine) = self.engine() {
            let mut snapshot = engine.get_state();
            snapshot.room.host_id = self.read().model.host_id;
            return snapshot;
        }
        GameSnapshot {
            room: self.read().model.clone(),
            board: Board::new(),
            turn_history: Vec::new(),
            start_time: None,
            winner: None,
            rankings: Vec::new(),
        }
    }

    pub fn status(&self) -> RoomStatus {
        let inner = self.read();
        match &inner.engine {
            Some(engine) => engine.status(),
            None => inner.model.state,
        }
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.read().connections.contains_key(&player_id)
    }

    /// 座位数（含 AI）
    pub fn player_count(&self) -> usize {
        self.read().model.players.len()
    }

    /// 没有任何人类连接
    pub fn is_empty(&self) -> bool {
        self.read().connections.is_empty()
    }

    pub fn is_private(&self) -> bool {
        self.read().model.is_private
    }

    pub fn check_password(&self, password: Option<&str>) -> bool {
        let inner = self.read();
        if !inner.model.is_private {
            return true;
        }
        match &inner.model.password {
            Some(expected) => password == Some(expected.as_str()),
            None => true,
        }
    }

    /// 是否出现在大厅列表中
    pub fn is_listed(&self) -> bool {
        let inner = self.read();
        !inner.model.is_private
            && inner.model.state == RoomStatus::Waiting
            && !inner.model.is_full()
    }
}

/// 房间管理器
pub struct RoomManager {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    next_seq: AtomicU64,
    broadcaster: Arc<dyn Broadcaster>,
    recorder: Option<Arc<dyn GameRecorder>>,
    config: RoomConfig,
}

impl RoomManager {
    pub fn new(
        broadcaster: Arc<dyn Broadcaster>,
        recorder: Option<Arc<dyn GameRecorder>>,
        config: RoomConfig,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            broadcaster,
            recorder,
            config,
        }
    }

    fn generate_id(&self) -> RoomId {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        format!("ROOM_{}_{}", nanos, seq)
    }

    /// 创建房间，房主自动入座
    pub fn create_room(
        &self,
        settings: RoomSettings,
        host_id: PlayerId,
        host_name: &str,
    ) -> Result<Arc<Room>, RoomError> {
        let min = self.config.min_players.max(MIN_PLAYERS);
        let max = self.config.max_players.min(MAX_PLAYERS);
        if !(min..=max).contains(&settings.max_players) {
            return Err(RoomError::InvalidMaxPlayers {
                actual: settings.max_players,
                min,
                max,
            });
        }

        let id = self.generate_id();
        let mut model = RoomModel::new(
            id.clone(),
            settings.name,
            host_id,
            settings.max_players,
            settings.game_mode,
        );
        model.is_private = settings.is_private;
        model.password = settings.password.filter(|p| !p.is_empty());

        let room = Room::new(
            model,
            self.broadcaster.clone(),
            self.recorder.clone(),
            self.config.clone(),
        );
        room.add_player(host_id, host_name)?;
        room.spawn();

        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), room.clone());
        info!(room_id = %id, host_id, "room created");
        Ok(room)
    }

    pub fn get_room(&self, room_id: &str) -> Result<Arc<Room>, RoomError> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))
    }

    /// 加入房间；私人房间需要密码。
    /// 入座期间持有注册表读锁，离开方不能在此期间把房间注销。
    pub fn join_room(
        &self,
        room_id: &str,
        player_id: PlayerId,
        username: &str,
        password: Option<&str>,
    ) -> Result<(Arc<Room>, Player), RoomError> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        let room = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if !room.check_password(password) {
            return Err(RoomError::WrongPassword);
        }
        let player = room.add_player(player_id, username)?;
        Ok((room, player))
    }

    /// 离开房间；房间空了就注销并关闭。
    /// 离座、判空和注销在同一把注册表写锁下完成。
    pub fn leave_room(&self, room_id: &str, player_id: PlayerId) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        let room = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        room.remove_player(player_id)?;

        if room.is_empty() {
            rooms.remove(room_id);
            room.close();
            info!(room_id, "room removed");
        }
        Ok(())
    }

    /// 大厅可见的房间
    pub fn list_rooms(&self) -> Vec<RoomModel> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = rooms
            .values()
            .filter(|r| r.is_listed())
            .map(|r| r.info())
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    /// 清理空房间，返回清理数量
    pub fn cleanup_empty_rooms(&self) -> usize {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        let before = rooms.len();
        rooms.retain(|id, room| {
            if room.is_empty() {
                room.close();
                debug!(room_id = %id, "empty room cleaned up");
                false
            } else {
                true
            }
        });
        before - rooms.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Color;

    struct NullBroadcaster;

    impl Broadcaster for NullBroadcaster {
        fn broadcast(&self, _recipients: &[PlayerId], _msg: &NetworkMessage) {}
    }

    fn manager() -> RoomManager {
        RoomManager::new(Arc::new(NullBroadcaster), None, RoomConfig::default())
    }

    fn settings(max_players: usize) -> RoomSettings {
        RoomSettings {
            name: "friday night".to_string(),
            max_players,
            game_mode: "online".to_string(),
            is_private: false,
            password: None,
        }
    }

    #[test]
    fn test_create_room() {
        let manager = manager();
        let a = manager.create_room(settings(4), 1, "alice").unwrap();
        let b = manager.create_room(settings(2), 2, "bob").unwrap();

        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("ROOM_"));
        assert_eq!(manager.room_count(), 2);

        let info = a.info();
        assert_eq!(info.host_id, 1);
        assert_eq!(info.players[0].color, Color::Red);
        assert_eq!(info.state, RoomStatus::Waiting);
    }

    #[test]
    fn test_create_room_rejects_bad_size() {
        let manager = manager();
        assert_eq!(
            manager.create_room(settings(5), 1, "alice").err(),
            Some(RoomError::InvalidMaxPlayers { actual: 5, min: 2, max: 4 })
        );
        assert!(manager.create_room(settings(1), 1, "alice").is_err());
    }

    #[test]
    fn test_add_player_errors() {
        let manager = manager();
        let room = manager.create_room(settings(2), 1, "alice").unwrap();

        assert_eq!(
            room.add_player(1, "alice").err(),
            Some(RoomError::AlreadyInRoom(1))
        );
        let bob = room.add_player(2, "bob").unwrap();
        assert_eq!(bob.color, Color::Blue);
        assert_eq!(room.add_player(3, "carol").err(), Some(RoomError::RoomFull));
    }

    #[test]
    fn test_color_reused_after_leave() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_player(2, "bob").unwrap();
        room.add_player(3, "carol").unwrap();
        manager.leave_room(room.id(), 2).unwrap();

        let dave = room.add_player(4, "dave").unwrap();
        assert_eq!(dave.color, Color::Blue);
    }

    #[test]
    fn test_host_passes_on_leave() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_player(2, "bob").unwrap();
        manager.leave_room(room.id(), 1).unwrap();
        assert_eq!(room.info().host_id, 2);
    }

    #[test]
    fn test_last_leave_removes_room() {
        let manager = manager();
        let room = manager.create_room(settings(2), 1, "alice").unwrap();
        let id = room.id().to_string();
        manager.leave_room(&id, 1).unwrap();

        assert_eq!(manager.room_count(), 0);
        assert_eq!(manager.get_room(&id).err(), Some(RoomError::NotFound(id.clone())));
        assert_eq!(
            manager.leave_room(&id, 1).err(),
            Some(RoomError::NotFound(id))
        );
    }

    #[test]
    fn test_join_racing_last_leave() {
        let manager = manager();
        for _ in 0..200 {
            let room = manager.create_room(settings(2), 1, "alice").unwrap();
            let id = room.id().to_string();

            let (left, joined) = std::thread::scope(|s| {
                let leave = s.spawn(|| manager.leave_room(&id, 1));
                let join = s.spawn(|| manager.join_room(&id, 2, "bob", None));
                (leave.join().unwrap(), join.join().unwrap())
            });
            assert!(left.is_ok());

            // 入座成功的房间必须仍在注册表中
            match joined {
                Ok((joined_room, _)) => {
                    assert_eq!(joined_room.id(), id);
                    let registered = manager.get_room(&id).unwrap();
                    assert!(registered.has_player(2));
                    manager.leave_room(&id, 2).unwrap();
                }
                Err(e) => assert_eq!(e, RoomError::NotFound(id.clone())),
            }
            assert_eq!(manager.room_count(), 0);
        }
    }

    #[test]
    fn test_leave_unknown_player() {
        let manager = manager();
        let room = manager.create_room(settings(2), 1, "alice").unwrap();
        assert_eq!(
            manager.leave_room(room.id(), 9).err(),
            Some(RoomError::PlayerNotInRoom(9))
        );
    }

    #[test]
    fn test_can_start_requires_ready() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.set_player_ready(1, true).unwrap();
        // 只有一人
        assert!(!room.can_start());

        room.add_player(2, "bob").unwrap();
        assert!(!room.can_start());
        room.set_player_ready(2, true).unwrap();
        assert!(room.can_start());

        assert_eq!(
            room.set_player_ready(9, true).err(),
            Some(RoomError::PlayerNotInRoom(9))
        );
    }

    #[test]
    fn test_start_and_join_after_start() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_player(2, "bob").unwrap();
        room.start().unwrap();

        assert_eq!(room.status(), RoomStatus::Playing);
        assert_eq!(room.start().err(), Some(RoomError::AlreadyStarted));
        assert_eq!(
            manager.join_room(room.id(), 3, "carol", None).err(),
            Some(RoomError::NotWaiting)
        );
        assert!(room.info().started_at.is_some());
    }

    #[test]
    fn test_leave_mid_game_keeps_seat() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_player(2, "bob").unwrap();
        room.start().unwrap();

        manager.leave_room(room.id(), 2).unwrap();
        let info = room.info();
        assert_eq!(info.players.len(), 2);
        assert!(!info.players[1].is_connected);
        assert!(!room.has_player(2));
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_host_skips_disconnected_seat() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_player(2, "bob").unwrap();
        room.add_player(3, "carol").unwrap();
        room.start().unwrap();

        // bob 的座位还在但已断线，房主交给仍在线的 carol
        manager.leave_room(room.id(), 2).unwrap();
        manager.leave_room(room.id(), 1).unwrap();
        let info = room.info();
        assert_eq!(info.players[1].id, 2);
        assert_eq!(info.host_id, 3);
    }

    #[test]
    fn test_actions_before_start() {
        let manager = manager();
        let room = manager.create_room(settings(2), 1, "alice").unwrap();
        assert_eq!(
            room.roll_dice(1).err(),
            Some(RoomError::Game(GameError::GameNotPlaying))
        );
        assert_eq!(room.roll_dice(1).unwrap_err().code(), ErrorCode::InvalidMove);
        let snapshot = room.game_state();
        assert!(snapshot.turn_history.is_empty());
        assert!(serde_json::to_string(&GameStatePayload { game: snapshot }).is_ok());
    }

    #[test]
    fn test_ai_seats() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        let ai = room.add_ai_player(Difficulty::Hard).unwrap();
        assert_eq!(ai.id, -2);
        assert_eq!(ai.color, Color::Blue);
        room.add_ai_player(Difficulty::Easy).unwrap();
        room.add_ai_player(Difficulty::Easy).unwrap();
        assert_eq!(room.add_ai_player(Difficulty::Easy).err(), Some(RoomError::RoomFull));
        assert_eq!(room.player_count(), 4);
        assert!(!room.is_empty());
    }

    #[test]
    fn test_private_rooms() {
        let manager = manager();
        let mut private = settings(4);
        private.is_private = true;
        private.password = Some("open sesame".to_string());
        let room = manager.create_room(private, 1, "alice").unwrap();
        manager.create_room(settings(2), 2, "bob").unwrap();

        assert_eq!(
            manager.join_room(room.id(), 3, "carol", Some("wrong")).err(),
            Some(RoomError::WrongPassword)
        );
        assert!(manager
            .join_room(room.id(), 3, "carol", Some("open sesame"))
            .is_ok());

        // 私人房间不出现在列表中
        let listed = manager.list_rooms();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].host_id, 2);
    }

    #[test]
    fn test_cleanup_empty_rooms() {
        let manager = manager();
        let room = manager.create_room(settings(4), 1, "alice").unwrap();
        room.add_ai_player(Difficulty::Medium).unwrap();
        manager.create_room(settings(4), 2, "bob").unwrap();

        // AI 座位不能让房间保持存活
        room.remove_player(1).unwrap();
        assert_eq!(manager.cleanup_empty_rooms(), 1);
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RoomError::NotFound("x".into()).code(), ErrorCode::RoomNotFound);
        assert_eq!(RoomError::RoomFull.code(), ErrorCode::GameFull);
        assert_eq!(RoomError::WrongPassword.code(), ErrorCode::Unauthorized);
        assert_eq!(
            RoomError::Game(GameError::NotYourTurn).code(),
            ErrorCode::NotYourTurn
        );
    }
}
