//! 服务器主逻辑
//!
//! 每条 TCP 连接拆成读、写两个任务：读任务把消息交给 `MessageHandler`，
//! 直接回复和房间广播都经由该连接的发送通道交给写任务。

use std::sync::Arc;

use protocol::{
    validate_message, ConnectPayload, CreateRoomPayload, Difficulty, ErrorCode, GameError,
    GameStatePayload, JoinRoomPayload, Listener, MessageType, MoveTokenPayload, NetworkMessage,
    PlayerId, PlayerJoinedPayload, PlayerReadyPayload, PlayerRefPayload, ProtocolError,
    RollDicePayload, RoomListPayload, RoomPayload, TcpConnection, TcpListener,
    ValidationError,
};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::player::PlayerManager;
use crate::room::{Room, RoomError, RoomManager, RoomSettings};
use crate::storage::{GameRecorder, StorageManager};

/// 每条连接的发送队列容量
const OUTBOUND_CAPACITY: usize = 256;

/// AI 模式的 game_mode 取值
const AI_GAME_MODE: &str = "ai";

/// 服务器状态
pub struct ServerState {
    pub players: Arc<PlayerManager>,
    pub rooms: RoomManager,
    pub config: ServerConfig,
}

impl ServerState {
    /// 按配置组装；存储目录不可用时返回错误
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let storage = match &config.storage.data_dir {
            Some(dir) => StorageManager::with_dir(dir)?,
            None => StorageManager::new()?,
        };
        info!(dir = ?storage.data_directory(), "storage ready");
        Ok(Self::with_recorder(config, Some(Arc::new(storage))))
    }

    /// 指定持久化出口（None 表示不落盘）
    pub fn with_recorder(config: ServerConfig, recorder: Option<Arc<dyn GameRecorder>>) -> Self {
        let players = Arc::new(PlayerManager::new());
        let rooms = RoomManager::new(players.clone(), recorder, config.room_config());
        Self {
            players,
            rooms,
            config,
        }
    }

    /// 玩家当前所在的房间
    fn room_of(&self, player_id: PlayerId) -> Option<Arc<Room>> {
        let room_id = self.players.room_of(player_id)?;
        self.rooms.get_room(&room_id).ok()
    }
}

/// 单条连接的上下文
pub struct ConnectionContext {
    /// 首次 CONNECT / CREATE_ROOM / JOIN_ROOM 后确定
    pub player_id: Option<PlayerId>,
    sender: mpsc::Sender<NetworkMessage>,
}

impl ConnectionContext {
    pub fn new(sender: mpsc::Sender<NetworkMessage>) -> Self {
        Self {
            player_id: None,
            sender,
        }
    }
}

/// 处理失败，回复给发送方的 ERROR
#[derive(Debug)]
struct Rejection {
    code: ErrorCode,
    message: String,
}

impl Rejection {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn into_message(self) -> NetworkMessage {
        NetworkMessage::error(self.code, self.message)
    }
}

impl From<RoomError> for Rejection {
    fn from(e: RoomError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<GameError> for Rejection {
    fn from(e: GameError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ValidationError> for Rejection {
    fn from(e: ValidationError) -> Self {
        Self::new(ErrorCode::InvalidMessage, e.to_string())
    }
}

impl From<serde_json::Error> for Rejection {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidMessage, format!("invalid payload: {}", e))
    }
}

type HandlerResult = Result<Option<NetworkMessage>, Rejection>;

/// 待发送的消息
struct PendingMessages {
    broadcasts: Vec<(Arc<Room>, NetworkMessage)>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            broadcasts: Vec::new(),
        }
    }

    fn broadcast(&mut self, room: Arc<Room>, msg: NetworkMessage) {
        self.broadcasts.push((room, msg));
    }

    fn flush(self) {
        for (room, msg) in self.broadcasts {
            if let Err(e) = room.broadcast(msg) {
                debug!(room_id = room.id(), "broadcast dropped: {}", e);
            }
        }
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理一条客户端消息，返回给发送方的直接回复
    pub fn handle(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        msg: NetworkMessage,
    ) -> Option<NetworkMessage> {
        if let Err(e) = validate_message(Some(&msg)) {
            debug!(kind = %msg.kind, "message rejected: {}", e);
            return Some(Rejection::from(e).into_message());
        }

        let mut pending = PendingMessages::new();
        let result = match &msg.kind {
            MessageType::Connect => Self::handle_connect(state, ctx, &msg),
            MessageType::CreateRoom => Self::handle_create_room(state, ctx, &mut pending, &msg),
            MessageType::JoinRoom => Self::handle_join_room(state, ctx, &mut pending, &msg),
            MessageType::LeaveRoom => Self::handle_leave_room(state, ctx, &mut pending),
            MessageType::ListRooms => Self::handle_list_rooms(state),
            MessageType::PlayerReady => Self::handle_ready(state, ctx, &msg),
            MessageType::RollDice => Self::handle_roll_dice(state, ctx, &msg),
            MessageType::MoveToken => Self::handle_move_token(state, ctx, &msg),
            MessageType::GetState => Self::handle_get_state(state, ctx),
            MessageType::Ping => Ok(Some(NetworkMessage::empty(MessageType::Pong))),
            other => Err(Rejection::new(
                ErrorCode::InvalidMessage,
                format!("unsupported message type: {}", other),
            )),
        };

        pending.flush();

        match result {
            Ok(reply) => reply,
            Err(rejection) => {
                debug!(kind = %msg.kind, code = %rejection.code, "{}", rejection.message);
                Some(rejection.into_message())
            }
        }
    }

    /// 连接断开：离开房间并注销会话
    pub fn disconnect(state: &ServerState, ctx: &ConnectionContext) {
        let Some(player_id) = ctx.player_id else {
            return;
        };
        let mut pending = PendingMessages::new();
        Self::leave_current_room(state, &mut pending, player_id);
        pending.flush();
        state.players.unregister(player_id);
        info!(player_id, "player disconnected");
    }

    fn parse<T: DeserializeOwned>(msg: &NetworkMessage) -> Result<T, Rejection> {
        Ok(msg.payload_as()?)
    }

    /// 绑定连接身份：已绑定的沿用，否则采用客户端的 user_id，都没有则分配。
    /// 已有在线会话的 ID 不能被另一条连接绑定。
    fn bind_player(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        user_id: Option<PlayerId>,
        username: &str,
    ) -> Result<PlayerId, Rejection> {
        if let Some(player_id) = ctx.player_id {
            return Ok(player_id);
        }
        let username = username.trim();
        let player_id = match user_id {
            Some(id) if id > 0 => {
                if !state.players.register(id, username, ctx.sender.clone()) {
                    return Err(Rejection::new(
                        ErrorCode::Unauthorized,
                        "player id already in use",
                    ));
                }
                id
            }
            _ => loop {
                let id = state.players.generate_id();
                if state.players.register(id, username, ctx.sender.clone()) {
                    break id;
                }
            },
        };
        ctx.player_id = Some(player_id);
        Ok(player_id)
    }

    fn require_player(ctx: &ConnectionContext) -> Result<PlayerId, Rejection> {
        ctx.player_id
            .ok_or_else(|| Rejection::new(ErrorCode::Unauthorized, "not connected"))
    }

    fn require_room(state: &ServerState, player_id: PlayerId) -> Result<Arc<Room>, Rejection> {
        state
            .room_of(player_id)
            .ok_or_else(|| Rejection::new(ErrorCode::RoomNotFound, "not in a room"))
    }

    /// 负载里的 player_id 必须是连接本身（0 表示省略）
    fn check_actor(player_id: PlayerId, claimed: PlayerId) -> Result<(), Rejection> {
        if claimed != 0 && claimed != player_id {
            return Err(Rejection::new(
                ErrorCode::Unauthorized,
                "cannot act for another player",
            ));
        }
        Ok(())
    }

    fn room_list(state: &ServerState) -> Result<NetworkMessage, Rejection> {
        Ok(NetworkMessage::new(
            MessageType::RoomList,
            &RoomListPayload {
                rooms: state.rooms.list_rooms(),
            },
        )?)
    }

    fn leave_current_room(state: &ServerState, pending: &mut PendingMessages, player_id: PlayerId) {
        let Some(room_id) = state.players.room_of(player_id) else {
            return;
        };
        state.players.set_room(player_id, None);

        let Ok(room) = state.rooms.get_room(&room_id) else {
            return;
        };
        match state.rooms.leave_room(&room_id, player_id) {
            Ok(()) => match NetworkMessage::new(MessageType::PlayerLeft, &PlayerRefPayload { player_id }) {
                Ok(msg) => pending.broadcast(room, msg),
                Err(e) => warn!("failed to encode PLAYER_LEFT: {}", e),
            },
            Err(e) => debug!(player_id, %room_id, "leave failed: {}", e),
        }
    }

    fn handle_connect(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let payload: ConnectPayload = Self::parse(msg)?;
        let player_id = Self::bind_player(state, ctx, payload.user_id, &payload.username)?;
        info!(player_id, username = %payload.username.trim(), "player connected");
        Ok(Some(Self::room_list(state)?.with_player(player_id)))
    }

    fn handle_create_room(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        pending: &mut PendingMessages,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let payload: CreateRoomPayload = Self::parse(msg)?;
        let player_id = Self::bind_player(state, ctx, Some(payload.user_id), &payload.username)?;
        Self::leave_current_room(state, pending, player_id);

        let settings = RoomSettings {
            name: payload.name.trim().to_string(),
            max_players: usize::try_from(payload.max_players).unwrap_or(0),
            game_mode: payload.game_mode.clone(),
            is_private: payload.is_private,
            password: payload.password.filter(|_| payload.is_private),
        };
        let room = state
            .rooms
            .create_room(settings, player_id, payload.username.trim())?;

        if payload.game_mode == AI_GAME_MODE {
            let level = payload
                .ai_level
                .as_deref()
                .map(Difficulty::from_level)
                .unwrap_or_default();
            while room.add_ai_player(level).is_ok() {}
        }
        state.players.set_room(player_id, Some(room.id().to_string()));

        let reply = NetworkMessage::new(
            MessageType::RoomCreated,
            &RoomPayload {
                room_id: room.id().to_string(),
                room: room.info(),
            },
        )?;
        Ok(Some(reply.with_room(room.id()).with_player(player_id)))
    }

    fn handle_join_room(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        pending: &mut PendingMessages,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let payload: JoinRoomPayload = Self::parse(msg)?;
        let player_id = Self::bind_player(state, ctx, Some(payload.user_id), &payload.username)?;
        let room_id = payload.room_id.trim();

        if state.players.room_of(player_id).as_deref() != Some(room_id) {
            Self::leave_current_room(state, pending, player_id);
        }

        let (room, player) = state.rooms.join_room(
            room_id,
            player_id,
            payload.username.trim(),
            payload.password.as_deref(),
        )?;
        state.players.set_room(player_id, Some(room.id().to_string()));

        pending.broadcast(
            room.clone(),
            NetworkMessage::new(MessageType::PlayerJoined, &PlayerJoinedPayload { player })?,
        );

        let reply = NetworkMessage::new(
            MessageType::RoomJoined,
            &RoomPayload {
                room_id: room.id().to_string(),
                room: room.info(),
            },
        )?;
        Ok(Some(reply.with_room(room.id()).with_player(player_id)))
    }

    fn handle_leave_room(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        pending: &mut PendingMessages,
    ) -> HandlerResult {
        let player_id = Self::require_player(ctx)?;
        if state.players.room_of(player_id).is_none() {
            return Err(Rejection::new(ErrorCode::RoomNotFound, "not in a room"));
        }
        Self::leave_current_room(state, pending, player_id);
        Ok(Some(NetworkMessage::new(
            MessageType::PlayerLeft,
            &PlayerRefPayload { player_id },
        )?))
    }

    fn handle_list_rooms(state: &ServerState) -> HandlerResult {
        Ok(Some(Self::room_list(state)?))
    }

    fn handle_ready(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let player_id = Self::require_player(ctx)?;
        let room = Self::require_room(state, player_id)?;
        let payload: PlayerReadyPayload = if msg.payload.is_null() {
            PlayerReadyPayload { ready: true }
        } else {
            Self::parse(msg)?
        };

        room.set_player_ready(player_id, payload.ready)?;
        debug!(player_id, room_id = room.id(), ready = payload.ready, "ready state changed");

        Self::start_when_ready(&room)?;
        Ok(None)
    }

    /// 全员就绪则开局；同时到达的另一条 READY 已经开局时视为成功
    fn start_when_ready(room: &Room) -> Result<(), RoomError> {
        if !room.can_start() {
            return Ok(());
        }
        match room.start() {
            Ok(()) | Err(RoomError::AlreadyStarted) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn handle_roll_dice(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let player_id = Self::require_player(ctx)?;
        let payload: RollDicePayload = Self::parse(msg)?;
        Self::check_actor(player_id, payload.player_id)?;

        let room = Self::require_room(state, player_id)?;
        let (value, extra_turn) = room.roll_dice(player_id)?;
        debug!(player_id, room_id = room.id(), value, extra_turn, "dice rolled");
        Ok(None)
    }

    fn handle_move_token(
        state: &ServerState,
        ctx: &mut ConnectionContext,
        msg: &NetworkMessage,
    ) -> HandlerResult {
        let player_id = Self::require_player(ctx)?;
        let payload: MoveTokenPayload = Self::parse(msg)?;
        Self::check_actor(player_id, payload.player_id)?;

        let room = Self::require_room(state, player_id)?;
        room.move_token(player_id, payload.token_id)?;
        Ok(None)
    }

    fn handle_get_state(state: &ServerState, ctx: &mut ConnectionContext) -> HandlerResult {
        let player_id = Self::require_player(ctx)?;
        let room = Self::require_room(state, player_id)?;
        let reply = NetworkMessage::new(
            MessageType::GameState,
            &GameStatePayload {
                game: room.game_state(),
            },
        )?;
        Ok(Some(reply.with_room(room.id())))
    }
}

/// 接受连接直到监听器出错
pub async fn serve(mut listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    info!(addr = ?listener.local_addr(), "server listening");
    loop {
        match listener.accept().await {
            Ok(conn) => {
                tokio::spawn(handle_connection(conn, state.clone()));
            }
            Err(ProtocolError::Io(e)) => {
                warn!("accept failed: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// 单条连接的读写循环
pub async fn handle_connection(conn: TcpConnection, state: Arc<ServerState>) {
    let peer = protocol::Connection::peer_addr(&conn).unwrap_or_default();
    debug!(%peer, "connection opened");

    let (mut reader, mut writer) = conn.split();
    let (tx, mut rx) = mpsc::channel::<NetworkMessage>(OUTBOUND_CAPACITY);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = writer.send(&msg).await {
                debug!("write failed: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut ctx = ConnectionContext::new(tx.clone());
    loop {
        let reply = match reader.recv().await {
            Ok(msg) => MessageHandler::handle(&state, &mut ctx, msg),
            Err(ProtocolError::ConnectionClosed) => break,
            Err(ProtocolError::Json(e)) => Some(NetworkMessage::error(
                ErrorCode::InvalidMessage,
                format!("malformed message: {}", e),
            )),
            Err(e) => {
                warn!(%peer, "connection error: {}", e);
                break;
            }
        };

        if let Some(reply) = reply {
            if tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    MessageHandler::disconnect(&state, &ctx);
    drop(ctx);
    drop(tx);
    let _ = writer_task.await;
    debug!(%peer, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ErrorPayload, RoomModel, RoomStatus};

    fn state() -> ServerState {
        ServerState::with_recorder(ServerConfig::default(), None)
    }

    fn client() -> (ConnectionContext, mpsc::Receiver<NetworkMessage>) {
        let (tx, rx) = mpsc::channel(64);
        (ConnectionContext::new(tx), rx)
    }

    fn create_room_msg(user_id: PlayerId, username: &str, mode: &str) -> NetworkMessage {
        NetworkMessage::new(
            MessageType::CreateRoom,
            &serde_json::json!({
                "name": "test room",
                "max_players": 4,
                "game_mode": mode,
                "is_private": false,
                "user_id": user_id,
                "username": username,
                "ai_level": "hard",
            }),
        )
        .unwrap()
    }

    fn join_room_msg(room_id: &str, user_id: PlayerId, username: &str) -> NetworkMessage {
        NetworkMessage::new(
            MessageType::JoinRoom,
            &serde_json::json!({
                "room_id": room_id,
                "user_id": user_id,
                "username": username,
            }),
        )
        .unwrap()
    }

    fn error_code(msg: &NetworkMessage) -> ErrorCode {
        assert_eq!(msg.kind, MessageType::Error);
        msg.payload_as::<ErrorPayload>().unwrap().code
    }

    fn created_room(msg: &NetworkMessage) -> RoomModel {
        assert_eq!(msg.kind, MessageType::RoomCreated);
        msg.payload_as::<RoomPayload>().unwrap().room
    }

    #[test]
    fn test_ping() {
        let state = state();
        let (mut ctx, _rx) = client();
        let reply = MessageHandler::handle(&state, &mut ctx, NetworkMessage::empty(MessageType::Ping));
        assert_eq!(reply.unwrap().kind, MessageType::Pong);
    }

    #[test]
    fn test_unknown_type() {
        let state = state();
        let (mut ctx, _rx) = client();
        let msg = NetworkMessage::empty(MessageType::from("TELEPORT".to_string()));
        let reply = MessageHandler::handle(&state, &mut ctx, msg).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::InvalidMessage);
    }

    #[test]
    fn test_validation_failure() {
        let state = state();
        let (mut ctx, _rx) = client();
        let msg = NetworkMessage::new(
            MessageType::Connect,
            &serde_json::json!({ "username": "x" }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut ctx, msg).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::InvalidMessage);
        assert!(ctx.player_id.is_none());
    }

    #[test]
    fn test_connect_assigns_id() {
        let state = state();
        let (mut ctx, _rx) = client();
        let msg = NetworkMessage::new(
            MessageType::Connect,
            &serde_json::json!({ "username": "alice" }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut ctx, msg).unwrap();
        assert_eq!(reply.kind, MessageType::RoomList);
        assert_eq!(reply.player_id, ctx.player_id);
        assert!(ctx.player_id.unwrap() > 0);
        assert_eq!(state.players.online_count(), 1);
    }

    #[test]
    fn test_create_and_join() {
        let state = state();
        let (mut alice, _rx1) = client();
        let (mut bob, _rx2) = client();

        let reply = MessageHandler::handle(&state, &mut alice, create_room_msg(10, "alice", "online"));
        let room = created_room(&reply.unwrap());
        assert_eq!(room.host_id, 10);
        assert_eq!(room.players.len(), 1);

        let reply = MessageHandler::handle(&state, &mut bob, join_room_msg(&room.id, 20, "bob")).unwrap();
        assert_eq!(reply.kind, MessageType::RoomJoined);
        let joined = reply.payload_as::<RoomPayload>().unwrap().room;
        assert_eq!(joined.players.len(), 2);
        assert_eq!(state.players.room_of(20).as_deref(), Some(room.id.as_str()));

        // 房间列表包含该房间
        let reply = MessageHandler::handle(&state, &mut bob, NetworkMessage::empty(MessageType::ListRooms)).unwrap();
        let list = reply.payload_as::<RoomListPayload>().unwrap();
        assert_eq!(list.rooms.len(), 1);
    }

    #[test]
    fn test_join_missing_room() {
        let state = state();
        let (mut ctx, _rx) = client();
        let reply = MessageHandler::handle(&state, &mut ctx, join_room_msg("ROOM_nope", 5, "carol")).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::RoomNotFound);
    }

    #[test]
    fn test_ai_mode_fills_seats() {
        let state = state();
        let (mut ctx, _rx) = client();
        let reply = MessageHandler::handle(&state, &mut ctx, create_room_msg(1, "alice", "ai"));
        let room = created_room(&reply.unwrap());
        assert_eq!(room.players.len(), 4);
        assert!(room.players[1..].iter().all(|p| p.is_ai));
        assert_eq!(room.players[1].ai_level, Some(Difficulty::Hard));
    }

    #[test]
    fn test_actions_require_identity() {
        let state = state();
        let (mut ctx, _rx) = client();
        let roll = NetworkMessage::new(
            MessageType::RollDice,
            &serde_json::json!({ "player_id": 1, "room_id": "ROOM_1" }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut ctx, roll).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);

        let reply = MessageHandler::handle(&state, &mut ctx, NetworkMessage::empty(MessageType::LeaveRoom)).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_cannot_act_for_others() {
        let state = state();
        let (mut ctx, _rx) = client();
        MessageHandler::handle(&state, &mut ctx, create_room_msg(1, "alice", "online"));
        let roll = NetworkMessage::new(
            MessageType::RollDice,
            &serde_json::json!({ "player_id": 2, "room_id": "" }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut ctx, roll).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_roll_before_start() {
        let state = state();
        let (mut ctx, _rx) = client();
        MessageHandler::handle(&state, &mut ctx, create_room_msg(1, "alice", "online"));
        let roll = NetworkMessage::new(
            MessageType::RollDice,
            &serde_json::json!({ "player_id": 1, "room_id": "" }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut ctx, roll).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::InvalidMove);
    }

    #[test]
    fn test_ready_starts_game() {
        let state = state();
        let (mut alice, _rx1) = client();
        let (mut bob, _rx2) = client();
        let reply = MessageHandler::handle(&state, &mut alice, create_room_msg(1, "alice", "online"));
        let room = created_room(&reply.unwrap());
        MessageHandler::handle(&state, &mut bob, join_room_msg(&room.id, 2, "bob"));

        let ready = NetworkMessage::empty(MessageType::PlayerReady);
        assert!(MessageHandler::handle(&state, &mut alice, ready.clone()).is_none());
        assert_eq!(state.rooms.get_room(&room.id).unwrap().status(), RoomStatus::Waiting);
        assert!(MessageHandler::handle(&state, &mut bob, ready).is_none());
        assert_eq!(state.rooms.get_room(&room.id).unwrap().status(), RoomStatus::Playing);

        let reply = MessageHandler::handle(&state, &mut alice, NetworkMessage::empty(MessageType::GetState)).unwrap();
        assert_eq!(reply.kind, MessageType::GameState);
        let game = reply.payload_as::<GameStatePayload>().unwrap().game;
        assert_eq!(game.room.state, RoomStatus::Playing);
        assert!(game.start_time.is_some());
    }

    /// 建房、加入并开局，返回房间 ID
    fn started_game(
        state: &ServerState,
        alice: &mut ConnectionContext,
        bob: &mut ConnectionContext,
    ) -> String {
        let reply = MessageHandler::handle(state, alice, create_room_msg(1, "alice", "online"));
        let room = created_room(&reply.unwrap());
        MessageHandler::handle(state, bob, join_room_msg(&room.id, 2, "bob"));
        let ready = NetworkMessage::empty(MessageType::PlayerReady);
        MessageHandler::handle(state, alice, ready.clone());
        MessageHandler::handle(state, bob, ready);
        assert_eq!(state.rooms.get_room(&room.id).unwrap().status(), RoomStatus::Playing);
        room.id
    }

    #[test]
    fn test_cannot_bind_online_id() {
        let state = state();
        let (mut alice, _rx1) = client();
        let (mut bob, _rx2) = client();
        let room_id = started_game(&state, &mut alice, &mut bob);
        let room = state.rooms.get_room(&room_id).unwrap();
        let current = room.engine().unwrap().current_player_id().unwrap();

        // 另一条连接冒用当前玩家的 ID
        let (mut mallory, _rx3) = client();
        let connect = NetworkMessage::new(
            MessageType::Connect,
            &serde_json::json!({ "username": "mallory", "user_id": current }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut mallory, connect).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);
        assert!(mallory.player_id.is_none());

        let reply = MessageHandler::handle(&state, &mut mallory, join_room_msg(&room_id, current, "mallory")).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);

        let roll = NetworkMessage::new(
            MessageType::RollDice,
            &serde_json::json!({ "player_id": current, "room_id": room_id }),
        )
        .unwrap();
        let reply = MessageHandler::handle(&state, &mut mallory, roll).unwrap();
        assert_eq!(error_code(&reply), ErrorCode::Unauthorized);
        assert_eq!(room.info().last_dice, 0);

        // 断开不影响原玩家
        MessageHandler::disconnect(&state, &mallory);
        assert_eq!(state.players.room_of(current).as_deref(), Some(room_id.as_str()));
        assert_eq!(state.players.online_count(), 2);
        assert!(room.info().players.iter().all(|p| p.is_connected));
    }

    #[test]
    fn test_ready_after_start_is_not_an_error() {
        let state = state();
        let (mut alice, _rx1) = client();
        let (mut bob, _rx2) = client();
        let room_id = started_game(&state, &mut alice, &mut bob);
        let room = state.rooms.get_room(&room_id).unwrap();

        // 另一条 READY 抢先开局后，这里的开局尝试按成功处理
        assert!(room.can_start());
        assert_eq!(MessageHandler::start_when_ready(&room), Ok(()));
        assert_eq!(room.status(), RoomStatus::Playing);
    }

    #[test]
    fn test_leave_and_disconnect() {
        let state = state();
        let (mut alice, _rx1) = client();
        let (mut bob, _rx2) = client();
        let reply = MessageHandler::handle(&state, &mut alice, create_room_msg(1, "alice", "online"));
        let room = created_room(&reply.unwrap());
        MessageHandler::handle(&state, &mut bob, join_room_msg(&room.id, 2, "bob"));

        let reply = MessageHandler::handle(&state, &mut alice, NetworkMessage::empty(MessageType::LeaveRoom)).unwrap();
        assert_eq!(reply.kind, MessageType::PlayerLeft);
        assert_eq!(state.players.room_of(1), None);
        assert_eq!(state.rooms.get_room(&room.id).unwrap().info().host_id, 2);

        MessageHandler::disconnect(&state, &bob);
        assert_eq!(state.rooms.room_count(), 0);
        assert_eq!(state.players.online_count(), 1);
    }
}
