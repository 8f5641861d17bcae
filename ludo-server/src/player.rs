//! 玩家管理
//!
//! `PlayerManager` 记录每个在线玩家的发送通道和所在房间，房间广播通过
//! `Broadcaster` trait 交给它投递。

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use protocol::{NetworkMessage, PlayerId, RoomId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 向一组玩家投递消息
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, recipients: &[PlayerId], msg: &NetworkMessage);
}

/// 房间内的连接记录
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    pub player_id: PlayerId,
    pub username: String,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl PlayerConnection {
    pub fn new(player_id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            player_id,
            username: username.into(),
            is_ready: false,
            joined_at: Utc::now(),
        }
    }
}

/// 在线会话
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub username: String,
    pub room_id: Option<RoomId>,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<NetworkMessage>,
}

/// 玩家管理器
pub struct PlayerManager {
    /// 玩家 ID -> 会话
    sessions: RwLock<HashMap<PlayerId, Session>>,
    /// 服务端分配的 ID
    next_id: AtomicI64,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// 为没有自带 ID 的客户端生成一个未被占用的正数 ID
    pub fn generate_id(&self) -> PlayerId {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            if !sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// 登记会话；该 ID 已有在线会话时拒绝并返回 false
    pub fn register(
        &self,
        player_id: PlayerId,
        username: impl Into<String>,
        sender: mpsc::Sender<NetworkMessage>,
    ) -> bool {
        let username = username.into();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&player_id) {
            warn!(player_id, %username, "player id already online");
            return false;
        }
        debug!(player_id, %username, "session registered");
        sessions.insert(
            player_id,
            Session {
                player_id,
                username,
                room_id: None,
                connected_at: Utc::now(),
                sender,
            },
        );
        true
    }

    /// 移除会话
    pub fn unregister(&self, player_id: PlayerId) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player_id)
            .cloned()
    }

    /// 设置玩家所在房间
    pub fn set_room(&self, player_id: PlayerId, room_id: Option<RoomId>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get_mut(&player_id) {
            session.room_id = room_id;
        }
    }

    /// 玩家所在房间
    pub fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player_id)
            .and_then(|s| s.room_id.clone())
    }

    /// 发送消息给单个玩家，通道满或已关闭时返回 false
    pub fn send_to(&self, player_id: PlayerId, msg: NetworkMessage) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = sessions.get(&player_id) else {
            return false;
        };
        match session.sender.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(player_id, "dropping outbound message: {}", e);
                false
            }
        }
    }

    pub fn online_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for PlayerManager {
    fn broadcast(&self, recipients: &[PlayerId], msg: &NetworkMessage) {
        for &player_id in recipients {
            self.send_to(player_id, msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MessageType;

    #[test]
    fn test_generate_id_skips_taken() {
        let manager = PlayerManager::new();
        let (tx, _rx) = mpsc::channel(4);
        assert!(manager.register(1, "alice", tx.clone()));
        assert!(manager.register(2, "bob", tx));

        let id = manager.generate_id();
        assert_eq!(id, 3);
        assert_ne!(manager.generate_id(), id);
    }

    #[test]
    fn test_room_tracking() {
        let manager = PlayerManager::new();
        let (tx, _rx) = mpsc::channel(4);
        assert!(manager.register(7, "carol", tx));
        assert_eq!(manager.room_of(7), None);

        manager.set_room(7, Some("ROOM_1".to_string()));
        assert_eq!(manager.room_of(7).as_deref(), Some("ROOM_1"));

        // 同一 ID 不能再次登记，原会话和房间不变
        let (other_tx, _other_rx) = mpsc::channel(4);
        assert!(!manager.register(7, "mallory", other_tx));
        assert_eq!(manager.room_of(7).as_deref(), Some("ROOM_1"));
        assert_eq!(manager.get(7).unwrap().username, "carol");
        assert_eq!(manager.online_count(), 1);

        let session = manager.unregister(7).unwrap();
        assert_eq!(session.username, "carol");
        assert_eq!(manager.online_count(), 0);
        assert_eq!(manager.room_of(7), None);
    }

    #[test]
    fn test_broadcast_reaches_recipients() {
        let manager = PlayerManager::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.register(1, "alice", tx1);
        manager.register(2, "bob", tx2);

        manager.broadcast(&[1, 2, 99], &NetworkMessage::empty(MessageType::Pong));
        assert_eq!(rx1.try_recv().unwrap().kind, MessageType::Pong);
        assert_eq!(rx2.try_recv().unwrap().kind, MessageType::Pong);
    }

    #[test]
    fn test_send_to_full_channel() {
        let manager = PlayerManager::new();
        let (tx, _rx) = mpsc::channel(1);
        manager.register(1, "alice", tx);

        assert!(manager.send_to(1, NetworkMessage::empty(MessageType::Pong)));
        assert!(!manager.send_to(1, NetworkMessage::empty(MessageType::Pong)));
        assert!(!manager.send_to(2, NetworkMessage::empty(MessageType::Pong)));
    }
}
