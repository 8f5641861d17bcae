//! 飞行棋服务端
//!
//! 包含:
//! - 房间系统与房间消息循环
//! - 对局引擎（回合、计时、AI 驱动）
//! - 玩家会话管理
//! - 对局记录与玩家统计存储
//! - 配置加载

pub mod config;
pub mod dice;
pub mod game;
pub mod player;
pub mod room;
pub mod server;
pub mod storage;

pub use config::ServerConfig;
pub use dice::DiceRoller;
pub use game::{EngineConfig, GameEngine, GameEvents, GameOverSummary, NoopEvents};
pub use player::{Broadcaster, PlayerManager, Session};
pub use room::{Room, RoomConfig, RoomError, RoomManager, RoomSettings};
pub use server::{handle_connection, serve, ConnectionContext, MessageHandler, ServerState};
pub use storage::{GameRecorder, PlayerStats, SavedGameInfo, StorageManager};
