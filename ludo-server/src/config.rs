//! 服务端配置
//!
//! JSON 文件，缺失的字段取默认值；文件不存在或无法解析时整体使用默认配置。

use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::{MAX_PLAYERS, MIN_PLAYERS, ROOM_IDLE_CHECK_SECS, ROOM_QUEUE_CAPACITY, TURN_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};

use crate::game::EngineConfig;
use crate::room::RoomConfig;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "LUDO_CONFIG";

/// 网络
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 对局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_players_per_room: usize,
    pub min_players_per_room: usize,
    pub turn_timeout_secs: u64,
    pub room_idle_check_secs: u64,
    /// 全局空房间清理间隔
    pub cleanup_interval_secs: u64,
    /// 覆盖 AI 思考时间
    pub ai_think_delay_ms: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players_per_room: MAX_PLAYERS,
            min_players_per_room: MIN_PLAYERS,
            turn_timeout_secs: TURN_TIMEOUT_SECS,
            room_idle_check_secs: ROOM_IDLE_CHECK_SECS,
            cleanup_interval_secs: 60,
            ai_think_delay_ms: None,
        }
    }
}

/// 存储
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 为空时使用平台数据目录
    pub data_dir: Option<PathBuf>,
}

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub game: GameConfig,
    pub storage: StorageConfig,
    /// 默认日志级别，RUST_LOG 优先
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            game: GameConfig::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// 平台配置目录下的默认路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("ludo-server");
            path.push("config.json");
            path
        })
    }

    /// 按 命令行参数 > LUDO_CONFIG > 平台配置目录 的顺序确定路径并加载
    pub fn load(cli_path: Option<PathBuf>) -> Self {
        let path = cli_path
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path);

        let Some(path) = path else {
            tracing::warn!("no config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("config file {:?} not found, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("loaded config: {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("invalid config file {:?}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read config file {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.game.cleanup_interval_secs.max(1))
    }

    /// 房间与引擎的运行参数
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            engine: EngineConfig {
                turn_timeout: Duration::from_secs(self.game.turn_timeout_secs),
                ai_think_delay: self.game.ai_think_delay_ms.map(Duration::from_millis),
                seed: None,
            },
            idle_check: Duration::from_secs(self.game.room_idle_check_secs.max(1)),
            queue_capacity: ROOM_QUEUE_CAPACITY,
            min_players: self.game.min_players_per_room,
            max_players: self.game.max_players_per_room,
        }
    }
}
