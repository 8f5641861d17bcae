//! 协议常量定义

use std::time::Duration;

/// 单个房间最多玩家数
pub const MAX_PLAYERS: usize = 4;

/// 开局所需最少玩家数
pub const MIN_PLAYERS: usize = 2;

/// 公共环形跑道格数
pub const TRACK_CELLS: i32 = 52;

/// 每种颜色的终点通道格数
pub const HOME_CELLS: i32 = 6;

/// 每名玩家的棋子数
pub const TOKENS_PER_PLAYER: usize = 4;

/// 基地位置
pub const BASE_POSITION: i32 = -1;

/// 终点通道起始位置（52..=57）
pub const HOME_STRETCH_START: i32 = TRACK_CELLS;

/// 最终位置，到达即视为回家
pub const FINAL_POSITION: i32 = TRACK_CELLS + HOME_CELLS - 1;

/// 骰子最小值
pub const DICE_MIN: u8 = 1;

/// 骰子最大值
pub const DICE_MAX: u8 = 6;

/// 出基地所需点数
pub const ROLL_TO_START: u8 = 6;

/// 获得额外回合的点数
pub const ROLL_FOR_EXTRA_TURN: u8 = 6;

/// 连续掷出 6 的上限，达到即失去回合
pub const MAX_CONSECUTIVE_SIX: u8 = 3;

/// 每隔多少次掷骰固定为 6
pub const RIGGED_ROLL_INTERVAL: u32 = 5;

/// 安全格
pub const SAFE_POSITIONS: [i32; 8] = [0, 8, 13, 21, 26, 34, 39, 47];

/// 回合超时（秒）
pub const TURN_TIMEOUT_SECS: u64 = 30;

/// 房间空闲检查间隔（秒）
pub const ROOM_IDLE_CHECK_SECS: u64 = 30;

/// 房间消息队列容量
pub const ROOM_QUEUE_CAPACITY: usize = 100;

/// 用户名长度范围
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 20;

/// 房间名长度范围
pub const MIN_ROOM_NAME_LEN: usize = 3;
pub const MAX_ROOM_NAME_LEN: usize = 50;

/// 单条消息最大字节数
pub const MAX_MESSAGE_SIZE: usize = 65536;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 回合超时 Duration
pub const TURN_TIMEOUT: Duration = Duration::from_secs(TURN_TIMEOUT_SECS);

/// 房间空闲检查 Duration
pub const ROOM_IDLE_CHECK: Duration = Duration::from_secs(ROOM_IDLE_CHECK_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
