//! 对局存储
//!
//! 每局结束写一份 `GameRecord` JSON，并累加人类玩家的统计到 `stats.json`。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use protocol::{GameRecord, PlayerId, PlayerResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::game::GameOverSummary;

/// 对局结束后的持久化出口
pub trait GameRecorder: Send + Sync {
    fn record_game(&self, summary: &GameOverSummary) -> Result<()>;
}

/// 单个玩家的累计统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: PlayerId,
    pub username: String,
    pub total_games: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub tokens_captured: u32,
    pub tokens_lost: u32,
    pub sixes_rolled: u32,
    pub total_dice_rolls: u32,
    /// 百分比
    pub win_rate: f64,
    pub highest_streak: u32,
    pub current_streak: u32,
}

impl PlayerStats {
    fn new(user_id: PlayerId, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// 累加一局的结果
    pub fn apply(&mut self, result: &PlayerResult) {
        self.username = result.username.clone();
        self.total_games += 1;
        if result.won {
            self.games_won += 1;
            self.current_streak += 1;
            self.highest_streak = self.highest_streak.max(self.current_streak);
        } else {
            self.games_lost += 1;
            self.current_streak = 0;
        }
        self.tokens_captured += result.captures;
        self.tokens_lost += result.tokens_lost;
        self.sixes_rolled += result.sixes_rolled;
        self.total_dice_rolls += result.dice_rolls;
        self.win_rate = f64::from(self.games_won) * 100.0 / f64::from(self.total_games);
    }
}

/// 已保存对局的概要
#[derive(Debug, Clone)]
pub struct SavedGameInfo {
    /// 文件名
    pub game_id: String,
    pub room_name: String,
    pub winner: Option<PlayerId>,
    pub finished_at: DateTime<Utc>,
    pub turn_count: usize,
}

/// 存储管理器
pub struct StorageManager {
    data_dir: PathBuf,
    /// 串行化 stats.json 的读-改-写
    stats_lock: Mutex<()>,
}

const GAMES_DIR: &str = "games";
const STATS_FILE: &str = "stats.json";

impl StorageManager {
    /// 使用平台数据目录
    pub fn new() -> Result<Self> {
        Self::with_dir(default_data_directory()?)
    }

    /// 使用指定目录
    pub fn with_dir(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let games_dir = data_dir.join(GAMES_DIR);
        fs::create_dir_all(&games_dir)
            .with_context(|| format!("failed to create storage directory: {:?}", games_dir))?;

        Ok(Self {
            data_dir,
            stats_lock: Mutex::new(()),
        })
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_dir
    }

    fn games_dir(&self) -> PathBuf {
        self.data_dir.join(GAMES_DIR)
    }

    /// 保存对局记录，返回文件名
    pub fn save_game(&self, record: &GameRecord) -> Result<String> {
        let filename = generate_filename(&record.finished_at, &record.room_id);
        let filepath = self.games_dir().join(&filename);

        let json = record.to_json().context("failed to serialize game record")?;
        fs::write(&filepath, json)
            .with_context(|| format!("failed to write file: {:?}", filepath))?;

        debug!(file = %filename, "game record saved");
        Ok(filename)
    }

    /// 加载对局记录
    pub fn load_game(&self, game_id: &str) -> Result<GameRecord> {
        let filepath = self.games_dir().join(game_id);
        if !filepath.exists() {
            anyhow::bail!("game record not found: {}", game_id);
        }

        let content = fs::read_to_string(&filepath)
            .with_context(|| format!("failed to read file: {:?}", filepath))?;
        GameRecord::from_json(&content).context("failed to parse game record")
    }

    /// 列出所有对局，最近结束的在前
    pub fn list_games(&self) -> Result<Vec<SavedGameInfo>> {
        let mut games = Vec::new();
        let games_dir = self.games_dir();
        if !games_dir.exists() {
            return Ok(games);
        }

        let entries = fs::read_dir(&games_dir)
            .with_context(|| format!("failed to read storage directory: {:?}", games_dir))?;

        for entry in entries {
            let entry = entry.context("failed to read directory entry")?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            // 跳过损坏的文件
            let Ok(record) = self.load_game(filename) else {
                continue;
            };
            games.push(SavedGameInfo {
                game_id: filename.to_string(),
                room_name: record.room_name,
                winner: record.winner,
                finished_at: record.finished_at,
                turn_count: record.turn_history.len(),
            });
        }

        games.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(games)
    }

    /// 全部玩家统计
    pub fn load_stats(&self) -> Result<BTreeMap<PlayerId, PlayerStats>> {
        let path = self.data_dir.join(STATS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read file: {:?}", path))?;
        let stats: Vec<PlayerStats> =
            serde_json::from_str(&content).context("failed to parse stats file")?;
        Ok(stats.into_iter().map(|s| (s.user_id, s)).collect())
    }

    pub fn player_stats(&self, user_id: PlayerId) -> Result<Option<PlayerStats>> {
        Ok(self.load_stats()?.remove(&user_id))
    }

    /// 按胜局数、胜率排序
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerStats>> {
        let mut stats: Vec<_> = self.load_stats()?.into_values().collect();
        stats.sort_by(|a, b| {
            b.games_won
                .cmp(&a.games_won)
                .then(b.win_rate.total_cmp(&a.win_rate))
        });
        stats.truncate(limit);
        Ok(stats)
    }

    /// 累加一局中人类玩家的结果
    pub fn update_stats(&self, results: &[PlayerResult]) -> Result<()> {
        let _guard = self.stats_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stats = self.load_stats()?;
        for result in results.iter().filter(|r| !r.is_ai) {
            stats
                .entry(result.player_id)
                .or_insert_with(|| PlayerStats::new(result.player_id, &result.username))
                .apply(result);
        }

        let path = self.data_dir.join(STATS_FILE);
        let list: Vec<&PlayerStats> = stats.values().collect();
        let json = serde_json::to_string_pretty(&list).context("failed to serialize stats")?;
        fs::write(&path, json).with_context(|| format!("failed to write file: {:?}", path))?;
        Ok(())
    }
}

impl GameRecorder for StorageManager {
    fn record_game(&self, summary: &GameOverSummary) -> Result<()> {
        let record = GameRecord::new(
            &summary.snapshot,
            summary.results.clone(),
            summary.duration_seconds,
        );
        let filename = self.save_game(&record)?;
        self.update_stats(&summary.results)?;

        info!(
            room_id = %record.room_id,
            file = %filename,
            humans = record.human_players().count(),
            "game recorded"
        );
        Ok(())
    }
}

/// 平台数据目录
fn default_data_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("failed to locate the data directory")?;
    Ok(app_data_dir.join("ludo-server"))
}

fn generate_filename(timestamp: &DateTime<Utc>, room_id: &str) -> String {
    let timestamp_str = timestamp.format("%Y%m%d_%H%M%S").to_string();
    format!("{}_{}.json", timestamp_str, sanitize_filename(room_id))
}

/// 清理文件名中的特殊字符
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
