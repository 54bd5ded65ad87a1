use crate::modules::error::AppError;
use crate::modules::network_config::{ConfigRecord, NetworkConfig};
use crate::modules::network_service::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 网络中心设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct NetworkCenterSettings {
    /// 最近一次成功应用的网卡配置
    pub network_configuration: ConfigRecord,
    /// 已写入 hosts 的本地名称
    pub friendly_names: Vec<String>,
}

/// 文件中心设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileCenterSettings {
    /// 共享目录
    pub serve_directory: Option<PathBuf>,
    /// 监听端口
    pub port: u16,
    /// 启动时自动开启文件服务
    pub auto_start: bool,
}

impl Default for FileCenterSettings {
    fn default() -> Self {
        Self {
            serve_directory: None,
            port: 8000,
            auto_start: false,
        }
    }
}

/// 用户设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct UserSettings {
    pub network_center: NetworkCenterSettings,
    pub file_center: FileCenterSettings,
}

/// 设置管理器
pub struct SettingsManager {
    /// 设置文件路径
    settings_path: PathBuf,
    /// 当前设置
    settings: UserSettings,
}

impl SettingsManager {
    const SETTINGS_FILE_NAME: &'static str = "user_settings.json";
    const APP_DIR_NAME: &'static str = "stephatility";

    /// 从默认位置加载设置
    ///
    /// 文件不存在或损坏时使用默认设置，只有无法确定配置目录时才返回错误。
    pub fn load() -> Result<Self, AppError> {
        let settings_path = Self::default_settings_path()?;
        Ok(Self::load_from(settings_path))
    }

    /// 从指定路径加载设置
    pub fn load_from(settings_path: impl Into<PathBuf>) -> Self {
        let settings_path = settings_path.into();
        log::info!("设置文件路径: {:?}", settings_path);

        let settings = match Self::read_file(&settings_path) {
            Ok(settings) => {
                log::info!("成功加载设置文件");
                settings
            }
            Err(e) => {
                log::warn!("加载设置文件失败，使用默认设置: {}", e);
                UserSettings::default()
            }
        };

        Self {
            settings_path,
            settings,
        }
    }

    /// 默认设置文件路径：`<配置目录>/stephatility/user_settings.json`
    fn default_settings_path() -> Result<PathBuf, AppError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::ConfigError("无法获取配置目录".to_string()))?;

        Ok(config_dir
            .join(Self::APP_DIR_NAME)
            .join(Self::SETTINGS_FILE_NAME))
    }

    fn read_file(path: &Path) -> Result<UserSettings, AppError> {
        if !path.exists() {
            return Err(AppError::ConfigError("设置文件不存在".to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("读取设置文件失败: {}", e)))?;

        if content.trim().is_empty() {
            return Err(AppError::ConfigError("设置文件为空".to_string()));
        }

        serde_json::from_str(&content)
            .map_err(|e| AppError::ConfigError(format!("解析设置文件失败: {}", e)))
    }

    /// 保存设置到文件（临时文件 + 原子重命名）
    pub fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::ConfigError(format!("创建配置目录失败: {}", e)))?;
        }

        let json_content = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| AppError::ConfigError(format!("序列化设置失败: {}", e)))?;

        let temp_path = self.settings_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .map_err(|e| AppError::ConfigError(format!("创建临时设置文件失败: {}", e)))?;
        file.write_all(json_content.as_bytes())
            .map_err(|e| AppError::ConfigError(format!("写入设置文件失败: {}", e)))?;
        file.sync_all()
            .map_err(|e| AppError::ConfigError(format!("同步设置文件失败: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &self.settings_path)
            .map_err(|e| AppError::ConfigError(format!("重命名设置文件失败: {}", e)))?;

        log::info!("设置已保存到: {:?}", self.settings_path);
        Ok(())
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// 修改设置并立即保存
    ///
    /// # 示例
    /// ```ignore
    /// manager.update_settings(|s| s.file_center.port = 8080)?;
    /// ```
    pub fn update_settings<F>(&mut self, updater: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut UserSettings),
    {
        updater(&mut self.settings);
        self.save()?;
        log::info!("设置已更新并保存");
        Ok(())
    }

    /// 重置为默认设置
    pub fn reset_to_default(&mut self) -> Result<(), AppError> {
        self.settings = UserSettings::default();
        self.save()?;
        log::info!("设置已重置为默认值");
        Ok(())
    }

    /// 备份当前设置文件
    ///
    /// # 返回
    /// * `Ok(PathBuf)` - 备份文件路径
    /// * `Err(AppError)` - 设置文件不存在或复制失败
    pub fn backup_settings(&self) -> Result<PathBuf, AppError> {
        if !self.settings_path.exists() {
            return Err(AppError::ConfigError("设置文件不存在，无法备份".to_string()));
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .settings_path
            .with_file_name(format!("user_settings_backup_{}.json", timestamp));

        fs::copy(&self.settings_path, &backup_path)
            .map_err(|e| AppError::ConfigError(format!("备份设置文件失败: {}", e)))?;

        log::info!("设置已备份到: {:?}", backup_path);
        Ok(backup_path)
    }
}

impl SettingsStore for SettingsManager {
    fn load_network_config(&self) -> NetworkConfig {
        let record = &self.settings.network_center.network_configuration;
        match NetworkConfig::from_serializable(record) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("已保存的网络配置无效，使用默认配置: {}", e);
                NetworkConfig::default()
            }
        }
    }

    fn save_network_config(&mut self, config: &NetworkConfig) -> Result<(), AppError> {
        let record = config.to_serializable();
        self.update_settings(|settings| {
            settings.network_center.network_configuration = record;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::network_config::AdapterClass;
    use tempfile::TempDir;

    fn create_test_manager(temp_dir: &TempDir) -> SettingsManager {
        SettingsManager::load_from(temp_dir.path().join("user_settings.json"))
    }

    #[test]
    fn test_default_settings() {
        let settings = UserSettings::default();

        assert_eq!(settings.file_center.port, 8000);
        assert!(!settings.file_center.auto_start);
        assert!(settings.file_center.serve_directory.is_none());
        assert!(settings.network_center.friendly_names.is_empty());
        assert_eq!(
            settings.network_center.network_configuration,
            NetworkConfig::default().to_serializable()
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_test_manager(&temp_dir);

        assert_eq!(manager.settings(), &UserSettings::default());
        assert!(!manager.settings_path().exists(), "仅加载不应创建文件");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp_dir);

        manager
            .update_settings(|s| {
                s.file_center.port = 9090;
                s.network_center.friendly_names.push("nas.local".to_string());
            })
            .unwrap();

        let reloaded = create_test_manager(&temp_dir);
        assert_eq!(reloaded.settings().file_center.port, 9090);
        assert_eq!(reloaded.settings().network_center.friendly_names, vec!["nas.local"]);
        assert!(
            !manager.settings_path().with_extension("json.tmp").exists(),
            "临时文件应已被重命名"
        );
    }

    #[test]
    fn test_corrupted_and_empty_file_fall_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user_settings.json");

        fs::write(&path, "{invalid json content}").unwrap();
        assert_eq!(SettingsManager::load_from(&path).settings(), &UserSettings::default());

        fs::write(&path, "   ").unwrap();
        assert_eq!(SettingsManager::load_from(&path).settings(), &UserSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user_settings.json");
        fs::write(&path, r#"{"file_center": {"auto_start": true}}"#).unwrap();

        let manager = SettingsManager::load_from(&path);

        assert!(manager.settings().file_center.auto_start);
        assert_eq!(manager.settings().file_center.port, 8000);
    }

    #[test]
    fn test_network_config_roundtrip_through_store() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp_dir);

        let config = NetworkConfig::new(
            AdapterClass::Wifi,
            "Wi-Fi",
            "10.0.0.42".parse().unwrap(),
            "255.255.254.0".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
        );
        manager.save_network_config(&config).unwrap();

        let reloaded = create_test_manager(&temp_dir);
        let loaded = reloaded.load_network_config();
        assert_eq!(loaded, config);
        assert!(!loaded.has_changed(), "加载后的配置不应处于已修改状态");
    }

    #[test]
    fn test_invalid_network_record_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp_dir);
        manager.settings.network_center.network_configuration.ipv4_address = "999.1.1.1".to_string();

        assert_eq!(manager.load_network_config(), NetworkConfig::default());
    }

    #[test]
    fn test_reset_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp_dir);
        manager.update_settings(|s| s.file_center.port = 1234).unwrap();

        manager.reset_to_default().unwrap();

        assert_eq!(manager.settings(), &UserSettings::default());
        assert_eq!(create_test_manager(&temp_dir).settings(), &UserSettings::default());
    }

    #[test]
    fn test_backup_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp_dir);

        assert!(manager.backup_settings().is_err(), "文件不存在时无法备份");

        manager.update_settings(|s| s.file_center.auto_start = true).unwrap();
        let backup_path = manager.backup_settings().unwrap();

        let content = fs::read_to_string(&backup_path).unwrap();
        let backup: UserSettings = serde_json::from_str(&content).unwrap();
        assert!(backup.file_center.auto_start);
    }
}
