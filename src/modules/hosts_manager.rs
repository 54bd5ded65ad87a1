// Hosts文件管理模块
// 为本地文件服务提供易记的本机名称（映射到 127.0.0.1）

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::modules::error::AppError;

const MARKER_START: &str = "# StephAtility Local Names";
const MARKER_END: &str = "# StephAtility Local Names End";
const LOOPBACK: &str = "127.0.0.1";

static FRIENDLY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("本机名称正则表达式无效"));

/// 名称只允许字母、数字、点、短横线和下划线
pub fn is_valid_friendly_name(name: &str) -> bool {
    FRIENDLY_NAME_RE.is_match(name)
}

/// hosts 文件按标记区域拆分后的结果
struct HostsSections {
    before: Vec<String>,
    names: Vec<String>,
    after: Vec<String>,
}

/// Hosts文件管理器
pub struct HostsManager {
    hosts_path: PathBuf,
    flush_dns: bool,
}

impl Default for HostsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HostsManager {
    /// 使用系统 hosts 文件
    pub fn new() -> Self {
        #[cfg(windows)]
        let hosts_path = PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts");

        #[cfg(not(windows))]
        let hosts_path = PathBuf::from("/etc/hosts");

        Self {
            hosts_path,
            flush_dns: true,
        }
    }

    /// 使用指定文件（不刷新 DNS 缓存）
    pub fn with_path(hosts_path: impl Into<PathBuf>) -> Self {
        Self {
            hosts_path: hosts_path.into(),
            flush_dns: false,
        }
    }

    /// hosts 中是否已有该名称（任意位置，按完整主机名匹配）
    pub fn friendly_name_exists(&self, name: &str) -> Result<bool, AppError> {
        let content = self.read_hosts()?;
        Ok(Self::contains_host(&content, name))
    }

    /// 本程序写入的全部名称
    pub fn friendly_names(&self) -> Result<Vec<String>, AppError> {
        let content = self.read_hosts()?;
        Ok(Self::split_content(&content).names)
    }

    /// 设置本机名称
    ///
    /// 先从标记区域移除旧名称；新名称已存在时不再重复写入。
    ///
    /// # 参数
    /// * `new_name` - 新名称
    /// * `old_name` - 之前使用的名称（可选）
    ///
    /// # 返回
    /// * `Ok(())` - 设置成功
    /// * `Err(AppError::ValidationError)` - 名称不合法
    /// * `Err(AppError::FileError)` - 读写 hosts 失败（通常是缺少管理员权限）
    pub fn set_friendly_name(&self, new_name: &str, old_name: Option<&str>) -> Result<(), AppError> {
        if !is_valid_friendly_name(new_name) {
            return Err(AppError::ValidationError(format!(
                "本机名称 '{}' 无效，只能包含字母、数字、点、短横线和下划线",
                new_name
            )));
        }

        let content = self.read_hosts()?;
        let mut sections = Self::split_content(&content);
        let mut changed = false;

        if let Some(old_name) = old_name.filter(|old_name| *old_name != new_name) {
            let before = sections.names.len();
            sections.names.retain(|name| name != old_name);
            changed = sections.names.len() != before;
        }

        if Self::contains_host(&Self::join_content(&sections), new_name) {
            log::info!("📝 [HostsManager] 名称 {} 已存在，跳过", new_name);
        } else {
            sections.names.push(new_name.to_string());
            changed = true;
        }

        if changed {
            self.write_hosts(&Self::join_content(&sections))?;
            log::info!("✅ [HostsManager] 本机名称已设置: {} -> {}", new_name, LOOPBACK);
        }

        Ok(())
    }

    /// 删除本机名称
    pub fn remove_friendly_name(&self, name: &str) -> Result<(), AppError> {
        let content = self.read_hosts()?;
        let mut sections = Self::split_content(&content);

        let before = sections.names.len();
        sections.names.retain(|entry| entry != name);
        if sections.names.len() == before {
            log::debug!("名称 {} 不在 hosts 中", name);
            return Ok(());
        }

        self.write_hosts(&Self::join_content(&sections))?;

        log::info!("✅ hosts记录删除成功: {}", name);
        Ok(())
    }

    /// 移除整个标记区域
    pub fn clear_all(&self) -> Result<(), AppError> {
        let content = self.read_hosts()?;
        let mut sections = Self::split_content(&content);

        if sections.names.is_empty() && !content.contains(MARKER_START) {
            return Ok(());
        }

        sections.names.clear();
        self.write_hosts(&Self::join_content(&sections))?;

        log::info!("✅ 所有本机名称记录已清理");
        Ok(())
    }

    fn read_hosts(&self) -> Result<String, AppError> {
        let mut file = File::open(&self.hosts_path)
            .map_err(|e| AppError::FileError(format!("无法打开hosts文件: {}", e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| AppError::FileError(format!("无法读取hosts文件: {}", e)))?;

        Ok(content)
    }

    fn write_hosts(&self, content: &str) -> Result<(), AppError> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.hosts_path)
            .map_err(|e| {
                AppError::FileError(format!("无法打开hosts文件进行写入: {}. 请确保以管理员权限运行", e))
            })?;

        file.write_all(content.as_bytes())
            .map_err(|e| AppError::FileError(format!("无法写入hosts文件: {}", e)))?;

        if self.flush_dns {
            Self::flush_dns_cache();
        }

        Ok(())
    }

    /// 按完整主机名查找，忽略注释行和行尾注释
    fn contains_host(content: &str, name: &str) -> bool {
        content.lines().any(|line| {
            line.split_whitespace()
                .take_while(|token| !token.starts_with('#'))
                .skip(1)
                .any(|host| host == name)
        })
    }

    /// 拆分为 (标记之前, 区域内名称, 标记之后)
    fn split_content(content: &str) -> HostsSections {
        let mut sections = HostsSections {
            before: Vec::new(),
            names: Vec::new(),
            after: Vec::new(),
        };

        let mut in_section = false;
        let mut seen_section = false;

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed == MARKER_START {
                in_section = true;
                seen_section = true;
            } else if trimmed == MARKER_END {
                in_section = false;
            } else if in_section {
                let mut parts = trimmed.split_whitespace();
                if let (Some(_ip), Some(host)) = (parts.next(), parts.next()) {
                    sections.names.push(host.to_string());
                }
            } else if seen_section {
                sections.after.push(line.to_string());
            } else {
                sections.before.push(line.to_string());
            }
        }

        sections
    }

    fn join_content(sections: &HostsSections) -> String {
        let mut lines: Vec<String> = sections.before.clone();

        if !sections.names.is_empty() {
            lines.push(MARKER_START.to_string());
            lines.extend(sections.names.iter().map(|name| format!("{} {}", LOOPBACK, name)));
            lines.push(MARKER_END.to_string());
        }

        lines.extend(sections.after.iter().cloned());

        if lines.is_empty() {
            String::new()
        } else {
            format!("{}\n", lines.join("\n"))
        }
    }

    /// 刷新DNS缓存，失败只记录警告
    fn flush_dns_cache() {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            use std::process::Command;

            // Windows 常量：CREATE_NO_WINDOW = 0x08000000
            const CREATE_NO_WINDOW: u32 = 0x08000000;

            match Command::new("ipconfig")
                .arg("/flushdns")
                .creation_flags(CREATE_NO_WINDOW)
                .output()
            {
                Ok(output) if output.status.success() => {
                    log::info!("✅ [HostsManager] DNS缓存已刷新");
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    log::warn!("⚠️ [HostsManager] ipconfig刷新DNS缓存失败: {}", stderr);
                }
                Err(e) => {
                    log::warn!("⚠️ [HostsManager] 执行ipconfig失败: {}", e);
                }
            }
        }

        #[cfg(not(windows))]
        {
            log::info!("[HostsManager] 非Windows平台，跳过DNS缓存刷新");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOSTS: &str = "127.0.0.1 localhost\n::1 localhost\n# 192.168.1.9 commented.lan\n";

    fn create_test_manager(temp_dir: &TempDir, content: &str) -> (HostsManager, PathBuf) {
        let path = temp_dir.path().join("hosts");
        std::fs::write(&path, content).unwrap();
        (HostsManager::with_path(&path), path)
    }

    #[test]
    fn test_is_valid_friendly_name() {
        assert!(is_valid_friendly_name("my-server_01.local"));
        assert!(!is_valid_friendly_name(""));
        assert!(!is_valid_friendly_name("has space"));
        assert!(!is_valid_friendly_name("名字"));
        assert!(!is_valid_friendly_name("a/b"));
    }

    #[test]
    fn test_set_friendly_name_creates_section() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, path) = create_test_manager(&temp_dir, HOSTS);

        manager.set_friendly_name("files.home", None).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(HOSTS), "原有内容应保持不变");
        assert!(content.contains(&format!("{}\n127.0.0.1 files.home\n{}\n", MARKER_START, MARKER_END)));
        assert!(manager.friendly_name_exists("files.home").unwrap());
        assert_eq!(manager.friendly_names().unwrap(), vec!["files.home"]);
    }

    #[test]
    fn test_set_friendly_name_replaces_old() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, _) = create_test_manager(&temp_dir, HOSTS);

        manager.set_friendly_name("old-name", None).unwrap();
        manager.set_friendly_name("new-name", Some("old-name")).unwrap();

        assert_eq!(manager.friendly_names().unwrap(), vec!["new-name"]);
        assert!(!manager.friendly_name_exists("old-name").unwrap());
    }

    #[test]
    fn test_existing_name_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, path) = create_test_manager(&temp_dir, HOSTS);

        // localhost 已在文件中（区域外）
        manager.set_friendly_name("localhost", None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), HOSTS);

        // 注释行中的名称不算存在
        assert!(!manager.friendly_name_exists("commented.lan").unwrap());
    }

    #[test]
    fn test_existing_name_still_removes_old() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, path) = create_test_manager(&temp_dir, HOSTS);

        manager.set_friendly_name("first.local", None).unwrap();
        manager.set_friendly_name("localhost", Some("first.local")).unwrap();

        assert!(manager.friendly_names().unwrap().is_empty());
        assert!(!manager.friendly_name_exists("first.local").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), HOSTS);
    }

    #[test]
    fn test_inline_comment_is_not_a_name() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, _) = create_test_manager(&temp_dir, "10.0.0.1 router # nas\n");

        assert!(manager.friendly_name_exists("router").unwrap());
        assert!(!manager.friendly_name_exists("nas").unwrap());
        assert!(!manager.friendly_name_exists("#").unwrap());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, path) = create_test_manager(&temp_dir, HOSTS);

        let result = manager.set_friendly_name("bad name", None);

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), HOSTS);
    }

    #[test]
    fn test_remove_and_clear_preserve_other_lines() {
        let temp_dir = TempDir::new().unwrap();
        let content = format!(
            "127.0.0.1 localhost\n{}\n127.0.0.1 a.local\n127.0.0.1 b.local\n{}\n10.0.0.1 router\n",
            MARKER_START, MARKER_END
        );
        let (manager, path) = create_test_manager(&temp_dir, &content);

        manager.remove_friendly_name("a.local").unwrap();
        assert_eq!(manager.friendly_names().unwrap(), vec!["b.local"]);

        manager.clear_all().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "127.0.0.1 localhost\n10.0.0.1 router\n"
        );
    }

    #[test]
    fn test_missing_hosts_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = HostsManager::with_path(temp_dir.path().join("missing"));

        assert!(matches!(manager.friendly_name_exists("x"), Err(AppError::FileError(_))));
    }
}
