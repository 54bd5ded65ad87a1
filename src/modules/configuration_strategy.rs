use crate::modules::error::{log_error_with_details, AppError};
use crate::modules::network_config::{AdapterClass, NetworkConfig};
use std::process::{Command, Output};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

// Windows常量：CREATE_NO_WINDOW = 0x08000000
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// 读取/应用系统网络配置的平台策略
///
/// NetworkService 只依赖这个接口，解析逻辑与具体命令互不相关。
pub trait ConfigurationStrategy {
    /// 读取包含目标网卡的原始状态文本
    ///
    /// # 返回
    /// * `Err(AppError::ConfigurationReadFailed)` - 外部命令执行失败
    fn read(&self, adapter_class: AdapterClass, adapter_name: &str) -> Result<String, AppError>;

    /// 将配置写入系统
    ///
    /// 失败时配置可能已部分生效，调用方应重新读取确认实际状态。
    fn apply(&self, config: &NetworkConfig) -> Result<(), AppError>;

    /// 当前平台是否支持读取实时配置
    fn supports_live_read(&self) -> bool {
        cfg!(windows)
    }
}

/// 检查是否以管理员权限运行（仅 Windows）
#[cfg(windows)]
fn is_elevated() -> bool {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token: HANDLE = HANDLE::default();

        // 打开当前进程的访问令牌
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }

        let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
        let mut return_length = 0u32;

        // 获取令牌提升信息
        let result = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut return_length,
        );

        let _ = CloseHandle(token);

        result.is_ok() && elevation.TokenIsElevated != 0
    }
}

/// 非 Windows 平台始终返回 true（不需要管理员权限）
#[cfg(not(windows))]
fn is_elevated() -> bool {
    true
}

/// 基于 ipconfig / netsh 的 Windows 实现
#[derive(Debug, Clone, Default)]
pub struct IpconfigStrategy;

impl IpconfigStrategy {
    pub fn new() -> Self {
        Self
    }

    /// 构建 netsh 参数
    ///
    /// 网关为 0.0.0.0 时使用 `none`，表示不设置默认网关。
    pub fn build_apply_args(config: &NetworkConfig) -> Vec<String> {
        let gateway = if config.default_gateway().octets() == [0, 0, 0, 0] {
            "none".to_string()
        } else {
            config.default_gateway().to_string()
        };

        vec![
            "interface".to_string(),
            "ipv4".to_string(),
            "set".to_string(),
            "address".to_string(),
            config.adapter_name().to_string(),
            "static".to_string(),
            config.ipv4_address().to_string(),
            config.subnet_mask().to_string(),
            gateway,
        ]
    }

    /// 执行命令并在 Windows 上隐藏控制台窗口
    fn run_hidden(program: &str, args: &[String]) -> std::io::Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.output()
    }
}

impl ConfigurationStrategy for IpconfigStrategy {
    fn read(&self, adapter_class: AdapterClass, adapter_name: &str) -> Result<String, AppError> {
        log::debug!("读取网卡配置: {} {}", adapter_class.label_prefix(), adapter_name);

        let output = Self::run_hidden("ipconfig", &[]).map_err(|e| {
            AppError::ConfigurationReadFailed(format!("执行 ipconfig 失败: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ConfigurationReadFailed(format!(
                "ipconfig 返回 {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn apply(&self, config: &NetworkConfig) -> Result<(), AppError> {
        if !is_elevated() {
            log::error!("未以管理员权限运行，无法修改网卡配置");
            return Err(AppError::ConfigurationApplyFailed(
                "需要管理员权限：请右键点击程序图标，选择\"以管理员身份运行\"".to_string(),
            ));
        }

        let args = Self::build_apply_args(config);
        log::info!("执行 netsh {}", args.join(" "));

        let output = Self::run_hidden("netsh", &args).map_err(|e| {
            AppError::ConfigurationApplyFailed(format!("执行 netsh 失败: {}", e))
        })?;

        if !output.status.success() {
            // netsh 把错误信息写到标准输出
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = format!("{} {}", stdout.trim(), stderr.trim());
            let error = AppError::ConfigurationApplyFailed(detail.trim().to_string());
            log_error_with_details(&error, "IpconfigStrategy", &format!("netsh 退出状态 {}", output.status));
            return Err(error);
        }

        log::info!("✅ 网卡 {} 配置已应用", config.adapter_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ipv4_address::Ipv4Address;

    fn config_with_gateway(gateway: &str) -> NetworkConfig {
        NetworkConfig::new(
            AdapterClass::Wifi,
            "Wi-Fi 2",
            "192.168.1.37".parse().unwrap(),
            Ipv4Address::DEFAULT_SUBNET_MASK,
            gateway.parse().unwrap(),
        )
    }

    #[test]
    fn test_build_apply_args() {
        let args = IpconfigStrategy::build_apply_args(&config_with_gateway("192.168.1.1"));

        assert_eq!(
            args,
            vec![
                "interface",
                "ipv4",
                "set",
                "address",
                "Wi-Fi 2",
                "static",
                "192.168.1.37",
                "255.255.255.0",
                "192.168.1.1",
            ]
        );
    }

    #[test]
    fn test_unspecified_gateway_becomes_none() {
        let args = IpconfigStrategy::build_apply_args(&config_with_gateway("0.0.0.0"));
        assert_eq!(args.last().map(String::as_str), Some("none"));
    }

    #[test]
    fn test_live_read_gate_matches_platform() {
        assert_eq!(IpconfigStrategy::new().supports_live_read(), cfg!(windows));
    }
}
