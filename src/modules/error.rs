/// 统一的应用错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// IPv4 地址字符串格式错误
    #[error("IPv4 地址格式无效: {0}")]
    InvalidAddressFormat(String),

    /// 单个地址段不是 0-255 之间的整数
    #[error("IPv4 地址段超出范围 (0-255): {0}")]
    OctetOutOfRange(String),

    /// 地址段索引越界（编程错误）
    #[error("地址段索引越界: {0}（有效范围 0-3）")]
    IndexOutOfRange(usize),

    /// 配置补丁字段不存在或类型不匹配
    #[error("配置补丁无效: {0}")]
    InvalidPatchType(String),

    /// 未知的网卡类型标签
    #[error("未知的网卡类型: {0}")]
    UnknownAdapterClass(String),

    /// 在 ipconfig 输出中找不到指定网卡
    #[error("未找到网卡: {0}")]
    AdapterNotFound(String),

    /// 读取系统网络配置失败
    #[error("读取网络配置失败: {0}")]
    ConfigurationReadFailed(String),

    /// 应用网络配置失败（可能已部分生效）
    #[error("应用网络配置失败: {0}")]
    ConfigurationApplyFailed(String),

    /// 输入验证错误
    #[error("输入验证失败: {0}")]
    ValidationError(String),

    /// 配置文件错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 进程/线程管理错误
    #[error("进程错误: {0}")]
    ProcessError(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(String),

    /// 文件操作错误
    #[error("文件错误: {0}")]
    FileError(String),

    /// 序列化/反序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),
}

impl AppError {
    /// 返回供界面展示的状态码（0 保留给成功）
    pub fn code(&self) -> i32 {
        match self {
            AppError::ConfigurationApplyFailed(_) => 1,
            AppError::ConfigurationReadFailed(_) | AppError::AdapterNotFound(_) => 2,
            AppError::InvalidAddressFormat(_)
            | AppError::OctetOutOfRange(_)
            | AppError::IndexOutOfRange(_)
            | AppError::InvalidPatchType(_)
            | AppError::UnknownAdapterClass(_)
            | AppError::ValidationError(_) => 3,
            AppError::ConfigError(_)
            | AppError::IoError(_)
            | AppError::FileError(_)
            | AppError::SerializationError(_) => 4,
            AppError::ProcessError(_) => 5,
        }
    }
}

/// 从 std::io::Error 转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

/// 从 serde_json::Error 转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

/// 错误日志记录函数
pub fn log_error(error: &AppError, context: &str) {
    log::error!("[{}] 错误: {}", context, error);
}

/// 错误日志记录函数（带详细信息）
pub fn log_error_with_details(error: &AppError, context: &str, details: &str) {
    log::error!("[{}] 错误: {} - 详情: {}", context, error, details);
}
