// ipconfig 文本解析
// 纯函数，不访问系统环境，便于用固定文本做单元测试

use crate::modules::error::AppError;
use crate::modules::network_config::AdapterClass;
use regex::Regex;
use std::sync::LazyLock;

static IPV4_ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"IPv4 Address[ .:]+(\d{1,3}(?:\.\d{1,3}){3})\b").expect("IPv4 正则表达式无效")
});

static SUBNET_MASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Subnet Mask[ .:]+(\d{1,3}(?:\.\d{1,3}){3})\b").expect("子网掩码正则表达式无效")
});

// 网关值可能跨多行（先 IPv6 后 IPv4），续行只包含地址字符
static DEFAULT_GATEWAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)Default Gateway[ .]*:(?P<value>.*(?:\n[ \t]+[0-9A-Fa-f:.%]+[ \t]*$)*)")
        .expect("默认网关正则表达式无效")
});

static IPV4_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})\b").expect("IPv4 片段正则表达式无效")
});

/// 从网卡区块中提取的原始字段
///
/// 字段为 None 表示区块中没有该项，由调用方替换为默认值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterFields {
    pub ipv4_address: Option<String>,
    pub subnet_mask: Option<String>,
    pub default_gateway: Option<String>,
}

impl AdapterFields {
    pub fn is_empty(&self) -> bool {
        self.ipv4_address.is_none() && self.subnet_mask.is_none() && self.default_gateway.is_none()
    }
}

/// 在多网卡输出中定位指定网卡的区块
///
/// 区块从 `<前缀> <名称>:` 标题行之后开始，到下一个顶格的非空行为止。
///
/// # 返回
/// * `Ok(String)` - 区块文本（换行统一为 `\n`）
/// * `Err(AppError::AdapterNotFound)` - 找不到标题行
pub fn find_adapter_block(
    dump: &str,
    adapter_class: AdapterClass,
    adapter_name: &str,
) -> Result<String, AppError> {
    let header = format!("{} {}", adapter_class.label_prefix(), adapter_name);
    let normalized = dump.replace("\r\n", "\n");

    let mut lines = normalized.lines();
    if !lines
        .by_ref()
        .any(|line| line.trim_end().strip_suffix(':') == Some(header.as_str()))
    {
        return Err(AppError::AdapterNotFound(header));
    }

    let block: Vec<&str> = lines
        .take_while(|line| line.trim().is_empty() || line.starts_with(char::is_whitespace))
        .collect();

    Ok(block.join("\n"))
}

/// 从单个网卡区块中提取 IP、掩码和网关
pub fn extract_fields(block: &str) -> AdapterFields {
    let normalized = block.replace("\r\n", "\n");

    let capture = |re: &Regex| {
        re.captures(&normalized)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };

    // 网关取第一个 IPv4 形式的值，忽略 IPv6 及 %n 作用域后缀
    let default_gateway = DEFAULT_GATEWAY_RE
        .captures(&normalized)
        .and_then(|caps| caps.name("value"))
        .and_then(|value| IPV4_TOKEN_RE.captures(value.as_str()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    AdapterFields {
        ipv4_address: capture(&IPV4_ADDRESS_RE),
        subnet_mask: capture(&SUBNET_MASK_RE),
        default_gateway,
    }
}

/// 定位网卡区块并提取字段
pub fn extract_adapter_fields(
    dump: &str,
    adapter_class: AdapterClass,
    adapter_name: &str,
) -> Result<AdapterFields, AppError> {
    let block = find_adapter_block(dump, adapter_class, adapter_name)?;
    Ok(extract_fields(&block))
}
