use crate::modules::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 地址段数量
pub const OCTET_COUNT: usize = 4;

/// 经过验证的 IPv4 地址
///
/// 任何构造或修改路径都会先完成验证，因此不存在“部分有效”的实例。
/// 序列化为点分十进制字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Address {
    octets: [u8; OCTET_COUNT],
}

impl Default for Ipv4Address {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl Ipv4Address {
    /// 0.0.0.0
    pub const UNSPECIFIED: Self = Self { octets: [0, 0, 0, 0] };

    /// 255.255.255.0
    pub const DEFAULT_SUBNET_MASK: Self = Self {
        octets: [255, 255, 255, 0],
    };

    /// 由四个数值直接构造（u8 本身即保证范围）
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self {
            octets: [a, b, c, d],
        }
    }

    /// 由字符串形式的地址段列表构造
    ///
    /// # 参数
    /// * `octets` - 地址段列表，必须恰好 4 个
    ///
    /// # 返回
    /// * `Ok(Ipv4Address)` - 构造成功
    /// * `Err(AppError::InvalidAddressFormat)` - 地址段数量不是 4
    /// * `Err(AppError::OctetOutOfRange)` - 某个地址段不是 0-255 的整数
    pub fn from_octets<S: AsRef<str>>(octets: &[S]) -> Result<Self, AppError> {
        if octets.len() != OCTET_COUNT {
            return Err(AppError::InvalidAddressFormat(format!(
                "需要 {} 个地址段，实际为 {} 个",
                OCTET_COUNT,
                octets.len()
            )));
        }

        let mut parsed = [0u8; OCTET_COUNT];
        for (slot, octet) in parsed.iter_mut().zip(octets) {
            let octet = octet.as_ref();
            *slot = parse_octet(octet).ok_or_else(|| AppError::OctetOutOfRange(octet.to_string()))?;
        }

        Ok(Self { octets: parsed })
    }

    /// 读取指定位置的地址段
    pub fn octet(&self, index: usize) -> Result<u8, AppError> {
        self.octets
            .get(index)
            .copied()
            .ok_or(AppError::IndexOutOfRange(index))
    }

    /// 原地修改指定位置的地址段
    ///
    /// # 参数
    /// * `index` - 地址段索引 (0-3)
    /// * `value` - 新值的字符串形式
    ///
    /// # 返回
    /// * `Ok(())` - 修改成功
    /// * `Err(AppError::IndexOutOfRange)` - 索引越界
    /// * `Err(AppError::OctetOutOfRange)` - 新值无效，原值保持不变
    pub fn set_octet(&mut self, index: usize, value: &str) -> Result<(), AppError> {
        if index >= OCTET_COUNT {
            return Err(AppError::IndexOutOfRange(index));
        }
        let octet = parse_octet(value).ok_or_else(|| AppError::OctetOutOfRange(value.to_string()))?;
        self.octets[index] = octet;
        Ok(())
    }

    /// 从字符串整体替换地址，失败时保持原值
    pub fn update_from_string(&mut self, ip: &str) -> Result<(), AppError> {
        *self = ip.parse()?;
        Ok(())
    }

    /// 复制另一个地址的全部地址段
    pub fn copy_from(&mut self, other: &Ipv4Address) {
        self.octets = other.octets;
    }

    /// 全部地址段
    pub fn octets(&self) -> [u8; OCTET_COUNT] {
        self.octets
    }

    /// 作为子网掩码时是否有效
    ///
    /// 32 位二进制串中不允许出现 `01`，即所有 1 必须从最高位开始连续。
    /// 全 0 与全 1 都视为有效。
    pub fn is_valid_mask(&self) -> bool {
        let bits = u32::from_be_bytes(self.octets);
        bits.leading_ones() + bits.trailing_zeros() == 32
    }

    /// 掩码前缀长度（非法掩码返回 None）
    pub fn prefix_len(&self) -> Option<u32> {
        self.is_valid_mask()
            .then(|| u32::from_be_bytes(self.octets).leading_ones())
    }
}

/// 解析单个地址段：必须全部由数字组成，且在 0-255 范围内
fn parse_octet(token: &str) -> Option<u8> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u8>().ok()
}

impl FromStr for Ipv4Address {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != OCTET_COUNT {
            return Err(AppError::InvalidAddressFormat(s.to_string()));
        }

        let mut octets = [0u8; OCTET_COUNT];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            *slot = parse_octet(part).ok_or_else(|| AppError::InvalidAddressFormat(s.to_string()))?;
        }

        Ok(Self { octets })
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl TryFrom<String> for Ipv4Address {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Address> for String {
    fn from(value: Ipv4Address) -> Self {
        value.to_string()
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self {
            octets: addr.octets(),
        }
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        Ipv4Addr::from(addr.octets)
    }
}

/// 与字符串比较；无法解析的字符串视为不相等
impl PartialEq<str> for Ipv4Address {
    fn eq(&self, other: &str) -> bool {
        other.parse::<Ipv4Address>().map_or(false, |ip| ip == *self)
    }
}

impl PartialEq<&str> for Ipv4Address {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
