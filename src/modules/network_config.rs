use crate::modules::error::AppError;
use crate::modules::ipv4_address::Ipv4Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 网卡类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterClass {
    /// 有线网卡
    #[default]
    #[serde(rename = "ETHERNET")]
    Ethernet,
    /// 无线网卡
    #[serde(rename = "WIFI")]
    Wifi,
}

impl AdapterClass {
    /// 持久化使用的字符串标签
    pub fn tag(&self) -> &'static str {
        match self {
            AdapterClass::Ethernet => "ETHERNET",
            AdapterClass::Wifi => "WIFI",
        }
    }

    /// ipconfig 输出中网卡标题行的前缀
    pub fn label_prefix(&self) -> &'static str {
        match self {
            AdapterClass::Ethernet => "Ethernet adapter",
            AdapterClass::Wifi => "Wireless LAN adapter",
        }
    }
}

impl fmt::Display for AdapterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AdapterClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ETHERNET" => Ok(AdapterClass::Ethernet),
            "WIFI" => Ok(AdapterClass::Wifi),
            other => Err(AppError::UnknownAdapterClass(other.to_string())),
        }
    }
}

/// 字段名（与持久化键一致）
pub const FIELD_ADAPTER_PREFIX: &str = "adapter_prefix";
pub const FIELD_ADAPTER_NAME: &str = "adapter_name";
pub const FIELD_IPV4_ADDRESS: &str = "ipv4_address";
pub const FIELD_SUBNET_MASK: &str = "subnet_mask";
pub const FIELD_DEFAULT_GATEWAY: &str = "default_gateway";

/// 网络配置的扁平序列化形式
///
/// 所有值均为字符串，直接写入用户设置文件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub adapter_prefix: String,
    pub adapter_name: String,
    pub ipv4_address: String,
    pub subnet_mask: String,
    pub default_gateway: String,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        NetworkConfig::default().to_serializable()
    }
}

/// 单个字段更新的值
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Adapter(AdapterClass),
    Text(String),
    Address(Ipv4Address),
}

impl From<AdapterClass> for PatchValue {
    fn from(value: AdapterClass) -> Self {
        PatchValue::Adapter(value)
    }
}

impl From<String> for PatchValue {
    fn from(value: String) -> Self {
        PatchValue::Text(value)
    }
}

impl From<&str> for PatchValue {
    fn from(value: &str) -> Self {
        PatchValue::Text(value.to_string())
    }
}

impl From<Ipv4Address> for PatchValue {
    fn from(value: Ipv4Address) -> Self {
        PatchValue::Address(value)
    }
}

/// 部分字段更新
///
/// 只能表达 NetworkConfig 已声明的字段；从 JSON 解析时拒绝未知字段。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldUpdates {
    pub adapter_prefix: Option<AdapterClass>,
    pub adapter_name: Option<String>,
    pub ipv4_address: Option<Ipv4Address>,
    pub subnet_mask: Option<Ipv4Address>,
    pub default_gateway: Option<Ipv4Address>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象解析，未知字段或类型不匹配返回 InvalidPatchType
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| AppError::InvalidPatchType(e.to_string()))
    }

    /// 按字段名设置值
    ///
    /// # 返回
    /// * `Err(AppError::InvalidPatchType)` - 字段不存在，或值类型与字段类型不一致
    pub fn set(&mut self, key: &str, value: impl Into<PatchValue>) -> Result<&mut Self, AppError> {
        match (key, value.into()) {
            (FIELD_ADAPTER_PREFIX, PatchValue::Adapter(class)) => self.adapter_prefix = Some(class),
            (FIELD_ADAPTER_NAME, PatchValue::Text(name)) => self.adapter_name = Some(name),
            (FIELD_IPV4_ADDRESS, PatchValue::Address(ip)) => self.ipv4_address = Some(ip),
            (FIELD_SUBNET_MASK, PatchValue::Address(ip)) => self.subnet_mask = Some(ip),
            (FIELD_DEFAULT_GATEWAY, PatchValue::Address(ip)) => self.default_gateway = Some(ip),
            (
                FIELD_ADAPTER_PREFIX | FIELD_ADAPTER_NAME | FIELD_IPV4_ADDRESS | FIELD_SUBNET_MASK
                | FIELD_DEFAULT_GATEWAY,
                value,
            ) => {
                return Err(AppError::InvalidPatchType(format!(
                    "字段 {} 的值类型不匹配: {:?}",
                    key, value
                )));
            }
            (other, _) => {
                return Err(AppError::InvalidPatchType(format!(
                    "{} 不是 NetworkConfig 的字段",
                    other
                )));
            }
        }
        Ok(self)
    }

    pub fn with_ipv4_address(mut self, ip: Ipv4Address) -> Self {
        self.ipv4_address = Some(ip);
        self
    }

    pub fn with_subnet_mask(mut self, mask: Ipv4Address) -> Self {
        self.subnet_mask = Some(mask);
        self
    }

    pub fn with_default_gateway(mut self, gateway: Ipv4Address) -> Self {
        self.default_gateway = Some(gateway);
        self
    }

    /// 是否没有任何字段需要更新
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// 配置更新方式：整体替换或部分字段更新
#[derive(Debug, Clone)]
pub enum ConfigPatch {
    Replace(NetworkConfig),
    Fields(FieldUpdates),
}

impl From<NetworkConfig> for ConfigPatch {
    fn from(config: NetworkConfig) -> Self {
        ConfigPatch::Replace(config)
    }
}

impl From<FieldUpdates> for ConfigPatch {
    fn from(updates: FieldUpdates) -> Self {
        ConfigPatch::Fields(updates)
    }
}

/// 网卡 IPv4 配置
///
/// 除当前值外还保存一份序列化的基线快照，用于判断是否有未应用的修改。
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    adapter_class: AdapterClass,
    adapter_name: String,
    ipv4_address: Ipv4Address,
    subnet_mask: Ipv4Address,
    default_gateway: Ipv4Address,
    baseline: ConfigRecord,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::for_adapter(AdapterClass::Ethernet, "Ethernet")
    }
}

/// 相等性只比较配置字段，不比较基线
impl PartialEq for NetworkConfig {
    fn eq(&self, other: &Self) -> bool {
        self.adapter_class == other.adapter_class
            && self.adapter_name == other.adapter_name
            && self.ipv4_address == other.ipv4_address
            && self.subnet_mask == other.subnet_mask
            && self.default_gateway == other.default_gateway
    }
}

impl Eq for NetworkConfig {}

impl NetworkConfig {
    /// 创建配置并立即记录基线
    pub fn new(
        adapter_class: AdapterClass,
        adapter_name: impl Into<String>,
        ipv4_address: Ipv4Address,
        subnet_mask: Ipv4Address,
        default_gateway: Ipv4Address,
    ) -> Self {
        let mut config = Self {
            adapter_class,
            adapter_name: adapter_name.into(),
            ipv4_address,
            subnet_mask,
            default_gateway,
            baseline: ConfigRecord {
                adapter_prefix: String::new(),
                adapter_name: String::new(),
                ipv4_address: String::new(),
                subnet_mask: String::new(),
                default_gateway: String::new(),
            },
        };
        config.reset_baseline();
        config
    }

    /// 指定网卡，地址字段使用默认值
    pub fn for_adapter(adapter_class: AdapterClass, adapter_name: impl Into<String>) -> Self {
        Self::new(
            adapter_class,
            adapter_name,
            Ipv4Address::UNSPECIFIED,
            Ipv4Address::DEFAULT_SUBNET_MASK,
            Ipv4Address::UNSPECIFIED,
        )
    }

    pub fn adapter_class(&self) -> AdapterClass {
        self.adapter_class
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn ipv4_address(&self) -> &Ipv4Address {
        &self.ipv4_address
    }

    pub fn subnet_mask(&self) -> &Ipv4Address {
        &self.subnet_mask
    }

    pub fn default_gateway(&self) -> &Ipv4Address {
        &self.default_gateway
    }

    /// 供界面逐段编辑 IP 地址
    pub fn ipv4_address_mut(&mut self) -> &mut Ipv4Address {
        &mut self.ipv4_address
    }

    pub fn subnet_mask_mut(&mut self) -> &mut Ipv4Address {
        &mut self.subnet_mask
    }

    pub fn default_gateway_mut(&mut self) -> &mut Ipv4Address {
        &mut self.default_gateway
    }

    /// 更新配置
    ///
    /// # 参数
    /// * `patch` - 整体替换（只复制配置字段，不复制基线）或部分字段更新
    pub fn update_configuration(&mut self, patch: impl Into<ConfigPatch>) {
        match patch.into() {
            ConfigPatch::Replace(other) => {
                self.adapter_class = other.adapter_class;
                self.adapter_name = other.adapter_name;
                self.ipv4_address.copy_from(&other.ipv4_address);
                self.subnet_mask.copy_from(&other.subnet_mask);
                self.default_gateway.copy_from(&other.default_gateway);
            }
            ConfigPatch::Fields(updates) => {
                if let Some(class) = updates.adapter_prefix {
                    self.adapter_class = class;
                }
                if let Some(name) = updates.adapter_name {
                    self.adapter_name = name;
                }
                if let Some(ip) = updates.ipv4_address {
                    self.ipv4_address.copy_from(&ip);
                }
                if let Some(mask) = updates.subnet_mask {
                    self.subnet_mask.copy_from(&mask);
                }
                if let Some(gateway) = updates.default_gateway {
                    self.default_gateway.copy_from(&gateway);
                }
            }
        }
    }

    /// 三个地址字段恢复为默认值，网卡信息保持不变
    pub fn reset_addresses(&mut self) {
        self.ipv4_address = Ipv4Address::UNSPECIFIED;
        self.subnet_mask = Ipv4Address::DEFAULT_SUBNET_MASK;
        self.default_gateway = Ipv4Address::UNSPECIFIED;
    }

    /// 当前配置是否与基线不同
    pub fn has_changed(&self) -> bool {
        self.to_serializable() != self.baseline
    }

    /// 以当前配置作为新的基线
    pub fn reset_baseline(&mut self) {
        self.baseline = self.to_serializable();
    }

    /// 转换为扁平的持久化记录
    pub fn to_serializable(&self) -> ConfigRecord {
        ConfigRecord {
            adapter_prefix: self.adapter_class.tag().to_string(),
            adapter_name: self.adapter_name.clone(),
            ipv4_address: self.ipv4_address.to_string(),
            subnet_mask: self.subnet_mask.to_string(),
            default_gateway: self.default_gateway.to_string(),
        }
    }

    /// 从持久化记录恢复，基线即为该记录
    ///
    /// # 返回
    /// * `Err(AppError::UnknownAdapterClass)` - 网卡类型标签无法识别
    /// * `Err(AppError::InvalidAddressFormat)` - 任一地址字段格式错误
    pub fn from_serializable(record: &ConfigRecord) -> Result<Self, AppError> {
        Ok(Self::new(
            record.adapter_prefix.parse()?,
            record.adapter_name.clone(),
            record.ipv4_address.parse()?,
            record.subnet_mask.parse()?,
            record.default_gateway.parse()?,
        ))
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: IP={} 掩码={} 网关={}",
            self.adapter_class.label_prefix(),
            self.adapter_name,
            self.ipv4_address,
            self.subnet_mask,
            self.default_gateway
        )
    }
}
