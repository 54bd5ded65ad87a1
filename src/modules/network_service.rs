use crate::modules::config_text::{self, AdapterFields};
use crate::modules::configuration_strategy::ConfigurationStrategy;
use crate::modules::error::{log_error, AppError};
use crate::modules::ipv4_address::Ipv4Address;
use crate::modules::network_config::{AdapterClass, FieldUpdates, NetworkConfig};
use serde::Serialize;

/// 网络配置的持久化存储
pub trait SettingsStore {
    /// 读取启动时使用的网络配置
    fn load_network_config(&self) -> NetworkConfig;

    /// 保存成功应用后的网络配置
    fn save_network_config(&mut self, config: &NetworkConfig) -> Result<(), AppError>;
}

/// 应用配置的结果（状态码 + 提示信息），供界面直接展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// 0 表示成功
    pub code: i32,
    pub message: String,
}

impl ApplyOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// 刷新配置的数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// 已从系统读取
    Live,
    /// 系统中找不到该网卡，地址字段已恢复默认值
    AdapterMissing,
    /// 当前平台不支持读取，配置保持不变
    Unsupported,
}

/// 网络服务
///
/// 持有唯一的实时网络配置，负责读取系统配置、应用修改并持久化。
/// 只在界面线程中使用。
pub struct NetworkService<C, S> {
    /// 平台策略
    strategy: C,
    /// 用户设置存储
    settings: S,
    /// 当前网络配置
    network_config: NetworkConfig,
}

impl<C: ConfigurationStrategy, S: SettingsStore> NetworkService<C, S> {
    /// 创建网络服务，从用户设置中载入初始配置
    pub fn new(strategy: C, settings: S) -> Self {
        let network_config = settings.load_network_config();
        log::info!("网络服务初始化: {}", network_config);

        Self {
            strategy,
            settings,
            network_config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.network_config
    }

    /// 供界面直接编辑当前配置
    pub fn config_mut(&mut self) -> &mut NetworkConfig {
        &mut self.network_config
    }

    pub fn strategy(&self) -> &C {
        &self.strategy
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    /// 切换目标网卡
    pub fn select_adapter(&mut self, adapter_class: AdapterClass, adapter_name: &str) {
        log::info!("切换目标网卡: {} {}", adapter_class.label_prefix(), adapter_name);
        self.network_config.update_configuration(FieldUpdates {
            adapter_prefix: Some(adapter_class),
            adapter_name: Some(adapter_name.to_string()),
            ..FieldUpdates::default()
        });
    }

    /// 从系统读取目标网卡的配置并合并到当前配置
    ///
    /// # 返回
    /// * `Ok(RefreshSource)` - 读取完成（包括不支持或网卡不存在的降级情况）
    /// * `Err(AppError::ConfigurationReadFailed)` - 外部命令执行失败，配置保持不变
    pub fn refresh(&mut self) -> Result<RefreshSource, AppError> {
        if !self.strategy.supports_live_read() {
            log::info!("当前平台不支持读取网卡配置，保持现有配置");
            return Ok(RefreshSource::Unsupported);
        }

        let adapter_class = self.network_config.adapter_class();
        let adapter_name = self.network_config.adapter_name().to_string();

        let dump = self.strategy.read(adapter_class, &adapter_name)?;

        match config_text::extract_adapter_fields(&dump, adapter_class, &adapter_name) {
            Ok(fields) => {
                self.network_config
                    .update_configuration(Self::fields_to_updates(&fields));
                log::info!("已读取网卡配置: {}", self.network_config);
                Ok(RefreshSource::Live)
            }
            Err(AppError::AdapterNotFound(label)) => {
                log::warn!("未找到网卡 {}，地址恢复为默认值", label);
                self.network_config.reset_addresses();
                Ok(RefreshSource::AdapterMissing)
            }
            Err(e) => Err(e),
        }
    }

    /// 获取网络配置
    ///
    /// 读取失败时记录日志并返回当前持有的配置。
    pub fn get_network_configuration(&mut self) -> &NetworkConfig {
        if let Err(e) = self.refresh() {
            log_error(&e, "NetworkService");
        }
        &self.network_config
    }

    /// 应用当前配置
    ///
    /// 成功时保存用户设置并重置基线；失败时基线保持不变，返回错误信息。
    pub fn apply_configuration(&mut self) -> ApplyOutcome {
        let mask = *self.network_config.subnet_mask();
        if !mask.is_valid_mask() {
            let error = AppError::ValidationError(format!("子网掩码无效: {}", mask));
            log_error(&error, "NetworkService");
            return ApplyOutcome::failure(&error);
        }

        log::info!("正在应用网络配置: {}", self.network_config);

        if let Err(e) = self.strategy.apply(&self.network_config) {
            log_error(&e, "NetworkService");
            return ApplyOutcome::failure(&e);
        }

        let message = match self.settings.save_network_config(&self.network_config) {
            Ok(()) => "网络设置已成功更新".to_string(),
            Err(e) => {
                log_error(&e, "NetworkService");
                format!("网络设置已更新，但保存用户设置失败: {}", e)
            }
        };

        self.network_config.reset_baseline();
        ApplyOutcome::success(message)
    }

    /// 把提取到的字段转换为更新；缺失或无法解析的字段使用默认值
    fn fields_to_updates(fields: &AdapterFields) -> FieldUpdates {
        let parse_or = |value: &Option<String>, label: &str, default: Ipv4Address| {
            match value.as_deref().map(str::parse::<Ipv4Address>) {
                Some(Ok(ip)) => ip,
                Some(Err(e)) => {
                    log::warn!("{} 无法解析，使用默认值 {}: {}", label, default, e);
                    default
                }
                None => default,
            }
        };

        FieldUpdates::new()
            .with_ipv4_address(parse_or(&fields.ipv4_address, "IPv4 地址", Ipv4Address::UNSPECIFIED))
            .with_subnet_mask(parse_or(
                &fields.subnet_mask,
                "子网掩码",
                Ipv4Address::DEFAULT_SUBNET_MASK,
            ))
            .with_default_gateway(parse_or(
                &fields.default_gateway,
                "默认网关",
                Ipv4Address::UNSPECIFIED,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::network_config::ConfigRecord;
    use std::cell::{Cell, RefCell};

    const DUMP: &str = "\
Ethernet adapter Ethernet:

   IPv4 Address. . . . . . . . . . . : 192.168.1.100
   Subnet Mask . . . . . . . . . . . : 255.255.255.0

Wireless LAN adapter Wi-Fi:

   IPv4 Address. . . . . . . . . . . : 10.0.0.42
   Subnet Mask . . . . . . . . . . . : 255.255.254.0
   Default Gateway . . . . . . . . . : 10.0.0.1
";

    /// 可控的测试策略
    struct MockStrategy {
        dump: Result<String, AppError>,
        apply_result: Result<(), AppError>,
        live: bool,
        reads: Cell<usize>,
        applied: RefCell<Vec<NetworkConfig>>,
    }

    impl MockStrategy {
        fn new() -> Self {
            Self {
                dump: Ok(DUMP.to_string()),
                apply_result: Ok(()),
                live: true,
                reads: Cell::new(0),
                applied: RefCell::new(Vec::new()),
            }
        }

        fn failing_apply(detail: &str) -> Self {
            Self {
                apply_result: Err(AppError::ConfigurationApplyFailed(detail.to_string())),
                ..Self::new()
            }
        }
    }

    impl ConfigurationStrategy for MockStrategy {
        fn read(&self, _adapter_class: AdapterClass, _adapter_name: &str) -> Result<String, AppError> {
            self.reads.set(self.reads.get() + 1);
            self.dump.clone()
        }

        fn apply(&self, config: &NetworkConfig) -> Result<(), AppError> {
            self.applied.borrow_mut().push(config.clone());
            self.apply_result.clone()
        }

        fn supports_live_read(&self) -> bool {
            self.live
        }
    }

    /// 内存中的设置存储
    #[derive(Default)]
    struct MemoryStore {
        initial: Option<ConfigRecord>,
        saved: Vec<ConfigRecord>,
        fail_save: bool,
    }

    impl SettingsStore for MemoryStore {
        fn load_network_config(&self) -> NetworkConfig {
            self.initial
                .as_ref()
                .and_then(|record| NetworkConfig::from_serializable(record).ok())
                .unwrap_or_default()
        }

        fn save_network_config(&mut self, config: &NetworkConfig) -> Result<(), AppError> {
            if self.fail_save {
                return Err(AppError::ConfigError("磁盘已满".to_string()));
            }
            self.saved.push(config.to_serializable());
            Ok(())
        }
    }

    fn ip(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_initial_config_from_settings() {
        let record = NetworkConfig::for_adapter(AdapterClass::Wifi, "Wi-Fi").to_serializable();
        let store = MemoryStore {
            initial: Some(record),
            ..MemoryStore::default()
        };

        let service = NetworkService::new(MockStrategy::new(), store);

        assert_eq!(service.config().adapter_class(), AdapterClass::Wifi);
        assert!(!service.config().has_changed());
    }

    #[test]
    fn test_refresh_merges_live_fields() {
        let mut service = NetworkService::new(MockStrategy::new(), MemoryStore::default());

        let config = service.get_network_configuration();

        assert_eq!(config.ipv4_address(), &ip("192.168.1.100"));
        assert_eq!(config.subnet_mask(), &ip("255.255.255.0"));
        assert_eq!(config.default_gateway(), &ip("0.0.0.0"), "缺失的网关使用默认值");
        assert!(config.has_changed(), "读取到的配置与基线不同");
    }

    #[test]
    fn test_refresh_selected_wifi_adapter() {
        let mut service = NetworkService::new(MockStrategy::new(), MemoryStore::default());
        service.select_adapter(AdapterClass::Wifi, "Wi-Fi");

        assert_eq!(service.refresh(), Ok(RefreshSource::Live));
        assert_eq!(service.config().ipv4_address(), &ip("10.0.0.42"));
        assert_eq!(service.config().default_gateway(), &ip("10.0.0.1"));
    }

    #[test]
    fn test_refresh_unsupported_platform_is_pass_through() {
        let strategy = MockStrategy {
            live: false,
            ..MockStrategy::new()
        };
        let mut service = NetworkService::new(strategy, MemoryStore::default());
        let before = service.config().clone();

        assert_eq!(service.refresh(), Ok(RefreshSource::Unsupported));
        assert_eq!(service.config(), &before);
        assert_eq!(service.strategy().reads.get(), 0, "不支持的平台不应调用 read");
    }

    #[test]
    fn test_refresh_missing_adapter_falls_back_to_defaults() {
        let mut service = NetworkService::new(MockStrategy::new(), MemoryStore::default());
        service.select_adapter(AdapterClass::Ethernet, "DoesNotExist");
        service
            .config_mut()
            .update_configuration(FieldUpdates::new().with_ipv4_address(ip("1.2.3.4")));

        assert_eq!(service.refresh(), Ok(RefreshSource::AdapterMissing));
        assert_eq!(
            service.config(),
            &NetworkConfig::for_adapter(AdapterClass::Ethernet, "DoesNotExist")
        );
    }

    #[test]
    fn test_refresh_read_failure_keeps_config() {
        let strategy = MockStrategy {
            dump: Err(AppError::ConfigurationReadFailed("ipconfig 不存在".to_string())),
            ..MockStrategy::new()
        };
        let mut service = NetworkService::new(strategy, MemoryStore::default());

        assert!(matches!(service.refresh(), Err(AppError::ConfigurationReadFailed(_))));

        // 包装方法不会返回错误
        let config = service.get_network_configuration();
        assert_eq!(config, &NetworkConfig::default());
    }

    #[test]
    fn test_apply_success_resets_baseline_and_persists() {
        let mut service = NetworkService::new(MockStrategy::new(), MemoryStore::default());
        service.config_mut().ipv4_address_mut().set_octet(3, "37").unwrap();
        assert!(service.config().has_changed());

        let outcome = service.apply_configuration();

        assert!(outcome.is_success(), "应用应该成功: {:?}", outcome);
        assert!(!service.config().has_changed(), "成功后应重置基线");
        assert_eq!(service.settings().saved.len(), 1);
        assert_eq!(service.settings().saved[0].ipv4_address, "0.0.0.37");
        assert_eq!(service.strategy().applied.borrow().len(), 1);
    }

    #[test]
    fn test_apply_failure_keeps_changes() {
        let mut service =
            NetworkService::new(MockStrategy::failing_apply("拒绝访问"), MemoryStore::default());
        service.config_mut().ipv4_address_mut().set_octet(3, "37").unwrap();

        let outcome = service.apply_configuration();

        assert_eq!(outcome.code, 1);
        assert!(outcome.message.contains("拒绝访问"));
        assert!(service.config().has_changed(), "失败后仍应保留未应用的修改");
        assert!(service.settings().saved.is_empty(), "失败时不应保存设置");
    }

    #[test]
    fn test_apply_rejects_invalid_mask_before_strategy() {
        let mut service = NetworkService::new(MockStrategy::new(), MemoryStore::default());
        service
            .config_mut()
            .update_configuration(FieldUpdates::new().with_subnet_mask(ip("255.255.255.10")));

        let outcome = service.apply_configuration();

        assert!(!outcome.is_success());
        assert!(service.strategy().applied.borrow().is_empty(), "掩码无效时不应调用策略");
        assert!(service.config().has_changed());
    }

    #[test]
    fn test_apply_save_failure_still_resets_baseline() {
        let store = MemoryStore {
            fail_save: true,
            ..MemoryStore::default()
        };
        let mut service = NetworkService::new(MockStrategy::new(), store);
        service.config_mut().ipv4_address_mut().set_octet(0, "10").unwrap();

        let outcome = service.apply_configuration();

        assert!(outcome.is_success(), "系统配置已生效，结果应为成功");
        assert!(outcome.message.contains("保存用户设置失败"));
        assert!(!service.config().has_changed());
    }

    #[test]
    fn test_unparsable_field_uses_default() {
        let fields = AdapterFields {
            ipv4_address: Some("999.1.1.1".to_string()),
            subnet_mask: None,
            default_gateway: Some("10.0.0.1".to_string()),
        };

        let updates = NetworkService::<MockStrategy, MemoryStore>::fields_to_updates(&fields);

        assert_eq!(updates.ipv4_address, Some(Ipv4Address::UNSPECIFIED));
        assert_eq!(updates.subnet_mask, Some(Ipv4Address::DEFAULT_SUBNET_MASK));
        assert_eq!(updates.default_gateway, Some(ip("10.0.0.1")));
    }
}
