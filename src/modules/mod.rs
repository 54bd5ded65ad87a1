// StephAtility 后端模块
// 本文件作为后端模块的入口点，用于组织和导出各个子模块

// 错误处理模块
pub mod error;

// IPv4 地址值类型
pub mod ipv4_address;

// 网络配置模型（含基线/修改跟踪）
pub mod network_config;

// ipconfig 文本解析
pub mod config_text;

// 平台配置策略
pub mod configuration_strategy;

// 网络服务模块
pub mod network_service;

// 后台任务管理模块
pub mod task_manager;

// 用户设置模块
pub mod settings_manager;

// 本地文件服务模块
pub mod file_server;

// Hosts文件管理模块（本机名称）
pub mod hosts_manager;

// 应用核心模块
pub mod app_core;
