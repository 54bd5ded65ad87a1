// StephAtility 后端模块
pub mod modules;

use log::{error, info};
use modules::app_core::AppCore;

/// 等待 Ctrl-C
fn wait_for_ctrl_c() {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建 Tokio 运行时: {}", e);
            return;
        }
    };

    runtime.block_on(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("监听 Ctrl-C 失败: {}", e);
        }
    });
}

pub fn run() {
    // 初始化日志系统
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    info!("StephAtility 启动中...");

    let mut app_core = match AppCore::new() {
        Ok(core) => {
            info!("应用核心初始化成功");
            core
        }
        Err(e) => {
            error!("应用核心初始化失败: {}", e);
            return;
        }
    };

    app_core.start();

    let config = app_core.network().config();
    info!("网卡: {} {}", config.adapter_class().label_prefix(), config.adapter_name());
    info!("  IPv4 地址: {}", config.ipv4_address());
    info!("  子网掩码: {}", config.subnet_mask());
    info!("  默认网关: {}", config.default_gateway());

    if let Some(url) = app_core.file_server().url() {
        info!("📂 文件服务运行中: {}，按 Ctrl-C 退出", url);
        wait_for_ctrl_c();
    }

    app_core.shutdown();
    info!("StephAtility 已退出");
}
