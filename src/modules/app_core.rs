// AppCore 模块 - 应用程序核心
// 持有所有服务实例，负责启动与退出顺序

use std::sync::Arc;

use log::{info, warn};

use super::configuration_strategy::{ConfigurationStrategy, IpconfigStrategy};
use super::error::{log_error, AppError};
use super::file_server::{self, LocalFileServer};
use super::hosts_manager::HostsManager;
use super::network_service::NetworkService;
use super::settings_manager::SettingsManager;
use super::task_manager::TaskManager;

/// 应用程序核心结构体
///
/// 所有服务都由这里显式持有并向下传递，不存在全局单例。
pub struct AppCore<C = IpconfigStrategy> {
    /// 网络服务（同时持有用户设置）
    network_service: NetworkService<C, SettingsManager>,
    /// 后台任务管理器
    tasks: Arc<TaskManager>,
    /// 本地文件服务
    file_server: LocalFileServer,
    /// hosts 本机名称
    hosts: HostsManager,
}

impl AppCore<IpconfigStrategy> {
    /// 初始化应用核心
    ///
    /// # 返回
    ///
    /// * `Ok(AppCore)` - 成功初始化的应用核心实例
    /// * `Err(AppError)` - 无法确定配置目录
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use stephatility_lib::modules::app_core::AppCore;
    ///
    /// let mut app_core = AppCore::new().unwrap();
    /// app_core.start();
    /// app_core.shutdown();
    /// ```
    pub fn new() -> Result<Self, AppError> {
        info!("正在初始化应用核心...");

        let settings = SettingsManager::load()?;
        let app_core = Self::with_parts(IpconfigStrategy::new(), settings, HostsManager::new());

        info!("应用核心初始化完成");
        Ok(app_core)
    }
}

impl<C: ConfigurationStrategy> AppCore<C> {
    /// 使用指定组件组装应用核心
    pub fn with_parts(strategy: C, settings: SettingsManager, hosts: HostsManager) -> Self {
        let network_service = NetworkService::new(strategy, settings);
        let tasks = Arc::new(TaskManager::new());
        let file_server = LocalFileServer::new(Arc::clone(&tasks));

        Self {
            network_service,
            tasks,
            file_server,
            hosts,
        }
    }

    /// 启动：读取网卡配置，按设置自动开启文件服务
    ///
    /// 各步骤失败只记录日志，不影响应用继续运行。
    pub fn start(&mut self) {
        info!("正在启动应用核心...");

        let config = self.network_service.get_network_configuration();
        info!("当前网卡配置: {}", config);

        let file_center = self.settings().settings().file_center.clone();
        if file_center.auto_start {
            match file_center.serve_directory {
                Some(directory) => {
                    if let Err(e) = self.file_server.start_server(&directory, file_center.port) {
                        log_error(&e, "自动启动文件服务");
                    }
                }
                None => warn!("已启用自动启动文件服务，但未设置共享目录"),
            }
        }
    }

    pub fn network(&self) -> &NetworkService<C, SettingsManager> {
        &self.network_service
    }

    pub fn network_mut(&mut self) -> &mut NetworkService<C, SettingsManager> {
        &mut self.network_service
    }

    pub fn settings(&self) -> &SettingsManager {
        self.network_service.settings()
    }

    pub fn tasks(&self) -> Arc<TaskManager> {
        Arc::clone(&self.tasks)
    }

    pub fn file_server(&self) -> &LocalFileServer {
        &self.file_server
    }

    /// 根据界面输入启动文件服务，并记住目录和端口
    ///
    /// # 参数
    /// * `directory` - 共享目录（不存在时自动创建）
    /// * `port` - 端口文本
    ///
    /// # 返回
    /// * `Ok(String)` - 访问地址
    /// * `Err(AppError::ValidationError)` - 目录或端口无效
    pub fn start_file_server(&mut self, directory: &str, port: &str) -> Result<String, AppError> {
        let directory = file_server::validate_directory(directory)?;
        let port = file_server::validate_port(port)?;

        let addr = self.file_server.start_server(&directory, port)?;

        if let Err(e) = self.network_service.settings_mut().update_settings(|settings| {
            settings.file_center.serve_directory = Some(directory);
            settings.file_center.port = port;
        }) {
            log_error(&e, "保存文件服务设置");
        }

        Ok(format!("http://{}", addr))
    }

    pub fn stop_file_server(&self) {
        self.file_server.stop_server();
    }

    /// 设置本机名称（写入 hosts 并替换上一次的名称）
    pub fn set_friendly_name(&mut self, name: &str) -> Result<(), AppError> {
        let previous = self
            .settings()
            .settings()
            .network_center
            .friendly_names
            .last()
            .cloned();

        self.hosts.set_friendly_name(name, previous.as_deref())?;

        self.network_service.settings_mut().update_settings(|settings| {
            let names = &mut settings.network_center.friendly_names;
            if let Some(previous) = &previous {
                names.retain(|existing| existing != previous);
            }
            names.retain(|existing| existing != name);
            names.push(name.to_string());
        })
    }

    /// 关闭应用：先停文件服务，再停所有后台任务
    pub fn shutdown(&mut self) {
        info!("正在关闭应用...");
        self.file_server.stop_server();
        self.tasks.stop_all();
        info!("应用已关闭");
    }
}
