/**
 * 本地 HTTP 文件服务模块
 * 在后台任务中把一个目录以静态文件形式共享到 127.0.0.1
 */

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::modules::error::AppError;
use crate::modules::task_manager::{CancellationToken, TaskHandle, TaskManager};

/// 检查取消信号的间隔
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 收到取消信号后等待现有连接结束的最长时间，超时后强制关闭
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// 校验共享目录
///
/// 空路径无效；目录不存在时自动创建。
///
/// # 返回
/// * `Ok(PathBuf)` - 可以共享的目录
/// * `Err(AppError::ValidationError)` - 路径为空、不是目录或无法创建
pub fn validate_directory(directory: impl AsRef<Path>) -> Result<PathBuf, AppError> {
    let directory = directory.as_ref();

    if directory.as_os_str().is_empty() {
        return Err(AppError::ValidationError("共享目录不能为空".to_string()));
    }

    if !directory.exists() {
        std::fs::create_dir_all(directory).map_err(|e| {
            AppError::ValidationError(format!("创建共享目录 {:?} 失败: {}", directory, e))
        })?;
        log::info!("📁 已创建共享目录: {:?}", directory);
    }

    if !directory.is_dir() {
        return Err(AppError::ValidationError(format!("{:?} 不是目录", directory)));
    }

    Ok(directory.to_path_buf())
}

/// 校验端口输入（1-65535 的纯数字）
pub fn validate_port(port: &str) -> Result<u16, AppError> {
    let port = port.trim();

    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::ValidationError(format!("端口必须是数字: '{}'", port)));
    }

    match port.parse::<u16>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::ValidationError(format!("端口超出范围 (1-65535): {}", port))),
    }
}

/// 正在运行的服务实例
struct RunningServer {
    task: TaskHandle,
    addr: SocketAddr,
    directory: PathBuf,
}

/// 本地文件服务
pub struct LocalFileServer {
    tasks: Arc<TaskManager>,
    running: Mutex<Option<RunningServer>>,
}

impl LocalFileServer {
    pub fn new(tasks: Arc<TaskManager>) -> Self {
        Self {
            tasks,
            running: Mutex::new(None),
        }
    }

    /// 启动文件服务
    ///
    /// 已有实例在运行时先将其停止。端口在启动工作线程之前绑定，
    /// 因此端口占用会直接返回给调用方。端口为 0 时由系统分配。
    ///
    /// # 参数
    /// * `directory` - 共享目录
    /// * `port` - 监听端口
    ///
    /// # 返回
    /// * `Ok(SocketAddr)` - 实际监听地址
    /// * `Err(AppError)` - 目录无效、端口绑定失败或无法创建线程
    pub fn start_server(&self, directory: impl AsRef<Path>, port: u16) -> Result<SocketAddr, AppError> {
        let directory = validate_directory(directory)?;

        self.stop_server();

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .map_err(|e| AppError::ProcessError(format!("绑定端口 {} 失败: {}", port, e)))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let app = Self::build_router(&directory);
        let task = self
            .tasks
            .start("file-server", move |token| serve_until_cancelled(listener, app, token))?;

        log::info!("🚀 本地文件服务已启动: http://{} -> {:?}", addr, directory);

        *self.running.lock() = Some(RunningServer {
            task,
            addr,
            directory,
        });

        Ok(addr)
    }

    /// 停止文件服务（未运行时为空操作）
    pub fn stop_server(&self) {
        let running = self.running.lock().take();

        if let Some(server) = running {
            self.tasks.stop(&server.task);
            log::info!("🛑 本地文件服务已停止: http://{}", server.addr);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|server| self.tasks.is_registered(&server.task))
    }

    /// 访问地址，例如 `http://127.0.0.1:8000`
    pub fn url(&self) -> Option<String> {
        self.running
            .lock()
            .as_ref()
            .map(|server| format!("http://{}", server.addr))
    }

    /// 当前共享目录
    pub fn directory(&self) -> Option<PathBuf> {
        self.running.lock().as_ref().map(|server| server.directory.clone())
    }

    fn build_router(directory: &Path) -> Router {
        Router::new()
            .fallback_service(ServeDir::new(directory))
            .layer(CorsLayer::permissive())
    }
}

impl Drop for LocalFileServer {
    fn drop(&mut self) {
        self.stop_server();
    }
}

/// 工作线程：在独立的单线程运行时中提供服务，直到收到取消信号
///
/// 取消后最多等待 `SHUTDOWN_GRACE`，未完成的连接随运行时一起被丢弃。
fn serve_until_cancelled(listener: TcpListener, app: Router, token: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("❌ 创建文件服务运行时失败: {}", e);
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("❌ 文件服务监听器初始化失败: {}", e);
                return;
            }
        };

        let serve = axum::serve(listener, app).with_graceful_shutdown(wait_cancelled(token.clone()));

        let deadline = async move {
            wait_cancelled(token).await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            result = serve => {
                if let Err(e) = result {
                    log::error!("❌ HTTP服务器错误: {}", e);
                }
            }
            _ = deadline => {
                log::warn!("⚠️ 仍有连接未结束，强制关闭文件服务");
            }
        }
    });

    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

async fn wait_cancelled(token: CancellationToken) {
    while !token.is_cancelled() {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
}
