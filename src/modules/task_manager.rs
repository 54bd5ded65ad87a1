// 后台任务管理模块
// 每个任务对应一个独立线程和一个取消信号，停止时保证线程已经退出

use crate::modules::error::AppError;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 任务标识，进程内永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务生命周期：Created → Running → StopRequested → Joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    StopRequested,
    Joined,
}

/// 协作式取消信号
///
/// 只是一个通知标志，工作函数必须自行定期检查并尽快退出。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消信号，唤醒所有等待者
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// 最多等待 `timeout`，返回是否已被取消
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = flag.lock();

        while !*cancelled {
            if condvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }

        *cancelled
    }
}

/// 交给调用方的任务句柄
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    name: String,
    state: Arc<Mutex<TaskState>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }
}

/// 注册表中的任务记录
struct TaskEntry {
    name: String,
    token: CancellationToken,
    thread: JoinHandle<()>,
    state: Arc<Mutex<TaskState>>,
}

/// 后台任务管理器
///
/// 注册表由一把锁保护；等待线程退出 (join) 在锁外进行，
/// 因此查询永远不会看到“停止到一半”的任务。
/// 同一个句柄不应被多个调用方并发 stop。
#[derive(Default)]
pub struct TaskManager {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动后台任务
    ///
    /// # 参数
    /// * `name` - 任务名称（用于日志和线程名）
    /// * `work` - 工作函数，接收取消信号；应至少每秒检查一次
    ///
    /// # 返回
    /// * `Ok(TaskHandle)` - 任务已启动并注册
    /// * `Err(AppError::ProcessError)` - 系统无法创建线程
    pub fn start<F>(&self, name: &str, work: F) -> Result<TaskHandle, AppError>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let id = TaskId::new();
        let token = CancellationToken::new();
        let state = Arc::new(Mutex::new(TaskState::Created));
        let worker_token = token.clone();

        let mut tasks = self.tasks.lock();

        let thread = thread::Builder::new()
            .name(format!("task-{}", name))
            .spawn(move || work(worker_token))
            .map_err(|e| AppError::ProcessError(format!("启动后台任务 {} 失败: {}", name, e)))?;

        *state.lock() = TaskState::Running;
        tasks.insert(
            id,
            TaskEntry {
                name: name.to_string(),
                token,
                thread,
                state: Arc::clone(&state),
            },
        );
        drop(tasks);

        log::info!("🚀 后台任务已启动: {} ({})", name, id);

        Ok(TaskHandle {
            id,
            name: name.to_string(),
            state,
        })
    }

    /// 停止任务并等待线程退出
    ///
    /// 对未注册（或已停止）的句柄调用是空操作。
    pub fn stop(&self, handle: &TaskHandle) {
        let entry = {
            let mut tasks = self.tasks.lock();
            let entry = tasks.remove(&handle.id);
            if let Some(entry) = &entry {
                Self::request_stop(entry);
            }
            entry
        };

        match entry {
            Some(entry) => Self::join_entry(handle.id, entry),
            None => log::debug!("任务 {} 未注册，忽略停止请求", handle.id),
        }
    }

    /// 停止全部任务并清空注册表（应用退出时调用）
    pub fn stop_all(&self) {
        let entries: Vec<(TaskId, TaskEntry)> = {
            let mut tasks = self.tasks.lock();
            let entries: Vec<_> = tasks.drain().collect();
            for (_, entry) in &entries {
                Self::request_stop(entry);
            }
            entries
        };

        if entries.is_empty() {
            return;
        }

        log::info!("🛑 正在停止 {} 个后台任务...", entries.len());
        for (id, entry) in entries {
            Self::join_entry(id, entry);
        }
        log::info!("✅ 所有后台任务已停止");
    }

    /// 句柄对应的任务是否仍在注册表中
    pub fn is_registered(&self, handle: &TaskHandle) -> bool {
        self.tasks.lock().contains_key(&handle.id)
    }

    /// 当前注册的任务数量
    pub fn active_count(&self) -> usize {
        self.tasks.lock().len()
    }

    fn request_stop(entry: &TaskEntry) {
        entry.token.cancel();
        *entry.state.lock() = TaskState::StopRequested;
    }

    fn join_entry(id: TaskId, entry: TaskEntry) {
        if entry.thread.thread().id() == thread::current().id() {
            log::error!("任务 {} ({}) 不能在自身线程中等待结束，已仅发送取消信号", entry.name, id);
            return;
        }

        // 工作函数应自行处理内部错误；这里只记录逃逸的 panic
        if entry.thread.join().is_err() {
            log::error!("❌ 后台任务 {} ({}) 异常退出", entry.name, id);
        }

        *entry.state.lock() = TaskState::Joined;
        log::info!("后台任务已结束: {} ({})", entry.name, id);
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if !self.tasks.get_mut().is_empty() {
            log::info!("TaskManager 正在销毁，停止剩余后台任务...");
            self.stop_all();
        }
    }
}
