use std::sync::{Arc, LazyLock};

use bon::bon;
use reqwest::{Method, Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};
use url::Url;

use crate::core::config::{BlockingMode, TransportConfig};
use crate::core::error::{MetaRouterError, Result};
use crate::core::event::EventSender;
use crate::interception::middleware::{
    BlockingMiddleware, FABRICATION_DELAY, SkipInterception, report_block,
};
use crate::interception::policy::{InterceptionPolicy, Verdict};
use crate::network::loader::{ProtocolHandler, UrlLoader};
use crate::network::task::{DataTask, TaskResponse};

static SHARED: LazyLock<HttpTransport> = LazyLock::new(|| {
    HttpTransport::builder()
        .policy(InterceptionPolicy::shared())
        .dedicated_runtime(true)
        .build()
        .expect("CRITICAL: Failed to initialize shared transport")
});

/// 传输层自建的后台运行时，随最后一个句柄释放
#[derive(Debug)]
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// 回调入口使用的任务派发器
///
/// 构造时确定目标运行时，之后可从任意线程派发，不依赖调用线程的运行时上下文。
#[derive(Debug, Clone)]
struct TaskSpawner {
    handle: Handle,
    _owned: Option<Arc<OwnedRuntime>>,
}

impl TaskSpawner {
    fn resolve(handle: Option<Handle>, dedicated: bool) -> Result<Self> {
        let handle = match handle {
            Some(handle) => Some(handle),
            None if dedicated => None,
            None => Handle::try_current().ok(),
        };
        if let Some(handle) = handle {
            return Ok(Self {
                handle,
                _owned: None,
            });
        }

        debug!("未检测到 Tokio 运行时，创建传输层专用运行时");
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("metarouter-transport")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

/// 共享 HTTP 传输层
///
/// 装饰器链在构造时固定：拦截中间件 → URL 加载子系统 → 额外中间件 → reqwest。
/// 拦截中间件在 `install` 之前透明放行，因此重复安装不会产生多层包装。
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    policy: Arc<InterceptionPolicy>,
    loader: Arc<UrlLoader>,
    events: Option<EventSender>,
    spawner: TaskSpawner,
}

#[bon]
impl HttpTransport {
    #[builder]
    pub fn new(
        policy: Option<Arc<InterceptionPolicy>>,
        #[builder(default)] config: TransportConfig,
        events: Option<EventSender>,
        #[builder(default)] middleware: Vec<Arc<dyn Middleware>>,
        // 回调任务的目标运行时；缺省取构造时所在的运行时
        runtime: Option<Handle>,
        // 为 true 时忽略当前运行时，始终使用自建的后台运行时
        #[builder(default)]
        dedicated_runtime: bool,
    ) -> Result<Self> {
        let policy = policy.unwrap_or_else(|| Arc::new(InterceptionPolicy::new()));
        let spawner = TaskSpawner::resolve(runtime, dedicated_runtime)?;
        let loader = Arc::new(UrlLoader::new(events.clone()));

        let mut client_builder = reqwest::Client::builder()
            .tcp_nodelay(true)
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout());
        if let Some(ua) = &config.user_agent {
            client_builder = client_builder.user_agent(ua.clone());
        }
        let client = client_builder.build()?;

        let mut chain = ClientBuilder::new(client)
            .with(BlockingMiddleware::new(policy.clone(), events.clone()))
            .with_arc(loader.clone());
        for layer in middleware {
            chain = chain.with_arc(layer);
        }

        Ok(Self {
            client: chain.build(),
            policy,
            loader,
            events,
            spawner,
        })
    }
}

impl HttpTransport {
    /// 进程级共享传输层，绑定 `InterceptionPolicy::shared()`
    pub fn shared() -> &'static HttpTransport {
        &SHARED
    }

    pub fn policy(&self) -> &Arc<InterceptionPolicy> {
        &self.policy
    }

    pub fn loader(&self) -> &Arc<UrlLoader> {
        &self.loader
    }

    /// 获取带完整装饰器链的客户端副本
    pub fn client(&self) -> ClientWithMiddleware {
        self.client.clone()
    }

    /// 激活拦截；重复调用为空操作
    pub fn install(&self) {
        if !self.policy.mark_installed() {
            debug!("拦截已安装，忽略重复安装");
            return;
        }
        info!("请求拦截已安装");
        if let Some(events) = &self.events {
            events.installed();
        }
    }

    pub fn enable_blocking(&self) {
        self.policy.enable_blocking();
    }

    pub fn disable_blocking(&self) {
        self.policy.disable_blocking();
    }

    /// 仅拦截下一个匹配请求；尚未安装时先自动安装
    pub fn block_next_request(&self) {
        if !self.policy.is_installed() {
            self.install();
        }
        self.policy.block_next_request();
    }

    pub fn add_blocked_domain(&self, domain: impl Into<String>) {
        self.policy.add_blocked_domain(domain);
    }

    pub fn remove_blocked_domain(&self, domain: &str) {
        self.policy.remove_blocked_domain(domain);
    }

    pub fn set_blocked_domains<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.set_blocked_domains(domains);
    }

    pub fn apply_mode(&self, mode: BlockingMode) {
        match mode {
            BlockingMode::Off => self.disable_blocking(),
            BlockingMode::Always => self.enable_blocking(),
            BlockingMode::Next => self.block_next_request(),
        }
    }

    /// 向 URL 加载子系统注册协议处理器
    pub fn register_protocol(&self, handler: Arc<dyn ProtocolHandler>) -> bool {
        self.loader.register(handler)
    }

    /// 异步入口：经完整装饰器链执行请求
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.client
            .execute(request)
            .await
            .map_err(MetaRouterError::from_middleware)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.execute(Request::new(Method::GET, Url::parse(url)?)).await
    }

    /// 回调入口：结构化请求
    ///
    /// 命中拦截时返回已取消的诱饵任务，并在 `FABRICATION_DELAY` 后以取消错误回调；
    /// 否则在后台任务中执行真实请求。可从任意线程调用。
    pub fn data_task<F>(&self, request: Request, completion: F) -> DataTask
    where
        F: FnOnce(Result<TaskResponse>) + Send + 'static,
    {
        let url = request.url().to_string();

        if let Verdict::Block { one_shot } = self.policy.evaluate(request.url().host_str()) {
            report_block(&url, one_shot, self.events.as_ref());

            let decoy = DataTask::decoy();
            self.spawner.spawn(async move {
                tokio::time::sleep(FABRICATION_DELAY).await;
                completion(Err(MetaRouterError::cancelled(url)));
            });
            return decoy;
        }

        let task = DataTask::new(url.clone());
        let token = task.token();
        let client = self.client.clone();

        self.spawner.spawn(async move {
            let mut extensions = http::Extensions::new();
            extensions.insert(SkipInterception);

            let outcome = tokio::select! {
                _ = token.cancelled() => Err(MetaRouterError::cancelled(url)),
                result = run_task(&client, request, &mut extensions) => result,
            };
            completion(outcome);
        });

        task
    }

    /// 回调入口：裸 URL，按 GET 请求处理
    pub fn data_task_with_url<F>(&self, url: Url, completion: F) -> DataTask
    where
        F: FnOnce(Result<TaskResponse>) + Send + 'static,
    {
        self.data_task(Request::new(Method::GET, url), completion)
    }
}

async fn run_task(
    client: &ClientWithMiddleware,
    request: Request,
    extensions: &mut http::Extensions,
) -> Result<TaskResponse> {
    let resp = client
        .execute_with_extensions(request, extensions)
        .await
        .map_err(MetaRouterError::from_middleware)?;
    TaskResponse::read(resp).await
}
