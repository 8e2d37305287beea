/// 托管支付网关配置
///
/// 跳转 URL 构建与回调验签共用同一份商户号/密钥。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 商户号 (网关侧分配)
    pub merchant_code: String,
    /// HMAC-SHA512 验签密钥
    pub secret: String,
    /// 网关托管收银台地址
    pub pay_url: String,
    /// 支付完成后的浏览器回跳地址
    pub return_url: String,
    /// ISO 货币代码
    pub currency: String,
    /// 语言代码 (跳转页面)
    pub locale: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            merchant_code: std::env::var("GATEWAY_MERCHANT_CODE")
                .unwrap_or_else(|_| "SANDBOX001".into()),
            secret: std::env::var("GATEWAY_SECRET")
                .unwrap_or_else(|_| "sandbox-secret-key".into()),
            pay_url: std::env::var("GATEWAY_PAY_URL")
                .unwrap_or_else(|_| "https://sandbox.gateway.example/paymentv2/vpcpay.html".into()),
            return_url: std::env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/return".into()),
            currency: std::env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "VND".into()),
            locale: std::env::var("GATEWAY_LOCALE").unwrap_or_else(|_| "vn".into()),
        }
    }
}

/// 服务器配置 - 订单核心的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/storefront | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
/// | NOTIFY_TIMEOUT_MS | 2000 | 通知投递超时(毫秒) |
/// | NOTIFY_DEDUP_WINDOW_MS | 60000 | 通知去重窗口(毫秒) |
/// | GATEWAY_MERCHANT_CODE | SANDBOX001 | 网关商户号 |
/// | GATEWAY_SECRET | sandbox-secret-key | 网关验签密钥 |
/// | GATEWAY_PAY_URL | (sandbox) | 网关收银台地址 |
/// | GATEWAY_RETURN_URL | (localhost) | 浏览器回跳地址 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/storefront HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
    /// 通知投递超时 (毫秒)
    pub notify_timeout_ms: u64,
    /// 通知去重窗口 (毫秒)
    pub notify_dedup_window_ms: i64,
    /// 托管支付网关配置
    pub gateway: GatewayConfig,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/storefront".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
            notify_timeout_ms: std::env::var("NOTIFY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(2000),
            notify_dedup_window_ms: std::env::var("NOTIFY_DEDUP_WINDOW_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60_000),
            gateway: GatewayConfig::from_env(),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 数据库文件路径
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir)
            .join("database")
            .join("storefront.db")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
