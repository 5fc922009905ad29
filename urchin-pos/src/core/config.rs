use chrono_tz::Tz;

/// 应用配置 - 打印流水线的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/urchin | 工作目录（队列/账本数据库） |
/// | BACKEND_URL | http://localhost:3000 | 订单后端地址 |
/// | PRINTER_ADDR | 192.168.1.100:9100 | 热敏打印机地址 |
/// | STARTUP_WARMUP_MS | 5000 | 启动触发预热延迟(毫秒) |
/// | PRINT_INTERVAL_MS | 30000 | 前台兜底周期(毫秒) |
/// | INTER_PRINT_DELAY_MS | 500 | 两单之间的出纸间隔(毫秒) |
/// | PRINTER_PROBE_INTERVAL_MS | 10000 | 打印机探测周期(毫秒) |
/// | PAPER_WIDTH | 48 | 纸宽（字符数，80mm=48） |
/// | TIMEZONE | Europe/Madrid | 小票时间戳时区 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/urchin PRINTER_ADDR=10.0.0.20:9100 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储队列/账本数据库
    pub work_dir: String,
    /// 订单后端 URL
    pub backend_url: String,
    /// 打印机地址 (host:port)
    pub printer_addr: String,
    /// 启动触发预热延迟 (毫秒)
    pub startup_warmup_ms: u64,
    /// 前台兜底周期 (毫秒)
    pub print_interval_ms: u64,
    /// 两单之间的出纸间隔 (毫秒)
    pub inter_print_delay_ms: u64,
    /// 打印机连接探测周期 (毫秒)
    pub printer_probe_interval_ms: u64,
    /// 纸宽（字符数）
    pub paper_width: usize,
    /// 小票时间戳时区
    pub timezone: Tz,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/urchin".into()),
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            printer_addr: std::env::var("PRINTER_ADDR")
                .unwrap_or_else(|_| "192.168.1.100:9100".into()),
            startup_warmup_ms: env_u64("STARTUP_WARMUP_MS", 5000),
            print_interval_ms: env_u64("PRINT_INTERVAL_MS", 30000),
            inter_print_delay_ms: env_u64("INTER_PRINT_DELAY_MS", 500),
            printer_probe_interval_ms: env_u64("PRINTER_PROBE_INTERVAL_MS", 10000),
            paper_width: std::env::var("PAPER_WIDTH")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(48),
            timezone: std::env::var("TIMEZONE")
                .ok()
                .and_then(|tz| tz.parse().ok())
                .unwrap_or(chrono_tz::Europe::Madrid),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, printer_addr: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.printer_addr = printer_addr.into();
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
