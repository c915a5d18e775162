use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// actix 워커 시작/종료 로그는 warn 이상만
const DEFAULT_FILTER: &str = "info,actix_server=warn";

/// 구조화된 로깅을 초기화합니다.
/// JSON 형식의 로그를 stdout 으로 출력하며, RUST_LOG 환경 변수로 로그 레벨을 제어합니다.
/// `log` 크레이트 레코드(actix Logger 포함)도 같은 스트림으로 전달됩니다.
pub fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json()
        .with_current_span(false)
        .with_span_list(false);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
    {
        eprintln!("Telemetry already initialised: {}", e);
    }
}
