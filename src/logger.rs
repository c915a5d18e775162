use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::AUTHORIZATION, StatusCode},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{error, info, warn};
use std::rc::Rc;
use std::time::Instant;

/// 커스텀 Logger 미들웨어
/// 요청마다 결과, 메서드, 경로, 상태 코드, 처리 시간을 한 줄로 기록합니다.
/// 4xx 는 warn, 5xx 는 error 레벨로 남깁니다.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        // 쿼리 문자열과 Authorization 값은 기록하지 않습니다 (토큰이 포함될 수 있음)
        let path = req.path().to_string();
        let credential = if req.headers().contains_key(AUTHORIZATION) {
            "bearer"
        } else {
            "none"
        };

        let service = self.service.clone();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start_time.elapsed().as_millis();

            let status = match &result {
                Ok(res) => res.status(),
                // 미들웨어가 거부한 요청 (예: 인증 게이트)
                Err(e) => e.as_response_error().status_code(),
            };
            let line = format!(
                "{} {} {} - Status: {} ({}ms, credential: {})",
                outcome(status),
                method,
                path,
                status.as_u16(),
                elapsed,
                credential
            );
            if status.is_server_error() {
                error!("{}", line);
            } else if status.is_client_error() {
                warn!("{}", line);
            } else {
                info!("{}", line);
            }

            result
        })
    }
}

fn outcome(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 | 403 => "Request denied:",
        400..=499 => "Request rejected:",
        500..=599 => "Request failed:",
        _ => "Request completed:",
    }
}
