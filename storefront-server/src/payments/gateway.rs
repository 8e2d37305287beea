//! Payment Gateway Capability Interface

use std::collections::BTreeMap;

use shared::error::AppResult;
use shared::models::{Order, Payment, PaymentMethod};

use crate::core::GatewayConfig;

use super::{CodGateway, HostedGateway};

/// 出站支付请求：托管网关给出跳转地址，COD 为空
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// 完整跳转 URL (含签名)，无跳转的方式为 None
    pub redirect_url: Option<String>,
    /// 签名后的规范字段集
    pub params: BTreeMap<String, String>,
}

impl GatewayRequest {
    pub fn none() -> Self {
        Self {
            redirect_url: None,
            params: BTreeMap::new(),
        }
    }
}

/// 回调应答码 (始终应答，防止网关无限重试)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAck {
    /// 00 - 已接受并处理
    Ok,
    /// 01 - 支付单不存在
    NotFound,
    /// 02 - 已处理过 (幂等重放)
    AlreadyProcessed,
    /// 97 - 验签失败
    BadSignature,
    /// 99 - 内部错误
    Internal,
}

impl CallbackAck {
    pub const fn code(&self) -> &'static str {
        match self {
            CallbackAck::Ok => "00",
            CallbackAck::NotFound => "01",
            CallbackAck::AlreadyProcessed => "02",
            CallbackAck::BadSignature => "97",
            CallbackAck::Internal => "99",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            CallbackAck::Ok => "Confirm Success",
            CallbackAck::NotFound => "Payment not found",
            CallbackAck::AlreadyProcessed => "Already confirmed",
            CallbackAck::BadSignature => "Invalid signature",
            CallbackAck::Internal => "Unknown error",
        }
    }
}

/// 网关能力接口
pub trait PaymentGateway: Send + Sync {
    /// 构建出站请求并签名；缺少商户凭证返回 `ConfigurationError`
    fn build_request(&self, payment: &Payment, order: &Order) -> AppResult<GatewayRequest>;

    /// 验签：不通过必须硬失败，调用方不得做任何状态变更
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> AppResult<()>;

    /// 响应码 → 人类可读原因
    fn map_response_code(&self, code: &str) -> &'static str;

    /// 该方式是否会收到异步回调
    fn expects_callback(&self) -> bool {
        true
    }
}

/// 按支付方式解析网关实现
pub struct GatewayRegistry {
    hosted: HostedGateway,
    cod: CodGateway,
}

impl GatewayRegistry {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            hosted: HostedGateway::new(config),
            cod: CodGateway,
        }
    }

    pub fn resolve(&self, method: PaymentMethod) -> &dyn PaymentGateway {
        match method {
            PaymentMethod::Online => &self.hosted,
            PaymentMethod::Cod => &self.cod,
        }
    }
}
