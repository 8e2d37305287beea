//! Cash-on-Delivery Gateway
//!
//! 无跳转、无回调；下单即确认，货到付款。

use std::collections::BTreeMap;

use shared::error::{AppError, AppResult};
use shared::models::{Order, Payment};

use super::gateway::{GatewayRequest, PaymentGateway};

pub struct CodGateway;

impl PaymentGateway for CodGateway {
    fn build_request(&self, _payment: &Payment, _order: &Order) -> AppResult<GatewayRequest> {
        Ok(GatewayRequest::none())
    }

    fn verify_callback(&self, _params: &BTreeMap<String, String>) -> AppResult<()> {
        Err(AppError::invalid_request(
            "Cash-on-delivery payments do not receive gateway callbacks",
        ))
    }

    fn map_response_code(&self, _code: &str) -> &'static str {
        "Not applicable"
    }

    fn expects_callback(&self) -> bool {
        false
    }
}
