//! Hosted Gateway
//!
//! 银行转账式托管收银台：构建签名跳转 URL，校验回调签名。
//!
//! 签名协议：去掉 `signature` 字段和空值字段，剩余键按字典序排序，
//! 按 `key=value` 用 `&` 连接，对该串做 HMAC-SHA512 (hex 小写)。
//! 验签用常量时间比较，不匹配硬失败。

use std::collections::BTreeMap;

use ring::hmac;
use shared::error::{AppError, AppResult};
use shared::models::{Order, Payment};

use crate::core::GatewayConfig;
use crate::orders::money;

use super::gateway::{GatewayRequest, PaymentGateway};

/// 回调中携带签名的字段名
pub const SIGNATURE_FIELD: &str = "signature";
/// 回调中的支付单引用字段名
pub const REFERENCE_FIELD: &str = "reference";
/// 回调中的响应码字段名
pub const RESPONSE_CODE_FIELD: &str = "response_code";

const COMMAND: &str = "pay";
const VERSION: &str = "2.1.0";

pub struct HostedGateway {
    config: GatewayConfig,
}

impl HostedGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn credentials(&self) -> AppResult<(&str, &str)> {
        if self.config.merchant_code.trim().is_empty() || self.config.secret.trim().is_empty() {
            return Err(AppError::configuration("Gateway merchant credentials missing"));
        }
        Ok((&self.config.merchant_code, &self.config.secret))
    }

    /// 规范串：排除签名字段与空值，字典序 key=value&...
    fn canonicalize(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .filter(|(k, v)| k.as_str() != SIGNATURE_FIELD && !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(secret: &str, canonical: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA512, secret.as_bytes());
        let tag = hmac::sign(&key, canonical.as_bytes());
        hex::encode(tag.as_ref())
    }
}

impl PaymentGateway for HostedGateway {
    fn build_request(&self, payment: &Payment, order: &Order) -> AppResult<GatewayRequest> {
        let (merchant_code, secret) = self.credentials()?;

        let mut params = BTreeMap::new();
        params.insert("amount".into(), money::to_minor_units(payment.amount).to_string());
        params.insert("command".into(), COMMAND.into());
        params.insert("currency".into(), self.config.currency.clone());
        params.insert("locale".into(), self.config.locale.clone());
        params.insert("merchant_code".into(), merchant_code.to_string());
        params.insert("order_info".into(), format!("Payment for order {}", order.order_id));
        params.insert("reference".into(), payment.payment_id.clone());
        params.insert("return_url".into(), self.config.return_url.clone());
        params.insert("version".into(), VERSION.into());

        let canonical = Self::canonicalize(&params);
        let signature = Self::sign(secret, &canonical);

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let redirect_url = format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, SIGNATURE_FIELD, signature
        );

        params.insert(SIGNATURE_FIELD.into(), signature);
        Ok(GatewayRequest {
            redirect_url: Some(redirect_url),
            params,
        })
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> AppResult<()> {
        let (_, secret) = self.credentials()?;

        let supplied = params
            .get(SIGNATURE_FIELD)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::signature_mismatch())?;
        let supplied_bytes =
            hex::decode(supplied).map_err(|_| AppError::signature_mismatch())?;

        let canonical = Self::canonicalize(params);
        let key = hmac::Key::new(hmac::HMAC_SHA512, secret.as_bytes());
        // ring::hmac::verify is constant-time
        hmac::verify(&key, canonical.as_bytes(), &supplied_bytes)
            .map_err(|_| AppError::signature_mismatch())
    }

    fn map_response_code(&self, code: &str) -> &'static str {
        match code {
            "00" => "Transaction successful",
            "07" => "Deducted, suspected fraud",
            "09" => "Card not registered for online banking",
            "10" => "Authentication failed more than 3 times",
            "11" => "Payment session expired",
            "12" => "Account locked",
            "13" => "Wrong one-time password",
            "24" => "Cancelled by customer",
            "51" => "Insufficient funds",
            "65" => "Daily transaction limit exceeded",
            "75" => "Bank under maintenance",
            "79" => "Wrong payment password too many times",
            _ => "Transaction failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;
    use shared::models::{
        OrderPaymentState, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, StockState,
    };

    fn config() -> GatewayConfig {
        GatewayConfig {
            merchant_code: "TEST01".into(),
            secret: "topsecret".into(),
            pay_url: "https://pay.example/checkout".into(),
            return_url: "http://localhost:3000/return".into(),
            currency: "VND".into(),
            locale: "vn".into(),
        }
    }

    fn payment() -> Payment {
        Payment {
            payment_id: "pay123".into(),
            order_id: "ord123".into(),
            amount: 380.0,
            method: PaymentMethod::Online,
            status: PaymentStatus::Pending,
            gateway_txn_id: None,
            bank_code: None,
            pay_date: None,
            response_code: None,
            callback_verified: false,
            refunds: vec![],
            created_at: 0,
            updated_at: 0,
        }
    }

    fn order() -> Order {
        Order {
            order_id: "ord123".into(),
            user_id: "u1".into(),
            items: vec![],
            subtotal: 350.0,
            discount: 0.0,
            shipping_fee: 30.0,
            total: 380.0,
            coupon_code: None,
            shipping_address: ShippingAddress {
                recipient: "A".into(),
                phone: "1".into(),
                line1: "street".into(),
                line2: None,
                city: "city".into(),
                postal_code: "70000".into(),
                country: "VN".into(),
            },
            payment_method: PaymentMethod::Online,
            payment_state: OrderPaymentState::Pending,
            status: OrderStatus::Pending,
            stock_state: StockState::Reserved,
            status_history: vec![],
            note: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn signed_callback(gateway: &HostedGateway, response_code: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("amount".to_string(), "38000".to_string());
        params.insert("bank_code".to_string(), "NCB".to_string());
        params.insert("pay_date".to_string(), "20260830120000".to_string());
        params.insert("reference".to_string(), "pay123".to_string());
        params.insert("response_code".to_string(), response_code.to_string());
        params.insert("txn_id".to_string(), "14422574".to_string());
        let canonical = HostedGateway::canonicalize(&params);
        let signature = HostedGateway::sign(&gateway.config.secret, &canonical);
        params.insert(SIGNATURE_FIELD.to_string(), signature);
        params
    }

    #[test]
    fn test_build_request_signs_and_includes_canonical_fields() {
        let gateway = HostedGateway::new(config());
        let request = gateway.build_request(&payment(), &order()).unwrap();

        assert_eq!(request.params.get("amount").unwrap(), "38000");
        assert_eq!(request.params.get("reference").unwrap(), "pay123");
        assert_eq!(request.params.get("command").unwrap(), "pay");
        assert_eq!(request.params.get("version").unwrap(), "2.1.0");
        let url = request.redirect_url.unwrap();
        assert!(url.starts_with("https://pay.example/checkout?"));
        assert!(url.contains("signature="));
    }

    #[test]
    fn test_build_request_without_credentials_fails() {
        let mut cfg = config();
        cfg.secret = "".into();
        let gateway = HostedGateway::new(cfg);
        let err = gateway.build_request(&payment(), &order()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_verify_roundtrip() {
        let gateway = HostedGateway::new(config());
        let params = signed_callback(&gateway, "00");
        assert!(gateway.verify_callback(&params).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_params() {
        let gateway = HostedGateway::new(config());
        let mut params = signed_callback(&gateway, "00");
        params.insert("amount".to_string(), "1".to_string());
        let err = gateway.verify_callback(&params).unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureMismatch);
    }

    #[test]
    fn test_verify_rejects_missing_or_garbage_signature() {
        let gateway = HostedGateway::new(config());
        let mut params = signed_callback(&gateway, "00");
        params.remove(SIGNATURE_FIELD);
        assert!(gateway.verify_callback(&params).is_err());

        params.insert(SIGNATURE_FIELD.to_string(), "not-hex!".to_string());
        assert!(gateway.verify_callback(&params).is_err());
    }

    #[test]
    fn test_response_code_mapping() {
        let gateway = HostedGateway::new(config());
        assert_eq!(gateway.map_response_code("00"), "Transaction successful");
        assert_eq!(gateway.map_response_code("24"), "Cancelled by customer");
        assert_eq!(gateway.map_response_code("51"), "Insufficient funds");
        assert_eq!(gateway.map_response_code("XX"), "Transaction failed");
    }
}
