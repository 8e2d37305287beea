//! 支付模块
//!
//! 网关按能力接口建模：`PaymentGateway { build_request, verify_callback,
//! map_response_code }`，按支付方式从注册表解析。新增网关不触碰
//! 订单状态机。

mod cod;
mod gateway;
mod hosted;
mod service;

pub use cod::CodGateway;
pub use gateway::{CallbackAck, GatewayRegistry, GatewayRequest, PaymentGateway};
pub use hosted::HostedGateway;
pub use service::{PaymentService, RefundRequest};
