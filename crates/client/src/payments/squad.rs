use serde_json::json;
use swiftdrop_core::CURRENCY_CODE;

use super::{CheckoutProvider, CheckoutRequest, PaymentError, PaymentProvider, billable_kobo};

/// Channels offered in the Squad modal.
const PAYMENT_CHANNELS: &[&str] = &["card", "bank", "ussd", "transfer"];

/// Squad inline checkout (`squad.setup`).
#[derive(Debug, Clone)]
pub struct SquadCheckout {
    public_key: String,
}

impl SquadCheckout {
    #[must_use]
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
        }
    }
}

impl CheckoutProvider for SquadCheckout {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Squad
    }

    fn inline_config(
        &self,
        request: &CheckoutRequest,
        reference: &str,
    ) -> Result<serde_json::Value, PaymentError> {
        let amount = billable_kobo(request.amount)?;
        let mut config = json!({
            "key": self.public_key,
            "email": request.email.as_str(),
            "amount": amount,
            "currency_code": CURRENCY_CODE,
            "transaction_ref": reference,
            "payment_channels": PAYMENT_CHANNELS,
        });
        if let Some(name) = &request.customer_name {
            config["customer_name"] = json!(name);
        }
        if !request.metadata.is_null() {
            config["metadata"] = request.metadata.clone();
        }
        Ok(config)
    }
}
