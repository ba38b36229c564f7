use serde_json::json;
use swiftdrop_core::CURRENCY_CODE;

use super::{CheckoutProvider, CheckoutRequest, PaymentError, PaymentProvider, billable_kobo};

/// Paystack inline checkout (`PaystackPop.setup`).
#[derive(Debug, Clone)]
pub struct PaystackCheckout {
    public_key: String,
}

impl PaystackCheckout {
    #[must_use]
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
        }
    }
}

impl CheckoutProvider for PaystackCheckout {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paystack
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
            "currency": CURRENCY_CODE,
            "ref": reference,
        });
        if !request.metadata.is_null() {
            config["metadata"] = request.metadata.clone();
        }
        Ok(config)
    }
}
