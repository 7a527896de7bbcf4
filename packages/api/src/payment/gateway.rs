use async_trait::async_trait;
use serde::Serialize;
use store::options::PortalOptions;
use store::Money;

use super::card::CardBrand;

/// Card details for a single capture. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub brand: CardBrand,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvv: String,
    pub holder: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &super::card::mask(&self.number))
            .field("brand", &self.brand)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("holder", &self.holder)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Charge {
    pub amount: Money,
    pub description: String,
    pub receipt_email: String,
    pub card: CardDetails,
}

/// What the gateway reports back for a captured charge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Capture {
    pub reference: String,
}

/// Captures dues. Implementations read their credentials from the options passed in,
/// so a settings change takes effect on the next charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, charge: &Charge, options: &PortalOptions) -> Result<Capture, String>;
}

/// Rejects every charge. Used when no gateway is configured.
#[derive(Debug, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn charge(&self, _: &Charge, _: &PortalOptions) -> Result<Capture, String> {
        Err("Online payments are not available.".to_string())
    }
}

#[cfg(feature = "server")]
pub use self::stripe::StripeGateway;

#[cfg(feature = "server")]
mod stripe {
    use reqwest::Client;
    use serde::Deserialize;

    use super::*;

    const CHARGES_URL: &str = "https://api.stripe.com/v1/charges";

    #[derive(Debug, Deserialize)]
    struct StripeCharge {
        id: String,
        #[serde(default)]
        paid: bool,
    }

    #[derive(Debug, Deserialize)]
    struct StripeErrorBody {
        error: StripeError,
    }

    #[derive(Debug, Deserialize)]
    struct StripeError {
        message: Option<String>,
    }

    /// Stripe's charges endpoint, authenticated with the secret key from the options.
    #[derive(Debug, Default)]
    pub struct StripeGateway {
        client: Client,
    }

    impl StripeGateway {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PaymentGateway for StripeGateway {
        async fn charge(&self, charge: &Charge, options: &PortalOptions) -> Result<Capture, String> {
            if !options.stripe.enabled.is_yes() || options.stripe.api_key.is_empty() {
                return Err("Online payments are not available.".to_string());
            }
            let form = [
                ("amount", charge.amount.cents().to_string()),
                ("currency", "usd".to_string()),
                ("description", charge.description.clone()),
                ("receipt_email", charge.receipt_email.clone()),
                ("source[object]", "card".to_string()),
                ("source[number]", charge.card.number.clone()),
                ("source[exp_month]", charge.card.exp_month.to_string()),
                ("source[exp_year]", charge.card.exp_year.to_string()),
                ("source[cvc]", charge.card.cvv.clone()),
                ("source[name]", charge.card.holder.clone()),
            ];

            tracing::info!(amount = %charge.amount, brand = %charge.card.brand, "stripe charge");
            let response = self
                .client
                .post(CHARGES_URL)
                .basic_auth(&options.stripe.api_key, None::<&str>)
                .form(&form)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            if !response.status().is_success() {
                let status = response.status();
                let message = response
                    .json::<StripeErrorBody>()
                    .await
                    .ok()
                    .and_then(|body| body.error.message)
                    .unwrap_or_else(|| format!("Payment declined ({})", status));
                return Err(message);
            }

            let body: StripeCharge = response.json().await.map_err(|e| e.to_string())?;
            if !body.paid {
                return Err("Payment was not captured.".to_string());
            }
            Ok(Capture { reference: body.id })
        }
    }
}
