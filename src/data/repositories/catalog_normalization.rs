use crate::{
    config::EntitlementConfig,
    constants::DEFAULT_CURRENCY,
    data::models::billing_gateway::subscription_product_model::{
        PricingPhaseModel, RecurrenceMode, SubscriptionOfferModel, SubscriptionProductModel,
    },
    domain::entities::{
        entitlement::SubscriptionType,
        plan::{Plan, TrialInfo},
    },
};

/// Turns gateway products into plans: monthly before everything else (stable),
/// yearly plans annotated with their savings over the monthly plan.
pub(crate) fn normalize_catalog(
    products: &[SubscriptionProductModel],
    config: &EntitlementConfig,
) -> Vec<Plan> {
    let mut plans: Vec<Plan> = products
        .iter()
        .map(|p| Plan::from_subscription_product(p, config))
        .collect();
    plans.sort_by_key(|p| match p.tier {
        SubscriptionType::Monthly => 0,
        SubscriptionType::Yearly | SubscriptionType::Unknown => 1,
    });
    annotate_savings(&mut plans);
    plans
}

/// Tier for display purposes. Falls back to the product naming convention
/// for products missing from the configured families.
pub(crate) fn display_tier(config: &EntitlementConfig, product_id: &str) -> SubscriptionType {
    match config.classify(product_id) {
        SubscriptionType::Unknown if product_id.contains("monthly") => SubscriptionType::Monthly,
        SubscriptionType::Unknown if product_id.contains("yearly") => SubscriptionType::Yearly,
        tier => tier,
    }
}

impl Plan {
    pub(crate) fn from_subscription_product(
        product: &SubscriptionProductModel,
        config: &EntitlementConfig,
    ) -> Self {
        let tier = display_tier(config, &product.id);
        let offer = preferred_display_offer(&product.subscription_offer_details);
        let phases = offer
            .map(|o| o.pricing_phases.pricing_phase_list.as_slice())
            .unwrap_or_default();

        let trial = phases.iter().find(|p| p.is_free()).map(|p| TrialInfo {
            offer_id: offer.and_then(|o| o.offer_id.clone()),
            period: p.billing_period.clone(),
            formatted_price: p.formatted_price.clone(),
            price: 0.0,
        });

        let (price, currency, formatted_price, billing_period) = match recurring_phase(phases) {
            Some(phase) => {
                let price = phase.price();
                let currency = phase
                    .price_currency_code
                    .clone()
                    .or_else(|| product.currency.clone())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
                let formatted = phase
                    .formatted_price
                    .clone()
                    .or_else(|| product.display_price.clone())
                    .unwrap_or_else(|| format!("{price} {currency}"));
                (price, currency, formatted, phase.billing_period.clone())
            }
            None => {
                if !product.subscription_offer_details.is_empty() {
                    log::warn!(
                        "Product {} has offers without pricing phases, using product-level price",
                        product.id
                    );
                }
                let price = product
                    .price
                    .or_else(|| product.display_price.as_deref().map(parse_display_price))
                    .unwrap_or(0.0);
                let currency = product
                    .currency
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
                let formatted = product
                    .display_price
                    .clone()
                    .unwrap_or_else(|| format!("{price} {currency}"));
                (price, currency, formatted, None)
            }
        };

        let price_per_month = match tier {
            SubscriptionType::Yearly => (price / 12.0).round(),
            SubscriptionType::Monthly | SubscriptionType::Unknown => price,
        };

        Plan {
            id: product.id.clone(),
            name: product.display_name.clone().unwrap_or_else(|| match tier {
                SubscriptionType::Monthly => "Monthly".to_string(),
                SubscriptionType::Yearly => "Yearly".to_string(),
                SubscriptionType::Unknown => product.id.clone(),
            }),
            tier,
            price,
            currency,
            formatted_price,
            price_per_month,
            billing_period,
            trial,
            savings: None,
            offer_token: offer.and_then(|o| o.offer_token.clone()),
        }
    }
}

/// The offer whose first phase is free (a trial), else the first offer.
fn preferred_display_offer(offers: &[SubscriptionOfferModel]) -> Option<&SubscriptionOfferModel> {
    offers
        .iter()
        .find(|o| {
            o.pricing_phases
                .pricing_phase_list
                .first()
                .is_some_and(|p| p.is_free())
        })
        .or_else(|| offers.first())
}

/// Last phase flagged as infinitely recurring, else the last phase.
fn recurring_phase(phases: &[PricingPhaseModel]) -> Option<&PricingPhaseModel> {
    phases
        .iter()
        .rev()
        .find(|p| p.recurrence_mode == Some(RecurrenceMode::InfiniteRecurring))
        .or_else(|| phases.last())
}

/// "₹1,999.00" -> 1999.0. Anything unparseable is 0.
fn parse_display_price(display: &str) -> f64 {
    let numeric: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().unwrap_or(0.0)
}

fn annotate_savings(plans: &mut [Plan]) {
    let Some(monthly_price) = plans
        .iter()
        .find(|p| p.tier == SubscriptionType::Monthly && p.price > 0.0)
        .map(|p| p.price)
    else {
        return;
    };
    for plan in plans
        .iter_mut()
        .filter(|p| p.tier == SubscriptionType::Yearly && p.price > 0.0)
    {
        let pct = ((1.0 - plan.price / (monthly_price * 12.0)) * 100.0).round();
        if pct > 0.0 {
            plan.savings = Some(format!("Save {pct}%"));
        }
    }
}

/// Offer to buy for `product`: the family's trial offer, else its base plan,
/// else the first offer.
pub(crate) fn select_purchase_offer<'a>(
    product: &'a SubscriptionProductModel,
    config: &EntitlementConfig,
) -> Option<&'a SubscriptionOfferModel> {
    let offers = &product.subscription_offer_details;
    let family = config.family_of(&product.id);
    let by_offer_id = family
        .and_then(|f| f.trial_offer_id.as_deref())
        .and_then(|id| offers.iter().find(|o| o.offer_id.as_deref() == Some(id)));
    let by_base_plan = || {
        family
            .and_then(|f| f.base_plan_id.as_deref())
            .and_then(|id| offers.iter().find(|o| o.base_plan_id.as_deref() == Some(id)))
    };
    by_offer_id.or_else(by_base_plan).or_else(|| offers.first())
}
