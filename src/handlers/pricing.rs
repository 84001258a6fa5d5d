use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::metrics::PRICING_REQUESTS;
use crate::models::{Envelope, PromoQuery};
use crate::pricing::PricingTier;
use crate::state::SharedState;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub tiers: BTreeMap<String, PricingTier>,
    pub free_tier: PricingTier,
    pub has_active_promotion: bool,
}

// GET /api/pricing?promo=true
pub async fn pricing_handler(
    State(state): State<SharedState>,
    Query(query): Query<PromoQuery>,
) -> Json<Envelope<Catalog>> {
    PRICING_REQUESTS.inc();
    let now = Utc::now();

    Json(Envelope::ok(Catalog {
        tiers: state.pricing.list_tiers(query.include_promo(), now),
        free_tier: state.pricing.free_tier().clone(),
        has_active_promotion: state.pricing.is_promotion_active(now),
    }))
}

// GET /api/pricing/{tier}?promo=true
pub async fn tier_handler(
    State(state): State<SharedState>,
    Path(tier): Path<String>,
    Query(query): Query<PromoQuery>,
) -> Result<Json<Envelope<PricingTier>>, ApiError> {
    PRICING_REQUESTS.inc();

    state
        .pricing
        .get_tier(&tier, query.include_promo(), Utc::now())
        .map(|found| Json(Envelope::ok(found)))
        .ok_or(ApiError::TierNotFound(tier))
}
