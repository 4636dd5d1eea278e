use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    models::{
        error::Error,
        rate::{RateLookup, RateQuery},
    },
    utils::state::AppState,
};

pub async fn get_rates(
    State(state): State<AppState>,
    Query(params): Query<RateQuery>,
) -> Result<Json<RateLookup>, Error> {
    let pair = params.into_pair(state.default_pair)?;
    let lookup = state.rates.resolve(pair).await?;
    Ok(Json(lookup))
}
