//! Synthetic M5-style daily sales.
//!
//! Generates a `stores × items × days` panel with the identifier hierarchy of
//! the M5 competition data (state → store, category → department → item),
//! intermittent demand and step-changing shelf prices. Output is fully
//! determined by the config, including the seed.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;

use crate::domain::RawObservation;
use crate::error::AppError;

const STATES: [&str; 3] = ["CA", "TX", "WI"];
const CATEGORIES: [&str; 3] = ["FOODS", "HOUSEHOLD", "HOBBIES"];
const DEPTS_PER_CATEGORY: usize = 2;

/// Weekly probability that an item's price is changed.
const PRICE_CHANGE_PROB: f64 = 0.08;
/// Demand multiplier for Saturday and Sunday.
const WEEKEND_LIFT: f64 = 1.35;
/// Demand elasticity to the price ratio (current / list price).
const PRICE_ELASTICITY: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub stores: usize,
    pub items: usize,
    pub days: usize,
    pub start: NaiveDate,
    pub seed: u64,
    /// Probability that a day has zero sales regardless of demand.
    pub zero_prob: f64,
    /// Probability that a day's row is dropped, leaving a calendar gap.
    pub gap_prob: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            stores: 3,
            items: 12,
            days: 120,
            start: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap_or_default(),
            seed: 42,
            zero_prob: 0.3,
            gap_prob: 0.0,
        }
    }
}

pub fn generate_sales(config: &SynthConfig) -> Result<Vec<RawObservation>, AppError> {
    if config.stores == 0 || config.items == 0 || config.days == 0 {
        return Err(AppError::new(2, "Stores, items and days must all be > 0."));
    }
    if !(0.0..1.0).contains(&config.zero_prob) {
        return Err(AppError::new(2, "Zero probability must be in [0, 1)."));
    }
    if !(0.0..1.0).contains(&config.gap_prob) {
        return Err(AppError::new(2, "Gap probability must be in [0, 1)."));
    }

    let dates = calendar(config.start, config.days)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut out = Vec::with_capacity(config.stores * config.items * config.days);

    for s in 0..config.stores {
        let (state_id, store_id) = store_ids(s);
        for i in 0..config.items {
            let item = item_ids(i);
            let unique_id = format!("{}_{store_id}", item.item_id);

            let base_rate: f64 = rng.gen_range(0.2..6.0);
            let list_price = (rng.gen_range(1.0..15.0_f64) * 100.0).round() / 100.0;
            let mut price = list_price;

            for (d, &ds) in dates.iter().enumerate() {
                if d > 0 && ds.weekday() == Weekday::Sat && rng.gen_bool(PRICE_CHANGE_PROB) {
                    price = next_price(&mut rng, list_price);
                }
                let y = daily_demand(&mut rng, base_rate, ds, price / list_price, config.zero_prob)?;
                if config.gap_prob > 0.0 && rng.gen_bool(config.gap_prob) {
                    continue;
                }

                out.push(RawObservation {
                    unique_id: unique_id.clone(),
                    item_id: item.item_id.clone(),
                    dept_id: item.dept_id.clone(),
                    cat_id: item.cat_id.to_string(),
                    store_id: store_id.clone(),
                    state_id: state_id.to_string(),
                    ds,
                    y,
                    wm_yr_wk: Some(wm_yr_wk(ds)),
                    sell_price: price,
                });
            }
        }
    }

    Ok(out)
}

fn calendar(start: NaiveDate, days: usize) -> Result<Vec<NaiveDate>, AppError> {
    (0..days)
        .map(|d| {
            start
                .checked_add_days(Days::new(d as u64))
                .ok_or_else(|| AppError::new(2, "Synthetic calendar runs past the supported date range."))
        })
        .collect()
}

/// Store `s` (0-based) → (`state_id`, `store_id`), cycling through states.
fn store_ids(s: usize) -> (&'static str, String) {
    let state = STATES[s % STATES.len()];
    (state, format!("{state}_{}", s / STATES.len() + 1))
}

struct ItemIds {
    cat_id: &'static str,
    dept_id: String,
    item_id: String,
}

/// Item `i` (0-based) cycles through categories, then departments.
fn item_ids(i: usize) -> ItemIds {
    let cat_id = CATEGORIES[i % CATEGORIES.len()];
    let rest = i / CATEGORIES.len();
    let dept_id = format!("{cat_id}_{}", rest % DEPTS_PER_CATEGORY + 1);
    let item_id = format!("{dept_id}_{:03}", rest / DEPTS_PER_CATEGORY + 1);
    ItemIds {
        cat_id,
        dept_id,
        item_id,
    }
}

fn next_price(rng: &mut StdRng, list_price: f64) -> f64 {
    // Promotions and reversions stay within ±20% of list.
    let factor: f64 = rng.gen_range(0.8..1.2);
    ((list_price * factor) * 100.0).round() / 100.0
}

fn daily_demand(rng: &mut StdRng, base_rate: f64, ds: NaiveDate, price_ratio: f64, zero_prob: f64) -> Result<f64, AppError> {
    if rng.r#gen::<f64>() < zero_prob {
        return Ok(0.0);
    }
    let lift = match ds.weekday() {
        Weekday::Sat | Weekday::Sun => WEEKEND_LIFT,
        _ => 1.0,
    };
    let rate = (base_rate * lift * price_ratio.powf(-PRICE_ELASTICITY)).max(1e-3);
    let poisson = Poisson::new(rate).map_err(|e| AppError::new(4, format!("Demand distribution error: {e}")))?;
    Ok(poisson.sample(rng))
}

/// Walmart-style week code `1YYWW` from the ISO week of `ds`.
pub fn wm_yr_wk(ds: NaiveDate) -> i32 {
    let week = ds.iso_week();
    10_000 + (week.year() % 100) * 100 + week.week() as i32
}
