//! Pure aggregation over persisted ledger, catalog and price-history rows.
//!
//! Nothing in this module touches the database. The services load one
//! consistent snapshot of rows and hand them here, so the same rows always
//! produce the same output.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::{
    entities::{boq_job, job_material, material, supplier_price},
    errors::ServiceError,
};

/// Aggregated demand and price data for one material in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPriceDetail {
    pub material_id: String,
    pub name: String,
    pub unit: String,
    pub total_quantity: Decimal,
    pub estimated_price: Decimal,
    /// Mean of observed supplier prices; absent when nothing was procured yet.
    pub avg_actual_price: Option<Decimal>,
    /// Most recent observed supplier price.
    pub actual_price: Option<Decimal>,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualPriceStats {
    pub avg_actual_price: Option<Decimal>,
    pub actual_price: Option<Decimal>,
    pub supplier_name: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub observations: usize,
}

/// Catalog estimate and supplier price statistics for one material, read together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPriceStats {
    pub material_id: String,
    pub estimated_price: Decimal,
    #[serde(flatten)]
    pub actual: ActualPriceStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Actual,
    Estimated,
}

/// The per-unit price the rollup charges for a material, and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub price: Decimal,
    pub source: PriceSource,
}

impl UnitPrice {
    /// Most recent actual price when one exists, otherwise the catalog estimate.
    pub fn select(estimated_price: Decimal, stats: &ActualPriceStats) -> Self {
        match stats.actual_price {
            Some(price) => Self {
                price,
                source: PriceSource::Actual,
            },
            None => Self {
                price: estimated_price,
                source: PriceSource::Estimated,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCostLine {
    pub material_id: String,
    pub quantity_per_unit: Decimal,
    pub total_quantity: Decimal,
    pub unit_price: Decimal,
    pub price_source: PriceSource,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCostLine {
    pub job_id: Uuid,
    pub quantity: Decimal,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
    pub materials: Vec<MaterialCostLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCostSummary {
    pub project_id: Uuid,
    pub jobs: Vec<JobCostLine>,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
    pub total_revenue: Decimal,
    pub margin: Decimal,
    /// Materials priced at the catalog estimate because no supplier price exists.
    pub estimated_price_fallbacks: Vec<String>,
}

fn overflow(what: &str) -> ServiceError {
    ServiceError::InternalError(format!("{} exceeds the representable decimal range", what))
}

fn checked_mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, ServiceError> {
    a.checked_mul(b).ok_or_else(|| overflow(what))
}

fn checked_add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, ServiceError> {
    a.checked_add(b).ok_or_else(|| overflow(what))
}

fn checked_sum<I>(values: I, what: &str) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| checked_add(acc, value, what))
}

fn ledger_by_job(ledger: &[job_material::Model]) -> BTreeMap<Uuid, Vec<&job_material::Model>> {
    let mut by_job: BTreeMap<Uuid, Vec<&job_material::Model>> = BTreeMap::new();
    for row in ledger {
        by_job.entry(row.job_id).or_default().push(row);
    }
    by_job
}

/// Sums `ledger quantity × BOQ quantity` per material across every BOQ line.
///
/// Materials whose total is zero are left out. Totals beyond the decimal
/// range are reported as an error rather than wrapped or truncated.
pub fn material_requirements(
    boq_jobs: &[boq_job::Model],
    ledger: &[job_material::Model],
) -> Result<BTreeMap<String, Decimal>, ServiceError> {
    let by_job = ledger_by_job(ledger);
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();

    for line in boq_jobs {
        let Some(rows) = by_job.get(&line.job_id) else {
            continue;
        };
        for row in rows {
            let demand = checked_mul(row.quantity, line.quantity, "material demand")?;
            let total = totals.entry(row.material_id.clone()).or_insert(Decimal::ZERO);
            *total = checked_add(*total, demand, "material demand")?;
        }
    }

    totals.retain(|_, total| !total.is_zero());
    Ok(totals)
}

/// Mean and most recent price over the rows observed at or after `cutoff`.
///
/// The most recent row is the one with the latest `observed_at`; equal
/// timestamps fall back to the highest row id.
pub fn actual_price_stats(
    rows: &[supplier_price::Model],
    cutoff: Option<DateTime<Utc>>,
) -> Result<ActualPriceStats, ServiceError> {
    let selected: Vec<&supplier_price::Model> = rows
        .iter()
        .filter(|row| cutoff.map_or(true, |cutoff| row.observed_at >= cutoff))
        .collect();

    if selected.is_empty() {
        return Ok(ActualPriceStats::default());
    }

    let sum = checked_sum(selected.iter().map(|row| row.price), "supplier price total")?;
    let avg = sum / Decimal::from(selected.len() as u64);
    let latest = selected
        .iter()
        .max_by_key(|row| (row.observed_at, row.id))
        .copied();

    Ok(ActualPriceStats {
        avg_actual_price: Some(avg.normalize()),
        actual_price: latest.map(|row| row.price),
        supplier_name: latest.map(|row| row.supplier_name.clone()),
        observed_at: latest.map(|row| row.observed_at),
        observations: selected.len(),
    })
}

/// Groups price rows per material and computes stats for each.
pub fn actual_price_stats_by_material(
    rows: &[supplier_price::Model],
    cutoff: Option<DateTime<Utc>>,
) -> Result<BTreeMap<String, ActualPriceStats>, ServiceError> {
    let mut grouped: BTreeMap<&str, Vec<supplier_price::Model>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.material_id.as_str())
            .or_default()
            .push(row.clone());
    }
    grouped
        .into_iter()
        .map(|(material_id, rows)| {
            actual_price_stats(&rows, cutoff).map(|stats| (material_id.to_string(), stats))
        })
        .collect()
}

/// Joins requirements with catalog and price stats, one row per required material.
pub fn build_price_details(
    requirements: &BTreeMap<String, Decimal>,
    materials: &BTreeMap<String, material::Model>,
    stats: &BTreeMap<String, ActualPriceStats>,
) -> Result<Vec<MaterialPriceDetail>, ServiceError> {
    let empty = ActualPriceStats::default();
    requirements
        .iter()
        .map(|(material_id, total_quantity)| {
            let material = materials.get(material_id).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "ledger references material {} missing from catalog",
                    material_id
                ))
            })?;
            let stats = stats.get(material_id).unwrap_or(&empty);
            Ok(MaterialPriceDetail {
                material_id: material_id.clone(),
                name: material.name.clone(),
                unit: material.unit.clone(),
                total_quantity: *total_quantity,
                estimated_price: material.reference_price,
                avg_actual_price: stats.avg_actual_price,
                actual_price: stats.actual_price,
                supplier_name: stats.supplier_name.clone(),
            })
        })
        .collect()
}

/// Rolls material, labor and revenue figures up to job-instance and project totals.
pub fn project_cost_summary(
    project_id: Uuid,
    boq_jobs: &[boq_job::Model],
    ledger: &[job_material::Model],
    prices: &BTreeMap<String, UnitPrice>,
) -> Result<ProjectCostSummary, ServiceError> {
    let by_job = ledger_by_job(ledger);
    let mut lines = boq_jobs.to_vec();
    lines.sort_by_key(|line| line.job_id);

    let mut fallbacks = BTreeSet::new();
    let mut jobs = Vec::with_capacity(lines.len());

    for line in &lines {
        let mut materials = Vec::new();
        let mut material_cost = Decimal::ZERO;

        for row in by_job.get(&line.job_id).into_iter().flatten() {
            let unit_price = prices.get(&row.material_id).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "no price resolved for material {}",
                    row.material_id
                ))
            })?;
            if unit_price.source == PriceSource::Estimated {
                fallbacks.insert(row.material_id.clone());
            }
            let total_quantity = checked_mul(row.quantity, line.quantity, "material demand")?;
            let cost = checked_mul(total_quantity, unit_price.price, "material cost")?;
            material_cost = checked_add(material_cost, cost, "material cost")?;
            materials.push(MaterialCostLine {
                material_id: row.material_id.clone(),
                quantity_per_unit: row.quantity,
                total_quantity,
                unit_price: unit_price.price,
                price_source: unit_price.source,
                cost,
            });
        }
        materials.sort_by(|a, b| a.material_id.cmp(&b.material_id));

        let labor_cost = checked_mul(line.labor_cost, line.quantity, "labor cost")?;
        let total_cost = checked_add(material_cost, labor_cost, "job cost")?;
        let revenue = checked_mul(line.selling_price, line.quantity, "revenue")?;
        let margin = revenue
            .checked_sub(total_cost)
            .ok_or_else(|| overflow("job margin"))?;

        jobs.push(JobCostLine {
            job_id: line.job_id,
            quantity: line.quantity,
            material_cost,
            labor_cost,
            total_cost,
            revenue,
            margin,
            materials,
        });
    }

    let material_cost = checked_sum(jobs.iter().map(|j| j.material_cost), "project material cost")?;
    let labor_cost = checked_sum(jobs.iter().map(|j| j.labor_cost), "project labor cost")?;
    let total_cost = checked_sum(jobs.iter().map(|j| j.total_cost), "project cost")?;
    let total_revenue = checked_sum(jobs.iter().map(|j| j.revenue), "project revenue")?;
    let margin = total_revenue
        .checked_sub(total_cost)
        .ok_or_else(|| overflow("project margin"))?;

    Ok(ProjectCostSummary {
        project_id,
        jobs,
        material_cost,
        labor_cost,
        total_cost,
        total_revenue,
        margin,
        estimated_price_fallbacks: fallbacks.into_iter().collect(),
    })
}
