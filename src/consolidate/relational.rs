// src/consolidate/relational.rs
//! Breaks the consolidated rows into the three groupings the review
//! database loads: companies, sites and long-form demand values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consolidate::merge::ConsolidatedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandPeriod {
    Peak,
    OffPeak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRow {
    pub company_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRow {
    pub site_id: u32,
    pub site_code: String,
    pub voltage_kv: Option<u32>,
    pub period_start: String,
    pub period_end: String,
    pub general_annotation: Option<String>,
    pub company_id: u32,
    pub approval: ApprovalStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandValueRow {
    pub site_id: u32,
    pub year: u16,
    pub period: DemandPeriod,
    pub value: Option<f64>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalTables {
    pub companies: Vec<CompanyRow>,
    pub sites: Vec<SiteRow>,
    pub demand_values: Vec<DemandValueRow>,
}

/// Reads a demand figure written with a decimal comma and dot thousands
/// separators ("1.500,25"). A lone dash means zero.
pub fn parse_demand(raw: &str) -> Option<f64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if text == "-" {
        return Some(0.0);
    }
    text.replace('.', "").replace(',', ".").parse().ok()
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

impl RelationalTables {
    /// Ids start at 1 in first-seen order. The first row seen for a site
    /// code defines the site; later rows with the same code are skipped.
    pub fn from_consolidated(records: &[ConsolidatedRecord]) -> Self {
        let mut tables = RelationalTables::default();
        let mut company_ids: HashMap<&str, u32> = HashMap::new();
        let mut site_ids: HashMap<&str, u32> = HashMap::new();
        let mut unparsed = 0;

        for merged in records {
            let next_company = tables.companies.len() as u32 + 1;
            let company_id = *company_ids.entry(merged.company.as_str()).or_insert_with(|| {
                tables.companies.push(CompanyRow { company_id: next_company, name: merged.company.clone() });
                next_company
            });

            let record = &merged.record;
            let site_code = merged.site_code();
            if site_ids.contains_key(site_code) {
                tracing::debug!("Site {} already loaded; skipping duplicate row", site_code);
                continue;
            }
            let site_id = tables.sites.len() as u32 + 1;
            site_ids.insert(site_code, site_id);
            tables.sites.push(SiteRow {
                site_id,
                site_code: site_code.to_string(),
                voltage_kv: record.voltage_kv.trim().parse().ok(),
                period_start: record.period_start.clone(),
                period_end: record.period_end.clone(),
                general_annotation: merged.general_annotation.clone(),
                company_id,
                approval: ApprovalStatus::Pending,
                approved_by: None,
                approved_at: None,
            });

            for year in &record.years {
                let cells = [
                    (DemandPeriod::Peak, &year.peak_value, &year.peak_annotation),
                    (DemandPeriod::OffPeak, &year.off_peak_value, &year.off_peak_annotation),
                ];
                for (period, raw_value, annotation) in cells {
                    if raw_value.trim().is_empty() {
                        continue;
                    }
                    let value = parse_demand(raw_value);
                    if value.is_none() {
                        unparsed += 1;
                        tracing::warn!(
                            "Could not read demand '{}' for {} {} {:?}; storing null",
                            raw_value, site_code, year.year, period
                        );
                    }
                    tables.demand_values.push(DemandValueRow {
                        site_id,
                        year: year.year,
                        period,
                        value,
                        annotation: non_empty(annotation),
                    });
                }
            }
        }

        tracing::info!(
            "Relational breakdown: {} companies, {} sites, {} demand values ({} unreadable)",
            tables.companies.len(),
            tables.sites.len(),
            tables.demand_values.len(),
            unparsed
        );
        tables
    }
}
