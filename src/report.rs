//! Per-course revenue, ad spend and return figures.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{AdCampaign, Course, Sale, iso_date};

/// Platform filter value that matches every sale.
pub const ALL_PLATFORMS: &str = "All";

/// Most decimal places ROAS is rounded to; larger settings are capped here.
pub const MAX_ROAS_PRECISION: u32 = 15;

/// Date range (inclusive) and sale platform to report on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub platform: String,
}

impl ReportFilter {
    /// First of the month through `today`, all platforms.
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self {
            start: today.with_day(1).unwrap_or(today),
            end: today,
            platform: ALL_PLATFORMS.to_string(),
        }
    }

    // Stored dates are text, so bounds compare as ISO strings. A blank date
    // sorts before every bound and never matches.
    fn keeps_sale(&self, sale: &Sale, start: &str, end: &str) -> bool {
        sale.is_active()
            && in_range(&sale.date, start, end)
            && (self.platform == ALL_PLATFORMS || sale.platform == self.platform)
    }

    fn keeps_ad(&self, ad: &AdCampaign, start: &str, end: &str) -> bool {
        in_range(&ad.date, start, end)
    }
}

fn in_range(date: &str, start: &str, end: &str) -> bool {
    date >= start && date <= end
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMetrics {
    pub id: String,
    pub name: String,
    pub revenue: f64,
    pub spend: f64,
    pub leads: i64,
    pub sales_count: usize,
    pub profit: f64,
    pub roas: f64,
    pub cpl: f64,
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub revenue: f64,
    pub spend: f64,
    pub leads: i64,
    pub sales_count: usize,
    pub profit: f64,
    pub avg_roas: f64,
    pub avg_cpl: f64,
    pub overall_conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialReport {
    pub filter: ReportFilter,
    pub metrics: Vec<CourseMetrics>,
    pub totals: ReportTotals,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places.min(MAX_ROAS_PRECISION) as i32);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() { rounded } else { value }
}

struct Ratios {
    roas: f64,
    cpl: f64,
    conversion: f64,
}

fn ratios(revenue: f64, spend: f64, leads: i64, sales_count: usize, roas_precision: u32) -> Ratios {
    let leads = leads as f64;
    Ratios {
        roas: round_to(ratio(revenue, spend), roas_precision),
        cpl: ratio(spend, leads),
        conversion: ratio(sales_count as f64, leads) * 100.0,
    }
}

/// Builds the report. Pure: the same inputs always give the same output.
///
/// Totals are summed from the per-course rows, so records pointing at a
/// course that no longer exists are not counted anywhere.
pub fn compute_report(
    sales: &[Sale],
    ads: &[AdCampaign],
    courses: &[Course],
    filter: &ReportFilter,
    roas_precision: u32,
) -> FinancialReport {
    let start = iso_date(filter.start);
    let end = iso_date(filter.end);

    let sales: Vec<&Sale> = sales
        .iter()
        .filter(|s| filter.keeps_sale(s, &start, &end))
        .collect();
    let ads: Vec<&AdCampaign> = ads
        .iter()
        .filter(|a| filter.keeps_ad(a, &start, &end))
        .collect();

    let metrics: Vec<CourseMetrics> = courses
        .iter()
        .map(|course| {
            let course_sales = sales.iter().filter(|s| s.course_id == course.id);
            let course_ads: Vec<&&AdCampaign> =
                ads.iter().filter(|a| a.course_id == course.id).collect();

            let (revenue, sales_count) = course_sales
                .fold((0.0, 0usize), |(sum, n), s| (sum + s.final_price, n + 1));
            let spend: f64 = course_ads.iter().map(|a| a.spend).sum();
            let leads: i64 = course_ads.iter().map(|a| a.leads).sum();
            let Ratios { roas, cpl, conversion } =
                ratios(revenue, spend, leads, sales_count, roas_precision);

            CourseMetrics {
                id: course.id.clone(),
                name: course.name.clone(),
                revenue,
                spend,
                leads,
                sales_count,
                profit: revenue - spend,
                roas,
                cpl,
                conversion,
            }
        })
        .collect();

    let revenue: f64 = metrics.iter().map(|m| m.revenue).sum();
    let spend: f64 = metrics.iter().map(|m| m.spend).sum();
    let leads: i64 = metrics.iter().map(|m| m.leads).sum();
    let sales_count: usize = metrics.iter().map(|m| m.sales_count).sum();
    let Ratios { roas, cpl, conversion } = ratios(revenue, spend, leads, sales_count, roas_precision);

    FinancialReport {
        filter: filter.clone(),
        metrics,
        totals: ReportTotals {
            revenue,
            spend,
            leads,
            sales_count,
            profit: revenue - spend,
            avg_roas: roas,
            avg_cpl: cpl,
            overall_conversion: conversion,
        },
    }
}
