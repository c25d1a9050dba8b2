//! Owned dashboard state and the commands that mutate it.
//!
//! Every command builds the replacement collection, writes its blob and only
//! then swaps it in, so a failed write leaves memory untouched.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::import::{ParsedCampaign, match_course_by_keyword, parse_campaigns};
use crate::numeric::parse_float_prefix;
use crate::report::{FinancialReport, ReportFilter, compute_report};
use crate::storage::{ADS_KEY, BlobStorage, COURSES_KEY, SALES_KEY, load_collection, save_collection};
use crate::types::{
    AdCampaign, AdCampaignInput, Course, CourseInput, Round, RoundInput, Sale, SaleInput, SaleStatus,
    iso_date,
};
use crate::{DEFAULT_AD_PLATFORM, UNSET_ROUND_LABEL, default_courses};

pub struct Store {
    courses: Vec<Course>,
    sales: Vec<Sale>,
    ads: Vec<AdCampaign>,
    staged_ads: Vec<ParsedCampaign>,
    storage: Arc<dyn BlobStorage>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A millisecond timestamp strictly greater than `last`.
fn next_id(last: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    match last {
        Some(last) if last >= now => last.saturating_add(1),
        _ => now,
    }
}

/// Like [`next_id`], for ad ids, which may carry a fraction on older records.
fn next_ad_id(ads: &[AdCampaign]) -> f64 {
    let now = Utc::now().timestamp_millis() as f64;
    let last = ads.iter().map(|a| a.id).fold(f64::NEG_INFINITY, f64::max);
    if last >= now { last.floor() + 1.0 } else { now }
}

fn required(value: &str, what: &str) -> DashboardResult<()> {
    if value.trim().is_empty() {
        return Err(DashboardError::Validation(format!("{what} is required")));
    }
    Ok(())
}

impl Store {
    /// Loads all three collections, falling back to defaults for any blob
    /// that is missing or unreadable.
    pub fn open(storage: Arc<dyn BlobStorage>) -> Self {
        let courses = load_collection(storage.as_ref(), COURSES_KEY).unwrap_or_else(default_courses);
        let sales: Vec<Sale> = load_collection(storage.as_ref(), SALES_KEY).unwrap_or_default();
        let ads: Vec<AdCampaign> = load_collection(storage.as_ref(), ADS_KEY).unwrap_or_default();
        info!(
            courses = courses.len(),
            sales = sales.len(),
            ads = ads.len(),
            "dashboard state loaded"
        );
        Self {
            courses,
            sales,
            ads,
            staged_ads: Vec::new(),
            storage,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn sales(&self) -> &[Sale] {
        &self.sales
    }

    pub fn ads(&self) -> &[AdCampaign] {
        &self.ads
    }

    pub fn staged_ads(&self) -> &[ParsedCampaign] {
        &self.staged_ads
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    /// Course name, or the raw id when the course is gone.
    pub fn course_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.course(id).map(|c| c.name.as_str()).unwrap_or(id)
    }

    pub fn round_label(&self, course_id: &str, round_id: &str) -> &str {
        self.course(course_id)
            .and_then(|c| c.round(round_id))
            .map(|r| r.name.as_str())
            .unwrap_or(UNSET_ROUND_LABEL)
    }

    fn replace_courses(&mut self, next: Vec<Course>) -> DashboardResult<()> {
        save_collection(self.storage.as_ref(), COURSES_KEY, &next)?;
        self.courses = next;
        Ok(())
    }

    fn replace_sales(&mut self, next: Vec<Sale>) -> DashboardResult<()> {
        save_collection(self.storage.as_ref(), SALES_KEY, &next)?;
        self.sales = next;
        Ok(())
    }

    fn replace_ads(&mut self, next: Vec<AdCampaign>) -> DashboardResult<()> {
        save_collection(self.storage.as_ref(), ADS_KEY, &next)?;
        self.ads = next;
        Ok(())
    }

    // --- catalog ---

    pub fn add_course(&mut self, input: CourseInput) -> DashboardResult<Course> {
        let name = input.name.trim();
        required(name, "course name")?;
        let price = match &input.price {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => parse_float_prefix(s),
            _ => None,
        }
        .ok_or_else(|| DashboardError::Validation("course price must be a number".into()))?;

        let course = Course::new(name, price);
        if self.course(&course.id).is_some() {
            return Err(DashboardError::Conflict(format!("course {} already exists", course.id)));
        }
        let mut next = self.courses.clone();
        next.push(course.clone());
        self.replace_courses(next)?;
        info!(course_id = %course.id, "course added");
        Ok(course)
    }

    /// Removes a course. Sales and ads pointing at it are left as they are.
    pub fn delete_course(&mut self, id: &str) -> DashboardResult<Course> {
        let course = self
            .course(id)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound(format!("course {id}")))?;
        let next = self.courses.iter().filter(|c| c.id != id).cloned().collect();
        self.replace_courses(next)?;
        info!(course_id = %id, "course deleted");
        Ok(course)
    }

    pub fn add_round(&mut self, course_id: &str, input: RoundInput) -> DashboardResult<Round> {
        required(&input.name, "round name")?;
        if self.course(course_id).is_none() {
            return Err(DashboardError::NotFound(format!("course {course_id}")));
        }
        let last = self
            .courses
            .iter()
            .flat_map(|c| c.rounds.iter())
            .filter_map(|r| r.id.parse::<i64>().ok())
            .max();
        let round = Round {
            id: next_id(last).to_string(),
            name: input.name.trim().to_string(),
            start_date: input.start_date.trim().to_string(),
        };
        let next = self
            .courses
            .iter()
            .cloned()
            .map(|mut c| {
                if c.id == course_id {
                    c.rounds.push(round.clone());
                }
                c
            })
            .collect();
        self.replace_courses(next)?;
        info!(course_id, round_id = %round.id, "round added");
        Ok(round)
    }

    pub fn delete_round(&mut self, course_id: &str, round_id: &str) -> DashboardResult<Round> {
        let round = self
            .course(course_id)
            .ok_or_else(|| DashboardError::NotFound(format!("course {course_id}")))?
            .round(round_id)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound(format!("round {round_id}")))?;
        let next = self
            .courses
            .iter()
            .cloned()
            .map(|mut c| {
                if c.id == course_id {
                    c.rounds.retain(|r| r.id != round_id);
                }
                c
            })
            .collect();
        self.replace_courses(next)?;
        info!(course_id, round_id, "round deleted");
        Ok(round)
    }

    // --- sales ---

    fn validate_sale(input: &SaleInput) -> DashboardResult<()> {
        required(&input.client, "client")?;
        required(&input.phone, "phone")?;
        required(&input.course_id, "course")
    }

    /// Unknown courses price at zero.
    fn base_price(&self, course_id: &str) -> f64 {
        self.course(course_id).map(|c| c.price).unwrap_or(0.0)
    }

    fn active_sale(&self, id: i64) -> DashboardResult<&Sale> {
        let sale = self
            .sales
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| DashboardError::NotFound(format!("sale {id}")))?;
        if !sale.is_active() {
            return Err(DashboardError::Conflict(format!("sale {id} has been withdrawn")));
        }
        Ok(sale)
    }

    pub fn add_sale(&mut self, input: SaleInput) -> DashboardResult<Sale> {
        Self::validate_sale(&input)?;
        if self.course(&input.course_id).is_none() {
            warn!(course_id = %input.course_id, "sale recorded against unknown course");
        }
        let base_price = self.base_price(&input.course_id);
        let id = next_id(self.sales.iter().map(|s| s.id).max());
        let sale = Sale::create(id, input, base_price, today());

        let mut next = Vec::with_capacity(self.sales.len() + 1);
        next.push(sale.clone());
        next.extend(self.sales.iter().cloned());
        self.replace_sales(next)?;
        info!(sale_id = sale.id, status = ?sale.status, "sale recorded");
        Ok(sale)
    }

    pub fn edit_sale(&mut self, id: i64, input: SaleInput) -> DashboardResult<Sale> {
        Self::validate_sale(&input)?;
        let base_price = self.base_price(&input.course_id);
        let updated = self.active_sale(id)?.overwrite(input, base_price);
        let next = self
            .sales
            .iter()
            .map(|s| if s.id == id { updated.clone() } else { s.clone() })
            .collect();
        self.replace_sales(next)?;
        info!(sale_id = id, status = ?updated.status, "sale edited");
        Ok(updated)
    }

    pub fn withdraw_sale(&mut self, id: i64) -> DashboardResult<Sale> {
        let mut withdrawn = self.active_sale(id)?.clone();
        withdrawn.status = SaleStatus::Withdrawn;
        let next = self
            .sales
            .iter()
            .map(|s| if s.id == id { withdrawn.clone() } else { s.clone() })
            .collect();
        self.replace_sales(next)?;
        info!(sale_id = id, "sale withdrawn");
        Ok(withdrawn)
    }

    pub fn delete_sale(&mut self, id: i64) -> DashboardResult<Sale> {
        let sale = self
            .sales
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound(format!("sale {id}")))?;
        let next = self.sales.iter().filter(|s| s.id != id).cloned().collect();
        self.replace_sales(next)?;
        info!(sale_id = id, "sale deleted");
        Ok(sale)
    }

    /// Active sales, newest first, optionally for one course and matching
    /// `search` against client name or phone.
    pub fn list_sales(&self, course_id: Option<&str>, search: &str) -> Vec<&Sale> {
        self.sales
            .iter()
            .filter(|s| s.is_active())
            .filter(|s| course_id.is_none_or(|id| s.course_id == id))
            .filter(|s| s.client.contains(search) || s.phone.contains(search))
            .collect()
    }

    /// Partially paid sales, earliest due date first; undated ones last.
    pub fn installments(&self) -> Vec<&Sale> {
        let mut due: Vec<&Sale> = self
            .sales
            .iter()
            .filter(|s| s.status == SaleStatus::Partial)
            .collect();
        due.sort_by(|a, b| match (&a.due_date, &b.due_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        due
    }

    // --- ad spend ---

    pub fn add_ad_campaign(&mut self, input: AdCampaignInput) -> DashboardResult<AdCampaign> {
        let course_id = match input.course_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => match_course_by_keyword(&input.campaign_name, &self.courses),
        };
        let ad = AdCampaign {
            id: next_ad_id(&self.ads),
            date: input
                .date
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| iso_date(today())),
            campaign_name: input.campaign_name.trim().to_string(),
            course_id,
            spend: input.spend,
            leads: input.leads,
            platform: input
                .platform
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AD_PLATFORM.to_string()),
        };
        let mut next = Vec::with_capacity(self.ads.len() + 1);
        next.push(ad.clone());
        next.extend(self.ads.iter().cloned());
        self.replace_ads(next)?;
        info!(ad_id = ad.id, course_id = %ad.course_id, "ad campaign added");
        Ok(ad)
    }

    pub fn delete_ad_campaign(&mut self, id: f64) -> DashboardResult<AdCampaign> {
        let ad = self
            .ads
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound(format!("ad campaign {id}")))?;
        let next = self.ads.iter().filter(|a| a.id != id).cloned().collect();
        self.replace_ads(next)?;
        info!(ad_id = id, "ad campaign deleted");
        Ok(ad)
    }

    /// Parses pasted rows into the staging list, replacing whatever was staged.
    pub fn stage_ad_import(&mut self, text: &str) -> &[ParsedCampaign] {
        self.staged_ads = parse_campaigns(text, &self.courses, today());
        info!(rows = self.staged_ads.len(), "ad import staged");
        &self.staged_ads
    }

    /// Moves the staged rows to the front of the ledger.
    pub fn confirm_ad_import(&mut self) -> DashboardResult<Vec<AdCampaign>> {
        if self.staged_ads.is_empty() {
            return Err(DashboardError::Validation("nothing staged to import".into()));
        }
        let first_id = next_ad_id(&self.ads);
        let imported: Vec<AdCampaign> = self
            .staged_ads
            .iter()
            .enumerate()
            .map(|(i, p)| AdCampaign {
                id: first_id + i as f64,
                date: p.date.clone(),
                campaign_name: p.campaign_name.clone(),
                course_id: p.course_id.clone(),
                spend: p.spend,
                leads: p.leads,
                platform: p.platform.clone(),
            })
            .collect();
        let next = imported.iter().chain(self.ads.iter()).cloned().collect();
        self.replace_ads(next)?;
        self.staged_ads.clear();
        info!(rows = imported.len(), "ad import confirmed");
        Ok(imported)
    }

    pub fn discard_ad_import(&mut self) -> usize {
        let dropped = self.staged_ads.len();
        self.staged_ads.clear();
        dropped
    }

    // --- reporting ---

    pub fn report(&self, filter: &ReportFilter, roas_precision: u32) -> FinancialReport {
        compute_report(&self.sales, &self.ads, &self.courses, filter, roas_precision)
    }
}
