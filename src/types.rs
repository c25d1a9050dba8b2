use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::numeric::{lenient_f64, lenient_i64, lenient_opt_u32};

/// A scheduled cohort of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// The ID of the round.
    pub id: String,
    /// The display name, e.g. "October round".
    pub name: String,
    /// The start date as entered.
    #[serde(default)]
    pub start_date: String,
}

/// A course in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Slug derived from the name.
    pub id: String,
    /// The display name.
    pub name: String,
    /// The list price charged before discounts.
    pub price: f64,
    /// Lower-cased words that identify the course in campaign names.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// The scheduled rounds, in creation order.
    #[serde(default)]
    pub rounds: Vec<Round>,
}

impl Course {
    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: course_slug(name),
            name: name.to_string(),
            price,
            keywords: vec![name.to_lowercase()],
            rounds: Vec::new(),
        }
    }

    pub fn round(&self, round_id: &str) -> Option<&Round> {
        self.rounds.iter().find(|r| r.id == round_id)
    }
}

/// Lower-cases `name` and replaces every whitespace character with `-`.
pub fn course_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Instapay,
    Cod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Paid,
    Partial,
    /// Soft-deleted. Never derived, only set by an explicit withdrawal.
    Withdrawn,
}

impl SaleStatus {
    /// Anything still owed means the sale is partial.
    pub fn from_remaining(remaining_amount: f64) -> Self {
        if remaining_amount > 0.0 {
            Self::Partial
        } else {
            Self::Paid
        }
    }
}

/// Derived money fields of a sale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub base_price: f64,
    pub discount: f64,
    pub final_price: f64,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    pub status: SaleStatus,
}

impl Pricing {
    pub fn derive(base_price: f64, discount: f64, paid_amount: f64) -> Self {
        let final_price = base_price - discount;
        let remaining_amount = final_price - paid_amount;
        Self {
            base_price,
            discount,
            final_price,
            paid_amount,
            remaining_amount,
            status: SaleStatus::from_remaining(remaining_amount),
        }
    }
}

/// An order for a course round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Millisecond timestamp at creation.
    pub id: i64,
    /// `YYYY-MM-DD`, or blank on records saved without a date.
    #[serde(default)]
    pub date: String,
    pub client: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governorate: Option<String>,
    pub gender: Gender,
    pub course_id: String,
    pub round_id: String,
    pub payment_method: PaymentMethod,
    pub moderator_name: String,
    pub platform: String,
    pub base_price: f64,
    pub discount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_reason: Option<String>,
    pub final_price: f64,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub status: SaleStatus,
}

impl Sale {
    /// Builds a new sale priced against `base_price`.
    pub fn create(id: i64, input: SaleInput, base_price: f64, today: NaiveDate) -> Self {
        Self::build(id, input, base_price, iso_date(today))
    }

    /// Overwrites every editable field and re-derives pricing and status.
    ///
    /// The id is kept, and so is the date unless the input carries one.
    pub fn overwrite(&self, input: SaleInput, base_price: f64) -> Self {
        Self::build(self.id, input, base_price, self.date.clone())
    }

    fn build(id: i64, input: SaleInput, base_price: f64, fallback_date: String) -> Self {
        let pricing = Pricing::derive(base_price, input.discount, input.paid_amount);
        let date = input.date.map(iso_date).unwrap_or(fallback_date);
        Self {
            id,
            date,
            client: input.client.trim().to_string(),
            phone: input.phone.trim().to_string(),
            email: non_blank(input.email),
            age: input.age,
            governorate: non_blank(input.governorate),
            gender: input.gender,
            course_id: input.course_id,
            round_id: input.round_id,
            payment_method: input.payment_method,
            moderator_name: input.moderator_name,
            platform: input.platform,
            base_price: pricing.base_price,
            discount: pricing.discount,
            discount_reason: non_blank(input.discount_reason),
            final_price: pricing.final_price,
            paid_amount: pricing.paid_amount,
            remaining_amount: pricing.remaining_amount,
            due_date: non_blank(input.due_date),
            status: pricing.status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != SaleStatus::Withdrawn
    }
}

pub(crate) fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ad spend attributed to a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCampaign {
    /// Millisecond timestamp. Older imports stored fractional ids.
    pub id: f64,
    /// The date as entered or pasted, normally `YYYY-MM-DD`.
    pub date: String,
    pub campaign_name: String,
    pub course_id: String,
    pub spend: f64,
    pub leads: i64,
    pub platform: String,
}

/// The payload for creating or editing a sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleInput {
    /// Defaults to today on create and to the stored date on edit.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub age: Option<u32>,
    #[serde(default)]
    pub governorate: Option<String>,
    pub gender: Gender,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub round_id: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub moderator_name: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub discount: f64,
    #[serde(default)]
    pub discount_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub paid_amount: f64,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// The payload for creating a course.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    #[serde(default)]
    pub name: String,
    /// Rejected when missing or not a number.
    #[serde(default)]
    pub price: Option<serde_json::Value>,
}

/// The payload for scheduling a round.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_date: String,
}

/// The payload for a manually entered ad campaign.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCampaignInput {
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub campaign_name: String,
    /// Resolved from the campaign name when blank.
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spend: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub leads: i64,
    #[serde(default)]
    pub platform: Option<String>,
}
