//! Sales, ad spend and ROAS reporting for a small course business.

mod api;
pub mod auth;
pub mod config;
mod error;
pub mod import;
mod numeric;
pub mod report;
mod responses;
pub mod storage;
pub mod store;
pub mod types;

use serde::Serialize;

pub use api::{AppState, init_router};
pub use error::{DashboardError, DashboardResult};
pub use types::{AdCampaign, Course, Round, Sale, SaleStatus};

/// Course id given to campaigns that match no course.
pub const UNKNOWN_COURSE_ID: &str = "unknown";
/// Platform stamped on pasted campaign rows.
pub const IMPORT_PLATFORM: &str = "Facebook";
/// Platform for manual entries that name none.
pub const DEFAULT_AD_PLATFORM: &str = "Facebook";
/// Shown when a sale's round cannot be found.
pub const UNSET_ROUND_LABEL: &str = "غير محدد";

pub const PLATFORMS: [&str; 4] = ["Facebook", "Instagram", "TikTok", "Other"];

pub const GOVERNORATES: [&str; 27] = [
    "القاهرة", "الجيزة", "الإسكندرية", "القليوبية", "الدقهلية", "الغربية",
    "الشرقية", "المنوفية", "دمياط", "كفر الشيخ", "البحيرة", "الإسماعيلية",
    "بورسعيد", "السويس", "الفيوم", "بني سويف", "المنيا", "أسيوط",
    "سوهاج", "قنا", "الأقصر", "أسوان", "البحر الأحمر", "الوادي الجديد",
    "مطروح", "شمال سيناء", "جنوب سيناء",
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaymentMethodOption {
    pub id: types::PaymentMethod,
    pub label: &'static str,
}

pub const PAYMENT_METHODS: [PaymentMethodOption; 3] = [
    PaymentMethodOption {
        id: types::PaymentMethod::Wallet,
        label: "محفظة إلكترونية",
    },
    PaymentMethodOption {
        id: types::PaymentMethod::Instapay,
        label: "InstaPay",
    },
    PaymentMethodOption {
        id: types::PaymentMethod::Cod,
        label: "COD - تحصيل منزلي",
    },
];

/// The catalog used when nothing has been saved yet.
pub fn default_courses() -> Vec<Course> {
    [
        ("content", "Content", 3200.0),
        ("script", "Script", 3900.0),
        ("branding", "Branding", 3900.0),
        ("media", "Media Buying", 1600.0),
        ("montage", "Montage", 3600.0),
        ("reels", "Reels", 3100.0),
    ]
    .into_iter()
    .map(|(id, name, price)| Course {
        id: id.to_string(),
        name: name.to_string(),
        price,
        keywords: vec![id.to_string()],
        rounds: Vec::new(),
    })
    .collect()
}
