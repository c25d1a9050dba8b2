//! Parser for tables pasted from an ads manager export.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::numeric::{parse_float_prefix, parse_int_prefix};
use crate::types::Course;
use crate::{IMPORT_PLATFORM, UNKNOWN_COURSE_ID};

static WIDE_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static NON_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.]").unwrap());

/// A pasted row awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCampaign {
    pub date: String,
    pub campaign_name: String,
    pub course_id: String,
    pub spend: f64,
    pub leads: i64,
    pub platform: String,
}

/// Parses every usable line of `text`. Unusable lines are skipped.
pub fn parse_campaigns(text: &str, courses: &[Course], today: NaiveDate) -> Vec<ParsedCampaign> {
    text.trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_line(line, courses, today))
        .collect()
}

fn split_columns(line: &str) -> Vec<&str> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() >= 2 {
        return cols;
    }
    WIDE_GAP.split(line).collect()
}

fn parse_line(line: &str, courses: &[Course], today: NaiveDate) -> Option<ParsedCampaign> {
    let cols = split_columns(line);
    if cols.len() < 2 {
        return None;
    }

    let name = cols[0].trim();
    // header row
    if name.to_lowercase().contains("campaign") {
        return None;
    }
    let spend = parse_float_prefix(&NON_NUMERIC.replace_all(cols[1], ""))?;
    let leads = cols
        .get(2)
        .and_then(|c| parse_int_prefix(&NON_NUMERIC.replace_all(c, "")))
        .unwrap_or(0);
    let date = cols
        .get(3)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    Some(ParsedCampaign {
        date,
        campaign_name: name.to_string(),
        course_id: match_course_by_name(name, courses),
        spend,
        leads,
        platform: IMPORT_PLATFORM.to_string(),
    })
}

/// Id of the last course whose name appears in `campaign_name`, ignoring case.
pub fn match_course_by_name(campaign_name: &str, courses: &[Course]) -> String {
    let haystack = campaign_name.to_lowercase();
    courses
        .iter()
        .filter(|c| haystack.contains(&c.name.to_lowercase()))
        .last()
        .map(|c| c.id.clone())
        .unwrap_or_else(|| UNKNOWN_COURSE_ID.to_string())
}

/// Like [`match_course_by_name`] but also accepts any of a course's keywords.
pub fn match_course_by_keyword(campaign_name: &str, courses: &[Course]) -> String {
    let haystack = campaign_name.to_lowercase();
    courses
        .iter()
        .filter(|c| {
            haystack.contains(&c.name.to_lowercase())
                || c.keywords
                    .iter()
                    .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        })
        .last()
        .map(|c| c.id.clone())
        .unwrap_or_else(|| UNKNOWN_COURSE_ID.to_string())
}
