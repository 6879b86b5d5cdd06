//! Query-string parsing for report and table routes
//!
//! List parameters may be repeated (`month=1&month=2`) or comma separated
//! (`month=1,2`). Blank values are ignored.

use chrono::NaiveDate;

use crate::reporting::{DateRange, FilterRequest, ReportError, ReportResult};

/// Raw `(key, value)` pairs in request order
pub type QueryPairs = Vec<(String, String)>;

/// Build a [`FilterRequest`] from query pairs.
///
/// `organisation_id` from the path wins over any query value. A missing
/// organisation is reported before any other parameter is looked at.
pub fn parse_filter(
    path_organisation: Option<&str>,
    pairs: &[(String, String)],
) -> ReportResult<FilterRequest> {
    let organisation_id = resolve_organisation(path_organisation, pairs)
        .ok_or_else(|| ReportError::validation("organisation_id is required"))?;

    let mut request = FilterRequest::new(organisation_id);
    let mut start_date = None;
    let mut end_date = None;

    for (key, raw) in pairs {
        let value = raw.trim();
        match key.as_str() {
            "date" if !value.is_empty() => request.exact_date = Some(parse_date(key, value)?),
            "start_date" if !value.is_empty() => start_date = Some(parse_date(key, value)?),
            "end_date" if !value.is_empty() => end_date = Some(parse_date(key, value)?),
            "year" => request.years.extend(parse_list::<i32>(key, value)?),
            "month" => request.months.extend(parse_list::<u32>(key, value)?),
            "week" => request.weeks_of_month.extend(parse_list::<u32>(key, value)?),
            "quarter" => request.quarters.extend(parse_list::<u32>(key, value)?),
            "shift" if !value.is_empty() => {
                request.shift = Some(value.parse::<i64>().map_err(|_| invalid(key, value))?);
            }
            _ => {}
        }
    }

    request.date_range = match (start_date, end_date) {
        (Some(start), Some(end)) => Some(DateRange { start, end }),
        (None, None) => None,
        _ => {
            return Err(ReportError::validation(
                "start_date and end_date must be given together",
            ))
        }
    };

    Ok(request)
}

fn resolve_organisation(
    path_organisation: Option<&str>,
    pairs: &[(String, String)],
) -> Option<String> {
    let query_organisation = pairs
        .iter()
        .filter(|(key, _)| key == "organisation_id")
        .map(|(_, value)| value.trim())
        .rfind(|value| !value.is_empty());

    path_organisation
        .map(str::trim)
        .or(query_organisation)
        .filter(|organisation| !organisation.is_empty())
        .map(str::to_string)
}

fn parse_date(key: &str, value: &str) -> ReportResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ReportError::validation(format!("{key} must be a date in YYYY-MM-DD format"))
    })
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> ReportResult<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<T>().map_err(|_| invalid(key, part)))
        .collect()
}

fn invalid(key: &str, value: &str) -> ReportError {
    ReportError::validation(format!("invalid value '{value}' for {key}"))
}
