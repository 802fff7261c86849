//! Shared dashboard filters.
//!
//! The [`FilterStore`] owns the one [`CommonFilters`] value every domain
//! store reads from. Mutations notify listeners synchronously, in
//! registration order, once per call. The store also converts filters to
//! and from the query parameters kept in the dashboard URL.

use chrono::{Duration, Local, NaiveDate, Offset};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Date format used by the URL bar and the backend.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days covered by the default filter window.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

pub const PARAM_START_DATE: &str = "startDate";
pub const PARAM_END_DATE: &str = "endDate";
pub const PARAM_ENTERPRISES: &str = "enterprises";
pub const PARAM_ACCOUNTS: &str = "accounts";
pub const PARAM_CHANNELS: &str = "channels";
pub const PARAM_TIMEZONE_OFFSET: &str = "timezoneOffset";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("date range spans {span_days} days, maximum is {max_days}")]
    SpanTooLong { span_days: i64, max_days: i64 },
}

/// Filter set shared by every dashboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFilters {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enterprise_ids: Vec<String>,
    pub account_ids: Vec<String>,
    /// Whole hours east of UTC.
    pub timezone_offset: i32,
    #[serde(default)]
    pub channel_names: Vec<String>,
}

impl CommonFilters {
    /// Window of `days` days ending on `today`, everything else empty.
    pub fn window_ending(today: NaiveDate, days: i64, timezone_offset: i32) -> Self {
        Self {
            start_date: today - Duration::days(days),
            end_date: today,
            enterprise_ids: Vec::new(),
            account_ids: Vec::new(),
            timezone_offset,
            channel_names: Vec::new(),
        }
    }

    /// Number of days between start and end date.
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

impl Default for CommonFilters {
    fn default() -> Self {
        Self::window_ending(local_today(), DEFAULT_WINDOW_DAYS, local_timezone_offset())
    }
}

/// Today's date in the local timezone.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Local UTC offset truncated to whole hours.
pub fn local_timezone_offset() -> i32 {
    Local::now().offset().fix().local_minus_utc() / 3600
}

/// Partial filter update. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub enterprise_ids: Option<Vec<String>>,
    pub account_ids: Option<Vec<String>>,
    pub timezone_offset: Option<i32>,
    pub channel_names: Option<Vec<String>>,
}

impl FilterPatch {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.enterprise_ids.is_none()
            && self.account_ids.is_none()
            && self.timezone_offset.is_none()
            && self.channel_names.is_none()
    }

    pub fn apply_to(self, filters: &CommonFilters) -> CommonFilters {
        CommonFilters {
            start_date: self.start_date.unwrap_or(filters.start_date),
            end_date: self.end_date.unwrap_or(filters.end_date),
            enterprise_ids: self
                .enterprise_ids
                .unwrap_or_else(|| filters.enterprise_ids.clone()),
            account_ids: self.account_ids.unwrap_or_else(|| filters.account_ids.clone()),
            timezone_offset: self.timezone_offset.unwrap_or(filters.timezone_offset),
            channel_names: self
                .channel_names
                .unwrap_or_else(|| filters.channel_names.clone()),
        }
    }
}

/// Maximum span a view accepts for its date picker.
///
/// Advisory only: the store never rejects a range, views call
/// [`DateRangePolicy::validate`] before submitting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangePolicy {
    pub max_span_days: i64,
}

impl DateRangePolicy {
    pub const QUARTER: DateRangePolicy = DateRangePolicy { max_span_days: 90 };
    pub const MONTH: DateRangePolicy = DateRangePolicy { max_span_days: 31 };

    pub fn new(max_span_days: i64) -> Self {
        Self { max_span_days }
    }

    pub fn validate(&self, filters: &CommonFilters) -> Result<(), FilterError> {
        if filters.start_date > filters.end_date {
            return Err(FilterError::InvertedRange {
                start: filters.start_date,
                end: filters.end_date,
            });
        }
        let span_days = filters.span_days();
        if span_days > self.max_span_days {
            return Err(FilterError::SpanTooLong {
                span_days,
                max_days: self.max_span_days,
            });
        }
        Ok(())
    }
}

/// Query parameters for the dashboard URL, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    pairs: Vec<(&'static str, String)>,
}

impl UrlParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn push(&mut self, key: &'static str, value: String) {
        self.pairs.push((key, value));
    }
}

/// Serialize filters for the URL bar, omitting empty lists and a zero offset.
pub fn encode_url_params(filters: &CommonFilters) -> UrlParams {
    let mut params = UrlParams::default();
    params.push(
        PARAM_START_DATE,
        filters.start_date.format(DATE_FORMAT).to_string(),
    );
    params.push(
        PARAM_END_DATE,
        filters.end_date.format(DATE_FORMAT).to_string(),
    );
    if !filters.enterprise_ids.is_empty() {
        params.push(PARAM_ENTERPRISES, filters.enterprise_ids.join(","));
    }
    if !filters.account_ids.is_empty() {
        params.push(PARAM_ACCOUNTS, filters.account_ids.join(","));
    }
    if !filters.channel_names.is_empty() {
        params.push(PARAM_CHANNELS, filters.channel_names.join(","));
    }
    if filters.timezone_offset != 0 {
        params.push(PARAM_TIMEZONE_OFFSET, filters.timezone_offset.to_string());
    }
    params
}

/// Parse URL query pairs into a patch. Malformed values are dropped.
pub fn parse_url_params<I, K, V>(params: I) -> FilterPatch
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut patch = FilterPatch::default();
    for (key, value) in params {
        let value = value.as_ref();
        match key.as_ref() {
            PARAM_START_DATE => {
                if let Some(date) = parse_url_date(value) {
                    patch.start_date = Some(date);
                }
            }
            PARAM_END_DATE => {
                if let Some(date) = parse_url_date(value) {
                    patch.end_date = Some(date);
                }
            }
            PARAM_ENTERPRISES => patch.enterprise_ids = Some(split_list(value)),
            PARAM_ACCOUNTS => patch.account_ids = Some(split_list(value)),
            PARAM_CHANNELS => patch.channel_names = Some(split_list(value)),
            PARAM_TIMEZONE_OFFSET => match value.trim().parse::<i32>() {
                Ok(offset) => patch.timezone_offset = Some(offset),
                Err(_) => tracing::debug!("dropping malformed timezoneOffset {:?}", value),
            },
            other => tracing::trace!("ignoring unknown url param {}", other),
        }
    }
    patch
}

/// Split a raw `a=b&c=d` query string into decoded pairs.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Accepts exactly `YYYY-MM-DD` naming a real calendar date.
pub fn parse_url_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        tracing::debug!("dropping malformed date {:?}", value);
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Handle returned by [`FilterStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CommonFilters) + Send + Sync>;

/// Owner of the shared [`CommonFilters`].
pub struct FilterStore {
    filters: RwLock<CommonFilters>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    window_days: i64,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::with_filters(CommonFilters::default())
    }

    pub fn with_filters(filters: CommonFilters) -> Self {
        Self {
            filters: RwLock::new(filters),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    /// Use a different default window for [`FilterStore::reset_filters`].
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    /// Snapshot of the current filters.
    pub fn filters(&self) -> CommonFilters {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merge `patch` into the current filters and notify listeners.
    pub fn update_filters(&self, patch: FilterPatch) {
        let next = patch.apply_to(&self.filters());
        self.replace(next);
    }

    /// Same merge as [`FilterStore::update_filters`], used when bootstrapping
    /// from the URL.
    pub fn set_filters(&self, patch: FilterPatch) {
        self.update_filters(patch);
    }

    /// Restore the default window ending today.
    pub fn reset_filters(&self) {
        let defaults =
            CommonFilters::window_ending(local_today(), self.window_days, local_timezone_offset());
        self.replace(defaults);
    }

    /// Apply URL query pairs. Returns true if any value was accepted.
    pub fn initialize_from_url<I, K, V>(&self, params: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let patch = parse_url_params(params);
        if patch.is_empty() {
            return false;
        }
        self.set_filters(patch);
        true
    }

    /// [`FilterStore::initialize_from_url`] for a raw query string.
    pub fn initialize_from_query(&self, query: &str) -> bool {
        self.initialize_from_url(parse_query_string(query))
    }

    pub fn url_params(&self) -> UrlParams {
        encode_url_params(&self.filters())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CommonFilters) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        tracing::debug!(subscription = id.0, "filter listener attached");
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(subscription = id.0, "filter listener detached");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn replace(&self, next: CommonFilters) {
        {
            let mut current = self.filters.write().unwrap_or_else(PoisonError::into_inner);
            *current = next.clone();
        }
        tracing::debug!(
            start = %next.start_date,
            end = %next.end_date,
            enterprises = next.enterprise_ids.len(),
            accounts = next.account_ids.len(),
            "filters changed"
        );
        // Listeners may subscribe or unsubscribe, so call them outside the lock.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&next);
        }
    }
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}
