//! Query-string driven filtering, sorting, projection and pagination.
//!
//! `ApiFeatures` only interprets the request parameters against a
//! [`Collection`]. Rendering onto SQL happens in [`ApiFeatures::push_onto`],
//! which the repositories call on a query whose text ends inside a `WHERE`
//! clause.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::schema::{Collection, Field, FieldKind};

pub type QueryParams = BTreeMap<String, String>;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Invalid field: {0}")]
    UnknownField(String),
    #[error("Invalid operator '{op}' for field {field}")]
    UnknownOperator { field: String, op: String },
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: String, value: String },
    #[error("Cannot mix included and excluded fields")]
    MixedProjection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "gte" => Some(Comparison::Gte),
            "gt" => Some(Comparison::Gt),
            "lte" => Some(Comparison::Lte),
            "lt" => Some(Comparison::Lt),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gte => ">=",
            Comparison::Gt => ">",
            Comparison::Lte => "<=",
            Comparison::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl FilterValue {
    fn parse(field: &Field, raw: &str) -> Result<Self, FeatureError> {
        let raw = raw.trim();
        let parsed = match field.kind {
            FieldKind::Text => Some(FilterValue::Text(raw.to_string())),
            FieldKind::Integer => raw.parse().ok().map(FilterValue::Integer),
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FilterValue::Float),
            FieldKind::Boolean => match raw {
                "true" => Some(FilterValue::Boolean(true)),
                "false" => Some(FilterValue::Boolean(false)),
                _ => None,
            },
            FieldKind::Timestamp => parse_timestamp(raw).map(FilterValue::Timestamp),
            FieldKind::Uuid => Uuid::parse_str(raw).ok().map(FilterValue::Uuid),
        };

        parsed.ok_or_else(|| FeatureError::InvalidValue {
            field: field.name.to_string(),
            value: raw.to_string(),
        })
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            FilterValue::Text(v) => qb.push_bind(v.clone()),
            FilterValue::Integer(v) => qb.push_bind(*v),
            FilterValue::Float(v) => qb.push_bind(*v),
            FilterValue::Boolean(v) => qb.push_bind(*v),
            FilterValue::Timestamp(v) => qb.push_bind(*v),
            FilterValue::Uuid(v) => qb.push_bind(*v),
        };
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub op: Comparison,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Projects a serialised document. Inclusion always keeps `id`.
    pub fn apply(&self, document: Value) -> Value {
        let Value::Object(mut map) = document else {
            return document;
        };
        match self {
            Projection::All => {}
            Projection::Include(names) => {
                map.retain(|key, _| key == "id" || names.iter().any(|n| n == key));
            }
            Projection::Exclude(names) => {
                for name in names {
                    map.remove(name);
                }
            }
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: i64,
    pub limit: i64,
}

impl Window {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// A page of results together with the projection requested for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub projection: Projection,
}

impl<T> Listing<T> {
    pub fn new(items: Vec<T>, projection: Projection) -> Self {
        Self { items, projection }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        Listing {
            items: self.items.into_iter().map(f).collect(),
            projection: self.projection,
        }
    }
}

impl<T: Serialize> Listing<T> {
    pub fn into_documents(self) -> Result<Vec<Value>, serde_json::Error> {
        self.items
            .into_iter()
            .map(|item| serde_json::to_value(item).map(|doc| self.projection.apply(doc)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ApiFeatures {
    collection: &'static Collection,
    params: QueryParams,
    conditions: Vec<Condition>,
    sort: Vec<SortKey>,
    projection: Projection,
    window: Option<Window>,
}

impl ApiFeatures {
    pub fn new(collection: &'static Collection, params: QueryParams) -> Self {
        Self {
            collection,
            params,
            conditions: Vec::new(),
            sort: Vec::new(),
            projection: Projection::All,
            window: None,
        }
    }

    /// Applies every feature in the usual order.
    pub fn from_params(
        collection: &'static Collection,
        params: QueryParams,
    ) -> Result<Self, FeatureError> {
        Ok(Self::new(collection, params)
            .filter()?
            .sort()?
            .limit_fields()?
            .paginate())
    }

    pub fn collection(&self) -> &'static Collection {
        self.collection
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    fn field(&self, name: &str) -> Result<&'static Field, FeatureError> {
        self.collection
            .field(name)
            .ok_or_else(|| FeatureError::UnknownField(name.to_string()))
    }

    /// Turns every non-reserved parameter into a condition. `field=value` is
    /// equality, `field[op]=value` uses one of `gte`, `gt`, `lte`, `lt`.
    pub fn filter(mut self) -> Result<Self, FeatureError> {
        let mut conditions = Vec::new();
        for (key, raw) in &self.params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let (name, op) = match key.split_once('[') {
                None => (key.as_str(), Comparison::Eq),
                Some((name, rest)) => {
                    let op = rest
                        .strip_suffix(']')
                        .and_then(Comparison::from_operator)
                        .ok_or_else(|| FeatureError::UnknownOperator {
                            field: name.to_string(),
                            op: rest.trim_end_matches(']').to_string(),
                        })?;
                    (name, op)
                }
            };
            let field = self.field(name)?;
            conditions.push(Condition {
                column: field.column,
                op,
                value: FilterValue::parse(field, raw)?,
            });
        }
        self.conditions = conditions;
        Ok(self)
    }

    /// Comma separated, `-` prefix for descending. The id column is always
    /// appended so pages stay stable.
    pub fn sort(mut self) -> Result<Self, FeatureError> {
        let mut keys = Vec::new();
        match self.params.get("sort").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(keys_param) => {
                for part in keys_param.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let (name, descending) = match part.strip_prefix('-') {
                        Some(name) => (name, true),
                        None => (part, false),
                    };
                    keys.push(SortKey {
                        column: self.field(name)?.column,
                        descending,
                    });
                }
            }
            None => keys.push(SortKey {
                column: self.field(self.collection.default_sort)?.column,
                descending: true,
            }),
        }

        if !keys.iter().any(|k| k.column == self.collection.id_column) {
            keys.push(SortKey {
                column: self.collection.id_column,
                descending: false,
            });
        }
        self.sort = keys;
        Ok(self)
    }

    pub fn limit_fields(mut self) -> Result<Self, FeatureError> {
        let Some(names) = self.params.get("fields") else {
            self.projection = Projection::All;
            return Ok(self);
        };

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in names.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.strip_prefix('-') {
                Some(name) => exclude.push(name.to_string()),
                None => include.push(part.to_string()),
            }
        }

        self.projection = match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Projection::All,
            (false, true) => Projection::Include(include),
            (true, false) => Projection::Exclude(exclude),
            (false, false) => return Err(FeatureError::MixedProjection),
        };
        Ok(self)
    }

    /// Invalid or non-positive values fall back to the defaults.
    pub fn paginate(mut self) -> Self {
        let positive = |key: &str| {
            self.params
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
        };
        let page = positive("page").unwrap_or(DEFAULT_PAGE);
        let limit = positive("limit").unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

        self.window = Some(Window { page, limit });
        self
    }

    /// Appends the conditions, ordering and window to a query that already
    /// ends inside a `WHERE` clause.
    pub fn push_onto(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for condition in &self.conditions {
            qb.push(" AND ")
                .push(condition.column)
                .push(" ")
                .push(condition.op.as_sql())
                .push(" ");
            condition.value.push_bind(qb);
        }

        if !self.sort.is_empty() {
            qb.push(" ORDER BY ");
            let mut order = qb.separated(", ");
            for key in &self.sort {
                order.push(format!(
                    "{} {}",
                    key.column,
                    if key.descending { "DESC" } else { "ASC" }
                ));
            }
        }

        if let Some(window) = self.window {
            qb.push(" LIMIT ")
                .push_bind(window.limit)
                .push(" OFFSET ")
                .push_bind(window.offset());
        }
    }
}
