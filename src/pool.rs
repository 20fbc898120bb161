//! A bounded, in-process collection of finished queries.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use polars::prelude::*;
use uuid::Uuid;

use crate::error::{NaturwbError, Result};
use crate::geometry;
use crate::model::LanuId;
use crate::query::QueryOutcome;
use crate::schema::{layer, pool};

/// Land-use ids reported in the comparison frame. Id 1 is urban land.
const COMPARED_LANUS: [LanuId; 13] = [0, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

pub struct PooledQuery {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub outcome: QueryOutcome,
}

/// Keeps the newest `max_queries` outcomes, oldest first.
pub struct QueryPool {
    max_queries: usize,
    queries: VecDeque<PooledQuery>,
}

impl QueryPool {
    pub fn new(max_queries: usize) -> Self {
        Self {
            max_queries: max_queries.max(1),
            queries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Store an outcome, evicting the oldest entries beyond the limit.
    pub fn push(&mut self, outcome: QueryOutcome) -> Uuid {
        self.push_at(outcome, Utc::now())
    }

    pub fn push_at(&mut self, outcome: QueryOutcome, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.queries.push_back(PooledQuery {
            id,
            created_at,
            outcome,
        });
        while self.queries.len() > self.max_queries {
            if let Some(evicted) = self.queries.pop_front() {
                tracing::debug!(target: "naturwb::pool", id = %evicted.id, "pool.evicted");
            }
        }
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&PooledQuery> {
        self.queries.iter().find(|q| q.id == *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PooledQuery> {
        self.queries.iter()
    }

    /// Drop every query created before `now - max_age`. Returns the number dropped.
    pub fn evict_older_than(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return 0;
        };
        let before = self.queries.len();
        self.queries.retain(|q| q.created_at >= cutoff);
        let dropped = before - self.queries.len();
        if dropped > 0 {
            tracing::info!(target: "naturwb::pool", dropped, remaining = self.queries.len(), "pool.expired");
        }
        dropped
    }

    /// [`Self::evict_older_than`] with the age given in hours.
    pub fn evict_older_than_hours(&mut self, hours: i64, now: DateTime<Utc>) -> Result<usize> {
        let max_age = Duration::try_hours(hours)
            .ok_or_else(|| NaturwbError::InvalidData(format!("{hours} hours is out of range")))?;
        Ok(self.evict_older_than(max_age, now))
    }

    /// One row per query: id, timestamp, reference values, land-use shares and input WKT.
    pub fn comparing_frame(&self) -> Result<DataFrame> {
        let n = self.queries.len();
        let mut query_ids = Vec::with_capacity(n);
        let mut created = Vec::with_capacity(n);
        let mut inputs = Vec::with_capacity(n);
        let mut value_names: Vec<&'static str> = Vec::new();
        let mut values: Vec<Vec<f64>> = Vec::new();
        let mut lanus: Vec<Vec<f64>> = vec![Vec::with_capacity(n); COMPARED_LANUS.len()];

        for query in &self.queries {
            query_ids.push(query.id.to_string());
            created.push(query.created_at.to_rfc3339());
            inputs.push(geometry::to_wkt(&query.outcome.input));

            let named = query.outcome.reference().named_values();
            if value_names.is_empty() {
                value_names = named.iter().map(|(name, _)| *name).collect();
                values = vec![Vec::with_capacity(n); value_names.len()];
            }
            for (i, (_, value)) in named.into_iter().enumerate() {
                values[i].push(value);
            }

            let distribution = query.outcome.landuse_distribution();
            for (i, lanu) in COMPARED_LANUS.iter().enumerate() {
                lanus[i].push(distribution.get(lanu).copied().unwrap_or(0.0));
            }
        }

        let mut columns = vec![
            Column::new(pool::QUERY_ID.into(), &query_ids),
            Column::new(pool::CREATED_AT.into(), &created),
        ];
        columns.extend(
            value_names
                .iter()
                .zip(&values)
                .map(|(name, v)| Column::new((*name).into(), v)),
        );
        columns.extend(COMPARED_LANUS.iter().zip(&lanus).map(|(lanu, v)| {
            Column::new(format!("{}{lanu}", pool::LANU_PREFIX).into(), v)
        }));
        columns.push(Column::new(layer::GEOMETRY.into(), &inputs));
        Ok(DataFrame::new(columns)?)
    }
}
