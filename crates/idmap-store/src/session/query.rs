//! Query builder over one entity type

use std::marker::PhantomData;
use std::time::Instant;

use idmap_core::errors::{ExError, ExErrorKind};
use idmap_core::model::{Entity, Filter};
use idmap_core::tracking::{EntityRef, MergeOption};
use idmap_core::{log_op_end, log_op_error, log_op_start};

use crate::errors::Result;
use crate::session::Session;

/// A pending query; nothing touches the store until a terminal method runs
///
/// Rows come back ordered by key. How they are reconciled with the session
/// cache depends on the merge option, `AppendOnly` unless set.
pub struct Query<'s, E: Entity> {
    session: &'s mut Session,
    filter: Filter,
    merge: MergeOption,
    _entity: PhantomData<E>,
}

impl<'s, E: Entity> Query<'s, E> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            filter: Filter::All,
            merge: MergeOption::default(),
            _entity: PhantomData,
        }
    }

    /// Narrow the query; repeated calls are conjoined
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = match self.filter {
            Filter::All => filter,
            current => current.and(filter),
        };
        self
    }

    pub fn merge(mut self, merge: MergeOption) -> Self {
        self.merge = merge;
        self
    }

    /// Read straight from the store, bypassing the cache both ways
    pub fn no_tracking(self) -> Self {
        self.merge(MergeOption::NoTracking)
    }

    /// # Errors
    ///
    /// `InvalidInput` for unknown filter columns, `Persistence` on SQLite
    /// failure, `Serialization` if a row cannot be materialised.
    pub fn to_list(self) -> Result<Vec<EntityRef<E>>> {
        let session_id = self.session.id().clone();
        log_op_start!(
            "query",
            session_id = %session_id,
            entity_type = E::ENTITY_TYPE,
            merge = ?self.merge
        );
        let start = Instant::now();

        let results = self
            .session
            .execute::<E>(&self.filter, self.merge)
            .map_err(|e| {
                let e = e.with_session_id(session_id.clone());
                log_op_error!(
                    "query",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "query",
            duration_ms = start.elapsed().as_millis() as u64,
            rows = results.len(),
            tracked = self.session.tracked_count()
        );
        Ok(results)
    }

    /// First matching entity
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing matches, otherwise as for [`Query::to_list`].
    pub fn first(self) -> Result<EntityRef<E>> {
        let filter = self.filter.clone();
        self.first_or_default()?.ok_or_else(|| {
            let err = ExError::new(ExErrorKind::NotFound)
                .with_op("first")
                .with_entity_type(E::ENTITY_TYPE)
                .with_message(format!("no {} matches {:?}", E::ENTITY_TYPE, filter));
            match filter.single_key() {
                Some(id) => err.with_entity_id(id),
                None => err,
            }
        })
    }

    /// First matching entity, or `None`
    ///
    /// # Errors
    ///
    /// As for [`Query::to_list`].
    pub fn first_or_default(self) -> Result<Option<EntityRef<E>>> {
        Ok(self.to_list()?.into_iter().next())
    }

    /// Number of matching rows, counted by the store
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unknown filter columns, `Persistence` on SQLite
    /// failure.
    pub fn count(self) -> Result<u64> {
        self.session.count::<E>(&self.filter)
    }
}
