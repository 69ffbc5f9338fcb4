//! Identity resolution — which enrolled person does this face belong to?
//!
//! The stored reference embeddings are authoritative: a close database
//! match wins over the locally cached id. The cache only decides when no
//! stored embedding is close enough, and is overwritten with every
//! confident answer so it converges on the database.
//!
//! Two agents sharing a database can race on enrollment and mint two
//! records for one person. That is tolerated: whichever record matches
//! first on a later cycle becomes the cached id on both machines.

use crate::collab::{CollabError, IdentityCache, PersonStore};
use crate::types::{new_person_id, Embedding, Origin, PersonId};
use thiserror::Error;

/// Default cosine-distance threshold for "same person".
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.30;

#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("nothing to resolve: no cached id and no embedding")]
    NothingToResolve,
    #[error("embedding dimension mismatch for {id}: stored {stored}, current {current}")]
    DimensionMismatch {
        id: PersonId,
        stored: usize,
        current: usize,
    },
    #[error("person store: {0}")]
    Store(#[from] CollabError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: PersonId,
    pub origin: Origin,
    /// Distance to the embedding that decided the match, when one did.
    pub distance: Option<f32>,
}

/// Resolves faces against a [`PersonStore`], keeping an [`IdentityCache`] in sync.
pub struct IdentityResolver<S, C> {
    store: S,
    cache: C,
}

impl<S: PersonStore, C: IdentityCache> IdentityResolver<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    /// Read the cached id, treating a read failure as "no prior identity".
    pub fn cached_id(&mut self) -> Option<PersonId> {
        match self.cache.read() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "local identity cache unreadable; starting without identity");
                None
            }
        }
    }

    pub fn load_reference(&mut self, id: &str) -> Result<Option<Embedding>, CollabError> {
        self.store.load_embedding(id)
    }

    /// Store `embedding` as the reference for `id`, replacing any previous one.
    pub fn set_reference(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError> {
        self.store.upsert_embedding(id, embedding)
    }

    /// Decide who `current` belongs to.
    ///
    /// With no embedding the cached id is reused as-is. Otherwise the
    /// nearest stored embedding within `threshold` wins, then the cached
    /// id's own reference, and failing both a new person is enrolled.
    pub fn resolve(
        &mut self,
        local: Option<&str>,
        current: Option<&Embedding>,
        threshold: f32,
    ) -> Result<Resolution, ResolveError> {
        let Some(current) = current else {
            return match local {
                Some(id) => Ok(Resolution {
                    id: id.to_string(),
                    origin: Origin::LocalNoReference,
                    distance: None,
                }),
                None => Err(ResolveError::NothingToResolve),
            };
        };

        if let Some((id, distance)) = self.nearest(current)? {
            if distance <= threshold {
                self.remember(&id);
                return Ok(Resolution {
                    id,
                    origin: Origin::DbMatch,
                    distance: Some(distance),
                });
            }
            tracing::debug!(nearest = %id, distance, threshold, "no stored embedding within threshold");
        }

        if let Some(local) = local {
            match self.store.load_embedding(local)? {
                Some(reference) => {
                    check_dim(local, &reference, current)?;
                    let distance = reference.distance(current);
                    if distance <= threshold {
                        self.remember(local);
                        return Ok(Resolution {
                            id: local.to_string(),
                            origin: Origin::LocalValid,
                            distance: Some(distance),
                        });
                    }
                    tracing::info!(
                        local_id = local,
                        distance,
                        threshold,
                        "face does not match cached identity"
                    );
                }
                None => {
                    self.remember(local);
                    return Ok(Resolution {
                        id: local.to_string(),
                        origin: Origin::LocalNoReference,
                        distance: None,
                    });
                }
            }
        }

        let id = new_person_id();
        self.store.upsert_embedding(&id, current)?;
        self.remember(&id);
        tracing::info!(person_id = %id, "enrolled new identity");
        Ok(Resolution {
            id,
            origin: Origin::NewIdentity,
            distance: None,
        })
    }

    /// Minimum-distance stored embedding. Ties keep the first one listed.
    fn nearest(&mut self, current: &Embedding) -> Result<Option<(PersonId, f32)>, ResolveError> {
        let mut best: Option<(PersonId, f32)> = None;
        for (id, stored) in self.store.list_embeddings()? {
            check_dim(&id, &stored, current)?;
            let distance = stored.distance(current);
            if best.as_ref().map_or(true, |(_, d)| distance < *d) {
                best = Some((id, distance));
            }
        }
        Ok(best)
    }

    fn remember(&mut self, id: &str) {
        if let Err(e) = self.cache.write(id) {
            tracing::warn!(person_id = id, error = %e, "failed to write local identity cache");
        }
    }
}

/// Mixed dimensions mean a model changed under us; never compare them.
fn check_dim(id: &str, stored: &Embedding, current: &Embedding) -> Result<(), ResolveError> {
    debug_assert_eq!(
        stored.dim(),
        current.dim(),
        "embedding dimension mismatch for person {id}"
    );
    if stored.dim() != current.dim() {
        return Err(ResolveError::DimensionMismatch {
            id: id.to_string(),
            stored: stored.dim(),
            current: current.dim(),
        });
    }
    Ok(())
}
