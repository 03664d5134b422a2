//! Version numbering and number-collision resolution
//!
//! Up-versioning needs two things at once: the next (major, minor) pair
//! within the family and a globally unique composite number. Both are probed
//! here against a read snapshot and re-asserted by commit guards inside the
//! transaction that inserts the new document, so racing allocations for one
//! family cannot both land.

use std::collections::HashSet;
use std::sync::Arc;
use vellum_store::DocumentStore;
use vellum_types::{Document, LifecycleError, LifecycleResult, VersionNumber};

/// Probe ladder length: three plain version rungs, then suffixed numbers.
/// Running out is a consistency defect, not a normal user outcome.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 10;

/// A version and number pair this allocator found free.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedVersion {
    pub version: VersionNumber,
    pub number: String,
}

pub struct VersionAllocator {
    store: Arc<dyn DocumentStore>,
}

impl VersionAllocator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Next version for the requested increment, with both components capped.
    fn next_version(source: &Document, major_increment: bool) -> LifecycleResult<VersionNumber> {
        let current = source.version;
        let next = if major_increment {
            VersionNumber::new(current.major + 1, 0)
        } else {
            VersionNumber::new(current.major, current.minor + 1)
        };
        if !next.within_bounds() {
            return Err(LifecycleError::NumberingExhausted(format!(
                "family {} has exhausted its {} version space at {}",
                source.base_number,
                if major_increment { "major" } else { "minor" },
                current
            )));
        }
        Ok(next)
    }

    /// Finds a free (version, number) pair for the next version of `source`.
    ///
    /// Collisions are probed in a fixed ladder: the computed version, then
    /// minor+1, then major+1 with minor reset, then the same version with a
    /// short unique suffix on the number. The ladder aborts after
    /// [`MAX_ALLOCATION_ATTEMPTS`] probes.
    pub async fn allocate(
        &self,
        source: &Document,
        major_increment: bool,
    ) -> LifecycleResult<AllocatedVersion> {
        let candidate = Self::next_version(source, major_increment)?;

        let family = self.store.list_family(&source.family_id).await?;
        let taken: HashSet<VersionNumber> = family.iter().map(|d| d.version).collect();

        let mut rungs = vec![candidate];
        let minor_bump = VersionNumber::new(candidate.major, candidate.minor + 1);
        if minor_bump.within_bounds() {
            rungs.push(minor_bump);
        }
        let major_bump = VersionNumber::new(candidate.major + 1, 0);
        if major_bump.within_bounds() {
            rungs.push(major_bump);
        }

        let mut attempts = 0usize;
        for version in &rungs {
            attempts += 1;
            let number = format!("{}-{}", source.base_number, version.tag());
            if !taken.contains(version) && !self.store.document_number_exists(&number).await? {
                tracing::debug!(number = %number, attempts, "Allocated version");
                return Ok(AllocatedVersion {
                    version: *version,
                    number,
                });
            }
        }

        // Suffix stage: keep the first version the family does not use and
        // vary only the number. A version collision cannot be fixed by a
        // suffix, so if every rung is taken we fall through to the abort.
        if let Some(version) = rungs.iter().copied().find(|v| !taken.contains(v)) {
            while attempts < MAX_ALLOCATION_ATTEMPTS {
                attempts += 1;
                let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..6].to_string();
                let number = format!("{}-{}-{}", source.base_number, version.tag(), suffix);
                if !self.store.document_number_exists(&number).await? {
                    tracing::warn!(number = %number, attempts, "Allocated version with collision suffix");
                    return Ok(AllocatedVersion { version, number });
                }
            }
        }

        tracing::error!(
            family_id = %source.family_id,
            base_number = %source.base_number,
            attempts,
            "Number allocation did not converge"
        );
        Err(LifecycleError::NumberingExhausted(format!(
            "number allocation for family {} did not converge after {} attempts",
            source.base_number, attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_store::memory::InMemoryDocumentStore;
    use vellum_types::{ActorId, FamilyId};

    fn make_source(major: u32, minor: u32) -> Document {
        let mut doc = Document::new(
            FamilyId::generate(),
            "SOP-014",
            "Equipment Cleaning",
            ActorId::new("alice"),
        );
        doc.version = VersionNumber::new(major, minor);
        doc.number = format!("SOP-014-{}", doc.version.tag());
        doc
    }

    fn make_sibling(source: &Document, major: u32, minor: u32) -> Document {
        let mut doc = source.clone();
        doc.id = vellum_types::DocumentId::generate();
        doc.version = VersionNumber::new(major, minor);
        doc.number = format!("SOP-014-{}", doc.version.tag());
        doc
    }

    fn make_foreign(number: &str) -> Document {
        let mut doc = Document::new(
            FamilyId::generate(),
            "SOP-014",
            "Unrelated",
            ActorId::new("zed"),
        );
        doc.number = number.to_string();
        doc
    }

    #[tokio::test]
    async fn minor_and_major_increments() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let source = make_source(1, 3);
        store.seed_document(source.clone()).unwrap();
        let allocator = VersionAllocator::new(store);

        let minor = allocator.allocate(&source, false).await.unwrap();
        assert_eq!(minor.version, VersionNumber::new(1, 4));
        assert_eq!(minor.number, "SOP-014-v01.04");

        let major = allocator.allocate(&source, true).await.unwrap();
        assert_eq!(major.version, VersionNumber::new(2, 0));
        assert_eq!(major.number, "SOP-014-v02.00");
    }

    #[tokio::test]
    async fn caps_exhaust_the_version_space() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let allocator = VersionAllocator::new(store.clone());

        let minor_capped = make_source(1, 99);
        store.seed_document(minor_capped.clone()).unwrap();
        let err = allocator.allocate(&minor_capped, false).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NumberingExhausted(_)));

        let major_capped = make_source(99, 0);
        store.seed_document(major_capped.clone()).unwrap();
        let err = allocator.allocate(&major_capped, true).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NumberingExhausted(_)));
    }

    #[tokio::test]
    async fn version_collisions_climb_the_ladder() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let source = make_source(1, 0);
        store.seed_document(source.clone()).unwrap();
        store.seed_document(make_sibling(&source, 1, 1)).unwrap();
        let allocator = VersionAllocator::new(store.clone());

        // (1,1) taken, first retry is minor+1.
        let allocated = allocator.allocate(&source, false).await.unwrap();
        assert_eq!(allocated.version, VersionNumber::new(1, 2));

        // (1,2) also taken, next rung resets to the following major.
        store.seed_document(make_sibling(&source, 1, 2)).unwrap();
        let allocated = allocator.allocate(&source, false).await.unwrap();
        assert_eq!(allocated.version, VersionNumber::new(2, 0));
    }

    #[tokio::test]
    async fn foreign_number_collisions_fall_back_to_suffix() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let source = make_source(1, 0);
        store.seed_document(source.clone()).unwrap();
        // Another family occupies every plain number on the ladder.
        store.seed_document(make_foreign("SOP-014-v01.01")).unwrap();
        store.seed_document(make_foreign("SOP-014-v01.02")).unwrap();
        store.seed_document(make_foreign("SOP-014-v02.00")).unwrap();
        let allocator = VersionAllocator::new(store);

        let allocated = allocator.allocate(&source, false).await.unwrap();
        assert_eq!(allocated.version, VersionNumber::new(1, 1));
        assert!(allocated.number.starts_with("SOP-014-v01.01-"));
        assert_eq!(allocated.number.len(), "SOP-014-v01.01-".len() + 6);
    }
}
