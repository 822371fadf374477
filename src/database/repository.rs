use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::scoped::{ClinicScoped, IsolationPredicate, SYSTEM_FIELDS};
use crate::filter::{FilterData, FilterError};
use crate::store::{RecordStore, StoreError};
use crate::tenancy::TenantContext;

/// Data access for one entity type, bound to one request's context.
///
/// The predicate is fixed at construction and passed to every store call, so
/// nothing built on top of this type can issue an unfiltered query.
pub struct ScopedRepository<T: ClinicScoped> {
    store: Arc<dyn RecordStore<T>>,
    predicate: IsolationPredicate,
}

impl<T: ClinicScoped> ScopedRepository<T> {
    pub fn new(store: Arc<dyn RecordStore<T>>, ctx: &TenantContext) -> Self {
        Self {
            store,
            predicate: IsolationPredicate::for_context(ctx),
        }
    }

    /// Cross-tenant repository for internal callers. Soft-deleted rows stay hidden.
    pub fn privileged(store: Arc<dyn RecordStore<T>>) -> Self {
        Self {
            store,
            predicate: IsolationPredicate::privileged(),
        }
    }

    pub fn predicate(&self) -> IsolationPredicate {
        self.predicate
    }

    /// Ordering may only name columns of `T`.
    pub async fn list(&self, filter: FilterData) -> Result<Vec<T>, StoreError> {
        let page = filter.page()?;
        if let Some(unknown) = page.order.iter().find(|o| !T::COLUMNS.contains(&o.column.as_str())) {
            return Err(FilterError::UnknownOrderColumn {
                entity: T::LABEL,
                column: unknown.column.clone(),
            }
            .into());
        }
        self.store.select(&self.predicate, &filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<T, StoreError> {
        self.store
            .select_one(&self.predicate, id)
            .await?
            .ok_or_else(|| not_found::<T>(id))
    }

    pub async fn create(&self, draft: T::Draft) -> Result<T, StoreError> {
        let tenant_id = self.predicate.tenant_id().ok_or(StoreError::OutOfScope)?;
        let record = T::from_draft(draft, tenant_id, Utc::now())?;
        self.store.insert(&self.predicate, record).await
    }

    /// Merge `changes` into the visible row and write it back.
    pub async fn update(&self, id: Uuid, changes: Map<String, Value>) -> Result<T, StoreError> {
        if let Some(field) = changes.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
            return Err(StoreError::SystemField(field.clone()));
        }

        let current = self.get(id).await?;
        let mut merged = match serde_json::to_value(&current)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::Invalid(format!("{} is not an object", T::LABEL))),
        };
        for (key, value) in changes {
            if !merged.contains_key(&key) {
                return Err(StoreError::Invalid(format!("Unknown {} field: {}", T::LABEL, key)));
            }
            merged.insert(key, value);
        }

        let mut updated: T = serde_json::from_value(Value::Object(merged))
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        updated.touch(Utc::now());
        updated.validate()?;

        self.store
            .replace(&self.predicate, updated)
            .await?
            .ok_or_else(|| not_found::<T>(id))
    }

    /// Flag the row as deleted. It stays in storage but disappears from every
    /// scoped read.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        if self.store.soft_delete(&self.predicate, id).await? {
            Ok(())
        } else {
            Err(not_found::<T>(id))
        }
    }
}

fn not_found<T: ClinicScoped>(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("{} {} not found", T::LABEL, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::auth::{Identity, Role};
    use crate::database::models::{Patient, PatientDraft};
    use crate::store::memory::MemoryStore;

    fn ctx(tenant: Option<Uuid>) -> TenantContext {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Receptionist,
            tenant_claim: None,
        };
        let ctx = TenantContext::for_identity(&identity);
        match tenant {
            Some(t) => ctx.with_tenant(t).unwrap(),
            None => ctx,
        }
    }

    fn draft(first: &str) -> PatientDraft {
        PatientDraft {
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: None,
            phone: None,
            email: None,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn create_stamps_context_tenant() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        let repo = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(tenant)));

        let patient = repo.create(draft("Jane")).await.unwrap();
        assert_eq!(patient.tenant_id, tenant);
        assert_eq!(repo.get(patient.id).await.unwrap(), patient);
    }

    #[tokio::test]
    async fn create_without_tenant_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let repo = ScopedRepository::<Patient>::new(store, &ctx(None));

        assert!(matches!(repo.create(draft("Jane")).await, Err(StoreError::OutOfScope)));
    }

    #[tokio::test]
    async fn foreign_rows_are_invisible_to_every_operation() {
        let store = Arc::new(MemoryStore::new());
        let owner = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(Uuid::new_v4())));
        let stranger = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(Uuid::new_v4())));
        let patient = owner.create(draft("Jane")).await.unwrap();

        assert!(matches!(stranger.get(patient.id).await, Err(StoreError::NotFound(_))));
        assert!(stranger.list(FilterData::default()).await.unwrap().is_empty());
        assert!(matches!(
            stranger.update(patient.id, object(json!({"phone": "555"}))).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(stranger.soft_delete(patient.id).await, Err(StoreError::NotFound(_))));

        // untouched for the owner
        assert_eq!(owner.get(patient.id).await.unwrap().phone, None);
    }

    #[tokio::test]
    async fn update_rejects_system_and_unknown_fields() {
        let store = Arc::new(MemoryStore::new());
        let repo = ScopedRepository::<Patient>::new(store, &ctx(Some(Uuid::new_v4())));
        let patient = repo.create(draft("Jane")).await.unwrap();

        let moved = repo
            .update(patient.id, object(json!({"tenant_id": Uuid::new_v4()})))
            .await;
        assert!(matches!(moved, Err(StoreError::SystemField(f)) if f == "tenant_id"));

        let unknown = repo.update(patient.id, object(json!({"shoe_size": 42}))).await;
        assert!(matches!(unknown, Err(StoreError::Invalid(_))));

        let updated = repo
            .update(patient.id, object(json!({"phone": "555-0100"})))
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.tenant_id, patient.tenant_id);
    }

    #[tokio::test]
    async fn soft_delete_hides_row_but_keeps_it_stored() {
        let store = Arc::new(MemoryStore::new());
        let repo = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(Uuid::new_v4())));
        let patient = repo.create(draft("Jane")).await.unwrap();

        repo.soft_delete(patient.id).await.unwrap();

        assert!(matches!(repo.get(patient.id).await, Err(StoreError::NotFound(_))));
        assert!(repo.list(FilterData::default()).await.unwrap().is_empty());
        assert!(matches!(repo.soft_delete(patient.id).await, Err(StoreError::NotFound(_))));

        let stored: Vec<Patient> = store.stored_records().await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_deleted);
    }

    #[tokio::test]
    async fn privileged_repository_sees_all_live_rows() {
        let store = Arc::new(MemoryStore::new());
        let a = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(Uuid::new_v4())));
        let b = ScopedRepository::<Patient>::new(store.clone(), &ctx(Some(Uuid::new_v4())));
        a.create(draft("Ann")).await.unwrap();
        let gone = b.create(draft("Bob")).await.unwrap();
        b.create(draft("Cy")).await.unwrap();
        b.soft_delete(gone.id).await.unwrap();

        let all = ScopedRepository::<Patient>::privileged(store)
            .list(FilterData::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn ordering_by_unknown_column_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let repo = ScopedRepository::<Patient>::new(store, &ctx(Some(Uuid::new_v4())));
        repo.create(draft("Jane")).await.unwrap();

        let unknown = FilterData {
            order: Some("shoe_size".to_string()),
            ..FilterData::default()
        };
        assert!(matches!(
            repo.list(unknown).await,
            Err(StoreError::Filter(FilterError::UnknownOrderColumn { column, .. })) if column == "shoe_size"
        ));

        let known = FilterData {
            order: Some("last_name desc".to_string()),
            ..FilterData::default()
        };
        assert_eq!(repo.list(known).await.unwrap().len(), 1);
    }

    #[test]
    fn declared_columns_match_serialized_fields() {
        use crate::database::models::{Appointment, AppointmentDraft};

        fn keys<T: ClinicScoped>(row: &T) -> Vec<String> {
            let mut keys: Vec<String> = match serde_json::to_value(row).unwrap() {
                Value::Object(map) => map.keys().cloned().collect(),
                _ => vec![],
            };
            keys.sort();
            keys
        }
        fn columns<T: ClinicScoped>() -> Vec<String> {
            let mut columns: Vec<String> = T::COLUMNS.iter().map(|c| c.to_string()).collect();
            columns.sort();
            columns
        }

        let patient = Patient::from_draft(draft("Jane"), Uuid::new_v4(), Utc::now()).unwrap();
        let appointment = Appointment::from_draft(
            AppointmentDraft {
                patient_id: patient.id,
                doctor_id: None,
                scheduled_at: Utc::now(),
                duration_minutes: 30,
                reason: None,
            },
            patient.tenant_id,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(keys(&patient), columns::<Patient>());
        assert_eq!(keys(&appointment), columns::<Appointment>());
    }
}
