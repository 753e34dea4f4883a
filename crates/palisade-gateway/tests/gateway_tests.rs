use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use palisade_core::{
    hash_credential, BackendProvider, BackendStatus, CoreError, CoreResult, DefaultRule,
    EntityBackend, EntityProfile, EnvironmentProfile, FieldKind, FieldProfile, FilterMask,
    ProfileRegistry, Record,
};
use palisade_gateway::{default_catalog, CallOptions, EntityGateway};
use palisade_store::MemoryBackend;

fn widget_profile() -> EntityProfile {
    EntityProfile::new("widget")
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("name", FieldKind::Str).required())
}

fn ticket_profile() -> EntityProfile {
    EntityProfile::new("ticket")
        .keep_deleted(true)
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("title", FieldKind::Str).required())
        .with_field(
            FieldProfile::new("status", FieldKind::Str)
                .post_default(DefaultRule::constant(json!("open")))
                .delete_default(DefaultRule::constant(json!("closed"))),
        )
}

fn vault_profile() -> EntityProfile {
    EntityProfile::new("vault")
        .obfuscate("secret", "base64")
        .deobfuscate("secret", "base64")
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("secret", FieldKind::Text))
}

async fn setup_gateway(entities: Vec<EntityProfile>) -> EntityGateway {
    EntityGateway::connect(
        entities,
        [],
        [EnvironmentProfile::new("volatile", "memory")],
        default_catalog(),
    )
    .await
    .expect("failed to connect gateway")
}

fn record(value: Value) -> Record {
    Record::from_value(value).expect("record literal")
}

fn mask(gateway: &EntityGateway, field: &str, value: Value) -> FilterMask {
    FilterMask::new([(field, "==", value)], gateway.registry().vocabulary())
        .expect("failed to build mask")
}

fn id_mask(gateway: &EntityGateway, id: i64) -> FilterMask {
    mask(gateway, "id", json!(id))
}

#[tokio::test]
async fn post_get_patch_delete_round_trip() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    let created = gateway
        .post("widget", record(json!({"name": "a"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");
    assert_eq!(created.get("id"), Some(&json!(1)));
    assert_eq!(created.get("name"), Some(&json!("a")));

    let fetched = gateway
        .get("widget", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("get failed")
        .expect("widget missing");
    assert_eq!(fetched, created);

    let patched = gateway
        .patch(
            "widget",
            &[id_mask(&gateway, 1)],
            record(json!({"name": "b"})),
            &options,
        )
        .await
        .expect("patch failed")
        .expect("patch matched nothing");
    assert_eq!(patched.get("id"), Some(&json!(1)));
    assert_eq!(patched.get("name"), Some(&json!("b")));

    let removed = gateway
        .delete("widget", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("delete failed")
        .expect("delete matched nothing");
    assert_eq!(removed.get("name"), Some(&json!("b")));

    let gone = gateway
        .get("widget", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("get after delete failed");
    assert!(gone.is_none());
}

#[tokio::test]
async fn patch_applies_idempotently() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    gateway
        .post("widget", record(json!({"name": "a"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");

    let first = gateway
        .patch(
            "widget",
            &[id_mask(&gateway, 1)],
            record(json!({"name": "b"})),
            &options,
        )
        .await
        .expect("first patch failed")
        .expect("first patch matched nothing");
    let second = gateway
        .patch(
            "widget",
            &[id_mask(&gateway, 1)],
            record(json!({"name": "b"})),
            &options,
        )
        .await
        .expect("second patch failed")
        .expect("second patch matched nothing");
    assert_eq!(first, second);
}

#[tokio::test]
async fn get_all_returns_every_match() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    for name in ["a", "b", "a"] {
        gateway
            .post("widget", record(json!({"name": name})), &options)
            .await
            .expect("post failed")
            .expect("post returned nothing");
    }

    let named_a = gateway
        .get_all("widget", &[mask(&gateway, "name", json!("a"))], &options)
        .await
        .expect("get_all failed");
    assert_eq!(named_a.len(), 2);

    let everything = gateway
        .get_all("widget", &[], &options)
        .await
        .expect("unfiltered get_all failed");
    assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn unknown_entity_type_is_rejected() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    let result = gateway.get("ghost", &[], &options).await;
    assert!(matches!(result, Err(CoreError::UnknownEntityType { .. })));
}

#[tokio::test]
async fn undeclared_mask_field_is_rejected() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    let stray = mask(&gateway, "color", json!("red"));
    let result = gateway.get("widget", &[stray], &options).await;
    assert!(matches!(result, Err(CoreError::FieldNotFound { .. })));
}

#[tokio::test]
async fn batch_reads_drop_misses() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    for name in ["a", "b"] {
        gateway
            .post("widget", record(json!({"name": name})), &options)
            .await
            .expect("post failed")
            .expect("post returned nothing");
    }

    let found = gateway
        .get_batch(
            "widget",
            &[
                vec![id_mask(&gateway, 1)],
                vec![id_mask(&gateway, 99)],
                vec![id_mask(&gateway, 2)],
            ],
            &options,
        )
        .await
        .expect("get_batch failed");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].get("name"), Some(&json!("a")));
    assert_eq!(found[1].get("name"), Some(&json!("b")));
}

#[tokio::test]
async fn batch_writes_skip_unmatched_selectors() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    let posted = gateway
        .post_batch(
            "widget",
            vec![
                record(json!({"name": "a"})),
                record(json!({"name": "b"})),
            ],
            &options,
        )
        .await
        .expect("post_batch failed");
    assert_eq!(posted.len(), 2);

    let patched = gateway
        .patch_batch(
            "widget",
            &[vec![id_mask(&gateway, 1)], vec![id_mask(&gateway, 99)]],
            vec![
                record(json!({"name": "a2"})),
                record(json!({"name": "missing"})),
            ],
            &options,
        )
        .await
        .expect("patch_batch failed");
    assert_eq!(patched.len(), 1);
    assert_eq!(patched[0].get("name"), Some(&json!("a2")));

    let deleted = gateway
        .delete_batch(
            "widget",
            &[vec![id_mask(&gateway, 99)], vec![id_mask(&gateway, 2)]],
            &options,
        )
        .await
        .expect("delete_batch failed");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].get("name"), Some(&json!("b")));
}

#[tokio::test]
async fn patch_batch_requires_matching_lengths() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    let result = gateway
        .patch_batch(
            "widget",
            &[vec![id_mask(&gateway, 1)]],
            vec![
                record(json!({"name": "a"})),
                record(json!({"name": "b"})),
            ],
            &options,
        )
        .await;
    assert!(matches!(result, Err(CoreError::Validation { .. })));
}

#[tokio::test]
async fn soft_delete_marks_and_hides() {
    let gateway = setup_gateway(vec![ticket_profile()]).await;
    let options = CallOptions::new();

    let created = gateway
        .post("ticket", record(json!({"title": "leaky pipe"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");
    assert_eq!(created.get("status"), Some(&json!("open")));

    let marked = gateway
        .delete("ticket", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("delete failed")
        .expect("delete matched nothing");
    assert_eq!(marked.get("status"), Some(&json!("closed")));

    let hidden = gateway
        .get("ticket", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("get failed");
    assert!(hidden.is_none());

    let revealed = gateway
        .get(
            "ticket",
            &[id_mask(&gateway, 1)],
            &CallOptions::new().include_inactive(),
        )
        .await
        .expect("inclusive get failed")
        .expect("marked ticket missing");
    assert_eq!(revealed.get("status"), Some(&json!("closed")));

    let again = gateway
        .delete("ticket", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("second delete failed");
    assert!(again.is_none());
}

#[tokio::test]
async fn force_delete_removes_marked_records() {
    let gateway = setup_gateway(vec![ticket_profile()]).await;
    let options = CallOptions::new();

    gateway
        .post("ticket", record(json!({"title": "leaky pipe"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");
    gateway
        .delete("ticket", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("soft delete failed")
        .expect("soft delete matched nothing");

    let purging = CallOptions::new().include_inactive().force_delete();
    let purged = gateway
        .delete("ticket", &[id_mask(&gateway, 1)], &purging)
        .await
        .expect("force delete failed")
        .expect("force delete matched nothing");
    assert_eq!(purged.get("id"), Some(&json!(1)));

    let gone = gateway
        .get(
            "ticket",
            &[id_mask(&gateway, 1)],
            &CallOptions::new().include_inactive(),
        )
        .await
        .expect("get after purge failed");
    assert!(gone.is_none());
}

#[tokio::test]
async fn obfuscated_fields_round_trip_transparently() {
    let gateway = setup_gateway(vec![vault_profile()]).await;
    let options = CallOptions::new();

    let created = gateway
        .post("vault", record(json!({"secret": "hush"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");
    assert_eq!(created.get("secret"), Some(&json!("hush")));

    let by_secret = gateway
        .get("vault", &[mask(&gateway, "secret", json!("hush"))], &options)
        .await
        .expect("get failed")
        .expect("vault entry missing");
    assert_eq!(by_secret.get("id"), created.get("id"));
}

#[tokio::test]
async fn obfuscation_without_reversal_exposes_stored_form() {
    let sealed = EntityProfile::new("sealed")
        .obfuscate("secret", "base64")
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("secret", FieldKind::Text));
    let gateway = setup_gateway(vec![sealed]).await;
    let options = CallOptions::new();

    let created = gateway
        .post("sealed", record(json!({"secret": "hush"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");
    assert_eq!(created.get("secret"), Some(&json!("aHVzaA==")));
}

#[derive(Clone, Default)]
struct CountingBackend {
    inner: MemoryBackend,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EntityBackend for CountingBackend {
    async fn prepare(&self, registry: Arc<ProfileRegistry>) -> CoreResult<()> {
        self.inner.prepare(registry).await
    }

    async fn fetch_first(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_first(entity_type, masks).await
    }

    async fn fetch_all(&self, entity_type: &str, masks: &[FilterMask]) -> CoreResult<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all(entity_type, masks).await
    }

    async fn insert(&self, entity_type: &str, record: Record) -> CoreResult<Record> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(entity_type, record).await
    }

    async fn update(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
        patch: Record,
    ) -> CoreResult<Option<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(entity_type, masks, patch).await
    }

    async fn remove(&self, entity_type: &str, masks: &[FilterMask]) -> CoreResult<Option<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(entity_type, masks).await
    }

    async fn status(&self) -> CoreResult<BackendStatus> {
        self.inner.status().await
    }
}

struct CountingProvider(CountingBackend);

#[async_trait]
impl BackendProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn open(
        &self,
        _environment: &EnvironmentProfile,
        registry: Arc<ProfileRegistry>,
    ) -> CoreResult<Arc<dyn EntityBackend>> {
        let backend = self.0.clone();
        backend.prepare(registry).await?;
        Ok(Arc::new(backend))
    }
}

#[tokio::test]
async fn wrong_credential_never_reaches_the_backend() {
    let backend = CountingBackend::default();
    let mut catalog = default_catalog();
    catalog.register_backend(Arc::new(CountingProvider(backend.clone())));

    let secured = EntityProfile::new("contract")
        .authorize(hash_credential("sesame"))
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("name", FieldKind::Str).required());

    let gateway = EntityGateway::connect(
        [secured],
        [],
        [EnvironmentProfile::new("guarded", "counting")],
        catalog,
    )
    .await
    .expect("failed to connect gateway");

    let wrong = CallOptions::new().with_credential("guess");
    let denied = gateway
        .get("contract", &[], &wrong)
        .await
        .expect("denied get failed");
    assert!(denied.is_none());

    let denied_post = gateway
        .post("contract", record(json!({"name": "nda"})), &wrong)
        .await
        .expect("denied post failed");
    assert!(denied_post.is_none());

    let denied_batch = gateway
        .get_batch("contract", &[vec![], vec![], vec![]], &wrong)
        .await
        .expect("denied get_batch failed");
    assert!(denied_batch.is_empty());

    let missing = gateway
        .get("contract", &[], &CallOptions::new())
        .await
        .expect("credential-less get failed");
    assert!(missing.is_none());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let granted = CallOptions::new().with_credential("sesame");
    let created = gateway
        .post("contract", record(json!({"name": "nda"})), &granted)
        .await
        .expect("authorized post failed")
        .expect("authorized post returned nothing");
    assert_eq!(created.get("id"), Some(&json!(1)));
    assert!(backend.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn reload_swaps_profiles_and_keeps_data() {
    let gateway = setup_gateway(vec![widget_profile()]).await;
    let options = CallOptions::new();

    gateway
        .post("widget", record(json!({"name": "a"})), &options)
        .await
        .expect("post failed")
        .expect("post returned nothing");

    let before = gateway
        .post("gadget", record(json!({"label": "dial"})), &options)
        .await;
    assert!(matches!(before, Err(CoreError::UnknownEntityType { .. })));

    let gadget = EntityProfile::new("gadget")
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(FieldProfile::new("label", FieldKind::Str).required());
    gateway
        .reload([widget_profile(), gadget], [])
        .await
        .expect("reload failed");

    let created = gateway
        .post("gadget", record(json!({"label": "dial"})), &options)
        .await
        .expect("post after reload failed")
        .expect("post after reload returned nothing");
    assert_eq!(created.get("id"), Some(&json!(1)));

    let survivor = gateway
        .get("widget", &[id_mask(&gateway, 1)], &options)
        .await
        .expect("get after reload failed")
        .expect("widget lost across reload");
    assert_eq!(survivor.get("name"), Some(&json!("a")));
}

#[tokio::test]
async fn backend_status_lists_environments() {
    let gateway = setup_gateway(vec![widget_profile()]).await;

    let statuses = gateway.backend_status().await.expect("status failed");
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].0, "volatile");
    assert_eq!(statuses[0].1, BackendStatus::Healthy);
}
