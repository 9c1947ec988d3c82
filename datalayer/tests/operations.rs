use std::{collections::HashMap, sync::Arc};

use datalayer::{
    bson::doc,
    memory::InMemoryDataService,
    prelude::*,
};
use serde::{Deserialize, Serialize};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Matches records whose `msg` contains the raw query string, or the `id` of a predicate.
fn substring_generator() -> impl FilterGenerator + 'static {
    CustomFilterGenerator::new(|query: &Query| {
        let needle = match query {
            Query::Id(needle) => needle.clone(),
            Query::Predicate(predicate) => predicate
                .get_str("id")
                .map(str::to_string)
                .map_err(|_| DataServiceError::UnsupportedQuery(format!("{predicate}")))?,
            other => return Err(DataServiceError::UnsupportedQuery(format!("{other:?}"))),
        };

        Ok(Box::new(move |record: &Record| {
            record.get_str("msg").is_some_and(|msg| msg.contains(&needle))
        }) as RecordFilter)
    })
}

#[tokio::test]
async fn independent_ids_default_on() {
    let service = InMemoryDataService::new();
    assert!(service.use_independent_ids());
    assert!(!service.generate_id().is_empty());
    assert_ne!(service.generate_id(), service.generate_id());

    let service = InMemoryDataService::builder()
        .use_independent_ids(false)
        .build()
        .await
        .unwrap();
    assert!(!service.use_independent_ids());
}

#[tokio::test]
async fn basic_operations() {
    init_logging();

    let notifier = Arc::new(ChangeNotifier::new());
    let changes = notifier.subscribe(DEFAULT_EVENT_NAME);
    let mut service = InMemoryDataService::builder()
        .notification(notifier)
        .build()
        .await
        .unwrap();

    let saved = service.save(doc! { "msg": "hello" }.into(), None).await.unwrap();
    assert_eq!(saved.kind, ChangeKind::Create);
    let id = saved.record.primary_id().unwrap();
    let id2 = saved.record.secondary_id().unwrap();
    assert_ne!(id, id2);

    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);

    let mut found = service.fetch_one(id.as_str().into(), None).await.unwrap().unwrap();
    assert_eq!(found.get_str("msg"), Some("hello"));

    // Fetched records are copies.
    found.insert("msg", "hi");
    let stored = service.fetch_one(id.as_str().into(), None).await.unwrap().unwrap();
    assert_eq!(stored.get_str("msg"), Some("hello"));

    let updated = service.save(found, None).await.unwrap();
    assert_eq!(updated.kind, ChangeKind::Update);
    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);

    let by_primary = service.fetch_one(id.as_str().into(), None).await.unwrap().unwrap();
    assert_eq!(by_primary.get_str("msg"), Some("hi"));
    let by_predicate = service.fetch_one(doc! { "id": id2.as_str() }.into(), None).await.unwrap().unwrap();
    assert_eq!(by_predicate.get_str("msg"), Some("hi"));
    let by_secondary = service.fetch_one(id2.as_str().into(), None).await.unwrap().unwrap();
    assert_eq!(by_secondary.get_str("msg"), Some("hi"));

    let returned = service.remove(id.as_str().into(), None).await.unwrap();
    assert_eq!(returned, Query::Id(id.clone()));
    assert!(service.fetch_one(id.as_str().into(), None).await.unwrap().is_none());

    let kinds = changes.try_iter().map(|change| change.kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete]);

    let results = futures::future::join_all(service.save_many(
        vec![doc! { "msg": "hello" }.into(), doc! { "msg": "world" }.into()],
        None,
    ))
    .await;
    assert!(results.iter().all(Result::is_ok));

    let all = service.fetch(Query::All, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(service.fetch(doc! {}.into(), None).await.unwrap().len(), 2);

    let ids = all.iter().filter_map(Record::secondary_id).collect::<Vec<_>>();
    let ids2 = all.iter().filter_map(Record::primary_id).collect::<Vec<_>>();

    assert!(service.fetch_one(Query::ids(ids.clone()), None).await.unwrap().is_some());
    assert!(service.fetch_one(Query::ids(ids2.clone()), None).await.unwrap().is_some());
    assert_eq!(
        service.fetch(service.create_id_query(Query::ids(ids)), None).await.unwrap().len(),
        2
    );
    assert_eq!(
        service.fetch(service.create_id_query(Query::ids(ids2)), None).await.unwrap().len(),
        2
    );

    assert!(service.fetch(doc! { "name": "Kolz" }.into(), None).await.unwrap().is_empty());

    service.set_use_independent_ids(false);
    let saved = service.save(doc! { "msg": "world" }.into(), None).await.unwrap();
    assert!(saved.record.primary_id().is_some());
    assert!(saved.record.secondary_id().is_none());
}

#[tokio::test]
async fn list_results_are_concatenated() {
    let service = InMemoryDataService::new();
    let saved = service.save(doc! { "msg": "hello" }.into(), None).await.unwrap().record;
    let id = saved.primary_id().unwrap();

    let found = service
        .fetch(Query::List(vec![id.as_str().into(), id.as_str().into()]), None)
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert!(service.fetch(Query::List(vec![]), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn structured_queries() {
    init_logging();

    let service = InMemoryDataService::builder()
        .structured_queries()
        .build()
        .await
        .unwrap();

    let saved = service.save(doc! { "msg": "hello" }.into(), None).await.unwrap().record;
    let id = saved.primary_id().unwrap();
    let id2 = saved.secondary_id().unwrap();

    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);

    for query in [Query::from(id.as_str()), Query::from(id2.as_str())] {
        let found = service.fetch_one(query, None).await.unwrap().unwrap();
        assert_eq!(found.get_str("msg"), Some("hello"));
    }

    let found = service.fetch_one(doc! { "msg": "hello" }.into(), None).await.unwrap();
    assert_eq!(found.unwrap().get_str("msg"), Some("hello"));

    assert!(service.fetch_one(doc! { "msg": "hello!" }.into(), None).await.unwrap().is_none());

    let found = service
        .fetch_one(doc! { "msg": { "$regex": "hel" } }.into(), None)
        .await
        .unwrap();
    assert_eq!(found.unwrap().get_str("msg"), Some("hello"));

    assert_eq!(
        service.create_id_query(id.as_str().into()),
        Query::Predicate(doc! { "$or": [{ "_id": id.as_str() }, { "id": id.as_str() }] })
    );

    let err = service
        .fetch(doc! { "msg": { "$near": 1 } }.into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DataServiceError::UnsupportedQuery(_)));
}

#[tokio::test]
async fn custom_filter_generator() {
    let service = InMemoryDataService::builder()
        .filter_generator(substring_generator())
        .build()
        .await
        .unwrap();

    let saved = service.save(doc! { "msg": "hello" }.into(), None).await.unwrap().record;
    assert!(saved.primary_id().is_some());
    assert!(saved.secondary_id().is_some());

    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);

    let id = saved.primary_id().unwrap();
    assert!(service.fetch(id.as_str().into(), None).await.unwrap().is_empty());

    let found = service.fetch("hel".into(), None).await.unwrap();
    assert_eq!(found[0].get_str("msg"), Some("hello"));

    let found = service.fetch_one("hel".into(), None).await.unwrap().unwrap();
    assert_eq!(found.get_str("msg"), Some("hello"));
}

#[tokio::test]
async fn custom_filter_generator_with_starting_data() {
    let service = InMemoryDataService::builder()
        .filter_generator(substring_generator())
        .collection(DEFAULT_COLLECTION, vec![doc! { "id": "12", "msg": "hello" }.into()])
        .build()
        .await
        .unwrap();

    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);
    assert!(service.fetch("12".into(), None).await.unwrap().is_empty());

    let found = service.fetch("hel".into(), None).await.unwrap();
    assert_eq!(found[0].get_str("msg"), Some("hello"));

    let found = service.fetch_one(doc! { "id": "ell" }.into(), None).await.unwrap();
    assert_eq!(found.unwrap().get_str("msg"), Some("hello"));
}

#[tokio::test]
async fn named_collections() {
    let service = InMemoryDataService::builder()
        .collections(HashMap::from([(
            "users".to_string(),
            vec![doc! { "_id": "u1", "name": "Kolz" }.into()],
        )]))
        .build()
        .await
        .unwrap();

    assert_eq!(service.list_collections().await, vec!["default", "users"]);
    assert!(service.fetch_one("u1".into(), Some("users")).await.unwrap().is_some());
    assert!(service.fetch_one("u1".into(), None).await.unwrap().is_none());

    let err = service.fetch(Query::All, Some("teams")).await.unwrap_err();
    assert!(matches!(err, DataServiceError::UnknownCollection(name) if name == "teams"));
    assert!(service.save(Record::new(), Some("teams")).await.is_err());
    assert!(service.remove(Query::All, Some("teams")).await.is_err());

    service.create_collection("teams", vec![]).await.unwrap();
    service.save(doc! { "name": "blue" }.into(), Some("teams")).await.unwrap();
    assert_eq!(service.fetch(Query::All, Some("teams")).await.unwrap().len(), 1);

    let dropped = service.drop_collection("teams").await.unwrap();
    assert_eq!(dropped.len(), 1);
    assert!(service.fetch(Query::All, Some("teams")).await.is_err());
}

#[tokio::test]
async fn remove_everything() {
    let notifier = Arc::new(ChangeNotifier::new());
    let changes = notifier.subscribe("records");
    let service = InMemoryDataService::builder()
        .notification(notifier.clone())
        .event_name("records")
        .build()
        .await
        .unwrap();

    for msg in ["a", "b", "c"] {
        service.save(doc! { "msg": msg }.into(), None).await.unwrap();
    }

    let returned = service.remove(Query::All, None).await.unwrap();
    assert_eq!(returned, Query::All);
    assert!(service.fetch(Query::All, None).await.unwrap().is_empty());

    let deletes = changes
        .try_iter()
        .filter(|change| change.kind == ChangeKind::Delete)
        .count();
    assert_eq!(deletes, 3);
    assert_eq!(notifier.listener_count(DEFAULT_EVENT_NAME), 0);
}

#[tokio::test]
async fn queries_need_a_filter_generator() {
    let service = InMemoryDataService::builder()
        .without_filter_generator()
        .build()
        .await
        .unwrap();

    let saved = service.save(doc! { "msg": "hello" }.into(), None).await.unwrap().record;
    let id = saved.secondary_id().unwrap();

    assert_eq!(service.fetch(Query::All, None).await.unwrap().len(), 1);
    assert!(service.fetch_one(id.into(), None).await.unwrap().is_some());

    let err = service.fetch(doc! { "msg": "hello" }.into(), None).await.unwrap_err();
    assert!(matches!(err, DataServiceError::UnsupportedQuery(_)));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    msg: String,
}

#[tokio::test]
async fn typed_records() {
    let service = InMemoryDataService::new();

    let note = Note { key: None, msg: "hello".to_string() };
    let saved = service.save(Record::from_value(&note).unwrap(), None).await.unwrap();

    let stored: Note = saved.record.to_value().unwrap();
    assert_eq!(stored.msg, "hello");
    assert_eq!(stored.key, saved.record.primary_id());

    let json = saved.record.to_json().unwrap();
    assert_eq!(json["msg"], serde_json::json!("hello"));
}

#[tokio::test]
async fn object_ids_are_found_by_hex_in_both_modes() {
    let oid = datalayer::bson::oid::ObjectId::new();
    let seed = || vec![Record::from(doc! { "_id": oid, "msg": "hello" })];

    let identity = InMemoryDataService::builder()
        .collection(DEFAULT_COLLECTION, seed())
        .build()
        .await
        .unwrap();
    let structured = InMemoryDataService::builder()
        .structured_queries()
        .collection(DEFAULT_COLLECTION, seed())
        .build()
        .await
        .unwrap();

    for service in [&identity, &structured] {
        let found = service.fetch_one(oid.to_hex().into(), None).await.unwrap();
        assert_eq!(found.unwrap().get_str("msg"), Some("hello"));
    }
}
