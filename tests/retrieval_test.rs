mod helpers;

use halsey::entries::{EntryManager, Priority};
use halsey::retrieval::Retriever;
use halsey::store::{FilterMode, MetadataFilter, VectorStore};
use helpers::{test_store, KeywordEmbedder};

/// Three reflections identical to the query plus three unrelated tasks.
fn seed_crowded(store: &VectorStore) {
    let manager = EntryManager::new(store, &KeywordEmbedder);
    for _ in 0..3 {
        manager.add_reflection("groceries groceries", None).unwrap();
    }
    manager.add_task("fix bike", None).unwrap();
    manager.add_task("paint fence", None).unwrap();
    manager.add_task("book dentist", None).unwrap();
}

#[test]
fn combined_filtering_returns_k_tasks() {
    let store = test_store();
    seed_crowded(&store);

    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_tasks("groceries", 2, None)
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches
        .iter()
        .all(|m| m.entry.metadata["type"].as_str() == Some("task")));
}

#[test]
fn post_hoc_filtering_can_come_up_short() {
    let store = test_store().with_filter_mode(FilterMode::PostHoc);
    seed_crowded(&store);

    // The two nearest neighbours are reflections, so nothing survives.
    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_tasks("groceries", 2, None)
        .unwrap();
    assert!(matches.len() < 2);
    assert!(matches
        .iter()
        .all(|m| m.entry.metadata["type"].as_str() == Some("task")));
}

#[test]
fn priority_keyword_narrows_search() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    manager.add_task("Finish report ferrari", None).unwrap();
    manager.add_task("Call mom ferrari", None).unwrap();
    manager.add_task("Water plants budweiser", None).unwrap();
    manager.add_task("Plan trip", None).unwrap();

    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_tasks("ferrari tasks", 5, None)
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches
        .iter()
        .all(|m| m.entry.metadata["priority_code"].as_str() == Some("ferrari")));
}

#[test]
fn explicit_filter_overrides_keyword() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    manager.add_task("Finish report ferrari", None).unwrap();
    manager.add_task("Renew passport", Some(Priority::Tesla)).unwrap();

    let filter = MetadataFilter::new().with("priority_code", "tesla");
    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_tasks("ferrari", 5, Some(filter))
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entry.text, "Renew passport");
}

#[test]
fn results_are_ordered_by_distance() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    manager.add_task("buy milk", None).unwrap();
    manager.add_task("buy milk and eggs and bread", None).unwrap();
    manager.add_task("clean garage", None).unwrap();

    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_tasks("buy milk", 3, None)
        .unwrap();
    assert_eq!(matches[0].entry.text, "buy milk");
    assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn incomplete_tasks_skip_completed_and_keep_order() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    let first = manager.add_task("first", None).unwrap().id;
    let second = manager.add_task("second", None).unwrap().id;
    let third = manager.add_task("third", None).unwrap().id;
    manager.add_reflection("not a task", None).unwrap();
    manager.complete_task(&second).unwrap();

    let open = Retriever::new(&store, &KeywordEmbedder)
        .incomplete_tasks()
        .unwrap();
    let ids: Vec<&str> = open.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![first.as_str(), third.as_str()]);
}

#[test]
fn recent_reflections_newest_first() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    for day in ["monday", "tuesday", "wednesday", "thursday"] {
        manager.add_reflection(day, None).unwrap();
    }
    manager.add_task("a task", None).unwrap();

    let recent = Retriever::new(&store, &KeywordEmbedder)
        .recent_reflections(3)
        .unwrap();
    let texts: Vec<&str> = recent.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["thursday", "wednesday", "tuesday"]);
}

#[test]
fn reflections_query_excludes_tasks() {
    let store = test_store();
    let manager = EntryManager::new(&store, &KeywordEmbedder);
    manager.add_task("stressful deadline", None).unwrap();
    manager.add_reflection("stressful week at work 4", None).unwrap();

    let matches = Retriever::new(&store, &KeywordEmbedder)
        .query_reflections("stressful", 5)
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entry.metadata["type"].as_str(), Some("reflection"));
}
