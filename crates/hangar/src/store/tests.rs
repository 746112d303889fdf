use super::*;
use tempfile::tempdir;

#[cfg(test)]
mod key_values_tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        title: String,
    }

    #[test]
    fn set_get_cut() {
        let dir = tempdir().unwrap();
        let kv = KeyValues::open(dir.path()).unwrap();

        assert!(!kv.has("1234"));
        kv.set_json("1234", &Record { title: "Game".to_string() }).unwrap();
        assert!(kv.has("1234"));
        assert_eq!(
            kv.get_json::<Record>("1234").unwrap(),
            Some(Record { title: "Game".to_string() })
        );
        assert_eq!(kv.keys().unwrap(), vec!["1234".to_string()]);

        assert!(kv.cut("1234").unwrap());
        assert!(!kv.cut("1234").unwrap());
        assert!(kv.keys().unwrap().is_empty());
    }

    #[test]
    fn keys_with_slashes_stay_in_partition() {
        let dir = tempdir().unwrap();
        let kv = KeyValues::open(dir.path()).unwrap();
        kv.set("owner/repo", b"[]").unwrap();

        assert!(kv.has("owner/repo"));
        assert_eq!(kv.keys().unwrap(), vec!["owner/repo".to_string()]);
        assert!(!dir.path().join("owner").exists());
    }

    #[test]
    fn since_reports_recent_changes_only() {
        let dir = tempdir().unwrap();
        let kv = KeyValues::open(dir.path()).unwrap();

        let before = chrono::Utc::now().timestamp();
        kv.set("fresh", b"1").unwrap();

        let changed = kv.since(before, &[Change::Create, Change::Update]).unwrap();
        assert_eq!(changed, vec!["fresh".to_string()]);

        let later = chrono::Utc::now().timestamp() + 60;
        assert!(kv.since(later, &[Change::Create, Change::Update]).unwrap().is_empty());
        assert_eq!(kv.since(-1, &[Change::Create]).unwrap().len(), 1);
    }

    #[test]
    fn updates_keep_creation_time() {
        let dir = tempdir().unwrap();
        let kv = KeyValues::open(dir.path()).unwrap();
        kv.set("k", b"1").unwrap();
        let (created, _) = kv.modified("k").unwrap().unwrap();
        kv.set("k", b"2").unwrap();
        let (created_again, updated) = kv.modified("k").unwrap().unwrap();
        assert_eq!(created, created_again);
        assert!(updated >= created);
        assert_eq!(kv.get("k").unwrap().unwrap(), b"2");
    }

    #[test]
    fn partitions_are_independent() {
        let dir = tempdir().unwrap();
        let kv = KeyValues::open(dir.path()).unwrap();
        let linux = kv.partition("linux-en").unwrap();
        let windows = kv.partition("windows-en").unwrap();

        linux.set("1", b"{}").unwrap();
        assert!(linux.has("1"));
        assert!(!windows.has("1"));
    }
}

#[cfg(test)]
mod property_store_tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn last_write_wins_for_single_values() {
        let dir = tempdir().unwrap();
        let store = PropertyStore::open(dir.path()).unwrap();

        store.replace_values(property::TITLE, "1", vec!["Old".to_string()]).unwrap();
        store.replace_values(property::TITLE, "1", vec!["New".to_string()]).unwrap();

        assert_eq!(store.get_last_value(property::TITLE, "1").unwrap().as_deref(), Some("New"));
        assert_eq!(store.get_last_value(property::TITLE, "2").unwrap(), None);
    }

    #[test]
    fn append_and_cut() {
        let dir = tempdir().unwrap();
        let store = PropertyStore::open(dir.path()).unwrap();

        store.append_values(property::PREFIX_ENV, "slug/en", vec!["A=1".to_string()]).unwrap();
        store
            .append_values(property::PREFIX_ENV, "slug/en", vec!["A=1".to_string(), "B=2".to_string()])
            .unwrap();
        assert_eq!(
            store.get_all_values(property::PREFIX_ENV, "slug/en").unwrap().unwrap(),
            vec!["A=1".to_string(), "B=2".to_string()]
        );

        store.cut_keys(property::PREFIX_ENV, &["slug/en"]).unwrap();
        assert!(!store.has_key(property::PREFIX_ENV, "slug/en").unwrap());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = PropertyStore::open(dir.path()).unwrap();
            let mut batch = BTreeMap::new();
            batch.insert("1".to_string(), vec!["one".to_string()]);
            batch.insert("2".to_string(), vec!["two".to_string()]);
            store.batch_replace_values(property::SLUG, batch).unwrap();
        }

        let store = PropertyStore::open(dir.path()).unwrap();
        store.must_have(&[property::SLUG, property::TITLE]).unwrap();
        assert_eq!(store.keys(property::SLUG).unwrap(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn corrupt_document_fails_must_have() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("title.json"), b"not json").unwrap();
        let store = PropertyStore::open(dir.path()).unwrap();
        let err = store.must_have(&[property::TITLE]).unwrap_err();
        assert_eq!(err.category(), "serialization");
    }
}
