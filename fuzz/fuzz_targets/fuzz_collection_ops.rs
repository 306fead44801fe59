#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use settingsdb::{Collection, Config};

#[derive(Arbitrary, Debug)]
enum CollectionOp {
    Item { name: String },
    Set { name: String, key: String, value: String },
    Add { key: String, value: String },
    Get { key: String, prefix: bool },
    Clear { key: String, prefix: bool },
    Find { key: String },
    Filter { key: String },
    ItemPrefix { prefix: String },
    Save { disambiguate: bool },
    Load,
    Delete,
}

fuzz_target!(|ops: Vec<CollectionOp>| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let Ok(mut collection) = Collection::open("fuzz", Config::in_dir(dir.path())) else {
        return;
    };

    // Limit operations to prevent timeout
    for op in ops.iter().take(32) {
        match op {
            CollectionOp::Item { name } => {
                let _ = collection.item(name);
            }
            CollectionOp::Set { name, key, value } => {
                if let Ok(item) = collection.item(name) {
                    item.add(key.as_str(), value.as_str());
                    assert_eq!(item.find(key), Some(value.as_str()));
                }
            }
            CollectionOp::Add { key, value } => {
                let _ = collection.add(key, value);
            }
            CollectionOp::Get { key, prefix } => {
                let _ = collection.get(key, *prefix);
            }
            CollectionOp::Clear { key, prefix } => {
                if collection.clear(key, *prefix).is_ok() && !key.is_empty() {
                    assert!(collection.get(key, *prefix).is_empty());
                }
            }
            CollectionOp::Find { key } => {
                let _ = collection.find(key);
            }
            CollectionOp::Filter { key } => {
                let view = collection.filter(key);
                assert!(view.len() <= collection.len());
            }
            CollectionOp::ItemPrefix { prefix } => {
                let _ = collection.item_prefix(prefix);
            }
            CollectionOp::Save { disambiguate } => {
                let _ = collection.save(*disambiguate);
            }
            CollectionOp::Load => {
                let _ = collection.load();
            }
            CollectionOp::Delete => {
                let _ = collection.delete();
            }
        }

        // Names stay unique in memory
        let mut names: Vec<_> = collection.items().iter().map(|i| &i.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), collection.len());
    }
});
