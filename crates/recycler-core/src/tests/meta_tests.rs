use super::*;

#[test]
fn records_survive_unbinding() {
    let mut store = MetaStore::new();
    let item = ItemId::next();
    let id = store.set(item, Meta::new(4, 40.0, 160.0));

    assert_eq!(store.get(item), Some(&Meta::new(4, 40.0, 160.0)));
    assert_eq!(store.unbind(item), Some(id));
    assert!(store.get(item).is_none());
    assert_eq!(store.get_by_index(4), Some(&Meta::new(4, 40.0, 160.0)));
    assert!(store.has_index(4));
}

#[test]
fn rewriting_an_index_keeps_its_handle() {
    let mut store = MetaStore::new();
    let first = store.set_by_index(Meta::new(2, 10.0, 20.0));
    let second = store.set_by_index(Meta::new(2, 30.0, 25.0));
    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
    assert_eq!(store.record(first).size, 30.0);
    assert_eq!(store.id_for_index(2), Some(first));
}

#[test]
fn rebinding_moves_an_item_to_another_record() {
    let mut store = MetaStore::new();
    let item = ItemId::next();
    let old = store.set(item, Meta::new(0, 10.0, 0.0));
    let new = store.set(item, Meta::new(7, 12.0, 70.0));
    assert_ne!(old, new);
    assert_eq!(store.binding(item), Some(new));
    assert_eq!(store.get(item).map(|meta| meta.index), Some(7));
    assert_eq!(store.get_by_index(0).map(|meta| meta.size), Some(10.0));
}

#[test]
fn record_mut_updates_in_place() {
    let mut store = MetaStore::new();
    let id = store.set_by_index(Meta::new(1, 10.0, 10.0));
    store.record_mut(id).size = 15.0;
    assert_eq!(store.get_by_index(1).map(Meta::end), Some(25.0));
}

#[test]
fn bind_reuses_an_existing_record() {
    let mut store = MetaStore::new();
    let id = store.set_by_index(Meta::new(3, 5.0, 15.0));
    let item = ItemId::next();
    store.bind(item, id);
    assert_eq!(store.get(item).map(|meta| meta.index), Some(3));
    assert!(!store.is_empty());
}

#[test]
fn shifting_moves_every_record() {
    let mut store = MetaStore::new();
    let item = ItemId::next();
    store.set(item, Meta::new(0, 100.0, 640.0));
    store.set_by_index(Meta::new(1, 20.0, 740.0));

    store.shift_offsets(-640.0);

    assert_eq!(store.get(item), Some(&Meta::new(0, 100.0, 0.0)));
    assert_eq!(store.get_by_index(1), Some(&Meta::new(1, 20.0, 100.0)));
}
