//! Edge case tests for tirea-form-state.

use serde_json::json;
use tirea_form_state::{
    apply_array_op, path, ArrayOp, MetaKind, MetaTrees, Path, Seg, StateError, Tree, MAX_INDEX,
};

// ============================================================================
// Path round-trip
// ============================================================================

#[test]
fn test_get_after_set_round_trips() {
    let base = Tree::from(json!({
        "user": {"name": "Ada", "tags": ["x"]},
        "matrix": [[1, 2], [3]],
        "flag": true
    }));
    let paths = [
        "user.name",
        "user.tags.0",
        "user.tags.5",
        "user.address.city",
        "matrix[1][0]",
        "matrix.2.0",
        "fresh.0.deep.1",
        "flag.nested",
        "items.3",
    ];
    let value = Tree::from(json!({"v": [1, "two", null]}));
    for raw in paths {
        let p = Path::parse(raw).unwrap();
        let next = base.set(&p, value.clone());
        assert_eq!(next.get(&p), Some(&value), "round trip failed for {raw}");
    }
}

#[test]
fn test_dotted_and_bracket_forms_agree() {
    let dotted = Path::parse("orders.12.lines.3.sku").unwrap();
    let bracketed = Path::parse("orders[12].lines[3].sku").unwrap();
    assert_eq!(dotted, bracketed);
    assert_eq!(dotted.to_dotted(), "orders.12.lines.3.sku");
    assert_eq!(Path::parse(&dotted.to_dotted()).unwrap(), dotted);
    assert_eq!(dotted.to_string(), "$.orders[12].lines[3].sku");
}

#[test]
fn test_numeric_segments_are_indices() {
    let p = Path::parse("a.007.b").unwrap();
    assert_eq!(p[1], Seg::Index(7));
    let p = Path::parse("a.7x").unwrap();
    assert_eq!(p[1], Seg::Key("7x".into()));
}

#[test]
fn test_malformed_paths() {
    for raw in ["a..b", ".a", "a.", "a[", "a[x]", "a[-1]", "a]", "a[]"] {
        let err = Path::parse(raw).unwrap_err();
        assert!(
            matches!(err, StateError::MalformedPath { ref input, .. } if input == raw),
            "{raw} should be malformed"
        );
    }
    assert!(Path::parse("").unwrap().is_empty());
}

#[test]
fn test_oversized_indices_are_rejected() {
    for raw in [
        "items.18446744073709551615",
        "items.1000000000000",
        "items[18446744073709551616]",
    ] {
        let err = Path::parse(raw).unwrap_err();
        assert!(
            matches!(err, StateError::IndexTooLarge { ref input, max, .. } if input == raw && max == MAX_INDEX),
            "{raw} should exceed the index limit"
        );
    }
}

#[test]
fn test_set_beyond_index_limit_is_ignored() {
    let base = Tree::from(json!({"items": ["a"]}));
    let next = base.set(&path!("items", usize::MAX), Tree::from(1i64));
    assert!(next.ptr_eq(&base));
    let next = base.set(&path!("items", MAX_INDEX + 1, "x"), Tree::from(1i64));
    assert!(next.ptr_eq(&base));
}

// ============================================================================
// Copy-on-write
// ============================================================================

#[test]
fn test_set_shares_untouched_siblings() {
    let base = Tree::from(json!({"left": {"big": [1, 2, 3]}, "right": {"x": 1}}));
    let next = base.set(&path!("right", "x"), Tree::from(2i64));

    assert!(next.get(&path!("left")).unwrap().ptr_eq(base.get(&path!("left")).unwrap()));
    assert!(!next.get(&path!("right")).unwrap().ptr_eq(base.get(&path!("right")).unwrap()));
    assert_eq!(base, json!({"left": {"big": [1, 2, 3]}, "right": {"x": 1}}));
}

#[test]
fn test_set_creates_containers_by_next_segment() {
    let next = Tree::Null.set(&path!("a", 1usize, "b"), Tree::from("v"));
    assert_eq!(next, json!({"a": [null, {"b": "v"}]}));
}

#[test]
fn test_unset_keeps_list_length() {
    let base = Tree::from(json!({"items": ["a", "b", "c"], "k": 1}));
    assert_eq!(
        base.unset(&path!("items", 1usize)),
        json!({"items": ["a", null, "c"], "k": 1})
    );
    assert_eq!(base.unset(&path!("k")), json!({"items": ["a", "b", "c"]}));
    assert_eq!(base.unset(&path!("missing", "deep")), base);
}

#[test]
fn test_get_missing_is_none() {
    let base = Tree::from(json!({"a": [1], "s": "str"}));
    assert!(base.get(&path!("a", 4usize)).is_none());
    assert!(base.get(&path!("s", "x")).is_none());
    assert!(base.get(&path!("nope")).is_none());
}

// ============================================================================
// Structural edits
// ============================================================================

fn items(values: &[&str]) -> Tree {
    Tree::from(json!({ "items": values }))
}

#[test]
fn test_out_of_range_ops_are_noops() {
    let doc = items(&["A", "B"]);
    let noops = [
        ArrayOp::remove(2),
        ArrayOp::remove(99),
        ArrayOp::replace(2, "x"),
        ArrayOp::move_item(0, 2),
        ArrayOp::move_item(5, 0),
        ArrayOp::move_item(1, 1),
        ArrayOp::swap(0, 2),
        ArrayOp::swap(1, 1),
    ];
    for op in noops {
        let edit = apply_array_op(&doc, &path!("items"), &op).unwrap();
        assert!(edit.is_noop(), "{} should be a no-op", op.name());
        assert!(edit.tree.ptr_eq(&doc));
    }
}

#[test]
fn test_every_op_keeps_metadata_with_its_entity() {
    // tag each item's error with its own value, then check alignment after
    // every op
    let names = ["A", "B", "C", "D"];
    let ops = [
        ArrayOp::append("E"),
        ArrayOp::insert(1, "N"),
        ArrayOp::remove(1),
        ArrayOp::move_item(0, 3),
        ArrayOp::move_item(3, 1),
        ArrayOp::swap(0, 2),
    ];
    for op in ops {
        let doc = items(&names);
        let mut meta = MetaTrees::new();
        for (i, name) in names.iter().enumerate() {
            meta.set_error(&path!("items", i), *name);
        }
        let edit = apply_array_op(&doc, &path!("items"), &op).unwrap();
        meta.remap(&path!("items"), edit.remap.as_ref().unwrap());

        let list = edit.tree.get(&path!("items")).and_then(Tree::as_list).unwrap();
        for (i, item) in list.iter().enumerate() {
            let error = meta.error(&path!("items", i));
            match item.as_str() {
                Some(v) if names.contains(&v) => assert_eq!(error, Some(v), "{}", op.name()),
                _ => assert_eq!(error, None, "{}", op.name()),
            }
        }
    }
}

#[test]
fn test_affected_ranges() {
    let doc = items(&["A", "B", "C", "D", "E"]);
    let affected = |op: ArrayOp| {
        apply_array_op(&doc, &path!("items"), &op)
            .unwrap()
            .remap
            .unwrap()
            .affected_old()
    };
    assert_eq!(affected(ArrayOp::append("F")), Vec::<usize>::new());
    assert_eq!(affected(ArrayOp::insert(3, "X")), vec![3, 4]);
    assert_eq!(affected(ArrayOp::remove(1)), vec![1, 2, 3, 4]);
    assert_eq!(affected(ArrayOp::replace(2, "X")), vec![2]);
    assert_eq!(affected(ArrayOp::move_item(1, 3)), vec![1, 2, 3]);
    assert_eq!(affected(ArrayOp::swap(0, 4)), vec![0, 1, 2, 3, 4]);
    assert_eq!(affected(ArrayOp::swap(3, 2)), vec![2, 3]);
}

#[test]
fn test_edit_on_non_list_is_type_mismatch() {
    let doc = Tree::from(json!({"items": {"a": 1}}));
    let err = apply_array_op(&doc, &path!("items"), &ArrayOp::append(1i64)).unwrap_err();
    assert!(matches!(err, StateError::TypeMismatch { .. }));
}

#[test]
fn test_meta_flags_survive_remove_of_sibling() {
    let doc = items(&["A", "B", "C"]);
    let mut meta = MetaTrees::new();
    meta.set_flag(MetaKind::Touched, &path!("items", 2usize), true);
    meta.set_flag(MetaKind::Dirty, &path!("items", 0usize), true);

    let edit = apply_array_op(&doc, &path!("items"), &ArrayOp::remove(0)).unwrap();
    meta.remap(&path!("items"), edit.remap.as_ref().unwrap());

    assert!(meta.flag(MetaKind::Touched, &path!("items", 1usize)));
    assert!(!meta.any_flag(MetaKind::Dirty));
}
