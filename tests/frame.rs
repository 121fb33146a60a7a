use anyhow::Result;
use datarec::{ErrorKind, Frame, Value};

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

#[test]
fn tokens_keep_their_spelling() {
    assert_eq!(Value::infer("42"), Value::Int(42));
    assert_eq!(Value::infer("-3"), Value::Int(-3));
    assert_eq!(Value::infer("007"), Value::Str("007".into()));
    assert_eq!(Value::infer("2.5"), Value::float(2.5));
    assert_eq!(Value::infer("1e3"), Value::float(1000.0));
    assert_eq!(Value::infer("nan"), Value::Str("nan".into()));
    assert!(Value::infer("").is_null());

    assert_eq!(Value::float(4.0).to_string(), "4.0");
    assert_eq!(Value::Int(4).to_string(), "4");
    assert_eq!(Value::Null.to_string(), "");
}

#[test]
fn mixed_values_have_a_total_order() {
    assert_ne!(Value::Int(4), Value::float(4.0));
    assert!(Value::Int(4) < Value::float(4.0));
    assert!(Value::float(3.5) < Value::Int(4));
    assert!(Value::Null < Value::Int(i64::MIN));
    assert!(Value::Int(i64::MAX) < Value::Str(String::new()));

    let mut values = vec![
        Value::Str("b".into()),
        Value::Int(2),
        Value::Null,
        Value::float(1.5),
        Value::Str("a".into()),
    ];
    values.sort();
    assert_eq!(
        values,
        vec![
            Value::Null,
            Value::float(1.5),
            Value::Int(2),
            Value::Str("a".into()),
            Value::Str("b".into()),
        ]
    );
}

#[test]
fn timestamps_accept_numbers_and_iso_dates() {
    assert_eq!(Value::Int(5).as_timestamp(), Some(5.0));
    assert_eq!(Value::Str("1970-01-02".into()).as_timestamp(), Some(86_400.0));
    assert_eq!(
        Value::Str("1970-01-01T00:01:00Z".into()).as_timestamp(),
        Some(60.0)
    );
    assert_eq!(
        Value::Str("1970-01-01 00:00:30".into()).as_timestamp(),
        Some(30.0)
    );
    assert_eq!(Value::Str("yesterday".into()).as_timestamp(), None);
    assert_eq!(Value::Null.as_timestamp(), None);
}

#[test]
fn columns_must_be_unique_and_aligned() -> Result<()> {
    let err = Frame::from_columns(vec![("a", ints(&[1, 2])), ("b", ints(&[1]))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = Frame::from_columns(vec![("a", ints(&[1])), ("a", ints(&[2]))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = Frame::from_rows(&["a", "b"], vec![ints(&[1, 2]), ints(&[3])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let mut frame = Frame::from_rows(&["a", "b"], vec![ints(&[1, 2]), ints(&[3, 4])])?;
    assert_eq!(frame.n_rows(), 2);
    assert_eq!(frame.require("b")?, ints(&[2, 4]).as_slice());
    assert_eq!(frame.require("c").unwrap_err().kind(), ErrorKind::Schema);

    assert_eq!(frame.rename_column("a", "b").unwrap_err().kind(), ErrorKind::Schema);
    frame.rename_column("a", "x")?;
    assert_eq!(frame.columns(), &["x", "b"]);
    assert_eq!(frame.drop_column("b"), Some(ints(&[2, 4])));
    assert_eq!(frame.columns(), &["x"]);
    Ok(())
}

#[test]
fn row_selection_and_reordering() -> Result<()> {
    let frame = Frame::from_columns(vec![
        ("extra", ints(&[9, 8, 7, 6])),
        ("user", ints(&[2, 1, 2, 1])),
        ("time", ints(&[30, 20, 10, 20])),
    ])?;

    let front = frame.clone().reorder_front(&["user", "time"]);
    assert_eq!(front.columns(), &["user", "time", "extra"]);

    let picked = frame.take(&[3, 0]);
    assert_eq!(picked.require("extra")?, ints(&[6, 9]).as_slice());
    let kept = frame.filter(&[false, true, true, false]);
    assert_eq!(kept.require("extra")?, ints(&[8, 7]).as_slice());

    // ties on time keep input order
    assert_eq!(frame.sorted_indices(&["time"])?, vec![2, 1, 3, 0]);
    assert_eq!(frame.sorted_indices(&["user", "time"])?, vec![1, 3, 2, 0]);

    let groups = frame.group_indices("user")?;
    assert_eq!(
        groups,
        vec![(Value::Int(2), vec![0, 2]), (Value::Int(1), vec![1, 3])]
    );
    Ok(())
}

#[test]
fn concatenation_requires_matching_columns() -> Result<()> {
    let a = Frame::from_columns(vec![("u", ints(&[1])), ("i", ints(&[10]))])?;
    let b = Frame::from_columns(vec![("u", ints(&[2])), ("i", ints(&[20]))])?;
    let joined = Frame::concat([a.clone(), Frame::new(), b])?;
    assert_eq!(joined.require("i")?, ints(&[10, 20]).as_slice());

    let other = Frame::from_columns(vec![("i", ints(&[1])), ("u", ints(&[2]))])?;
    let err = Frame::concat([a, other]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}
