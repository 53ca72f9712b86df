use super::*;

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn text_keywords_are_case_insensitive() {
    assert_eq!(
        parse_line("create cpu 3").expect("must parse"),
        Command::Create {
            name: "cpu".to_string(),
            dimension: 3
        }
    );
    assert_eq!(parse_line("  PiNg ").expect("must parse"), Command::Ping);
    assert_eq!(parse_line("list").expect("must parse"), Command::List);
    assert_eq!(parse_line("FLUSH").expect("must parse"), Command::Flush);
    assert_eq!(parse_line("help").expect("must parse"), Command::Help);
}

#[test]
fn insert_variants_parse_values_and_labels() {
    assert_eq!(
        parse_line("INSERT cpu 1.5,-2,3e2").expect("must parse"),
        Command::Insert {
            series: "cpu".to_string(),
            point: PointInput::new(vec![1.5, -2.0, 300.0]),
        }
    );
    assert_eq!(
        parse_line("INSERT cpu 1,2 host=a,zone=eu").expect("must parse"),
        Command::Insert {
            series: "cpu".to_string(),
            point: PointInput::new(vec![1.0, 2.0])
                .with_labels(labels(&[("host", "a"), ("zone", "eu")])),
        }
    );
    assert_eq!(
        parse_line("INSERT_AT cpu 42 1,2").expect("must parse"),
        Command::Insert {
            series: "cpu".to_string(),
            point: PointInput::at(42, vec![1.0, 2.0]),
        }
    );
}

#[test]
fn query_and_analysis_commands_parse() {
    assert_eq!(
        parse_line("QUERY cpu").expect("must parse"),
        Command::Query {
            series: "cpu".to_string(),
            hours_back: None
        }
    );
    assert_eq!(
        parse_line("QUERY cpu 6").expect("must parse"),
        Command::Query {
            series: "cpu".to_string(),
            hours_back: Some(6)
        }
    );
    assert_eq!(
        parse_line("QUERY_RANGE cpu 10 20").expect("must parse"),
        Command::QueryRange {
            series: "cpu".to_string(),
            start: 10,
            end: 20
        }
    );
    assert_eq!(
        parse_line("SIMILAR s 1.0,0.0 2 0").expect("must parse"),
        Command::Similar {
            series: "s".to_string(),
            vector: vec![1.0, 0.0],
            limit: 2,
            threshold: 0.0
        }
    );
    assert_eq!(
        parse_line("SIMILAR s 1,1 5").expect("must parse"),
        Command::Similar {
            series: "s".to_string(),
            vector: vec![1.0, 1.0],
            limit: 5,
            threshold: 0.0
        }
    );
    assert_eq!(
        parse_line("anomaly s 0 1").expect("must parse"),
        Command::Anomaly {
            series: "s".to_string(),
            window: 0,
            k: 1
        }
    );
    assert_eq!(
        parse_line("MOTIF s 5 2").expect("must parse"),
        Command::Motif {
            series: "s".to_string(),
            window: 5,
            k: 2
        }
    );
}

#[test]
fn save_and_load_take_the_rest_of_the_line() {
    assert_eq!(
        parse_line("SAVE /tmp/my data/state.json").expect("must parse"),
        Command::Save {
            path: Some(PathBuf::from("/tmp/my data/state.json"))
        }
    );
    assert_eq!(
        parse_line("load").expect("must parse"),
        Command::Load { path: None }
    );
}

#[test]
fn malformed_text_is_rejected() {
    for line in [
        "",
        "CREATE cpu",
        "CREATE cpu three",
        "INSERT cpu 1,,2",
        "INSERT cpu 1,2 host",
        "QUERY_RANGE cpu 10",
        "SIMILAR s 1,0 many",
        "ANOMALY s -1 1",
        "LIST extra",
    ] {
        let error = parse_line(line).expect_err("must fail");
        assert_eq!(error.code(), "InvalidArgument", "line: {line:?}");
    }

    let error = parse_line("DROP cpu").expect_err("must fail");
    assert_eq!(error.code(), "UnknownCommand");
}

#[test]
fn envelopes_match_client_payloads() {
    assert_eq!(
        parse_line(r#"{"type": "CreateSeries", "data": {"name": "anomaly_returns", "dimension": 2}}"#)
            .expect("must parse"),
        Command::Create {
            name: "anomaly_returns".to_string(),
            dimension: 2
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "Insert", "data": {"series": "s", "values": [1, 2.5]}}"#)
            .expect("must parse"),
        Command::Insert {
            series: "s".to_string(),
            point: PointInput::new(vec![1.0, 2.5]),
        }
    );
    assert_eq!(
        parse_line(
            r#"{"type": "FindSimilar", "data": {"series": "s", "vector": [1, 0], "limit": 3, "threshold": 0.5}}"#
        )
        .expect("must parse"),
        Command::Similar {
            series: "s".to_string(),
            vector: vec![1.0, 0.0],
            limit: 3,
            threshold: 0.5
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "Anomaly", "data": {"series": "s", "window": 5, "k": 1}}"#)
            .expect("must parse"),
        Command::Anomaly {
            series: "s".to_string(),
            window: 5,
            k: 1
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "GetStats", "data": {"series": "s"}}"#).expect("must parse"),
        Command::Stats {
            series: "s".to_string()
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "Query", "data": {"series": "s", "hoursBack": 2}}"#)
            .expect("must parse"),
        Command::Query {
            series: "s".to_string(),
            hours_back: Some(2)
        }
    );
}

#[test]
fn extended_envelopes_parse() {
    assert_eq!(
        parse_line(
            r#"{"type": "InsertWithTimestamp", "data": {"series": "s", "timestamp": 9, "values": [1], "labels": {"k": "v"}}}"#
        )
        .expect("must parse"),
        Command::Insert {
            series: "s".to_string(),
            point: PointInput::at(9, vec![1.0]).with_labels(labels(&[("k", "v")])),
        }
    );
    assert_eq!(
        parse_line(
            r#"{"type": "BatchInsert", "data": {"series": "s", "points": [{"values": [1]}, {"timestamp": 3, "values": [2]}]}}"#
        )
        .expect("must parse"),
        Command::InsertBatch {
            series: "s".to_string(),
            points: vec![PointInput::new(vec![1.0]), PointInput::at(3, vec![2.0])],
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "ListSeries"}"#).expect("must parse"),
        Command::List
    );
    assert_eq!(
        parse_line(r#"{"type": "Save", "data": {"path": "snap.json"}}"#).expect("must parse"),
        Command::Save {
            path: Some(PathBuf::from("snap.json"))
        }
    );
    assert_eq!(
        parse_line(r#"{"type": "Load"}"#).expect("must parse"),
        Command::Load { path: None }
    );
    assert_eq!(
        parse_line(r#"{"type": "FindSimilar", "data": {"series": "s", "vector": [1]}}"#)
            .expect("must parse"),
        Command::Similar {
            series: "s".to_string(),
            vector: vec![1.0],
            limit: DEFAULT_SIMILAR_LIMIT,
            threshold: 0.0
        }
    );
}

#[test]
fn malformed_envelopes_are_rejected() {
    for line in [
        r#"{"type": "Insert"}"#,
        r#"{"type": "Insert", "data": {"series": "s"}}"#,
        r#"{"type": "InsertWithTimestamp", "data": {"series": "s", "values": [1]}}"#,
        r#"{"data": {}}"#,
        r#"{"type": "Insert", "data": "#,
    ] {
        let error = parse_line(line).expect_err("must fail");
        assert_eq!(error.code(), "InvalidArgument", "line: {line}");
    }

    let error = parse_line(r#"{"type": "DropSeries", "data": {}}"#).expect_err("must fail");
    assert_eq!(error.code(), "UnknownCommand");
}

#[test]
fn mutations_are_flagged() {
    assert!(parse_line("CREATE a 1").expect("must parse").is_mutation());
    assert!(parse_line("INSERT a 1").expect("must parse").is_mutation());
    assert!(!parse_line("QUERY a").expect("must parse").is_mutation());
    assert!(!parse_line("SAVE").expect("must parse").is_mutation());
}
