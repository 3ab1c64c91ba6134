use super::*;

#[tokio::test]
async fn self_aliases_produce_a_single_local_record() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "app.log", "one\ntwo\n");
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(dir.path(), remote.clone());

    let results = coordinator
        .execute(
            &QueryTarget::Directory,
            &query(1, 1, "localhost,127.0.0.1,10.0.0.5"),
        )
        .await
        .expect("query");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].host, OWN_ADDRESS);
    assert_eq!(results[0].status_code, 200);
    assert_eq!(results[0].files[0].window.lines, vec!["two"]);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn unreachable_peer_degrades_to_gateway_timeout() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "app.log", "one\n");
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(dir.path(), remote);

    let results = coordinator
        .execute(&QueryTarget::Directory, &query(5, 1, "localhost,unreachable-host"))
        .await
        .expect("query");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].host, "unreachable-host");
    assert_eq!(results[0].status_code, 504);
    assert!(results[0].files.is_empty());
    assert_eq!(results[1].host, OWN_ADDRESS);
    assert_eq!(results[1].status_code, 200);
}

#[tokio::test]
async fn remote_records_precede_local_and_requests_are_forwarded() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "app.log", "local line\n");
    let peer_record = HostResult::success("10.0.0.9", Vec::new());
    let remote = Arc::new(ScriptedRemote::answering("peer:8080", peer_record.clone()));
    let coordinator = coordinator(dir.path(), remote.clone());

    let raw = RawQuery {
        start_pos: Some(0),
        keyword: Some("line".to_string()),
        ..query(3, 0, "localhost,peer:8080")
    };
    let results = coordinator
        .execute(&QueryTarget::File("app.log".to_string()), &raw)
        .await
        .expect("query");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], peer_record);
    assert_eq!(results[1].files[0].window.lines, vec!["local line"]);

    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    let (host, request) = &calls[0];
    assert_eq!(host, "peer:8080");
    assert_eq!(request.file_name.as_deref(), Some("app.log"));
    assert_eq!(request.max_lines, Some(3));
    assert_eq!(request.keyword, "line");
    assert_eq!(request.order, ReadOrder::Ascending);
}

#[tokio::test]
async fn remote_only_query_skips_local_read() {
    let dir = tempfile::tempdir().expect("tmp");
    let remote = Arc::new(ScriptedRemote::answering(
        "peer:8080",
        HostResult::success("peer:8080", Vec::new()),
    ));
    let coordinator = coordinator(&dir.path().join("missing"), remote);

    let results = coordinator
        .execute(&QueryTarget::Directory, &query(1, 1, "peer:8080"))
        .await
        .expect("query");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].host, "peer:8080");
}

#[tokio::test]
async fn missing_file_becomes_a_not_found_record() {
    let dir = tempfile::tempdir().expect("tmp");
    let coordinator = coordinator(dir.path(), Arc::new(ScriptedRemote::default()));

    let results = coordinator
        .execute(&QueryTarget::File("absent.log".to_string()), &query(1, 1, "localhost"))
        .await
        .expect("query");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status_code, 404);
    assert!(results[0].status_message.starts_with("File "));
    assert!(results[0].status_message.ends_with(" not found"));
}

#[tokio::test]
async fn invalid_parameters_fail_before_any_io() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "app.log", "one\ntwo\n");
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(dir.path(), remote.clone());

    let bad = [
        RawQuery {
            n_lines: Some(0),
            ..query(1, 1, "localhost,peer:8080")
        },
        RawQuery {
            order_by: Some(2),
            ..query(1, 1, "localhost,peer:8080")
        },
        RawQuery {
            start_pos: Some(-5),
            ..query(1, 1, "localhost,peer:8080")
        },
    ];
    for raw in bad {
        let err = coordinator
            .execute(&QueryTarget::File("app.log".to_string()), &raw)
            .await
            .expect_err("invalid");
        assert_eq!(err.status(), HostStatus::BadRequest);
    }
    let err = coordinator
        .execute(&QueryTarget::File("../escape.log".to_string()), &query(1, 1, "localhost"))
        .await
        .expect_err("escape");
    assert_eq!(err.status(), HostStatus::BadRequest);

    assert!(coordinator.engine().cache().is_empty());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn directory_query_drops_unreadable_entries() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "a.log", "alpha\n");
    std::fs::create_dir(dir.path().join("archive")).expect("mkdir");
    let coordinator = coordinator(dir.path(), Arc::new(ScriptedRemote::default()));

    let results = coordinator
        .execute(&QueryTarget::Directory, &query(-1, 0, "localhost"))
        .await
        .expect("query");
    assert_eq!(results[0].status_code, 200);
    assert_eq!(results[0].files.len(), 1);
    assert_eq!(results[0].files[0].window.lines, vec!["alpha"]);
    assert_eq!(results[0].files[0].file.host, OWN_ADDRESS);
}

#[tokio::test]
async fn bad_local_cursor_fails_before_peers_are_asked() {
    let dir = tempfile::tempdir().expect("tmp");
    write_log(dir.path(), "app.log", "one\ntwo\n");
    let remote = Arc::new(ScriptedRemote::answering(
        "peer:8080",
        HostResult::success("peer:8080", Vec::new()),
    ));
    let coordinator = coordinator(dir.path(), remote.clone());

    for start_pos in [2, 40] {
        let raw = RawQuery {
            start_pos: Some(start_pos),
            ..query(1, 0, "localhost,peer:8080")
        };
        let err = coordinator
            .execute(&QueryTarget::File("app.log".to_string()), &raw)
            .await
            .expect_err("bad cursor");
        assert!(matches!(err, LogFilesError::InvalidParameter(_)), "{err}");
    }
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn missing_file_with_cursor_still_reaches_peers() {
    let dir = tempfile::tempdir().expect("tmp");
    let remote = Arc::new(ScriptedRemote::answering(
        "peer:8080",
        HostResult::success("peer:8080", Vec::new()),
    ));
    let coordinator = coordinator(dir.path(), remote.clone());

    let raw = RawQuery {
        start_pos: Some(0),
        ..query(1, 0, "localhost,peer:8080")
    };
    let results = coordinator
        .execute(&QueryTarget::File("absent.log".to_string()), &raw)
        .await
        .expect("query");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status_code, 200);
    assert_eq!(results[1].status_code, 404);
    assert_eq!(remote.calls().len(), 1);
}
