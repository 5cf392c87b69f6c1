use dbvault_core::errors::{ExError, ExErrorKind, VaultError};

#[test]
fn test_vault_error_kind_mapping() {
    let cases: Vec<(VaultError, ExErrorKind)> = vec![
        (
            VaultError::SnapshotFailed {
                path: "database.sqlite".into(),
                reason: "locked".into(),
            },
            ExErrorKind::Io,
        ),
        (
            VaultError::RemoteRejected {
                op: "upload".into(),
                status: 500,
                body: "boom".into(),
            },
            ExErrorKind::Network,
        ),
        (
            VaultError::Transport {
                op: "list".into(),
                reason: "connection reset".into(),
            },
            ExErrorKind::Network,
        ),
        (
            VaultError::DownloadInterrupted {
                key: "Backups/a".into(),
                reason: "eof".into(),
            },
            ExErrorKind::Network,
        ),
        (
            VaultError::SizeMismatch {
                key: "Backups/a".into(),
                expected: 10,
                actual: 4,
            },
            ExErrorKind::Network,
        ),
        (
            VaultError::TimedOut {
                op: "download".into(),
                secs: 5,
            },
            ExErrorKind::Timeout,
        ),
        (
            VaultError::Connection {
                reason: "not a database".into(),
            },
            ExErrorKind::Persistence,
        ),
        (
            VaultError::SchemaSync {
                reason: "pending".into(),
            },
            ExErrorKind::Schema,
        ),
        (
            VaultError::InvalidConfig {
                key: "retention_days".into(),
                reason: "bad".into(),
            },
            ExErrorKind::Config,
        ),
    ];

    for (vault_err, expected) in cases {
        let text = vault_err.to_string();
        let ex: ExError = vault_err.into();
        assert_eq!(ex.kind(), expected, "Wrong kind for {}", text);
        assert_eq!(ex.message(), text);
    }
}

#[test]
fn test_download_errors_carry_key() {
    let ex: ExError = VaultError::SizeMismatch {
        key: "Backups/snap-1".into(),
        expected: 4096,
        actual: 100,
    }
    .into();

    assert_eq!(ex.key(), Some("Backups/snap-1"));
    assert_eq!(ex.op(), Some("download"));
    assert!(ex.to_string().contains("expected 4096"));
}

#[test]
fn test_snapshot_failure_carries_path() {
    let ex: ExError = VaultError::SnapshotFailed {
        path: "/data/database.sqlite".into(),
        reason: "permission denied".into(),
    }
    .into();

    assert_eq!(ex.path(), Some("/data/database.sqlite"));
    assert_eq!(ex.code(), "ERR_IO");
}
