//! End-to-end vault flows against a real database and blob store

use chrono::{Duration, Utc};
use tempfile::TempDir;

use sealbox::activity::ActivityAction;
use sealbox::db::{User, UserRepository};
use sealbox::shares::{ShareAccessError, ShareState};
use sealbox::storage::BlobStore;
use sealbox::vault::{CreateShare, ShareExpiry, UploadRequest};
use sealbox::{Config, Vault, VaultError};

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealbox=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn test_vault() -> (TempDir, Vault) {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.root = dir.path().join("uploads");
    config.storage.temp_dir = dir.path().join("temp");
    config.database.url = format!("sqlite://{}", dir.path().join("vault.db").display());

    let vault = Vault::open(config).await.unwrap();
    (dir, vault)
}

async fn seed_user(vault: &Vault, name: &str) -> User {
    vault
        .register_user(name, &format!("{name}@example.com"), "correct horse")
        .await
        .unwrap()
}

fn plain_upload(name: &str) -> UploadRequest<'_> {
    UploadRequest {
        original_name: name,
        folder_id: None,
        description: None,
    }
}

#[tokio::test]
async fn upload_stores_ciphertext_and_download_restores_plaintext() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let payload = b"quarterly figures, confidential";
    let file = vault
        .upload_file(&user.id, &plain_upload("report.pdf"), payload)
        .await
        .unwrap();

    assert_eq!(file.mime_type, "application/pdf");
    assert_eq!(file.file_size, payload.len() as i64);
    assert_eq!(file.version, 1);
    assert!(file.is_current);

    // At rest: ciphertext only, plaintext length plus the 16-byte tag
    let stored = vault.blobs().get(&file.storage_name).await.unwrap();
    assert_ne!(stored, payload);
    assert_eq!(stored.len(), payload.len() + 16);

    let download = vault.download_file(&user.id, &file.id).await.unwrap();
    assert_eq!(download.content, payload);
    assert_eq!(download.file_name, "report.pdf");

    // Accounting and trail
    let account = UserRepository::new(vault.db())
        .get(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.storage_used, payload.len() as i64);

    let feed = vault.recent_activity(&user.id, 10).await.unwrap();
    assert!(feed.iter().any(|a| a.action == ActivityAction::Upload));
    assert!(feed.iter().any(|a| a.action == ActivityAction::Download));
}

#[tokio::test]
async fn strangers_cannot_download_by_id() {
    let (_dir, vault) = test_vault().await;
    let owner = seed_user(&vault, "ada").await;
    let stranger = seed_user(&vault, "mallory").await;

    let file = vault
        .upload_file(&owner.id, &plain_upload("secret.txt"), b"mine")
        .await
        .unwrap();

    let err = vault.download_file(&stranger.id, &file.id).await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
}

#[tokio::test]
async fn chunked_upload_assembles_in_index_order() {
    let (dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let chunks = vault.begin_chunked_upload().await.unwrap();
    let session_path = chunks.path().to_path_buf();
    chunks.write_fragment(2, b"C").await.unwrap();
    chunks.write_fragment(0, b"A").await.unwrap();
    chunks.write_fragment(1, b"B").await.unwrap();

    let file = vault
        .finish_chunked_upload(&user.id, chunks, &plain_upload("letters.txt"))
        .await
        .unwrap();

    let download = vault.download_file(&user.id, &file.id).await.unwrap();
    assert_eq!(download.content, b"ABC");

    // Session directory consumed, no scratch files left over
    assert!(!session_path.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("temp"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn gapped_chunk_session_fails_and_is_consumed() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let chunks = vault.begin_chunked_upload().await.unwrap();
    let session_path = chunks.path().to_path_buf();
    chunks.write_fragment(0, b"A").await.unwrap();
    chunks.write_fragment(2, b"C").await.unwrap();

    let err = vault
        .finish_chunked_upload(&user.id, chunks, &plain_upload("gap.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::ChunkAssembly(_)));
    assert!(!session_path.exists());
}

#[tokio::test]
async fn new_version_supersedes_and_old_content_stays_readable() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let v1 = vault
        .upload_file(&user.id, &plain_upload("notes.txt"), b"first draft")
        .await
        .unwrap();
    let v2 = vault
        .upload_new_version(&user.id, &v1.id, b"second draft, longer", Some("reworked"))
        .await
        .unwrap();

    assert_eq!(v2.version, 2);
    assert_eq!(v2.parent_id.as_deref(), Some(v1.id.as_str()));

    let versions = vault.list_versions(&user.id, &v1.id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert!(versions[0].is_current && versions[0].version == 2);
    assert!(!versions[1].is_current && versions[1].version == 1);

    // Either member downloads its own content
    let new = vault.download_file(&user.id, &v2.id).await.unwrap();
    assert_eq!(new.content, b"second draft, longer");
    let old = vault.download_file(&user.id, &v1.id).await.unwrap();
    assert_eq!(old.content, b"first draft");

    // Accounting covers both stored versions
    let account = UserRepository::new(vault.db())
        .get(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account.storage_used,
        (b"first draft".len() + b"second draft, longer".len()) as i64
    );
}

#[tokio::test]
async fn deleting_any_member_removes_the_chain_blobs_and_shares() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let v1 = vault
        .upload_file(&user.id, &plain_upload("notes.txt"), b"first")
        .await
        .unwrap();
    let v2 = vault
        .upload_new_version(&user.id, &v1.id, b"second", None)
        .await
        .unwrap();

    let share = vault
        .create_share(
            &user.id,
            &CreateShare {
                file_id: &v2.id,
                expiry: ShareExpiry::Never,
                max_downloads: None,
                password: None,
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    vault.delete_file(&user.id, &v1.id).await.unwrap();

    assert!(matches!(
        vault.list_versions(&user.id, &v2.id).await.unwrap_err(),
        VaultError::NotFound(_)
    ));
    assert!(!vault.blobs().contains(&v1.storage_name).await.unwrap());
    assert!(!vault.blobs().contains(&v2.storage_name).await.unwrap());

    // Shares on any member went with the rows
    let err = vault
        .access_share(&share.token, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::ShareAccess(ShareAccessError::NotFound)
    ));

    let account = UserRepository::new(vault.db())
        .get(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.storage_used, 0);
}

#[tokio::test]
async fn capped_share_admits_exactly_its_quota() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let file = vault
        .upload_file(&user.id, &plain_upload("gift.bin"), b"payload")
        .await
        .unwrap();
    let share = vault
        .create_share(
            &user.id,
            &CreateShare {
                file_id: &file.id,
                expiry: ShareExpiry::Never,
                max_downloads: Some(1),
                password: None,
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    let first = vault
        .access_share(&share.token, None, Utc::now())
        .await
        .unwrap();
    assert_eq!(first.content, b"payload");

    let second = vault
        .access_share(&share.token, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        second,
        VaultError::ShareAccess(ShareAccessError::Exhausted)
    ));

    let shares = vault.list_shares(&user.id).await.unwrap();
    assert_eq!(shares[0].download_count, 1);
    assert_eq!(shares[0].state(Utc::now()), ShareState::Exhausted);
}

#[tokio::test]
async fn concurrent_accesses_of_a_single_download_share_admit_one_winner() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let file = vault
        .upload_file(&user.id, &plain_upload("gift.bin"), b"payload")
        .await
        .unwrap();
    let share = vault
        .create_share(
            &user.id,
            &CreateShare {
                file_id: &file.id,
                expiry: ShareExpiry::Never,
                max_downloads: Some(1),
                password: None,
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    let now = Utc::now();
    let (a, b) = tokio::join!(
        vault.access_share(&share.token, None, now),
        vault.access_share(&share.token, None, now),
    );
    assert!(
        a.is_ok() != b.is_ok(),
        "exactly one access may win the last slot"
    );
}

#[tokio::test]
async fn wrong_password_leaves_the_counter_alone() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let file = vault
        .upload_file(&user.id, &plain_upload("locked.txt"), b"secret text")
        .await
        .unwrap();
    let share = vault
        .create_share(
            &user.id,
            &CreateShare {
                file_id: &file.id,
                expiry: ShareExpiry::Default,
                max_downloads: Some(5),
                password: Some("hunter2"),
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    for attempt in [None, Some("wrong"), Some("HUNTER2")] {
        let err = vault
            .access_share(&share.token, attempt, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::ShareAccess(ShareAccessError::WrongPassword)
        ));
    }
    assert_eq!(vault.list_shares(&user.id).await.unwrap()[0].download_count, 0);

    let granted = vault
        .access_share(&share.token, Some("hunter2"), Utc::now())
        .await
        .unwrap();
    assert_eq!(granted.content, b"secret text");
    assert_eq!(vault.list_shares(&user.id).await.unwrap()[0].download_count, 1);
}

#[tokio::test]
async fn shares_expire_on_the_clock() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let file = vault
        .upload_file(&user.id, &plain_upload("timed.txt"), b"short-lived")
        .await
        .unwrap();
    let share = vault
        .create_share(
            &user.id,
            &CreateShare {
                file_id: &file.id,
                expiry: ShareExpiry::Days(7),
                max_downloads: None,
                password: None,
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    assert!(vault
        .access_share(&share.token, None, Utc::now())
        .await
        .is_ok());

    let after_expiry = Utc::now() + Duration::days(8);
    let err = vault
        .access_share(&share.token, None, after_expiry)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::ShareAccess(ShareAccessError::Expired)
    ));
}

#[tokio::test]
async fn revocation_is_terminal_and_owner_only() {
    let (_dir, vault) = test_vault().await;
    let owner = seed_user(&vault, "ada").await;
    let stranger = seed_user(&vault, "mallory").await;

    let file = vault
        .upload_file(&owner.id, &plain_upload("shared.txt"), b"content")
        .await
        .unwrap();
    let share = vault
        .create_share(
            &owner.id,
            &CreateShare {
                file_id: &file.id,
                expiry: ShareExpiry::Never,
                max_downloads: None,
                password: None,
                recipient: None,
                notify: false,
            },
        )
        .await
        .unwrap();

    let err = vault
        .revoke_share(&stranger.id, &share.token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::ShareAccess(ShareAccessError::NotFound)
    ));

    let revoked = vault.revoke_share(&owner.id, &share.token).await.unwrap();
    assert!(revoked.revoked_at.is_some());

    let err = vault
        .access_share(&share.token, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::ShareAccess(ShareAccessError::Revoked)
    ));

    // Idempotent for the owner
    let again = vault.revoke_share(&owner.id, &share.token).await.unwrap();
    assert_eq!(again.revoked_at, revoked.revoked_at);
}

#[tokio::test]
async fn folders_nest_move_and_release_files_on_delete() {
    let (_dir, vault) = test_vault().await;
    let user = seed_user(&vault, "ada").await;

    let projects = vault
        .create_folder(&user.id, "projects", None, None)
        .await
        .unwrap();
    let reports = vault
        .create_folder(&user.id, "reports", Some("quarterlies"), Some(&projects.id))
        .await
        .unwrap();

    let file = vault
        .upload_file(
            &user.id,
            &UploadRequest {
                original_name: "q3.xlsx",
                folder_id: Some(&reports.id),
                description: None,
            },
            b"cells",
        )
        .await
        .unwrap();

    assert_eq!(
        vault.folder_path(&user.id, &reports.id).await.unwrap(),
        "/projects/reports"
    );

    let listing = vault.browse(&user.id, Some(&reports.id)).await.unwrap();
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].id, file.id);

    // A cycle refuses, a legal move lands
    let err = vault
        .move_folder(&user.id, &projects.id, Some(&reports.id))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Folder(_)));

    vault
        .move_folder(&user.id, &reports.id, None)
        .await
        .unwrap();
    assert_eq!(
        vault.folder_path(&user.id, &reports.id).await.unwrap(),
        "/reports"
    );

    vault.delete_folder(&user.id, &reports.id).await.unwrap();
    let top = vault.browse(&user.id, None).await.unwrap();
    assert!(top.files.iter().any(|f| f.id == file.id));

    let found = vault.search_files(&user.id, "q3").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn duplicate_registration_is_a_bad_request() {
    let (_dir, vault) = test_vault().await;
    seed_user(&vault, "ada").await;

    let err = vault
        .register_user("ada", "other@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::BadRequest(_)));
}
