use std::sync::Arc;

use warren_db::Database;
use warren_db::error::StoreError;
use warren_db::models::ChannelRow;
use warren_db::tree;

fn db() -> Database {
    Database::open_in_memory().expect("in-memory db")
}

fn make_user(db: &Database, email: &str, username: &str) -> i64 {
    db.create_user(email, username, "argon2-hash-placeholder")
        .expect("create user")
        .id
}

fn make_channel(db: &Database, name: &str, parent: Option<i64>) -> ChannelRow {
    db.create_channel(name, parent).expect("create channel")
}

/// The consistency invariant: every committed path must equal a fresh walk
/// of the live parent chain.
fn assert_paths_consistent(db: &Database, ids: &[i64]) {
    for &id in ids {
        let row = db.get_channel(id).expect("channel");
        let recomputed = db
            .with_conn(|conn| Ok(tree::compute_path(conn, row.parent_id)?))
            .expect("recompute");
        assert_eq!(row.path, recomputed, "stale path on channel {id}");
    }
}

// -- Users --

#[test]
fn duplicate_email_and_username_rejected() {
    let db = db();
    make_user(&db, "dup@example.com", "dupuser");

    let err = db
        .create_user("dup@example.com", "other", "h")
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateCredential));

    let err = db.create_user("other@example.com", "dupuser", "h").unwrap_err();
    assert!(matches!(err, StoreError::DuplicateCredential));
}

#[test]
fn email_normalized_username_case_sensitive() {
    let db = db();
    make_user(&db, "Mixed@Example.COM", "Casey");

    // Same email in a different case collides.
    let err = db.create_user("mixed@example.com", "someone", "h").unwrap_err();
    assert!(matches!(err, StoreError::DuplicateCredential));

    // Same username in a different case does not.
    db.create_user("casey2@example.com", "casey", "h")
        .expect("lowercase variant is a distinct username");

    let by_email = db
        .find_user_by_identifier("MIXED@example.com")
        .unwrap()
        .expect("email lookup is case-insensitive");
    assert_eq!(by_email.username, "Casey");

    let by_name = db.find_user_by_identifier("Casey").unwrap().unwrap();
    assert_eq!(by_name.email, "mixed@example.com");
}

#[test]
fn user_field_validation() {
    let db = db();
    assert!(matches!(
        db.create_user("not-an-email", "validname", "h").unwrap_err(),
        StoreError::Validation { field: "email", .. }
    ));
    assert!(matches!(
        db.create_user("a@b.c", "ab", "h").unwrap_err(),
        StoreError::Validation { field: "username", .. }
    ));
}

#[test]
fn bio_update_bounded() {
    let db = db();
    let id = make_user(&db, "bio@example.com", "biouser");

    let row = db.update_bio(id, Some("Just a friendly poster")).unwrap();
    assert_eq!(row.bio.as_deref(), Some("Just a friendly poster"));

    let long = "x".repeat(257);
    assert!(matches!(
        db.update_bio(id, Some(&long)).unwrap_err(),
        StoreError::Validation { field: "bio", .. }
    ));

    let row = db.update_bio(id, None).unwrap();
    assert_eq!(row.bio, None);
}

// -- Channel creation & paths --

#[test]
fn root_channel_has_empty_path() {
    let db = db();
    let general = make_channel(&db, "general", None);
    assert_eq!(general.parent_id, None);
    assert!(general.path.is_empty());
}

#[test]
fn child_path_is_parent_path_plus_parent_id() {
    let db = db();
    let general = make_channel(&db, "general", None);
    let dev = make_channel(&db, "dev", Some(general.id));
    let rust = make_channel(&db, "rust", Some(dev.id));

    assert_eq!(dev.path, vec![general.id]);
    assert_eq!(rust.path, vec![general.id, dev.id]);
    assert_paths_consistent(&db, &[general.id, dev.id, rust.id]);
}

#[test]
fn blank_and_oversized_names_rejected() {
    let db = db();
    assert!(matches!(
        db.create_channel("   ", None).unwrap_err(),
        StoreError::Validation { field: "name", .. }
    ));
    let long = "c".repeat(256);
    assert!(matches!(
        db.create_channel(&long, None).unwrap_err(),
        StoreError::Validation { field: "name", .. }
    ));
}

#[test]
fn dangling_parent_rejected() {
    let db = db();
    assert!(matches!(
        db.create_channel("orphan", Some(9999)).unwrap_err(),
        StoreError::ParentNotFound
    ));
}

#[test]
fn duplicate_name_rejected() {
    let db = db();
    make_channel(&db, "dev", None);
    assert!(matches!(
        db.create_channel("dev", None).unwrap_err(),
        StoreError::DuplicateName
    ));
    // Surrounding whitespace trims to the same name.
    assert!(matches!(
        db.create_channel("  dev  ", None).unwrap_err(),
        StoreError::DuplicateName
    ));
}

#[test]
fn concurrent_duplicate_names_one_winner() {
    let db = Arc::new(db());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || db.create_channel("contested", None))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let oks = results.iter().filter(|r| r.is_ok()).count();
    let dups = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::DuplicateName)))
        .count();
    assert_eq!((oks, dups), (1, 1));
}

// -- Reparenting --

#[test]
fn reparent_cascades_to_descendants() {
    let db = db();
    let a = make_channel(&db, "A", None);
    let b = make_channel(&db, "B", Some(a.id));
    let c = make_channel(&db, "C", Some(b.id));
    let d = make_channel(&db, "D", None);

    let moved = db.set_channel_parent(b.id, Some(d.id)).unwrap();
    assert_eq!(moved.path, vec![d.id]);

    let c = db.get_channel(c.id).unwrap();
    assert_eq!(c.path, vec![d.id, b.id]);
    assert_paths_consistent(&db, &[a.id, b.id, c.id, d.id]);
}

#[test]
fn general_dev_rust_archive_scenario() {
    let db = db();
    let general = make_channel(&db, "general", None);
    assert!(general.path.is_empty());

    let dev = make_channel(&db, "general/dev", Some(general.id));
    assert_eq!(dev.path, vec![general.id]);

    let rust = make_channel(&db, "general/dev/rust", Some(dev.id));
    assert_eq!(rust.path, vec![general.id, dev.id]);

    let archive = make_channel(&db, "archive", None);
    assert!(archive.path.is_empty());

    db.set_channel_parent(dev.id, Some(archive.id)).unwrap();

    assert_eq!(db.get_channel(dev.id).unwrap().path, vec![archive.id]);
    assert_eq!(
        db.get_channel(rust.id).unwrap().path,
        vec![archive.id, dev.id]
    );
}

#[test]
fn reparent_to_root_truncates_subtree_paths() {
    let db = db();
    let a = make_channel(&db, "a", None);
    let b = make_channel(&db, "b", Some(a.id));
    let c = make_channel(&db, "c", Some(b.id));

    db.set_channel_parent(b.id, None).unwrap();

    assert!(db.get_channel(b.id).unwrap().path.is_empty());
    assert_eq!(db.get_channel(c.id).unwrap().path, vec![b.id]);
}

#[test]
fn reparent_missing_channel_or_parent() {
    let db = db();
    let a = make_channel(&db, "a", None);
    assert!(matches!(
        db.set_channel_parent(9999, Some(a.id)).unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        db.set_channel_parent(a.id, Some(9999)).unwrap_err(),
        StoreError::ParentNotFound
    ));
}

#[test]
fn reparent_under_own_descendant_stays_bounded() {
    // The service does not police cycles; the engine bounds them. The
    // committed paths must still be finite and consistent with a fresh walk.
    let db = db();
    let a = make_channel(&db, "a", None);
    let b = make_channel(&db, "b", Some(a.id));

    db.set_channel_parent(a.id, Some(b.id)).unwrap();

    let a = db.get_channel(a.id).unwrap();
    let b = db.get_channel(b.id).unwrap();
    assert!(a.path.len() <= tree::MAX_DEPTH);
    assert!(b.path.len() <= tree::MAX_DEPTH);
    assert_paths_consistent(&db, &[a.id, b.id]);
}

// -- Follows --

#[test]
fn follow_is_idempotent() {
    let db = db();
    let user = make_user(&db, "f@example.com", "follower");
    let ch = make_channel(&db, "news", None);

    assert!(db.follow(user, ch.id).unwrap());
    assert!(!db.follow(user, ch.id).unwrap());

    assert_eq!(db.follower_count(ch.id).unwrap(), 1);
}

#[test]
fn follow_missing_channel_is_not_found() {
    let db = db();
    let user = make_user(&db, "f@example.com", "follower");
    assert!(matches!(
        db.follow(user, 9999).unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[test]
fn unfollow_nonexistent_is_noop() {
    let db = db();
    let user = make_user(&db, "f@example.com", "follower");
    let ch = make_channel(&db, "news", None);

    db.unfollow(user, ch.id).expect("no-op unfollow");

    db.follow(user, ch.id).unwrap();
    db.unfollow(user, ch.id).unwrap();
    assert_eq!(db.follower_count(ch.id).unwrap(), 0);
}

// -- Posts & cascades --

#[test]
fn post_validation() {
    let db = db();
    let user = make_user(&db, "p@example.com", "poster");
    let ch = make_channel(&db, "dev", None);

    assert!(matches!(
        db.create_post(user, ch.id, "   ", None).unwrap_err(),
        StoreError::Validation { field: "body", .. }
    ));
    let long = "b".repeat(256);
    assert!(matches!(
        db.create_post(user, ch.id, &long, None).unwrap_err(),
        StoreError::Validation { field: "body", .. }
    ));
    assert!(matches!(
        db.create_post(user, 9999, "hello", None).unwrap_err(),
        StoreError::NotFound(_)
    ));

    let post = db
        .create_post(user, ch.id, "hello", Some("intro, rust"))
        .unwrap();
    assert_eq!(post.tags.as_deref(), Some("intro, rust"));

    // Blank tags collapse to NULL.
    let post = db.create_post(user, ch.id, "again", Some("  ")).unwrap();
    assert_eq!(post.tags, None);
}

#[test]
fn posts_listed_newest_first() {
    let db = db();
    let user = make_user(&db, "p@example.com", "poster");
    let ch = make_channel(&db, "dev", None);

    let first = db.create_post(user, ch.id, "first", None).unwrap();
    let second = db.create_post(user, ch.id, "second", None).unwrap();

    let posts = db.list_channel_posts(ch.id).unwrap();
    assert_eq!(
        posts.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}

#[test]
fn user_posts_listed_across_channels() {
    let db = db();
    let author = make_user(&db, "author@example.com", "author");
    let other = make_user(&db, "other@example.com", "other");
    let general = make_channel(&db, "general", None);
    let random = make_channel(&db, "random", None);

    let first = db.create_post(author, general.id, "first", None).unwrap();
    db.create_post(other, general.id, "noise", None).unwrap();
    let second = db.create_post(author, random.id, "second", None).unwrap();

    let posts = db.list_user_posts(author).unwrap();
    assert_eq!(
        posts.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    assert!(matches!(
        db.list_user_posts(9999).unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[test]
fn length_bounds_count_characters_not_bytes() {
    let db = db();

    // 200 characters, 400 bytes — inside the 255-char bound.
    let name = "é".repeat(200);
    let ch = db.create_channel(&name, None).expect("multibyte name fits");
    assert_eq!(db.get_channel(ch.id).unwrap().name, name);

    let user = make_user(&db, "uni@example.com", "unicoder");

    let body = "ü".repeat(255);
    db.create_post(user, ch.id, &body, None)
        .expect("255 multibyte chars fit the body bound");
    assert!(matches!(
        db.create_post(user, ch.id, &"ü".repeat(256), None).unwrap_err(),
        StoreError::Validation { field: "body", .. }
    ));

    let bio = "ß".repeat(256);
    db.update_bio(user, Some(&bio))
        .expect("256 multibyte chars fit the bio bound");
}

#[test]
fn body_not_null_enforced_by_storage() {
    let db = db();
    let user = make_user(&db, "nn@example.com", "nnuser");
    let ch = make_channel(&db, "nn-chan", None);

    // Bypass the service checks; the schema itself must refuse.
    let err = db
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (user_id, channel_id, body) VALUES (?1, ?2, NULL)",
                rusqlite::params![user, ch.id],
            )?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)));
}

#[test]
fn deleting_user_cascades_posts_and_follows() {
    let db = db();
    let user = make_user(&db, "gone@example.com", "goner");
    let keeper = make_user(&db, "stay@example.com", "stayer");
    let ch = make_channel(&db, "dev", None);

    db.create_post(user, ch.id, "mine", None).unwrap();
    db.create_post(keeper, ch.id, "not mine", None).unwrap();
    db.follow(user, ch.id).unwrap();

    db.delete_user(user).unwrap();

    let remaining = db.list_channel_posts(ch.id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, keeper);
    assert_eq!(db.follower_count(ch.id).unwrap(), 0);
}

#[test]
fn deleting_channel_cascades_posts_but_detaches_children() {
    let db = db();
    let user = make_user(&db, "d@example.com", "deleter");
    let parent = make_channel(&db, "parent", None);
    let child = make_channel(&db, "child", Some(parent.id));
    let grandchild = make_channel(&db, "grandchild", Some(child.id));

    let post = db.create_post(user, parent.id, "doomed", None).unwrap();

    db.delete_channel(parent.id).unwrap();

    assert!(matches!(
        db.get_post(post.id).unwrap_err(),
        StoreError::NotFound(_)
    ));

    // Children survive as detached roots with eagerly truncated paths.
    let child = db.get_channel(child.id).unwrap();
    assert_eq!(child.parent_id, None);
    assert!(child.path.is_empty());

    let grandchild = db.get_channel(grandchild.id).unwrap();
    assert_eq!(grandchild.path, vec![child.id]);
    assert_paths_consistent(&db, &[child.id, grandchild.id]);
}

#[test]
fn delete_missing_channel_is_not_found() {
    let db = db();
    assert!(matches!(
        db.delete_channel(12345).unwrap_err(),
        StoreError::NotFound(_)
    ));
}
